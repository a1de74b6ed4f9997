//! Per-element decoration records.

use oxc_ast::ast::*;
use oxc_span::Atom;
use oxc_traverse::BoundIdentifier;

use super::{builder, Ctx};

/// Element kind as encoded in the low bits of the decoration flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DecoratorKind {
    Field = 0,
    Accessor = 1,
    Method = 2,
    Getter = 3,
    Setter = 4,
}

impl DecoratorKind {
    pub fn is_field(self) -> bool {
        matches!(self, Self::Field)
    }

    /// Method-like kinds contribute to the proto-init / static-init thunks;
    /// fields and accessors carry their own initializer thunk instead.
    pub fn is_method_like(self) -> bool {
        matches!(self, Self::Method | Self::Getter | Self::Setter)
    }

    pub fn of_method(kind: MethodDefinitionKind) -> Self {
        match kind {
            MethodDefinitionKind::Get => Self::Getter,
            MethodDefinitionKind::Set => Self::Setter,
            _ => Self::Method,
        }
    }
}

/// The name slot of a decoration tuple: a plain string, or a reference to
/// the local a computed key was memoized into.
#[derive(Debug)]
pub enum NameValue<'a> {
    Literal(Atom<'a>),
    Computed(BoundIdentifier<'a>),
}

impl<'a> NameValue<'a> {
    pub fn to_expression(&self, ctx: Ctx<'a, '_>) -> Expression<'a> {
        match self {
            Self::Literal(name) => builder::string_literal(*name, ctx),
            Self::Computed(binding) => binding.create_read_expression(ctx),
        }
    }

    /// Identifier-ish text used when deriving uid hints.
    pub fn hint(&self) -> &str {
        match self {
            Self::Literal(name) => name.as_str(),
            Self::Computed(_) => "computedKey",
        }
    }
}

/// Everything the emission phase needs to know about one decorated element.
#[derive(Debug)]
pub struct DecoratorInfo<'a> {
    pub kind: DecoratorKind,
    pub is_static: bool,
    pub is_private: bool,
    pub name: NameValue<'a>,
    /// Decorator expressions, already memoized where required, in source
    /// order.
    pub decorators: Vec<Expression<'a>>,
    /// Parallel to `decorators`; the receiver for member-expression
    /// decorators under receiver-tracking revisions.
    pub decorators_this: Vec<Option<Expression<'a>>>,
    /// Trailing tuple entries: access closures for private fields and
    /// accessors, the extracted callable for private method-likes.
    pub private_closures: Vec<Expression<'a>>,
    /// Destructuring targets for this element's slice of the `e` array.
    pub locals: Vec<BoundIdentifier<'a>>,
    /// Position in the class body, for stable ordering within a bucket.
    pub source_index: usize,
}

impl<'a> DecoratorInfo<'a> {
    pub fn has_receiver(&self) -> bool {
        self.decorators_this.iter().any(Option::is_some)
    }

    /// Emission bucket: static non-fields, instance non-fields, static
    /// fields, instance fields.
    pub fn bucket(&self) -> u8 {
        match (self.is_static, self.kind.is_field()) {
            (true, false) => 0,
            (false, false) => 1,
            (true, true) => 2,
            (false, true) => 3,
        }
    }
}

pub fn sort_for_emission(infos: &mut [DecoratorInfo]) {
    infos.sort_by_key(|info| (info.bucket(), info.source_index));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(kind: DecoratorKind, is_static: bool, source_index: usize) -> DecoratorInfo<'static> {
        DecoratorInfo {
            kind,
            is_static,
            is_private: false,
            name: NameValue::Literal(Atom::from("x")),
            decorators: vec![],
            decorators_this: vec![],
            private_closures: vec![],
            locals: vec![],
            source_index,
        }
    }

    #[test]
    fn buckets_order_static_methods_first_and_instance_fields_last() {
        // Source order: instance field, static field, instance getter,
        // static method, instance accessor.
        let mut infos = vec![
            info(DecoratorKind::Field, false, 0),
            info(DecoratorKind::Field, true, 1),
            info(DecoratorKind::Getter, false, 2),
            info(DecoratorKind::Method, true, 3),
            info(DecoratorKind::Accessor, false, 4),
        ];
        sort_for_emission(&mut infos);
        let order: Vec<(DecoratorKind, bool)> =
            infos.iter().map(|i| (i.kind, i.is_static)).collect();
        assert_eq!(
            order,
            vec![
                (DecoratorKind::Method, true),
                (DecoratorKind::Getter, false),
                (DecoratorKind::Accessor, false),
                (DecoratorKind::Field, true),
                (DecoratorKind::Field, false),
            ]
        );
    }

    #[test]
    fn ties_keep_source_order() {
        let mut infos = vec![
            info(DecoratorKind::Setter, false, 0),
            info(DecoratorKind::Method, false, 1),
            info(DecoratorKind::Getter, false, 2),
        ];
        sort_for_emission(&mut infos);
        let order: Vec<usize> = infos.iter().map(|i| i.source_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn accessor_is_not_method_like() {
        assert!(!DecoratorKind::Accessor.is_method_like());
        assert!(!DecoratorKind::Accessor.is_field());
        assert!(DecoratorKind::Setter.is_method_like());
        assert!(DecoratorKind::Field.is_field());
    }
}
