//! Decorator lowering pass.
//!
//! Rewrites classes carrying TC39 decorator syntax (and `accessor` members,
//! decorated or not) into baseline class features plus calls into the
//! `applyDecs*` runtime helpers. The pass works class by class: statements
//! are intercepted so declarations and export wrappers can be split, class
//! expressions are replaced in place, and every fresh binding is allocated
//! through the traversal context so scoping stays coherent.

mod accessor;
mod builder;
mod class_lowering;
mod element;
mod emit;
mod extract;
mod this_rewrite;
mod validate;

use std::mem;

use oxc_allocator::{TakeIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_diagnostics::OxcDiagnostic;
use oxc_span::{Atom, Span};
use oxc_traverse::{Ancestor, BoundIdentifier, Traverse, TraverseCtx};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::helpers::{Helper, HelperRegistry};
use crate::options::{TransformOptions, VersionPolicy};

pub struct LoweringState;

pub(crate) type Ctx<'a, 'c> = &'c mut TraverseCtx<'a, LoweringState>;

/// A name assigned to an anonymous decorated class expression by its
/// syntactic context.
#[derive(Debug, Clone)]
pub(crate) enum InferredName<'a> {
    Literal(Atom<'a>),
    /// The context key was computed; it was memoized through `toPropertyKey`
    /// and the class is named after the memoized local.
    Memoized(BoundIdentifier<'a>),
}

impl<'a> InferredName<'a> {
    pub fn to_expression(&self, ctx: Ctx<'a, '_>) -> Expression<'a> {
        match self {
            Self::Literal(name) => builder::string_literal(*name, ctx),
            Self::Memoized(binding) => binding.create_read_expression(ctx),
        }
    }

    /// The uid hint this name contributes, when it is a plain string.
    pub fn as_literal(&self) -> Option<Atom<'a>> {
        match self {
            Self::Literal(name) => Some(*name),
            Self::Memoized(_) => None,
        }
    }
}

pub struct DecoratorLowering<'a> {
    pub(crate) policy: &'static VersionPolicy,
    pub(crate) constant_super: bool,
    pub(crate) errors: Vec<OxcDiagnostic>,
    pub(crate) helpers: HelperRegistry,
    /// Classes already lowered, so the pass is a no-op on its own output.
    visited: FxHashSet<Span>,
    /// Names assigned by the named-evaluation contexts that had to memoize a
    /// computed key, keyed by the span of the class expression they name.
    inferred_names: FxHashMap<Span, InferredName<'a>>,
    /// Locals allocated for classes in expression position; declared in one
    /// `let` prepended to the program.
    program_uids: Vec<BoundIdentifier<'a>>,
}

impl<'a> DecoratorLowering<'a> {
    pub fn new(options: &TransformOptions) -> Self {
        Self {
            policy: options.version.policy(),
            constant_super: options.constant_super(),
            errors: Vec::new(),
            helpers: HelperRegistry::new(),
            visited: FxHashSet::default(),
            inferred_names: FxHashMap::default(),
            program_uids: Vec::new(),
        }
    }

    pub fn take_errors(&mut self) -> Vec<OxcDiagnostic> {
        mem::take(&mut self.errors)
    }

    pub(crate) fn helper(&mut self, helper: Helper) -> &'static str {
        self.helpers.require(helper)
    }

    fn statement_needs_lowering(&self, stmt: &Statement<'a>) -> bool {
        let class = match stmt {
            Statement::ClassDeclaration(class) => class,
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::ClassDeclaration(class)) => class,
                _ => return false,
            },
            Statement::ExportDefaultDeclaration(export) => match &export.declaration {
                ExportDefaultDeclarationKind::ClassDeclaration(class) => class,
                _ => return false,
            },
            _ => return false,
        };
        needs_lowering(class) && !self.visited.contains(&class.span)
    }

    pub(crate) fn mark_visited(&mut self, span: Span) {
        self.visited.insert(span);
    }

    pub(crate) fn hoist_program_uids(&mut self, uids: Vec<BoundIdentifier<'a>>) {
        self.program_uids.extend(uids);
    }

    /// Named evaluation for the contexts that do not require mutation:
    /// variable initializers, simple assignments, assignment-pattern
    /// defaults, and object/class members with non-computed keys. The
    /// computed-key contexts are handled by the `enter_object_property` /
    /// `enter_property_definition` hooks, which stash a memoized name in
    /// `inferred_names` before the class expression is reached.
    fn infer_name_from_parent(&self, ctx: Ctx<'a, '_>) -> Option<InferredName<'a>> {
        match ctx.parent() {
            Ancestor::VariableDeclaratorInit(decl) => match &decl.id().kind {
                BindingPatternKind::BindingIdentifier(id) => {
                    Some(InferredName::Literal(id.name))
                }
                _ => None,
            },
            Ancestor::AssignmentExpressionRight(assign) => {
                if !matches!(
                    assign.operator(),
                    AssignmentOperator::Assign
                        | AssignmentOperator::LogicalAnd
                        | AssignmentOperator::LogicalOr
                        | AssignmentOperator::LogicalNullish
                ) {
                    return None;
                }
                match assign.left() {
                    AssignmentTarget::AssignmentTargetIdentifier(id) => {
                        Some(InferredName::Literal(id.name))
                    }
                    _ => None,
                }
            }
            Ancestor::AssignmentTargetWithDefaultInit(target) => match target.binding() {
                AssignmentTarget::AssignmentTargetIdentifier(id) => {
                    Some(InferredName::Literal(id.name))
                }
                _ => None,
            },
            Ancestor::ObjectPropertyValue(prop) => {
                property_key_name(prop.key()).map(InferredName::Literal)
            }
            Ancestor::PropertyDefinitionValue(prop) => {
                property_key_name(prop.key()).map(InferredName::Literal)
            }
            _ => None,
        }
    }

    /// Memoizes a computed member key through `toPropertyKey` when its value
    /// names a decorated anonymous class expression, rewriting the key to
    /// `_key = toPropertyKey(<key>)` so evaluation order is preserved.
    fn name_class_after_computed_key(
        &mut self,
        key: &mut PropertyKey<'a>,
        value: Option<&Expression<'a>>,
        ctx: Ctx<'a, '_>,
    ) {
        let Some(Expression::ClassExpression(class)) = value else { return };
        if class.id.is_some() || !needs_lowering(class) || self.visited.contains(&class.span) {
            return;
        }
        if let Some(name) = property_key_name(key) {
            self.inferred_names.insert(class.span, InferredName::Literal(name));
            return;
        }
        let Some(key_expr) = key.as_expression_mut() else { return };
        let binding = builder::uid("computedKey", ctx);
        let to_property_key = self.helper(Helper::ToPropertyKey);
        let call = builder::call(
            builder::ident_ref(to_property_key, ctx),
            vec![key_expr.take_in(ctx.ast)],
            ctx,
        );
        *key_expr = builder::assign_to(&binding, call, ctx);
        self.inferred_names.insert(class.span, InferredName::Memoized(binding.clone()));
        self.program_uids.push(binding);
    }
}

impl<'a> Traverse<'a, LoweringState> for DecoratorLowering<'a> {
    fn enter_statements(
        &mut self,
        stmts: &mut ArenaVec<'a, Statement<'a>>,
        ctx: &mut TraverseCtx<'a, LoweringState>,
    ) {
        if !stmts.iter().any(|stmt| self.statement_needs_lowering(stmt)) {
            return;
        }
        let old = mem::replace(stmts, ctx.ast.vec());
        for stmt in old {
            if self.statement_needs_lowering(&stmt) {
                class_lowering::lower_statement(self, stmt, stmts, ctx);
            } else {
                stmts.push(stmt);
            }
        }
    }

    fn enter_expression(
        &mut self,
        expr: &mut Expression<'a>,
        ctx: &mut TraverseCtx<'a, LoweringState>,
    ) {
        let Expression::ClassExpression(class) = expr else { return };
        if !needs_lowering(class) || self.visited.contains(&class.span) {
            return;
        }
        let inferred = if class.id.is_some() {
            None
        } else {
            self.inferred_names
                .remove(&class.span)
                .or_else(|| self.infer_name_from_parent(ctx))
        };
        class_lowering::lower_expression(self, expr, inferred, ctx);
    }

    fn enter_object_property(
        &mut self,
        prop: &mut ObjectProperty<'a>,
        ctx: &mut TraverseCtx<'a, LoweringState>,
    ) {
        if prop.computed {
            let (key, value) = (&mut prop.key, Some(&prop.value));
            self.name_class_after_computed_key(key, value, ctx);
        }
    }

    fn enter_property_definition(
        &mut self,
        prop: &mut PropertyDefinition<'a>,
        ctx: &mut TraverseCtx<'a, LoweringState>,
    ) {
        if prop.computed {
            let (key, value) = (&mut prop.key, prop.value.as_ref());
            self.name_class_after_computed_key(key, value, ctx);
        }
    }

    fn exit_program(
        &mut self,
        program: &mut Program<'a>,
        ctx: &mut TraverseCtx<'a, LoweringState>,
    ) {
        if self.program_uids.is_empty() {
            return;
        }
        let uids = mem::take(&mut self.program_uids);
        let decl = builder::let_declaration(&uids, ctx);
        program.body.insert(0, decl);
    }
}

/// A class is lowered when it or any member is decorated, or when it carries
/// `accessor` members (those desugar unconditionally).
pub(crate) fn needs_lowering(class: &Class) -> bool {
    !class.decorators.is_empty()
        || class.body.body.iter().any(|element| match element {
            ClassElement::MethodDefinition(method) => !method.decorators.is_empty(),
            ClassElement::PropertyDefinition(prop) => !prop.decorators.is_empty(),
            ClassElement::AccessorProperty(_) => true,
            _ => false,
        })
}

pub(crate) fn property_key_name<'a>(key: &PropertyKey<'a>) -> Option<Atom<'a>> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name),
        PropertyKey::StringLiteral(lit) => Some(lit.value),
        _ => None,
    }
}

/// Whole-program pre-scan used by the harness to skip semantic construction
/// and traversal when nothing in the file can be lowered.
pub fn has_lowerable_classes(program: &Program) -> bool {
    struct Detect {
        found: bool,
    }
    impl<'a> Visit<'a> for Detect {
        fn visit_class(&mut self, class: &Class<'a>) {
            if self.found {
                return;
            }
            if needs_lowering(class) {
                self.found = true;
                return;
            }
            walk::walk_class(self, class);
        }
    }
    let mut detect = Detect { found: false };
    detect.visit_program(program);
    detect.found
}

/// Collects the `#names` declared by or referenced anywhere inside a class,
/// so fresh private storage names cannot collide with (or shadow) any of
/// them.
pub(crate) fn collect_private_names<'a>(class: &Class<'a>) -> FxHashSet<Atom<'a>> {
    struct Collect<'a> {
        names: FxHashSet<Atom<'a>>,
    }
    impl<'a> Visit<'a> for Collect<'a> {
        fn visit_private_identifier(&mut self, ident: &PrivateIdentifier<'a>) {
            self.names.insert(ident.name);
        }
    }
    let mut collect = Collect { names: FxHashSet::default() };
    collect.visit_class(class);
    collect.names
}

#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_semantic::SemanticBuilder;
    use oxc_span::SourceType;
    use oxc_traverse::traverse_mut;

    use super::*;

    fn parse_program<'a>(
        allocator: &'a Allocator,
        source: &'a str,
    ) -> oxc_parser::ParserReturn<'a> {
        let ret = Parser::new(allocator, source, SourceType::default()).parse();
        assert!(ret.errors.is_empty(), "test source must parse: {:?}", ret.errors);
        ret
    }

    struct CountDecorators {
        count: usize,
    }

    impl<'a> Visit<'a> for CountDecorators {
        fn visit_decorator(&mut self, _decorator: &Decorator<'a>) {
            self.count += 1;
        }
    }

    #[test]
    fn lowering_removes_every_decorator_node() {
        let allocator = Allocator::default();
        let source = r#"
function dec(value, context) {}
@dec
class C {
    @dec m() {}
    @dec x = 1;
    @dec accessor a = 2;
    @dec #p() {}
}
"#;
        let mut ret = parse_program(&allocator, source);
        let semantic = SemanticBuilder::new().build(&ret.program);
        let scoping = semantic.semantic.into_scoping();
        let mut pass = DecoratorLowering::new(&TransformOptions::default());
        traverse_mut(&mut pass, &allocator, &mut ret.program, scoping, LoweringState);

        let mut count = CountDecorators { count: 0 };
        count.visit_program(&ret.program);
        assert_eq!(count.count, 0);
        assert!(pass.take_errors().is_empty());
    }

    #[test]
    fn pre_scan_finds_nested_decorated_classes() {
        let allocator = Allocator::default();
        let nested = parse_program(
            &allocator,
            "function dec(v, c) {}\nfunction f() { return class { @dec m() {} }; }",
        );
        assert!(has_lowerable_classes(&nested.program));

        let plain = parse_program(&allocator, "class C { m() {} }");
        assert!(!has_lowerable_classes(&plain.program));

        let accessor = parse_program(&allocator, "class C { accessor p = 1; }");
        assert!(has_lowerable_classes(&accessor.program));
    }

    #[test]
    fn private_name_collection_includes_nested_classes() {
        let allocator = Allocator::default();
        let ret = parse_program(
            &allocator,
            "class C { #a = 1; m() { class D { #b = 2; } } }",
        );
        let Statement::ClassDeclaration(class) = &ret.program.body[0] else {
            panic!("expected a class declaration");
        };
        let names = collect_private_names(class);
        assert!(names.contains(&Atom::from("a")));
        assert!(names.contains(&Atom::from("b")));
        assert_eq!(names.len(), 2);
    }
}
