//! Per-class orchestration.
//!
//! One call to [`lower_class_core`] runs the phases in order on a single
//! class: binding rewrite, element survey (with unconditional auto-accessor
//! desugaring), decorator extraction, emission, and validation. The
//! statement- and expression-position entry points wrap the core with the
//! shapes those positions need: `let` hoisting, export splitting, and the
//! `(classExpression, varId)` sequence for decorated class expressions.

use std::mem;

use oxc_allocator::Box as ArenaBox;
use oxc_allocator::TakeIn;
use oxc_allocator::Vec as ArenaVec;
use oxc_ast::ast::*;
use oxc_span::{Atom, Span, SPAN};
use oxc_syntax::scope::ScopeId;
use oxc_traverse::{BoundIdentifier, TraverseCtx};
use rustc_hash::FxHashSet;

use crate::helpers::Helper;

use super::element::{DecoratorInfo, DecoratorKind, NameValue};
use super::this_rewrite::{self, SuperBase, SuperSpec};
use super::{
    accessor, builder, emit, extract, validate, Ctx, DecoratorLowering, InferredName,
    LoweringState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportShape {
    None,
    Named,
    Default,
}

/// Everything a single class accumulates across the phases.
pub(super) struct ClassState<'a> {
    pub span: Span,
    pub class_scope: ScopeId,
    pub class_decorated: bool,
    pub element_decorated: bool,
    /// The class's own id binding; internal references (accessor proxies,
    /// extracted `super` lookups) resolve against the original class through
    /// it.
    pub self_binding: Option<BoundIdentifier<'a>>,
    /// Holds the decorated class once decoration ran; body references to the
    /// class name are redirected here.
    pub var_id: Option<BoundIdentifier<'a>>,
    pub class_init: Option<BoundIdentifier<'a>>,
    pub proto_init: Option<BoundIdentifier<'a>>,
    pub static_init: Option<BoundIdentifier<'a>>,
    /// Reference to the (memoized or assumed-constant) superclass.
    pub super_template: Option<Expression<'a>>,
    /// Locals needing a `let`: before the class in statement position, at
    /// the program top otherwise.
    pub uids: Vec<BoundIdentifier<'a>>,
    /// Memoization assignments for element decorators and computed keys, in
    /// evaluation order.
    pub element_memos: Vec<Expression<'a>>,
    /// Memoization assignments for class decorators; these evaluate first.
    pub class_memos: Vec<Expression<'a>>,
    pub infos: Vec<DecoratorInfo<'a>>,
    /// Decorated private method names; writes to these are compile errors.
    pub readonly_private: FxHashSet<Atom<'a>>,
    /// Name of the last decorated instance private element, for the brand
    /// check closure.
    pub brand_name: Option<Atom<'a>>,
    pub needs_proto_init: bool,
    pub needs_static_init: bool,
    /// Inferred name to bind via `setFunctionName` for originally-anonymous
    /// classes.
    pub bind_name: Option<InferredName<'a>>,
    /// Private names declared or referenced anywhere in the class; fresh
    /// storage names must avoid all of them.
    private_names: FxHashSet<Atom<'a>>,
    /// Static members and blocks pulled out of a class-decorated class.
    pub moved_statics: Vec<ClassElement<'a>>,
}

impl<'a> ClassState<'a> {
    fn new(span: Span, class_scope: ScopeId) -> Self {
        Self {
            span,
            class_scope,
            class_decorated: false,
            element_decorated: false,
            self_binding: None,
            var_id: None,
            class_init: None,
            proto_init: None,
            static_init: None,
            super_template: None,
            uids: Vec::new(),
            element_memos: Vec::new(),
            class_memos: Vec::new(),
            infos: Vec::new(),
            readonly_private: FxHashSet::default(),
            brand_name: None,
            needs_proto_init: false,
            needs_static_init: false,
            bind_name: None,
            private_names: FxHashSet::default(),
            moved_statics: Vec::new(),
        }
    }

    /// Allocates a fresh local and records it for the `let` declaration.
    pub fn new_uid(&mut self, hint: &str, ctx: Ctx<'a, '_>) -> BoundIdentifier<'a> {
        let binding = builder::uid(hint, ctx);
        self.uids.push(binding.clone());
        binding
    }

    /// A private name free both of the class's declarations and of every
    /// `#name` referenced inside it.
    pub fn fresh_private_name(&mut self, hint: &str, ctx: Ctx<'a, '_>) -> Atom<'a> {
        let mut counter = 0u32;
        loop {
            let candidate = if counter == 0 {
                format!("_{hint}")
            } else {
                format!("_{hint}{counter}")
            };
            let atom = ctx.ast.atom(&candidate);
            if self.private_names.insert(atom) {
                return atom;
            }
            counter += 1;
        }
    }
}

/// Statement-position entry: a bare class declaration or one of the two
/// export shapes around it.
pub(super) fn lower_statement<'a>(
    pass: &mut DecoratorLowering<'a>,
    stmt: Statement<'a>,
    out: &mut ArenaVec<'a, Statement<'a>>,
    ctx: &mut TraverseCtx<'a, LoweringState>,
) {
    match stmt {
        Statement::ClassDeclaration(class) => {
            lower_declaration(pass, class, ExportShape::None, out, ctx);
        }
        Statement::ExportNamedDeclaration(export) => {
            let ExportNamedDeclaration {
                span,
                declaration,
                specifiers,
                source,
                export_kind,
                with_clause,
            } = export.unbox();
            match declaration {
                Some(Declaration::ClassDeclaration(class)) => {
                    lower_declaration(pass, class, ExportShape::Named, out, ctx);
                }
                declaration => {
                    out.push(Statement::ExportNamedDeclaration(ctx.ast.alloc(
                        ExportNamedDeclaration {
                            span,
                            declaration,
                            specifiers,
                            source,
                            export_kind,
                            with_clause,
                        },
                    )));
                }
            }
        }
        Statement::ExportDefaultDeclaration(export) => {
            let ExportDefaultDeclaration { span, declaration } = export.unbox();
            match declaration {
                ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                    lower_declaration(pass, class, ExportShape::Default, out, ctx);
                }
                declaration => {
                    out.push(Statement::ExportDefaultDeclaration(ctx.ast.alloc(
                        ExportDefaultDeclaration { span, declaration },
                    )));
                }
            }
        }
        other => out.push(other),
    }
}

fn lower_declaration<'a>(
    pass: &mut DecoratorLowering<'a>,
    class: ArenaBox<'a, Class<'a>>,
    shape: ExportShape,
    out: &mut ArenaVec<'a, Statement<'a>>,
    ctx: &mut TraverseCtx<'a, LoweringState>,
) {
    let mut class = class;
    let inferred = (shape == ExportShape::Default && class.id.is_none())
        .then(|| InferredName::Literal(Atom::from("default")));
    let mut state = lower_class_core(pass, &mut class, inferred, ctx);
    let any_decoration = state.class_decorated || state.element_decorated;

    if !state.class_decorated {
        if !state.uids.is_empty() {
            out.push(builder::let_declaration(&state.uids, ctx));
        }
        for memo in mem::take(&mut state.element_memos) {
            out.push(builder::expr_statement(memo, ctx));
        }
        if any_decoration && shape != ExportShape::None {
            // The export is split off so the declaration itself stays plain.
            if class.id.is_none() {
                let binding = builder::uid("default", ctx);
                class.id = Some(binding.create_binding_identifier(ctx));
            }
            let local = class.id.as_ref().map_or_else(|| ctx.ast.atom("default"), |id| id.name);
            out.push(Statement::ClassDeclaration(class));
            out.push(export_specifier_statement(local, shape == ExportShape::Default, ctx));
        } else {
            out.push(rewrap_declaration(class, shape, ctx));
        }
        return;
    }

    // The class binding is reassigned by decoration: hoist it with `let` and
    // evaluate the class as an expression.
    let outer = match &mut class.id {
        Some(id) => {
            let name = id.name;
            let outer = match id.symbol_id.get() {
                Some(symbol_id) => BoundIdentifier::new(name, symbol_id),
                None => builder::uid(name.as_str(), ctx),
            };
            // A fresh identifier with the original name stays as the class's
            // own id, preserving `name` and `toString`.
            *id = ctx.ast.binding_identifier(SPAN, name);
            outer
        }
        None => builder::uid(
            state.bind_name.as_ref().and_then(InferredName::as_literal).map_or("default", |name| name.as_str()),
            ctx,
        ),
    };

    if !state.uids.is_empty() {
        out.push(builder::let_declaration(&state.uids, ctx));
    }
    out.push(builder::let_declaration(std::slice::from_ref(&outer), ctx));
    for memo in mem::take(&mut state.class_memos) {
        out.push(builder::expr_statement(memo, ctx));
    }
    for memo in mem::take(&mut state.element_memos) {
        out.push(builder::expr_statement(memo, ctx));
    }
    let value = emit::finish_class_decoration(pass, &mut state, class, Some(&outer), ctx);
    out.push(builder::expr_statement(value, ctx));
    if shape != ExportShape::None {
        out.push(export_specifier_statement(outer.name, shape == ExportShape::Default, ctx));
    }
}

/// Expression-position entry.
pub(super) fn lower_expression<'a>(
    pass: &mut DecoratorLowering<'a>,
    expr: &mut Expression<'a>,
    inferred: Option<InferredName<'a>>,
    ctx: &mut TraverseCtx<'a, LoweringState>,
) {
    let Expression::ClassExpression(mut class) = expr.take_in(ctx.ast) else {
        return;
    };
    let mut state = lower_class_core(pass, &mut class, inferred, ctx);
    pass.hoist_program_uids(mem::take(&mut state.uids));

    let mut parts: Vec<Expression<'a>> = Vec::new();
    parts.append(&mut state.class_memos);
    parts.append(&mut state.element_memos);

    if state.class_decorated {
        let value = emit::finish_class_decoration(pass, &mut state, class, None, ctx);
        parts.push(value);
    } else {
        parts.push(Expression::ClassExpression(class));
    }
    *expr = if parts.len() == 1 {
        parts.remove(0)
    } else {
        builder::sequence(parts, ctx)
    };
}

/// Runs the lowering phases on one class in place. The caller finishes the
/// statement/expression shaping.
fn lower_class_core<'a>(
    pass: &mut DecoratorLowering<'a>,
    class: &mut Class<'a>,
    inferred: Option<InferredName<'a>>,
    ctx: &mut TraverseCtx<'a, LoweringState>,
) -> ClassState<'a> {
    let class_decorated = !class.decorators.is_empty();
    let element_decorated = class.body.body.iter().any(|element| match element {
        ClassElement::MethodDefinition(m) => !m.decorators.is_empty(),
        ClassElement::PropertyDefinition(p) => !p.decorators.is_empty(),
        ClassElement::AccessorProperty(a) => !a.decorators.is_empty(),
        _ => false,
    });
    let class_scope = class.scope_id.get().unwrap_or_else(|| ctx.current_scope_id());

    let mut state = ClassState::new(class.span, class_scope);
    state.class_decorated = class_decorated;
    state.element_decorated = element_decorated;
    state.private_names = super::collect_private_names(class);
    pass.mark_visited(class.span);

    if class.id.is_none() && (class_decorated || element_decorated) {
        state.bind_name = inferred;
    }

    let has_static_accessor = class
        .body
        .body
        .iter()
        .any(|el| matches!(el, ClassElement::AccessorProperty(a) if a.r#static));
    let has_decorated_private_method_like = class.body.body.iter().any(|el| {
        matches!(
            el,
            ClassElement::MethodDefinition(m)
                if !m.decorators.is_empty()
                    && m.kind != MethodDefinitionKind::Constructor
                    && matches!(m.key, PropertyKey::PrivateIdentifier(_))
        )
    });

    // Synthesize an id when internal references need one: static accessor
    // proxies under the newest revision, or extracted private-method bodies.
    if class.id.is_none()
        && ((pass.policy.track_receivers && has_static_accessor)
            || has_decorated_private_method_like)
    {
        let hint = state
            .bind_name
            .as_ref()
            .and_then(InferredName::as_literal)
            .map_or_else(|| "Class".to_string(), |name| name.to_string());
        let binding = builder::uid(&hint, ctx);
        class.id = Some(binding.create_binding_identifier(ctx));
        state.self_binding = Some(binding);
    } else if let Some(id) = &class.id {
        if let Some(symbol_id) = id.symbol_id.get() {
            state.self_binding = Some(BoundIdentifier::new(id.name, symbol_id));
        }
    }

    if class_decorated {
        let hint = class
            .id
            .as_ref()
            .map(|id| id.name.to_string())
            .or_else(|| {
                state.bind_name.as_ref().and_then(InferredName::as_literal).map(|n| n.to_string())
            })
            .unwrap_or_else(|| "decorated_class".to_string());
        state.var_id = Some(state.new_uid(&hint, ctx));
        state.class_init = Some(state.new_uid("initClass", ctx));
        // Body references to the class name must observe the decorated
        // class, so redirect them to the local that will hold it.
        if let (Some(id), Some(var_id)) = (&class.id, state.var_id.clone()) {
            if let Some(symbol_id) = id.symbol_id.get() {
                this_rewrite::redirect_class_name_references(class, symbol_id, &var_id, ctx);
            }
        }
    }

    // Superclass: keep a stable reference when the helper needs it passed
    // through or extracted bodies rewrite against it.
    if let Some(super_expr) = &class.super_class {
        if extract::is_scope_constant(super_expr, ctx) {
            state.super_template = Some(builder::clone_expr(super_expr, ctx));
        } else if pass.policy.pass_super_class
            || (pass.constant_super && has_decorated_private_method_like)
        {
            let memo = state.new_uid("Super", ctx);
            if let Some(original) = class.super_class.take() {
                class.super_class = Some(builder::assign_to(&memo, original, ctx));
            }
            state.super_template = Some(memo.create_read_expression(ctx));
        }
    }

    let super_spec = if has_decorated_private_method_like && class.super_class.is_some() {
        if pass.constant_super && state.super_template.is_some() {
            state
                .super_template
                .as_ref()
                .map(|template| SuperSpec { base: SuperBase::Constant(builder::clone_expr(template, ctx)) })
        } else {
            state
                .self_binding
                .clone()
                .map(|binding| SuperSpec { base: SuperBase::Dynamic(binding) })
        }
    } else {
        None
    };

    // Survey: classify, desugar accessors, extract decorators, rewrite
    // elements. Computed keys are memoized in source order so their
    // evaluation stays interleaved with decorator evaluation.
    let old_body = mem::replace(&mut class.body.body, ctx.ast.vec());
    for (index, element) in old_body.into_iter().enumerate() {
        match element {
            ClassElement::AccessorProperty(acc) => {
                accessor::lower_accessor(pass, &mut state, acc, index, &mut class.body.body, ctx);
            }
            ClassElement::MethodDefinition(mut method)
                if !method.decorators.is_empty()
                    && method.kind != MethodDefinitionKind::Constructor =>
            {
                let kind = DecoratorKind::of_method(method.kind);
                let is_static = method.r#static;
                let is_private = matches!(method.key, PropertyKey::PrivateIdentifier(_));
                let (decorators, receivers) = extract::extract_decorators(
                    pass,
                    &mut method.decorators,
                    &mut state.uids,
                    &mut state.element_memos,
                    ctx,
                );
                let name = resolve_key_name(pass, &mut state, &mut method.key, ctx);
                if is_static {
                    state.needs_static_init = true;
                } else {
                    state.needs_proto_init = true;
                }
                let (locals, closures) = if is_private {
                    if let NameValue::Literal(name) = &name {
                        if !is_static {
                            state.brand_name = Some(*name);
                        }
                        if kind == DecoratorKind::Method {
                            state.readonly_private.insert(*name);
                        }
                    }
                    let extracted = extract::extract_private_method(
                        method,
                        kind,
                        super_spec.as_ref(),
                        class_scope,
                        ctx,
                    );
                    state.uids.push(extracted.local.clone());
                    class.body.body.push(extracted.replacement);
                    (vec![extracted.local], vec![extracted.callable])
                } else {
                    class.body.body.push(ClassElement::MethodDefinition(method));
                    (vec![], vec![])
                };
                state.infos.push(DecoratorInfo {
                    kind,
                    is_static,
                    is_private,
                    name,
                    decorators,
                    decorators_this: receivers,
                    private_closures: closures,
                    locals,
                    source_index: index,
                });
            }
            ClassElement::PropertyDefinition(mut prop) if !prop.decorators.is_empty() => {
                let is_static = prop.r#static;
                let is_private = matches!(prop.key, PropertyKey::PrivateIdentifier(_));
                let (decorators, receivers) = extract::extract_decorators(
                    pass,
                    &mut prop.decorators,
                    &mut state.uids,
                    &mut state.element_memos,
                    ctx,
                );
                let name = resolve_key_name(pass, &mut state, &mut prop.key, ctx);
                let init = state.new_uid(&format!("init_{}", name.hint()), ctx);
                let mut args = vec![builder::this_expr(ctx)];
                if let Some(value) = prop.value.take() {
                    args.push(value);
                }
                prop.value = Some(builder::call(init.create_read_expression(ctx), args, ctx));
                let closures = if is_private {
                    if let (NameValue::Literal(name), false) = (&name, is_static) {
                        state.brand_name = Some(*name);
                    }
                    let storage = match &name {
                        NameValue::Literal(name) => *name,
                        NameValue::Computed(_) => ctx.ast.atom(""),
                    };
                    let (getter, setter) =
                        extract::private_access_closures(storage, class_scope, ctx);
                    vec![getter, setter]
                } else {
                    vec![]
                };
                class.body.body.push(ClassElement::PropertyDefinition(prop));
                state.infos.push(DecoratorInfo {
                    kind: DecoratorKind::Field,
                    is_static,
                    is_private,
                    name,
                    decorators,
                    decorators_this: receivers,
                    private_closures: closures,
                    locals: vec![init],
                    source_index: index,
                });
            }
            ClassElement::MethodDefinition(mut method)
                if (class_decorated || element_decorated) && method.computed =>
            {
                // Keep computed-key evaluation interleaved with decorator
                // evaluation by memoizing it in place.
                resolve_key_name(pass, &mut state, &mut method.key, ctx);
                class.body.body.push(ClassElement::MethodDefinition(method));
            }
            ClassElement::PropertyDefinition(mut prop)
                if (class_decorated || element_decorated) && prop.computed =>
            {
                resolve_key_name(pass, &mut state, &mut prop.key, ctx);
                class.body.body.push(ClassElement::PropertyDefinition(prop));
            }
            other => class.body.body.push(other),
        }
    }

    // Class decorators evaluate before static state initializes, so statics
    // leave the class and re-run against the decorated result.
    if class_decorated {
        let body = mem::replace(&mut class.body.body, ctx.ast.vec());
        for element in body {
            let is_static_element = match &element {
                ClassElement::StaticBlock(_) => true,
                ClassElement::MethodDefinition(m) => m.r#static,
                ClassElement::PropertyDefinition(p) => p.r#static,
                ClassElement::AccessorProperty(a) => a.r#static,
                _ => false,
            };
            if is_static_element {
                let mut element = element;
                if let Some(var_id) = &state.var_id {
                    this_rewrite::rewrite_moved_static_this(&mut element, var_id, ctx);
                }
                state.moved_statics.push(element);
            } else {
                class.body.body.push(element);
            }
        }
    }

    emit::emit_decoration(pass, &mut state, class, ctx);

    validate::check_readonly_private_methods(class, &state.readonly_private, &mut pass.errors);
    for element in &state.moved_statics {
        validate::check_readonly_private_in_element(element, &state.readonly_private, &mut pass.errors);
    }

    state
}

/// The decoration-array name for an element key. Computed keys are memoized
/// through `toPropertyKey` and the key is rewritten to read the local.
pub(super) fn resolve_key_name<'a>(
    pass: &mut DecoratorLowering<'a>,
    state: &mut ClassState<'a>,
    key: &mut PropertyKey<'a>,
    ctx: Ctx<'a, '_>,
) -> NameValue<'a> {
    match key {
        PropertyKey::PrivateIdentifier(ident) => NameValue::Literal(ident.name),
        PropertyKey::StaticIdentifier(ident) => NameValue::Literal(ident.name),
        PropertyKey::StringLiteral(lit) => NameValue::Literal(lit.value),
        PropertyKey::NumericLiteral(lit) => {
            NameValue::Literal(ctx.ast.atom(&lit.value.to_string()))
        }
        _ => {
            let Some(expr) = key.as_expression_mut() else {
                return NameValue::Literal(Atom::from(""));
            };
            let binding = state.new_uid("computedKey", ctx);
            let to_property_key = pass.helper(Helper::ToPropertyKey);
            let call = builder::call(
                builder::ident_ref(to_property_key, ctx),
                vec![expr.take_in(ctx.ast)],
                ctx,
            );
            state.element_memos.push(builder::assign_to(&binding, call, ctx));
            *expr = binding.create_read_expression(ctx);
            NameValue::Computed(binding)
        }
    }
}

/// `export { local }` / `export { local as default }`
fn export_specifier_statement<'a>(
    local: Atom<'a>,
    as_default: bool,
    ctx: Ctx<'a, '_>,
) -> Statement<'a> {
    let local = ModuleExportName::IdentifierReference(ctx.ast.identifier_reference(SPAN, local));
    let exported_name = if as_default { ctx.ast.atom("default") } else { local_name_of(&local) };
    let exported = ModuleExportName::IdentifierName(ctx.ast.identifier_name(SPAN, exported_name));
    let specifier = ctx.ast.export_specifier(SPAN, local, exported, ImportOrExportKind::Value);
    let specifiers = ctx.ast.vec1(specifier);
    Statement::ExportNamedDeclaration(ctx.ast.alloc(ExportNamedDeclaration {
        span: SPAN,
        declaration: None,
        specifiers,
        source: None,
        export_kind: ImportOrExportKind::Value,
        with_clause: None,
    }))
}

fn local_name_of<'a>(name: &ModuleExportName<'a>) -> Atom<'a> {
    match name {
        ModuleExportName::IdentifierReference(ident) => ident.name,
        ModuleExportName::IdentifierName(ident) => ident.name,
        ModuleExportName::StringLiteral(lit) => lit.value,
    }
}

/// Rebuilds the original statement shape for classes that were only touched
/// by accessor desugaring (no decoration, so no export split).
fn rewrap_declaration<'a>(
    class: ArenaBox<'a, Class<'a>>,
    shape: ExportShape,
    ctx: Ctx<'a, '_>,
) -> Statement<'a> {
    match shape {
        ExportShape::None => Statement::ClassDeclaration(class),
        ExportShape::Named => {
            Statement::ExportNamedDeclaration(ctx.ast.alloc(ExportNamedDeclaration {
                span: SPAN,
                declaration: Some(Declaration::ClassDeclaration(class)),
                specifiers: ctx.ast.vec(),
                source: None,
                export_kind: ImportOrExportKind::Value,
                with_clause: None,
            }))
        }
        ExportShape::Default => {
            Statement::ExportDefaultDeclaration(ctx.ast.alloc(ExportDefaultDeclaration {
                span: SPAN,
                declaration: ExportDefaultDeclarationKind::ClassDeclaration(class),
            }))
        }
    }
}
