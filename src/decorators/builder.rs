//! Small AST construction utilities shared by the lowering phases.
//!
//! Everything synthesized carries `SPAN`; fresh bindings go through the
//! traversal context so they are registered with the scoping tables at
//! allocation time.

use oxc_allocator::{Box as ArenaBox, CloneIn, Vec as ArenaVec};
use oxc_ast::{ast::*, NONE};
use oxc_span::{Atom, SPAN};
use oxc_syntax::scope::{ScopeFlags, ScopeId};
use oxc_syntax::symbol::SymbolFlags;
use oxc_traverse::BoundIdentifier;

use super::Ctx;

pub fn uid<'a>(name: &str, ctx: Ctx<'a, '_>) -> BoundIdentifier<'a> {
    ctx.generate_uid_in_current_scope(name, SymbolFlags::BlockScopedVariable)
}

pub fn ident_ref<'a>(name: &str, ctx: Ctx<'a, '_>) -> Expression<'a> {
    let name = ctx.ast.atom(name);
    ctx.ast.expression_identifier(SPAN, name)
}

pub fn string_literal<'a>(value: Atom<'a>, ctx: Ctx<'a, '_>) -> Expression<'a> {
    ctx.ast.expression_string_literal(SPAN, value, None)
}

pub fn number_literal<'a>(value: f64, ctx: Ctx<'a, '_>) -> Expression<'a> {
    ctx.ast.expression_numeric_literal(SPAN, value, None, NumberBase::Decimal)
}

pub fn void_0<'a>(ctx: Ctx<'a, '_>) -> Expression<'a> {
    let zero = number_literal(0.0, ctx);
    ctx.ast.expression_unary(SPAN, UnaryOperator::Void, zero)
}

pub fn this_expr<'a>(ctx: Ctx<'a, '_>) -> Expression<'a> {
    ctx.ast.expression_this(SPAN)
}

pub fn clone_expr<'a>(expr: &Expression<'a>, ctx: Ctx<'a, '_>) -> Expression<'a> {
    expr.clone_in(ctx.ast.allocator)
}

pub fn call<'a>(
    callee: Expression<'a>,
    args: Vec<Expression<'a>>,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    let args = ctx.ast.vec_from_iter(args.into_iter().map(Argument::from));
    ctx.ast.expression_call(SPAN, callee, NONE, args, false)
}

pub fn array<'a>(elements: Vec<Expression<'a>>, ctx: Ctx<'a, '_>) -> Expression<'a> {
    let elements =
        ctx.ast.vec_from_iter(elements.into_iter().map(ArrayExpressionElement::from));
    ctx.ast.expression_array(SPAN, elements)
}

pub fn sequence<'a>(exprs: Vec<Expression<'a>>, ctx: Ctx<'a, '_>) -> Expression<'a> {
    let exprs = ctx.ast.vec_from_iter(exprs);
    ctx.ast.expression_sequence(SPAN, exprs)
}

pub fn expr_statement<'a>(expr: Expression<'a>, ctx: Ctx<'a, '_>) -> Statement<'a> {
    ctx.ast.statement_expression(SPAN, expr)
}

pub fn write_target<'a>(binding: &BoundIdentifier<'a>, ctx: Ctx<'a, '_>) -> AssignmentTarget<'a> {
    let reference = binding.create_write_reference(ctx);
    AssignmentTarget::AssignmentTargetIdentifier(ctx.ast.alloc(reference))
}

/// `<binding> = <value>`
pub fn assign_to<'a>(
    binding: &BoundIdentifier<'a>,
    value: Expression<'a>,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    let target = write_target(binding, ctx);
    ctx.ast.expression_assignment(SPAN, AssignmentOperator::Assign, target, value)
}

/// `let <a>, <b>, …;` without initializers.
pub fn let_declaration<'a>(bindings: &[BoundIdentifier<'a>], ctx: Ctx<'a, '_>) -> Statement<'a> {
    let mut declarators = ctx.ast.vec_with_capacity(bindings.len());
    for binding in bindings {
        let pattern = binding_pattern_of(binding, ctx);
        declarators.push(ctx.ast.variable_declarator(
            SPAN,
            VariableDeclarationKind::Let,
            pattern,
            None,
            false,
        ));
    }
    Statement::from(ctx.ast.declaration_variable(
        SPAN,
        VariableDeclarationKind::Let,
        declarators,
        false,
    ))
}

pub fn binding_pattern_of<'a>(
    binding: &BoundIdentifier<'a>,
    ctx: Ctx<'a, '_>,
) -> BindingPattern<'a> {
    let ident = binding.create_binding_identifier(ctx);
    let kind = BindingPatternKind::BindingIdentifier(ctx.ast.alloc(ident));
    ctx.ast.binding_pattern(kind, NONE, false)
}

/// A binding pattern for a plain, unresolved parameter name.
pub fn unbound_pattern<'a>(name: &str, ctx: Ctx<'a, '_>) -> BindingPattern<'a> {
    let name = ctx.ast.atom(name);
    let ident = ctx.ast.binding_identifier(SPAN, name);
    let kind = BindingPatternKind::BindingIdentifier(ctx.ast.alloc(ident));
    ctx.ast.binding_pattern(kind, NONE, false)
}

pub fn static_key<'a>(name: Atom<'a>, ctx: Ctx<'a, '_>) -> PropertyKey<'a> {
    ctx.ast.property_key_static_identifier(SPAN, name)
}

pub fn private_key<'a>(name: Atom<'a>, ctx: Ctx<'a, '_>) -> PropertyKey<'a> {
    let ident = ctx.ast.private_identifier(SPAN, name);
    PropertyKey::PrivateIdentifier(ctx.ast.alloc(ident))
}

/// `<object>.#<name>`
pub fn private_field<'a>(
    object: Expression<'a>,
    name: Atom<'a>,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    let field = ctx.ast.private_identifier(SPAN, name);
    Expression::PrivateFieldExpression(ctx.ast.alloc_private_field_expression(
        SPAN, object, field, false,
    ))
}

/// `<object>.<property>`
pub fn member<'a>(
    object: Expression<'a>,
    property: &str,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    let property = ctx.ast.identifier_name(SPAN, ctx.ast.atom(property));
    Expression::StaticMemberExpression(ctx.ast.alloc_static_member_expression(
        SPAN, object, property, false,
    ))
}

pub fn return_statement<'a>(argument: Expression<'a>, ctx: Ctx<'a, '_>) -> Statement<'a> {
    ctx.ast.statement_return(SPAN, Some(argument))
}

/// A plain `function (…) { … }` expression with its own function scope.
pub fn function_expression<'a>(
    params: Vec<BindingPattern<'a>>,
    stmts: ArenaVec<'a, Statement<'a>>,
    parent_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    let function = plain_function(FunctionType::FunctionExpression, params, stmts, parent_scope, ctx);
    Expression::FunctionExpression(function)
}

pub fn plain_function<'a>(
    r#type: FunctionType,
    params: Vec<BindingPattern<'a>>,
    stmts: ArenaVec<'a, Statement<'a>>,
    parent_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> ArenaBox<'a, Function<'a>> {
    let scope_id = ctx.create_child_scope(parent_scope, ScopeFlags::Function | ScopeFlags::StrictMode);
    let items = ctx.ast.vec_from_iter(params.into_iter().map(|pattern| {
        ctx.ast.formal_parameter(SPAN, ctx.ast.vec(), pattern, None, false, false)
    }));
    let params = ctx.ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::FormalParameter,
        items,
        NONE,
    );
    let body = ctx.ast.alloc_function_body(SPAN, ctx.ast.vec(), stmts);
    ctx.ast.alloc_function_with_scope_id(
        SPAN,
        r#type,
        None,
        false,
        false,
        false,
        NONE,
        NONE,
        params,
        NONE,
        Some(body),
        scope_id,
    )
}

/// `(() => { … })()`
pub fn iife<'a>(
    stmts: ArenaVec<'a, Statement<'a>>,
    parent_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    let scope_id =
        ctx.create_child_scope(parent_scope, ScopeFlags::Function | ScopeFlags::Arrow | ScopeFlags::StrictMode);
    let params = ctx.ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::ArrowFormalParameters,
        ctx.ast.vec(),
        NONE,
    );
    let body = ctx.ast.alloc_function_body(SPAN, ctx.ast.vec(), stmts);
    let arrow = ctx.ast.expression_arrow_function_expression_with_scope_id(
        SPAN, false, false, NONE, params, NONE, body, scope_id,
    );
    call(arrow, vec![], ctx)
}

/// `_ => #<name> in _`
pub fn brand_check_arrow<'a>(name: Atom<'a>, ctx: Ctx<'a, '_>) -> Expression<'a> {
    let scope_id = ctx.create_child_scope_of_current(
        ScopeFlags::Function | ScopeFlags::Arrow | ScopeFlags::StrictMode,
    );
    let param = unbound_pattern("_", ctx);
    let items = ctx
        .ast
        .vec1(ctx.ast.formal_parameter(SPAN, ctx.ast.vec(), param, None, false, false));
    let params = ctx.ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::ArrowFormalParameters,
        items,
        NONE,
    );
    let private = ctx.ast.private_identifier(SPAN, name);
    let check = ctx.ast.expression_private_in(SPAN, private, ident_ref("_", ctx));
    let stmts = ctx.ast.vec1(ctx.ast.statement_expression(SPAN, check));
    let body = ctx.ast.alloc_function_body(SPAN, ctx.ast.vec(), stmts);
    ctx.ast.expression_arrow_function_expression_with_scope_id(
        SPAN, true, false, NONE, params, NONE, body, scope_id,
    )
}

/// `static { … }` as a class element, scoped under the class.
pub fn static_block<'a>(
    stmts: ArenaVec<'a, Statement<'a>>,
    class_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> ClassElement<'a> {
    let scope_id = ctx.create_child_scope(class_scope, ScopeFlags::ClassStaticBlock);
    ctx.ast.class_element_static_block_with_scope_id(SPAN, stmts, scope_id)
}

pub fn method_element<'a>(
    key: PropertyKey<'a>,
    function: ArenaBox<'a, Function<'a>>,
    kind: MethodDefinitionKind,
    r#static: bool,
    computed: bool,
    ctx: Ctx<'a, '_>,
) -> ClassElement<'a> {
    ctx.ast.class_element_method_definition(
        SPAN,
        MethodDefinitionType::MethodDefinition,
        ctx.ast.vec(),
        key,
        function,
        kind,
        computed,
        r#static,
        false,
        false,
        None,
    )
}

pub fn property_element<'a>(
    key: PropertyKey<'a>,
    value: Option<Expression<'a>>,
    r#static: bool,
    computed: bool,
    ctx: Ctx<'a, '_>,
) -> ClassElement<'a> {
    ctx.ast.class_element_property_definition(
        SPAN,
        PropertyDefinitionType::PropertyDefinition,
        ctx.ast.vec(),
        key,
        NONE,
        value,
        computed,
        r#static,
        false,
        false,
        false,
        false,
        false,
        None,
    )
}

/// `[<a>, <b>, …]` as an assignment target.
pub fn array_target<'a>(
    bindings: &[BoundIdentifier<'a>],
    ctx: Ctx<'a, '_>,
) -> AssignmentTarget<'a> {
    let mut elements = ctx.ast.vec_with_capacity(bindings.len());
    for binding in bindings {
        let reference = binding.create_write_reference(ctx);
        elements.push(Some(AssignmentTargetMaybeDefault::AssignmentTargetIdentifier(
            ctx.ast.alloc(reference),
        )));
    }
    AssignmentTarget::ArrayAssignmentTarget(ctx.ast.alloc_array_assignment_target(
        SPAN, elements, None,
    ))
}

/// `{ e: [...], c: [...] }` as an assignment target.
pub fn e_c_object_target<'a>(
    element_target: AssignmentTarget<'a>,
    class_target: AssignmentTarget<'a>,
    ctx: Ctx<'a, '_>,
) -> AssignmentTarget<'a> {
    let mut properties = ctx.ast.vec_with_capacity(2);
    for (name, target) in [("e", element_target), ("c", class_target)] {
        let key = static_key(ctx.ast.atom(name), ctx);
        properties.push(AssignmentTargetProperty::AssignmentTargetPropertyProperty(
            ctx.ast.alloc_assignment_target_property_property(
                SPAN,
                key,
                AssignmentTargetMaybeDefault::from(target),
                false,
            ),
        ));
    }
    AssignmentTarget::ObjectAssignmentTarget(ctx.ast.alloc_object_assignment_target(
        SPAN, properties, None,
    ))
}

/// `<target> = <value>` as a statement.
pub fn assignment_statement<'a>(
    target: AssignmentTarget<'a>,
    value: Expression<'a>,
    ctx: Ctx<'a, '_>,
) -> Statement<'a> {
    let assign = ctx.ast.expression_assignment(SPAN, AssignmentOperator::Assign, target, value);
    expr_statement(assign, ctx)
}
