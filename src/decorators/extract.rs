//! Decorator expression extraction.
//!
//! Decorator expressions leave their syntactic position and re-evaluate
//! inside the decoration call, so anything with unstable effects is memoized
//! into a fresh local assigned immediately before the class. Member
//! expressions additionally keep their receiver under receiver-tracking
//! revisions. Decorated private methods are pulled out of the class body
//! entirely: the runtime decorates an extracted function expression while
//! the class keeps a call-thunk in the method's place.

use std::mem;

use oxc_allocator::{Box as ArenaBox, TakeIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_span::{Atom, SPAN};
use oxc_syntax::scope::ScopeId;
use oxc_traverse::BoundIdentifier;

use super::element::DecoratorKind;
use super::this_rewrite::{self, SuperSpec};
use super::{builder, Ctx, DecoratorLowering};

/// An expression with no observable effect whose value cannot change before
/// class evaluation: `this`, or a reference to a binding that is never
/// written.
pub fn is_scope_constant<'a>(expr: &Expression<'a>, ctx: Ctx<'a, '_>) -> bool {
    match expr {
        Expression::ThisExpression(_) => true,
        Expression::Identifier(ident) => {
            let Some(reference_id) = ident.reference_id.get() else { return false };
            let Some(symbol_id) = ctx.scoping().get_reference(reference_id).symbol_id() else {
                return false;
            };
            !ctx.scoping().get_resolved_references(symbol_id).any(|reference| reference.is_write())
        }
        _ => false,
    }
}

/// Drains a decorator list into parallel (expression, receiver) sequences.
/// Memoization assignments are appended to `memos` in evaluation order and
/// their locals to `uids`.
pub fn extract_decorators<'a>(
    pass: &mut DecoratorLowering<'a>,
    decorators: &mut ArenaVec<'a, Decorator<'a>>,
    uids: &mut Vec<BoundIdentifier<'a>>,
    memos: &mut Vec<Expression<'a>>,
    ctx: Ctx<'a, '_>,
) -> (Vec<Expression<'a>>, Vec<Option<Expression<'a>>>) {
    let track_receivers = pass.policy.track_receivers;
    let list = mem::replace(decorators, ctx.ast.vec());
    let mut exprs = Vec::with_capacity(list.len());
    let mut receivers = Vec::with_capacity(list.len());
    for decorator in list {
        let mut expr = decorator.expression;
        let mut receiver = None;
        if track_receivers {
            receiver = match &mut expr {
                Expression::StaticMemberExpression(member) => {
                    Some(receiver_for_object(&mut member.object, uids, memos, ctx))
                }
                Expression::ComputedMemberExpression(member) => {
                    Some(receiver_for_object(&mut member.object, uids, memos, ctx))
                }
                _ => None,
            };
        }
        let expr = if is_scope_constant(&expr, ctx) {
            expr
        } else {
            let binding = builder::uid("dec", ctx);
            memos.push(builder::assign_to(&binding, expr, ctx));
            uids.push(binding.clone());
            binding.create_read_expression(ctx)
        };
        exprs.push(expr);
        receivers.push(receiver);
    }
    (exprs, receivers)
}

/// The receiver for a member-expression decorator. `super.x` keeps `this`;
/// other objects are cloned when stable and memoized otherwise (the member
/// expression is rewritten to read the memoized object).
fn receiver_for_object<'a>(
    object: &mut Expression<'a>,
    uids: &mut Vec<BoundIdentifier<'a>>,
    memos: &mut Vec<Expression<'a>>,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    if matches!(object, Expression::Super(_)) {
        return builder::this_expr(ctx);
    }
    if is_scope_constant(object, ctx) {
        return builder::clone_expr(object, ctx);
    }
    let binding = builder::uid("obj", ctx);
    let original = object.take_in(ctx.ast);
    memos.push(builder::assign_to(&binding, original, ctx));
    *object = binding.create_read_expression(ctx);
    uids.push(binding.clone());
    binding.create_read_expression(ctx)
}

/// The access pair carried in the decoration tuple of a private field or
/// private accessor: closures over `this.#<storage>`.
pub fn private_access_closures<'a>(
    storage: Atom<'a>,
    class_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> (Expression<'a>, Expression<'a>) {
    let read = builder::private_field(builder::this_expr(ctx), storage, ctx);
    let getter_stmts = ctx.ast.vec1(builder::return_statement(read, ctx));
    let getter = builder::function_expression(vec![], getter_stmts, class_scope, ctx);

    let target = AssignmentTarget::PrivateFieldExpression(ctx.ast.alloc_private_field_expression(
        SPAN,
        builder::this_expr(ctx),
        ctx.ast.private_identifier(SPAN, storage),
        false,
    ));
    let setter_stmts =
        ctx.ast.vec1(builder::assignment_statement(target, builder::ident_ref("v", ctx), ctx));
    let setter = builder::function_expression(
        vec![builder::unbound_pattern("v", ctx)],
        setter_stmts,
        class_scope,
        ctx,
    );
    (getter, setter)
}

pub struct ExtractedPrivateMethod<'a> {
    /// What takes the method's place in the class body.
    pub replacement: ClassElement<'a>,
    /// The original body as a function expression, `super` rewritten; goes
    /// into the decoration tuple.
    pub callable: Expression<'a>,
    /// The local the runtime's decorated callable is destructured into.
    pub local: BoundIdentifier<'a>,
}

/// Pulls a decorated private method out of the class.
///
/// `#m() {}` becomes the private field `#m = _call_m`; `get #g()` /
/// `set #s(v)` keep their accessor shape but delegate to the thunk local.
pub fn extract_private_method<'a>(
    method: ArenaBox<'a, MethodDefinition<'a>>,
    kind: DecoratorKind,
    super_spec: Option<&SuperSpec<'a>>,
    class_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> ExtractedPrivateMethod<'a> {
    let method = method.unbox();
    let name = match &method.key {
        PropertyKey::PrivateIdentifier(ident) => ident.name,
        // Private names cannot be computed.
        _ => Atom::from(""),
    };
    let is_static = method.r#static;

    let mut function = method.value;
    if let Some(spec) = super_spec {
        this_rewrite::rewrite_super_in_function(&mut function, spec, is_static, ctx);
    }
    function.r#type = FunctionType::FunctionExpression;
    function.id = None;
    let callable = Expression::FunctionExpression(function);

    let (local, replacement) = match kind {
        DecoratorKind::Getter => {
            let local = builder::uid(&format!("get_{name}"), ctx);
            let body = builder::call(
                local.create_read_expression(ctx),
                vec![builder::this_expr(ctx)],
                ctx,
            );
            let stmts = ctx.ast.vec1(builder::return_statement(body, ctx));
            let function = builder::plain_function(
                FunctionType::FunctionExpression,
                vec![],
                stmts,
                class_scope,
                ctx,
            );
            let element = builder::method_element(
                builder::private_key(name, ctx),
                function,
                MethodDefinitionKind::Get,
                is_static,
                false,
                ctx,
            );
            (local, element)
        }
        DecoratorKind::Setter => {
            let local = builder::uid(&format!("set_{name}"), ctx);
            let body = builder::call(
                local.create_read_expression(ctx),
                vec![builder::this_expr(ctx), builder::ident_ref("v", ctx)],
                ctx,
            );
            let stmts = ctx.ast.vec1(builder::expr_statement(body, ctx));
            let function = builder::plain_function(
                FunctionType::FunctionExpression,
                vec![builder::unbound_pattern("v", ctx)],
                stmts,
                class_scope,
                ctx,
            );
            let element = builder::method_element(
                builder::private_key(name, ctx),
                function,
                MethodDefinitionKind::Set,
                is_static,
                false,
                ctx,
            );
            (local, element)
        }
        _ => {
            let local = builder::uid(&format!("call_{name}"), ctx);
            let element = builder::property_element(
                builder::private_key(name, ctx),
                Some(local.create_read_expression(ctx)),
                is_static,
                false,
                ctx,
            );
            (local, element)
        }
    };

    ExtractedPrivateMethod { replacement, callable, local }
}
