//! Auto-accessor desugaring.
//!
//! Every `accessor` member, decorated or not, becomes a fresh private
//! storage field plus a get/set pair over it, so later phases only ever see
//! one shape. Decorated accessors route through the runtime thunks instead:
//! the storage initializer calls `init_<name>`, and private accessors
//! delegate their get/set pair to the `get_<name>` / `set_<name>` locals.

use oxc_allocator::{Box as ArenaBox, CloneIn, TakeIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_span::SPAN;
use oxc_syntax::scope::ScopeId;

use crate::helpers::Helper;

use super::class_lowering::{resolve_key_name, ClassState};
use super::element::{DecoratorInfo, DecoratorKind, NameValue};
use super::{builder, extract, Ctx, DecoratorLowering};

pub(super) fn lower_accessor<'a>(
    pass: &mut DecoratorLowering<'a>,
    state: &mut ClassState<'a>,
    acc: ArenaBox<'a, AccessorProperty<'a>>,
    source_index: usize,
    out: &mut ArenaVec<'a, ClassElement<'a>>,
    ctx: Ctx<'a, '_>,
) {
    let mut acc = acc.unbox();
    let decorated = !acc.decorators.is_empty();
    let is_static = acc.r#static;
    let is_private = matches!(acc.key, PropertyKey::PrivateIdentifier(_));
    let class_scope = state.class_scope;

    // Decorators evaluate before the key does.
    let (decorators, receivers) = if decorated {
        extract::extract_decorators(
            pass,
            &mut acc.decorators,
            &mut state.uids,
            &mut state.element_memos,
            ctx,
        )
    } else {
        (vec![], vec![])
    };

    let name = if decorated {
        Some(resolve_key_name(pass, state, &mut acc.key, ctx))
    } else {
        memoize_unstable_key(pass, state, &mut acc.key, ctx);
        None
    };

    let hint = match &name {
        Some(name) => name.hint().to_string(),
        None => key_hint(&acc.key),
    };
    let storage = state.fresh_private_name(&hint, ctx);

    // The storage field keeps the accessor's position so initialization
    // order is unchanged.
    let init = if decorated {
        Some(state.new_uid(&format!("init_{hint}"), ctx))
    } else {
        None
    };
    let value = match &init {
        Some(init) => {
            let mut args = vec![builder::this_expr(ctx)];
            if let Some(value) = acc.value.take() {
                args.push(value);
            }
            Some(builder::call(init.create_read_expression(ctx), args, ctx))
        }
        None => acc.value.take(),
    };
    out.push(builder::property_element(
        builder::private_key(storage, ctx),
        value,
        is_static,
        false,
        ctx,
    ));

    // Under the newest revision a static accessor reads through the class
    // identifier rather than `this`, so a replaced class still hits the
    // original storage.
    let class_receiver = if is_static && pass.policy.track_receivers {
        state.self_binding.clone()
    } else {
        None
    };

    let mut locals = Vec::new();
    let mut closures = Vec::new();

    if decorated && is_private {
        let accessor_name = match &name {
            Some(NameValue::Literal(name)) => *name,
            // Private names cannot be computed.
            _ => storage,
        };
        if !is_static {
            state.brand_name = Some(accessor_name);
        }
        let get_local = state.new_uid(&format!("get_{hint}"), ctx);
        let set_local = state.new_uid(&format!("set_{hint}"), ctx);

        let get_body = builder::call(
            get_local.create_read_expression(ctx),
            vec![builder::this_expr(ctx)],
            ctx,
        );
        out.push(getter_element(
            builder::private_key(accessor_name, ctx),
            false,
            is_static,
            get_body,
            class_scope,
            ctx,
        ));
        let set_body = builder::call(
            set_local.create_read_expression(ctx),
            vec![builder::this_expr(ctx), builder::ident_ref("v", ctx)],
            ctx,
        );
        out.push(setter_element(
            builder::private_key(accessor_name, ctx),
            false,
            is_static,
            builder::expr_statement(set_body, ctx),
            class_scope,
            ctx,
        ));

        let (get_closure, set_closure) = extract::private_access_closures(storage, class_scope, ctx);
        locals.extend([get_local, set_local]);
        closures.extend([get_closure, set_closure]);
    } else {
        let get_key = acc.key.clone_in(ctx.ast.allocator);
        let set_key = acc.key.clone_in(ctx.ast.allocator);
        let get_recv = match &class_receiver {
            Some(binding) => binding.create_read_expression(ctx),
            None => builder::this_expr(ctx),
        };
        out.push(getter_element(
            get_key,
            acc.computed,
            is_static,
            builder::private_field(get_recv, storage, ctx),
            class_scope,
            ctx,
        ));
        let set_recv = match &class_receiver {
            Some(binding) => binding.create_read_expression(ctx),
            None => builder::this_expr(ctx),
        };
        let target = AssignmentTarget::PrivateFieldExpression(ctx.ast.alloc_private_field_expression(
            SPAN,
            set_recv,
            ctx.ast.private_identifier(SPAN, storage),
            false,
        ));
        let assign = builder::assignment_statement(target, builder::ident_ref("v", ctx), ctx);
        out.push(setter_element(set_key, acc.computed, is_static, assign, class_scope, ctx));
    }

    if decorated {
        if let Some(init) = init {
            locals.push(init);
        }
        state.infos.push(DecoratorInfo {
            kind: DecoratorKind::Accessor,
            is_static,
            is_private,
            name: name.unwrap_or(NameValue::Literal(storage)),
            decorators,
            decorators_this: receivers,
            private_closures: closures,
            locals,
            source_index,
        });
    }
}

fn getter_element<'a>(
    key: PropertyKey<'a>,
    computed: bool,
    is_static: bool,
    body: Expression<'a>,
    class_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> ClassElement<'a> {
    let stmts = ctx.ast.vec1(builder::return_statement(body, ctx));
    let function =
        builder::plain_function(FunctionType::FunctionExpression, vec![], stmts, class_scope, ctx);
    builder::method_element(key, function, MethodDefinitionKind::Get, is_static, computed, ctx)
}

fn setter_element<'a>(
    key: PropertyKey<'a>,
    computed: bool,
    is_static: bool,
    body: Statement<'a>,
    class_scope: ScopeId,
    ctx: Ctx<'a, '_>,
) -> ClassElement<'a> {
    let stmts = ctx.ast.vec1(body);
    let function = builder::plain_function(
        FunctionType::FunctionExpression,
        vec![builder::unbound_pattern("v", ctx)],
        stmts,
        class_scope,
        ctx,
    );
    builder::method_element(key, function, MethodDefinitionKind::Set, is_static, computed, ctx)
}

/// An undecorated accessor's computed key is evaluated twice (getter and
/// setter); a key with unstable effects is evaluated once through
/// `toPropertyKey` into a local both uses read.
fn memoize_unstable_key<'a>(
    pass: &mut DecoratorLowering<'a>,
    state: &mut ClassState<'a>,
    key: &mut PropertyKey<'a>,
    ctx: Ctx<'a, '_>,
) {
    if matches!(
        key,
        PropertyKey::StaticIdentifier(_)
            | PropertyKey::PrivateIdentifier(_)
            | PropertyKey::StringLiteral(_)
            | PropertyKey::NumericLiteral(_)
    ) {
        return;
    }
    let Some(expr) = key.as_expression_mut() else { return };
    if extract::is_scope_constant(expr, ctx) {
        return;
    }
    let binding = state.new_uid("computedKey", ctx);
    let to_property_key = pass.helper(Helper::ToPropertyKey);
    let call = builder::call(
        builder::ident_ref(to_property_key, ctx),
        vec![expr.take_in(ctx.ast)],
        ctx,
    );
    state.element_memos.push(builder::assign_to(&binding, call, ctx));
    *expr = binding.create_read_expression(ctx);
}

fn key_hint(key: &PropertyKey) -> String {
    match key {
        PropertyKey::StaticIdentifier(ident) => ident.name.to_string(),
        PropertyKey::PrivateIdentifier(ident) => ident.name.to_string(),
        PropertyKey::StringLiteral(lit) => lit.value.to_string(),
        _ => "computedKey".to_string(),
    }
}
