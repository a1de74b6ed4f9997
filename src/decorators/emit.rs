//! Emission.
//!
//! Builds the `applyDecs*` call and its minimized destructuring pattern,
//! prepends the decoration static block so it runs before any surviving
//! static initializer, threads the proto-init thunk into instance
//! construction, and assembles the identity-extending wrapper that re-homes
//! static state when the class itself is decorated.

use std::mem;

use oxc_allocator::Box as ArenaBox;
use oxc_ast::ast::*;
use oxc_ast::NONE;
use oxc_span::SPAN;
use oxc_syntax::scope::ScopeFlags;
use oxc_traverse::BoundIdentifier;

use crate::helpers::Helper;

use super::class_lowering::ClassState;
use super::element::sort_for_emission;
use super::{builder, extract, this_rewrite, Ctx, DecoratorLowering};

/// Builds the decoration call and installs it as the class's leading static
/// block, then wires the init thunks into the surviving body.
pub(super) fn emit_decoration<'a>(
    pass: &mut DecoratorLowering<'a>,
    state: &mut ClassState<'a>,
    class: &mut Class<'a>,
    ctx: Ctx<'a, '_>,
) {
    if state.infos.is_empty() && !state.class_decorated {
        return;
    }

    sort_for_emission(&mut state.infos);

    if state.needs_proto_init {
        state.proto_init = Some(state.new_uid("initProto", ctx));
    }
    if state.needs_static_init {
        state.static_init = Some(state.new_uid("initStatic", ctx));
    }

    // Decoration array, one tuple per element in bucket order.
    let mut tuples = Vec::with_capacity(state.infos.len());
    for info in &mut state.infos {
        let decorators = mem::take(&mut info.decorators);
        let receivers = mem::take(&mut info.decorators_this);
        let closures = mem::take(&mut info.private_closures);
        let has_receiver = receivers.iter().any(Option::is_some);
        let decs_entry = if has_receiver {
            let mut pairs = Vec::with_capacity(decorators.len() * 2);
            for (decorator, receiver) in decorators.into_iter().zip(receivers) {
                pairs.push(receiver.unwrap_or_else(|| builder::void_0(ctx)));
                pairs.push(decorator);
            }
            builder::array(pairs, ctx)
        } else if decorators.len() == 1 {
            let mut decorators = decorators;
            decorators.pop().unwrap_or_else(|| builder::void_0(ctx))
        } else {
            builder::array(decorators, ctx)
        };
        let flag = pass.policy.element_flag(info.kind as u8, info.is_static, has_receiver);
        let mut items = vec![
            decs_entry,
            builder::number_literal(f64::from(flag), ctx),
            info.name.to_expression(ctx),
        ];
        items.extend(closures);
        tuples.push(builder::array(items, ctx));
    }
    let element_decs = builder::array(tuples, ctx);

    // Class decorators are extracted here, not during the survey: they
    // evaluate before element decorators, so their memo assignments must
    // come first.
    let (class_decs, class_has_receiver) = if state.class_decorated {
        let (mut exprs, receivers) = extract::extract_decorators(
            pass,
            &mut class.decorators,
            &mut state.uids,
            &mut state.class_memos,
            ctx,
        );
        let has_receiver = receivers.iter().any(Option::is_some);
        if has_receiver {
            let mut pairs = Vec::with_capacity(exprs.len() * 2);
            for (decorator, receiver) in exprs.into_iter().zip(receivers) {
                pairs.push(receiver.unwrap_or_else(|| builder::void_0(ctx)));
                pairs.push(decorator);
            }
            exprs = pairs;
        }
        (builder::array(exprs, ctx), has_receiver)
    } else {
        (builder::array(vec![], ctx), false)
    };

    // Locals, in destructuring order: per-element slices, proto-init,
    // static-init; class locals are the decorated class and its init thunk.
    let mut element_locals: Vec<BoundIdentifier<'a>> = Vec::new();
    for info in &state.infos {
        element_locals.extend(info.locals.iter().cloned());
    }
    if let Some(proto_init) = &state.proto_init {
        element_locals.push(proto_init.clone());
    }
    if let Some(static_init) = &state.static_init {
        element_locals.push(static_init.clone());
    }
    let mut class_locals: Vec<BoundIdentifier<'a>> = Vec::new();
    if state.class_decorated {
        if let Some(var_id) = &state.var_id {
            class_locals.push(var_id.clone());
        }
        if let Some(class_init) = &state.class_init {
            class_locals.push(class_init.clone());
        }
    }

    let this_arg = match &state.bind_name {
        Some(name) => {
            let name_expr = name.to_expression(ctx);
            let set_function_name = pass.helper(Helper::SetFunctionName);
            builder::call(
                builder::ident_ref(set_function_name, ctx),
                vec![builder::this_expr(ctx), name_expr],
                ctx,
            )
        }
        None => builder::this_expr(ctx),
    };

    let mut args = vec![this_arg, element_decs, class_decs];
    if pass.policy.class_decs_flag {
        args.push(builder::number_literal(if class_has_receiver { 1.0 } else { 0.0 }, ctx));
    }
    let brand = if pass.policy.brand_check {
        state.brand_name.map(|name| builder::brand_check_arrow(name, ctx))
    } else {
        None
    };
    let super_arg = if pass.policy.pass_super_class && class.super_class.is_some() {
        state.super_template.as_ref().map(|template| builder::clone_expr(template, ctx))
    } else {
        None
    };
    match (brand, super_arg) {
        (None, None) => {}
        (Some(brand), None) => args.push(brand),
        (None, Some(super_arg)) => {
            args.push(builder::void_0(ctx));
            args.push(super_arg);
        }
        (Some(brand), Some(super_arg)) => {
            args.push(brand);
            args.push(super_arg);
        }
    }

    let helper = pass.policy.helper;
    let helper_name = pass.helper(helper);
    let call = builder::call(builder::ident_ref(helper_name, ctx), args, ctx);

    // Minimized destructuring.
    let assignment = if pass.policy.flat_result {
        let mut all = element_locals;
        all.extend(class_locals);
        let target = builder::array_target(&all, ctx);
        ctx.ast.expression_assignment(SPAN, AssignmentOperator::Assign, target, call)
    } else if class_locals.is_empty() {
        let target = builder::array_target(&element_locals, ctx);
        let source = builder::member(call, "e", ctx);
        ctx.ast.expression_assignment(SPAN, AssignmentOperator::Assign, target, source)
    } else if element_locals.is_empty() {
        let target = builder::array_target(&class_locals, ctx);
        let source = builder::member(call, "c", ctx);
        ctx.ast.expression_assignment(SPAN, AssignmentOperator::Assign, target, source)
    } else {
        let target = builder::e_c_object_target(
            builder::array_target(&element_locals, ctx),
            builder::array_target(&class_locals, ctx),
            ctx,
        );
        ctx.ast.expression_assignment(SPAN, AssignmentOperator::Assign, target, call)
    };

    let mut block_stmts = ctx.ast.vec1(builder::expr_statement(assignment, ctx));
    if let Some(static_init) = &state.static_init {
        let run = builder::call(
            static_init.create_read_expression(ctx),
            vec![builder::this_expr(ctx)],
            ctx,
        );
        block_stmts.push(builder::expr_statement(run, ctx));
    }
    let block = builder::static_block(block_stmts, state.class_scope, ctx);
    class.body.body.insert(0, block);

    if let Some(proto_init) = state.proto_init.clone() {
        thread_proto_init(class, &proto_init, state, ctx);
    }

    // No statics to re-home: the class-init thunk runs from a trailing
    // static block instead of a wrapper constructor.
    if state.class_decorated && state.moved_statics.is_empty() {
        if let Some(class_init) = &state.class_init {
            let run = builder::call(class_init.create_read_expression(ctx), vec![], ctx);
            let stmts = ctx.ast.vec1(builder::expr_statement(run, ctx));
            class.body.body.push(builder::static_block(stmts, state.class_scope, ctx));
        }
    }
}

/// Routes the proto-init thunk into instance construction: through the first
/// instance field initializer, else around the constructor's `super` call
/// (or at its top), else via a synthesized constructor.
fn thread_proto_init<'a>(
    class: &mut Class<'a>,
    proto_init: &BoundIdentifier<'a>,
    state: &ClassState<'a>,
    ctx: Ctx<'a, '_>,
) {
    for element in class.body.body.iter_mut() {
        let ClassElement::PropertyDefinition(prop) = element else { continue };
        if prop.r#static {
            continue;
        }
        let run = builder::call(
            proto_init.create_read_expression(ctx),
            vec![builder::this_expr(ctx)],
            ctx,
        );
        let value = match prop.value.take() {
            Some(value) => builder::sequence(vec![run, value], ctx),
            None => builder::sequence(vec![run, builder::void_0(ctx)], ctx),
        };
        prop.value = Some(value);
        return;
    }

    let has_super = class.super_class.is_some();
    for element in class.body.body.iter_mut() {
        let ClassElement::MethodDefinition(method) = element else { continue };
        if method.kind != MethodDefinitionKind::Constructor {
            continue;
        }
        if has_super {
            this_rewrite::wrap_super_calls_with_init(&mut method.value, proto_init, ctx);
        } else if let Some(body) = &mut method.value.body {
            let run = builder::call(
                proto_init.create_read_expression(ctx),
                vec![builder::this_expr(ctx)],
                ctx,
            );
            body.statements.insert(0, builder::expr_statement(run, ctx));
        }
        return;
    }

    // No field, no constructor: synthesize one.
    let constructor = if has_super {
        synthesized_derived_constructor(proto_init, state, ctx)
    } else {
        let run = builder::call(
            proto_init.create_read_expression(ctx),
            vec![builder::this_expr(ctx)],
            ctx,
        );
        let stmts = ctx.ast.vec1(builder::expr_statement(run, ctx));
        builder::plain_function(FunctionType::FunctionExpression, vec![], stmts, state.class_scope, ctx)
    };
    class.body.body.push(builder::method_element(
        builder::static_key(ctx.ast.atom("constructor"), ctx),
        constructor,
        MethodDefinitionKind::Constructor,
        false,
        false,
        ctx,
    ));
}

/// `constructor(...args) { _initProto(super(...args)); }`
fn synthesized_derived_constructor<'a>(
    proto_init: &BoundIdentifier<'a>,
    state: &ClassState<'a>,
    ctx: Ctx<'a, '_>,
) -> ArenaBox<'a, Function<'a>> {
    let scope_id =
        ctx.create_child_scope(state.class_scope, ScopeFlags::Function | ScopeFlags::StrictMode);
    let rest = ctx.ast.alloc_binding_rest_element(SPAN, builder::unbound_pattern("args", ctx));
    let params = ctx.ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::FormalParameter,
        ctx.ast.vec(),
        Some(rest),
    );
    let spread =
        Argument::SpreadElement(ctx.ast.alloc_spread_element(SPAN, builder::ident_ref("args", ctx)));
    let super_call = ctx.ast.expression_call(
        SPAN,
        ctx.ast.expression_super(SPAN),
        NONE,
        ctx.ast.vec1(spread),
        false,
    );
    let run = builder::call(proto_init.create_read_expression(ctx), vec![super_call], ctx);
    let stmts = ctx.ast.vec1(builder::expr_statement(run, ctx));
    let body = ctx.ast.alloc_function_body(SPAN, ctx.ast.vec(), stmts);
    ctx.ast.alloc_function_with_scope_id(
        SPAN,
        FunctionType::FunctionExpression,
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

/// The final value shape for a class-decorated class.
///
/// Without static state: `(class Name { … }, _Name)`, assigned to the outer
/// binding in statement position. With static state, the wrapper form:
///
/// ```js
/// new (class extends _identity {
///   static { Name = (class Name { … }, _Name); }
///   /* moved static members */
///   constructor() { super(Name); /* moved static blocks */ _initClass(); }
/// })(Name)
/// ```
pub(super) fn finish_class_decoration<'a>(
    pass: &mut DecoratorLowering<'a>,
    state: &mut ClassState<'a>,
    mut class: ArenaBox<'a, Class<'a>>,
    outer: Option<&BoundIdentifier<'a>>,
    ctx: Ctx<'a, '_>,
) -> Expression<'a> {
    class.r#type = ClassType::ClassExpression;
    let Some(var_id) = state.var_id.clone() else {
        return Expression::ClassExpression(class);
    };

    let inner = builder::sequence(
        vec![Expression::ClassExpression(class), var_id.create_read_expression(ctx)],
        ctx,
    );

    if state.moved_statics.is_empty() {
        return match outer {
            Some(binding) => builder::assign_to(binding, inner, ctx),
            None => inner,
        };
    }

    let wrapper_scope = ctx.create_child_scope_of_current(ScopeFlags::StrictMode);
    let evaluate = match outer {
        Some(binding) => builder::assign_to(binding, inner, ctx),
        None => inner,
    };
    let evaluate_block = builder::static_block(
        ctx.ast.vec1(builder::expr_statement(evaluate, ctx)),
        wrapper_scope,
        ctx,
    );

    let mut elements = ctx.ast.vec();
    elements.push(evaluate_block);

    // The binding the decorated class ends up in: the hoisted outer binding
    // in statement position, the var-id local otherwise.
    let final_class = match outer {
        Some(binding) => binding,
        None => &var_id,
    };

    let ctor_scope =
        ctx.create_child_scope(wrapper_scope, ScopeFlags::Function | ScopeFlags::StrictMode);
    let mut ctor_stmts = ctx.ast.vec();
    let super_arg = final_class.create_read_expression(ctx);
    let super_call = ctx.ast.expression_call(
        SPAN,
        ctx.ast.expression_super(SPAN),
        NONE,
        ctx.ast.vec1(Argument::from(super_arg)),
        false,
    );
    ctor_stmts.push(builder::expr_statement(super_call, ctx));

    // Moved static blocks re-run as IIFEs in source order; moved members
    // become members of the wrapper.
    for element in mem::take(&mut state.moved_statics) {
        match element {
            ClassElement::StaticBlock(block) => {
                let block = block.unbox();
                let run = builder::iife(block.body, ctor_scope, ctx);
                ctor_stmts.push(builder::expr_statement(run, ctx));
            }
            member => elements.push(member),
        }
    }

    if let Some(class_init) = &state.class_init {
        let run = builder::call(class_init.create_read_expression(ctx), vec![], ctx);
        ctor_stmts.push(builder::expr_statement(run, ctx));
    }

    let params = ctx.ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::FormalParameter,
        ctx.ast.vec(),
        NONE,
    );
    let ctor_body = ctx.ast.alloc_function_body(SPAN, ctx.ast.vec(), ctor_stmts);
    let constructor = ctx.ast.alloc_function_with_scope_id(
        SPAN,
        FunctionType::FunctionExpression,
        None,
        false,
        false,
        false,
        NONE,
        NONE,
        params,
        NONE,
        Some(ctor_body),
        ctor_scope,
    );
    elements.push(builder::method_element(
        builder::static_key(ctx.ast.atom("constructor"), ctx),
        constructor,
        MethodDefinitionKind::Constructor,
        false,
        false,
        ctx,
    ));

    let identity = pass.helper(Helper::Identity);
    let body = ctx.ast.alloc_class_body(SPAN, elements);
    let wrapper = ctx.ast.expression_class_with_scope_id(
        SPAN,
        ClassType::ClassExpression,
        ctx.ast.vec(),
        None,
        NONE,
        Some(builder::ident_ref(identity, ctx)),
        NONE,
        ctx.ast.vec(),
        body,
        false,
        false,
        wrapper_scope,
    );

    let new_arg = final_class.create_read_expression(ctx);
    let instantiate =
        ctx.ast.expression_new(SPAN, wrapper, NONE, ctx.ast.vec1(Argument::from(new_arg)));

    match outer {
        Some(_) => instantiate,
        None => builder::sequence(
            vec![instantiate, var_id.create_read_expression(ctx)],
            ctx,
        ),
    }
}
