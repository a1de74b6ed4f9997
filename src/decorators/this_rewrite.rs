//! Reference redirection visitors.
//!
//! Three rewrites share the same per-reference, symbol-checked approach:
//!
//! 1. redirecting body references of a decorated class's name to the local
//!    that holds the decorated result;
//! 2. redirecting `this` inside static members and blocks that are moved out
//!    of a decorated class;
//! 3. rewriting `super.x` inside extracted private-method bodies, which lose
//!    their home object when they become plain function expressions.

use oxc_allocator::TakeIn;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk_mut, VisitMut};
use oxc_span::SPAN;
use oxc_syntax::scope::ScopeFlags;
use oxc_syntax::symbol::SymbolId;
use oxc_traverse::BoundIdentifier;

use super::{builder, Ctx};

/// Redirects references to the class's own name inside its body to `to`.
/// The class binding is reassigned by decoration, so body code must read the
/// local that holds the final class.
pub fn redirect_class_name_references<'a>(
    class: &mut Class<'a>,
    from: SymbolId,
    to: &BoundIdentifier<'a>,
    ctx: Ctx<'a, '_>,
) {
    let mut redirect = ClassNameRedirect { from, to, ctx };
    redirect.visit_class_body(&mut class.body);
}

struct ClassNameRedirect<'a, 'b, 'c> {
    from: SymbolId,
    to: &'b BoundIdentifier<'a>,
    ctx: Ctx<'a, 'c>,
}

impl<'a> VisitMut<'a> for ClassNameRedirect<'a, '_, '_> {
    fn visit_identifier_reference(&mut self, ident: &mut IdentifierReference<'a>) {
        let Some(reference_id) = ident.reference_id.get() else { return };
        let Some(symbol_id) = self.ctx.scoping().get_reference(reference_id).symbol_id() else {
            return;
        };
        if symbol_id != self.from {
            return;
        }
        ident.name = self.to.name;
        let scoping = self.ctx.scoping_mut();
        scoping.get_reference_mut(reference_id).set_symbol_id(self.to.symbol_id);
        scoping.delete_resolved_reference(symbol_id, reference_id);
        scoping.add_resolved_reference(self.to.symbol_id, reference_id);
    }
}

/// Redirects `this` at the top level of a static element that is being moved
/// out of its class. Function bodies keep their own `this`; nested classes
/// and static blocks do too.
pub fn rewrite_moved_static_this<'a>(
    element: &mut ClassElement<'a>,
    to: &BoundIdentifier<'a>,
    ctx: Ctx<'a, '_>,
) {
    let mut rewrite = MovedStaticThis { to, this_depth: 0, ctx };
    if let ClassElement::StaticBlock(block) = element {
        // The block itself is the `this` context being relocated.
        for stmt in block.body.iter_mut() {
            rewrite.visit_statement(stmt);
        }
    } else {
        rewrite.visit_class_element(element);
    }
}

struct MovedStaticThis<'a, 'b, 'c> {
    to: &'b BoundIdentifier<'a>,
    this_depth: u32,
    ctx: Ctx<'a, 'c>,
}

impl<'a> VisitMut<'a> for MovedStaticThis<'a, '_, '_> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if let Expression::ThisExpression(this) = expr {
            if self.this_depth == 0 {
                let span = this.span;
                *expr = self.to.create_spanned_read_expression(span, self.ctx);
            }
            return;
        }
        walk_mut::walk_expression(self, expr);
    }

    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        self.this_depth += 1;
        walk_mut::walk_function(self, func, flags);
        self.this_depth -= 1;
    }

    fn visit_class(&mut self, class: &mut Class<'a>) {
        self.this_depth += 1;
        walk_mut::walk_class(self, class);
        self.this_depth -= 1;
    }

    fn visit_static_block(&mut self, block: &mut StaticBlock<'a>) {
        self.this_depth += 1;
        walk_mut::walk_static_block(self, block);
        self.this_depth -= 1;
    }
}

/// Where `super.x` resolves once a private method body has been extracted.
pub enum SuperBase<'a> {
    /// The superclass binding is assumed constant; cloned per use.
    Constant(Expression<'a>),
    /// Looked up from the class-id local at run time.
    Dynamic(BoundIdentifier<'a>),
}

pub struct SuperSpec<'a> {
    pub base: SuperBase<'a>,
}

impl<'a> SuperSpec<'a> {
    /// The object `super.x` reads from: the superclass (static methods) or
    /// its prototype (instance methods).
    fn home_object(&self, is_static: bool, ctx: Ctx<'a, '_>) -> Expression<'a> {
        match &self.base {
            SuperBase::Constant(super_class) => {
                let base = builder::clone_expr(super_class, ctx);
                if is_static {
                    base
                } else {
                    builder::member(base, "prototype", ctx)
                }
            }
            SuperBase::Dynamic(class_id) => {
                let class_ref = class_id.create_read_expression(ctx);
                let subject = if is_static {
                    class_ref
                } else {
                    builder::member(class_ref, "prototype", ctx)
                };
                let get_proto =
                    builder::member(builder::ident_ref("Object", ctx), "getPrototypeOf", ctx);
                builder::call(get_proto, vec![subject], ctx)
            }
        }
    }
}

/// Rewrites `super` member accesses in an extracted private-method body.
/// Calls keep their receiver: `super.m(a)` becomes `<home>.m.call(this, a)`.
pub fn rewrite_super_in_function<'a>(
    function: &mut Function<'a>,
    spec: &SuperSpec<'a>,
    is_static: bool,
    ctx: Ctx<'a, '_>,
) {
    let Some(body) = &mut function.body else { return };
    let mut rewrite = SuperRewrite { spec, is_static, ctx };
    for stmt in body.statements.iter_mut() {
        rewrite.visit_statement(stmt);
    }
}

struct SuperRewrite<'a, 'b, 'c> {
    spec: &'b SuperSpec<'a>,
    is_static: bool,
    ctx: Ctx<'a, 'c>,
}

impl<'a> SuperRewrite<'a, '_, '_> {
    fn home(&mut self) -> Expression<'a> {
        self.spec.home_object(self.is_static, self.ctx)
    }

    fn callee_is_super_member(call: &CallExpression<'a>) -> bool {
        match &call.callee {
            Expression::StaticMemberExpression(member) => {
                matches!(member.object, Expression::Super(_))
            }
            Expression::ComputedMemberExpression(member) => {
                matches!(member.object, Expression::Super(_))
            }
            _ => false,
        }
    }
}

impl<'a> VisitMut<'a> for SuperRewrite<'a, '_, '_> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        match expr {
            // `super.m(a)` → `<home>.m.call(this, a)`
            Expression::CallExpression(call) if Self::callee_is_super_member(call) => {
                let home = self.home();
                let Expression::CallExpression(call) = expr.take_in(self.ctx.ast) else {
                    return;
                };
                let call = call.unbox();
                let mut method = call.callee;
                match &mut method {
                    Expression::StaticMemberExpression(member) => member.object = home,
                    Expression::ComputedMemberExpression(member) => member.object = home,
                    _ => {}
                }
                let callee = builder::member(method, "call", self.ctx);
                let mut args = self.ctx.ast.vec_with_capacity(call.arguments.len() + 1);
                args.push(Argument::from(builder::this_expr(self.ctx)));
                for arg in call.arguments {
                    args.push(arg);
                }
                *expr = self.ctx.ast.expression_call(SPAN, callee, oxc_ast::NONE, args, false);
            }
            Expression::StaticMemberExpression(member)
                if matches!(member.object, Expression::Super(_)) =>
            {
                member.object = self.home();
            }
            Expression::ComputedMemberExpression(member)
                if matches!(member.object, Expression::Super(_)) =>
            {
                member.object = self.home();
            }
            _ => {}
        }
        walk_mut::walk_expression(self, expr);
    }

    fn visit_simple_assignment_target(&mut self, target: &mut SimpleAssignmentTarget<'a>) {
        match target {
            SimpleAssignmentTarget::StaticMemberExpression(member)
                if matches!(member.object, Expression::Super(_)) =>
            {
                member.object = self.home();
            }
            SimpleAssignmentTarget::ComputedMemberExpression(member)
                if matches!(member.object, Expression::Super(_)) =>
            {
                member.object = self.home();
            }
            _ => {}
        }
        walk_mut::walk_simple_assignment_target(self, target);
    }

    // Non-arrow functions and nested classes bind their own `super`.
    fn visit_function(&mut self, _func: &mut Function<'a>, _flags: ScopeFlags) {}

    fn visit_class(&mut self, _class: &mut Class<'a>) {}
}

/// Wraps every `super(…)` call in a constructor body with the proto-init
/// thunk: `super(x)` becomes `_initProto(super(x))`.
pub fn wrap_super_calls_with_init<'a>(
    function: &mut Function<'a>,
    init: &BoundIdentifier<'a>,
    ctx: Ctx<'a, '_>,
) {
    let Some(body) = &mut function.body else { return };
    let mut wrap = SuperCallWrap { init, ctx };
    for stmt in body.statements.iter_mut() {
        wrap.visit_statement(stmt);
    }
}

struct SuperCallWrap<'a, 'b, 'c> {
    init: &'b BoundIdentifier<'a>,
    ctx: Ctx<'a, 'c>,
}

impl<'a> VisitMut<'a> for SuperCallWrap<'a, '_, '_> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        // Children first, so the freshly wrapped call is not revisited.
        walk_mut::walk_expression(self, expr);
        let is_super_call = matches!(
            expr,
            Expression::CallExpression(call) if matches!(call.callee, Expression::Super(_))
        );
        if is_super_call {
            let original = expr.take_in(self.ctx.ast);
            *expr =
                builder::call(self.init.create_read_expression(self.ctx), vec![original], self.ctx);
        }
    }

    // `super()` belongs to the constructor; nested non-arrow functions and
    // classes cannot contain it.
    fn visit_function(&mut self, _func: &mut Function<'a>, _flags: ScopeFlags) {}

    fn visit_class(&mut self, _class: &mut Class<'a>) {}
}
