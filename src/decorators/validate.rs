//! Static enforcement for decorated private methods.
//!
//! A decorated private method survives as a private field initialized to the
//! call-thunk local, which would make writes silently succeed at run time.
//! Any write position naming such a method is therefore a compile error;
//! reads stay legal.

use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_diagnostics::OxcDiagnostic;
use oxc_span::Atom;
use rustc_hash::FxHashSet;

pub fn check_readonly_private_methods<'a>(
    class: &Class<'a>,
    names: &FxHashSet<Atom<'a>>,
    errors: &mut Vec<OxcDiagnostic>,
) {
    if names.is_empty() {
        return;
    }
    let mut check = Check { names, errors };
    check.visit_class_body(&class.body);
}

/// Same check for elements that were moved out of a class-decorated class.
pub fn check_readonly_private_in_element<'a>(
    element: &ClassElement<'a>,
    names: &FxHashSet<Atom<'a>>,
    errors: &mut Vec<OxcDiagnostic>,
) {
    if names.is_empty() {
        return;
    }
    let mut check = Check { names, errors };
    check.visit_class_element(element);
}

struct Check<'a, 'b> {
    names: &'b FxHashSet<Atom<'a>>,
    errors: &'b mut Vec<OxcDiagnostic>,
}

impl<'a> Check<'a, '_> {
    fn flag(&mut self, field: &PrivateFieldExpression<'a>) {
        let name = field.field.name;
        if self.names.contains(&name) {
            self.errors.push(
                OxcDiagnostic::error(format!(
                    "Decorated private methods are read-only, but `#{name}` is updated via this expression."
                ))
                .with_label(field.span),
            );
        }
    }
}

impl<'a> Visit<'a> for Check<'a, '_> {
    // Covers assignment LHS, destructuring array/object/rest elements, and
    // `for…of` bindings; update expressions route through the simple target.
    fn visit_simple_assignment_target(&mut self, target: &SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::PrivateFieldExpression(field) = target {
            self.flag(field);
        }
        walk::walk_simple_assignment_target(self, target);
    }
}
