//! Decorator lowering on the oxc AST.
//!
//! Rewrites classes using TC39 decorator syntax (revisions "2021-12" through
//! "2023-05") into baseline class features plus calls into the `applyDecs*`
//! runtime helpers. The whole transformation is AST-to-AST: decoration calls
//! are assembled with the `AstBuilder`, fresh locals come from the traversal
//! context's uid generator, and the printed output falls out of the normal
//! codegen pass.
//!
//! The pipeline is parse → pre-scan → semantic → traverse → print. Programs
//! with no decorated classes and no `accessor` members skip semantic
//! construction and traversal entirely; programs that needed lowering get
//! the referenced runtime helpers prepended to the generated code.

use std::path::PathBuf;
use std::sync::Arc;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_diagnostics::{NamedSource, OxcDiagnostic};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_traverse::traverse_mut;
use serde::Serialize;

mod decorators;
mod helpers;
mod options;

pub use decorators::{has_lowerable_classes, DecoratorLowering, LoweringState};
pub use options::{DecoratorVersion, TransformOptions};

#[derive(Debug, Serialize)]
pub struct TransformResult {
    pub code: String,
    pub map: Option<String>,
    pub errors: Vec<String>,
}

pub fn transform(
    filename: String,
    source_text: String,
    options: String,
) -> Result<TransformResult, String> {
    let options = parse_options(&options)?;
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(&filename).unwrap_or_default();

    let parser = Parser::new(&allocator, &source_text, source_type);
    let mut parse_result = parser.parse();

    if !parse_result.errors.is_empty() {
        let errors = render_errors(parse_result.errors, &filename, &source_text);
        return Ok(TransformResult { code: source_text.clone(), map: None, errors });
    }

    if !has_lowerable_classes(&parse_result.program) {
        return Ok(generate(&parse_result.program, &filename, &options, vec![]));
    }

    let semantic = SemanticBuilder::new().build(&parse_result.program);
    let scoping = semantic.semantic.into_scoping();

    let mut lowering = DecoratorLowering::new(&options);
    traverse_mut(&mut lowering, &allocator, &mut parse_result.program, scoping, LoweringState);

    let errors = render_errors(lowering.take_errors(), &filename, &source_text);
    let mut result = generate(&parse_result.program, &filename, &options, errors);
    if !lowering.helpers.is_empty() {
        result.code = format!("{}\n{}", lowering.helpers.prelude(), result.code);
    }
    Ok(result)
}

fn parse_options(options: &str) -> Result<TransformOptions, String> {
    if options.is_empty() {
        Ok(TransformOptions::default())
    } else {
        serde_json::from_str(options).map_err(|e| format!("Invalid options: {e}"))
    }
}

fn generate(
    program: &Program,
    filename: &str,
    options: &TransformOptions,
    errors: Vec<String>,
) -> TransformResult {
    let codegen_options = CodegenOptions {
        source_map_path: options.source_maps.then(|| PathBuf::from(filename)),
        ..CodegenOptions::default()
    };
    let ret = Codegen::new().with_options(codegen_options).build(program);
    TransformResult { code: ret.code, map: ret.map.map(|map| map.to_json_string()), errors }
}

/// Code-framed rendering against the named source.
fn render_errors(
    diagnostics: Vec<OxcDiagnostic>,
    filename: &str,
    source_text: &str,
) -> Vec<String> {
    if diagnostics.is_empty() {
        return vec![];
    }
    let source = Arc::new(NamedSource::new(filename, source_text.to_string()));
    diagnostics
        .into_iter()
        .map(|diagnostic| format!("{:?}", diagnostic.with_source_code(Arc::clone(&source))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> TransformResult {
        transform("test.js".to_string(), source.to_string(), "{}".to_string()).unwrap()
    }

    fn lower_with(source: &str, options: &str) -> TransformResult {
        transform("test.js".to_string(), source.to_string(), options.to_string()).unwrap()
    }

    #[test]
    fn test_basic_parsing() {
        let result = lower("const x = 1;");
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("const x = 1"));
    }

    #[test]
    fn test_no_helper_injection_without_decorators() {
        let result = lower("class C { m(arg) { return arg * 2; } }");
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("class C"));
        assert!(!result.code.contains("_applyDecs"));
        assert!(!result.code.contains("function _toPropertyKey"));
    }

    #[test]
    fn test_field_decorator() {
        let result = lower(
            r#"
function dec(value, context) {}
class A {
    @dec
    x = 1;
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(!result.code.contains("@dec"));
        assert!(result.code.contains("static {"));
        assert!(result.code.contains("function _applyDecs2305"));
        assert!(result.code.contains("[[dec, 0, \"x\"]]"));
        assert!(result.code.contains(".e"));
        assert!(result.code.contains("_init_x(this, 1)"));
        assert!(result.code.contains("let _init_x"));
    }

    #[test]
    fn test_method_decorator_synthesizes_constructor() {
        let result = lower(
            r#"
function dec(value, context) {}
class C {
    @dec
    m() {}
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("[dec, 2, \"m\"]"));
        assert!(result.code.contains("constructor()"));
        assert!(result.code.contains("_initProto(this)"));
        assert!(result.code.contains("m() {}"));
    }

    #[test]
    fn test_constructor_threaded_proto_init() {
        let result = lower(
            r#"
function dec(value, context) {}
class F {}
class E extends F {
    @dec
    m() {}
    constructor(x) {
        super(x);
        this.y = 1;
    }
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("_initProto(super(x))"));
        assert!(result.code.contains("this.y = 1"));
    }

    #[test]
    fn test_static_method_flag_newest_vs_legacy() {
        let source = r#"
function dec(value, context) {}
class C {
    @dec
    static m() {}
}
"#;
        let newest = lower(source);
        assert!(newest.code.contains("[dec, 10, \"m\"]"));
        assert!(newest.code.contains("_initStatic(this)"));

        let legacy = lower_with(source, r#"{"version": "2021-12"}"#);
        assert!(legacy.code.contains("[dec, 7, \"m\"]"));
        assert!(legacy.code.contains("function _applyDecs("));
        assert!(!legacy.code.contains("_applyDecs2305"));
    }

    #[test]
    fn test_class_decorator_without_statics() {
        let result = lower(
            r#"
function dec(value, context) {}
@dec
class C {
    m() {}
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(!result.code.contains("@dec"));
        assert!(result.code.contains("let C;"));
        assert!(result.code.contains(".c"));
        assert!(result.code.contains("_initClass()"));
        assert!(result.code.contains("C = (class C"));
        // No statics, so no identity wrapper.
        assert!(!result.code.contains("_identity"));
    }

    #[test]
    fn test_class_decorator_with_static_member() {
        let result = lower(
            r#"
function dec(value, context) {}
@dec
class B {
    static m() {}
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("let B;"));
        assert!(result.code.contains("new (class extends _identity"));
        assert!(result.code.contains("super(B)"));
        assert!(result.code.contains("static m()"));
        assert!(result.code.contains("_initClass()"));
        assert!(result.code.contains("function _identity"));
    }

    #[test]
    fn test_accessor_desugars_without_decorators() {
        let result = lower("class C { accessor p = 3; }");
        assert_eq!(result.errors.len(), 0);
        assert!(!result.code.contains("accessor"));
        assert!(result.code.contains("#_p = 3"));
        assert!(result.code.contains("get p()"));
        assert!(result.code.contains("return this.#_p"));
        assert!(result.code.contains("set p("));
        assert!(result.code.contains("this.#_p = v"));
        // No decoration, no helpers.
        assert!(!result.code.contains("_applyDecs"));
    }

    #[test]
    fn test_decorated_accessor() {
        let result = lower(
            r#"
function dec(value, context) {}
class C {
    @dec
    accessor p = 3;
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("[dec, 1, \"p\"]"));
        assert!(result.code.contains("_init_p(this, 3)"));
        assert!(result.code.contains("get p()"));
        assert!(result.code.contains("set p("));
    }

    #[test]
    fn test_decorated_private_accessor_delegates_to_thunks() {
        let result = lower(
            r#"
function dec(value, context) {}
class C {
    @dec
    accessor #a = 1;
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("_get_a(this)"));
        assert!(result.code.contains("_set_a(this, v)"));
        assert!(result.code.contains("_init_a(this, 1)"));
        // Tuple carries the storage access pair.
        assert!(result.code.contains("[dec, 1, \"a\", function"));
    }

    #[test]
    fn test_private_method_becomes_field_thunk() {
        let result = lower(
            r#"
function dec(value, context) {}
class D {
    @dec
    #m() { return 1; }
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("_call_m"));
        assert!(result.code.contains("[dec, 2, \"m\", function"));
        // Brand check for the decorated instance private element.
        assert!(result.code.contains("#m in _"));
    }

    #[test]
    fn test_write_to_decorated_private_method_is_an_error() {
        let result = lower(
            r#"
function dec(value, context) {}
class D {
    @dec
    #m() {}
    reset() { this.#m = 0; }
}
"#,
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("#m"));
        assert!(result.errors[0].contains("read-only"));
    }

    #[test]
    fn test_update_of_decorated_private_method_is_an_error() {
        let result = lower(
            r#"
function dec(value, context) {}
class D {
    @dec
    #m() {}
    bump() { this.#m++; }
}
"#,
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("#m"));
    }

    #[test]
    fn test_reads_of_decorated_private_method_are_allowed() {
        let result = lower(
            r#"
function dec(value, context) {}
class D {
    @dec
    #m() {}
    call() { return this.#m(); }
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
    }

    #[test]
    fn test_computed_key_memoized_through_to_property_key() {
        let result = lower(
            r#"
function dec(value, context) {}
function f() { return "k"; }
const v = 1;
class G {
    @dec
    [f()] = v;
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("_computedKey = _toPropertyKey(f())"));
        assert!(result.code.contains("[_computedKey]"));
        assert!(result.code.contains("function _toPropertyKey"));
        assert!(result.code.contains("function _toPrimitive"));
    }

    #[test]
    fn test_export_default_split() {
        let result = lower(
            r#"
function dec(value, context) {}
@dec
export default class B {
    m() {}
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(!result.code.contains("export default"));
        assert!(result.code.contains("as default"));
        assert!(result.code.contains("let B;"));
    }

    #[test]
    fn test_export_named_split() {
        let result = lower(
            r#"
function dec(value, context) {}
@dec
export class B {
    m() {}
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(!result.code.contains("export class"));
        assert!(result.code.contains("export { B }"));
    }

    #[test]
    fn test_named_evaluation_of_variable_initializer() {
        let result = lower(
            r#"
function dec(value, context) {}
const A = @dec class {
    m() {}
};
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("_setFunctionName(this, \"A\")"));
    }

    #[test]
    fn test_memoized_unstable_decorator() {
        let result = lower(
            r#"
function make() { return () => {}; }
class C {
    @make()
    m() {}
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(result.code.contains("_dec = make()"));
        assert!(result.code.contains("[_dec, 2, \"m\"]"));
    }

    #[test]
    fn test_revision_2022_03_uses_r_helper() {
        let result = lower_with(
            "function dec(v, c) {}\nclass C { @dec m() {} }",
            r#"{"version": "2022-03"}"#,
        );
        assert!(result.code.contains("function _applyDecs2203R"));
        assert!(result.code.contains("_applyDecs2203R(this,"));
        assert!(result.code.contains(".e"));
    }

    #[test]
    fn test_revision_2023_01_helper() {
        let result = lower_with(
            "function dec(v, c) {}\nclass C { @dec #m() {} }",
            r#"{"version": "2023-01"}"#,
        );
        assert!(result.code.contains("_applyDecs2301(this,"));
        // The brand check exists in this revision too.
        assert!(result.code.contains("#m in _"));
    }

    #[test]
    fn test_revision_2021_12_flat_destructuring() {
        let result = lower_with(
            "function dec(v, c) {}\n@dec class C { @dec m() {} }",
            r#"{"version": "2021-12"}"#,
        );
        assert!(result.code.contains("= _applyDecs(this,"));
        // One flat array pattern holds element locals then class locals.
        assert!(result.code.contains("[_initProto, _C, _initClass] = _applyDecs(this,"));
        assert!(!result.code.contains(".e"));
        assert!(!result.code.contains(".c"));
    }

    #[test]
    fn test_invalid_version_is_a_configuration_error() {
        let result = transform(
            "test.js".to_string(),
            "class C {}".to_string(),
            r#"{"version": "2020-01"}"#.to_string(),
        );
        let err = result.unwrap_err();
        assert!(err.contains("Invalid options"));
    }

    #[test]
    fn test_lowering_its_own_output_is_a_no_op() {
        let first = lower(
            r#"
function dec(value, context) {}
class A {
    @dec
    x = 1;
    accessor p = 2;
}
"#,
        );
        assert_eq!(first.errors.len(), 0);
        let second = lower(&first.code);
        assert_eq!(second.errors.len(), 0);
        assert!(!second.code.contains("@dec"));
        // Helpers are not injected twice.
        assert_eq!(second.code.matches("function _applyDecsCore(").count(), 1);
        assert_eq!(second.code.matches("function _applyDecs2305(").count(), 1);
    }

    #[test]
    fn test_options_parsing() {
        let result = lower_with("const x = 1;", r#"{"source_maps": false}"#);
        assert!(result.map.is_none());
    }

    #[test]
    fn test_source_map_produced_by_default() {
        let result = lower("class C { accessor p = 1; }");
        assert!(result.map.is_some());
    }

    #[test]
    fn test_complex_decorator_scenario() {
        let result = lower(
            r#"
function logged(value, context) { return value; }
function bound(value, context) { return value; }

@logged
class Controller {
    @logged
    static staticMethod() { return "static"; }

    @bound
    @logged
    instanceMethod() { return "instance"; }

    @logged
    get value() { return 1; }

    @logged
    set value(v) {}

    @logged
    accessor data = 42;

    @logged
    #privateMethod() { return "private"; }
}
"#,
        );
        assert_eq!(result.errors.len(), 0);
        assert!(!result.code.contains("@logged"));
        assert!(!result.code.contains("@bound"));
        assert!(!result.code.contains("accessor data"));
        // Multiple decorators on one element stay an array.
        assert!(result.code.contains("[bound, logged]"));
        // Static member moved into the identity wrapper.
        assert!(result.code.contains("extends _identity"));
        assert!(result.code.contains("staticMethod()"));
        assert!(result.code.contains("function logged"));
    }

    #[test]
    fn test_parse_errors_are_surfaced_and_input_returned() {
        let result = lower("class {");
        assert!(!result.errors.is_empty());
        assert_eq!(result.code, "class {");
    }
}
