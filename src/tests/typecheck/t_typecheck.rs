use super::*;
use crate::core::diag::CompileError;
use crate::core::parse::parse_source;
use crate::core::resolve::{CompatibilityMode, LabelError, ParamBinding};
use crate::core::session::{CheckedModule, CompilationSession, CompilerOptions};
use crate::core::types::render_type;
use indoc::indoc;

fn session_with(compat: CompatibilityMode) -> CompilationSession {
    CompilationSession::new(CompilerOptions {
        compat,
        ..CompilerOptions::default()
    })
    .expect("prelude loads")
}

fn check_in(session: &CompilationSession, source: &str) -> CheckedModule {
    let parsed = parse_source(source, session.id_gen());
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    session.check("main", parsed, None)
}

fn type_errors_in(compat: CompatibilityMode, source: &str) -> Vec<TypeCheckErrorKind> {
    let session = session_with(compat);
    check_in(&session, source)
        .errors
        .into_iter()
        .filter_map(|err| match err {
            CompileError::TypeCheck(err) => Some(err.into_kind()),
            _ => None,
        })
        .collect()
}

fn type_errors(source: &str) -> Vec<TypeCheckErrorKind> {
    type_errors_in(CompatibilityMode::Swift4, source)
}

/// Rendered type of the top-level variable `name`.
fn var_type(source: &str, name: &str) -> String {
    let session = session_with(CompatibilityMode::Swift4);
    let checked = check_in(&session, source);
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let set = session.view_with(&checked.module);
    let decl = checked
        .module
        .decls
        .iter()
        .find(|decl| decl.name == name && decl.parent.is_none())
        .unwrap_or_else(|| panic!("no variable named {name}"));
    let info = decl.var_info().expect("a variable");
    render_type(&info.ty, &set)
}

#[test]
fn test_well_typed_program() {
    let errors = type_errors(indoc! {"
        struct Point {
            var x: Int
            var y: Int
            func sum() -> Int { return x + y }
            mutating func shift(by d: Int) { x = x + d }
        }
        enum Shape {
            case circle(Int)
            case square
        }
        func area(_ s: Shape) -> Int {
            switch s {
            case .circle(let r): return r * r * 3
            case .square: return 1
            }
        }
        func first(_ p: Point?) -> Int {
            if let p = p { return p.sum() }
            return area(.square)
        }
        var p = Point(x: 1, y: 2)
        p.shift(by: 3)
        print(first(p))
    "});
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn test_literal_and_expression_types() {
    assert_eq!(var_type("let a = 1", "a"), "Int");
    assert_eq!(var_type("let b = 1.5 + 2", "b"), "Double");
    assert_eq!(var_type("let c = (1, \"x\")", "c"), "(Int, String)");
    assert_eq!(var_type("let d: Int? = nil", "d"), "Int?");
    assert_eq!(
        var_type("func id<T>(_ x: T) -> T { return x }\nlet e = id(true)", "e"),
        "Bool"
    );
}

#[test]
fn test_unresolved_identifier() {
    assert_eq!(
        type_errors("let y = nope"),
        vec![TypeCheckErrorKind::UnresolvedIdentifier("nope".to_string())]
    );
}

#[test]
fn test_unresolved_member() {
    let errors = type_errors(indoc! {"
        struct S { var a: Int }
        let s = S(a: 1)
        let t = s.b
    "});
    assert_eq!(
        errors,
        vec![TypeCheckErrorKind::UnresolvedMember {
            base: "S".to_string(),
            name: "b".to_string(),
        }]
    );
}

#[test]
fn test_literal_mismatch() {
    assert_eq!(
        type_errors("let x: Int = \"a\""),
        vec![TypeCheckErrorKind::TypeMismatch {
            expected: "Int".to_string(),
            found: "String".to_string(),
        }]
    );
}

#[test]
fn test_argument_label_errors() {
    let source = |call: &str| format!("func f(a: Int) {{}}\n{call}");
    assert_eq!(
        type_errors(&source("f(1)")),
        vec![TypeCheckErrorKind::Label(LabelError::MissingArgumentLabel(
            "a".to_string()
        ))]
    );
    assert_eq!(
        type_errors(&source("f(b: 1)")),
        vec![TypeCheckErrorKind::Label(
            LabelError::IncorrectArgumentLabel {
                expected: "a".to_string(),
                found: "b".to_string(),
            }
        )]
    );
    assert_eq!(
        type_errors(&source("f()")),
        vec![TypeCheckErrorKind::Label(LabelError::MissingArgument(
            "a".to_string()
        ))]
    );
}

#[test]
fn test_tuple_splat_depends_on_compat_mode() {
    let source = indoc! {"
        func g(_ a: Int, _ b: Int) -> Int { return a + b }
        let t = (1, 2)
        let r = g(t)
    "};
    assert_eq!(
        type_errors_in(CompatibilityMode::Swift4, source),
        vec![TypeCheckErrorKind::TupleSplatNotAllowed(2)]
    );
    assert!(type_errors_in(CompatibilityMode::Swift3, source).is_empty());
}

#[test]
fn test_throwing_calls() {
    assert_eq!(
        type_errors("func t() throws {}\nt()"),
        vec![TypeCheckErrorKind::ThrowingCallWithoutTry]
    );
    assert_eq!(
        type_errors("func t() throws {}\nfunc u() { try t() }"),
        vec![TypeCheckErrorKind::UnhandledThrow]
    );
    assert!(type_errors("func t() throws {}\nfunc u() throws { try t() }").is_empty());
}

#[test]
fn test_statement_checks() {
    assert_eq!(
        type_errors("func m() -> Int { }"),
        vec![TypeCheckErrorKind::MissingReturn("Int".to_string())]
    );
    assert_eq!(
        type_errors("if 1 { }"),
        vec![TypeCheckErrorKind::ConditionNotBool("Int".to_string())]
    );
    assert_eq!(
        type_errors("let c = 1\nc = 2"),
        vec![TypeCheckErrorKind::ImmutableAssignment("c".to_string())]
    );
    assert_eq!(
        type_errors("let v = 1\nif let w = v { }"),
        vec![TypeCheckErrorKind::BindingNotOptional("Int".to_string())]
    );
    assert_eq!(
        type_errors("func g(x: Int?) { guard let y = x else { } }"),
        vec![TypeCheckErrorKind::GuardFallthrough]
    );
}

#[test]
fn test_non_exhaustive_switch() {
    let errors = type_errors(indoc! {"
        enum E { case a, b }
        func s(_ e: E) {
            switch e {
            case .a: break
            }
        }
    "});
    assert_eq!(errors, vec![TypeCheckErrorKind::NonExhaustiveSwitch]);
}

#[test]
fn test_call_table_records_default_arguments() {
    let session = session_with(CompatibilityMode::Swift4);
    let checked = check_in(
        &session,
        indoc! {"
            func f(a: Int, b: Int = 2) -> Int { return a + b }
            let r = f(a: 1)
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let set = session.view_with(&checked.module);
    let call = checked
        .tables
        .calls
        .values()
        .find(|call| {
            call.callee
                .as_ref()
                .is_some_and(|callee| set.decl(callee.decl).name == "f")
        })
        .expect("call of f recorded");
    assert_eq!(call.target, CallTarget::Function);
    assert_eq!(call.layout, ArgLayout::Normal);
    assert_eq!(
        call.bindings,
        vec![ParamBinding::Args(vec![0]), ParamBinding::Default]
    );
    assert_eq!(call.result, set.int_type());
}

#[test]
fn test_optional_promotion_is_recorded_as_conversion() {
    let session = session_with(CompatibilityMode::Swift4);
    let checked = check_in(&session, "func f(_ x: Int?) {}\nf(3)");
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let conversions = checked
        .tables
        .conversions
        .values()
        .flatten()
        .map(|conversion| conversion.kind)
        .collect::<Vec<_>>();
    assert_eq!(conversions, vec![ConversionKind::WrapOptional]);
}

#[test]
fn test_tables_have_no_solver_variables() {
    let session = session_with(CompatibilityMode::Swift4);
    let checked = check_in(
        &session,
        indoc! {"
            func id<T>(_ x: T) -> T { return x }
            let a = id(1)
            let b = { (x: Int) in x + 1 }
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    assert!(
        checked
            .tables
            .types
            .values()
            .all(|ty| !ty.contains_vars())
    );
}

#[test]
fn test_exhaustive_switch_counts_as_return() {
    assert!(
        type_errors(indoc! {"
            func pick(_ b: Bool) -> Int {
                switch b {
                case true: return 1
                case false: return 0
                }
            }
        "})
        .is_empty()
    );
    assert!(
        type_errors(indoc! {"
            enum Light { case red, green }
            func code(_ l: Light) -> Int {
                switch l {
                case .red: return 1
                case .green: return 2
                }
            }
        "})
        .is_empty()
    );
    assert!(
        type_errors(indoc! {"
            func first(_ x: Int?, _ b: Bool) -> Int {
                guard let y = x else {
                    switch b {
                    case true: return 1
                    case false: return 0
                    }
                }
                return y
            }
        "})
        .is_empty()
    );
}

#[test]
fn test_partial_switch_still_needs_return() {
    assert_eq!(
        type_errors(indoc! {"
            enum Light { case red, green }
            func code(_ l: Light) -> Int {
                switch l {
                case .red: return 1
                case .green: print(2)
                }
            }
        "}),
        vec![TypeCheckErrorKind::MissingReturn("Int".to_string())]
    );
}

#[test]
fn test_self_in_static_context_is_the_metatype() {
    assert!(
        type_errors(indoc! {"
            struct Tally {
                static var total: Int = 0
                var count: Int
                static func peek() -> Int { return self.total }
                func mine() -> Int { return self.count }
            }
        "})
        .is_empty()
    );
}
