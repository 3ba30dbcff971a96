use super::*;
use crate::core::resolve::DeclKind;
use indoc::indoc;

fn session() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

#[test]
fn test_new_session_loads_prelude() {
    let session = session();
    assert_eq!(session.modules().len(), 1);
    let prelude = session.module_named(PRELUDE_MODULE).expect("prelude");
    assert_eq!(prelude.name, "Swift");
    assert!(
        prelude
            .decls
            .iter()
            .all(|decl| !matches!(decl.kind, DeclKind::Class(_)))
    );
    let known = session.view().known().clone();
    assert!(known.int.is_some());
    assert!(known.optional.is_some());
    assert!(known.integer_literal.is_some());
    assert_eq!(session.next_module_id(), ModuleId(1));
}

#[test]
fn test_check_does_not_mutate_session() {
    let session = session();
    let parsed = parse_source("struct S {}", session.id_gen());
    let checked = session.check("main", parsed, None);
    assert!(!checked.has_errors(), "{:?}", checked.errors);
    assert_eq!(session.modules().len(), 1);
    assert!(session.module_named("main").is_none());
    assert_eq!(checked.module.id, session.next_module_id());
}

#[test]
fn test_load_module_makes_declarations_visible() {
    let mut session = session();
    let lib = parse_source(
        indoc! {"
            struct Meters { var value: Int }
            func twice(_ x: Int) -> Int { return x * 2 }
        "},
        session.id_gen(),
    );
    let id = session.load_module("Lib", lib).expect("library checks");
    assert_eq!(id, ModuleId(1));

    let parsed = parse_source(
        "let m = Meters(value: twice(3))",
        session.id_gen(),
    );
    let checked = session.check("main", parsed, None);
    assert!(!checked.has_errors(), "{:?}", checked.errors);
}

#[test]
fn test_load_module_rejects_errors() {
    let mut session = session();
    let parsed = parse_source("let x: Missing = 1", session.id_gen());
    let errors = session.load_module("Broken", parsed).expect_err("unknown type");
    assert!(!errors.is_empty());
    assert_eq!(session.modules().len(), 1);
    assert!(session.module_named("Broken").is_none());
}

#[test]
fn test_node_ids_continue_after_loaded_files() {
    let mut session = session();
    let before = session.id_gen().peek();
    let parsed = parse_source("func f() {}", session.id_gen());
    let last = parsed.id_gen.peek();
    assert!(last > before);
    session.load_module("Lib", parsed).expect("library checks");
    assert_eq!(session.id_gen().peek(), last);
}

#[test]
fn test_options_default() {
    let options = CompilerOptions::default();
    assert_eq!(options.module_name, "main");
    assert_eq!(options.compat, CompatibilityMode::Swift4);
    assert!(options.verify_ownership);
}
