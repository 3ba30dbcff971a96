mod common;

use indoc::indoc;

use swiftlet::core::parse::parse_source;
use swiftlet::driver;
use swiftlet::services::completion::results::CompletionContext;

const LIB: &str = indoc! {"
    protocol Shape {
        func area() -> Int
    }
    struct Meters { var value: Int }
    func twice(_ x: Int) -> Int { return x * 2 }
"};

#[test]
fn test_main_module_uses_loaded_library() {
    let mut session = common::session();
    let lib = parse_source(LIB, session.id_gen());
    session.load_module("Lib", lib).expect("library checks");

    let module = driver::compile(
        &session,
        indoc! {"
            struct Square: Shape {
                var side: Int
                func area() -> Int { return side * side }
            }
            let m = Meters(value: twice(3))
        "},
    )
    .expect("main compiles");
    assert!(module.function("Square.area()").is_some());
    assert!(module.function("twice(_:)").is_none());
    assert!(
        module
            .witness_tables
            .iter()
            .any(|table| table.conformance == "Square: Shape")
    );
    let text = driver::format_module(&module);
    assert!(text.contains("function_ref @Lib.twice(_:)"), "{text}");
    assert!(text.contains("sil_witness_table Square: Shape {"), "{text}");
}

#[test]
fn test_missing_witness_across_modules() {
    let mut session = common::session();
    let lib = parse_source(LIB, session.id_gen());
    session.load_module("Lib", lib).expect("library checks");

    let errors = driver::compile(&session, "struct Blob: Shape {}\n").expect_err("no witness");
    let diags = driver::diagnostics(&errors);
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.contains("area()"), "{}", diags[0].message);
}

#[test]
fn test_completion_sees_other_module() {
    let mut session = common::session();
    let lib = parse_source(LIB, session.id_gen());
    session.load_module("Lib", lib).expect("library checks");

    let items = driver::complete_at_token(
        &session,
        "func local() -> Int { return 1 }\nlet n: Int = #^TOP^#\n",
        "TOP",
    )
    .expect("marker present");
    let twice = items
        .iter()
        .find(|item| item.name == "twice(_:)")
        .expect("library function offered");
    assert_eq!(twice.context, CompletionContext::OtherModule("Lib".to_string()));
    let local = items
        .iter()
        .position(|item| item.name == "local()")
        .expect("current module function offered");
    let twice_at = items
        .iter()
        .position(|item| item.name == "twice(_:)")
        .expect("library function offered");
    assert!(local < twice_at);
}
