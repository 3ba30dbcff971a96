use super::*;
use crate::core::diag::DiagnosticCategory;
use crate::core::session::CompilerOptions;
use indoc::indoc;

fn session() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

#[test]
fn test_parse_starts_fresh_ids() {
    let parsed = parse("let x = 1");
    assert!(parsed.errors.is_empty());
    assert_eq!(format_ast(&parsed).trim(), "let x = 1");
}

#[test]
fn test_compile_produces_verified_module() {
    let session = session();
    let module = compile(
        &session,
        indoc! {"
            func square(_ x: Int) -> Int { return x * x }
            let nine = square(3)
        "},
    )
    .expect("compiles");
    assert!(module.function("square(_:)").is_some());
    assert!(module.function("main").is_some());
    let text = format_module(&module);
    assert!(text.starts_with("sil_stage raw"));
}

#[test]
fn test_typecheck_errors_block_lowering() {
    let session = session();
    let checked = typecheck(&session, parse_in(&session, "let y = missing"));
    assert!(checked.has_errors());
    let errors = lower(&session, &checked).expect_err("not lowered");
    let diags = diagnostics(&errors);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].category, DiagnosticCategory::UnresolvedIdentifier);
    assert_eq!(diags[0].span.start.line, 1);
    assert_eq!(diags[0].span.start.column, 9);
}

#[test]
fn test_format_diagnostics_includes_snippet() {
    let session = session();
    let source = "let y = missing";
    let errors = compile(&session, source).expect_err("unresolved");
    let text = format_diagnostics(source, &errors);
    assert!(text.starts_with("(1:9) cannot find 'missing' in scope\n"), "{text}");
    assert!(text.contains("│ 1 │ let y = missing"));
}

#[test]
fn test_format_completions_frames_items() {
    let session = session();
    let source = indoc! {"
        func f(_ a: Int, b: Int?) {}
        f(3, #^A^#)
    "};
    let items = complete_at_token(&session, source, "A").expect("marker present");
    assert_eq!(
        format_completions(&items),
        "Begin completions, 1 items\n\
         Keyword/ExprSpecific: b: [#Argument name#]; name=b:\n\
         End completions\n"
    );
}

#[test]
fn test_complete_by_offset_matches_marker() {
    let session = session();
    let text = "struct P { var x: Int }\nlet p = P(x: 1)\np.";
    let by_offset = complete(&session, text, text.len());
    let by_marker = complete_at_token(&session, &format!("{text}#^A^#"), "A").expect("marker");
    assert_eq!(by_offset, by_marker);
    assert!(by_offset.iter().any(|item| item.name == "x"));
}

#[test]
fn test_diagnostics_serialize_to_json() {
    let session = session();
    let errors = compile(&session, "let y = missing").expect_err("unresolved");
    let value = serde_json::to_value(diagnostics(&errors)).expect("serializable");
    assert_eq!(value[0]["category"], "UnresolvedIdentifier");
    assert_eq!(value[0]["span"]["start"]["line"], 1);
}
