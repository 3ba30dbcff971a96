mod common;

use common::{run_cli, stderr, stdout};
use indoc::indoc;

const PROGRAM: &str = indoc! {"
    struct Point {
        var x: Int
        var y: Int
        func sum() -> Int { return x + y }
    }
    let p = Point(x: 1, y: 2)
    print(p.sum())
"};

#[test]
fn test_emit_sil_is_the_default() {
    let output = run_cli("default", PROGRAM, &[]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("sil_stage raw\n\n// module main\n"), "{text}");
    assert!(text.contains("sil @Point.sum() : $@convention(thin)"), "{text}");
    assert!(text.contains("sil @main : $@convention(thin) () -> ()"), "{text}");
}

#[test]
fn test_emit_ast() {
    let output = run_cli("ast", "let x = 1 + 2 * 3\n", &["--emit-ast"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(stdout(&output), "let x = (1 + (2 * 3))\n");
}

#[test]
fn test_typecheck_reports_diagnostics() {
    let output = run_cli("diag", "func f(a: Int) {}\nf(1)\n", &["--typecheck"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    let err = stderr(&output);
    assert!(err.contains("missing argument label 'a:' in call"), "{err}");
    assert!(err.contains("│ 2 │ f(1)"), "{err}");
}

#[test]
fn test_json_diagnostics() {
    let output = run_cli(
        "json",
        "let y = missing\n",
        &["--typecheck", "--format", "json"],
    );
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid json");
    let diags = value["diagnostics"].as_array().expect("diagnostics array");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0]["category"], "UnresolvedIdentifier");
    assert_eq!(diags[0]["message"], "cannot find 'missing' in scope");
}

#[test]
fn test_code_completion_at_token() {
    let source = indoc! {"
        func f(_ a: Int, b: Int?) {}
        f(3, #^LABEL^#)
    "};
    let output = run_cli("complete", source, &["--code-completion", "--token", "LABEL"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "Begin completions, 1 items\n\
         Keyword/ExprSpecific: b: [#Argument name#]; name=b:\n\
         End completions\n"
    );
}

#[test]
fn test_missing_completion_token_is_a_usage_error() {
    let output = run_cli("nomarker", "let x = 1\n", &["--code-completion", "--token", "A"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("no #^A^# marker"));
}

#[test]
fn test_swift3_mode_accepts_tuple_splat() {
    let source = indoc! {"
        func g(_ a: Int, _ b: Int) -> Int { return a + b }
        let t = (1, 2)
        let r = g(t)
    "};
    let swift4 = run_cli("splat4", source, &["--typecheck"]);
    assert_eq!(swift4.status.code(), Some(1));
    assert!(stderr(&swift4).contains("requires Swift 3 mode"));

    let swift3 = run_cli("splat3", source, &["--typecheck", "--swift-version", "3"]);
    assert_eq!(swift3.status.code(), Some(0), "{}", stderr(&swift3));
}
