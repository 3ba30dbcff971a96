use super::*;
use crate::core::tree::format::{format_expr_compact, format_pattern_compact, format_type_compact};
use indoc::indoc;

fn parse_ok(source: &str) -> SourceFile {
    let parsed = parse_source(source, NodeIdGen::new());
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    parsed.file
}

fn first_stmt_expr(file: &SourceFile) -> &Expr {
    match file.top_level_stmts().next().map(|stmt| &stmt.kind) {
        Some(StmtKind::Expr(expr)) => expr,
        other => panic!("expected expression statement, found {other:?}"),
    }
}

fn expr_text(source: &str) -> String {
    format_expr_compact(first_stmt_expr(&parse_ok(source)))
}

fn site_at(source: &str, offset: usize) -> ParsedFile {
    parse_source_with_cursor(source, offset, NodeIdGen::new())
}

#[test]
fn test_parse_binary_precedence() {
    assert_eq!(expr_text("a + b * c - d"), "((a + (b * c)) - d)");
    assert_eq!(expr_text("a == b && c < d || e"), "(((a == b) && (c < d)) || e)");
}

#[test]
fn test_parse_nil_coalesce_is_right_associative() {
    assert_eq!(expr_text("a ?? b ?? c"), "(a ?? (b ?? c))");
}

#[test]
fn test_parse_call_with_labels_and_trailing_closure() {
    let file = parse_ok("f(1, b: 2) { x in x }");
    let expr = first_stmt_expr(&file);
    let ExprKind::Call { args, .. } = &expr.kind else {
        panic!("expected call, found {:?}", expr.kind);
    };
    assert_eq!(args.len(), 3);
    assert_eq!(args[0].label, None);
    assert_eq!(args[1].label.as_deref(), Some("b"));
    assert!(args[2].trailing);
    assert!(matches!(args[2].expr.kind, ExprKind::Closure(_)));
}

#[test]
fn test_parse_optional_chain_wraps_root() {
    let file = parse_ok("a?.b?.c");
    let expr = first_stmt_expr(&file);
    assert!(matches!(expr.kind, ExprKind::OptionalEval(_)));
    assert_eq!(format_expr_compact(expr), "a?.b?.c");
}

#[test]
fn test_parse_tuple_index_chain() {
    assert_eq!(expr_text("t.0.1"), "t.0.1");
}

#[test]
fn test_parse_ternary_needs_spaced_question() {
    assert_eq!(expr_text("c ? 1 : 2"), "(c ? 1 : 2)");
}

#[test]
fn test_parse_newline_minus_starts_new_statement() {
    let file = parse_ok("a\n-b");
    let stmts = file.top_level_stmts().collect::<Vec<_>>();
    assert_eq!(stmts.len(), 2);
}

#[test]
fn test_parse_func_decl_params() {
    let file = parse_ok("func f<T: Equatable>(_ a: T, to b: inout Int, rest: Int...) throws -> T? { return a }");
    let ItemKind::Func(func) = &file.items[0].kind else {
        panic!("expected func");
    };
    assert_eq!(func.name, "f");
    assert_eq!(func.generics.len(), 1);
    assert_eq!(func.generics[0].bounds.len(), 1);
    assert_eq!(func.params[0].label, None);
    assert_eq!(func.params[0].name, "a");
    assert_eq!(func.params[1].label.as_deref(), Some("to"));
    assert_eq!(func.params[1].name, "b");
    assert!(func.params[1].inout);
    assert!(func.params[2].variadic);
    assert!(func.throws);
    assert_eq!(func.result.as_ref().map(format_type_compact).as_deref(), Some("T?"));
}

#[test]
fn test_parse_operator_func_name() {
    let file = parse_ok("func == (lhs: Int, rhs: Int) -> Bool");
    let ItemKind::Func(func) = &file.items[0].kind else {
        panic!("expected func");
    };
    assert_eq!(func.name, "==");
    assert!(func.body.is_none());
}

#[test]
fn test_parse_attributes_and_modifiers() {
    let source = indoc! {r#"
        struct S {
            @available(*, deprecated) static func a() {}
            mutating func b() {}
        }
    "#};
    let file = parse_ok(source);
    let ItemKind::Struct(decl) = &file.items[0].kind else {
        panic!("expected struct");
    };
    let a = &decl.members[0];
    assert!(a.modifiers.is_static);
    let attr = a.attr("available").expect("available attribute");
    assert_eq!(attr.args, vec!["*".to_string(), "deprecated".to_string()]);
    assert!(decl.members[1].modifiers.mutating);
}

#[test]
fn test_parse_computed_and_observed_properties() {
    let source = indoc! {"
        struct S {
            var a: Int { return 1 }
            var b: Int {
                get { return 1 }
                set(v) { }
            }
            var c: Int = 0 {
                didSet { }
            }
        }
    "};
    let file = parse_ok(source);
    let ItemKind::Struct(decl) = &file.items[0].kind else {
        panic!("expected struct");
    };
    let accessors = decl
        .members
        .iter()
        .map(|item| match &item.kind {
            ItemKind::Var(var) => &var.accessors,
            other => panic!("expected var, found {other:?}"),
        })
        .collect::<Vec<_>>();
    assert!(matches!(accessors[0], Accessors::Computed { set: None, .. }));
    assert!(matches!(
        accessors[1],
        Accessors::Computed { set: Some(AccessorBody { param: Some(_), .. }), .. }
    ));
    assert!(matches!(
        accessors[2],
        Accessors::Observed { will_set: None, did_set: Some(_) }
    ));
}

#[test]
fn test_parse_failable_init() {
    let file = parse_ok("struct S { init?(x: Int) {} }");
    let ItemKind::Struct(decl) = &file.items[0].kind else {
        panic!("expected struct");
    };
    let ItemKind::Init(init) = &decl.members[0].kind else {
        panic!("expected init");
    };
    assert!(init.failable);
    assert_eq!(init.params.len(), 1);
}

#[test]
fn test_parse_enum_case_patterns() {
    let source = indoc! {"
        switch s {
        case Shape.circle(let r), .square(side: _):
            break
        case let x?:
            break
        default:
            break
        }
    "};
    let file = parse_ok(source);
    let Some(StmtKind::Switch { cases, .. }) = file.top_level_stmts().next().map(|s| &s.kind)
    else {
        panic!("expected switch");
    };
    let patterns = cases[0].patterns.iter().map(format_pattern_compact).collect::<Vec<_>>();
    assert_eq!(patterns, vec!["Shape.circle(let r)", ".square(_)"]);
    assert_eq!(format_pattern_compact(&cases[1].patterns[0]), "let x?");
    assert!(cases[2].patterns.is_empty());
}

#[test]
fn test_parse_default_must_be_last() {
    let source = "switch x {\ndefault:\n  break\ncase 1:\n  break\n}";
    let parsed = parse_source(source, NodeIdGen::new());
    assert!(
        parsed
            .errors
            .iter()
            .any(|err| matches!(err.kind(), ParseErrorKind::DefaultNotLast))
    );
}

#[test]
fn test_parse_recovers_after_bad_statement() {
    let parsed = parse_source("let a = 1 2\nlet b = 3\n", NodeIdGen::new());
    assert_eq!(parsed.errors.len(), 1);
    assert!(matches!(
        parsed.errors[0].kind(),
        ParseErrorKind::ConsecutiveStatements
    ));
    let names = parsed
        .file
        .items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Var(var) => var.simple_name(),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_parse_array_literal_is_rejected() {
    let parsed = parse_source("let a = [1, 2]\n", NodeIdGen::new());
    assert!(matches!(
        parsed.errors[0].kind(),
        ParseErrorKind::ArrayLiteralUnsupported
    ));
}

#[test]
fn test_parse_unterminated_string_is_fatal() {
    let parsed = parse_source("let s = \"abc\n", NodeIdGen::new());
    assert!(parsed.has_fatal_lex_error());
}

#[test]
fn test_parse_node_ids_continue_from_generator() {
    let parsed = parse_source("let a = 1", NodeIdGen::starting_at(100));
    assert!(parsed.file.items[0].id.0 >= 100);
    assert!(parsed.id_gen.peek() > 100);
}

#[test]
fn test_completion_site_before_dot() {
    let source = "let x = ";
    let parsed = site_at(source, source.len());
    assert!(matches!(
        parsed.completion,
        Some(CompletionSite::BeforeDot { .. })
    ));
}

#[test]
fn test_completion_site_after_dot() {
    let source = "foo.";
    let parsed = site_at(source, source.len());
    let Some(CompletionSite::AfterDot { base: Some(base), expr }) = parsed.completion else {
        panic!("expected member completion, found {:?}", parsed.completion);
    };
    let stmt = first_stmt_expr(&parsed.file);
    assert_eq!(stmt.id, expr);
    let ExprKind::MemberCompletion(inner) = &stmt.kind else {
        panic!("expected member completion expr");
    };
    assert_eq!(inner.id, base);
}

#[test]
fn test_completion_site_implicit_member() {
    let source = "let e: E = .";
    let parsed = site_at(source, source.len());
    assert!(matches!(
        parsed.completion,
        Some(CompletionSite::AfterDot { base: None, .. })
    ));
}

#[test]
fn test_completion_site_call_argument() {
    let source = "f(3, )";
    let parsed = site_at(source, 5);
    let Some(CompletionSite::InsideCallArgList { arg_index, .. }) = parsed.completion else {
        panic!("expected argument completion, found {:?}", parsed.completion);
    };
    assert_eq!(arg_index, 1);
}

#[test]
fn test_completion_site_subscript_argument() {
    let source = "s[]";
    let parsed = site_at(source, 2);
    assert!(matches!(
        parsed.completion,
        Some(CompletionSite::InsideSubscriptArgList { arg_index: 0, .. })
    ));
}

#[test]
fn test_completion_site_pattern() {
    let source = "switch e {\ncase .\n}";
    let parsed = site_at(source, "switch e {\ncase .".len());
    assert!(matches!(
        parsed.completion,
        Some(CompletionSite::InPatternPosition {
            after_dot: true,
            ..
        })
    ));
}

#[test]
fn test_parse_expression_patterns_stop_before_colon() {
    let file = parse_ok(indoc! {"
        switch n {
        case 1...3: break
        case -1, x: break
        default: break
        }
    "});
    let Some(StmtKind::Switch { cases, .. }) = file.top_level_stmts().next().map(|stmt| &stmt.kind)
    else {
        panic!("expected a switch statement");
    };
    let patterns = cases
        .iter()
        .map(|case| {
            case.patterns
                .iter()
                .map(format_pattern_compact)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    assert_eq!(
        patterns,
        vec![
            vec!["(1 ... 3)".to_string()],
            vec!["(-1)".to_string(), "x".to_string()],
            Vec::new(),
        ]
    );
}
