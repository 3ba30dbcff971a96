use super::*;
use crate::core::session::CompilerOptions;
use indoc::indoc;

fn session() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

fn lines_at(session: &CompilationSession, source: &str) -> Vec<String> {
    complete_at_token(session, source, "A")
        .expect("marker present")
        .iter()
        .map(|item| item.to_string())
        .collect()
}

fn lines(source: &str) -> Vec<String> {
    lines_at(&session(), source)
}

fn names(source: &str) -> Vec<String> {
    complete_at_token(&session(), source, "A")
        .expect("marker present")
        .into_iter()
        .map(|item| item.name)
        .collect()
}

fn assert_has(lines: &[String], expected: &str) {
    assert!(
        lines.iter().any(|line| line == expected),
        "missing `{expected}` in:\n{}",
        lines.join("\n")
    );
}

#[test]
fn test_next_argument_label() {
    let source = indoc! {"
        func f(_ a: Int, b: Int?) {}
        f(3, #^A^#)
    "};
    assert_eq!(
        lines(source),
        vec!["Keyword/ExprSpecific: b: [#Argument name#]; name=b:".to_string()]
    );
}

#[test]
fn test_constructor_call_pattern() {
    let source = indoc! {"
        struct S { var a: Int }
        let s = S(#^A^#)
    "};
    assert_has(&lines(source), "Decl[Constructor]/CurrNominal: ({#a: Int#})[#S#]; name=(a:)");
}

#[test]
fn test_member_completions_sorted_by_name() {
    let source = indoc! {"
        struct Counter {
            var count: Int
            func bump() -> Int { return count + 1 }
            func reset() {}
        }
        let c = Counter(count: 0)
        c.#^A^#
    "};
    let lines = lines(source);
    assert_eq!(
        lines,
        vec![
            "Decl[InstanceMethod]/CurrNominal: bump()[#Int#]; name=bump()".to_string(),
            "Decl[InstanceVar]/CurrNominal: count[#Int#]; name=count".to_string(),
            "Decl[InstanceMethod]/CurrNominal: reset()[#Void#]; name=reset()".to_string(),
        ]
    );
}

#[test]
fn test_prefix_filters_items() {
    let source = indoc! {"
        struct Counter {
            var count: Int
            func bump() -> Int { return count + 1 }
        }
        let c = Counter(count: 0)
        c.bu#^A^#
    "};
    assert_eq!(names(source), vec!["bump()".to_string()]);
}

#[test]
fn test_void_result_is_invalid_in_typed_context() {
    let source = indoc! {"
        struct S {
            func v() {}
            func i() -> Int { return 1 }
        }
        let s = S()
        let x: Int = s.#^A^#
    "};
    let lines = lines(source);
    assert_eq!(
        lines.first().map(String::as_str),
        Some("Decl[InstanceMethod]/CurrNominal/TypeRelation[Identical]: i()[#Int#]; name=i()")
    );
    assert_eq!(
        lines.last().map(String::as_str),
        Some("Decl[InstanceMethod]/CurrNominal/NotRecommended/TypeRelation[Invalid]: v()[#Void#]; name=v()")
    );
}

#[test]
fn test_completion_is_idempotent_and_read_only() {
    let session = session();
    let source = indoc! {"
        func helper(x: Int) -> Int { return x }
        let value = 1
        let y = #^A^#
    "};
    let first = lines_at(&session, source);
    let second = lines_at(&session, source);
    assert_eq!(first, second);
    assert_eq!(session.modules().len(), 1);
    assert!(session.module_named("main").is_none());
}

#[test]
fn test_unqualified_completion_offers_globals_and_locals() {
    let source = indoc! {"
        func helper() -> Int { return 1 }
        func body() {
            let local = 2
            #^A^#
        }
    "};
    let items = complete_at_token(&session(), source, "A").expect("marker present");
    let local = items
        .iter()
        .find(|item| item.name == "local")
        .expect("local offered");
    assert_eq!(local.context, results::CompletionContext::Local);
    assert!(items.iter().any(|item| item.name == "helper()"));
    assert!(items.iter().any(|item| item.name == "Int"));
}

#[test]
fn test_completion_survives_syntax_errors() {
    let source = indoc! {"
        func helper() {}
        let broken = (1 +
        let y = #^A^#
    "};
    assert!(names(source).iter().any(|name| name == "helper()"));
}

#[test]
fn test_implicit_member_offers_enum_cases() {
    let source = indoc! {"
        enum Dir { case up, down }
        func go(_ d: Dir) {}
        go(.#^A^#)
    "};
    let names = names(source);
    assert!(names.contains(&"up".to_string()), "{names:?}");
    assert!(names.contains(&"down".to_string()), "{names:?}");
}

#[test]
fn test_case_pattern_offers_enum_cases() {
    let source = indoc! {"
        enum Dir { case up, down }
        func go(_ d: Dir) {
            switch d {
            case .#^A^#
            }
        }
    "};
    let names = names(source);
    assert!(names.contains(&"up".to_string()), "{names:?}");
    assert!(names.contains(&"down".to_string()), "{names:?}");
}

#[test]
fn test_missing_marker() {
    assert!(complete_at_token(&session(), "let x = 1", "A").is_none());
}

#[test]
fn test_member_completions_ranked_by_relation_to_context() {
    let source = indoc! {"
        struct T {
            func exact() -> Int? { return nil }
            func conv() -> Int { return 1 }
            func inv() {}
        }
        let t = T()
        let v: Int? = t.#^A^#
    "};
    assert_eq!(
        lines(source),
        vec![
            "Decl[InstanceMethod]/CurrNominal/TypeRelation[Identical]: exact()[#Int?#]; name=exact()"
                .to_string(),
            "Decl[InstanceMethod]/CurrNominal/TypeRelation[Convertible]: conv()[#Int#]; name=conv()"
                .to_string(),
            "Decl[InstanceMethod]/CurrNominal/NotRecommended/TypeRelation[Invalid]: inv()[#Void#]; name=inv()"
                .to_string(),
        ]
    );
}

#[test]
fn test_call_pattern_ranked_against_call_context() {
    let source = indoc! {"
        func k(a: String) -> Int { return 0 }
        let r: Int = k(#^A^#)
    "};
    assert_eq!(
        lines(source),
        vec![
            "Decl[FreeFunction]/CurrModule/TypeRelation[Identical]: ({#a: String#})[#Int#]; name=k(a:)"
                .to_string()
        ]
    );
}

#[test]
fn test_call_pattern_without_context_has_no_relation() {
    let source = indoc! {"
        func k(a: String) -> String { return a }
        k(#^A^#)
    "};
    assert_eq!(
        lines(source),
        vec!["Decl[FreeFunction]/CurrModule: ({#a: String#})[#String#]; name=k(a:)".to_string()]
    );
}

#[test]
fn test_void_call_pattern_in_typed_context_is_not_recommended() {
    let source = indoc! {"
        func h(a: Int) {}
        let r: Int = h(#^A^#)
    "};
    assert_eq!(
        lines(source),
        vec![
            "Decl[FreeFunction]/CurrModule/NotRecommended/TypeRelation[Invalid]: ({#a: Int#})[#Void#]; name=h(a:)"
                .to_string()
        ]
    );
}
