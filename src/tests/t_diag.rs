use super::*;
use crate::core::parse::{ParseError, ParseErrorKind};

fn pos(offset: usize, line: usize, column: usize) -> Position {
    Position {
        offset,
        line,
        column,
    }
}

#[test]
fn test_format_error_single_char() {
    let source = "func main() {\nlet a = $\n}";
    let span = Span::new(pos(22, 2, 9), pos(23, 2, 10));
    let expected = "(2:9) Unexpected character: $\n\
                    │ 1 │ func main() {\n\
                    │ 2 │ let a = $\n\
                    │   │         ^\n\
                    │ 3 │ }\n";
    assert_eq!(format_error(source, span, "Unexpected character: $"), expected);
}

#[test]
fn test_format_error_multi_char_on_first_line() {
    let source = "let value = nope\nlet other = 1";
    let span = Span::new(pos(12, 1, 13), pos(16, 1, 17));
    let expected = "(1:13) use of unresolved identifier 'nope'\n\
                    │ 1 │ let value = nope\n\
                    │   │             ----\n\
                    │ 2 │ let other = 1\n";
    assert_eq!(
        format_error(source, span, "use of unresolved identifier 'nope'"),
        expected
    );
}

#[test]
fn test_span_helpers() {
    let a = Span::new(pos(2, 1, 3), pos(4, 1, 5));
    let b = Span::new(pos(8, 1, 9), pos(10, 1, 11));
    let joined = a.to(b);
    assert_eq!(joined.start, a.start);
    assert_eq!(joined.end, b.end);
    assert!(joined.contains_offset(2));
    assert!(joined.contains_offset(10));
    assert!(!joined.contains_offset(11));
    assert_eq!(Span::point(Position::START).to_string(), "1:1..1:1");
}

#[test]
fn test_diagnostic_display_uses_kebab_category() {
    let diag = Diagnostic::new(
        DiagnosticCategory::MissingArgumentLabel,
        Span::point(pos(10, 2, 4)),
        "missing argument label 'b:' in call",
    );
    assert_eq!(
        diag.to_string(),
        "2:4: error[missing-argument-label]: missing argument label 'b:' in call"
    );
    assert_eq!(DiagnosticCategory::SyntaxError.to_string(), "syntax");
}

#[test]
fn test_compile_error_from_parse_error() {
    let span = Span::point(pos(3, 1, 4));
    let err = CompileError::from(ParseError::new(ParseErrorKind::ConsecutiveStatements, span));
    assert_eq!(err.category(), DiagnosticCategory::SyntaxError);
    assert_eq!(err.span(), span);
    let diag = err.to_diagnostic();
    assert_eq!(diag.message, err.to_string());
    assert_eq!(diag.category, DiagnosticCategory::SyntaxError);
}
