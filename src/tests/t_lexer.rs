use super::*;

fn assert_span_eq(span: Span, expected_left: (usize, usize), expected_right: (usize, usize)) {
    assert_eq!(span.start.line, expected_left.0);
    assert_eq!(span.start.column, expected_left.1);
    assert_eq!(span.end.line, expected_right.0);
    assert_eq!(span.end.column, expected_right.1);
}

fn kinds(source: &str) -> Vec<TokenKind> {
    let (tokens, errors) = lex_all(Lexer::new(source));
    assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
    tokens.into_iter().map(|token| token.kind).collect()
}

#[test]
fn test_lex_identifier() {
    let mut lexer = Lexer::new("foo");
    let token = lexer.next_token().unwrap();

    assert_eq!(token.kind, TokenKind::Ident("foo".to_string()));
    assert_span_eq(token.span, (1, 1), (1, 4));
}

#[test]
fn test_lex_keywords_and_bools() {
    let expected = [
        TokenKind::KwFunc,
        TokenKind::KwInit,
        TokenKind::KwSubscript,
        TokenKind::KwVar,
        TokenKind::KwLet,
        TokenKind::KwStruct,
        TokenKind::KwClass,
        TokenKind::KwEnum,
        TokenKind::KwCase,
        TokenKind::KwProtocol,
        TokenKind::KwExtension,
        TokenKind::KwTypealias,
        TokenKind::KwAssociatedtype,
        TokenKind::KwStatic,
        TokenKind::KwSwitch,
        TokenKind::KwSelf,
        TokenKind::KwSelfType,
        TokenKind::KwNil,
        TokenKind::BoolLit(true),
        TokenKind::BoolLit(false),
        TokenKind::Eof,
    ];
    let source = "func init subscript var let struct class enum case protocol extension \
                  typealias associatedtype static switch self Self nil true false";
    assert_eq!(kinds(source), expected);
}

#[test]
fn test_lex_underscore_is_not_an_identifier() {
    assert_eq!(
        kinds("_ _x"),
        vec![
            TokenKind::Underscore,
            TokenKind::Ident("_x".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_lex_escaped_identifier() {
    assert_eq!(
        kinds("`default`"),
        vec![TokenKind::Ident("default".to_string()), TokenKind::Eof]
    );
}

#[test]
fn test_lex_numbers() {
    assert_eq!(
        kinds("42 1_000 3.25"),
        vec![
            TokenKind::IntLit(42),
            TokenKind::IntLit(1000),
            TokenKind::FloatLit("3.25".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_lex_tuple_index_is_not_a_float() {
    assert_eq!(
        kinds("t.0"),
        vec![
            TokenKind::Ident("t".to_string()),
            TokenKind::Dot,
            TokenKind::IntLit(0),
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_lex_punctuation_and_operators() {
    assert_eq!(
        kinds("-> ... ..< == != <= >= && || ?? += -= *= ? ! & @"),
        vec![
            TokenKind::Arrow,
            TokenKind::Ellipsis,
            TokenKind::HalfOpenRange,
            TokenKind::EqEq,
            TokenKind::NotEq,
            TokenKind::LessThanEq,
            TokenKind::GreaterThanEq,
            TokenKind::LogicalAnd,
            TokenKind::LogicalOr,
            TokenKind::NilCoalesce,
            TokenKind::PlusEquals,
            TokenKind::MinusEquals,
            TokenKind::StarEquals,
            TokenKind::Question,
            TokenKind::Bang,
            TokenKind::Ampersand,
            TokenKind::At,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_lex_string_escapes() {
    assert_eq!(
        kinds(r#""a\n\"b\"""#),
        vec![TokenKind::StringLit("a\n\"b\"".to_string()), TokenKind::Eof]
    );
}

#[test]
fn test_lex_comments_set_spacing_flags() {
    let (tokens, errors) = lex_all(Lexer::new("a/* c */b\n// line\nc"));
    assert!(errors.is_empty());
    assert!(!tokens[0].spaced);
    assert!(tokens[1].spaced);
    assert!(!tokens[1].newline);
    assert!(tokens[2].newline);
}

#[test]
fn test_lex_tracks_lines_and_offsets() {
    let (tokens, _) = lex_all(Lexer::new("let x\n  = 1"));
    let eq = &tokens[2];
    assert_eq!(eq.kind, TokenKind::Equals);
    assert_span_eq(eq.span, (2, 3), (2, 4));
    assert_eq!(eq.span.start.offset, 8);
}

#[test]
fn test_lex_unexpected_character_is_recoverable() {
    let (tokens, errors) = lex_all(Lexer::new("a $ b"));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), &LexErrorKind::UnexpectedCharacter('$'));
    assert_eq!(
        tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
        vec![
            TokenKind::Ident("a".to_string()),
            TokenKind::Ident("b".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_lex_unterminated_string_is_fatal() {
    let (tokens, errors) = lex_all(Lexer::new("let s = \"abc\nlet t = 1"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].kind().is_fatal());
    assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    assert!(
        !tokens
            .iter()
            .any(|t| t.kind == TokenKind::Ident("t".to_string()))
    );
}

#[test]
fn test_lex_cursor_splits_identifier_boundary() {
    let source = "foo.bar";
    let (tokens, errors) = lex_all(Lexer::with_cursor(source, 4));
    assert!(errors.is_empty());
    let kinds = tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident("foo".to_string()),
            TokenKind::Dot,
            TokenKind::CodeCompletion,
            TokenKind::Ident("bar".to_string()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_lex_cursor_at_end_of_input() {
    let source = "f(";
    let (tokens, _) = lex_all(Lexer::with_cursor(source, source.len()));
    let kinds = tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident("f".to_string()),
            TokenKind::LParen,
            TokenKind::CodeCompletion,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_operator_names() {
    assert_eq!(TokenKind::EqEq.operator_name(), Some("=="));
    assert_eq!(TokenKind::Bang.operator_name(), Some("!"));
    assert_eq!(TokenKind::Dot.operator_name(), None);
}
