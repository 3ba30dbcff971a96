use crate::core::diag::{Position, Span, SpannedError};
use enum_display::EnumDisplay;
use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::num::ParseIntError;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Whitespace (or a comment) separates this token from the previous one.
    pub spaced: bool,
    /// A line break separates this token from the previous one.
    pub newline: bool,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, EnumDisplay)]
pub enum TokenKind {
    // Identifiers
    #[display("Ident({0})")]
    Ident(String),

    // Literals
    #[display("IntLit({0})")]
    IntLit(u64),
    #[display("FloatLit({0})")]
    FloatLit(String),
    #[display("StringLit({0})")]
    StringLit(String),
    #[display("BoolLit({0})")]
    BoolLit(bool),

    // Keywords
    #[display("func")]
    KwFunc,
    #[display("init")]
    KwInit,
    #[display("subscript")]
    KwSubscript,
    #[display("var")]
    KwVar,
    #[display("let")]
    KwLet,
    #[display("struct")]
    KwStruct,
    #[display("class")]
    KwClass,
    #[display("enum")]
    KwEnum,
    #[display("case")]
    KwCase,
    #[display("protocol")]
    KwProtocol,
    #[display("extension")]
    KwExtension,
    #[display("typealias")]
    KwTypealias,
    #[display("associatedtype")]
    KwAssociatedtype,
    #[display("static")]
    KwStatic,
    #[display("import")]
    KwImport,
    #[display("if")]
    KwIf,
    #[display("else")]
    KwElse,
    #[display("guard")]
    KwGuard,
    #[display("while")]
    KwWhile,
    #[display("for")]
    KwFor,
    #[display("in")]
    KwIn,
    #[display("switch")]
    KwSwitch,
    #[display("default")]
    KwDefault,
    #[display("return")]
    KwReturn,
    #[display("break")]
    KwBreak,
    #[display("continue")]
    KwContinue,
    #[display("defer")]
    KwDefer,
    #[display("throw")]
    KwThrow,
    #[display("throws")]
    KwThrows,
    #[display("do")]
    KwDo,
    #[display("catch")]
    KwCatch,
    #[display("try")]
    KwTry,
    #[display("as")]
    KwAs,
    #[display("nil")]
    KwNil,
    #[display("self")]
    KwSelf,
    #[display("Self")]
    KwSelfType,
    #[display("super")]
    KwSuper,
    #[display("inout")]
    KwInout,
    #[display("where")]
    KwWhere,
    #[display("indirect")]
    KwIndirect,

    // Brackets
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("[")]
    LBracket,
    #[display("]")]
    RBracket,
    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,

    // Punctuation
    #[display(",")]
    Comma,
    #[display(".")]
    Dot,
    #[display(":")]
    Colon,
    #[display(";")]
    Semicolon,
    #[display("@")]
    At,
    #[display("?")]
    Question,
    #[display("!")]
    Bang,
    #[display("_")]
    Underscore,
    #[display("->")]
    Arrow,
    #[display("&")]
    Ampersand,
    #[display("...")]
    Ellipsis,
    #[display("..<")]
    HalfOpenRange,

    // Operators
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,
    #[display("%")]
    Percent,
    #[display("=")]
    Equals,
    #[display("+=")]
    PlusEquals,
    #[display("-=")]
    MinusEquals,
    #[display("*=")]
    StarEquals,
    #[display("==")]
    EqEq,
    #[display("!=")]
    NotEq,
    #[display("<")]
    LessThan,
    #[display(">")]
    GreaterThan,
    #[display("<=")]
    LessThanEq,
    #[display(">=")]
    GreaterThanEq,
    #[display("&&")]
    LogicalAnd,
    #[display("||")]
    LogicalOr,
    #[display("??")]
    NilCoalesce,

    // Cursor marker inserted by completion requests
    #[display("<completion>")]
    CodeCompletion,

    // End of file
    #[display("EOF")]
    Eof,
}

impl TokenKind {
    /// Operator spelling usable as a function name (`func + (...)`).
    pub fn operator_name(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::LessThan => "<",
            TokenKind::GreaterThan => ">",
            TokenKind::LessThanEq => "<=",
            TokenKind::GreaterThanEq => ">=",
            TokenKind::LogicalAnd => "&&",
            TokenKind::LogicalOr => "||",
            TokenKind::Bang => "!",
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    #[error("Unexpected character: {0}")]
    UnexpectedCharacter(char),

    #[error("Invalid integer: {0}")]
    InvalidInteger(ParseIntError),

    #[error("Invalid escape sequence: {0}")]
    InvalidEscapeSequence(String),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Unterminated block comment")]
    UnterminatedComment,
}

impl LexErrorKind {
    pub fn at(self, span: Span) -> LexError {
        LexError::new(self, span)
    }

    /// Lexical failures the parser cannot route around.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LexErrorKind::UnterminatedString | LexErrorKind::UnterminatedComment
        )
    }
}

pub type LexError = SpannedError<LexErrorKind>;
pub use LexErrorKind as LEK;

pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    pos: Position,
    at_eof: bool,
    cursor: Option<usize>,
    cursor_emitted: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            pos: Position::START,
            at_eof: false,
            cursor: None,
            cursor_emitted: false,
        }
    }

    /// A lexer that yields a `CodeCompletion` token at the first token
    /// boundary at or after `offset`.
    pub fn with_cursor(source: &'a str, offset: usize) -> Self {
        let mut lexer = Lexer::new(source);
        lexer.cursor = Some(offset);
        lexer
    }

    fn advance(&mut self) {
        match self.source.next() {
            Some(ch) => {
                self.pos.offset += ch.len_utf8();
                if ch == '\n' {
                    self.pos.line += 1;
                    self.pos.column = 1;
                } else {
                    self.pos.column += 1;
                }
            }
            None => {
                self.at_eof = true;
            }
        }
    }

    fn peek2(&self) -> (Option<char>, Option<char>) {
        let mut iter = self.source.clone();
        (iter.next(), iter.next())
    }

    fn at_cursor(&self) -> bool {
        !self.cursor_emitted && self.cursor.is_some_and(|c| self.pos.offset >= c)
    }

    /// Skips whitespace and comments. Returns `(spaced, newline)`.
    fn skip_trivia(&mut self) -> Result<(bool, bool), LexError> {
        let mut spaced = false;
        let mut newline = false;
        loop {
            if self.at_cursor() {
                break;
            }
            match self.peek2() {
                (Some(ch), _) if ch.is_whitespace() => {
                    spaced = true;
                    newline |= ch == '\n';
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    spaced = true;
                    while let Some(&ch) = self.source.peek()
                        && ch != '\n'
                    {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    spaced = true;
                    let start = self.pos;
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek2() {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(ch), _) => {
                                newline |= ch == '\n';
                                self.advance();
                            }
                            (None, _) => {
                                return Err(
                                    LEK::UnterminatedComment.at(Span::new(start, self.pos))
                                );
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok((spaced, newline))
    }

    fn lex_string_lit(&mut self, start: Position) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut buf = String::new();

        loop {
            let Some(&ch) = self.source.peek() else {
                return Err(LEK::UnterminatedString.at(Span::new(start, self.pos)));
            };
            if ch == '\n' {
                return Err(LEK::UnterminatedString.at(Span::new(start, self.pos)));
            }

            self.advance();

            match ch {
                '"' => break,
                '\\' => {
                    let unescaped = self.parse_escape(start)?;
                    buf.push(unescaped);
                }
                _ => buf.push(ch),
            }
        }

        Ok(TokenKind::StringLit(buf))
    }

    fn parse_escape(&mut self, start: Position) -> Result<char, LexError> {
        let Some(esc) = self.source.peek().copied() else {
            return Err(LEK::UnterminatedString.at(Span::new(start, self.pos)));
        };
        self.advance();

        let ch = match esc {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '0' => '\0',
            _ => {
                return Err(LEK::InvalidEscapeSequence(format!("\\{}", esc))
                    .at(Span::new(start, self.pos)));
            }
        };

        Ok(ch)
    }

    fn lex_number(&mut self, start: Position) -> Result<TokenKind, LexError> {
        let mut digits = String::new();
        while let Some(&ch) = self.source.peek()
            && (ch.is_ascii_digit() || ch == '_')
        {
            if ch != '_' {
                digits.push(ch);
            }
            self.advance();
        }

        // A fraction needs a digit after the dot so `1..<2` and `t.0.1` stay intact.
        if let (Some('.'), Some(next)) = self.peek2()
            && next.is_ascii_digit()
        {
            digits.push('.');
            self.advance();
            while let Some(&ch) = self.source.peek()
                && (ch.is_ascii_digit() || ch == '_')
            {
                if ch != '_' {
                    digits.push(ch);
                }
                self.advance();
            }
            return Ok(TokenKind::FloatLit(digits));
        }

        digits
            .parse::<u64>()
            .map(TokenKind::IntLit)
            .map_err(|e| LEK::InvalidInteger(e).at(Span::new(start, self.pos)))
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut ident = String::new();
        while let Some(&ch) = self.source.peek()
            && (ch.is_alphanumeric() || ch == '_')
        {
            ident.push(ch);
            self.advance();
        }
        match ident.as_str() {
            "_" => TokenKind::Underscore,
            "func" => TokenKind::KwFunc,
            "init" => TokenKind::KwInit,
            "subscript" => TokenKind::KwSubscript,
            "var" => TokenKind::KwVar,
            "let" => TokenKind::KwLet,
            "struct" => TokenKind::KwStruct,
            "class" => TokenKind::KwClass,
            "enum" => TokenKind::KwEnum,
            "case" => TokenKind::KwCase,
            "protocol" => TokenKind::KwProtocol,
            "extension" => TokenKind::KwExtension,
            "typealias" => TokenKind::KwTypealias,
            "associatedtype" => TokenKind::KwAssociatedtype,
            "static" => TokenKind::KwStatic,
            "import" => TokenKind::KwImport,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "guard" => TokenKind::KwGuard,
            "while" => TokenKind::KwWhile,
            "for" => TokenKind::KwFor,
            "in" => TokenKind::KwIn,
            "switch" => TokenKind::KwSwitch,
            "default" => TokenKind::KwDefault,
            "return" => TokenKind::KwReturn,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "defer" => TokenKind::KwDefer,
            "throw" => TokenKind::KwThrow,
            "throws" => TokenKind::KwThrows,
            "do" => TokenKind::KwDo,
            "catch" => TokenKind::KwCatch,
            "try" => TokenKind::KwTry,
            "as" => TokenKind::KwAs,
            "nil" => TokenKind::KwNil,
            "self" => TokenKind::KwSelf,
            "Self" => TokenKind::KwSelfType,
            "super" => TokenKind::KwSuper,
            "inout" => TokenKind::KwInout,
            "where" => TokenKind::KwWhere,
            "indirect" => TokenKind::KwIndirect,
            "true" => TokenKind::BoolLit(true),
            "false" => TokenKind::BoolLit(false),
            _ => TokenKind::Ident(ident),
        }
    }

    /// Consumes `first` and, when the next char is one of `follow`, that char too.
    fn lex_op(&mut self, single: TokenKind, follow: &[(char, TokenKind)]) -> TokenKind {
        self.advance();
        if let Some(&next) = self.source.peek() {
            for (ch, kind) in follow {
                if *ch == next {
                    self.advance();
                    return kind.clone();
                }
            }
        }
        single
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let (spaced, newline) = self.skip_trivia()?;

        let start = self.pos;
        if self.at_cursor() {
            self.cursor_emitted = true;
            return Ok(Token {
                kind: TokenKind::CodeCompletion,
                span: Span::point(start),
                spaced,
                newline,
            });
        }

        let kind = match self.source.peek() {
            Some(&ch) if ch.is_alphabetic() || ch == '_' => Ok(self.lex_word()),
            Some(&ch) if ch.is_ascii_digit() => self.lex_number(start),
            Some('"') => self.lex_string_lit(start),
            Some('`') => {
                // Escaped identifier: `default`
                self.advance();
                let mut ident = String::new();
                while let Some(&ch) = self.source.peek()
                    && ch != '`'
                    && ch != '\n'
                {
                    ident.push(ch);
                    self.advance();
                }
                if matches!(self.source.peek(), Some('`')) {
                    self.advance();
                    Ok(TokenKind::Ident(ident))
                } else {
                    Err(LEK::UnexpectedCharacter('`').at(Span::new(start, self.pos)))
                }
            }
            Some('-') => Ok(self.lex_op(
                TokenKind::Minus,
                &[('>', TokenKind::Arrow), ('=', TokenKind::MinusEquals)],
            )),
            Some('+') => Ok(self.lex_op(TokenKind::Plus, &[('=', TokenKind::PlusEquals)])),
            Some('*') => Ok(self.lex_op(TokenKind::Star, &[('=', TokenKind::StarEquals)])),
            Some('/') => Ok(self.lex_op(TokenKind::Slash, &[])),
            Some('%') => Ok(self.lex_op(TokenKind::Percent, &[])),
            Some('=') => Ok(self.lex_op(TokenKind::Equals, &[('=', TokenKind::EqEq)])),
            Some('!') => Ok(self.lex_op(TokenKind::Bang, &[('=', TokenKind::NotEq)])),
            Some('<') => Ok(self.lex_op(TokenKind::LessThan, &[('=', TokenKind::LessThanEq)])),
            Some('>') => Ok(self.lex_op(
                TokenKind::GreaterThan,
                &[('=', TokenKind::GreaterThanEq)],
            )),
            Some('&') => Ok(self.lex_op(TokenKind::Ampersand, &[('&', TokenKind::LogicalAnd)])),
            Some('|') => {
                self.advance();
                if matches!(self.source.peek(), Some('|')) {
                    self.advance();
                    Ok(TokenKind::LogicalOr)
                } else {
                    Err(LEK::UnexpectedCharacter('|').at(Span::new(start, self.pos)))
                }
            }
            Some('?') => Ok(self.lex_op(TokenKind::Question, &[('?', TokenKind::NilCoalesce)])),
            Some('.') => {
                self.advance();
                match self.peek2() {
                    (Some('.'), Some('.')) => {
                        self.advance();
                        self.advance();
                        Ok(TokenKind::Ellipsis)
                    }
                    (Some('.'), Some('<')) => {
                        self.advance();
                        self.advance();
                        Ok(TokenKind::HalfOpenRange)
                    }
                    _ => Ok(TokenKind::Dot),
                }
            }
            Some('(') => Ok(self.lex_op(TokenKind::LParen, &[])),
            Some(')') => Ok(self.lex_op(TokenKind::RParen, &[])),
            Some('[') => Ok(self.lex_op(TokenKind::LBracket, &[])),
            Some(']') => Ok(self.lex_op(TokenKind::RBracket, &[])),
            Some('{') => Ok(self.lex_op(TokenKind::LBrace, &[])),
            Some('}') => Ok(self.lex_op(TokenKind::RBrace, &[])),
            Some(',') => Ok(self.lex_op(TokenKind::Comma, &[])),
            Some(':') => Ok(self.lex_op(TokenKind::Colon, &[])),
            Some(';') => Ok(self.lex_op(TokenKind::Semicolon, &[])),
            Some('@') => Ok(self.lex_op(TokenKind::At, &[])),
            Some(&ch) => {
                self.advance();
                Err(LEK::UnexpectedCharacter(ch).at(Span::new(start, self.pos)))
            }
            None => {
                self.at_eof = true;
                Ok(TokenKind::Eof)
            }
        }?;
        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
            spaced,
            newline,
        })
    }

    pub fn tokenize(self) -> impl Iterator<Item = Result<Token, LexError>> {
        self
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at_eof {
            return None;
        }
        let result = self.next_token();
        if let Err(err) = &result
            && err.kind().is_fatal()
        {
            self.at_eof = true;
        }
        Some(result)
    }
}

/// Lexes a whole buffer, collecting recoverable errors and always ending the
/// stream with an `Eof` token. A fatal error stops lexing.
pub fn lex_all(lexer: Lexer<'_>) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut last_end = Position::START;
    for result in lexer {
        match result {
            Ok(token) => {
                last_end = token.span.end;
                tokens.push(token);
            }
            Err(err) => errors.push(err),
        }
    }
    if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::point(last_end),
            spaced: true,
            newline: true,
        });
    }
    (tokens, errors)
}

#[cfg(test)]
#[path = "../tests/t_lexer.rs"]
mod tests;
