//! Recursive-descent parser.
//!
//! Every `parse_*` method returns a node; failures are recorded in
//! `errors` and replaced with `Error` placeholders, so one malformed
//! statement never hides the rest of the file from later stages.

use crate::core::diag::{Position, Span};
use crate::core::lexer::{LexError, Lexer, Token, TokenKind, TokenKind as TK, lex_all};
use crate::core::tree::*;

mod decl;
mod errors;
mod expr;
mod pattern;
mod stmt;
mod type_expr;

pub use errors::{ParseError, ParseErrorKind};

/// Syntactic position of a completion cursor, recorded while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSite {
    /// Bare expression position: `let x = <cursor>`.
    BeforeDot { expr: NodeId },
    /// Member position: `base.<cursor>`; `base` is `None` for `.<cursor>`.
    AfterDot { base: Option<NodeId>, expr: NodeId },
    /// Start of an unlabeled argument: `f(1, <cursor>)`.
    InsideCallArgList {
        call: NodeId,
        arg_index: usize,
        expr: NodeId,
    },
    /// Start of a subscript argument: `s[<cursor>]`.
    InsideSubscriptArgList {
        subscript: NodeId,
        arg_index: usize,
        expr: NodeId,
    },
    /// Pattern position: `case <cursor>` or `case .<cursor>`.
    InPatternPosition { pattern: NodeId, after_dot: bool },
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file: SourceFile,
    pub errors: Vec<ParseError>,
    pub completion: Option<CompletionSite>,
    pub id_gen: NodeIdGen,
}

impl ParsedFile {
    pub fn has_fatal_lex_error(&self) -> bool {
        self.errors
            .iter()
            .any(|err| matches!(err.kind(), ParseErrorKind::Lex(lex) if lex.kind().is_fatal()))
    }
}

/// Lexes and parses `source`.
pub fn parse_source(source: &str, id_gen: NodeIdGen) -> ParsedFile {
    parse_tokens_from(Lexer::new(source), id_gen)
}

/// Lexes and parses `source` with a completion cursor at byte `offset`.
pub fn parse_source_with_cursor(source: &str, offset: usize, id_gen: NodeIdGen) -> ParsedFile {
    parse_tokens_from(Lexer::with_cursor(source, offset), id_gen)
}

fn parse_tokens_from(lexer: Lexer<'_>, id_gen: NodeIdGen) -> ParsedFile {
    let (tokens, lex_errors) = lex_all(lexer);
    let mut parser = Parser::new_with_id_gen(&tokens, id_gen);
    parser.record_lex_errors(lex_errors);
    let file = parser.parse();
    ParsedFile {
        file,
        errors: parser.errors,
        completion: parser.completion,
        id_gen: parser.id_gen,
    }
}

#[derive(Debug, Clone, Copy)]
struct Marker {
    pos: Position,
    token_index: usize,
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    curr_token: &'a Token,
    id_gen: NodeIdGen,
    errors: Vec<ParseError>,
    completion: Option<CompletionSite>,
    // Trailing closures are not allowed in `if`/`while`/`guard` conditions.
    allow_trailing_closure: bool,
    // Inside protocol bodies accessors are requirements (`{ get set }`).
    in_protocol: bool,
}

const DECL_MODIFIERS: &[&str] = &[
    "mutating",
    "nonmutating",
    "override",
    "final",
    "public",
    "private",
    "fileprivate",
    "internal",
    "open",
    "required",
    "convenience",
    "dynamic",
    "lazy",
    "weak",
    "optional",
];

impl<'a> Parser<'a> {
    /// `tokens` must end with an `Eof` token.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self::new_with_id_gen(tokens, NodeIdGen::new())
    }

    pub fn new_with_id_gen(tokens: &'a [Token], id_gen: NodeIdGen) -> Self {
        Parser {
            tokens,
            pos: 0,
            curr_token: &tokens[0],
            id_gen,
            errors: Vec::new(),
            completion: None,
            allow_trailing_closure: true,
            in_protocol: false,
        }
    }

    pub fn into_id_gen(self) -> NodeIdGen {
        self.id_gen
    }

    fn record_lex_errors(&mut self, errors: Vec<LexError>) {
        for err in errors {
            let span = err.span();
            self.errors
                .push(ParseError::new(ParseErrorKind::Lex(err), span));
        }
    }

    pub fn parse(&mut self) -> SourceFile {
        let mut items = Vec::new();
        while self.curr_token.kind != TK::Eof {
            let start = self.pos;
            if self.curr_token.kind == TK::Semicolon {
                self.advance();
                continue;
            }
            items.push(self.parse_item_or_stmt());
            if self.pos == start {
                // Nothing consumed: skip the offending token.
                self.advance();
            }
        }
        SourceFile { items }
    }

    // --- Token helpers ---

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
            self.curr_token = &self.tokens[self.pos];
        }
    }

    fn peek(&self) -> &'a Token {
        let index = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn peek_at(&self, n: usize) -> &'a Token {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.curr_token.kind == *kind
    }

    fn mark(&self) -> Marker {
        Marker {
            pos: self.curr_token.span.start,
            token_index: self.pos,
        }
    }

    fn close(&self, marker: Marker) -> Span {
        let end = if self.pos == marker.token_index {
            self.curr_token.span.start
        } else {
            self.tokens[self.pos - 1].span.end
        };
        Span::new(marker.pos, end)
    }

    fn error(&mut self, kind: ParseErrorKind, span: Span) {
        self.errors.push(ParseError::new(kind, span));
    }

    fn error_here(&mut self, kind: ParseErrorKind) {
        let span = self.curr_token.span;
        self.error(kind, span);
    }

    /// Consumes `expected` or records an error without consuming anything.
    fn expect(&mut self, expected: &TokenKind) -> bool {
        if self.curr_token.kind == *expected {
            self.advance();
            true
        } else {
            self.error_here(ParseErrorKind::ExpectedToken(
                expected.clone(),
                self.curr_token.clone(),
            ));
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.curr_token.kind == *kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_ident(&mut self) -> Option<String> {
        if let TK::Ident(name) = &self.curr_token.kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            self.error_here(ParseErrorKind::ExpectedIdent(self.curr_token.clone()));
            None
        }
    }

    fn is_contextual_keyword(&self, keyword: &str) -> bool {
        matches!(&self.curr_token.kind, TK::Ident(name) if name == keyword)
    }

    /// Comma separated list up to (not including) `end_token`.
    fn parse_list<T>(
        &mut self,
        end_token: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> T,
    ) -> Vec<T> {
        let mut items = vec![];
        while !self.at(&end_token) && !self.at(&TK::Eof) {
            let start = self.pos;
            items.push(parse_item(self));
            if !self.eat(&TK::Comma) {
                break;
            }
            if self.pos == start {
                break;
            }
        }
        items
    }

    fn record_completion(&mut self, site: CompletionSite) {
        if self.completion.is_none() {
            self.completion = Some(site);
        }
    }

    /// Statement/declaration boundary: a token on a new line, `;`, `}` or EOF.
    fn at_stmt_boundary(&self) -> bool {
        self.curr_token.newline
            || matches!(self.curr_token.kind, TK::Semicolon | TK::RBrace | TK::Eof)
    }

    /// Skips tokens until a statement boundary, keeping braces balanced.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.curr_token.kind {
                TK::Eof => return,
                TK::LBrace => depth += 1,
                TK::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TK::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TK::CodeCompletion => return,
                _ => {}
            }
            self.advance();
            if depth == 0 && self.curr_token.newline {
                return;
            }
        }
    }

    /// After a statement, the next one must start on a new line or after `;`.
    fn finish_stmt(&mut self) {
        if self.eat(&TK::Semicolon) {
            return;
        }
        if !self.at_stmt_boundary() && !self.at(&TK::CodeCompletion) {
            self.error_here(ParseErrorKind::ConsecutiveStatements);
            self.synchronize();
        }
    }

    // --- Items ---

    fn starts_decl(&self) -> bool {
        self.starts_decl_at(0)
    }

    fn starts_decl_at(&self, n: usize) -> bool {
        let token = self.peek_at(n);
        match &token.kind {
            TK::KwFunc
            | TK::KwInit
            | TK::KwSubscript
            | TK::KwVar
            | TK::KwLet
            | TK::KwStruct
            | TK::KwClass
            | TK::KwEnum
            | TK::KwCase
            | TK::KwProtocol
            | TK::KwExtension
            | TK::KwTypealias
            | TK::KwAssociatedtype
            | TK::KwStatic
            | TK::KwImport
            | TK::KwIndirect
            | TK::At => true,
            TK::Ident(name) if DECL_MODIFIERS.contains(&name.as_str()) => {
                self.starts_decl_at(n + 1)
            }
            _ => false,
        }
    }

    fn parse_item_or_stmt(&mut self) -> Item {
        if self.starts_decl() && !self.at(&TK::KwCase) {
            self.parse_item()
        } else {
            let marker = self.mark();
            let stmt = self.parse_stmt();
            Item {
                id: self.id_gen.new_id(),
                attrs: Vec::new(),
                modifiers: Modifiers::default(),
                kind: ItemKind::Stmt(stmt),
                span: self.close(marker),
            }
        }
    }

    fn parse_attribute_list(&mut self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        while self.at(&TK::At) {
            let marker = self.mark();
            self.advance();
            let Some(name) = self.parse_ident() else {
                break;
            };
            let mut args = Vec::new();
            if self.at(&TK::LParen) && !self.curr_token.spaced {
                self.advance();
                let mut current = String::new();
                let mut depth = 0usize;
                loop {
                    match &self.curr_token.kind {
                        TK::Eof => break,
                        TK::RParen if depth == 0 => {
                            self.advance();
                            break;
                        }
                        TK::Comma if depth == 0 => {
                            args.push(std::mem::take(&mut current));
                            self.advance();
                            continue;
                        }
                        TK::LParen => depth += 1,
                        TK::RParen => depth -= 1,
                        _ => {}
                    }
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&token_text(&self.curr_token.kind));
                    self.advance();
                }
                if !current.is_empty() {
                    args.push(current);
                }
            }
            attrs.push(Attribute {
                name,
                args,
                span: self.close(marker),
            });
        }
        attrs
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            match &self.curr_token.kind {
                TK::KwStatic => modifiers.is_static = true,
                TK::KwIndirect => modifiers.indirect = true,
                // `class func` / `class var` mean `static` for our purposes.
                TK::KwClass
                    if matches!(
                        self.peek().kind,
                        TK::KwFunc | TK::KwVar | TK::KwLet | TK::KwSubscript
                    ) =>
                {
                    modifiers.is_static = true
                }
                TK::Ident(name)
                    if DECL_MODIFIERS.contains(&name.as_str()) && self.starts_decl_at(1) =>
                {
                    match name.as_str() {
                        "mutating" => modifiers.mutating = true,
                        "override" => modifiers.is_override = true,
                        _ => {}
                    }
                }
                _ => break,
            }
            self.advance();
        }
        modifiers
    }
}

/// Source spelling of a token, used for attribute arguments.
fn token_text(kind: &TokenKind) -> String {
    match kind {
        TK::Ident(name) => name.clone(),
        TK::IntLit(value) => value.to_string(),
        TK::FloatLit(text) => text.clone(),
        TK::StringLit(text) => format!("\"{text}\""),
        TK::BoolLit(value) => value.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/parse/t_parse.rs"]
mod tests;
