use thiserror::Error;

use crate::core::diag::SpannedError;
use crate::core::lexer::{LexError, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
#[allow(clippy::enum_variant_names)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Lex(LexError),

    #[error("Expected declaration, found: {0}")]
    ExpectedDecl(Token),

    #[error("Expected {0}, found: {1}")]
    ExpectedToken(TokenKind, Token),

    #[error("Expected identifier, found: {0}")]
    ExpectedIdent(Token),

    #[error("Expected type, found: {0}")]
    ExpectedType(Token),

    #[error("Expected expression, found: {0}")]
    ExpectedExpr(Token),

    #[error("Expected pattern, found: {0}")]
    ExpectedPattern(Token),

    #[error("Expected member name after '.', found: {0}")]
    ExpectedMemberName(Token),

    #[error("Consecutive statements on a line must be separated by ';'")]
    ConsecutiveStatements,

    #[error("Expected 'get', 'set', 'willSet' or 'didSet' accessor, found: {0}")]
    ExpectedAccessor(Token),

    #[error("'default' must be the last case of a switch")]
    DefaultNotLast,

    #[error("Array literals are not supported")]
    ArrayLiteralUnsupported,
}

pub type ParseError = SpannedError<ParseErrorKind>;
