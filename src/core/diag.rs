use std::fmt::{self, Display, Formatter};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    /// Byte offset into the source buffer.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn point(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start.offset <= offset && offset <= self.end.offset
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// An error kind paired with the source range it applies to. Every stage
/// defines its own kind enum and aliases this wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedError<K> {
    kind: K,
    span: Span,
}

impl<K> SpannedError<K> {
    pub fn new(kind: K, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn into_kind(self) -> K {
        self.kind
    }
}

impl<K: Display> Display for SpannedError<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl<K: fmt::Debug + Display> std::error::Error for SpannedError<K> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCategory {
    SyntaxError,
    AmbiguousOverload,
    MissingArgumentLabel,
    ExtraArgumentLabel,
    IncorrectArgumentLabel,
    OutOfOrderArgument,
    MissingArgument,
    ExtraArgument,
    TupleSplat,
    TypeMismatch,
    UnresolvedIdentifier,
    UnresolvedMember,
    NonConformance,
    MissingWitness,
    Semantic,
}

impl Display for DiagnosticCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticCategory::SyntaxError => "syntax",
            DiagnosticCategory::AmbiguousOverload => "ambiguous-overload",
            DiagnosticCategory::MissingArgumentLabel => "missing-argument-label",
            DiagnosticCategory::ExtraArgumentLabel => "extra-argument-label",
            DiagnosticCategory::IncorrectArgumentLabel => "incorrect-argument-label",
            DiagnosticCategory::OutOfOrderArgument => "out-of-order-argument",
            DiagnosticCategory::MissingArgument => "missing-argument",
            DiagnosticCategory::ExtraArgument => "extra-argument",
            DiagnosticCategory::TupleSplat => "tuple-splat",
            DiagnosticCategory::TypeMismatch => "type-mismatch",
            DiagnosticCategory::UnresolvedIdentifier => "unresolved-identifier",
            DiagnosticCategory::UnresolvedMember => "unresolved-member",
            DiagnosticCategory::NonConformance => "non-conformance",
            DiagnosticCategory::MissingWitness => "missing-witness",
            DiagnosticCategory::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

/// User-facing form of any stage error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(category: DiagnosticCategory, span: Span, message: impl Into<String>) -> Self {
        Self {
            category,
            span,
            message: message.into(),
        }
    }

    pub fn render(&self, source: &str) -> String {
        format_error(source, self.span, &self.message)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: error[{}]: {}",
            self.span.start.line, self.span.start.column, self.category, self.message
        )
    }
}

/// Any stage error, as returned by the driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] crate::core::parse::ParseError),
    #[error(transparent)]
    Resolve(#[from] crate::core::resolve::ResolveError),
    #[error(transparent)]
    Conformance(#[from] crate::core::conformance::ConformanceError),
    #[error(transparent)]
    TypeCheck(#[from] crate::core::typecheck::TypeCheckError),
    #[error(transparent)]
    Lower(#[from] crate::core::lower::LowerError),
    #[error(transparent)]
    Verify(#[from] crate::core::ir::verify::VerifyError),
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::Parse(err) => err.span(),
            CompileError::Resolve(err) => err.span(),
            CompileError::Conformance(err) => err.span(),
            CompileError::TypeCheck(err) => err.span(),
            CompileError::Lower(err) => err.span(),
            CompileError::Verify(err) => err.span(),
        }
    }

    pub fn category(&self) -> DiagnosticCategory {
        match self {
            CompileError::Parse(_) => DiagnosticCategory::SyntaxError,
            CompileError::Resolve(err) => err.kind().category(),
            CompileError::Conformance(err) => err.kind().category(),
            CompileError::TypeCheck(err) => err.kind().category(),
            CompileError::Lower(_) | CompileError::Verify(_) => DiagnosticCategory::Semantic,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.category(), self.span(), self.to_string())
    }
}

fn build_marker(len: usize, single_line: bool) -> String {
    if single_line && len == 1 {
        "^".to_string()
    } else {
        "-".repeat(len.max(1))
    }
}

/// Formats an error message with a source snippet and marker lines highlighting
/// the span. One line of context is shown before and after the span.
///
/// ```text
/// (3:9) Unexpected character: $
/// │ 2 │ func main() {
/// │ 3 │ let a = $
/// │   │         ^
/// │ 4 │ }
/// ```
pub fn format_error(source: &str, span: Span, error: impl Display) -> String {
    let start_line = span.start.line.max(1);
    let end_line = span.end.line.max(start_line);
    let lines: Vec<&str> = source.lines().collect();

    let first_line = start_line.saturating_sub(1).max(1);
    let last_line = (end_line + 1).min(lines.len()).max(first_line);

    let number_width = last_line.to_string().len();

    let mut out = String::new();
    out.push_str(&format!(
        "({}:{}) {}\n",
        span.start.line, span.start.column, error
    ));

    let single_line = start_line == end_line;

    for line_no in first_line..=last_line {
        let content = lines.get(line_no - 1).copied().unwrap_or("");
        out.push_str(&format!(
            "│ {:>number_width$} │ {}\n",
            line_no,
            content,
            number_width = number_width
        ));

        if line_no < start_line || line_no > end_line {
            continue;
        }

        let start_col = if line_no == span.start.line {
            span.start.column.max(1)
        } else {
            1
        };
        let end_col_excl = if line_no == span.end.line {
            span.end.column.max(start_col + 1)
        } else {
            content.chars().count() + 1
        };

        if end_col_excl > start_col {
            let len = end_col_excl - start_col;
            let mut marker = String::with_capacity(start_col - 1 + len);
            marker.push_str(&" ".repeat(start_col - 1));
            marker.push_str(&build_marker(len, single_line));
            out.push_str(&format!(
                "│ {:>number_width$} │ {}\n",
                "",
                marker,
                number_width = number_width
            ));
        }
    }
    out
}

#[cfg(test)]
#[path = "../tests/t_diag.rs"]
mod tests;
