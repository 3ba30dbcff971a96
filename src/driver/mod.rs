//! Library entry points over a `CompilationSession`.
//!
//! `parse` -> `typecheck` -> `lower` compiles one file; `complete` answers a
//! completion request. None of them add the file to the session.

use crate::core::diag::{CompileError, Diagnostic};
use crate::core::ir::IrModule;
use crate::core::parse::{ParsedFile, parse_source};
use crate::core::session::{CheckedModule, CompilationSession};
use crate::core::tree::NodeIdGen;
use crate::core::tree::format::format_source_file;
use crate::services::completion::results::CompletionItem;

pub use crate::core::ir::format_module;

/// Parses `source` on its own; node ids start at zero. Use
/// [`parse_in`] for a file that will be checked against a session.
pub fn parse(source: &str) -> ParsedFile {
    parse_source(source, NodeIdGen::new())
}

/// Parses `source` with node ids that do not collide with the session's.
pub fn parse_in(session: &CompilationSession, source: &str) -> ParsedFile {
    parse_source(source, session.id_gen())
}

/// Resolves and type-checks `parsed` as the session's current module.
pub fn typecheck(session: &CompilationSession, parsed: ParsedFile) -> CheckedModule {
    let name = session.options().module_name.clone();
    session.check(&name, parsed, None)
}

/// Lowers a checked module. Modules with diagnostics are not lowered.
pub fn lower(
    session: &CompilationSession,
    checked: &CheckedModule,
) -> Result<IrModule, Vec<CompileError>> {
    if checked.has_errors() {
        return Err(checked.errors.clone());
    }
    let set = session.view_with(&checked.module);
    crate::core::lower::lower_module(&set, &checked.parsed.file, &checked.tables, session.options())
}

/// Parses, checks and lowers `source`.
pub fn compile(session: &CompilationSession, source: &str) -> Result<IrModule, Vec<CompileError>> {
    let checked = typecheck(session, parse_in(session, source));
    lower(session, &checked)
}

pub fn complete(session: &CompilationSession, source: &str, offset: usize) -> Vec<CompletionItem> {
    crate::services::completion::complete(session, source, offset)
}

/// Completion at a `#^NAME^#` marker; `None` when the marker is missing.
pub fn complete_at_token(
    session: &CompilationSession,
    source: &str,
    token: &str,
) -> Option<Vec<CompletionItem>> {
    crate::services::completion::complete_at_token(session, source, token)
}

pub fn format_ast(parsed: &ParsedFile) -> String {
    format_source_file(&parsed.file)
}

/// One line per item, framed like the batch completion harness output.
pub fn format_completions(items: &[CompletionItem]) -> String {
    let mut out = format!("Begin completions, {} items\n", items.len());
    for item in items {
        out.push_str(&item.to_string());
        out.push('\n');
    }
    out.push_str("End completions\n");
    out
}

pub fn diagnostics(errors: &[CompileError]) -> Vec<Diagnostic> {
    errors.iter().map(CompileError::to_diagnostic).collect()
}

/// Diagnostics rendered with source snippets.
pub fn format_diagnostics(source: &str, errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(|err| err.to_diagnostic().render(source))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "../tests/t_driver.rs"]
mod tests;
