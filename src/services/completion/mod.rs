//! Code completion.
//!
//! A request re-parses the file with the cursor injected as a token, checks
//! it tolerantly against the session without loading it, and dispatches on
//! the syntactic site the parser recorded:
//!
//! - `BeforeDot`: locals, everything visible by unqualified lookup, literals
//! - `AfterDot`: members of the base type (dynamic lookup for `AnyObject`)
//! - `InsideCallArgList`/`InsideSubscriptArgList`: call patterns or the
//!   labels of the next parameters of every viable overload
//! - `InPatternPosition`: enum elements of the subject type
//!
//! Items are then filtered by the typed prefix, deduplicated by their
//! rendered line and ranked.

mod args;
mod member;
mod render;
pub mod results;
mod scope;
mod site;

use std::collections::HashSet;

use crate::core::parse::{CompletionSite, parse_source_with_cursor};
use crate::core::resolve::ModuleSet;
use crate::core::session::CompilationSession;
use crate::core::typecheck::CompletionFacts;
use crate::services::completion::render::Collector;
use crate::services::completion::results::CompletionItem;
use crate::services::completion::site::CursorSource;

pub use site::strip_markers;

/// Completions at byte `offset` of `source`. The session is not modified.
pub fn complete(session: &CompilationSession, source: &str, offset: usize) -> Vec<CompletionItem> {
    let cursor = CursorSource::new(source, offset);
    let parsed = parse_source_with_cursor(&cursor.text, cursor.offset, session.id_gen());
    let site = parsed.completion.clone();
    let module_name = session.options().module_name.clone();
    let checked = session.check(&module_name, parsed, site.clone());
    let facts = checked.completion.clone().unwrap_or_default();
    let set = session.view_with(&checked.module);
    tracing::debug!(
        target: "pipeline",
        stage = "complete",
        site = ?site,
        prefix = %cursor.prefix,
        "completion request"
    );
    let items = collect(&set, site.as_ref(), &facts, cursor.rest());
    let items = completion_post_pass(items, &cursor.prefix);
    tracing::debug!(target: "pipeline", stage = "complete", items = items.len(), "completions ranked");
    items
}

/// Completions at the `#^token^#` marker. All markers are removed first.
/// Returns `None` when the marker is missing.
pub fn complete_at_token(
    session: &CompilationSession,
    source: &str,
    token: &str,
) -> Option<Vec<CompletionItem>> {
    let (text, offset) = strip_markers(source, token)?;
    Some(complete(session, &text, offset))
}

fn collect(
    set: &ModuleSet<'_>,
    site: Option<&CompletionSite>,
    facts: &CompletionFacts,
    rest: &str,
) -> Vec<CompletionItem> {
    let mut c = Collector::new(set, facts.expected.clone());
    match site {
        Some(CompletionSite::AfterDot { base: Some(_), .. }) => {
            if let Some(base) = &facts.base {
                member::member_completions(&mut c, base);
            }
        }
        Some(CompletionSite::AfterDot { base: None, .. }) => {
            if let Some(base) = &facts.base {
                member::implicit_member_completions(&mut c, base);
            }
        }
        Some(
            CompletionSite::InsideCallArgList { .. } | CompletionSite::InsideSubscriptArgList { .. },
        ) => args::argument_completions(&mut c, facts, rest),
        Some(CompletionSite::InPatternPosition { after_dot, .. }) => {
            member::pattern_completions(&mut c, facts.base.as_ref(), *after_dot);
            if !after_dot {
                scope::expression_completions(&mut c, facts);
            }
        }
        // Without a recorded site (the cursor sits somewhere the parser
        // could not attribute) everything visible is offered.
        Some(CompletionSite::BeforeDot { .. }) | None => {
            scope::expression_completions(&mut c, facts);
        }
    }
    c.items
}

fn completion_post_pass(mut items: Vec<CompletionItem>, prefix: &str) -> Vec<CompletionItem> {
    items.retain(|item| item.name.starts_with(prefix));
    let mut seen = HashSet::<String>::new();
    items.retain(|item| seen.insert(item.to_string()));
    items.sort_by(|a, b| {
        a.relation_rank()
            .cmp(&b.relation_rank())
            .then_with(|| a.context.rank().cmp(&b.context.rank()))
            .then_with(|| b.is_recommended().cmp(&a.is_recommended()))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    items
}

#[cfg(test)]
#[path = "../../tests/services/completion/t_completion.rs"]
mod tests;
