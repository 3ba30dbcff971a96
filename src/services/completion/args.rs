//! Completions inside a call or subscript argument list.
//!
//! After `(` with nothing written yet every candidate contributes its whole
//! call pattern. Later, each still viable candidate contributes the labels of
//! the parameters that could take the next argument; an unlabeled parameter
//! there means any expression fits, so expression completions follow.

use crate::core::resolve::{DeclKind, LookupOrigin, ParamShape, next_params};
use crate::core::typecheck::{CallCandidateFacts, CallFacts, CompletionFacts};
use crate::core::types::{Type, TypeRelation, type_relation};
use crate::services::completion::render::{Collector, call_name, not_recommended};
use crate::services::completion::results::{
    CompletionContext, CompletionItem, CompletionKind, DeclCompletionKind,
};
use crate::services::completion::scope::expression_completions;

pub(super) fn argument_completions(
    c: &mut Collector<'_, '_>,
    facts: &CompletionFacts,
    rest: &str,
) {
    let Some(call) = &facts.call else {
        expression_completions(c, facts);
        return;
    };
    let rest = rest.trim_start();
    let closes = rest.is_empty() || rest.starts_with(')') || rest.starts_with(']');
    if call.args_before.is_empty() && closes && !call.subscript {
        for candidate in &call.candidates {
            call_pattern(c, candidate, call.expected.as_ref());
        }
        if !call.candidates.is_empty() {
            return;
        }
    }
    let unlabeled = label_completions(c, call);
    if let Some(param_ty) = unlabeled {
        if c.expected.is_none() && !param_ty.is_error() {
            c.expected = Some(param_ty);
        }
        expression_completions(c, facts);
    }
}

/// Adds the labels the next argument may take. Returns the type of an
/// unlabeled parameter that could take it, if any (an error type when no
/// candidate is viable at all).
fn label_completions(c: &mut Collector<'_, '_>, call: &CallFacts) -> Option<Type> {
    let mut unlabeled = None;
    let mut viable = false;
    for candidate in &call.candidates {
        let shapes = candidate
            .params
            .iter()
            .map(ParamShape::from_decl)
            .collect::<Vec<_>>();
        let Some(next) = next_params(&shapes, &call.args_before) else {
            continue;
        };
        viable = true;
        for index in next {
            let param = &candidate.params[index];
            match &param.label {
                Some(label) => c.items.push(CompletionItem {
                    kind: CompletionKind::Keyword,
                    context: CompletionContext::ExprSpecific,
                    not_recommended: false,
                    type_relation: None,
                    pattern: format!("{label}: "),
                    result_type: Some("Argument name".to_string()),
                    name: format!("{label}:"),
                }),
                None => {
                    unlabeled.get_or_insert_with(|| param.ty.clone());
                }
            }
        }
    }
    if !viable {
        return Some(Type::Error);
    }
    unlabeled
}

/// `({#a: Int#}, {#b: Int#})[#R#]` for one overload, ranked against the
/// type the call itself must produce.
fn call_pattern(c: &mut Collector<'_, '_>, candidate: &CallCandidateFacts, expected: Option<&Type>) {
    let identity = |ty: &Type| ty.clone();
    let params = c.params(&candidate.params, &identity);
    let relation = expected.map(|expected| type_relation(c.set, &candidate.result, expected));
    let (kind, context, not_recommended, base) = match candidate.decl {
        Some(id) => {
            let decl = c.set.decl(id);
            let kind = match &decl.kind {
                DeclKind::EnumElement { .. } => DeclCompletionKind::EnumElement,
                _ => c.kind_of(decl).unwrap_or(DeclCompletionKind::FreeFunction),
            };
            let base = match &decl.kind {
                DeclKind::Constructor { .. } => String::new(),
                _ => decl.name.clone(),
            };
            (
                kind,
                c.context(candidate.origin, id),
                not_recommended(decl, relation),
                base,
            )
        }
        None => (
            DeclCompletionKind::LocalVar,
            match candidate.origin {
                LookupOrigin::Local => CompletionContext::Local,
                _ => CompletionContext::CurrModule,
            },
            relation == Some(TypeRelation::Invalid),
            String::new(),
        ),
    };
    let item = CompletionItem {
        kind: CompletionKind::Decl(kind),
        context,
        not_recommended,
        type_relation: relation,
        pattern: format!("({params})"),
        result_type: Some(c.ty(&candidate.result)),
        name: call_name(&base, &candidate.params),
    };
    c.items.push(item);
}
