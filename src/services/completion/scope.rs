//! Expression-position completions: everything visible by unqualified name.

use crate::core::resolve::{lookup_unqualified, member_substitution};
use crate::core::typecheck::CompletionFacts;
use crate::core::types::{Substitution, Type, TypeRelation};
use crate::services::completion::render::{Collector, Style};
use crate::services::completion::results::{
    CompletionContext, CompletionItem, CompletionKind, DeclCompletionKind, LiteralCompletionKind,
};

pub(super) fn expression_completions(c: &mut Collector<'_, '_>, facts: &CompletionFacts) {
    local_completions(c, facts);
    for result in lookup_unqualified(c.set, facts.context, None) {
        let subst = match &result.member {
            Some(candidate) => member_substitution(c.set, candidate),
            None => Substitution::new(),
        };
        c.decl(result.decl, result.origin, &subst, Style::Plain);
    }
    literal_completions(c);
}

fn local_completions(c: &mut Collector<'_, '_>, facts: &CompletionFacts) {
    for local in &facts.locals {
        if local.name == "_" {
            continue;
        }
        let relation = c.relation(&local.ty);
        let item = CompletionItem {
            kind: CompletionKind::Decl(DeclCompletionKind::LocalVar),
            context: CompletionContext::Local,
            not_recommended: relation == Some(TypeRelation::Invalid),
            type_relation: relation,
            pattern: local.name.clone(),
            result_type: Some(c.ty(&local.ty)),
            name: local.name.clone(),
        };
        c.items.push(item);
    }
    // `self` is a local of every instance member.
    if let Some(context) = facts.context.and_then(|ctx| c.set.type_context_of(ctx)) {
        if !facts.in_static {
            let self_ty = c.set.self_type_in(context);
            let relation = c.relation(&self_ty);
            let item = CompletionItem {
                kind: CompletionKind::Decl(DeclCompletionKind::LocalVar),
                context: CompletionContext::Local,
                not_recommended: false,
                type_relation: relation,
                pattern: "self".to_string(),
                result_type: Some(c.ty(&self_ty)),
                name: "self".to_string(),
            };
            c.items.push(item);
        }
    }
}

fn literal_completions(c: &mut Collector<'_, '_>) {
    let bool_ty = c.set.bool_type();
    for text in ["true", "false"] {
        let relation = c.relation(&bool_ty);
        let item = CompletionItem {
            kind: CompletionKind::Literal(LiteralCompletionKind::Boolean),
            context: CompletionContext::None,
            not_recommended: false,
            type_relation: relation,
            pattern: text.to_string(),
            result_type: Some(c.ty(&bool_ty)),
            name: text.to_string(),
        };
        c.items.push(item);
    }
    let nil_relation = c
        .expected
        .as_ref()
        .map(|expected| match expected {
            Type::Optional(_) => TypeRelation::Convertible,
            _ => TypeRelation::Unrelated,
        });
    c.items.push(CompletionItem {
        kind: CompletionKind::Literal(LiteralCompletionKind::Nil),
        context: CompletionContext::None,
        not_recommended: false,
        type_relation: nil_relation,
        pattern: "nil".to_string(),
        result_type: None,
        name: "nil".to_string(),
    });
}
