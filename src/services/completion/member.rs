//! Member completions after `base.`, after a bare `.`, and in `case`
//! patterns.

use crate::core::resolve::{DeclKind, MemberAccess, dynamic_lookup, lookup_members};
use crate::core::types::Type;
use crate::services::completion::render::{Collector, Style};

/// Members of the type of the expression before the dot.
pub(super) fn member_completions(c: &mut Collector<'_, '_>, base: &Type) {
    match base {
        Type::AnyObject => {
            for candidate in dynamic_lookup(c.set, None) {
                c.member(&candidate, Style::Dynamic);
            }
        }
        Type::Metatype(inner) => {
            for candidate in lookup_members(c.set, inner, None, MemberAccess::Static) {
                c.member(&candidate, Style::Plain);
            }
            // Instance methods named through their type are curried on `self`.
            for candidate in lookup_members(c.set, inner, None, MemberAccess::Instance) {
                if matches!(c.set.decl(candidate.decl).kind, DeclKind::Func(_)) {
                    c.member(&candidate, Style::Curried);
                }
            }
        }
        Type::Error => {}
        _ => {
            for candidate in lookup_members(c.set, base, None, MemberAccess::Instance) {
                c.member(&candidate, Style::Plain);
            }
        }
    }
}

/// `.member` with the base inferred from the contextual type; `base` is the
/// metatype of that type. Only members that can produce a value of it are
/// offered.
pub(super) fn implicit_member_completions(c: &mut Collector<'_, '_>, base: &Type) {
    let Type::Metatype(inner) = base else {
        return;
    };
    for candidate in lookup_members(c.set, inner, None, MemberAccess::Static) {
        let decl = c.set.decl(candidate.decl);
        match &decl.kind {
            DeclKind::EnumElement { .. } => c.member(&candidate, Style::Plain),
            DeclKind::Var(_) | DeclKind::Func(_) if decl.is_static => {
                c.member(&candidate, Style::Plain)
            }
            _ => {}
        }
    }
}

/// Enum elements of the subject type of a `case` pattern.
pub(super) fn pattern_completions(c: &mut Collector<'_, '_>, base: Option<&Type>, after_dot: bool) {
    let subject = match (base, &c.expected) {
        (Some(Type::Metatype(inner)), _) => (**inner).clone(),
        (_, Some(expected)) => expected.clone(),
        _ => return,
    };
    let subject = match subject {
        Type::Optional(payload) => *payload,
        other => other,
    };
    let start = c.items.len();
    for candidate in lookup_members(c.set, &subject, None, MemberAccess::Static) {
        if matches!(c.set.decl(candidate.decl).kind, DeclKind::EnumElement { .. }) {
            c.member(&candidate, Style::Plain);
        }
    }
    if !after_dot {
        for item in &mut c.items[start..] {
            item.pattern.insert(0, '.');
        }
    }
}
