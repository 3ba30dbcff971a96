//! Unqualified name lookup outside of function-local bindings.
//!
//! The chain is: local declarations of enclosing functions, members of the
//! enclosing type contexts (implicit `self`), generic parameters, then
//! top-level declarations of the current module and of every other loaded
//! module. Local variables are bound by the type checker and searched
//! before this chain.

use crate::core::resolve::decl::*;
use crate::core::resolve::lookup::{LookupOrigin, MemberAccess, MemberCandidate, lookup_members};
use crate::core::resolve::modules::ModuleSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeResult {
    pub decl: DeclId,
    pub origin: LookupOrigin,
    /// Set for members found through an enclosing type context.
    pub member: Option<MemberCandidate>,
}

/// Declarations visible from `context` named `name` (all of them for
/// `None`). With a name, lookup stops at the innermost level that has a
/// match; top-level results of all modules are merged.
pub fn lookup_unqualified(
    set: &ModuleSet<'_>,
    context: Option<DeclId>,
    name: Option<&str>,
) -> Vec<ScopeResult> {
    let mut out = Vec::new();
    let mut current = context;
    let mut static_context = false;
    while let Some(id) = current {
        let decl = set.decl(id);
        let level_start = out.len();
        match &decl.kind {
            DeclKind::Func(_) | DeclKind::Constructor { .. } | DeclKind::Accessor { .. } => {
                if decl.is_static {
                    static_context = true;
                }
                for local in local_decls(set, id) {
                    let local_decl = set.decl(local);
                    if name.is_none_or(|name| name == local_decl.name) {
                        out.push(ScopeResult {
                            decl: local,
                            origin: LookupOrigin::Local,
                            member: None,
                        });
                    }
                }
                for param in &decl.generics.params {
                    if name.is_none_or(|name| name == set.decl(*param).name) {
                        out.push(ScopeResult {
                            decl: *param,
                            origin: LookupOrigin::Local,
                            member: None,
                        });
                    }
                }
            }
            DeclKind::Struct(_)
            | DeclKind::Class(_)
            | DeclKind::Enum(_)
            | DeclKind::Protocol(_)
            | DeclKind::Extension(_) => {
                let self_ty = set.self_type_in(id);
                let mut accesses = vec![MemberAccess::Static];
                if !static_context {
                    accesses.insert(0, MemberAccess::Instance);
                }
                for access in accesses {
                    for candidate in lookup_members(set, &self_ty, name, access) {
                        if matches!(set.decl(candidate.decl).kind, DeclKind::Constructor { .. }) {
                            continue;
                        }
                        out.push(ScopeResult {
                            decl: candidate.decl,
                            origin: candidate.origin,
                            member: Some(candidate),
                        });
                    }
                }
                let params = match &decl.kind {
                    DeclKind::Extension(ExtensionInfo {
                        extended: Some(extended),
                        ..
                    }) => set.decl(*extended).generics.params.clone(),
                    DeclKind::Protocol(_) => Vec::new(),
                    _ => decl.generics.params.clone(),
                };
                for param in params {
                    if name.is_none_or(|name| name == set.decl(param).name) {
                        out.push(ScopeResult {
                            decl: param,
                            origin: LookupOrigin::CurrNominal,
                            member: None,
                        });
                    }
                }
                if decl.is_static {
                    static_context = true;
                }
            }
            _ => {}
        }
        if name.is_some() && out.len() > level_start {
            return out;
        }
        current = decl.parent;
    }

    for module in set.search_order() {
        let origin = if module == set.current() {
            LookupOrigin::CurrModule
        } else {
            LookupOrigin::OtherModule
        };
        let loaded = set.module(module);
        for id in &loaded.top_level {
            let decl = loaded.decl(*id);
            if matches!(decl.kind, DeclKind::Extension(_)) {
                continue;
            }
            if name.is_none_or(|name| name == decl.name) {
                out.push(ScopeResult {
                    decl: *id,
                    origin,
                    member: None,
                });
            }
        }
    }
    out
}

/// Declarations nested directly inside a function body.
pub fn local_decls(set: &ModuleSet<'_>, func: DeclId) -> Vec<DeclId> {
    let module = set.module(func.module);
    module
        .decls
        .iter()
        .filter(|decl| {
            decl.parent == Some(func)
                && !matches!(
                    decl.kind,
                    DeclKind::GenericParam { .. } | DeclKind::Accessor { .. }
                )
        })
        .map(|decl| decl.id)
        .collect()
}

/// Innermost type declaration named `name` visible from `context`.
pub fn lookup_type(set: &ModuleSet<'_>, context: Option<DeclId>, name: &str) -> Option<DeclId> {
    let mut current = context;
    while let Some(id) = current {
        let decl = set.decl(id);
        // Generic parameters of this level.
        let params = match &decl.kind {
            DeclKind::Extension(ExtensionInfo {
                extended: Some(extended),
                ..
            }) => set.decl(*extended).generics.params.clone(),
            _ => decl.generics.params.clone(),
        };
        if let Some(param) = params.into_iter().find(|p| set.decl(*p).name == name) {
            return Some(param);
        }
        if let DeclKind::Protocol(info) = &decl.kind {
            if name == "Self" {
                return Some(info.self_param);
            }
        }
        // Nested types, typealiases and associated types.
        let scope_decl = set.nominal_of_context(id).unwrap_or(id);
        let mut members = set.all_members(scope_decl);
        if matches!(decl.kind, DeclKind::Func(_) | DeclKind::Constructor { .. }) {
            members = local_decls(set, id);
        }
        if let Some(found) = members
            .into_iter()
            .find(|m| set.decl(*m).name == name && set.decl(*m).is_type_decl())
        {
            return Some(found);
        }
        // Associated types of inherited protocols.
        if let DeclKind::Protocol(_) = &set.decl(scope_decl).kind {
            for proto in set.protocol_closure(scope_decl) {
                if let Some(found) = set
                    .decl(proto)
                    .members()
                    .iter()
                    .copied()
                    .find(|m| set.decl(*m).name == name && set.decl(*m).is_type_decl())
                {
                    return Some(found);
                }
            }
        }
        current = decl.parent;
    }
    for module in set.search_order() {
        if let Some(found) = set
            .top_level_named(module, name)
            .into_iter()
            .find(|id| set.decl(*id).is_type_decl())
        {
            return Some(found);
        }
    }
    None
}
