//! Member lookup through nominal members, extensions, superclasses and
//! protocols.

use serde::Serialize;

use crate::core::resolve::decl::*;
use crate::core::resolve::modules::ModuleSet;
use crate::core::types::{Substitution, Type, render_type};

/// Where a declaration was found relative to the lookup site. The order of
/// variants is the proximity order used for tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LookupOrigin {
    Local,
    CurrNominal,
    Super,
    CurrModule,
    OtherModule,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAccess {
    /// `value.member`
    Instance,
    /// `Type.member`
    Static,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberCandidate {
    pub decl: DeclId,
    pub origin: LookupOrigin,
    /// Type whose generic arguments (and protocol `Self`) apply to the
    /// member's interface type.
    pub base: Type,
}

fn name_matches(decl: &Decl, name: Option<&str>) -> bool {
    match name {
        Some(name) => {
            decl.name == name || (name == "init" && matches!(decl.kind, DeclKind::Constructor { .. }))
        }
        None => true,
    }
}

fn access_matches(decl: &Decl, access: MemberAccess) -> bool {
    match (&decl.kind, access) {
        (DeclKind::Accessor { .. } | DeclKind::Extension(_), _) => false,
        (DeclKind::GenericParam { .. }, _) => false,
        (DeclKind::Constructor { .. } | DeclKind::EnumElement { .. }, access) => {
            access == MemberAccess::Static
        }
        (DeclKind::Func(_) | DeclKind::Var(_) | DeclKind::Subscript { .. }, access) => {
            decl.is_static == (access == MemberAccess::Static)
        }
        // Nested types, aliases and associated types.
        (_, access) => access == MemberAccess::Static,
    }
}

/// Key under which a member overrides or shadows another one.
pub fn signature_key(set: &ModuleSet<'_>, decl: &Decl, self_ty: &Type) -> String {
    let mut subst = set.substitution_for(self_ty);
    if let Some(proto) = decl.parent.and_then(|p| set.nominal_of_context(p)) {
        if let DeclKind::Protocol(info) = &set.decl(proto).kind {
            subst.insert(info.self_param, self_ty.clone());
        }
    }
    let ty = match &decl.kind {
        DeclKind::Func(sig) | DeclKind::Constructor { sig, .. } | DeclKind::Subscript { sig, .. } => {
            sig.fn_type()
        }
        DeclKind::Var(info) => info.ty.clone(),
        _ => Type::Error,
    };
    let ty = set.normalize(&subst.apply(&ty));
    format!("{}:{}", decl.full_name(), render_type(&ty, set))
}

pub fn lookup_members(
    set: &ModuleSet<'_>,
    base: &Type,
    name: Option<&str>,
    access: MemberAccess,
) -> Vec<MemberCandidate> {
    let mut out = Vec::new();
    match base {
        Type::Nominal { .. } | Type::Optional(_) => {
            lookup_nominal_members(set, base, name, access, &mut out);
        }
        Type::GenericParam(_) | Type::DependentMember { .. } => {
            if let Some(superclass) = set.superclass_of(base) {
                lookup_nominal_members(set, &superclass, name, access, &mut out);
                for candidate in &mut out {
                    candidate.origin = LookupOrigin::Super;
                }
            }
            let protos = set.abstract_bounds(base);
            lookup_protocol_members(set, base, &protos, name, access, &mut out);
        }
        Type::Existential(protos) => {
            lookup_protocol_members(set, base, protos, name, access, &mut out);
        }
        Type::Metatype(inner) => {
            return lookup_members(set, inner, name, MemberAccess::Static);
        }
        _ => {}
    }
    out
}

fn lookup_nominal_members(
    set: &ModuleSet<'_>,
    base: &Type,
    name: Option<&str>,
    access: MemberAccess,
    out: &mut Vec<MemberCandidate>,
) {
    let Some(nominal) = set.nominal_decl_of(base) else {
        return;
    };
    let mut keys = Vec::new();
    let own = set.all_members(nominal);
    let declares_init = own
        .iter()
        .any(|id| matches!(set.decl(*id).kind, DeclKind::Constructor { .. }));
    for id in own {
        let decl = set.decl(id);
        if name_matches(decl, name) && access_matches(decl, access) {
            keys.push(signature_key(set, decl, base));
            out.push(MemberCandidate {
                decl: id,
                origin: LookupOrigin::CurrNominal,
                base: base.clone(),
            });
        }
    }

    // Superclass chain; overridden members stay hidden.
    let mut current = set.superclass_of(base);
    let mut guard = 0;
    while let Some(superclass) = current {
        guard += 1;
        if guard > 64 {
            break;
        }
        if let Some(super_decl) = superclass.nominal_decl() {
            for id in set.all_members(super_decl) {
                let decl = set.decl(id);
                if !name_matches(decl, name) || !access_matches(decl, access) {
                    continue;
                }
                if matches!(decl.kind, DeclKind::Constructor { .. }) && declares_init {
                    continue;
                }
                let key = signature_key(set, decl, &superclass);
                if keys.contains(&key) {
                    continue;
                }
                keys.push(key);
                out.push(MemberCandidate {
                    decl: id,
                    origin: LookupOrigin::Super,
                    base: superclass.clone(),
                });
            }
        }
        current = set.superclass_of(&superclass);
    }

    // Protocol extension defaults, hidden by concrete members.
    for proto in set.all_protocols(nominal) {
        for ext in set.extensions_of(proto) {
            for id in set.decl(*ext).members() {
                let decl = set.decl(*id);
                if !name_matches(decl, name) || !access_matches(decl, access) {
                    continue;
                }
                let key = signature_key(set, decl, base);
                if keys.contains(&key) {
                    continue;
                }
                keys.push(key);
                out.push(MemberCandidate {
                    decl: *id,
                    origin: LookupOrigin::Super,
                    base: base.clone(),
                });
            }
        }
    }
}

fn lookup_protocol_members(
    set: &ModuleSet<'_>,
    base: &Type,
    protos: &[DeclId],
    name: Option<&str>,
    access: MemberAccess,
    out: &mut Vec<MemberCandidate>,
) {
    let mut keys = out
        .iter()
        .map(|candidate| signature_key(set, set.decl(candidate.decl), base))
        .collect::<Vec<_>>();
    let mut seen = Vec::new();
    for direct in protos {
        for proto in set.protocol_closure(*direct) {
            if seen.contains(&proto) {
                continue;
            }
            seen.push(proto);
            let origin = if proto == *direct {
                LookupOrigin::CurrNominal
            } else {
                LookupOrigin::Super
            };
            let requirements = set.decl(proto).members().to_vec();
            let defaults = set
                .extensions_of(proto)
                .iter()
                .flat_map(|ext| set.decl(*ext).members().to_vec())
                .collect::<Vec<_>>();
            for (id, origin) in requirements
                .into_iter()
                .map(|id| (id, origin))
                .chain(defaults.into_iter().map(|id| (id, LookupOrigin::Super)))
            {
                let decl = set.decl(id);
                if !name_matches(decl, name) || !access_matches(decl, access) {
                    continue;
                }
                let key = signature_key(set, decl, base);
                if keys.contains(&key) {
                    continue;
                }
                keys.push(key);
                out.push(MemberCandidate {
                    decl: id,
                    origin,
                    base: base.clone(),
                });
            }
        }
    }
}

/// Substitution for a member found on `candidate.base`, including the
/// protocol `Self` parameter when the member belongs to a protocol or one
/// of its extensions.
pub fn member_substitution(set: &ModuleSet<'_>, candidate: &MemberCandidate) -> Substitution {
    let mut subst = set.substitution_for(&candidate.base);
    let decl = set.decl(candidate.decl);
    if let Some(context) = decl.parent.and_then(|p| set.nominal_of_context(p)) {
        if let DeclKind::Protocol(info) = &set.decl(context).kind {
            subst.insert(info.self_param, candidate.base.clone());
        }
    }
    subst
}
