//! Conformance building.
//!
//! Runs once per loaded module, after declaration collection. Every
//! conformance written in an inheritance clause of the module (and every
//! conformance it implies through protocol inheritance) gets a record with
//! its associated type witnesses, one witness per requirement, and one
//! entry per associated conformance. Associated conformances point at other
//! conformances and are resolved by a fixed-point pass once all records
//! exist, so records never need patching while they are being built.

mod errors;
mod model;

use indexmap::IndexMap;

pub use errors::{ConformanceError, ConformanceErrorKind};
pub use model::*;

use crate::core::diag::Span;
use crate::core::resolve::{
    Decl, DeclId, DeclKind, LoadedModule, LookupOrigin, MemberAccess, MemberCandidate, ModuleSet,
    Requirement, lookup_members, member_substitution, split_dependent,
};
use crate::core::types::{Type, TypeVarId, render_type};

struct Declared {
    ty_decl: DeclId,
    protocol: DeclId,
    declared_in: DeclId,
}

fn view<'a>(deps: &[&'a LoadedModule], module: &'a LoadedModule) -> ModuleSet<'a> {
    let mut modules = deps.to_vec();
    modules.push(module);
    ModuleSet::new(modules)
}

/// Builds every conformance declared in `module`.
pub fn build_conformances(deps: &[&LoadedModule], module: &mut LoadedModule) -> Vec<ConformanceError> {
    let mut errors = Vec::new();
    let declared = declared_conformances(&view(deps, module));
    for entry in declared {
        create_records(deps, module, entry, &mut errors);
    }

    let assoc_types = {
        let set = view(deps, module);
        module
            .conformances
            .iter()
            .map(|conformance| resolve_assoc_types(&set, conformance, &mut errors))
            .collect::<Vec<_>>()
    };
    for (conformance, assoc_types) in module.conformances.iter_mut().zip(assoc_types) {
        conformance.assoc_types = assoc_types;
    }

    let witnesses = {
        let set = view(deps, module);
        module
            .conformances
            .iter()
            .map(|conformance| resolve_witnesses(&set, conformance, &mut errors))
            .collect::<Vec<_>>()
    };
    for (conformance, witnesses) in module.conformances.iter_mut().zip(witnesses) {
        conformance.witnesses = witnesses;
    }

    resolve_assoc_conformances(deps, module, &mut errors);
    tracing::debug!(
        target: "pipeline",
        stage = "conformances",
        module = module.name.as_str(),
        conformances = module.conformances.len(),
        errors = errors.len()
    );
    errors
}

fn declared_conformances(set: &ModuleSet<'_>) -> Vec<Declared> {
    let module = set.module(set.current());
    let mut out = Vec::new();
    for decl in &module.decls {
        match &decl.kind {
            DeclKind::Struct(info) | DeclKind::Class(info) | DeclKind::Enum(info) => {
                for protocol in &info.protocols {
                    out.push(Declared {
                        ty_decl: decl.id,
                        protocol: *protocol,
                        declared_in: decl.id,
                    });
                }
            }
            DeclKind::Extension(info) => {
                let Some(extended) = info.extended else {
                    continue;
                };
                if !set.decl(extended).is_nominal() {
                    continue;
                }
                for protocol in &info.protocols {
                    out.push(Declared {
                        ty_decl: extended,
                        protocol: *protocol,
                        declared_in: decl.id,
                    });
                }
            }
            _ => {}
        }
    }
    out
}

fn create_records(
    deps: &[&LoadedModule],
    module: &mut LoadedModule,
    entry: Declared,
    errors: &mut Vec<ConformanceError>,
) {
    let (closure, span, existing, ty_name) = {
        let set = view(deps, module);
        let closure = set.protocol_closure(entry.protocol);
        let existing = closure
            .iter()
            .map(|proto| set.conformance(entry.ty_decl, *proto).map(|c| (c.id, c.origin)))
            .collect::<Vec<_>>();
        (
            closure,
            set.decl(entry.declared_in).span,
            existing,
            set.decl(entry.ty_decl).name.clone(),
        )
    };
    for (index, (protocol, existing)) in closure.into_iter().zip(existing).enumerate() {
        let origin = if index == 0 {
            ConformanceOrigin::Declared
        } else {
            ConformanceOrigin::Implied {
                by: entry.protocol,
            }
        };
        if let Some((id, existing_origin)) = existing {
            if index == 0 && existing_origin == ConformanceOrigin::Declared {
                let protocol_name = decl_name(deps, module, protocol);
                errors.push(ConformanceError::new(
                    ConformanceErrorKind::Redundant {
                        ty: ty_name.clone(),
                        protocol: protocol_name,
                    },
                    span,
                ));
            } else if index == 0 && id.module == module.id {
                module.conformances[id.index as usize].origin = origin;
            }
            continue;
        }
        let id = ConformanceId {
            module: module.id,
            index: module.conformances.len() as u32,
        };
        module.conformances.push(Conformance {
            id,
            ty_decl: entry.ty_decl,
            protocol,
            origin,
            declared_in: entry.declared_in,
            witnesses: IndexMap::new(),
            assoc_types: IndexMap::new(),
            assoc_conformances: Vec::new(),
        });
        module.conformance_index.insert((entry.ty_decl, protocol), id);
    }
}

fn decl_name(deps: &[&LoadedModule], module: &LoadedModule, id: DeclId) -> String {
    if id.module == module.id {
        module.decl(id).name.clone()
    } else {
        deps[id.module.index()].decl(id).name.clone()
    }
}

/// Replaces protocol `Self` with the conforming type and resolves
/// dependent members on it through `assoc` and known conformances.
fn substitute_self(
    set: &ModuleSet<'_>,
    self_param: Option<DeclId>,
    self_ty: &Type,
    assoc: &IndexMap<DeclId, Type>,
    ty: &Type,
) -> Type {
    ty.map(&mut |node| match &node {
        Type::GenericParam(param) if Some(*param) == self_param => self_ty.clone(),
        Type::DependentMember { base, assoc: member } if **base == *self_ty => assoc
            .get(member)
            .cloned()
            .or_else(|| set.resolve_dependent(base, *member))
            .unwrap_or(node),
        Type::DependentMember { base, assoc: member } if !base.is_dependent() => {
            set.resolve_dependent(base, *member).unwrap_or(node)
        }
        _ => node,
    })
}

/// Binds associated types that appear in `pattern` by matching it against a
/// candidate witness type.
fn infer_from(pattern: &Type, actual: &Type, self_ty: &Type, out: &mut IndexMap<DeclId, Type>) {
    match (pattern, actual) {
        (Type::DependentMember { base, assoc }, _) if **base == *self_ty => {
            if !actual.is_error() {
                out.entry(*assoc).or_insert_with(|| actual.clone());
            }
        }
        (Type::Function(a), Type::Function(b)) if a.params.len() == b.params.len() => {
            for (pa, pb) in a.params.iter().zip(&b.params) {
                infer_from(&pa.ty, &pb.ty, self_ty, out);
            }
            infer_from(&a.result, &b.result, self_ty, out);
        }
        (Type::Tuple(a), Type::Tuple(b)) if a.len() == b.len() => {
            for (ea, eb) in a.iter().zip(b) {
                infer_from(&ea.ty, &eb.ty, self_ty, out);
            }
        }
        (Type::Optional(a), Type::Optional(b))
        | (Type::Metatype(a), Type::Metatype(b))
        | (Type::InOut(a), Type::InOut(b)) => infer_from(a, b, self_ty, out),
        (Type::Nominal { decl: da, args: aa }, Type::Nominal { decl: db, args: ab })
            if da == db && aa.len() == ab.len() =>
        {
            for (a, b) in aa.iter().zip(ab) {
                infer_from(a, b, self_ty, out);
            }
        }
        _ => {}
    }
}

fn interface_type(decl: &Decl) -> Option<Type> {
    match &decl.kind {
        DeclKind::Func(sig) | DeclKind::Constructor { sig, .. } | DeclKind::Subscript { sig, .. } => {
            Some(sig.fn_type())
        }
        DeclKind::Var(info) => Some(info.ty.clone()),
        _ => None,
    }
}

fn is_requirement_like(kind: &DeclKind) -> bool {
    matches!(
        kind,
        DeclKind::Func(_) | DeclKind::Constructor { .. } | DeclKind::Subscript { .. } | DeclKind::Var(_)
    )
}

fn same_kind(a: &DeclKind, b: &DeclKind) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Members of the conforming type that could witness `requirement`,
/// excluding other protocol requirements.
fn witness_candidates(
    set: &ModuleSet<'_>,
    self_ty: &Type,
    requirement: DeclId,
) -> Vec<MemberCandidate> {
    let req = set.decl(requirement);
    let access = if req.is_static || matches!(req.kind, DeclKind::Constructor { .. }) {
        MemberAccess::Static
    } else {
        MemberAccess::Instance
    };
    lookup_members(set, self_ty, Some(&req.name), access)
        .into_iter()
        .filter(|candidate| {
            let decl = set.decl(candidate.decl);
            let in_protocol = decl
                .parent
                .is_some_and(|parent| set.decl(parent).is_protocol());
            !in_protocol && same_kind(&decl.kind, &req.kind) && decl.full_name() == req.full_name()
        })
        .collect()
}

fn resolve_assoc_types(
    set: &ModuleSet<'_>,
    conformance: &Conformance,
    errors: &mut Vec<ConformanceError>,
) -> IndexMap<DeclId, Type> {
    let mut out = IndexMap::new();
    let DeclKind::Protocol(info) = &set.decl(conformance.protocol).kind else {
        return out;
    };
    let self_ty = set.declared_type(conformance.ty_decl);
    let self_param = Some(info.self_param);

    // Explicit witnesses: nested types, typealiases and generic parameters.
    for assoc in &info.assoc_types {
        let name = set.decl(*assoc).name.as_str();
        let member = lookup_members(set, &self_ty, Some(name), MemberAccess::Static)
            .into_iter()
            .map(|candidate| candidate.decl)
            .find(|id| {
                let decl = set.decl(*id);
                decl.is_type_decl() && !matches!(decl.kind, DeclKind::AssociatedType { .. })
            });
        if let Some(member) = member {
            let ty = match &set.decl(member).kind {
                DeclKind::TypeAlias { ty } => ty.clone(),
                _ => set.declared_type(member),
            };
            out.insert(*assoc, ty);
            continue;
        }
        if let Some(param) = set
            .decl(conformance.ty_decl)
            .generics
            .params
            .iter()
            .find(|param| set.decl(**param).name == name)
        {
            out.insert(*assoc, Type::GenericParam(*param));
        }
    }

    // Inference from the signatures of requirement witnesses.
    let mut inferred = IndexMap::new();
    for requirement in &info.members {
        let req = set.decl(*requirement);
        if !is_requirement_like(&req.kind) {
            continue;
        }
        let Some(req_ty) = interface_type(req) else {
            continue;
        };
        let pattern = substitute_self(set, self_param, &self_ty, &IndexMap::new(), &req_ty);
        for candidate in witness_candidates(set, &self_ty, *requirement) {
            let Some(cand_ty) = interface_type(set.decl(candidate.decl)) else {
                continue;
            };
            let cand_ty = member_substitution(set, &candidate).apply(&cand_ty);
            infer_from(&pattern, &cand_ty, &self_ty, &mut inferred);
        }
    }
    for assoc in &info.assoc_types {
        if !out.contains_key(assoc) {
            if let Some(ty) = inferred.get(assoc) {
                out.insert(*assoc, ty.clone());
            }
        }
    }

    // Defaults, which may refer to other associated types.
    for assoc in &info.assoc_types {
        if out.contains_key(assoc) {
            continue;
        }
        if let DeclKind::AssociatedType {
            default: Some(default),
            ..
        } = &set.decl(*assoc).kind
        {
            let ty = substitute_self(set, self_param, &self_ty, &out, default);
            out.insert(*assoc, ty);
            continue;
        }
        errors.push(ConformanceError::new(
            ConformanceErrorKind::UnresolvedAssocType {
                ty: render_type(&self_ty, set),
                protocol: set.decl(conformance.protocol).name.clone(),
                assoc: set.decl(*assoc).name.clone(),
            },
            set.decl(conformance.declared_in).span,
        ));
        out.insert(*assoc, Type::Error);
    }
    out
}

/// Replaces a function's own generic parameters by positional placeholders
/// so that `func f<T>(_: T)` and `func f<U>(_: U)` compare equal.
fn canonical(decl: &Decl, ty: &Type) -> Type {
    let params = &decl.generics.params;
    if params.is_empty() {
        return ty.clone();
    }
    ty.map(&mut |node| match node {
        Type::GenericParam(param) => match params.iter().position(|p| *p == param) {
            Some(index) => Type::Var(TypeVarId(index as u32)),
            None => Type::GenericParam(param),
        },
        other => other,
    })
}

fn resolve_witnesses(
    set: &ModuleSet<'_>,
    conformance: &Conformance,
    errors: &mut Vec<ConformanceError>,
) -> IndexMap<DeclId, Witness> {
    let mut out = IndexMap::new();
    let DeclKind::Protocol(info) = &set.decl(conformance.protocol).kind else {
        return out;
    };
    let self_ty = set.declared_type(conformance.ty_decl);
    let self_param = Some(info.self_param);
    for requirement in &info.members {
        let req = set.decl(*requirement);
        if !is_requirement_like(&req.kind) {
            continue;
        }
        let Some(req_ty) = interface_type(req) else {
            continue;
        };
        let expected = canonical(
            req,
            &substitute_self(set, self_param, &self_ty, &conformance.assoc_types, &req_ty),
        );
        let needs_setter = req.var_info().is_some_and(|info| info.is_settable());
        let found = witness_candidates(set, &self_ty, *requirement)
            .into_iter()
            .find(|candidate| {
                let decl = set.decl(candidate.decl);
                if decl.is_static != req.is_static {
                    return false;
                }
                if needs_setter && !decl.var_info().is_some_and(|info| info.is_settable()) {
                    return false;
                }
                let Some(cand_ty) = interface_type(decl) else {
                    return false;
                };
                let cand_ty = member_substitution(set, candidate).apply(&cand_ty);
                let actual = canonical(
                    decl,
                    &substitute_self(set, None, &self_ty, &conformance.assoc_types, &cand_ty),
                );
                let expected = set.normalize(&expected);
                let actual = set.normalize(&actual);
                expected == actual || expected.contains_error() || actual.contains_error()
            });
        match found {
            Some(candidate) => {
                let decl = set.decl(candidate.decl);
                let from_protocol = decl
                    .parent
                    .and_then(|parent| set.nominal_of_context(parent))
                    .is_some_and(|context| set.decl(context).is_protocol());
                let witness = if from_protocol {
                    Witness::Default(candidate.decl)
                } else if candidate.origin == LookupOrigin::Super {
                    Witness::Inherited(candidate.decl)
                } else {
                    Witness::Direct(candidate.decl)
                };
                out.insert(*requirement, witness);
            }
            None => errors.push(ConformanceError::new(
                ConformanceErrorKind::MissingWitness {
                    ty: render_type(&self_ty, set),
                    protocol: set.decl(conformance.protocol).name.clone(),
                    requirement: req.full_name(),
                },
                set.decl(conformance.declared_in).span,
            )),
        }
    }
    out
}

/// `(path from Self, protocol)` pairs an associated conformance table
/// needs: bounds written on associated types, and `where` requirements
/// on paths rooted at `Self`.
fn assoc_requirements(set: &ModuleSet<'_>, proto: DeclId) -> Vec<(Vec<DeclId>, DeclId)> {
    let mut out = Vec::new();
    let decl = set.decl(proto);
    let DeclKind::Protocol(info) = &decl.kind else {
        return out;
    };
    for assoc in &info.assoc_types {
        if let DeclKind::AssociatedType { bounds, .. } = &set.decl(*assoc).kind {
            for bound in bounds {
                out.push((vec![*assoc], *bound));
            }
        }
    }
    for req in &decl.generics.requirements {
        if let Requirement::Conformance { subject, protocol } = req {
            let (root, path) = split_dependent(subject);
            if *root == Type::GenericParam(info.self_param) && !path.is_empty() {
                let entry = (path, *protocol);
                if !out.contains(&entry) {
                    out.push(entry);
                }
            }
        }
    }
    out
}

/// Type reached by following `path` from the conforming type.
fn follow_path(set: &ModuleSet<'_>, conformance: &Conformance, path: &[DeclId]) -> Option<Type> {
    let self_ty = set.declared_type(conformance.ty_decl);
    let mut current = self_ty.clone();
    for assoc in path {
        current = if current == self_ty {
            match conformance.assoc_type(*assoc) {
                Some(ty) => ty.clone(),
                None => set.resolve_dependent(&current, *assoc)?,
            }
        } else if current.is_dependent() && set.nominal_decl_of(&current).is_none() {
            Type::DependentMember {
                base: Box::new(current),
                assoc: *assoc,
            }
        } else {
            set.resolve_dependent(&current, *assoc)?
        };
    }
    Some(set.normalize(&current))
}

fn resolve_entry(set: &ModuleSet<'_>, ty: &Type, protocol: DeclId) -> Option<ConformanceRef> {
    match ty {
        Type::GenericParam(_) | Type::DependentMember { .. } => set
            .abstract_conforms(ty, protocol)
            .then_some(ConformanceRef::Abstract),
        _ => {
            let decl = set.nominal_decl_of(ty)?;
            set.conformance(decl, protocol)
                .map(|conformance| ConformanceRef::Indirect(conformance.id))
        }
    }
}

fn resolve_assoc_conformances(
    deps: &[&LoadedModule],
    module: &mut LoadedModule,
    errors: &mut Vec<ConformanceError>,
) {
    {
        let set = view(deps, module);
        let tables = module
            .conformances
            .iter()
            .map(|conformance| {
                assoc_requirements(&set, conformance.protocol)
                    .into_iter()
                    .map(|(path, protocol)| AssocConformance {
                        path,
                        protocol,
                        conformance: None,
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        drop(set);
        for (conformance, table) in module.conformances.iter_mut().zip(tables) {
            conformance.assoc_conformances = table;
        }
    }

    loop {
        let updates = {
            let set = view(deps, module);
            let mut updates = Vec::new();
            for (index, conformance) in module.conformances.iter().enumerate() {
                for (slot, entry) in conformance.assoc_conformances.iter().enumerate() {
                    if entry.conformance.is_some() {
                        continue;
                    }
                    let Some(ty) = follow_path(&set, conformance, &entry.path) else {
                        continue;
                    };
                    if let Some(resolved) = resolve_entry(&set, &ty, entry.protocol) {
                        updates.push((index, slot, resolved));
                    }
                }
            }
            updates
        };
        if updates.is_empty() {
            break;
        }
        for (index, slot, resolved) in updates {
            module.conformances[index].assoc_conformances[slot].conformance = Some(resolved);
        }
    }

    let set = view(deps, module);
    for conformance in &module.conformances {
        for entry in &conformance.assoc_conformances {
            if entry.conformance.is_some() {
                continue;
            }
            let self_ty = set.declared_type(conformance.ty_decl);
            let path = entry
                .path
                .iter()
                .map(|assoc| set.decl(*assoc).name.as_str())
                .collect::<Vec<_>>()
                .join(".");
            let span: Span = set.decl(conformance.declared_in).span;
            errors.push(ConformanceError::new(
                ConformanceErrorKind::AssocNonConformance {
                    ty: render_type(&self_ty, &set),
                    protocol: set.decl(conformance.protocol).name.clone(),
                    path,
                    bound: set.decl(entry.protocol).name.clone(),
                },
                span,
            ));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/conformance/t_conformance.rs"]
mod tests;
