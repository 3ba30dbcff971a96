use indexmap::IndexMap;

use crate::core::resolve::{DeclId, ModuleId};
use crate::core::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConformanceId {
    pub module: ModuleId,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConformanceOrigin {
    /// Written in an inheritance clause of the type or one of its extensions.
    Declared,
    /// Implied by a declared conformance to a refining protocol.
    Implied { by: DeclId },
}

/// Implementation chosen for one protocol requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Witness {
    /// Member of the conforming type or one of its extensions.
    Direct(DeclId),
    /// Member inherited from a superclass.
    Inherited(DeclId),
    /// Default implementation from a protocol extension.
    Default(DeclId),
}

impl Witness {
    pub fn decl(self) -> DeclId {
        match self {
            Witness::Direct(decl) | Witness::Inherited(decl) | Witness::Default(decl) => decl,
        }
    }
}

/// How an associated type satisfies one of its protocol bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConformanceRef {
    /// Points at another concrete conformance (an indirect witness entry).
    Indirect(ConformanceId),
    /// The associated type is still generic; the table comes from the
    /// generic environment at the use site.
    Abstract,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocConformance {
    /// Associated type path from `Self`, e.g. `[AssocP3, AssocP2]`.
    pub path: Vec<DeclId>,
    pub protocol: DeclId,
    /// `None` until the fixed-point pass resolves it.
    pub conformance: Option<ConformanceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conformance {
    pub id: ConformanceId,
    pub ty_decl: DeclId,
    pub protocol: DeclId,
    pub origin: ConformanceOrigin,
    /// Nominal or extension declaring the conformance.
    pub declared_in: DeclId,
    pub witnesses: IndexMap<DeclId, Witness>,
    pub assoc_types: IndexMap<DeclId, Type>,
    pub assoc_conformances: Vec<AssocConformance>,
}

impl Conformance {
    pub fn witness(&self, requirement: DeclId) -> Option<Witness> {
        self.witnesses.get(&requirement).copied()
    }

    pub fn assoc_type(&self, assoc: DeclId) -> Option<&Type> {
        self.assoc_types.get(&assoc)
    }

    pub fn assoc_conformance(&self, path: &[DeclId], protocol: DeclId) -> Option<ConformanceRef> {
        self.assoc_conformances
            .iter()
            .find(|entry| entry.path == path && entry.protocol == protocol)
            .and_then(|entry| entry.conformance)
    }
}
