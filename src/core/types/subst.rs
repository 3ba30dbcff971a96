use indexmap::IndexMap;

use super::Type;
use crate::core::resolve::DeclId;

/// Generic parameter bindings, keyed by generic parameter declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: IndexMap<DeclId, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert(&mut self, param: DeclId, ty: Type) {
        self.map.insert(param, ty);
    }

    pub fn get(&self, param: DeclId) -> Option<&Type> {
        self.map.get(&param)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Type)> {
        self.map.iter().map(|(param, ty)| (*param, ty))
    }

    pub fn extend(&mut self, other: &Substitution) {
        for (param, ty) in other.iter() {
            self.map.insert(param, ty.clone());
        }
    }

    /// Replaces bound generic parameters. Dependent members whose base
    /// becomes concrete stay as `DependentMember` nodes for the caller to
    /// resolve through conformances.
    pub fn apply(&self, ty: &Type) -> Type {
        if self.map.is_empty() {
            return ty.clone();
        }
        ty.map(&mut |node| match node {
            Type::GenericParam(param) => self.map.get(&param).cloned().unwrap_or(node),
            other => other,
        })
    }

    /// Applies `f` to every bound type.
    pub fn map_types(&self, mut f: impl FnMut(&Type) -> Type) -> Substitution {
        Substitution {
            map: self
                .map
                .iter()
                .map(|(param, ty)| (*param, f(ty)))
                .collect(),
        }
    }
}

impl FromIterator<(DeclId, Type)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (DeclId, Type)>>(iter: I) -> Self {
        Substitution {
            map: iter.into_iter().collect(),
        }
    }
}
