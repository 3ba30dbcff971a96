//! Solver type variables and structural unification.

use crate::core::resolve::{DeclId, LiteralKind, ModuleSet};
use crate::core::types::{Type, TypeVarId};

/// Why a variable was created; used to word "could not infer" errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarOrigin {
    Literal(LiteralKind),
    GenericParam(DeclId),
    ClosureParam,
    ClosureResult,
    Placeholder,
}

#[derive(Debug, Clone)]
enum VarState {
    Unbound {
        origin: VarOrigin,
        literal: Option<LiteralKind>,
    },
    Link(TypeVarId),
    Bound(Type),
}

/// Union-find store of type variables. Cloning it is the snapshot used for
/// speculative overload scoring.
#[derive(Debug, Clone, Default)]
pub struct TypeVars {
    vars: Vec<VarState>,
}

impl TypeVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn fresh(&mut self, origin: VarOrigin) -> Type {
        let literal = match origin {
            VarOrigin::Literal(kind) => Some(kind),
            _ => None,
        };
        let id = TypeVarId(self.vars.len() as u32);
        self.vars.push(VarState::Unbound { origin, literal });
        Type::Var(id)
    }

    fn root(&self, mut id: TypeVarId) -> TypeVarId {
        while let VarState::Link(next) = &self.vars[id.index()] {
            id = *next;
        }
        id
    }

    pub fn literal_kind(&self, id: TypeVarId) -> Option<LiteralKind> {
        match &self.vars[self.root(id).index()] {
            VarState::Unbound { literal, .. } => *literal,
            _ => None,
        }
    }

    pub fn origin(&self, id: TypeVarId) -> Option<VarOrigin> {
        match &self.vars[self.root(id).index()] {
            VarState::Unbound { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// Follows bindings at the top level only.
    pub fn shallow(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Var(id) = current {
            match &self.vars[self.root(id).index()] {
                VarState::Bound(bound) => current = bound.clone(),
                _ => return Type::Var(self.root(id)),
            }
        }
        current
    }

    /// Replaces every bound variable, recursively.
    pub fn resolve(&self, ty: &Type) -> Type {
        ty.map(&mut |node| match node {
            Type::Var(id) => {
                let root = self.root(id);
                match &self.vars[root.index()] {
                    VarState::Bound(bound) => self.resolve(bound),
                    _ => Type::Var(root),
                }
            }
            other => other,
        })
    }

    fn occurs(&self, id: TypeVarId, ty: &Type) -> bool {
        let resolved = self.resolve(ty);
        resolved.any_part(&mut |part| matches!(part, Type::Var(v) if *v == id))
    }

    fn bind(&mut self, id: TypeVarId, ty: Type) {
        let root = self.root(id);
        self.vars[root.index()] = VarState::Bound(ty);
    }

    /// Unbound variables created at or after `from`, by root.
    pub fn unbound_since(&self, from: usize) -> Vec<(TypeVarId, VarOrigin, Option<LiteralKind>)> {
        let mut out = Vec::new();
        for index in from..self.vars.len() {
            if let VarState::Unbound { origin, literal } = &self.vars[index] {
                out.push((TypeVarId(index as u32), *origin, *literal));
            }
        }
        out
    }

    /// Binds unbound literal variables created since `from` to the default
    /// type of their literal kind.
    pub fn default_literals(&mut self, set: &ModuleSet<'_>, from: usize) {
        for (id, _, literal) in self.unbound_since(from) {
            if let Some(kind) = literal {
                if let Some(default) = set.literal_default(kind) {
                    self.bind(id, default);
                }
            }
        }
    }

    /// Binds every variable created since `from` that is still unbound to
    /// the error type.
    pub fn poison_unbound(&mut self, from: usize) {
        for (id, _, _) in self.unbound_since(from) {
            self.bind(id, Type::Error);
        }
    }

    fn literal_accepts(&self, set: &ModuleSet<'_>, kind: LiteralKind, ty: &Type) -> bool {
        match ty {
            Type::Error => true,
            Type::Var(_) => true,
            Type::Nominal { .. } | Type::Optional(_) | Type::GenericParam(_) => {
                set.literal_protocol(kind)
                    .is_some_and(|proto| set.conforms(ty, proto))
            }
            _ => false,
        }
    }

    /// Makes `a` and `b` the same type, binding variables as needed. On
    /// failure some variables may already be bound; callers that need
    /// atomicity snapshot first.
    pub fn unify(&mut self, set: &ModuleSet<'_>, a: &Type, b: &Type) -> bool {
        let a = set.normalize(&self.shallow(a));
        let b = set.normalize(&self.shallow(b));
        match (&a, &b) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Var(x), Type::Var(y)) => {
                if x == y {
                    return true;
                }
                let merged = match (self.literal_kind(*x), self.literal_kind(*y)) {
                    (Some(l), Some(r)) if l == r => Some(l),
                    (Some(LiteralKind::Integer), Some(LiteralKind::Float))
                    | (Some(LiteralKind::Float), Some(LiteralKind::Integer)) => {
                        Some(LiteralKind::Float)
                    }
                    (Some(_), Some(_)) => return false,
                    (l, r) => l.or(r),
                };
                let root_x = self.root(*x);
                let root_y = self.root(*y);
                self.vars[root_x.index()] = VarState::Link(root_y);
                if let VarState::Unbound { literal, .. } = &mut self.vars[root_y.index()] {
                    *literal = merged;
                }
                true
            }
            (Type::Var(x), other) | (other, Type::Var(x)) => {
                if let Some(kind) = self.literal_kind(*x) {
                    if !self.literal_accepts(set, kind, other) {
                        return false;
                    }
                }
                if self.occurs(*x, other) {
                    return false;
                }
                self.bind(*x, other.clone());
                true
            }
            (Type::Nominal { decl: d1, args: a1 }, Type::Nominal { decl: d2, args: a2 }) => {
                d1 == d2
                    && a1.len() == a2.len()
                    && a1.iter().zip(a2).all(|(l, r)| self.unify(set, l, r))
            }
            (Type::Tuple(e1), Type::Tuple(e2)) => {
                e1.len() == e2.len()
                    && e1.iter().zip(e2).all(|(l, r)| {
                        (l.label == r.label || l.label.is_none() || r.label.is_none())
                            && self.unify(set, &l.ty, &r.ty)
                    })
            }
            (Type::Function(f1), Type::Function(f2)) => {
                f1.params.len() == f2.params.len()
                    && f1.throws == f2.throws
                    && f1
                        .params
                        .iter()
                        .zip(&f2.params)
                        .all(|(l, r)| l.inout == r.inout && self.unify(set, &l.ty, &r.ty))
                    && self.unify(set, &f1.result, &f2.result)
            }
            (Type::Optional(l), Type::Optional(r))
            | (Type::Metatype(l), Type::Metatype(r))
            | (Type::InOut(l), Type::InOut(r)) => self.unify(set, l, r),
            (Type::Existential(p), Type::Existential(q)) => {
                p.len() == q.len() && p.iter().all(|proto| q.contains(proto))
            }
            (Type::AnyObject, Type::AnyObject) => true,
            (Type::GenericParam(p), Type::GenericParam(q)) => p == q,
            (Type::DependentMember { .. }, _) | (_, Type::DependentMember { .. }) => {
                // A member of a still-unknown base is checked once the base is
                // bound.
                a == b || a.contains_vars() || b.contains_vars()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/typecheck/t_unify.rs"]
mod tests;
