//! Semantic types.
//!
//! `Type` is the single representation shared by resolution, type checking,
//! completion and lowering. Solver variables (`Type::Var`) only exist while a
//! body is being checked; a checked module never contains them.

mod relations;
mod render;
mod subst;

pub use relations::{TypeRelation, is_convertible, type_relation};
pub use render::{DeclNames, render_type};
pub use subst::Substitution;

use crate::core::resolve::DeclId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

impl TypeVarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleElem {
    pub label: Option<String>,
    pub ty: Type,
}

impl TupleElem {
    pub fn unlabeled(ty: Type) -> Self {
        TupleElem { label: None, ty }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnParam {
    pub ty: Type,
    pub inout: bool,
    pub variadic: bool,
    pub autoclosure: bool,
}

impl FnParam {
    pub fn plain(ty: Type) -> Self {
        FnParam {
            ty,
            inout: false,
            variadic: false,
            autoclosure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnType {
    pub params: Vec<FnParam>,
    pub result: Type,
    pub throws: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Nominal { decl: DeclId, args: Vec<Type> },
    /// The empty tuple is `Void`.
    Tuple(Vec<TupleElem>),
    Function(Box<FnType>),
    /// Sugar for `Optional<T>`; the prelude enum is the only optional type.
    Optional(Box<Type>),
    /// Protocol composition. The empty composition is `Any`.
    Existential(Vec<DeclId>),
    AnyObject,
    Metatype(Box<Type>),
    GenericParam(DeclId),
    /// `T.Assoc`
    DependentMember { base: Box<Type>, assoc: DeclId },
    Var(TypeVarId),
    InOut(Box<Type>),
    Error,
}

impl Type {
    pub fn void() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn any() -> Type {
        Type::Existential(Vec::new())
    }

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn nominal(decl: DeclId) -> Type {
        Type::Nominal {
            decl,
            args: Vec::new(),
        }
    }

    pub fn function(params: Vec<FnParam>, result: Type, throws: bool) -> Type {
        Type::Function(Box::new(FnType {
            params,
            result,
            throws,
            is_async: false,
        }))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Tuple(elems) if elems.is_empty())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Existential(protos) if protos.is_empty())
    }

    pub fn optional_payload(&self) -> Option<&Type> {
        match self {
            Type::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn nominal_decl(&self) -> Option<DeclId> {
        match self {
            Type::Nominal { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FnType> {
        match self {
            Type::Function(fn_ty) => Some(fn_ty),
            _ => None,
        }
    }

    /// Strips one `inout` layer.
    pub fn without_inout(&self) -> &Type {
        match self {
            Type::InOut(inner) => inner,
            other => other,
        }
    }

    /// True if any component satisfies `pred` (pre-order).
    pub fn any_part(&self, pred: &mut impl FnMut(&Type) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Type::Nominal { args, .. } => args.iter().any(|arg| arg.any_part(pred)),
            Type::Tuple(elems) => elems.iter().any(|elem| elem.ty.any_part(pred)),
            Type::Function(fn_ty) => {
                fn_ty.params.iter().any(|param| param.ty.any_part(pred))
                    || fn_ty.result.any_part(pred)
            }
            Type::Optional(inner) | Type::Metatype(inner) | Type::InOut(inner) => {
                inner.any_part(pred)
            }
            Type::DependentMember { base, .. } => base.any_part(pred),
            Type::Existential(_)
            | Type::AnyObject
            | Type::GenericParam(_)
            | Type::Var(_)
            | Type::Error => false,
        }
    }

    pub fn contains_error(&self) -> bool {
        self.any_part(&mut |ty| ty.is_error())
    }

    pub fn contains_vars(&self) -> bool {
        self.any_part(&mut |ty| ty.is_var())
    }

    /// Generic parameters or dependent members anywhere inside.
    pub fn is_dependent(&self) -> bool {
        self.any_part(&mut |ty| {
            matches!(ty, Type::GenericParam(_) | Type::DependentMember { .. })
        })
    }

    /// Rebuilds the type bottom-up; `f` may replace any node after its
    /// children were rebuilt.
    pub fn map(&self, f: &mut impl FnMut(Type) -> Type) -> Type {
        let rebuilt = match self {
            Type::Nominal { decl, args } => Type::Nominal {
                decl: *decl,
                args: args.iter().map(|arg| arg.map(f)).collect(),
            },
            Type::Tuple(elems) => Type::Tuple(
                elems
                    .iter()
                    .map(|elem| TupleElem {
                        label: elem.label.clone(),
                        ty: elem.ty.map(f),
                    })
                    .collect(),
            ),
            Type::Function(fn_ty) => Type::Function(Box::new(FnType {
                params: fn_ty
                    .params
                    .iter()
                    .map(|param| FnParam {
                        ty: param.ty.map(f),
                        ..param.clone()
                    })
                    .collect(),
                result: fn_ty.result.map(f),
                throws: fn_ty.throws,
                is_async: fn_ty.is_async,
            })),
            Type::Optional(inner) => Type::Optional(Box::new(inner.map(f))),
            Type::Metatype(inner) => Type::Metatype(Box::new(inner.map(f))),
            Type::InOut(inner) => Type::InOut(Box::new(inner.map(f))),
            Type::DependentMember { base, assoc } => Type::DependentMember {
                base: Box::new(base.map(f)),
                assoc: *assoc,
            },
            other => other.clone(),
        };
        f(rebuilt)
    }
}
