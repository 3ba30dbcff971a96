use thiserror::Error;

use crate::core::diag::{DiagnosticCategory, SpannedError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveErrorKind {
    #[error("cannot find type '{0}' in scope")]
    UnknownType(String),

    #[error("'{0}' is not a type")]
    NotAType(String),

    #[error("'{0}' is not a protocol")]
    NotAProtocol(String),

    #[error("'{name}' expects {expected} generic argument(s), found {found}")]
    GenericArgCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{name}' is not a member type of '{base}'")]
    UnknownMemberType { base: String, name: String },

    #[error("cannot extend '{0}': not a nominal type or protocol")]
    InvalidExtension(String),

    #[error("'{0}' cannot inherit from class '{1}'")]
    InvalidSuperclass(String, String),

    #[error("class '{0}' has multiple superclasses")]
    MultipleSuperclasses(String),

    #[error("invalid redeclaration of '{0}'")]
    Redeclaration(String),

    #[error("'Self' is only available in a protocol or as the result of a method in a class")]
    SelfOutsideType,

    #[error("variadic parameter '{0}' must be the last parameter")]
    VariadicNotLast(String),
}

impl ResolveErrorKind {
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            ResolveErrorKind::UnknownType(_) | ResolveErrorKind::UnknownMemberType { .. } => {
                DiagnosticCategory::UnresolvedIdentifier
            }
            _ => DiagnosticCategory::Semantic,
        }
    }
}

pub type ResolveError = SpannedError<ResolveErrorKind>;
