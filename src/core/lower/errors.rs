use thiserror::Error;

use crate::core::diag::SpannedError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LowerErrorKind {
    #[error("lowering of {0} is not supported")]
    Unsupported(String),

    #[error("function value of type '{0}' needs reabstraction, which is not supported")]
    Reabstraction(String),

    #[error("no type information for expression")]
    MissingType,

    #[error("reference to '{0}' was not resolved")]
    UnresolvedReference(String),

    #[error("'{ty}' has no conformance to '{protocol}'")]
    MissingConformance { ty: String, protocol: String },

    #[error("no witness for requirement '{requirement}' of '{protocol}'")]
    MissingWitness {
        requirement: String,
        protocol: String,
    },

    #[error("expression is not assignable")]
    NotAssignable,
}

pub type LowerError = SpannedError<LowerErrorKind>;
