use thiserror::Error;

use crate::core::diag::{DiagnosticCategory, SpannedError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConformanceErrorKind {
    #[error("type '{ty}' does not conform to protocol '{protocol}': missing witness for '{requirement}'")]
    MissingWitness {
        ty: String,
        protocol: String,
        requirement: String,
    },

    #[error("type '{ty}' does not conform to protocol '{protocol}': cannot infer associated type '{assoc}'")]
    UnresolvedAssocType {
        ty: String,
        protocol: String,
        assoc: String,
    },

    #[error("type '{ty}' does not conform to protocol '{protocol}': '{path}' does not conform to '{bound}'")]
    AssocNonConformance {
        ty: String,
        protocol: String,
        path: String,
        bound: String,
    },

    #[error("redundant conformance of '{ty}' to protocol '{protocol}'")]
    Redundant { ty: String, protocol: String },
}

impl ConformanceErrorKind {
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            ConformanceErrorKind::MissingWitness { .. }
            | ConformanceErrorKind::UnresolvedAssocType { .. } => DiagnosticCategory::MissingWitness,
            ConformanceErrorKind::AssocNonConformance { .. } => DiagnosticCategory::NonConformance,
            ConformanceErrorKind::Redundant { .. } => DiagnosticCategory::Semantic,
        }
    }
}

pub type ConformanceError = SpannedError<ConformanceErrorKind>;
