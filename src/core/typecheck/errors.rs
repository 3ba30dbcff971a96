//! Type-check diagnostics.
//!
//! The checker records structured `TypeCheckErrorKind` values; rendering
//! and categorization happen at reporting boundaries.

use thiserror::Error;

use crate::core::diag::{DiagnosticCategory, SpannedError};
use crate::core::resolve::{LabelError, ResolveErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeCheckErrorKind {
    #[error("cannot find '{0}' in scope")]
    UnresolvedIdentifier(String),

    #[error("value of type '{base}' has no member '{name}'")]
    UnresolvedMember { base: String, name: String },

    #[error("cannot infer base type of implicit member '.{0}'")]
    ImplicitMemberWithoutContext(String),

    #[error("cannot convert value of type '{found}' to expected type '{expected}'")]
    TypeMismatch { expected: String, found: String },

    #[error("{0}")]
    Label(LabelError),

    #[error("passing a tuple of {0} values to a function taking separate parameters requires Swift 3 mode")]
    TupleSplatNotAllowed(usize),

    #[error("ambiguous use of '{0}'")]
    AmbiguousOverload(String),

    #[error("no overload of '{name}' accepts arguments of type {args}")]
    NoMatchingOverload { name: String, args: String },

    #[error("cannot call value of non-function type '{0}'")]
    NotCallable(String),

    #[error("generic parameter '{0}' could not be inferred")]
    CannotInferGeneric(String),

    #[error("type of expression is ambiguous without more context")]
    CannotInfer,

    #[error("type '{ty}' does not conform to protocol '{protocol}'")]
    NonConformance { ty: String, protocol: String },

    #[error("requirement not satisfied: {0}")]
    RequirementUnsatisfied(String),

    #[error("condition must be of type 'Bool', found '{0}'")]
    ConditionNotBool(String),

    #[error("non-void function should return a value of type '{0}'")]
    ReturnValueMissing(String),

    #[error("unexpected non-void return value in void function")]
    UnexpectedReturnValue,

    #[error("missing return in a function expected to return '{0}'")]
    MissingReturn(String),

    #[error("'return' outside of a function")]
    ReturnOutsideFunction,

    #[error("'break' is only allowed inside a loop or switch")]
    BreakOutsideLoop,

    #[error("'continue' is only allowed inside a loop")]
    ContinueOutsideLoop,

    #[error("call can throw but is not marked with 'try'")]
    ThrowingCallWithoutTry,

    #[error("errors thrown from here are not handled")]
    UnhandledThrow,

    #[error("initializer for conditional binding must have Optional type, not '{0}'")]
    BindingNotOptional(String),

    #[error("cannot force unwrap value of non-optional type '{0}'")]
    ForceUnwrapNonOptional(String),

    #[error("cannot use optional chaining on non-optional value of type '{0}'")]
    ChainNonOptional(String),

    #[error("cannot assign to value: '{0}' is immutable")]
    ImmutableAssignment(String),

    #[error("cannot use mutating member '{0}' on immutable value")]
    MutatingOnImmutable(String),

    #[error("instance member '{0}' cannot be used on a type")]
    InstanceMemberOnType(String),

    #[error("static member '{0}' cannot be used on an instance")]
    StaticMemberOnInstance(String),

    #[error("'super' cannot be used outside of a class with a superclass")]
    SuperOutsideClass,

    #[error("'self' is only available inside a type")]
    SelfOutsideType,

    #[error("'{0}' is unavailable")]
    Unavailable(String),

    #[error("pattern of type '{pattern}' cannot match values of type '{ty}'")]
    PatternMismatch { pattern: String, ty: String },

    #[error("enum case '{name}' has {expected} associated values, pattern has {found}")]
    PatternArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'guard' body must not fall through")]
    GuardFallthrough,

    #[error("switch must be exhaustive")]
    NonExhaustiveSwitch,

    #[error("value of tuple type '{ty}' has no member '{index}'")]
    TupleIndexOutOfRange { ty: String, index: usize },

    #[error("contextual closure type '{expected}' expects {expected_count} arguments, but {found} were used")]
    ClosureParamCount {
        expected: String,
        expected_count: usize,
        found: usize,
    },

    #[error("'{0}' is not supported")]
    Unsupported(String),

    #[error("{0}")]
    Resolve(ResolveErrorKind),
}

impl TypeCheckErrorKind {
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            TypeCheckErrorKind::UnresolvedIdentifier(_) => DiagnosticCategory::UnresolvedIdentifier,
            TypeCheckErrorKind::UnresolvedMember { .. }
            | TypeCheckErrorKind::ImplicitMemberWithoutContext(_)
            | TypeCheckErrorKind::TupleIndexOutOfRange { .. } => DiagnosticCategory::UnresolvedMember,
            TypeCheckErrorKind::TypeMismatch { .. }
            | TypeCheckErrorKind::NoMatchingOverload { .. }
            | TypeCheckErrorKind::NotCallable(_)
            | TypeCheckErrorKind::ConditionNotBool(_)
            | TypeCheckErrorKind::BindingNotOptional(_)
            | TypeCheckErrorKind::ForceUnwrapNonOptional(_)
            | TypeCheckErrorKind::ChainNonOptional(_)
            | TypeCheckErrorKind::PatternMismatch { .. }
            | TypeCheckErrorKind::PatternArity { .. }
            | TypeCheckErrorKind::ClosureParamCount { .. } => DiagnosticCategory::TypeMismatch,
            TypeCheckErrorKind::Label(label) => match label {
                LabelError::MissingArgumentLabel(_) => DiagnosticCategory::MissingArgumentLabel,
                LabelError::ExtraArgumentLabel(_) => DiagnosticCategory::ExtraArgumentLabel,
                LabelError::IncorrectArgumentLabel { .. } => {
                    DiagnosticCategory::IncorrectArgumentLabel
                }
                LabelError::OutOfOrderArgument(..) => DiagnosticCategory::OutOfOrderArgument,
                LabelError::MissingArgument(_) => DiagnosticCategory::MissingArgument,
                LabelError::ExtraArgument => DiagnosticCategory::ExtraArgument,
            },
            TypeCheckErrorKind::TupleSplatNotAllowed(_) => DiagnosticCategory::TupleSplat,
            TypeCheckErrorKind::AmbiguousOverload(_) => DiagnosticCategory::AmbiguousOverload,
            TypeCheckErrorKind::NonConformance { .. }
            | TypeCheckErrorKind::RequirementUnsatisfied(_) => DiagnosticCategory::NonConformance,
            TypeCheckErrorKind::Resolve(kind) => kind.category(),
            _ => DiagnosticCategory::Semantic,
        }
    }
}

pub type TypeCheckError = SpannedError<TypeCheckErrorKind>;
