//! Argument-to-parameter matching and overload candidate sets.

use thiserror::Error;

use crate::core::resolve::decl::{DeclId, ParamDecl};
use crate::core::resolve::lookup::LookupOrigin;
use crate::core::types::{Substitution, Type};

/// Language-version gated call matching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum CompatibilityMode {
    /// A single tuple argument may be splatted into several parameters, and
    /// several arguments may be imploded into a single tuple parameter.
    Swift3,
    #[default]
    Swift4,
}

/// One competing declaration for a call site.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub decl: DeclId,
    pub origin: LookupOrigin,
    /// Generic arguments of the base the member was found on.
    pub base_subst: Substitution,
    /// Type of the base value for member candidates.
    pub base: Option<Type>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverloadSet {
    pub candidates: Vec<Candidate>,
}

impl OverloadSet {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        OverloadSet { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// What matching needs to know about a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    pub label: Option<String>,
    pub has_default: bool,
    pub variadic: bool,
    /// The parameter's type is a function type (can take a trailing closure).
    pub is_function: bool,
}

impl ParamShape {
    pub fn from_decl(param: &ParamDecl) -> Self {
        ParamShape {
            label: param.label.clone(),
            has_default: param.has_default,
            variadic: param.variadic,
            is_function: matches!(param.ty, Type::Function(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgShape {
    pub label: Option<String>,
    pub trailing_closure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    /// Argument indices bound to the parameter (several for variadics).
    Args(Vec<usize>),
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("missing argument label '{0}:' in call")]
    MissingArgumentLabel(String),
    #[error("extraneous argument label '{0}:' in call")]
    ExtraArgumentLabel(String),
    #[error("incorrect argument label in call (have '{found}:', expected '{expected}:')")]
    IncorrectArgumentLabel { expected: String, found: String },
    #[error("argument '{0}' must precede argument '{1}'")]
    OutOfOrderArgument(String, String),
    #[error("missing argument for parameter '{0}' in call")]
    MissingArgument(String),
    #[error("extra argument in call")]
    ExtraArgument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgMatch {
    pub bindings: Vec<ParamBinding>,
    pub errors: Vec<LabelError>,
}

impl ArgMatch {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn label_text(label: &Option<String>) -> String {
    label.clone().unwrap_or_else(|| "_".to_string())
}

/// Binds call arguments to parameters by label. Mismatches are reported as
/// distinct errors; arguments are still bound where a binding is obvious
/// so that the caller can keep type checking.
pub fn match_arguments(params: &[ParamShape], args: &[ArgShape]) -> ArgMatch {
    let mut bindings = vec![ParamBinding::Default; params.len()];
    let mut errors = Vec::new();
    let mut claimed = vec![false; params.len()];

    // A trailing closure binds to the last parameter.
    let mut positional = args.len();
    if let Some(last) = args.last() {
        if last.trailing_closure && !params.is_empty() {
            let target = params.len() - 1;
            bindings[target] = ParamBinding::Args(vec![args.len() - 1]);
            claimed[target] = true;
            positional -= 1;
        }
    }

    let mut arg = 0;
    let mut param = 0;
    while param < params.len() {
        if claimed[param] {
            param += 1;
            continue;
        }
        let shape = &params[param];
        if arg >= positional {
            if !shape.has_default && !shape.variadic {
                let name = label_text(&shape.label);
                errors.push(LabelError::MissingArgument(name));
            }
            param += 1;
            continue;
        }
        let arg_label = &args[arg].label;
        if *arg_label == shape.label {
            let mut bound = vec![arg];
            arg += 1;
            if shape.variadic {
                while arg < positional && args[arg].label.is_none() {
                    bound.push(arg);
                    arg += 1;
                }
            }
            bindings[param] = ParamBinding::Args(bound);
            param += 1;
            continue;
        }

        let later = params[param + 1..]
            .iter()
            .position(|p| p.label == *arg_label && arg_label.is_some())
            .map(|offset| param + 1 + offset);
        let earlier = params[..param]
            .iter()
            .position(|p| p.label == *arg_label && arg_label.is_some());

        if later.is_some() {
            // The argument belongs further right: this parameter is skipped.
            if !shape.has_default && !shape.variadic {
                errors.push(LabelError::MissingArgument(label_text(&shape.label)));
            }
            param += 1;
            continue;
        }
        if earlier.is_some() {
            let found = label_text(arg_label);
            let previous = args[..arg]
                .iter()
                .rev()
                .find_map(|a| a.label.clone())
                .unwrap_or_else(|| "_".to_string());
            errors.push(LabelError::OutOfOrderArgument(found, previous));
            arg += 1;
            continue;
        }
        match (arg_label, &shape.label) {
            (None, Some(expected)) => {
                errors.push(LabelError::MissingArgumentLabel(expected.clone()));
            }
            (Some(found), None) => {
                errors.push(LabelError::ExtraArgumentLabel(found.clone()));
            }
            (Some(found), Some(expected)) => {
                errors.push(LabelError::IncorrectArgumentLabel {
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
            (None, None) => {}
        }
        bindings[param] = ParamBinding::Args(vec![arg]);
        arg += 1;
        param += 1;
    }
    if arg < positional {
        errors.push(LabelError::ExtraArgument);
    }
    ArgMatch { bindings, errors }
}

/// Parameters that could take the next argument after `args` were written,
/// for argument-label completion. Returns parameter indices.
pub fn next_params(params: &[ParamShape], args: &[ArgShape]) -> Option<Vec<usize>> {
    // Match the prefix as if the call ended here, tolerating missing
    // trailing parameters.
    let matched = match_arguments(params, args);
    let prefix_ok = matched
        .errors
        .iter()
        .all(|err| matches!(err, LabelError::MissingArgument(_)));
    if !prefix_ok {
        return None;
    }
    let last_bound = matched
        .bindings
        .iter()
        .rposition(|binding| matches!(binding, ParamBinding::Args(_)));
    let start = last_bound.map_or(0, |index| index + 1);
    let mut out = Vec::new();
    if let Some(index) = last_bound {
        if params[index].variadic {
            out.push(index);
        }
    }
    for (index, param) in params.iter().enumerate().skip(start) {
        out.push(index);
        if !param.has_default && !param.variadic {
            break;
        }
    }
    Some(out)
}

#[cfg(test)]
#[path = "../../tests/resolve/t_overload.rs"]
mod tests;
