use serde::Serialize;

use crate::core::resolve::ModuleSet;
use crate::core::types::Type;

/// How well a value of one type fits a contextual type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TypeRelation {
    Identical,
    Convertible,
    Unknown,
    Unrelated,
    /// The value can never be used in that context (e.g. `Void`).
    Invalid,
}

impl TypeRelation {
    pub fn label(self) -> &'static str {
        match self {
            TypeRelation::Identical => "Identical",
            TypeRelation::Convertible => "Convertible",
            TypeRelation::Unknown => "Unknown",
            TypeRelation::Unrelated => "Unrelated",
            TypeRelation::Invalid => "Invalid",
        }
    }
}

pub fn type_relation(set: &ModuleSet<'_>, actual: &Type, expected: &Type) -> TypeRelation {
    if actual.contains_error() || expected.contains_error() {
        return TypeRelation::Unknown;
    }
    if actual.is_void() && !expected.is_void() {
        return TypeRelation::Invalid;
    }
    let actual = set.normalize(actual);
    let expected = set.normalize(expected);
    if actual == expected {
        TypeRelation::Identical
    } else if is_convertible(set, &actual, &expected) {
        TypeRelation::Convertible
    } else {
        TypeRelation::Unrelated
    }
}

/// Implicit conversions: optional promotion, class upcasts, existential
/// erasure and `Any`/`AnyObject`.
pub fn is_convertible(set: &ModuleSet<'_>, from: &Type, to: &Type) -> bool {
    if from == to || from.is_error() || to.is_error() {
        return true;
    }
    match (from, to) {
        (_, Type::Existential(protos)) if protos.is_empty() => true,
        (_, Type::AnyObject) => set.is_class_type(from),
        (Type::Optional(a), Type::Optional(b)) => is_convertible(set, a, b),
        (_, Type::Optional(payload)) => is_convertible(set, from, payload),
        (Type::Existential(have), Type::Existential(want)) => want.iter().all(|proto| {
            have.iter()
                .any(|p| set.protocol_closure(*p).contains(proto))
        }),
        (_, Type::Existential(want)) => want.iter().all(|proto| set.conforms(from, *proto)),
        (Type::Nominal { .. } | Type::GenericParam(_), Type::Nominal { .. }) => {
            set.is_class_type(to) && set.is_subclass(from, to)
                || set
                    .superclass_of(from)
                    .is_some_and(|sup| set.is_subclass(&sup, to))
        }
        (Type::Metatype(a), Type::Metatype(b)) => is_convertible(set, a, b),
        _ => false,
    }
}

#[cfg(test)]
#[path = "../../tests/types/t_relations.rs"]
mod tests;
