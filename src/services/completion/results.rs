//! Completion result schema and its textual rendering.
//!
//! The text form is one line per item:
//! `Decl[InstanceMethod]/CurrNominal/NotRecommended/TypeRelation[Invalid]: f1()[#Void#]; name=f1()`

use std::fmt;

use enum_display::EnumDisplay;
use serde::Serialize;

use crate::core::types::TypeRelation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumDisplay, Serialize)]
pub enum DeclCompletionKind {
    FreeFunction,
    InstanceMethod,
    StaticMethod,
    Constructor,
    GlobalVar,
    LocalVar,
    InstanceVar,
    StaticVar,
    EnumElement,
    Struct,
    Class,
    Enum,
    Protocol,
    TypeAlias,
    AssociatedType,
    GenericTypeParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumDisplay, Serialize)]
pub enum LiteralCompletionKind {
    Boolean,
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompletionKind {
    Decl(DeclCompletionKind),
    /// Argument labels.
    Keyword,
    Literal(LiteralCompletionKind),
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionKind::Decl(kind) => write!(f, "Decl[{kind}]"),
            CompletionKind::Keyword => write!(f, "Keyword"),
            CompletionKind::Literal(kind) => write!(f, "Literal[{kind}]"),
        }
    }
}

/// Where a completion comes from relative to the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CompletionContext {
    /// Specific to the expression at the cursor (argument labels).
    ExprSpecific,
    Local,
    CurrNominal,
    Super,
    CurrModule,
    OtherModule(String),
    None,
}

impl CompletionContext {
    /// Proximity rank; lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            CompletionContext::ExprSpecific => 0,
            CompletionContext::Local => 1,
            CompletionContext::CurrNominal => 2,
            CompletionContext::Super => 3,
            CompletionContext::CurrModule => 4,
            CompletionContext::OtherModule(_) => 5,
            CompletionContext::None => 6,
        }
    }
}

impl fmt::Display for CompletionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionContext::ExprSpecific => write!(f, "ExprSpecific"),
            CompletionContext::Local => write!(f, "Local"),
            CompletionContext::CurrNominal => write!(f, "CurrNominal"),
            CompletionContext::Super => write!(f, "Super"),
            CompletionContext::CurrModule => write!(f, "CurrModule"),
            CompletionContext::OtherModule(module) => write!(f, "OtherModule[{module}]"),
            CompletionContext::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    pub kind: CompletionKind,
    pub context: CompletionContext,
    /// Deprecated, unavailable, or of a type the context can never use.
    pub not_recommended: bool,
    /// Relation of `result_type` to the contextual type, when there is one.
    pub type_relation: Option<TypeRelation>,
    /// Insertion text with `{#label: Type#}` placeholders.
    pub pattern: String,
    pub result_type: Option<String>,
    /// Filtering name: `f()`, `f(_:b:)`, `x`, `b:`.
    pub name: String,
}

impl CompletionItem {
    /// Relation used for ranking; items without a contextual type rank as
    /// unrelated.
    pub fn relation_rank(&self) -> TypeRelation {
        self.type_relation.unwrap_or(TypeRelation::Unrelated)
    }

    pub fn is_recommended(&self) -> bool {
        !self.not_recommended
    }

    /// Relations worth showing: the ones that say something about fit.
    fn shown_relation(&self) -> Option<TypeRelation> {
        self.type_relation.filter(|relation| {
            matches!(
                relation,
                TypeRelation::Identical | TypeRelation::Convertible | TypeRelation::Invalid
            )
        })
    }
}

impl fmt::Display for CompletionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.context)?;
        if self.not_recommended {
            write!(f, "/NotRecommended")?;
        }
        if let Some(relation) = self.shown_relation() {
            write!(f, "/TypeRelation[{}]", relation.label())?;
        }
        write!(f, ": {}", self.pattern)?;
        if let Some(ty) = &self.result_type {
            write!(f, "[#{ty}#]")?;
        }
        write!(f, "; name={}", self.name)
    }
}
