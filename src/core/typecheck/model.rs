//! Side tables produced by type checking.
//!
//! The AST itself is never rewritten: every fact the checker derives is
//! keyed by `NodeId`. A finished table contains no solver variables.

use std::collections::{HashMap, HashSet};

use crate::core::resolve::{ArgShape, DeclId, LookupOrigin, ParamBinding, ParamDecl};
use crate::core::tree::NodeId;
use crate::core::types::{Substitution, Type};

/// Reference to a declaration at a use site.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclRef {
    pub decl: DeclId,
    /// Generic arguments for the declaration and its enclosing contexts.
    pub subst: Substitution,
    /// Type the member was found on; `None` for unqualified non-members.
    pub base: Option<Type>,
    pub origin: LookupOrigin,
    /// Member reached through the implicit `self` of a method body.
    pub implicit_self: bool,
    /// `super.member`
    pub via_super: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    /// Keyed by the binding node: parameter, pattern, closure parameter,
    /// optional binding, catch clause or accessor body.
    Local(NodeId),
    SelfValue,
    Decl(DeclRef),
    /// A type name used as a value.
    Type(Type),
    /// `tuple.label`
    TupleElement(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    WrapOptional,
    Upcast,
    /// Concrete value (or narrower existential) into an existential.
    Existential,
    AnyObject,
}

/// One implicit conversion step; steps apply in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub kind: ConversionKind,
    pub to: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Function,
    Constructor,
    EnumElement,
    /// Calling a function-typed value.
    Value,
    /// `AnyObject` method call.
    Dynamic,
    /// Prefix, infix or pattern-match operator.
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLayout {
    Normal,
    /// One tuple argument spread over several parameters.
    Splat,
    /// Several arguments packed into one tuple parameter.
    Implode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub target: CallTarget,
    pub callee: Option<DeclRef>,
    /// One entry per parameter.
    pub bindings: Vec<ParamBinding>,
    pub layout: ArgLayout,
    pub throws: bool,
    /// Parameter types after substitution.
    pub param_types: Vec<Type>,
    pub result: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalInfo {
    pub name: String,
    pub ty: Type,
    pub is_let: bool,
}

/// One candidate of the call enclosing a completion cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CallCandidateFacts {
    pub decl: Option<DeclId>,
    pub origin: LookupOrigin,
    pub params: Vec<ParamDecl>,
    pub result: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallFacts {
    pub candidates: Vec<CallCandidateFacts>,
    /// Arguments written before the cursor.
    pub args_before: Vec<ArgShape>,
    /// The cursor is a subscript argument rather than a call argument.
    pub subscript: bool,
    /// Type the whole call must produce, when the context fixes one.
    pub expected: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionLocal {
    pub name: String,
    pub node: NodeId,
    pub ty: Type,
    pub is_let: bool,
}

/// What the checker knew at the completion cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionFacts {
    /// Innermost declaration enclosing the cursor.
    pub context: Option<DeclId>,
    /// Visible local bindings, innermost first.
    pub locals: Vec<CompletionLocal>,
    pub expected: Option<Type>,
    /// Type of the expression before `.` (a metatype for type names).
    pub base: Option<Type>,
    pub call: Option<CallFacts>,
    pub in_static: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TypeTables {
    /// Natural type of every checked expression and pattern.
    pub types: HashMap<NodeId, Type>,
    pub refs: HashMap<NodeId, ValueRef>,
    pub calls: HashMap<NodeId, CallInfo>,
    /// Conversions applied to an expression's value by its context.
    pub conversions: HashMap<NodeId, Vec<Conversion>>,
    pub locals: HashMap<NodeId, LocalInfo>,
    /// Single-expression bodies whose expression is the return value.
    pub implicit_returns: HashSet<NodeId>,
    /// `switch` statements whose cases cover every value of the subject.
    pub exhaustive_switches: HashSet<NodeId>,
}

impl TypeTables {
    pub fn type_of(&self, node: NodeId) -> Type {
        self.types.get(&node).cloned().unwrap_or(Type::Error)
    }

    pub fn conversions_of(&self, node: NodeId) -> &[Conversion] {
        self.conversions
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Type of an expression after its conversions.
    pub fn converted_type_of(&self, node: NodeId) -> Type {
        match self.conversions_of(node).last() {
            Some(conversion) => conversion.to.clone(),
            None => self.type_of(node),
        }
    }
}
