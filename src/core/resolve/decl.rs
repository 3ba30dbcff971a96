//! Declarations collected from source modules.

use std::fmt;

use serde::Serialize;

use crate::core::diag::Span;
use crate::core::tree::NodeId;
use crate::core::types::{FnParam, Type, TupleElem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclId {
    pub module: ModuleId,
    pub index: u32,
}

impl DeclId {
    pub fn new(module: ModuleId, index: usize) -> Self {
        DeclId {
            module,
            index: index as u32,
        }
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}.{}", self.module.0, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
    WillSet,
    DidSet,
}

impl AccessorKind {
    pub fn suffix(self) -> &'static str {
        match self {
            AccessorKind::Get => "getter",
            AccessorKind::Set => "setter",
            AccessorKind::WillSet => "willSet",
            AccessorKind::DidSet => "didSet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub label: Option<String>,
    pub name: String,
    pub ty: Type,
    pub has_default: bool,
    pub variadic: bool,
    pub inout: bool,
    pub autoclosure: bool,
    pub escaping: bool,
}

impl ParamDecl {
    pub fn fn_param(&self) -> FnParam {
        FnParam {
            ty: self.ty.clone(),
            inout: self.inout,
            variadic: self.variadic,
            autoclosure: self.autoclosure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncSig {
    pub params: Vec<ParamDecl>,
    pub result: Type,
    pub throws: bool,
}

impl FuncSig {
    pub fn empty() -> Self {
        FuncSig {
            params: Vec::new(),
            result: Type::void(),
            throws: false,
        }
    }

    /// Interface type without labels.
    pub fn fn_type(&self) -> Type {
        Type::function(
            self.params.iter().map(ParamDecl::fn_param).collect(),
            self.result.clone(),
            self.throws,
        )
    }

    /// `name(a:_:)`
    pub fn compound_name(&self, base: &str) -> String {
        let labels = self
            .params
            .iter()
            .map(|param| format!("{}:", param.label.as_deref().unwrap_or("_")))
            .collect::<String>();
        format!("{base}({labels})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Stored,
    Computed { settable: bool },
    /// Stored with `willSet`/`didSet`.
    Observed,
    Requirement { settable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub ty: Type,
    pub is_let: bool,
    pub storage: Storage,
    pub has_initial_value: bool,
    pub accessors: Vec<DeclId>,
}

impl VarInfo {
    pub fn is_settable(&self) -> bool {
        match self.storage {
            Storage::Stored | Storage::Observed => !self.is_let,
            Storage::Computed { settable } | Storage::Requirement { settable } => settable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NominalInfo {
    pub members: Vec<DeclId>,
    pub inherits: Vec<Type>,
    pub superclass: Option<Type>,
    pub protocols: Vec<DeclId>,
    /// Stored properties in declaration order.
    pub stored: Vec<DeclId>,
    /// Enum elements in declaration order.
    pub elements: Vec<DeclId>,
    pub indirect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub members: Vec<DeclId>,
    pub inherited: Vec<DeclId>,
    /// The implicit `Self` generic parameter.
    pub self_param: DeclId,
    pub assoc_types: Vec<DeclId>,
    pub class_bound: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub extended: Option<DeclId>,
    pub protocols: Vec<DeclId>,
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Func(FuncSig),
    Constructor { sig: FuncSig, failable: bool },
    Subscript { sig: FuncSig, settable: bool },
    Var(VarInfo),
    EnumElement { payload: Option<Vec<TupleElem>>, index: u32 },
    Struct(NominalInfo),
    Class(NominalInfo),
    Enum(NominalInfo),
    Protocol(ProtocolInfo),
    Extension(ExtensionInfo),
    TypeAlias { ty: Type },
    AssociatedType { bounds: Vec<DeclId>, default: Option<Type> },
    GenericParam {
        index: u32,
        bounds: Vec<DeclId>,
        superclass: Option<Type>,
    },
    Accessor { kind: AccessorKind, storage: DeclId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Conformance { subject: Type, protocol: DeclId },
    Superclass { subject: Type, class: Type },
    SameType { lhs: Type, rhs: Type },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericSignature {
    pub params: Vec<DeclId>,
    pub requirements: Vec<Requirement>,
}

impl GenericSignature {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.requirements.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclAttrs {
    pub deprecated: bool,
    pub unavailable: bool,
    /// `@builtin("name")` on prelude declarations.
    pub builtin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub id: DeclId,
    pub name: String,
    pub kind: DeclKind,
    /// Enclosing nominal, extension, protocol or function.
    pub parent: Option<DeclId>,
    pub generics: GenericSignature,
    pub attrs: DeclAttrs,
    pub is_static: bool,
    pub mutating: bool,
    pub is_override: bool,
    pub is_implicit: bool,
    pub node: Option<NodeId>,
    pub span: Span,
}

impl Decl {
    pub fn is_type_decl(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Struct(_)
                | DeclKind::Class(_)
                | DeclKind::Enum(_)
                | DeclKind::Protocol(_)
                | DeclKind::TypeAlias { .. }
                | DeclKind::AssociatedType { .. }
                | DeclKind::GenericParam { .. }
        )
    }

    pub fn nominal_info(&self) -> Option<&NominalInfo> {
        match &self.kind {
            DeclKind::Struct(info) | DeclKind::Class(info) | DeclKind::Enum(info) => Some(info),
            _ => None,
        }
    }

    pub fn nominal_info_mut(&mut self) -> Option<&mut NominalInfo> {
        match &mut self.kind {
            DeclKind::Struct(info) | DeclKind::Class(info) | DeclKind::Enum(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_nominal(&self) -> bool {
        self.nominal_info().is_some()
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, DeclKind::Class(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self.kind, DeclKind::Protocol(_))
    }

    pub fn members(&self) -> &[DeclId] {
        match &self.kind {
            DeclKind::Struct(info) | DeclKind::Class(info) | DeclKind::Enum(info) => {
                &info.members
            }
            DeclKind::Protocol(info) => &info.members,
            DeclKind::Extension(info) => &info.members,
            _ => &[],
        }
    }

    pub fn func_sig(&self) -> Option<&FuncSig> {
        match &self.kind {
            DeclKind::Func(sig)
            | DeclKind::Constructor { sig, .. }
            | DeclKind::Subscript { sig, .. } => Some(sig),
            _ => None,
        }
    }

    pub fn var_info(&self) -> Option<&VarInfo> {
        match &self.kind {
            DeclKind::Var(info) => Some(info),
            _ => None,
        }
    }

    /// Functions, properties and subscripts that need an instance.
    pub fn is_instance_member(&self) -> bool {
        !self.is_static
            && matches!(
                self.kind,
                DeclKind::Func(_) | DeclKind::Var(_) | DeclKind::Subscript { .. }
            )
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, DeclKind::Func(_)) && is_operator_name(&self.name)
    }

    /// `name(a:b:)` for callables, the plain name otherwise.
    pub fn full_name(&self) -> String {
        match &self.kind {
            DeclKind::Func(sig) if !is_operator_name(&self.name) => sig.compound_name(&self.name),
            DeclKind::Constructor { sig, .. } => sig.compound_name("init"),
            DeclKind::Subscript { sig, .. } => sig.compound_name("subscript"),
            _ => self.name.clone(),
        }
    }
}

pub fn is_operator_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|ch| !ch.is_alphanumeric() && ch != '_')
}
