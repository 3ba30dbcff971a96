//! SIL-like IR with explicit ownership.
//!
//! Functions are lists of basic blocks; every value has a type and an
//! ownership kind. Values flow between blocks only through block
//! parameters and dominance; there are no phis.

use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Must be consumed exactly once on every path.
    Owned,
    /// Borrowed for the duration of the function; never consumed.
    Guaranteed,
    Unowned,
    Trivial,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ownership::Owned => "@owned",
            Ownership::Guaranteed => "@guaranteed",
            Ownership::Unowned => "@unowned",
            Ownership::Trivial => "@trivial",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Object,
    Address,
}

/// A lowered type: the rendered source type plus its category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrType {
    pub category: TypeCategory,
    pub name: String,
}

impl IrType {
    pub fn object(name: impl Into<String>) -> Self {
        IrType {
            category: TypeCategory::Object,
            name: name.into(),
        }
    }

    pub fn address(name: impl Into<String>) -> Self {
        IrType {
            category: TypeCategory::Address,
            name: name.into(),
        }
    }

    pub fn unit() -> Self {
        IrType::object("()")
    }

    pub fn is_address(&self) -> bool {
        self.category == TypeCategory::Address
    }

    pub fn address_of(&self) -> IrType {
        IrType::address(self.name.clone())
    }

    pub fn object_of(&self) -> IrType {
        IrType::object(self.name.clone())
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            TypeCategory::Object => write!(f, "${}", self.name),
            TypeCategory::Address => write!(f, "$*{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDef {
    pub id: ValueId,
    pub ty: IrType,
    pub ownership: Ownership,
}

/// How an argument is passed to (or captured by) a callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    /// Direct; the callee consumes the value.
    Owned,
    /// Direct; the caller keeps ownership.
    Guaranteed,
    Trivial,
    /// Indirect; the caller keeps ownership of the memory's contents.
    InGuaranteed,
    /// Indirect; the callee takes the memory's contents.
    In,
    Inout,
    /// Address capture of a non-escaping closure.
    InoutAliasable,
    /// Indirect result slot.
    Out,
}

impl Convention {
    pub fn is_indirect(self) -> bool {
        matches!(
            self,
            Convention::InGuaranteed
                | Convention::In
                | Convention::Inout
                | Convention::InoutAliasable
                | Convention::Out
        )
    }

    /// Ownership of the parameter value inside the callee.
    pub fn param_ownership(self) -> Ownership {
        match self {
            Convention::Owned => Ownership::Owned,
            Convention::Guaranteed => Ownership::Guaranteed,
            _ => Ownership::Trivial,
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Convention::Owned => "@owned",
            Convention::Guaranteed => "@guaranteed",
            Convention::Trivial => "@trivial",
            Convention::InGuaranteed => "@in_guaranteed",
            Convention::In => "@in",
            Convention::Inout => "@inout",
            Convention::InoutAliasable => "@inout_aliasable",
            Convention::Out => "@out",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultConvention {
    Owned,
    Trivial,
    /// Returned through the leading `@out` parameter; the direct result is `()`.
    Indirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigParam {
    pub convention: Convention,
    pub ty: IrType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    /// Rendered generic signature, e.g. `<T where T : P>`; empty when not generic.
    pub generics: String,
    /// All parameters in order: indirect result, hidden generic arguments,
    /// formal parameters, captures, `self`.
    pub params: Vec<SigParam>,
    pub result: IrType,
    pub result_convention: ResultConvention,
    pub throws: bool,
}

impl FunctionSig {
    pub fn render(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|param| format!("{} {}", param.convention, param.ty.name_with_star()))
            .collect::<Vec<_>>()
            .join(", ");
        let result = match self.result_convention {
            ResultConvention::Owned => format!("@owned {}", self.result.name),
            ResultConvention::Trivial | ResultConvention::Indirect => self.result.name.clone(),
        };
        let throws = if self.throws { " throws" } else { "" };
        let generics = if self.generics.is_empty() {
            String::new()
        } else {
            format!("{} ", self.generics)
        };
        format!("{generics}({params}){throws} -> {result}")
    }
}

impl IrType {
    fn name_with_star(&self) -> String {
        match self.category {
            TypeCategory::Object => self.name.clone(),
            TypeCategory::Address => format!("*{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadQualifier {
    Take,
    Copy,
    Trivial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreQualifier {
    Init,
    Assign,
    Trivial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyArg {
    pub value: ValueId,
    pub convention: Convention,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    IntegerLiteral { ty: IrType, value: i128 },
    FloatLiteral { ty: IrType, value: String },
    StringLiteral { value: String },
    FunctionRef { name: String },
    ThinToThick { func: ValueId },
    /// Runtime or primitive operation named by the prelude's `@builtin`.
    Builtin { name: String, args: Vec<ValueId> },
    Metatype { ty: IrType },
    /// Reference to the witness table of a concrete conformance.
    WitnessTable { conformance: String },
    /// Requirement implementation looked up in a witness table value.
    WitnessMethod { lookup: String, member: String, table: ValueId },
    /// Conformance of an associated type, read from the witness table of
    /// its parent conformance.
    AssocWitnessTable { table: ValueId, path: String, protocol: String },
    /// `AnyObject` member lookup by name.
    DynamicMethod { object: ValueId, member: String },
    Apply { callee: ValueId, args: Vec<ApplyArg> },
    PartialApply { callee: ValueId, captures: Vec<ApplyArg> },
    Tuple { elems: Vec<ValueId> },
    DestructureTuple { tuple: ValueId },
    TupleElementAddr { addr: ValueId, index: usize },
    /// Borrowed projection of one tuple element.
    TupleExtract { tuple: ValueId, index: usize },
    Struct { ty: IrType, fields: Vec<ValueId> },
    DestructureStruct { value: ValueId },
    /// Borrowed projection of one stored property.
    StructExtract { value: ValueId, field: String },
    StructElementAddr { addr: ValueId, field: String },
    Enum { ty: IrType, case: String, payload: Option<ValueId> },
    InitEnumDataAddr { addr: ValueId, case: String },
    InjectEnumAddr { addr: ValueId, case: String },
    UncheckedTakeEnumDataAddr { addr: ValueId, case: String },
    AllocStack { ty: IrType, name: Option<String> },
    DeallocStack { addr: ValueId },
    AllocBox { ty: IrType, name: Option<String> },
    ProjectBox { boxed: ValueId },
    AllocRef { ty: IrType },
    RefElementAddr { object: ValueId, field: String },
    GlobalAddr { name: String },
    MarkUninitialized { addr: ValueId },
    Load { addr: ValueId, qualifier: LoadQualifier },
    Store { value: ValueId, addr: ValueId, qualifier: StoreQualifier },
    CopyAddr { src: ValueId, dst: ValueId, take: bool, init: bool },
    DestroyAddr { addr: ValueId },
    CopyValue { value: ValueId },
    DestroyValue { value: ValueId },
    Upcast { value: ValueId, ty: IrType },
    UncheckedRefCast { value: ValueId, ty: IrType },
    InitExistentialAddr { addr: ValueId, concrete: String },
    InitExistentialRef { value: ValueId, ty: IrType },
    OpenExistentialAddr { addr: ValueId },
    /// Metadata of the value stored in an opened existential.
    ExistentialMetatype { opened: ValueId },
    /// Witness table for `protocol` of an opened existential.
    ExistentialWitnessTable { opened: ValueId, protocol: String },
    DebugValue { value: ValueId, name: String, is_let: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub results: Vec<ValueDef>,
    pub kind: InstKind,
}

impl Instruction {
    pub fn result(&self) -> Option<&ValueDef> {
        self.results.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    pub case: String,
    pub target: BlockId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Return {
        value: ValueId,
    },
    Throw {
        value: ValueId,
    },
    Br {
        target: BlockId,
        args: Vec<ValueId>,
    },
    CondBr {
        cond: ValueId,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    /// Consumes the enum; each case block receives the payload (if any),
    /// the default block receives the enum itself.
    SwitchEnum {
        value: ValueId,
        cases: Vec<SwitchCase>,
        default: Option<BlockId>,
    },
    SwitchEnumAddr {
        addr: ValueId,
        cases: Vec<SwitchCase>,
        default: Option<BlockId>,
    },
    /// Call of a throwing function. The normal block receives the result,
    /// the error block receives the error.
    TryApply {
        callee: ValueId,
        args: Vec<ApplyArg>,
        normal: BlockId,
        error: BlockId,
    },
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return { .. } | Terminator::Throw { .. } | Terminator::Unreachable => {
                Vec::new()
            }
            Terminator::Br { target, .. } => vec![*target],
            Terminator::CondBr {
                then_bb, else_bb, ..
            } => vec![*then_bb, *else_bb],
            Terminator::SwitchEnum { cases, default, .. }
            | Terminator::SwitchEnumAddr { cases, default, .. } => cases
                .iter()
                .map(|case| case.target)
                .chain(*default)
                .collect(),
            Terminator::TryApply { normal, error, .. } => vec![*normal, *error],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub params: Vec<ValueDef>,
    pub insts: Vec<Instruction>,
    pub term: Terminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Closure,
    /// Witness thunk or reabstraction thunk.
    Thunk,
    DefaultArgument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrFunction {
    pub name: String,
    pub kind: FunctionKind,
    pub sig: FunctionSig,
    /// Entry block first.
    pub blocks: Vec<Block>,
}

impl IrFunction {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrGlobal {
    pub name: String,
    pub ty: IrType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessEntry {
    Method { requirement: String, thunk: String },
    AssociatedType { name: String, ty: String },
    /// Conformance of an associated type, resolved through another table.
    AssociatedConformance { path: String, protocol: String, conformance: String },
    /// Conformance to an inherited protocol.
    BaseProtocol { protocol: String, conformance: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrWitnessTable {
    /// `Type: Protocol`
    pub conformance: String,
    pub entries: Vec<WitnessEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrModule {
    pub name: String,
    pub globals: Vec<IrGlobal>,
    pub functions: IndexMap<String, IrFunction>,
    pub witness_tables: Vec<IrWitnessTable>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        IrModule {
            name: name.into(),
            ..IrModule::default()
        }
    }

    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.get(name)
    }
}

/// How an instruction or terminator uses an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandUse {
    /// Ends the value's lifetime (destroy, forward, move into memory).
    Consume,
    /// Reads the value without ending its lifetime.
    Borrow,
}

fn apply_uses(args: &[ApplyArg], out: &mut Vec<(ValueId, OperandUse)>) {
    for arg in args {
        let use_kind = match arg.convention {
            Convention::Owned => OperandUse::Consume,
            _ => OperandUse::Borrow,
        };
        out.push((arg.value, use_kind));
    }
}

/// Operands of an instruction with their use kind, in operand order.
pub fn inst_operands(kind: &InstKind) -> Vec<(ValueId, OperandUse)> {
    use OperandUse::{Borrow, Consume};
    let mut out = Vec::new();
    match kind {
        InstKind::IntegerLiteral { .. }
        | InstKind::FloatLiteral { .. }
        | InstKind::StringLiteral { .. }
        | InstKind::FunctionRef { .. }
        | InstKind::Metatype { .. }
        | InstKind::WitnessTable { .. }
        | InstKind::AllocStack { .. }
        | InstKind::AllocBox { .. }
        | InstKind::AllocRef { .. }
        | InstKind::GlobalAddr { .. } => {}
        InstKind::ThinToThick { func } => out.push((*func, Borrow)),
        InstKind::Builtin { args, .. } => out.extend(args.iter().map(|arg| (*arg, Borrow))),
        InstKind::WitnessMethod { table, .. } | InstKind::AssocWitnessTable { table, .. } => {
            out.push((*table, Borrow))
        }
        InstKind::TupleExtract { tuple: value, .. } | InstKind::StructExtract { value, .. } => {
            out.push((*value, Borrow))
        }
        InstKind::DynamicMethod { object, .. } => out.push((*object, Borrow)),
        InstKind::Apply { callee, args } => {
            out.push((*callee, Borrow));
            apply_uses(args, &mut out);
        }
        InstKind::PartialApply { callee, captures } => {
            out.push((*callee, Borrow));
            apply_uses(captures, &mut out);
        }
        InstKind::Tuple { elems } => out.extend(elems.iter().map(|elem| (*elem, Consume))),
        InstKind::Struct { fields, .. } => out.extend(fields.iter().map(|field| (*field, Consume))),
        InstKind::Enum { payload, .. } => out.extend(payload.iter().map(|value| (*value, Consume))),
        InstKind::DestructureTuple { tuple: value }
        | InstKind::DestructureStruct { value }
        | InstKind::DestroyValue { value }
        | InstKind::Upcast { value, .. }
        | InstKind::UncheckedRefCast { value, .. }
        | InstKind::InitExistentialRef { value, .. } => out.push((*value, Consume)),
        InstKind::Store { value, addr, .. } => {
            out.push((*value, Consume));
            out.push((*addr, Borrow));
        }
        InstKind::CopyValue { value } | InstKind::DebugValue { value, .. } => {
            out.push((*value, Borrow))
        }
        InstKind::CopyAddr { src, dst, .. } => {
            out.push((*src, Borrow));
            out.push((*dst, Borrow));
        }
        InstKind::TupleElementAddr { addr, .. }
        | InstKind::StructElementAddr { addr, .. }
        | InstKind::InitEnumDataAddr { addr, .. }
        | InstKind::InjectEnumAddr { addr, .. }
        | InstKind::UncheckedTakeEnumDataAddr { addr, .. }
        | InstKind::DeallocStack { addr }
        | InstKind::MarkUninitialized { addr }
        | InstKind::Load { addr, .. }
        | InstKind::DestroyAddr { addr }
        | InstKind::InitExistentialAddr { addr, .. }
        | InstKind::OpenExistentialAddr { addr } => out.push((*addr, Borrow)),
        InstKind::ProjectBox { boxed } => out.push((*boxed, Borrow)),
        InstKind::RefElementAddr { object, .. } => out.push((*object, Borrow)),
        InstKind::ExistentialMetatype { opened } | InstKind::ExistentialWitnessTable { opened, .. } => {
            out.push((*opened, Borrow))
        }
    }
    out
}

/// Operands of a terminator with their use kind.
pub fn term_operands(term: &Terminator) -> Vec<(ValueId, OperandUse)> {
    use OperandUse::{Borrow, Consume};
    let mut out = Vec::new();
    match term {
        Terminator::Return { value } | Terminator::Throw { value } => out.push((*value, Consume)),
        Terminator::Br { args, .. } => out.extend(args.iter().map(|arg| (*arg, Consume))),
        Terminator::CondBr { cond, .. } => out.push((*cond, Borrow)),
        Terminator::SwitchEnum { value, .. } => out.push((*value, Consume)),
        Terminator::SwitchEnumAddr { addr, .. } => out.push((*addr, Borrow)),
        Terminator::TryApply { callee, args, .. } => {
            out.push((*callee, Borrow));
            apply_uses(args, &mut out);
        }
        Terminator::Unreachable => {}
    }
    out
}
