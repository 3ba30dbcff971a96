//! Per-function lowering state: the builder, the cleanup stack, local
//! storage and the generic environment.
//!
//! Values produced while lowering an expression are `Managed`: either an
//! SSA value or the memory holding it, plus the index of the cleanup that
//! destroys it when the lowering owns it. Forwarding a managed value
//! deactivates that cleanup; scope exits emit every active cleanup above
//! the scope's depth in reverse order.

use std::collections::HashMap;

use crate::core::diag::Span;
use crate::core::ir::{
    BlockId, FunctionBuilder, FunctionKind, InstKind, IrType, LoadQualifier, Ownership, SigParam,
    StoreQualifier, ValueId,
};
use crate::core::lower::ModuleLowerer;
use crate::core::lower::errors::{LowerError, LowerErrorKind};
use crate::core::lower::types::{Abstraction, TypeClass};
use crate::core::resolve::{DeclId, DeclKind};
use crate::core::tree::{Block, NodeId};
use crate::core::types::{Substitution, Type};

pub(super) type LowerResult<T> = Result<T, LowerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Managed {
    Value { value: ValueId, cleanup: Option<usize> },
    Addr { addr: ValueId, cleanup: Option<usize> },
}

impl Managed {
    /// Borrowed or trivial value.
    pub(super) fn value(value: ValueId) -> Self {
        Managed::Value {
            value,
            cleanup: None,
        }
    }

    /// Memory the lowering does not own.
    pub(super) fn addr(addr: ValueId) -> Self {
        Managed::Addr { addr, cleanup: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) enum CleanupKind<'a> {
    DestroyValue(ValueId),
    DestroyAddr(ValueId),
    DeallocStack(ValueId),
    Defer(&'a Block),
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Cleanup<'a> {
    kind: CleanupKind<'a>,
    active: bool,
}

/// Storage of a local binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LocalSlot {
    /// Immutable value.
    Value(ValueId),
    /// Stack slot, indirect parameter or address capture.
    Addr(ValueId),
    Boxed { boxed: ValueId, addr: ValueId },
}

impl LocalSlot {
    pub(super) fn addr(self) -> Option<ValueId> {
        match self {
            LocalSlot::Value(_) => None,
            LocalSlot::Addr(addr) | LocalSlot::Boxed { addr, .. } => Some(addr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SelfSlot {
    /// Borrowed instance (non-mutating methods of structs, class methods).
    Value(ValueId),
    /// Mutable instance: `inout` self, or the slot an initializer fills.
    Addr(ValueId),
    Metatype(ValueId),
}

/// Branch target together with the cleanup depth to unwind to.
#[derive(Debug, Clone, Copy)]
pub(super) struct Exit {
    pub(super) block: BlockId,
    pub(super) depth: usize,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct LoopExits {
    pub(super) break_to: Exit,
    pub(super) continue_to: Exit,
}

/// Metadata and witness tables available to the function body, innermost
/// last. Opened existentials push temporary entries keyed by the
/// existential type.
#[derive(Debug, Clone, Default)]
pub(super) struct GenericEnv {
    pub(super) metadata: Vec<(Type, ValueId)>,
    pub(super) tables: Vec<(Type, DeclId, ValueId)>,
}

impl GenericEnv {
    pub(super) fn mark(&self) -> (usize, usize) {
        (self.metadata.len(), self.tables.len())
    }

    pub(super) fn reset(&mut self, mark: (usize, usize)) {
        self.metadata.truncate(mark.0);
        self.tables.truncate(mark.1);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.tables.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReturnMode {
    Value,
    /// `return` inside a constructor yields the initialized `self`.
    Init { failable: bool, class: bool },
}

/// Entry parameters by role.
#[derive(Debug, Clone, Default)]
pub(super) struct Entry {
    pub(super) formals: Vec<ValueId>,
    pub(super) captures: Vec<ValueId>,
    pub(super) self_value: Option<ValueId>,
}

/// Join point of a value-producing branch.
#[derive(Debug, Clone)]
pub(super) struct Merge {
    pub(super) block: BlockId,
    param: Option<ValueId>,
    slot: Option<ValueId>,
    ty: Type,
}

pub(super) struct FuncLowerer<'m, 'a> {
    pub(super) cx: &'m mut ModuleLowerer<'a>,
    pub(super) b: FunctionBuilder,
    pub(super) decl: Option<DeclId>,
    pub(super) result_ty: Type,
    pub(super) out: Option<ValueId>,
    pub(super) throws: bool,
    pub(super) return_mode: ReturnMode,
    cleanups: Vec<Cleanup<'a>>,
    pub(super) locals: HashMap<NodeId, LocalSlot>,
    pub(super) self_slot: Option<SelfSlot>,
    pub(super) self_ty: Option<Type>,
    pub(super) env: GenericEnv,
    pub(super) loops: Vec<LoopExits>,
    pub(super) catches: Vec<Exit>,
    pub(super) chains: Vec<Exit>,
    /// Assignments to stored properties of `self` initialize them.
    pub(super) in_init: bool,
    /// Observed property whose own accessors are being lowered.
    pub(super) direct_storage: Option<DeclId>,
    closures: usize,
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    pub(super) fn new(
        cx: &'m mut ModuleLowerer<'a>,
        name: String,
        kind: FunctionKind,
        decl: Option<DeclId>,
        abs: &Abstraction,
        subst: Option<&Substitution>,
        captures: &[SigParam],
    ) -> (Self, Entry) {
        let types = cx.types;
        let sig = types.signature(abs, subst, captures);
        let params = sig.params.clone();
        let mut b = FunctionBuilder::new(name, kind, sig);
        let entry_block = b.entry();
        let values = params
            .iter()
            .map(|param| b.add_block_param(entry_block, param.ty.clone(), param.convention.param_ownership()))
            .collect::<Vec<_>>();
        let mut values = values.into_iter();

        let out = if abs.indirect_result() { values.next() } else { None };
        let mut env = GenericEnv::default();
        for param in &abs.generic_params {
            if let Some(value) = values.next() {
                env.metadata.push((types.apply(&Type::GenericParam(*param), subst), value));
            }
        }
        for (subject, proto) in &abs.requirements {
            if let Some(value) = values.next() {
                env.tables.push((types.apply(subject, subst), *proto, value));
            }
        }
        let entry = Entry {
            formals: values.by_ref().take(abs.params.len()).collect(),
            captures: values.by_ref().take(captures.len()).collect(),
            self_value: abs.self_param.as_ref().and_then(|_| values.next()),
        };
        let self_ty = abs.self_param.as_ref().map(|param| match &param.ty {
            Type::Metatype(inner) => types.apply(inner, subst),
            ty => types.apply(ty, subst),
        });
        let lowerer = FuncLowerer {
            cx,
            b,
            decl,
            result_ty: types.apply(&abs.result, subst),
            out,
            throws: abs.throws,
            return_mode: ReturnMode::Value,
            cleanups: Vec::new(),
            locals: HashMap::new(),
            self_slot: None,
            self_ty,
            env,
            loops: Vec::new(),
            catches: Vec::new(),
            chains: Vec::new(),
            in_init: false,
            direct_storage: None,
            closures: 0,
        };
        (lowerer, entry)
    }

    pub(super) fn name(&self) -> String {
        self.b.name().to_string()
    }

    pub(super) fn next_closure_index(&mut self) -> usize {
        self.closures += 1;
        self.closures
    }

    /// Adds the finished function to the module.
    pub(super) fn finish(self) {
        let func = self.b.finish();
        self.cx.module.functions.insert(func.name.clone(), func);
    }

    // -- Errors --

    pub(super) fn error(&self, kind: LowerErrorKind, span: Span) -> LowerError {
        LowerError::new(kind, span)
    }

    pub(super) fn unsupported(&self, what: impl Into<String>, span: Span) -> LowerError {
        LowerError::new(LowerErrorKind::Unsupported(what.into()), span)
    }

    // -- Types --

    pub(super) fn class(&self, ty: &Type) -> TypeClass {
        self.cx.types.classify(ty)
    }

    pub(super) fn is_trivial(&self, ty: &Type) -> bool {
        self.cx.types.is_trivial(ty)
    }

    pub(super) fn is_address_only(&self, ty: &Type) -> bool {
        self.cx.types.is_address_only(ty)
    }

    pub(super) fn ir(&self, ty: &Type) -> IrType {
        self.cx.types.ir_type(ty)
    }

    pub(super) fn init_qualifier(&self, ty: &Type) -> StoreQualifier {
        if self.is_trivial(ty) {
            StoreQualifier::Trivial
        } else {
            StoreQualifier::Init
        }
    }

    pub(super) fn assign_qualifier(&self, ty: &Type) -> StoreQualifier {
        if self.is_trivial(ty) {
            StoreQualifier::Trivial
        } else {
            StoreQualifier::Assign
        }
    }

    // -- Cleanups --

    pub(super) fn depth(&self) -> usize {
        self.cleanups.len()
    }

    pub(super) fn push_cleanup(&mut self, kind: CleanupKind<'a>) -> usize {
        self.cleanups.push(Cleanup { kind, active: true });
        self.cleanups.len() - 1
    }

    pub(super) fn forward(&mut self, index: usize) {
        if let Some(cleanup) = self.cleanups.get_mut(index) {
            cleanup.active = false;
        }
    }

    pub(super) fn save_cleanups(&self) -> Vec<Cleanup<'a>> {
        self.cleanups.clone()
    }

    pub(super) fn restore_cleanups(&mut self, saved: Vec<Cleanup<'a>>) {
        self.cleanups = saved;
    }

    /// Drops the cleanups above `depth` without emitting them, after a
    /// branch has already unwound them.
    pub(super) fn drop_cleanups(&mut self, depth: usize) {
        self.cleanups.truncate(depth);
    }

    /// Emits and drops every cleanup above `depth`.
    pub(super) fn pop_scope(&mut self, depth: usize) -> LowerResult<()> {
        while self.cleanups.len() > depth {
            let Some(cleanup) = self.cleanups.pop() else {
                break;
            };
            if cleanup.active && self.b.is_reachable() {
                self.emit_cleanup(cleanup.kind)?;
            }
        }
        Ok(())
    }

    /// Emits the cleanups above `depth` for an early exit, keeping the
    /// stack for the fall-through path.
    pub(super) fn emit_cleanups_to(&mut self, depth: usize) -> LowerResult<()> {
        let saved = self.cleanups.clone();
        let result = self.pop_scope(depth);
        self.cleanups = saved;
        result
    }

    fn emit_cleanup(&mut self, kind: CleanupKind<'a>) -> LowerResult<()> {
        match kind {
            CleanupKind::DestroyValue(value) => self.b.destroy_value(value),
            CleanupKind::DestroyAddr(addr) => self.b.emit(InstKind::DestroyAddr { addr }),
            CleanupKind::DeallocStack(addr) => self.b.dealloc_stack(addr),
            CleanupKind::Defer(block) => {
                let depth = self.depth();
                self.lower_stmts(&block.stmts)?;
                self.pop_scope(depth)?;
            }
        }
        Ok(())
    }

    /// Runs `f` in a scope whose cleanups are emitted when it returns.
    pub(super) fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> LowerResult<T>) -> LowerResult<T> {
        let depth = self.depth();
        let result = f(self);
        let popped = self.pop_scope(depth);
        let value = result?;
        popped?;
        Ok(value)
    }

    // -- Managed values --

    /// Takes responsibility for an owned value.
    pub(super) fn manage(&mut self, value: ValueId) -> Managed {
        if self.b.ownership(value) == Ownership::Owned {
            let cleanup = self.push_cleanup(CleanupKind::DestroyValue(value));
            Managed::Value {
                value,
                cleanup: Some(cleanup),
            }
        } else {
            Managed::value(value)
        }
    }

    /// Stack slot deallocated at the end of the current scope.
    pub(super) fn alloc_temp(&mut self, ty: &Type, name: Option<String>) -> ValueId {
        let ir = self.ir(ty);
        let addr = self.b.alloc_stack(&ir, name);
        self.push_cleanup(CleanupKind::DeallocStack(addr));
        addr
    }

    /// Takes responsibility for the initialized contents of `addr`.
    pub(super) fn manage_temp(&mut self, addr: ValueId, ty: &Type) -> Managed {
        if self.is_trivial(ty) {
            return Managed::addr(addr);
        }
        let cleanup = self.push_cleanup(CleanupKind::DestroyAddr(addr));
        Managed::Addr {
            addr,
            cleanup: Some(cleanup),
        }
    }

    /// Owned copy of a loadable value, forwarding when already owned.
    pub(super) fn owned(&mut self, m: Managed, ty: &Type) -> ValueId {
        match m {
            Managed::Value {
                value,
                cleanup: Some(cleanup),
            } => {
                self.forward(cleanup);
                value
            }
            Managed::Value { value, cleanup: None } => {
                if self.is_trivial(ty) {
                    value
                } else {
                    self.b.copy_value(value)
                }
            }
            Managed::Addr { addr, cleanup } => {
                if self.is_trivial(ty) {
                    return self.b.load(addr, LoadQualifier::Trivial);
                }
                match cleanup {
                    Some(cleanup) => {
                        self.forward(cleanup);
                        self.b.load(addr, LoadQualifier::Take)
                    }
                    None => self.b.load(addr, LoadQualifier::Copy),
                }
            }
        }
    }

    /// Value usable for the rest of the scope without consuming it.
    pub(super) fn borrow(&mut self, m: Managed, ty: &Type) -> ValueId {
        match m {
            Managed::Value { value, .. } => value,
            Managed::Addr { addr, .. } => {
                if self.is_trivial(ty) {
                    self.b.load(addr, LoadQualifier::Trivial)
                } else {
                    let value = self.b.load(addr, LoadQualifier::Copy);
                    self.push_cleanup(CleanupKind::DestroyValue(value));
                    value
                }
            }
        }
    }

    /// Memory holding the value, spilling SSA values to a temporary.
    pub(super) fn to_addr(&mut self, m: Managed, ty: &Type) -> ValueId {
        match m {
            Managed::Addr { addr, .. } => addr,
            Managed::Value { .. } => {
                let temp = self.alloc_temp(ty, None);
                let value = self.owned(m, ty);
                let qualifier = self.init_qualifier(ty);
                self.b.store(value, temp, qualifier);
                self.manage_temp(temp, ty);
                temp
            }
        }
    }

    /// Fresh temporary whose contents the callee takes.
    pub(super) fn take_into_temp(&mut self, m: Managed, ty: &Type) -> ValueId {
        let temp = self.alloc_temp(ty, None);
        self.store_into(m, ty, temp, true);
        temp
    }

    /// Initializes (or assigns) `dst` with the value.
    pub(super) fn store_into(&mut self, m: Managed, ty: &Type, dst: ValueId, init: bool) {
        match m {
            Managed::Addr { addr, cleanup } => {
                let take = match cleanup {
                    Some(cleanup) => {
                        self.forward(cleanup);
                        true
                    }
                    None => false,
                };
                self.b.emit(InstKind::CopyAddr {
                    src: addr,
                    dst,
                    take,
                    init,
                });
            }
            Managed::Value { .. } => {
                let value = self.owned(m, ty);
                let qualifier = if init {
                    self.init_qualifier(ty)
                } else {
                    self.assign_qualifier(ty)
                };
                self.b.store(value, dst, qualifier);
            }
        }
    }

    /// Owned value or initialized temporary, whichever the type needs.
    pub(super) fn owned_managed(&mut self, m: Managed, ty: &Type) -> Managed {
        if self.is_address_only(ty) {
            match m {
                Managed::Addr { cleanup: Some(_), .. } => m,
                _ => {
                    let temp = self.alloc_temp(ty, None);
                    self.store_into(m, ty, temp, true);
                    self.manage_temp(temp, ty)
                }
            }
        } else {
            match m {
                Managed::Value { cleanup: Some(_), .. } => m,
                _ => {
                    let value = self.owned(m, ty);
                    self.manage(value)
                }
            }
        }
    }

    /// Drops a value that is not used any further.
    pub(super) fn discard(&mut self, m: Managed) {
        match m {
            Managed::Value {
                cleanup: Some(cleanup),
                value,
            } => {
                self.forward(cleanup);
                self.b.destroy_value(value);
            }
            Managed::Addr {
                cleanup: Some(cleanup),
                addr,
            } => {
                self.forward(cleanup);
                self.b.emit(InstKind::DestroyAddr { addr });
            }
            _ => {}
        }
    }

    // -- Merges --

    pub(super) fn begin_merge(&mut self, ty: &Type) -> Merge {
        let block = self.b.add_block();
        if self.is_address_only(ty) {
            let slot = self.alloc_temp(ty, None);
            return Merge {
                block,
                param: None,
                slot: Some(slot),
                ty: ty.clone(),
            };
        }
        let ir = self.ir(ty);
        let ownership = self.cx.types.ownership(ty);
        let param = self.b.add_block_param(block, ir, ownership);
        Merge {
            block,
            param: Some(param),
            slot: None,
            ty: ty.clone(),
        }
    }

    /// Ends a branch: moves the value into the merge and unwinds the
    /// branch's scope down to `depth`.
    pub(super) fn branch_to_merge(&mut self, merge: &Merge, m: Managed, depth: usize) -> LowerResult<()> {
        if !self.b.is_reachable() {
            return Ok(());
        }
        match merge.slot {
            Some(slot) => {
                self.store_into(m, &merge.ty, slot, true);
                self.pop_scope(depth)?;
                self.b.br(merge.block, Vec::new());
            }
            None => {
                let value = self.owned(m, &merge.ty);
                self.pop_scope(depth)?;
                self.b.br(merge.block, vec![value]);
            }
        }
        Ok(())
    }

    pub(super) fn finish_merge(&mut self, merge: Merge) -> Managed {
        self.b.switch_to(merge.block);
        match (merge.slot, merge.param) {
            (Some(slot), _) => self.manage_temp(slot, &merge.ty),
            (None, Some(param)) => self.manage(param),
            (None, None) => Managed::value(self.b.unit()),
        }
    }

    // -- Generic environment --

    pub(super) fn metadata_for(&mut self, ty: &Type) -> ValueId {
        if let Some((_, value)) = self.env.metadata.iter().rev().find(|(t, _)| t == ty) {
            return *value;
        }
        let ir = self.cx.types.metatype(ty);
        self.b.emit_value(InstKind::Metatype { ty: ir.clone() }, ir, Ownership::Trivial)
    }

    /// Witness table proving `ty: proto`.
    pub(super) fn table_for(&mut self, ty: &Type, proto: DeclId, span: Span) -> LowerResult<ValueId> {
        if let Some((_, _, value)) = self
            .env
            .tables
            .iter()
            .rev()
            .find(|(t, p, _)| t == ty && *p == proto)
        {
            return Ok(*value);
        }
        let set = self.cx.set;
        let types = self.cx.types;
        let table_ty = types.witness_table(ty, proto);
        if let Some(nominal) = set.nominal_decl_of(ty) {
            let Some(conformance) = set.conformance(nominal, proto) else {
                return Err(self.error(
                    LowerErrorKind::MissingConformance {
                        ty: types.type_name(ty),
                        protocol: set.decl(proto).name.clone(),
                    },
                    span,
                ));
            };
            let name = types.conformance_name(&set.declared_type(conformance.ty_decl), conformance.protocol);
            return Ok(self.b.emit_value(
                InstKind::WitnessTable { conformance: name },
                table_ty,
                Ownership::Trivial,
            ));
        }
        // Inherited protocol of a table in scope.
        let base = self
            .env
            .tables
            .iter()
            .rev()
            .find(|(t, p, _)| t == ty && set.protocol_closure(*p).contains(&proto))
            .map(|(_, _, value)| *value);
        if let Some(table) = base {
            return Ok(self.b.emit_value(
                InstKind::AssocWitnessTable {
                    table,
                    path: "Self".to_string(),
                    protocol: set.decl(proto).name.clone(),
                },
                table_ty,
                Ownership::Trivial,
            ));
        }
        if let Type::DependentMember { base, assoc } = ty {
            if let Some(parent) = set.decl(*assoc).parent {
                let table = self.table_for(base, parent, span)?;
                return Ok(self.b.emit_value(
                    InstKind::AssocWitnessTable {
                        table,
                        path: set.decl(*assoc).name.clone(),
                        protocol: set.decl(proto).name.clone(),
                    },
                    table_ty,
                    Ownership::Trivial,
                ));
            }
        }
        if matches!(ty, Type::Existential(_)) && !set.conforms(ty, proto) {
            return Err(self.error(
                LowerErrorKind::MissingConformance {
                    ty: types.type_name(ty),
                    protocol: set.decl(proto).name.clone(),
                },
                span,
            ));
        }
        Ok(self.b.emit_value(
            InstKind::WitnessTable {
                conformance: types.conformance_name(ty, proto),
            },
            table_ty,
            Ownership::Trivial,
        ))
    }

    /// Metadata and witness-table arguments for a callee's generic
    /// environment under `subst`.
    pub(super) fn generic_args(
        &mut self,
        abs: &Abstraction,
        subst: &Substitution,
        span: Span,
    ) -> LowerResult<Vec<ValueId>> {
        let types = self.cx.types;
        let mut args = Vec::new();
        for param in &abs.generic_params {
            let ty = types.apply(&Type::GenericParam(*param), Some(subst));
            args.push(self.metadata_for(&ty));
        }
        for (subject, proto) in &abs.requirements {
            let ty = types.apply(subject, Some(subst));
            args.push(self.table_for(&ty, *proto, span)?);
        }
        Ok(args)
    }

    /// `self` for the body, as the slot kind its convention calls for.
    pub(super) fn bind_self(&mut self, abs: &Abstraction, value: Option<ValueId>) {
        let (Some(param), Some(value)) = (&abs.self_param, value) else {
            return;
        };
        self.self_slot = Some(match (&param.ty, param.convention.is_indirect()) {
            (Type::Metatype(_), _) => SelfSlot::Metatype(value),
            (_, true) => SelfSlot::Addr(value),
            (_, false) => SelfSlot::Value(value),
        });
    }

    /// Nominal declaration of `self`, if the body has one.
    pub(super) fn self_nominal(&self) -> Option<DeclId> {
        self.self_ty.as_ref().and_then(|ty| self.cx.set.nominal_decl_of(ty))
    }

    pub(super) fn self_is_class(&self) -> bool {
        self.self_ty
            .as_ref()
            .is_some_and(|ty| self.cx.set.is_class_type(ty))
    }

    pub(super) fn is_local_function(&self, decl: DeclId) -> bool {
        let set = self.cx.set;
        let d = set.decl(decl);
        matches!(d.kind, DeclKind::Func(_))
            && d.parent.is_some_and(|parent| {
                matches!(
                    set.decl(parent).kind,
                    DeclKind::Func(_) | DeclKind::Constructor { .. } | DeclKind::Accessor { .. }
                )
            })
    }
}
