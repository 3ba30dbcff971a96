//! Function builder with an insertion cursor.
//!
//! Lowering emits into the current block. A terminator clears the cursor;
//! code emitted while no block is current lands in a fresh block with no
//! predecessors, which `finish` drops.

use std::collections::{HashMap, HashSet};

use super::model::*;

pub struct FunctionBuilder {
    name: String,
    kind: FunctionKind,
    sig: FunctionSig,
    blocks: Vec<Block>,
    values: HashMap<ValueId, ValueDef>,
    current: Option<BlockId>,
    next_value: u32,
}

impl FunctionBuilder {
    /// Creates the builder with an empty entry block as the cursor.
    pub fn new(name: impl Into<String>, kind: FunctionKind, sig: FunctionSig) -> Self {
        let mut builder = FunctionBuilder {
            name: name.into(),
            kind,
            sig,
            blocks: Vec::new(),
            values: HashMap::new(),
            current: None,
            next_value: 0,
        };
        let entry = builder.add_block();
        builder.current = Some(entry);
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sig(&self) -> &FunctionSig {
        &self.sig
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            params: Vec::new(),
            insts: Vec::new(),
            term: Terminator::Unreachable,
        });
        id
    }

    pub fn add_block_param(&mut self, block: BlockId, ty: IrType, ownership: Ownership) -> ValueId {
        let def = self.define(ty, ownership);
        let id = def.id;
        if let Some(block) = self.blocks.get_mut(block.index()) {
            block.params.push(def);
        }
        id
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    pub fn is_reachable(&self) -> bool {
        self.current.is_some()
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    pub fn value(&self, id: ValueId) -> Option<&ValueDef> {
        self.values.get(&id)
    }

    pub fn value_type(&self, id: ValueId) -> IrType {
        self.values
            .get(&id)
            .map(|def| def.ty.clone())
            .unwrap_or_else(IrType::unit)
    }

    pub fn ownership(&self, id: ValueId) -> Ownership {
        self.values
            .get(&id)
            .map(|def| def.ownership)
            .unwrap_or(Ownership::Trivial)
    }

    fn define(&mut self, ty: IrType, ownership: Ownership) -> ValueDef {
        let def = ValueDef {
            id: ValueId(self.next_value),
            ty,
            ownership,
        };
        self.next_value += 1;
        self.values.insert(def.id, def.clone());
        def
    }

    fn cursor(&mut self) -> BlockId {
        match self.current {
            Some(block) => block,
            None => {
                let block = self.add_block();
                self.current = Some(block);
                block
            }
        }
    }

    fn push(&mut self, inst: Instruction) {
        let block = self.cursor();
        if let Some(block) = self.blocks.get_mut(block.index()) {
            block.insts.push(inst);
        }
    }

    /// Emits an instruction without results.
    pub fn emit(&mut self, kind: InstKind) {
        self.push(Instruction {
            results: Vec::new(),
            kind,
        });
    }

    /// Emits an instruction with one result.
    pub fn emit_value(&mut self, kind: InstKind, ty: IrType, ownership: Ownership) -> ValueId {
        let def = self.define(ty, ownership);
        let id = def.id;
        self.push(Instruction {
            results: vec![def],
            kind,
        });
        id
    }

    /// Emits an instruction with several results (destructuring).
    pub fn emit_values(&mut self, kind: InstKind, results: Vec<(IrType, Ownership)>) -> Vec<ValueId> {
        let defs = results
            .into_iter()
            .map(|(ty, ownership)| self.define(ty, ownership))
            .collect::<Vec<_>>();
        let ids = defs.iter().map(|def| def.id).collect();
        self.push(Instruction {
            results: defs,
            kind,
        });
        ids
    }

    /// Terminates the current block and clears the cursor.
    pub fn terminate(&mut self, term: Terminator) {
        let block = self.cursor();
        if let Some(block) = self.blocks.get_mut(block.index()) {
            block.term = term;
        }
        self.current = None;
    }

    // -- Shorthands --

    pub fn integer_literal(&mut self, ty: IrType, value: i128) -> ValueId {
        self.emit_value(
            InstKind::IntegerLiteral {
                ty: ty.clone(),
                value,
            },
            ty,
            Ownership::Trivial,
        )
    }

    pub fn unit(&mut self) -> ValueId {
        self.emit_value(
            InstKind::Tuple { elems: Vec::new() },
            IrType::unit(),
            Ownership::Trivial,
        )
    }

    pub fn function_ref(&mut self, name: &str, ty: IrType) -> ValueId {
        self.emit_value(
            InstKind::FunctionRef {
                name: name.to_string(),
            },
            ty,
            Ownership::Trivial,
        )
    }

    /// `copy_value` for non-trivial values; trivial values are returned as is.
    pub fn copy_value(&mut self, value: ValueId) -> ValueId {
        if self.ownership(value) == Ownership::Trivial {
            return value;
        }
        let ty = self.value_type(value);
        self.emit_value(InstKind::CopyValue { value }, ty, Ownership::Owned)
    }

    /// `destroy_value` for owned values; other values need no cleanup.
    pub fn destroy_value(&mut self, value: ValueId) {
        if self.ownership(value) == Ownership::Owned {
            self.emit(InstKind::DestroyValue { value });
        }
    }

    pub fn alloc_stack(&mut self, ty: &IrType, name: Option<String>) -> ValueId {
        self.emit_value(
            InstKind::AllocStack {
                ty: ty.object_of(),
                name,
            },
            ty.address_of(),
            Ownership::Trivial,
        )
    }

    pub fn dealloc_stack(&mut self, addr: ValueId) {
        self.emit(InstKind::DeallocStack { addr });
    }

    pub fn load(&mut self, addr: ValueId, qualifier: LoadQualifier) -> ValueId {
        let ty = self.value_type(addr).object_of();
        let ownership = match qualifier {
            LoadQualifier::Trivial => Ownership::Trivial,
            LoadQualifier::Take | LoadQualifier::Copy => Ownership::Owned,
        };
        self.emit_value(InstKind::Load { addr, qualifier }, ty, ownership)
    }

    pub fn store(&mut self, value: ValueId, addr: ValueId, qualifier: StoreQualifier) {
        self.emit(InstKind::Store {
            value,
            addr,
            qualifier,
        });
    }

    pub fn br(&mut self, target: BlockId, args: Vec<ValueId>) {
        self.terminate(Terminator::Br { target, args });
    }

    pub fn cond_br(&mut self, cond: ValueId, then_bb: BlockId, else_bb: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_bb,
            else_bb,
        });
    }

    /// Finishes the function, dropping blocks unreachable from the entry.
    pub fn finish(self) -> IrFunction {
        let mut reachable = HashSet::new();
        let mut stack = vec![BlockId(0)];
        while let Some(block) = stack.pop() {
            if !reachable.insert(block) {
                continue;
            }
            if let Some(block) = self.blocks.get(block.index()) {
                stack.extend(block.term.successors());
            }
        }
        let blocks = self
            .blocks
            .into_iter()
            .filter(|block| reachable.contains(&block.id))
            .collect();
        IrFunction {
            name: self.name,
            kind: self.kind,
            sig: self.sig,
            blocks,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/ir/t_builder.rs"]
mod tests;
