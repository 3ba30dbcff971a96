//! Ownership verifier.
//!
//! Walks every function path-sensitively with the set of owned values that
//! are live on entry to each block. An owned value must be consumed exactly
//! once on every path to a `return` or `throw`; guaranteed values are never
//! consumed. Paths ending in `unreachable` may leave values live.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;

use crate::core::diag::{Span, SpannedError};
use crate::core::ir::model::*;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerifyErrorKind {
    #[error("in @{function}: use of undefined value %{value}")]
    UndefinedValue { function: String, value: u32 },

    #[error("in @{function}: value %{value} is defined more than once")]
    DuplicateValue { function: String, value: u32 },

    #[error("in @{function}: branch to undefined block bb{block}")]
    UndefinedBlock { function: String, block: u32 },

    #[error("in @{function}: use of %{value} after it was consumed")]
    UseAfterConsume { function: String, value: u32 },

    #[error("in @{function}: guaranteed value %{value} is consumed")]
    ConsumedGuaranteed { function: String, value: u32 },

    #[error("in @{function}: owned values {values} leak at the end of bb{block}")]
    Leaked {
        function: String,
        block: u32,
        values: String,
    },

    #[error("in @{function}: predecessors of bb{block} disagree on live owned values")]
    InconsistentMerge { function: String, block: u32 },
}

pub type VerifyError = SpannedError<VerifyErrorKind>;

type Live = BTreeSet<ValueId>;

pub fn verify_module(module: &IrModule) -> Result<(), Vec<VerifyError>> {
    let errors = module
        .functions
        .values()
        .filter_map(|func| verify_function(func).err())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn verify_function(func: &IrFunction) -> Result<(), VerifyError> {
    Verifier::new(func)?.run()
}

fn err(kind: VerifyErrorKind) -> VerifyError {
    SpannedError::new(kind, Span::default())
}

struct Verifier<'a> {
    func: &'a IrFunction,
    blocks: HashMap<BlockId, &'a Block>,
    ownership: HashMap<ValueId, Ownership>,
    /// Live set on entry to each visited block, block parameters excluded.
    entry: HashMap<BlockId, Live>,
}

impl<'a> Verifier<'a> {
    fn new(func: &'a IrFunction) -> Result<Self, VerifyError> {
        let mut blocks = HashMap::new();
        let mut ownership = HashMap::new();
        for block in &func.blocks {
            blocks.insert(block.id, block);
            let defs = block
                .params
                .iter()
                .chain(block.insts.iter().flat_map(|inst| inst.results.iter()));
            for def in defs {
                if ownership.insert(def.id, def.ownership).is_some() {
                    return Err(err(VerifyErrorKind::DuplicateValue {
                        function: func.name.clone(),
                        value: def.id.0,
                    }));
                }
            }
        }
        Ok(Verifier {
            func,
            blocks,
            ownership,
            entry: HashMap::new(),
        })
    }

    fn name(&self) -> String {
        self.func.name.clone()
    }

    fn run(mut self) -> Result<(), VerifyError> {
        let Some(first) = self.func.blocks.first() else {
            return Ok(());
        };
        let mut worklist = vec![first.id];
        self.entry.insert(first.id, Live::new());
        let mut done = HashSet::new();
        while let Some(id) = worklist.pop() {
            if !done.insert(id) {
                continue;
            }
            let block = self.blocks[&id];
            let mut live = self.entry[&id].clone();
            for param in &block.params {
                self.define(param, &mut live);
            }
            for inst in &block.insts {
                for (value, use_kind) in inst_operands(&inst.kind) {
                    self.use_value(value, use_kind, &mut live)?;
                }
                for def in &inst.results {
                    self.define(def, &mut live);
                }
            }
            for (value, use_kind) in term_operands(&block.term) {
                self.use_value(value, use_kind, &mut live)?;
            }
            match &block.term {
                Terminator::Return { .. } | Terminator::Throw { .. } => {
                    if !live.is_empty() {
                        let values = live
                            .iter()
                            .map(|value| format!("%{}", value.0))
                            .collect::<Vec<_>>()
                            .join(", ");
                        return Err(err(VerifyErrorKind::Leaked {
                            function: self.name(),
                            block: id.0,
                            values,
                        }));
                    }
                }
                Terminator::Unreachable => {}
                term => {
                    for succ in term.successors() {
                        self.merge(succ, &live)?;
                        worklist.push(succ);
                    }
                }
            }
        }
        Ok(())
    }

    fn define(&self, def: &ValueDef, live: &mut Live) {
        if def.ownership == Ownership::Owned {
            live.insert(def.id);
        }
    }

    fn use_value(&self, value: ValueId, use_kind: OperandUse, live: &mut Live) -> Result<(), VerifyError> {
        let Some(ownership) = self.ownership.get(&value) else {
            return Err(err(VerifyErrorKind::UndefinedValue {
                function: self.name(),
                value: value.0,
            }));
        };
        match (ownership, use_kind) {
            (Ownership::Owned, OperandUse::Consume) => {
                if !live.remove(&value) {
                    return Err(err(VerifyErrorKind::UseAfterConsume {
                        function: self.name(),
                        value: value.0,
                    }));
                }
            }
            (Ownership::Owned, OperandUse::Borrow) => {
                if !live.contains(&value) {
                    return Err(err(VerifyErrorKind::UseAfterConsume {
                        function: self.name(),
                        value: value.0,
                    }));
                }
            }
            (Ownership::Guaranteed, OperandUse::Consume) => {
                return Err(err(VerifyErrorKind::ConsumedGuaranteed {
                    function: self.name(),
                    value: value.0,
                }));
            }
            _ => {}
        }
        Ok(())
    }

    fn merge(&mut self, succ: BlockId, live: &Live) -> Result<(), VerifyError> {
        if !self.blocks.contains_key(&succ) {
            return Err(err(VerifyErrorKind::UndefinedBlock {
                function: self.name(),
                block: succ.0,
            }));
        }
        match self.entry.get(&succ) {
            Some(existing) if existing != live => Err(err(VerifyErrorKind::InconsistentMerge {
                function: self.name(),
                block: succ.0,
            })),
            Some(_) => Ok(()),
            None => {
                self.entry.insert(succ, live.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/ir/t_verify.rs"]
mod tests;
