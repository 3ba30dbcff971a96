//! Lowering of a checked module to the ownership IR.
//!
//! Every function, accessor, closure, default-argument generator and
//! witness thunk becomes one `IrFunction`. Top-level statements form
//! `main`. Lowering reads the AST together with the checker's side tables
//! and never re-derives types.

mod calls;
mod capture;
mod closure;
mod decls;
mod errors;
mod expr;
mod func;
mod names;
mod pattern;
mod place;
mod stmt;
pub mod types;
mod witness;

use std::collections::HashMap;

use crate::core::diag::CompileError;
use crate::core::ir::{IrModule, verify_module};
use crate::core::lower::capture::CaptureAnalysis;
use crate::core::resolve::{DeclId, ModuleSet};
use crate::core::session::CompilerOptions;
use crate::core::tree::{Expr, SourceFile};
use crate::core::typecheck::TypeTables;

pub use errors::{LowerError, LowerErrorKind};
pub use names::decl_symbol;
pub use types::{Abstraction, ParamAbstraction, TypeClass, TypeLowerer};

struct ModuleLowerer<'a> {
    set: &'a ModuleSet<'a>,
    tables: &'a TypeTables,
    types: TypeLowerer<'a>,
    module: IrModule,
    errors: Vec<LowerError>,
    captures: CaptureAnalysis,
    /// Initial value expressions of stored properties and globals.
    initial_values: HashMap<DeclId, &'a Expr>,
    /// Default argument expressions by callee and parameter index.
    defaults: HashMap<(DeclId, usize), &'a Expr>,
}

/// Lowers the current module of `set` (the one `file` was collected into).
///
/// Lowering errors are collected per function; a function that fails is
/// left out of the module. With `verify_ownership` set, the result is
/// checked by the ownership verifier.
pub fn lower_module<'a>(
    set: &'a ModuleSet<'a>,
    file: &'a SourceFile,
    tables: &'a TypeTables,
    options: &CompilerOptions,
) -> Result<IrModule, Vec<CompileError>> {
    let types = TypeLowerer::new(set);
    let captures = CaptureAnalysis::run(set, types, tables, file);
    let mut lowerer = ModuleLowerer {
        set,
        tables,
        types,
        module: IrModule::new(options.module_name.clone()),
        errors: Vec::new(),
        captures,
        initial_values: HashMap::new(),
        defaults: HashMap::new(),
    };
    lowerer.index_file(file);
    lowerer.lower_file(file);
    lowerer.lower_witness_tables();

    let ModuleLowerer { module, errors, .. } = lowerer;
    tracing::debug!(
        target: "pipeline",
        stage = "lower",
        module = %module.name,
        functions = module.functions.len(),
        witness_tables = module.witness_tables.len(),
        errors = errors.len(),
        "lowered module"
    );
    if !errors.is_empty() {
        return Err(errors.into_iter().map(CompileError::from).collect());
    }
    if options.verify_ownership {
        verify_module(&module).map_err(|errors| errors.into_iter().map(CompileError::from).collect::<Vec<_>>())?;
        tracing::debug!(target: "pipeline", stage = "verify", module = %module.name, "ownership verified");
    }
    Ok(module)
}

#[cfg(test)]
#[path = "../../tests/lower/t_lower.rs"]
mod tests;
