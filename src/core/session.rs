//! Compilation session: the loaded modules every stage reads from.
//!
//! The session is the only owner of declaration tables. Checking a new
//! source file builds its module on the side (`CheckedModule`) and leaves
//! the session untouched, so completion queries can run against a shared
//! `&CompilationSession`. `load_module` is the only mutation.

use crate::core::conformance::build_conformances;
use crate::core::diag::CompileError;
use crate::core::parse::{CompletionSite, ParsedFile, parse_source};
use crate::core::prelude::PRELUDE_SOURCE;
use crate::core::resolve::{
    CompatibilityMode, LoadedModule, ModuleId, ModuleSet, PRELUDE_MODULE, collect_module,
};
use crate::core::tree::NodeIdGen;
use crate::core::typecheck::{
    CompletionFacts, TypeTables, infer_property_types, typecheck_module,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub module_name: String,
    pub compat: CompatibilityMode,
    /// Run the ownership verifier on every lowered function.
    pub verify_ownership: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            module_name: "main".to_string(),
            compat: CompatibilityMode::Swift4,
            verify_ownership: true,
        }
    }
}

/// A parsed and type-checked source file that is not (yet) part of the
/// session.
#[derive(Debug, Clone)]
pub struct CheckedModule {
    pub parsed: ParsedFile,
    pub module: LoadedModule,
    pub tables: TypeTables,
    pub errors: Vec<CompileError>,
    pub completion: Option<CompletionFacts>,
}

impl CheckedModule {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CompilationSession {
    modules: Vec<LoadedModule>,
    options: CompilerOptions,
    next_node: u32,
}

impl CompilationSession {
    /// Creates a session with the `Swift` prelude loaded.
    pub fn new(options: CompilerOptions) -> Result<Self, Vec<CompileError>> {
        let mut session = CompilationSession {
            modules: Vec::new(),
            options,
            next_node: 0,
        };
        let parsed = parse_source(PRELUDE_SOURCE, session.id_gen());
        session.load_module(PRELUDE_MODULE, parsed)?;
        Ok(session)
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn compat(&self) -> CompatibilityMode {
        self.options.compat
    }

    pub fn modules(&self) -> &[LoadedModule] {
        &self.modules
    }

    pub fn module_named(&self, name: &str) -> Option<&LoadedModule> {
        self.modules.iter().find(|module| module.name == name)
    }

    /// Node ids for a new file, continuing after every loaded file.
    pub fn id_gen(&self) -> NodeIdGen {
        NodeIdGen::starting_at(self.next_node)
    }

    pub fn next_module_id(&self) -> ModuleId {
        ModuleId(self.modules.len() as u32)
    }

    /// View over every loaded module.
    pub fn view(&self) -> ModuleSet<'_> {
        ModuleSet::new(self.modules.iter().collect())
    }

    /// View over the loaded modules plus `current`, which is searched first.
    pub fn view_with<'a>(&'a self, current: &'a LoadedModule) -> ModuleSet<'a> {
        let mut modules = self.modules.iter().collect::<Vec<_>>();
        modules.push(current);
        ModuleSet::new(modules)
    }

    /// Collects, infers and checks `parsed` as module `name` without adding
    /// it to the session. With a completion site the module is checked
    /// tolerantly and the cursor facts are returned.
    pub fn check(
        &self,
        name: &str,
        parsed: ParsedFile,
        completion: Option<CompletionSite>,
    ) -> CheckedModule {
        let deps = self.modules.iter().collect::<Vec<_>>();
        let mut errors = parsed
            .errors
            .iter()
            .cloned()
            .map(CompileError::from)
            .collect::<Vec<_>>();
        let (mut module, resolve_errors) =
            collect_module(&deps, self.next_module_id(), name, &parsed.file);
        errors.extend(resolve_errors.into_iter().map(CompileError::from));
        infer_property_types(&deps, &mut module, &parsed.file, self.options.compat);
        let conformance_errors = build_conformances(&deps, &mut module);
        if completion.is_none() {
            errors.extend(conformance_errors.into_iter().map(CompileError::from));
        }
        let output = {
            let set = self.view_with(&module);
            typecheck_module(&set, &parsed.file, completion, self.options.compat)
        };
        errors.extend(output.errors.into_iter().map(CompileError::from));
        tracing::info!(
            target: "pipeline",
            stage = "check",
            module = name,
            diagnostics = errors.len(),
            "module checked"
        );
        CheckedModule {
            parsed,
            module,
            tables: output.tables,
            errors,
            completion: output.completion,
        }
    }

    /// Checks `parsed` and adds it to the session. Modules with errors are
    /// rejected and the session is left unchanged.
    pub fn load_module(&mut self, name: &str, parsed: ParsedFile) -> Result<ModuleId, Vec<CompileError>> {
        let next_node = parsed.id_gen.peek();
        let checked = self.check(name, parsed, None);
        if checked.has_errors() {
            return Err(checked.errors);
        }
        Ok(self.add_checked(checked, next_node))
    }

    /// Adds an already checked module (its errors are the caller's concern).
    pub fn add_module(&mut self, checked: CheckedModule) -> ModuleId {
        let next_node = checked.parsed.id_gen.peek();
        self.add_checked(checked, next_node)
    }

    fn add_checked(&mut self, checked: CheckedModule, next_node: u32) -> ModuleId {
        let id = checked.module.id;
        tracing::debug!(target: "pipeline", stage = "load", module = %checked.module.name, "module loaded");
        self.modules.push(checked.module);
        self.next_node = self.next_node.max(next_node);
        id
    }
}

#[cfg(test)]
#[path = "../tests/t_session.rs"]
mod tests;
