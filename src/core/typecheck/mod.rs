//! Type checker.
//!
//! Checking is bidirectional: expressions are inferred against an optional
//! contextual type, solver variables stand for unknown literal and generic
//! argument types, and every derived fact lands in `TypeTables` keyed by
//! `NodeId`. The AST is never rewritten.

mod call;
mod decls;
mod engine;
mod errors;
mod expr;
mod model;
mod pattern;
mod stmt;
mod unify;

pub use errors::{TypeCheckError, TypeCheckErrorKind};
pub use model::*;
pub use unify::{TypeVars, VarOrigin};

use crate::core::parse::CompletionSite;
use crate::core::resolve::{
    CompatibilityMode, DeclKind, LoadedModule, ModuleSet, binding_names,
};
use crate::core::tree::{Item, ItemKind, NodeId, Pattern, PatternKind, SourceFile, VarDecl};
use crate::core::typecheck::engine::{BodyKind, Checker, FuncContext};
use crate::core::types::Type;

#[derive(Debug, Clone)]
pub struct TypeCheckOutput {
    pub tables: TypeTables,
    pub errors: Vec<TypeCheckError>,
    /// Present when a completion site was supplied.
    pub completion: Option<CompletionFacts>,
}

/// Checks every body of the current module of `set` (its last module).
///
/// With a completion site the checker runs tolerantly: it records what it
/// knows at the cursor and skips checks that only matter for compilation.
pub fn typecheck_module(
    set: &ModuleSet<'_>,
    file: &SourceFile,
    completion: Option<CompletionSite>,
    compat: CompatibilityMode,
) -> TypeCheckOutput {
    let mut checker = Checker::new(set, compat, completion);
    checker.check_file(file);
    let (tables, errors, completion) = checker.finalize();
    tracing::debug!(
        target: "pipeline",
        stage = "typecheck",
        types = tables.types.len(),
        calls = tables.calls.len(),
        errors = errors.len(),
        "checked module"
    );
    TypeCheckOutput {
        tables,
        errors,
        completion,
    }
}

/// Gives unannotated stored variables the type of their initializer, in
/// source order, and propagates it into implicit memberwise initializers.
///
/// Runs before conformances are built so witnesses see the inferred types.
/// Errors are left for `typecheck_module` to report.
pub fn infer_property_types(
    deps: &[&LoadedModule],
    module: &mut LoadedModule,
    file: &SourceFile,
    compat: CompatibilityMode,
) {
    let mut vars = Vec::new();
    collect_unannotated(&file.items, &mut vars);
    for (item, var) in vars {
        let Some(decl) = module.decl_for_node(item.id) else {
            continue;
        };
        let Some(init) = &var.init else {
            continue;
        };
        let ty = {
            let mut modules = deps.to_vec();
            modules.push(&*module);
            let set = ModuleSet::new(modules);
            let mut checker = Checker::new(&set, compat, None);
            let mut ctx = FuncContext::new(BodyKind::Initial, Some(decl), Type::Error);
            ctx.is_static = set.decl(decl).is_static;
            checker.funcs.push(ctx);
            let ty = checker.infer_expr(init, None);
            checker.finish_statement(0);
            let resolved = checker.resolved(&ty);
            set.normalize(&resolved).map(&mut |node| match node {
                Type::Var(_) => Type::Error,
                other => other,
            })
        };
        let mut typed = Vec::new();
        if var.simple_name().is_some() {
            typed.push((item.id, ty));
        } else {
            destructure(&var.pattern, &ty, &mut typed);
        }
        for (node, ty) in typed {
            let Some(id) = module.decl_for_node(node) else {
                continue;
            };
            let (name, parent) = {
                let decl = module.decl_mut(id);
                if let DeclKind::Var(info) = &mut decl.kind {
                    info.ty = ty.clone();
                }
                (decl.name.clone(), decl.parent)
            };
            if let Some(parent) = parent {
                patch_memberwise_inits(module, parent, &name, &ty);
            }
        }
    }
    tracing::debug!(target: "pipeline", stage = "infer-properties", module = %module.name);
}

fn collect_unannotated<'f>(items: &'f [Item], out: &mut Vec<(&'f Item, &'f VarDecl)>) {
    for item in items {
        match &item.kind {
            ItemKind::Var(var) if var.ty.is_none() && var.init.is_some() => out.push((item, var)),
            ItemKind::Struct(nominal) | ItemKind::Class(nominal) | ItemKind::Enum(nominal) => {
                collect_unannotated(&nominal.members, out)
            }
            ItemKind::Extension(ext) => collect_unannotated(&ext.members, out),
            _ => {}
        }
    }
}

fn destructure(pattern: &Pattern, ty: &Type, out: &mut Vec<(NodeId, Type)>) {
    match (&pattern.kind, ty) {
        (PatternKind::Binding { .. }, _) => out.push((pattern.id, ty.clone())),
        (PatternKind::Tuple(elems), Type::Tuple(types)) if elems.len() == types.len() => {
            for (elem, elem_ty) in elems.iter().zip(types) {
                destructure(elem, &elem_ty.ty, out);
            }
        }
        _ => {
            let mut names = Vec::new();
            binding_names(pattern, &mut names);
            out.extend(names.into_iter().map(|(_, node)| (node, Type::Error)));
        }
    }
}

fn patch_memberwise_inits(module: &mut LoadedModule, nominal: crate::core::resolve::DeclId, name: &str, ty: &Type) {
    let members = match module.decl(nominal).nominal_info() {
        Some(info) => info.members.clone(),
        None => return,
    };
    for member in members {
        let decl = module.decl_mut(member);
        if !decl.is_implicit {
            continue;
        }
        if let DeclKind::Constructor { sig, .. } = &mut decl.kind {
            for param in sig.params.iter_mut() {
                if param.name == name && param.ty.is_error() {
                    param.ty = ty.clone();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/typecheck/t_typecheck.rs"]
mod tests;
