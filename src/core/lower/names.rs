//! Symbol names of lowered functions and globals.
//!
//! Names are dotted declaration paths (`Shape.area()`), with a `#N` suffix
//! for the N-th redeclaration of the same full name in one context and a
//! `!kind` suffix for entry points that share a declaration.

use crate::core::resolve::{DeclId, DeclKind, ModuleSet};

/// Dotted path of `decl`, qualified by its module when it comes from
/// another module.
pub fn decl_symbol(set: &ModuleSet<'_>, decl: DeclId) -> String {
    let d = set.decl(decl);
    if let DeclKind::Accessor { kind, storage } = &d.kind {
        return format!("{}!{}", decl_symbol(set, *storage), kind.suffix());
    }
    let own = match &d.kind {
        DeclKind::Func(_) | DeclKind::Constructor { .. } | DeclKind::Subscript { .. } => {
            let full = d.full_name();
            match redeclaration_index(set, decl, &full) {
                0 => full,
                n => format!("{full}#{n}"),
            }
        }
        _ => d.name.clone(),
    };
    match d.parent {
        Some(parent) => format!("{}.{own}", context_symbol(set, parent)),
        None if decl.module != set.current() => format!("{}.{own}", set.module(decl.module).name),
        None => own,
    }
}

fn context_symbol(set: &ModuleSet<'_>, context: DeclId) -> String {
    match &set.decl(context).kind {
        DeclKind::Extension(info) => match info.extended {
            Some(extended) => decl_symbol(set, extended),
            None => "extension".to_string(),
        },
        _ => decl_symbol(set, context),
    }
}

/// Position of `decl` among earlier siblings with the same full name.
fn redeclaration_index(set: &ModuleSet<'_>, decl: DeclId, full: &str) -> usize {
    let d = set.decl(decl);
    let siblings: &[DeclId] = match d.parent {
        Some(parent) => set.decl(parent).members(),
        None => &set.module(decl.module).top_level,
    };
    siblings
        .iter()
        .take_while(|sibling| **sibling != decl)
        .filter(|sibling| {
            let s = set.decl(**sibling);
            s.func_sig().is_some() && s.full_name() == full
        })
        .count()
}

/// Allocating entry of a constructor: `C.init(x:)!allocator`.
pub fn allocator_symbol(set: &ModuleSet<'_>, ctor: DeclId) -> String {
    format!("{}!allocator", decl_symbol(set, ctor))
}

/// Initializing entry of a class constructor.
pub fn initializer_symbol(set: &ModuleSet<'_>, ctor: DeclId) -> String {
    format!("{}!initializer", decl_symbol(set, ctor))
}

/// Constructors of classes get separate allocating and initializing
/// entries; other constructors are a single function.
pub fn constructor_symbol(set: &ModuleSet<'_>, ctor: DeclId) -> String {
    let is_class = set
        .decl(ctor)
        .parent
        .and_then(|parent| set.nominal_of_context(parent))
        .is_some_and(|nominal| set.decl(nominal).is_class());
    if is_class {
        allocator_symbol(set, ctor)
    } else {
        decl_symbol(set, ctor)
    }
}

pub fn default_arg_symbol(set: &ModuleSet<'_>, callee: DeclId, index: usize) -> String {
    format!("{}!default_arg.{index}", decl_symbol(set, callee))
}

/// Accessor entry of a storage declaration, whether or not it was written.
pub fn accessor_symbol(set: &ModuleSet<'_>, storage: DeclId, suffix: &str) -> String {
    format!("{}!{suffix}", decl_symbol(set, storage))
}

pub fn closure_symbol(enclosing: &str, index: usize) -> String {
    format!("{enclosing}.closure#{index}")
}

pub fn witness_thunk_symbol(set: &ModuleSet<'_>, ty_decl: DeclId, proto: DeclId, requirement: DeclId) -> String {
    format!(
        "{}.{}.{}!witness",
        decl_symbol(set, ty_decl),
        set.decl(proto).name,
        set.decl(requirement).full_name()
    )
}
