//! `AnyObject` member lookup.
//!
//! Values of type `AnyObject` may call any instance member of any class in
//! any loaded module. This pass is deliberately separate from ordinary
//! member lookup: results carry `LookupOrigin::Dynamic` and never go through
//! witness tables.

use crate::core::resolve::lookup::{LookupOrigin, MemberCandidate, signature_key};
use crate::core::resolve::modules::ModuleSet;
use crate::core::types::Type;

/// Instance members named `name` (all of them for `None`) of every class,
/// ordered by module load order, then declaration order. Members with the
/// same signature collapse into the first one found.
pub fn dynamic_lookup(set: &ModuleSet<'_>, name: Option<&str>) -> Vec<MemberCandidate> {
    let mut out = Vec::new();
    let mut keys = Vec::new();
    for module in set.modules() {
        for decl in &module.decls {
            if !decl.is_class() {
                continue;
            }
            let class_ty = set.declared_type(decl.id);
            for member in set.all_members(decl.id) {
                let member_decl = set.decl(member);
                if member_decl.is_static || !member_decl.is_instance_member() {
                    continue;
                }
                if name.is_some_and(|name| name != member_decl.name) {
                    continue;
                }
                let key = signature_key(set, member_decl, &Type::AnyObject);
                if keys.contains(&key) {
                    continue;
                }
                keys.push(key);
                out.push(MemberCandidate {
                    decl: member,
                    origin: LookupOrigin::Dynamic,
                    base: class_ty.clone(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/resolve/t_dynamic.rs"]
mod tests;
