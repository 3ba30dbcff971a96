//! Name resolution: declaration collection, type resolution and lookup.

mod collect;
pub mod decl;
pub mod dynamic;
pub mod errors;
pub mod lookup;
pub mod modules;
pub mod overload;
pub mod scope;
mod type_resolver;

pub use collect::{binding_names, collect_module};
pub use decl::*;
pub use dynamic::dynamic_lookup;
pub use errors::{ResolveError, ResolveErrorKind};
pub use lookup::{LookupOrigin, MemberAccess, MemberCandidate, lookup_members, member_substitution};
pub use modules::{KnownDecls, LiteralKind, LoadedModule, ModuleSet, PRELUDE_MODULE, split_dependent};
pub use overload::{
    ArgMatch, ArgShape, Candidate, CompatibilityMode, LabelError, OverloadSet, ParamBinding,
    ParamShape, match_arguments, next_params,
};
pub use scope::{ScopeResult, local_decls, lookup_type, lookup_unqualified};
pub use type_resolver::TypeResolver;

#[cfg(test)]
#[path = "../../tests/resolve/t_collect.rs"]
mod tests;
