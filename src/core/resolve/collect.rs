//! Declaration collection.
//!
//! Walks a parsed module once to create every declaration, then resolves
//! the written types in dependency order: extensions are bound to their
//! nominals, typealiases and associated types are resolved, inheritance
//! clauses and `where` clauses are recorded, and finally signatures and
//! implicit initializers are filled in. Each pass reads the module through
//! a fresh `ModuleSet` and writes its results back afterwards.

use crate::core::diag::Span;
use crate::core::resolve::decl::*;
use crate::core::resolve::errors::{ResolveError, ResolveErrorKind};
use crate::core::resolve::modules::{LoadedModule, ModuleSet};
use crate::core::resolve::scope::lookup_type;
use crate::core::resolve::type_resolver::TypeResolver;
use crate::core::tree::*;
use crate::core::types::{TupleElem, Type};

#[derive(Clone, Copy)]
enum Source<'f> {
    Func(&'f FuncDecl),
    Init(&'f InitDecl),
    Subscript(&'f SubscriptDecl),
    Var { var: &'f VarDecl, simple: bool },
    Nominal(&'f NominalDecl),
    Protocol(&'f NominalDecl),
    EnumElement(&'f EnumElementDecl),
    Extension(&'f ExtensionDecl),
    TypeAlias(&'f TypeAliasDecl),
    AssocType(&'f AssocTypeDecl),
    GenericParam(&'f GenericParamDecl),
}

struct Collector<'d, 'f> {
    deps: &'d [&'d LoadedModule],
    module: LoadedModule,
    sources: Vec<(DeclId, Source<'f>)>,
    errors: Vec<ResolveError>,
}

/// Collects the declarations of `file` into a new module. `deps` are the
/// modules already loaded; their ids must be `0..deps.len()` and `id` must
/// be `deps.len()`.
pub fn collect_module(
    deps: &[&LoadedModule],
    id: ModuleId,
    name: &str,
    file: &SourceFile,
) -> (LoadedModule, Vec<ResolveError>) {
    let mut collector = Collector {
        deps,
        module: LoadedModule::new(id, name),
        sources: Vec::new(),
        errors: Vec::new(),
    };
    for item in &file.items {
        let ids = collector.declare_item(item, None);
        collector.module.top_level.extend(ids);
    }
    collector.bind_extensions();
    collector.resolve_aliases();
    collector.resolve_inheritance();
    collector.resolve_where_clauses();
    collector.resolve_signatures();
    collector.synthesize_inits();
    collector.check_redeclarations();
    tracing::debug!(
        target: "pipeline",
        stage = "collect",
        module = name,
        decls = collector.module.decls.len(),
        errors = collector.errors.len()
    );
    (collector.module, collector.errors)
}

fn builtin_name(item: &Item) -> Option<String> {
    let attr = item.attr("builtin")?;
    let arg = attr.args.first()?;
    Some(arg.trim_matches('"').to_string())
}

fn availability(item: &Item, what: &str) -> bool {
    item.attrs.iter().any(|attr| {
        attr.name == what || (attr.name == "available" && attr.args.iter().any(|arg| arg == what))
    })
}

pub fn binding_names(pattern: &Pattern, out: &mut Vec<(String, NodeId)>) {
    match &pattern.kind {
        PatternKind::Binding { name, .. } => out.push((name.clone(), pattern.id)),
        PatternKind::Tuple(elems) => {
            for elem in elems {
                binding_names(elem, out);
            }
        }
        PatternKind::OptionalSome(inner) => binding_names(inner, out),
        _ => {}
    }
}

fn path_text(texpr: &TypeExpr) -> String {
    match &texpr.kind {
        TypeExprKind::Path(segments) => segments
            .iter()
            .map(|segment| segment.name.as_str())
            .collect::<Vec<_>>()
            .join("."),
        _ => "<type>".to_string(),
    }
}

/// Items declared inside a function body, not counting nested functions'
/// own bodies.
fn local_items<'f>(stmts: &'f [Stmt], out: &mut Vec<&'f Item>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Item(item) => out.push(item),
            StmtKind::If {
                then_block,
                else_branch,
                ..
            } => {
                local_items(&then_block.stmts, out);
                if let Some(else_branch) = else_branch {
                    local_items(std::slice::from_ref(&**else_branch), out);
                }
            }
            StmtKind::Guard { else_block: block, .. }
            | StmtKind::While { body: block, .. }
            | StmtKind::ForIn { body: block, .. }
            | StmtKind::Defer(block)
            | StmtKind::Block(block) => local_items(&block.stmts, out),
            StmtKind::Switch { cases, .. } => {
                for case in cases {
                    local_items(&case.body, out);
                }
            }
            StmtKind::Do { body, catches } => {
                local_items(&body.stmts, out);
                for catch in catches {
                    local_items(&catch.body.stmts, out);
                }
            }
            _ => {}
        }
    }
}

impl<'d, 'f> Collector<'d, 'f> {
    fn view(&self) -> ModuleSet<'_> {
        let mut modules: Vec<&LoadedModule> = self.deps.to_vec();
        modules.push(&self.module);
        ModuleSet::new(modules)
    }

    fn push(
        &mut self,
        name: impl Into<String>,
        kind: DeclKind,
        parent: Option<DeclId>,
        node: Option<NodeId>,
        span: Span,
    ) -> DeclId {
        let id = self.module.next_decl_id();
        self.module.push_decl(Decl {
            id,
            name: name.into(),
            kind,
            parent,
            generics: GenericSignature::default(),
            attrs: DeclAttrs::default(),
            is_static: false,
            mutating: false,
            is_override: false,
            is_implicit: false,
            node,
            span,
        })
    }

    fn apply_item_attrs(&mut self, id: DeclId, item: &Item) {
        let decl = self.module.decl_mut(id);
        decl.is_static = item.modifiers.is_static;
        decl.mutating = item.modifiers.mutating;
        decl.is_override = item.modifiers.is_override;
        decl.attrs = DeclAttrs {
            deprecated: availability(item, "deprecated"),
            unavailable: availability(item, "unavailable"),
            builtin: builtin_name(item),
        };
    }

    fn declare_generics(&mut self, owner: DeclId, generics: &'f [GenericParamDecl]) {
        let mut params = Vec::with_capacity(generics.len());
        for (index, param) in generics.iter().enumerate() {
            let kind = DeclKind::GenericParam {
                index: index as u32,
                bounds: Vec::new(),
                superclass: None,
            };
            let id = self.push(&param.name, kind, Some(owner), Some(param.id), param.span);
            self.sources.push((id, Source::GenericParam(param)));
            params.push(id);
        }
        self.module.decl_mut(owner).generics.params = params;
    }

    fn declare_locals(&mut self, body: &'f Block, func: DeclId) {
        let mut items = Vec::new();
        local_items(&body.stmts, &mut items);
        for item in items {
            // Local variables are bound by the type checker.
            if !matches!(item.kind, ItemKind::Var(_)) {
                self.declare_item(item, Some(func));
            }
        }
    }

    fn declare_accessor(
        &mut self,
        kind: AccessorKind,
        storage: DeclId,
        node: Option<NodeId>,
        span: Span,
        in_class: bool,
    ) -> DeclId {
        let name = self.module.decl(storage).name.clone();
        let is_static = self.module.decl(storage).is_static;
        let id = self.push(
            name,
            DeclKind::Accessor { kind, storage },
            Some(storage),
            node,
            span,
        );
        let decl = self.module.decl_mut(id);
        decl.is_static = is_static;
        decl.mutating = kind != AccessorKind::Get && !in_class && !is_static;
        decl.is_implicit = node.is_none();
        id
    }

    fn parent_is_class(&self, parent: Option<DeclId>) -> bool {
        let Some(parent) = parent else {
            return false;
        };
        match &self.module.decl(parent).kind {
            DeclKind::Class(_) => true,
            DeclKind::Extension(info) => info
                .extended
                .is_some_and(|ext| ext.module == self.module.id && self.module.decl(ext).is_class()),
            _ => false,
        }
    }

    fn declare_item(&mut self, item: &'f Item, parent: Option<DeclId>) -> Vec<DeclId> {
        let span = item.span;
        match &item.kind {
            ItemKind::Func(func) => {
                let id = self.push(
                    &func.name,
                    DeclKind::Func(FuncSig::empty()),
                    parent,
                    Some(item.id),
                    span,
                );
                self.apply_item_attrs(id, item);
                self.declare_generics(id, &func.generics);
                self.sources.push((id, Source::Func(func)));
                if let Some(body) = &func.body {
                    self.declare_locals(body, id);
                }
                vec![id]
            }
            ItemKind::Init(init) => {
                let kind = DeclKind::Constructor {
                    sig: FuncSig::empty(),
                    failable: init.failable,
                };
                let id = self.push("init", kind, parent, Some(item.id), span);
                self.apply_item_attrs(id, item);
                self.declare_generics(id, &init.generics);
                self.sources.push((id, Source::Init(init)));
                if let Some(body) = &init.body {
                    self.declare_locals(body, id);
                }
                vec![id]
            }
            ItemKind::Subscript(sub) => {
                let settable = match &sub.accessors {
                    Accessors::Computed { set, .. } => set.is_some(),
                    Accessors::Requirement { settable } => *settable,
                    _ => false,
                };
                let kind = DeclKind::Subscript {
                    sig: FuncSig::empty(),
                    settable,
                };
                let id = self.push("subscript", kind, parent, Some(item.id), span);
                self.apply_item_attrs(id, item);
                self.sources.push((id, Source::Subscript(sub)));
                let in_class = self.parent_is_class(parent);
                if let Accessors::Computed { get, set } = &sub.accessors {
                    self.declare_accessor(AccessorKind::Get, id, Some(get.id), get.span, in_class);
                    if let Some(set) = set {
                        let body = &set.body;
                        self.declare_accessor(AccessorKind::Set, id, Some(body.id), body.span, in_class);
                    }
                }
                vec![id]
            }
            ItemKind::Var(var) => self.declare_var(item, var, parent),
            ItemKind::Struct(nominal) | ItemKind::Class(nominal) | ItemKind::Enum(nominal) => {
                let info = NominalInfo {
                    indirect: item.modifiers.indirect,
                    ..NominalInfo::default()
                };
                let kind = match &item.kind {
                    ItemKind::Struct(_) => DeclKind::Struct(info),
                    ItemKind::Class(_) => DeclKind::Class(info),
                    _ => DeclKind::Enum(info),
                };
                let id = self.push(&nominal.name, kind, parent, Some(item.id), span);
                self.apply_item_attrs(id, item);
                self.declare_generics(id, &nominal.generics);
                self.sources.push((id, Source::Nominal(nominal)));
                self.declare_members(id, &nominal.members);
                vec![id]
            }
            ItemKind::Protocol(proto) => {
                let id = self.module.next_decl_id();
                let self_param = DeclId::new(self.module.id, id.index as usize + 1);
                let info = ProtocolInfo {
                    members: Vec::new(),
                    inherited: Vec::new(),
                    self_param,
                    assoc_types: Vec::new(),
                    class_bound: false,
                };
                self.push(&proto.name, DeclKind::Protocol(info), parent, Some(item.id), span);
                self.apply_item_attrs(id, item);
                let kind = DeclKind::GenericParam {
                    index: 0,
                    bounds: vec![id],
                    superclass: None,
                };
                self.push("Self", kind, Some(id), None, span);
                self.module.decl_mut(self_param).is_implicit = true;
                self.sources.push((id, Source::Protocol(proto)));
                self.declare_members(id, &proto.members);
                vec![id]
            }
            ItemKind::EnumCase(case) => {
                let mut ids = Vec::new();
                for element in &case.elements {
                    let kind = DeclKind::EnumElement {
                        payload: None,
                        index: 0,
                    };
                    let id = self.push(&element.name, kind, parent, Some(element.id), element.span);
                    self.apply_item_attrs(id, item);
                    self.sources.push((id, Source::EnumElement(element)));
                    ids.push(id);
                }
                ids
            }
            ItemKind::Extension(ext) => {
                let id = self.push(
                    path_text(&ext.extended),
                    DeclKind::Extension(ExtensionInfo::default()),
                    parent,
                    Some(item.id),
                    span,
                );
                self.sources.push((id, Source::Extension(ext)));
                self.declare_members(id, &ext.members);
                vec![id]
            }
            ItemKind::TypeAlias(alias) => {
                let kind = DeclKind::TypeAlias { ty: Type::Error };
                let id = self.push(&alias.name, kind, parent, Some(item.id), span);
                self.apply_item_attrs(id, item);
                self.declare_generics(id, &alias.generics);
                self.sources.push((id, Source::TypeAlias(alias)));
                vec![id]
            }
            ItemKind::AssociatedType(assoc) => {
                let kind = DeclKind::AssociatedType {
                    bounds: Vec::new(),
                    default: None,
                };
                let id = self.push(&assoc.name, kind, parent, Some(item.id), span);
                self.sources.push((id, Source::AssocType(assoc)));
                vec![id]
            }
            ItemKind::Import(_) | ItemKind::Stmt(_) | ItemKind::Error => Vec::new(),
        }
    }

    fn declare_var(&mut self, item: &'f Item, var: &'f VarDecl, parent: Option<DeclId>) -> Vec<DeclId> {
        let simple = var.simple_name().is_some();
        let storage = match &var.accessors {
            Accessors::Stored => Storage::Stored,
            Accessors::Computed { set, .. } => Storage::Computed {
                settable: set.is_some(),
            },
            Accessors::Observed { .. } => Storage::Observed,
            Accessors::Requirement { settable } => Storage::Requirement {
                settable: *settable,
            },
        };
        let in_class = self.parent_is_class(parent);
        let mut names = Vec::new();
        binding_names(&var.pattern, &mut names);
        let mut ids = Vec::new();
        for (name, node) in names {
            let info = VarInfo {
                ty: Type::Error,
                is_let: var.is_let,
                storage,
                has_initial_value: var.init.is_some(),
                accessors: Vec::new(),
            };
            let node = if simple { item.id } else { node };
            let id = self.push(name, DeclKind::Var(info), parent, Some(node), item.span);
            self.apply_item_attrs(id, item);
            self.sources.push((id, Source::Var { var, simple }));

            let mut accessors = Vec::new();
            match &var.accessors {
                Accessors::Computed { get, set } => {
                    accessors.push(self.declare_accessor(
                        AccessorKind::Get,
                        id,
                        Some(get.id),
                        get.span,
                        in_class,
                    ));
                    if let Some(set) = set {
                        let body = &set.body;
                        accessors.push(self.declare_accessor(
                            AccessorKind::Set,
                            id,
                            Some(body.id),
                            body.span,
                            in_class,
                        ));
                    }
                }
                Accessors::Observed { will_set, did_set } => {
                    for (kind, body) in [
                        (AccessorKind::WillSet, will_set),
                        (AccessorKind::DidSet, did_set),
                    ] {
                        if let Some(body) = body {
                            let block = &body.body;
                            accessors.push(self.declare_accessor(
                                kind,
                                id,
                                Some(block.id),
                                block.span,
                                in_class,
                            ));
                        }
                    }
                }
                Accessors::Stored | Accessors::Requirement { .. } => {}
            }
            if let DeclKind::Var(info) = &mut self.module.decl_mut(id).kind {
                info.accessors = accessors;
            }
            ids.push(id);
        }
        if !simple {
            if let Some(first) = ids.first() {
                self.module.node_decls.entry(item.id).or_insert(*first);
            }
        }
        ids
    }

    fn declare_members(&mut self, owner: DeclId, members: &'f [Item]) {
        let mut ids = Vec::new();
        for member in members {
            ids.extend(self.declare_item(member, Some(owner)));
        }
        let mut stored = Vec::new();
        let mut elements = Vec::new();
        let mut assoc_types = Vec::new();
        for id in &ids {
            let decl = self.module.decl(*id);
            match &decl.kind {
                DeclKind::Var(info)
                    if !decl.is_static && matches!(info.storage, Storage::Stored | Storage::Observed) =>
                {
                    stored.push(*id)
                }
                DeclKind::EnumElement { .. } => elements.push(*id),
                DeclKind::AssociatedType { .. } => assoc_types.push(*id),
                _ => {}
            }
        }
        for (index, element) in elements.iter().enumerate() {
            if let DeclKind::EnumElement { index: slot, .. } = &mut self.module.decl_mut(*element).kind {
                *slot = index as u32;
            }
        }
        match &mut self.module.decl_mut(owner).kind {
            DeclKind::Struct(info) | DeclKind::Class(info) | DeclKind::Enum(info) => {
                info.members = ids;
                info.stored = stored;
                info.elements = elements;
            }
            DeclKind::Protocol(info) => {
                info.members = ids;
                info.assoc_types = assoc_types;
            }
            DeclKind::Extension(info) => info.members = ids,
            _ => {}
        }
    }

    // -- Pass: extensions --

    fn extended_decl(set: &ModuleSet<'_>, context: Option<DeclId>, texpr: &TypeExpr) -> Option<DeclId> {
        if let TypeExprKind::Path(segments) = &texpr.kind {
            if segments.iter().all(|segment| segment.args.is_empty()) {
                let (first, rest) = segments.split_first()?;
                let mut decl = lookup_type(set, context, &first.name)?;
                for segment in rest {
                    decl = set
                        .all_members(decl)
                        .into_iter()
                        .find(|m| set.decl(*m).name == segment.name && set.decl(*m).is_type_decl())?;
                }
                return match &set.decl(decl).kind {
                    DeclKind::TypeAlias { ty } => match ty {
                        Type::Existential(protos) if protos.len() == 1 => protos.first().copied(),
                        ty => set.nominal_decl_of(ty),
                    },
                    _ if set.decl(decl).is_nominal() || set.decl(decl).is_protocol() => Some(decl),
                    _ => None,
                };
            }
        }
        let ty = TypeResolver::new(set, context).resolve(texpr).ok()?;
        set.nominal_decl_of(&ty)
    }

    fn bind_extensions(&mut self) {
        // Extensions of types declared in other extensions need a second round.
        for _ in 0..2 {
            let mut bound = Vec::new();
            {
                let set = self.view();
                for (id, source) in &self.sources {
                    let Source::Extension(ext) = source else {
                        continue;
                    };
                    let decl = set.decl(*id);
                    if matches!(&decl.kind, DeclKind::Extension(info) if info.extended.is_some()) {
                        continue;
                    }
                    if let Some(target) = Self::extended_decl(&set, decl.parent, &ext.extended) {
                        bound.push((*id, target));
                    }
                }
            }
            for (id, target) in bound {
                if let DeclKind::Extension(info) = &mut self.module.decl_mut(id).kind {
                    info.extended = Some(target);
                }
            }
        }

        let set = self.view();
        let mut errors = Vec::new();
        for (id, source) in &self.sources {
            let Source::Extension(ext) = source else {
                continue;
            };
            let decl = set.decl(*id);
            if matches!(&decl.kind, DeclKind::Extension(info) if info.extended.is_none()) {
                let name = path_text(&ext.extended);
                let first = name.split('.').next().unwrap_or_default();
                let kind = if lookup_type(&set, decl.parent, first).is_none() {
                    ResolveErrorKind::UnknownType(name)
                } else {
                    ResolveErrorKind::InvalidExtension(name)
                };
                errors.push(ResolveError::new(kind, ext.extended.span));
            }
        }
        drop(set);
        self.errors.extend(errors);
    }

    // -- Pass: typealiases and associated types --

    fn resolve_aliases(&mut self) {
        let mut pending = self
            .sources
            .iter()
            .enumerate()
            .filter(|(_, (_, source))| matches!(source, Source::TypeAlias(_) | Source::AssocType(_)))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        // Aliases may refer to aliases declared later.
        const ROUNDS: usize = 3;
        for round in 0..ROUNDS {
            let last = round + 1 == ROUNDS;
            let mut updates = Vec::new();
            let mut retry = Vec::new();
            let mut errors = Vec::new();
            {
                let set = self.view();
                for &index in &pending {
                    let (id, source) = self.sources[index];
                    let resolver = TypeResolver::new(&set, Some(id));
                    let result = match source {
                        Source::TypeAlias(alias) => resolver
                            .resolve(&alias.ty)
                            .map(|ty| DeclKind::TypeAlias { ty }),
                        Source::AssocType(assoc) => {
                            Self::resolve_assoc(&resolver, assoc).map(|(bounds, default)| {
                                DeclKind::AssociatedType { bounds, default }
                            })
                        }
                        _ => continue,
                    };
                    match result {
                        Ok(kind) => updates.push((id, kind)),
                        Err(err) if last => errors.push(err),
                        Err(_) => retry.push(index),
                    }
                }
            }
            for (id, kind) in updates {
                self.module.decl_mut(id).kind = kind;
            }
            self.errors.extend(errors);
            pending = retry;
            if pending.is_empty() {
                break;
            }
        }
    }

    fn resolve_assoc(
        resolver: &TypeResolver<'_, '_>,
        assoc: &AssocTypeDecl,
    ) -> Result<(Vec<DeclId>, Option<Type>), ResolveError> {
        let mut bounds = Vec::new();
        for bound in &assoc.bounds {
            if let Some(proto) = resolver.resolve_protocol(bound)? {
                bounds.push(proto);
            }
        }
        let default = match &assoc.default {
            Some(default) => Some(resolver.resolve(default)?),
            None => None,
        };
        Ok((bounds, default))
    }

    // -- Pass: inheritance clauses and inline generic bounds --

    fn resolve_inheritance(&mut self) {
        let mut updates = Vec::new();
        let mut errors = Vec::new();
        {
            let set = self.view();
            for (id, source) in &self.sources {
                let decl = set.decl(*id);
                let mut kind = decl.kind.clone();
                match (source, &mut kind) {
                    (
                        Source::Nominal(nominal),
                        DeclKind::Struct(info) | DeclKind::Class(info) | DeclKind::Enum(info),
                    ) => {
                        let resolver = TypeResolver::new(&set, Some(*id));
                        for texpr in &nominal.inherits {
                            let ty = match resolver.resolve(texpr) {
                                Ok(ty) => ty,
                                Err(err) => {
                                    errors.push(err);
                                    continue;
                                }
                            };
                            match &ty {
                                Type::Existential(protos) => info.protocols.extend(protos.iter().copied()),
                                Type::Nominal { decl: base, .. } if set.decl(*base).is_class() => {
                                    if !decl.is_class() {
                                        errors.push(ResolveError::new(
                                            ResolveErrorKind::InvalidSuperclass(
                                                decl.name.clone(),
                                                set.decl(*base).name.clone(),
                                            ),
                                            texpr.span,
                                        ));
                                    } else if info.superclass.is_some() {
                                        errors.push(ResolveError::new(
                                            ResolveErrorKind::MultipleSuperclasses(decl.name.clone()),
                                            texpr.span,
                                        ));
                                    } else {
                                        info.superclass = Some(ty.clone());
                                    }
                                }
                                // Raw types of enums and `AnyObject` carry no conformance.
                                _ => {}
                            }
                            info.inherits.push(ty);
                        }
                    }
                    (Source::Protocol(proto), DeclKind::Protocol(info)) => {
                        let resolver = TypeResolver::new(&set, Some(*id));
                        for texpr in &proto.inherits {
                            match resolver.resolve(texpr) {
                                Ok(Type::Existential(protos)) => info.inherited.extend(protos),
                                Ok(Type::AnyObject) => info.class_bound = true,
                                Ok(Type::Error) => {}
                                Ok(_) => errors.push(ResolveError::new(
                                    ResolveErrorKind::NotAProtocol(path_text(texpr)),
                                    texpr.span,
                                )),
                                Err(err) => errors.push(err),
                            }
                        }
                    }
                    (Source::Extension(ext), DeclKind::Extension(info)) => {
                        if info.extended.is_none() {
                            continue;
                        }
                        let resolver = TypeResolver::new(&set, Some(*id));
                        for texpr in &ext.inherits {
                            match resolver.resolve_protocol(texpr) {
                                Ok(Some(proto)) => info.protocols.push(proto),
                                Ok(None) => {}
                                Err(err) => errors.push(err),
                            }
                        }
                    }
                    (
                        Source::GenericParam(param),
                        DeclKind::GenericParam {
                            bounds, superclass, ..
                        },
                    ) => {
                        let resolver = TypeResolver::new(&set, decl.parent);
                        for texpr in &param.bounds {
                            match resolver.resolve(texpr) {
                                Ok(Type::Existential(protos)) => bounds.extend(protos),
                                Ok(ty @ Type::Nominal { .. }) if set.is_class_type(&ty) => {
                                    *superclass = Some(ty)
                                }
                                Ok(_) => {}
                                Err(err) => errors.push(err),
                            }
                        }
                    }
                    _ => continue,
                }
                updates.push((*id, kind));
            }
        }
        for (id, kind) in updates {
            self.module.decl_mut(id).kind = kind;
        }
        self.errors.extend(errors);
    }

    // -- Pass: where clauses --

    fn resolve_where_clauses(&mut self) {
        for index in 0..self.sources.len() {
            let (id, source) = self.sources[index];
            let clause: &[WhereRequirement] = match source {
                Source::Func(func) => &func.where_clause,
                Source::Init(init) => &init.where_clause,
                Source::Nominal(nominal) | Source::Protocol(nominal) => &nominal.where_clause,
                Source::Extension(ext) => &ext.where_clause,
                Source::AssocType(assoc) => &assoc.where_clause,
                _ => continue,
            };
            if clause.is_empty() {
                continue;
            }
            let mut requirements = Vec::new();
            let mut param_updates = Vec::new();
            let mut errors = Vec::new();
            let target = {
                let set = self.view();
                let target = match source {
                    // Requirements on associated types belong to the protocol.
                    Source::AssocType(_) => set.decl(id).parent.unwrap_or(id),
                    _ => id,
                };
                let resolver = TypeResolver::new(&set, Some(id));
                for req in clause {
                    match req {
                        WhereRequirement::Conformance { subject, bounds } => {
                            let subject_ty = match resolver.resolve(subject) {
                                Ok(ty) => ty,
                                Err(err) => {
                                    errors.push(err);
                                    continue;
                                }
                            };
                            for bound in bounds {
                                match resolver.resolve(bound) {
                                    Ok(Type::Existential(protos)) => {
                                        for protocol in protos {
                                            requirements.push(Requirement::Conformance {
                                                subject: subject_ty.clone(),
                                                protocol,
                                            });
                                            if let Type::GenericParam(param) = subject_ty {
                                                param_updates.push((param, Some(protocol), None));
                                            }
                                        }
                                    }
                                    Ok(class @ Type::Nominal { .. }) if set.is_class_type(&class) => {
                                        requirements.push(Requirement::Superclass {
                                            subject: subject_ty.clone(),
                                            class: class.clone(),
                                        });
                                        if let Type::GenericParam(param) = subject_ty {
                                            param_updates.push((param, None, Some(class)));
                                        }
                                    }
                                    Ok(_) => {}
                                    Err(err) => errors.push(err),
                                }
                            }
                        }
                        WhereRequirement::SameType { lhs, rhs } => {
                            match (resolver.resolve(lhs), resolver.resolve(rhs)) {
                                (Ok(lhs), Ok(rhs)) => requirements.push(Requirement::SameType { lhs, rhs }),
                                (Err(err), _) | (_, Err(err)) => errors.push(err),
                            }
                        }
                    }
                }
                // Only parameters owned by the constrained declaration take
                // the bound; constrained extensions keep theirs local.
                param_updates.retain(|(param, _, _)| set.decl(*param).parent == Some(target));
                target
            };
            self.module
                .decl_mut(target)
                .generics
                .requirements
                .extend(requirements);
            for (param, protocol, class) in param_updates {
                if let DeclKind::GenericParam {
                    bounds, superclass, ..
                } = &mut self.module.decl_mut(param).kind
                {
                    if let Some(protocol) = protocol {
                        if !bounds.contains(&protocol) {
                            bounds.push(protocol);
                        }
                    }
                    if class.is_some() {
                        *superclass = class;
                    }
                }
            }
            self.errors.extend(errors);
        }
    }

    // -- Pass: signatures --

    fn resolve_params(
        resolver: &TypeResolver<'_, '_>,
        params: &[Param],
        operator: bool,
        errors: &mut Vec<ResolveError>,
    ) -> Vec<ParamDecl> {
        let mut out = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate() {
            let ty = resolver.resolve(&param.ty).unwrap_or_else(|err| {
                errors.push(err);
                Type::Error
            });
            if param.variadic
                && params[index + 1..]
                    .first()
                    .is_some_and(|next| next.label.is_none())
            {
                errors.push(ResolveError::new(
                    ResolveErrorKind::VariadicNotLast(param.name.clone()),
                    param.span,
                ));
            }
            out.push(ParamDecl {
                label: if operator { None } else { param.label.clone() },
                name: param.name.clone(),
                ty,
                has_default: param.default.is_some(),
                variadic: param.variadic,
                inout: param.inout,
                autoclosure: param.autoclosure,
                escaping: param.escaping,
            });
        }
        out
    }

    fn resolve_signatures(&mut self) {
        let mut updates = Vec::new();
        let mut errors = Vec::new();
        {
            let set = self.view();
            for (id, source) in &self.sources {
                let decl = set.decl(*id);
                let resolver = TypeResolver::new(&set, Some(*id));
                let mut resolve_or_error = |texpr: &TypeExpr| {
                    resolver.resolve(texpr).unwrap_or_else(|err| {
                        errors.push(err);
                        Type::Error
                    })
                };
                let kind = match (source, &decl.kind) {
                    (Source::Func(func), DeclKind::Func(_)) => {
                        let result = func.result.as_ref().map(&mut resolve_or_error).unwrap_or_else(Type::void);
                        let params =
                            Self::resolve_params(&resolver, &func.params, is_operator_name(&func.name), &mut errors);
                        DeclKind::Func(FuncSig {
                            params,
                            result,
                            throws: func.throws,
                        })
                    }
                    (Source::Init(init), DeclKind::Constructor { failable, .. }) => DeclKind::Constructor {
                        sig: FuncSig {
                            params: Self::resolve_params(&resolver, &init.params, false, &mut errors),
                            result: Type::void(),
                            throws: init.throws,
                        },
                        failable: *failable,
                    },
                    (Source::Subscript(sub), DeclKind::Subscript { settable, .. }) => {
                        let result = resolve_or_error(&sub.result);
                        DeclKind::Subscript {
                            sig: FuncSig {
                                params: Self::resolve_params(&resolver, &sub.params, false, &mut errors),
                                result,
                                throws: false,
                            },
                            settable: *settable,
                        }
                    }
                    (Source::Var { var, simple }, DeclKind::Var(info)) => {
                        let ty = match (&var.ty, simple) {
                            (Some(texpr), true) => {
                                // Members resolve in their type's scope.
                                let resolver = TypeResolver::new(&set, decl.parent);
                                resolver.resolve(texpr).unwrap_or_else(|err| {
                                    errors.push(err);
                                    Type::Error
                                })
                            }
                            _ => Type::Error,
                        };
                        DeclKind::Var(VarInfo {
                            ty,
                            ..info.clone()
                        })
                    }
                    (Source::EnumElement(element), DeclKind::EnumElement { index, .. }) => {
                        let resolver = TypeResolver::new(&set, decl.parent);
                        let payload = element.payload.as_ref().map(|elems| {
                            elems
                                .iter()
                                .map(|elem| TupleElem {
                                    label: elem.label.clone(),
                                    ty: resolver.resolve(&elem.ty).unwrap_or_else(|err| {
                                        errors.push(err);
                                        Type::Error
                                    }),
                                })
                                .collect()
                        });
                        DeclKind::EnumElement {
                            payload,
                            index: *index,
                        }
                    }
                    _ => continue,
                };
                updates.push((*id, kind));
            }
        }
        for (id, kind) in updates {
            self.module.decl_mut(id).kind = kind;
        }
        self.errors.extend(errors);
    }

    // -- Pass: implicit initializers --

    fn synthesize_inits(&mut self) {
        let nominals = self
            .module
            .decls
            .iter()
            .filter(|decl| matches!(decl.kind, DeclKind::Struct(_) | DeclKind::Class(_)))
            .map(|decl| decl.id)
            .collect::<Vec<_>>();
        for nominal in nominals {
            let decl = self.module.decl(nominal);
            let Some(info) = decl.nominal_info() else {
                continue;
            };
            let declares_init = info
                .members
                .iter()
                .any(|m| matches!(self.module.decl(*m).kind, DeclKind::Constructor { .. }));
            if declares_init {
                continue;
            }
            let stored = info
                .stored
                .iter()
                .map(|id| self.module.decl(*id))
                .filter_map(|var| var.var_info().map(|info| (var, info)))
                .collect::<Vec<_>>();
            let all_initialized = stored.iter().all(|(_, info)| info.has_initial_value);
            let span = decl.span;
            let mut inits = Vec::new();
            if decl.is_class() {
                if all_initialized {
                    inits.push(Vec::new());
                }
            } else {
                let memberwise = stored
                    .iter()
                    .filter(|(_, info)| !(info.is_let && info.has_initial_value))
                    .map(|(var, info)| ParamDecl {
                        label: Some(var.name.clone()),
                        name: var.name.clone(),
                        ty: info.ty.clone(),
                        has_default: info.has_initial_value,
                        variadic: false,
                        inout: false,
                        autoclosure: false,
                        escaping: false,
                    })
                    .collect::<Vec<_>>();
                if all_initialized && !memberwise.is_empty() {
                    inits.push(Vec::new());
                }
                inits.push(memberwise);
            }
            let mut ids = Vec::new();
            for params in inits {
                let kind = DeclKind::Constructor {
                    sig: FuncSig {
                        params,
                        result: Type::void(),
                        throws: false,
                    },
                    failable: false,
                };
                let id = self.push("init", kind, Some(nominal), None, span);
                self.module.decl_mut(id).is_implicit = true;
                ids.push(id);
            }
            if let Some(info) = self.module.decl_mut(nominal).nominal_info_mut() {
                info.members.extend(ids);
            }
        }
    }

    fn check_redeclarations(&mut self) {
        let mut errors = Vec::new();
        let mut seen: Vec<(Option<DeclId>, &str)> = Vec::new();
        for decl in &self.module.decls {
            if !decl.is_type_decl() || matches!(decl.kind, DeclKind::GenericParam { .. }) {
                continue;
            }
            let key = (decl.parent, decl.name.as_str());
            if seen.contains(&key) {
                errors.push(ResolveError::new(
                    ResolveErrorKind::Redeclaration(decl.name.clone()),
                    decl.span,
                ));
            } else {
                seen.push(key);
            }
        }
        self.errors.extend(errors);
    }
}
