//! Loaded modules and the read-only view stages query them through.

use std::collections::HashMap;

use crate::core::conformance::{Conformance, ConformanceId};
use crate::core::resolve::decl::*;
use crate::core::tree::NodeId;
use crate::core::types::{DeclNames, Substitution, Type};

pub const PRELUDE_MODULE: &str = "Swift";

/// A module after declaration collection and conformance building.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub id: ModuleId,
    pub name: String,
    pub decls: Vec<Decl>,
    /// Non-member, non-local declarations in source order.
    pub top_level: Vec<DeclId>,
    pub node_decls: HashMap<NodeId, DeclId>,
    pub conformances: Vec<Conformance>,
    pub conformance_index: HashMap<(DeclId, DeclId), ConformanceId>,
}

impl LoadedModule {
    pub fn new(id: ModuleId, name: impl Into<String>) -> Self {
        LoadedModule {
            id,
            name: name.into(),
            decls: Vec::new(),
            top_level: Vec::new(),
            node_decls: HashMap::new(),
            conformances: Vec::new(),
            conformance_index: HashMap::new(),
        }
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index as usize]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index as usize]
    }

    pub fn next_decl_id(&self) -> DeclId {
        DeclId::new(self.id, self.decls.len())
    }

    pub fn push_decl(&mut self, decl: Decl) -> DeclId {
        let id = decl.id;
        if let Some(node) = decl.node {
            self.node_decls.entry(node).or_insert(id);
        }
        self.decls.push(decl);
        id
    }

    pub fn decl_for_node(&self, node: NodeId) -> Option<DeclId> {
        self.node_decls.get(&node).copied()
    }

    pub fn conformance(&self, id: ConformanceId) -> &Conformance {
        &self.conformances[id.index as usize]
    }
}

/// Prelude declarations the compiler refers to by name.
#[derive(Debug, Clone, Default)]
pub struct KnownDecls {
    pub int: Option<DeclId>,
    pub double: Option<DeclId>,
    pub bool: Option<DeclId>,
    pub string: Option<DeclId>,
    pub optional: Option<DeclId>,
    pub error: Option<DeclId>,
    pub integer_literal: Option<DeclId>,
    pub float_literal: Option<DeclId>,
    pub string_literal: Option<DeclId>,
    pub boolean_literal: Option<DeclId>,
    pub nil_literal: Option<DeclId>,
    pub integer_literal_type: Option<DeclId>,
    pub float_literal_type: Option<DeclId>,
    pub string_literal_type: Option<DeclId>,
    pub boolean_literal_type: Option<DeclId>,
}

impl KnownDecls {
    fn from_prelude(module: &LoadedModule) -> Self {
        let find = |name: &str| {
            module
                .top_level
                .iter()
                .copied()
                .find(|id| module.decl(*id).name == name)
        };
        KnownDecls {
            int: find("Int"),
            double: find("Double"),
            bool: find("Bool"),
            string: find("String"),
            optional: find("Optional"),
            error: find("Error"),
            integer_literal: find("ExpressibleByIntegerLiteral"),
            float_literal: find("ExpressibleByFloatLiteral"),
            string_literal: find("ExpressibleByStringLiteral"),
            boolean_literal: find("ExpressibleByBooleanLiteral"),
            nil_literal: find("ExpressibleByNilLiteral"),
            integer_literal_type: find("IntegerLiteralType"),
            float_literal_type: find("FloatLiteralType"),
            string_literal_type: find("StringLiteralType"),
            boolean_literal_type: find("BooleanLiteralType"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Integer,
    Float,
    String,
    Boolean,
    Nil,
}

/// Read-only view over every module visible to the module being compiled.
/// Module `i` of the view has `ModuleId(i)`; the last one is current.
pub struct ModuleSet<'a> {
    modules: Vec<&'a LoadedModule>,
    known: KnownDecls,
    extensions: HashMap<DeclId, Vec<DeclId>>,
}

impl<'a> ModuleSet<'a> {
    pub fn new(modules: Vec<&'a LoadedModule>) -> Self {
        let known = modules
            .iter()
            .find(|module| module.name == PRELUDE_MODULE)
            .map(|module| KnownDecls::from_prelude(module))
            .unwrap_or_default();
        let mut extensions: HashMap<DeclId, Vec<DeclId>> = HashMap::new();
        for module in &modules {
            for decl in &module.decls {
                if let DeclKind::Extension(ExtensionInfo {
                    extended: Some(extended),
                    ..
                }) = &decl.kind
                {
                    extensions.entry(*extended).or_default().push(decl.id);
                }
            }
        }
        ModuleSet {
            modules,
            known,
            extensions,
        }
    }

    pub fn modules(&self) -> &[&'a LoadedModule] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> &'a LoadedModule {
        self.modules[id.index()]
    }

    pub fn current(&self) -> ModuleId {
        ModuleId(self.modules.len().saturating_sub(1) as u32)
    }

    pub fn decl(&self, id: DeclId) -> &'a Decl {
        self.modules[id.module.index()].decl(id)
    }

    pub fn known(&self) -> &KnownDecls {
        &self.known
    }

    pub fn is_prelude(&self, module: ModuleId) -> bool {
        self.module(module).name == PRELUDE_MODULE
    }

    /// Module search order for unqualified names: current module, other
    /// libraries in load order, prelude last.
    pub fn search_order(&self) -> Vec<ModuleId> {
        let current = self.current();
        let mut order = vec![current];
        for module in &self.modules {
            if module.id != current && module.name != PRELUDE_MODULE {
                order.push(module.id);
            }
        }
        for module in &self.modules {
            if module.id != current && module.name == PRELUDE_MODULE {
                order.push(module.id);
            }
        }
        order
    }

    pub fn top_level_named(&self, module: ModuleId, name: &str) -> Vec<DeclId> {
        let module = self.module(module);
        module
            .top_level
            .iter()
            .copied()
            .filter(|id| module.decl(*id).name == name)
            .collect()
    }

    pub fn extensions_of(&self, nominal: DeclId) -> &[DeclId] {
        self.extensions
            .get(&nominal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Members of a nominal or protocol and of all its extensions.
    pub fn all_members(&self, decl: DeclId) -> Vec<DeclId> {
        let mut members = self.decl(decl).members().to_vec();
        for ext in self.extensions_of(decl) {
            members.extend_from_slice(self.decl(*ext).members());
        }
        members
    }

    // -- Types of declarations --

    /// Type a nominal declaration denotes inside its own body.
    pub fn declared_type(&self, decl: DeclId) -> Type {
        let d = self.decl(decl);
        match &d.kind {
            DeclKind::Protocol(info) => Type::GenericParam(info.self_param),
            DeclKind::TypeAlias { ty } => ty.clone(),
            DeclKind::GenericParam { .. } => Type::GenericParam(decl),
            DeclKind::Extension(ExtensionInfo {
                extended: Some(extended),
                ..
            }) => self.declared_type(*extended),
            DeclKind::Extension(_) => Type::Error,
            _ => {
                let args = d
                    .generics
                    .params
                    .iter()
                    .map(|param| Type::GenericParam(*param))
                    .collect::<Vec<_>>();
                self.make_nominal(decl, args)
            }
        }
    }

    /// Builds a nominal type, canonicalizing `Optional<T>` to `T?`.
    pub fn make_nominal(&self, decl: DeclId, mut args: Vec<Type>) -> Type {
        if Some(decl) == self.known.optional && args.len() == 1 {
            if let Some(arg) = args.pop() {
                return Type::optional(arg);
            }
        }
        Type::Nominal { decl, args }
    }

    /// Type of `self` inside members of `context`.
    pub fn self_type_in(&self, context: DeclId) -> Type {
        self.declared_type(context)
    }

    /// Nearest enclosing nominal, extension or protocol.
    pub fn type_context_of(&self, decl: DeclId) -> Option<DeclId> {
        let mut current = self.decl(decl).parent;
        while let Some(id) = current {
            let d = self.decl(id);
            if d.is_nominal() || d.is_protocol() || matches!(d.kind, DeclKind::Extension(_)) {
                return Some(id);
            }
            current = d.parent;
        }
        None
    }

    /// Nominal (or protocol) a member context refers to, looking through
    /// extensions.
    pub fn nominal_of_context(&self, context: DeclId) -> Option<DeclId> {
        match &self.decl(context).kind {
            DeclKind::Extension(info) => info.extended,
            _ => Some(context),
        }
    }

    pub fn generic_params_in_scope(&self, decl: DeclId) -> Vec<DeclId> {
        let mut chain = Vec::new();
        let mut current = Some(decl);
        while let Some(id) = current {
            let d = self.decl(id);
            match &d.kind {
                DeclKind::Extension(ExtensionInfo {
                    extended: Some(extended),
                    ..
                }) => match &self.decl(*extended).kind {
                    DeclKind::Protocol(info) => chain.push(vec![info.self_param]),
                    _ => chain.push(self.decl(*extended).generics.params.clone()),
                },
                DeclKind::Protocol(info) => chain.push(vec![info.self_param]),
                _ => chain.push(d.generics.params.clone()),
            }
            current = d.parent;
        }
        chain.into_iter().rev().flatten().collect()
    }

    pub fn requirements_in_scope(&self, decl: DeclId) -> Vec<Requirement> {
        let mut reqs = Vec::new();
        let mut current = Some(decl);
        while let Some(id) = current {
            let d = self.decl(id);
            reqs.extend(d.generics.requirements.iter().cloned());
            if let DeclKind::Extension(ExtensionInfo {
                extended: Some(extended),
                ..
            }) = &d.kind
            {
                reqs.extend(self.decl(*extended).generics.requirements.iter().cloned());
            }
            current = d.parent;
        }
        reqs
    }

    /// Substitution mapping the generic parameters of `base`'s declaration to
    /// its arguments. Protocol `Self` maps to `base` itself.
    pub fn substitution_for(&self, base: &Type) -> Substitution {
        let mut subst = Substitution::new();
        match base {
            Type::Nominal { decl, args } => {
                let params = &self.decl(*decl).generics.params;
                for (param, arg) in params.iter().zip(args) {
                    subst.insert(*param, arg.clone());
                }
            }
            Type::Optional(inner) => {
                if let Some(optional) = self.known.optional {
                    if let Some(param) = self.decl(optional).generics.params.first() {
                        subst.insert(*param, (**inner).clone());
                    }
                }
            }
            _ => {}
        }
        subst
    }

    /// Nominal declaration behind a type, including `Optional`.
    pub fn nominal_decl_of(&self, ty: &Type) -> Option<DeclId> {
        match ty {
            Type::Nominal { decl, .. } => Some(*decl),
            Type::Optional(_) => self.known.optional,
            _ => None,
        }
    }

    // -- Well-known types --

    fn known_type(&self, decl: Option<DeclId>) -> Type {
        decl.map(Type::nominal).unwrap_or(Type::Error)
    }

    pub fn int_type(&self) -> Type {
        self.known_type(self.known.int)
    }

    pub fn double_type(&self) -> Type {
        self.known_type(self.known.double)
    }

    pub fn bool_type(&self) -> Type {
        self.known_type(self.known.bool)
    }

    pub fn string_type(&self) -> Type {
        self.known_type(self.known.string)
    }

    pub fn error_existential(&self) -> Type {
        match self.known.error {
            Some(error) => Type::Existential(vec![error]),
            None => Type::Error,
        }
    }

    pub fn literal_protocol(&self, kind: LiteralKind) -> Option<DeclId> {
        match kind {
            LiteralKind::Integer => self.known.integer_literal,
            LiteralKind::Float => self.known.float_literal,
            LiteralKind::String => self.known.string_literal,
            LiteralKind::Boolean => self.known.boolean_literal,
            LiteralKind::Nil => self.known.nil_literal,
        }
    }

    /// Type a literal gets without contextual type.
    pub fn literal_default(&self, kind: LiteralKind) -> Option<Type> {
        let alias = match kind {
            LiteralKind::Integer => self.known.integer_literal_type,
            LiteralKind::Float => self.known.float_literal_type,
            LiteralKind::String => self.known.string_literal_type,
            LiteralKind::Boolean => self.known.boolean_literal_type,
            LiteralKind::Nil => None,
        }?;
        match &self.decl(alias).kind {
            DeclKind::TypeAlias { ty } if !ty.is_error() => Some(ty.clone()),
            _ => None,
        }
    }

    // -- Classes --

    pub fn superclass_of(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Nominal { decl, .. } => {
                let superclass = self.decl(*decl).nominal_info()?.superclass.clone()?;
                Some(self.substitution_for(ty).apply(&superclass))
            }
            Type::GenericParam(param) => match &self.decl(*param).kind {
                DeclKind::GenericParam { superclass, .. } => superclass.clone(),
                _ => None,
            },
            _ => None,
        }
    }

    /// `sub` is `sup` or inherits from it.
    pub fn is_subclass(&self, sub: &Type, sup: &Type) -> bool {
        let mut current = Some(sub.clone());
        let mut guard = 0;
        while let Some(ty) = current {
            if &ty == sup {
                return true;
            }
            guard += 1;
            if guard > 64 {
                return false;
            }
            current = self.superclass_of(&ty);
        }
        false
    }

    pub fn is_class_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Nominal { decl, .. } => self.decl(*decl).is_class(),
            Type::AnyObject => true,
            Type::GenericParam(param) => match &self.decl(*param).kind {
                DeclKind::GenericParam {
                    superclass, bounds, ..
                } => {
                    superclass.is_some()
                        || bounds.iter().any(|proto| self.protocol_is_class_bound(*proto))
                }
                _ => false,
            },
            Type::Existential(protos) => protos
                .iter()
                .any(|proto| self.protocol_is_class_bound(*proto)),
            _ => false,
        }
    }

    fn protocol_is_class_bound(&self, proto: DeclId) -> bool {
        self.protocol_closure(proto)
            .into_iter()
            .any(|p| matches!(&self.decl(p).kind, DeclKind::Protocol(info) if info.class_bound))
    }

    // -- Protocols and conformances --

    /// `proto` followed by every protocol it inherits, without duplicates.
    pub fn protocol_closure(&self, proto: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut stack = vec![proto];
        while let Some(p) = stack.pop() {
            if out.contains(&p) {
                continue;
            }
            out.push(p);
            if let DeclKind::Protocol(info) = &self.decl(p).kind {
                for inherited in info.inherited.iter().rev() {
                    stack.push(*inherited);
                }
            }
        }
        out
    }

    /// Protocols a nominal declares directly or through its extensions.
    pub fn declared_protocols(&self, nominal: DeclId) -> Vec<DeclId> {
        let mut protos = Vec::new();
        if let Some(info) = self.decl(nominal).nominal_info() {
            protos.extend_from_slice(&info.protocols);
        }
        for ext in self.extensions_of(nominal) {
            if let DeclKind::Extension(info) = &self.decl(*ext).kind {
                protos.extend_from_slice(&info.protocols);
            }
        }
        protos
    }

    /// Every protocol a nominal conforms to, including inherited ones and
    /// those of its superclasses, in a stable order.
    pub fn all_protocols(&self, nominal: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut current = Some(nominal);
        let mut guard = 0;
        while let Some(decl) = current {
            for proto in self.declared_protocols(decl) {
                for p in self.protocol_closure(proto) {
                    if !out.contains(&p) {
                        out.push(p);
                    }
                }
            }
            guard += 1;
            current = self
                .decl(decl)
                .nominal_info()
                .and_then(|info| info.superclass.as_ref())
                .and_then(Type::nominal_decl)
                .filter(|_| guard < 64);
        }
        out
    }

    /// Concrete conformance of a nominal to `proto`, searching superclasses.
    pub fn conformance(&self, ty_decl: DeclId, proto: DeclId) -> Option<&'a Conformance> {
        let mut current = Some(ty_decl);
        let mut guard = 0;
        while let Some(decl) = current {
            for module in &self.modules {
                if let Some(id) = module.conformance_index.get(&(decl, proto)) {
                    return Some(module.conformance(*id));
                }
            }
            guard += 1;
            current = self
                .decl(decl)
                .nominal_info()
                .and_then(|info| info.superclass.as_ref())
                .and_then(Type::nominal_decl)
                .filter(|_| guard < 64);
        }
        None
    }

    pub fn conformance_by_id(&self, id: ConformanceId) -> &'a Conformance {
        self.module(id.module).conformance(id)
    }

    pub fn conforms(&self, ty: &Type, proto: DeclId) -> bool {
        match ty {
            Type::Error | Type::Var(_) => true,
            Type::Nominal { decl, .. } => self.conformance(*decl, proto).is_some(),
            Type::Optional(_) => self
                .known
                .optional
                .is_some_and(|optional| self.conformance(optional, proto).is_some()),
            Type::GenericParam(_) | Type::DependentMember { .. } => {
                self.abstract_conforms(ty, proto)
            }
            // Only `Error` is self-conforming.
            Type::Existential(protos) => {
                Some(proto) == self.known.error && protos.as_slice() == [proto]
            }
            _ => false,
        }
    }

    /// Conformance of an archetype or dependent member, derived from its
    /// bounds and from `where` requirements of enclosing protocols.
    pub fn abstract_conforms(&self, ty: &Type, proto: DeclId) -> bool {
        self.abstract_bounds(ty)
            .into_iter()
            .any(|bound| self.protocol_closure(bound).contains(&proto))
    }

    /// Protocols an abstract type is directly known to conform to.
    pub fn abstract_bounds(&self, ty: &Type) -> Vec<DeclId> {
        match ty {
            Type::GenericParam(param) => match &self.decl(*param).kind {
                DeclKind::GenericParam { bounds, .. } => bounds.clone(),
                _ => Vec::new(),
            },
            Type::DependentMember { assoc, .. } => {
                let mut bounds = match &self.decl(*assoc).kind {
                    DeclKind::AssociatedType { bounds, .. } => bounds.clone(),
                    _ => Vec::new(),
                };
                // Requirements written on the protocols along the path, e.g.
                // `associatedtype A: P2 where A.B: Q` seen from `T.A.B`.
                let (_, path) = split_dependent(ty);
                for start in 0..path.len() {
                    let owner = match self.decl(path[start]).parent {
                        Some(owner) => owner,
                        None => continue,
                    };
                    let suffix = &path[start..];
                    for req in &self.decl(owner).generics.requirements {
                        if let Requirement::Conformance { subject, protocol } = req {
                            let (subject_root, subject_path) = split_dependent(subject);
                            if matches!(subject_root, Type::GenericParam(_))
                                && subject_path == suffix
                                && !bounds.contains(protocol)
                            {
                                bounds.push(*protocol);
                            }
                        }
                    }
                }
                bounds
            }
            _ => Vec::new(),
        }
    }

    /// Resolves `base.assoc` once `base` is concrete.
    pub fn resolve_dependent(&self, base: &Type, assoc: DeclId) -> Option<Type> {
        let proto = self.decl(assoc).parent?;
        let nominal = self.nominal_decl_of(base)?;
        let conformance = self.conformance(nominal, proto)?;
        let witness = conformance.assoc_type(assoc)?;
        Some(self.substitution_for(base).apply(witness))
    }

    /// Replaces `DependentMember` nodes with concrete bases by their
    /// witnesses.
    pub fn normalize(&self, ty: &Type) -> Type {
        ty.map(&mut |node| match &node {
            Type::DependentMember { base, assoc } if !base.is_dependent() && !base.contains_vars() => {
                self.resolve_dependent(base, *assoc).unwrap_or(node)
            }
            Type::Nominal { decl, args } if Some(*decl) == self.known.optional && args.len() == 1 => {
                Type::optional(args[0].clone())
            }
            _ => node,
        })
    }
}

/// `T.A.B` into (`T`, `[A, B]`).
pub fn split_dependent(ty: &Type) -> (&Type, Vec<DeclId>) {
    let mut path = Vec::new();
    let mut current = ty;
    while let Type::DependentMember { base, assoc } = current {
        path.push(*assoc);
        current = base;
    }
    path.reverse();
    (current, path)
}

impl DeclNames for ModuleSet<'_> {
    fn decl_name(&self, id: DeclId) -> &str {
        &self.decl(id).name
    }
}
