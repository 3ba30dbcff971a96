//! Checker state shared by the expression, statement and declaration
//! passes.
//!
//! `Checker` owns:
//! - the read-only module view it resolves names against,
//! - the solver variable store (`TypeVars`),
//! - the side tables being filled (types, references, calls, conversions),
//! - the lexical state: local scopes and the stack of function contexts.

use crate::core::diag::Span;
use crate::core::parse::CompletionSite;
use crate::core::resolve::{
    CompatibilityMode, DeclId, DeclKind, ModuleSet, Requirement, TypeResolver,
};
use crate::core::tree::{NodeId, TypeExpr};
use crate::core::typecheck::errors::{TypeCheckError, TypeCheckErrorKind};
use crate::core::typecheck::model::*;
use crate::core::typecheck::unify::{TypeVars, VarOrigin};
use crate::core::types::{Type, TypeRelation, render_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    TopLevel,
    Function,
    Initializer { failable: bool },
    Accessor,
    Closure,
    /// Property and default-argument initializers.
    Initial,
}

#[derive(Debug, Clone)]
pub(crate) struct FuncContext {
    pub(crate) kind: BodyKind,
    /// Declaration used for unqualified lookup and type resolution.
    pub(crate) decl: Option<DeclId>,
    pub(crate) result: Type,
    pub(crate) throws: bool,
    pub(crate) self_ty: Option<Type>,
    /// `self` may be assigned through (mutating methods and initializers).
    pub(crate) self_mutable: bool,
    pub(crate) is_static: bool,
    pub(crate) loop_depth: u32,
    pub(crate) switch_depth: u32,
    /// Enclosing `do` blocks with `catch` clauses.
    pub(crate) catch_depth: u32,
    pub(crate) saw_return: bool,
}

impl FuncContext {
    pub(crate) fn new(kind: BodyKind, decl: Option<DeclId>, result: Type) -> Self {
        FuncContext {
            kind,
            decl,
            result,
            throws: false,
            self_ty: None,
            self_mutable: false,
            is_static: false,
            loop_depth: 0,
            switch_depth: 0,
            catch_depth: 0,
            saw_return: false,
        }
    }
}

pub(crate) struct Checker<'s, 'a> {
    pub(crate) set: &'s ModuleSet<'a>,
    pub(crate) compat: CompatibilityMode,
    pub(crate) vars: TypeVars,
    pub(crate) tables: TypeTables,
    pub(crate) errors: Vec<TypeCheckError>,
    /// Local scopes, innermost last; each maps names to binding nodes.
    pub(crate) scopes: Vec<Vec<(String, NodeId)>>,
    pub(crate) funcs: Vec<FuncContext>,
    /// Nesting of `try` expressions around the current expression.
    pub(crate) try_depth: u32,
    pub(crate) completion_site: Option<CompletionSite>,
    pub(crate) completion: Option<CompletionFacts>,
}

impl<'s, 'a> Checker<'s, 'a> {
    pub(crate) fn new(
        set: &'s ModuleSet<'a>,
        compat: CompatibilityMode,
        completion_site: Option<CompletionSite>,
    ) -> Self {
        Checker {
            set,
            compat,
            vars: TypeVars::new(),
            tables: TypeTables::default(),
            errors: Vec::new(),
            scopes: Vec::new(),
            funcs: Vec::new(),
            try_depth: 0,
            completion_site,
            completion: None,
        }
    }

    // -- Diagnostics --

    pub(crate) fn error(&mut self, kind: TypeCheckErrorKind, span: Span) {
        self.errors.push(TypeCheckError::new(kind, span));
    }

    /// Renders a type for a diagnostic, showing literal variables as their
    /// default type.
    pub(crate) fn display(&self, ty: &Type) -> String {
        let resolved = self.vars.resolve(ty).map(&mut |node| match node {
            Type::Var(id) => self
                .vars
                .literal_kind(id)
                .and_then(|kind| self.set.literal_default(kind))
                .unwrap_or(Type::Var(id)),
            other => other,
        });
        render_type(&self.set.normalize(&resolved), self.set)
    }

    pub(crate) fn mismatch(&mut self, expected: &Type, found: &Type, span: Span) {
        let kind = TypeCheckErrorKind::TypeMismatch {
            expected: self.display(expected),
            found: self.display(found),
        };
        self.error(kind, span);
    }

    // -- Recording --

    pub(crate) fn record(&mut self, node: NodeId, ty: &Type) {
        self.tables.types.insert(node, ty.clone());
    }

    pub(crate) fn record_ref(&mut self, node: NodeId, value: ValueRef) {
        self.tables.refs.insert(node, value);
    }

    pub(crate) fn record_conversions(&mut self, node: NodeId, steps: Vec<Conversion>) {
        if !steps.is_empty() {
            self.tables.conversions.insert(node, steps);
        }
    }

    // -- Solver helpers --

    pub(crate) fn fresh(&mut self, origin: VarOrigin) -> Type {
        self.vars.fresh(origin)
    }

    pub(crate) fn shallow(&self, ty: &Type) -> Type {
        self.set.normalize(&self.vars.shallow(ty))
    }

    pub(crate) fn resolved(&self, ty: &Type) -> Type {
        self.set.normalize(&self.vars.resolve(ty))
    }

    pub(crate) fn unify(&mut self, a: &Type, b: &Type) -> bool {
        self.vars.unify(self.set, a, b)
    }

    /// Unifies only if it succeeds completely.
    pub(crate) fn try_unify(&mut self, a: &Type, b: &Type) -> bool {
        let snapshot = self.vars.clone();
        if self.vars.unify(self.set, a, b) {
            true
        } else {
            self.vars = snapshot;
            false
        }
    }

    /// Makes a value of type `actual` usable where `expected` is required,
    /// binding variables and computing the implicit conversions. Returns
    /// `None` (possibly with partial bindings) when impossible.
    pub(crate) fn coerce_types(
        &mut self,
        actual: &Type,
        expected: &Type,
    ) -> Option<(TypeRelation, Vec<Conversion>)> {
        let a = self.shallow(actual);
        let e = self.shallow(expected);
        if a.is_error() || e.is_error() {
            return Some((TypeRelation::Unknown, Vec::new()));
        }
        let literal = match &a {
            Type::Var(id) => self.vars.literal_kind(*id),
            _ => None,
        };
        if self.try_unify(&a, &e) {
            // A literal bound to anything but its default type is a
            // conversion for ranking purposes.
            let relation = match literal.and_then(|kind| self.set.literal_default(kind)) {
                Some(default) if self.resolved(&a) != default => TypeRelation::Convertible,
                _ => TypeRelation::Identical,
            };
            return Some((relation, Vec::new()));
        }
        match &e {
            Type::Optional(payload) => {
                if matches!(a, Type::Optional(_)) {
                    return None;
                }
                let (_, mut steps) = self.coerce_types(&a, payload)?;
                steps.push(Conversion {
                    kind: ConversionKind::WrapOptional,
                    to: e.clone(),
                });
                Some((TypeRelation::Convertible, steps))
            }
            Type::Existential(protos) => {
                let a = self.default_literal(&a)?;
                let ok = match &a {
                    Type::Existential(have) => protos.iter().all(|proto| {
                        have.iter()
                            .any(|p| self.set.protocol_closure(*p).contains(proto))
                    }),
                    Type::Var(_) => false,
                    _ => protos.iter().all(|proto| self.conforms(&a, *proto)),
                };
                ok.then(|| {
                    (
                        TypeRelation::Convertible,
                        vec![Conversion {
                            kind: ConversionKind::Existential,
                            to: e.clone(),
                        }],
                    )
                })
            }
            Type::AnyObject => self.set.is_class_type(&a).then(|| {
                (
                    TypeRelation::Convertible,
                    vec![Conversion {
                        kind: ConversionKind::AnyObject,
                        to: e.clone(),
                    }],
                )
            }),
            Type::Nominal { .. } if self.set.is_class_type(&e) => {
                let upcast = !a.contains_vars() && self.set.is_subclass(&a, &e)
                    || matches!(a, Type::GenericParam(_))
                        && self
                            .set
                            .superclass_of(&a)
                            .is_some_and(|sup| self.set.is_subclass(&sup, &e));
                upcast.then(|| {
                    (
                        TypeRelation::Convertible,
                        vec![Conversion {
                            kind: ConversionKind::Upcast,
                            to: e.clone(),
                        }],
                    )
                })
            }
            Type::Function(expected_fn) if expected_fn.throws => {
                // A non-throwing function is usable as a throwing one.
                let Type::Function(actual_fn) = &a else {
                    return None;
                };
                if actual_fn.throws {
                    return None;
                }
                let mut widened = (**actual_fn).clone();
                widened.throws = true;
                self.try_unify(&Type::Function(Box::new(widened)), &e)
                    .then_some((TypeRelation::Convertible, Vec::new()))
            }
            _ => None,
        }
    }

    /// Binds an unbound literal variable to its default type.
    fn default_literal(&mut self, ty: &Type) -> Option<Type> {
        if let Type::Var(id) = ty {
            if let Some(kind) = self.vars.literal_kind(*id) {
                let default = self.set.literal_default(kind)?;
                if !self.unify(ty, &default) {
                    return None;
                }
                return Some(default);
            }
        }
        Some(ty.clone())
    }

    /// Statement-level solving: literals nobody constrained take their
    /// default types.
    pub(crate) fn finish_statement(&mut self, mark: usize) {
        self.vars.default_literals(self.set, mark);
    }

    /// End of a body: anything still unbound cannot be inferred.
    pub(crate) fn finish_body(&mut self, mark: usize, span: Span) {
        self.vars.default_literals(self.set, mark);
        let mut reported = Vec::new();
        let mut ambiguous = false;
        for (_, origin, _) in self.vars.unbound_since(mark) {
            match origin {
                VarOrigin::GenericParam(param) => {
                    if !reported.contains(&param) {
                        reported.push(param);
                    }
                }
                VarOrigin::ClosureResult => {}
                _ => ambiguous = true,
            }
        }
        let errors_before = self.errors.len();
        for param in reported {
            let name = self.set.decl(param).name.clone();
            self.error(TypeCheckErrorKind::CannotInferGeneric(name), span);
        }
        if ambiguous && errors_before == self.errors.len() && !self.body_has_errors(span) {
            self.error(TypeCheckErrorKind::CannotInfer, span);
        }
        self.vars.poison_unbound(mark);
    }

    fn body_has_errors(&self, span: Span) -> bool {
        self.errors.iter().any(|err| {
            err.span().start.offset >= span.start.offset && err.span().end.offset <= span.end.offset
        })
    }

    // -- Generic environment --

    pub(crate) fn context_decl(&self) -> Option<DeclId> {
        self.funcs.last().and_then(|ctx| ctx.decl)
    }

    pub(crate) fn func(&self) -> Option<&FuncContext> {
        self.funcs.last()
    }

    pub(crate) fn func_mut(&mut self) -> Option<&mut FuncContext> {
        self.funcs.last_mut()
    }

    pub(crate) fn env_requirements(&self) -> Vec<Requirement> {
        match self.context_decl() {
            Some(decl) => self.set.requirements_in_scope(decl),
            None => Vec::new(),
        }
    }

    /// Conformance check that also sees `where` requirements of the
    /// enclosing declarations (constrained extensions in particular).
    pub(crate) fn conforms(&self, ty: &Type, proto: DeclId) -> bool {
        if self.set.conforms(ty, proto) {
            return true;
        }
        if !matches!(ty, Type::GenericParam(_) | Type::DependentMember { .. }) {
            return false;
        }
        self.env_requirements().iter().any(|req| match req {
            Requirement::Conformance { subject, protocol } => {
                self.set.normalize(subject) == *ty
                    && self.set.protocol_closure(*protocol).contains(&proto)
            }
            _ => false,
        })
    }

    /// Protocols from enclosing `where` clauses that constrain `ty`.
    pub(crate) fn env_protocols_of(&self, ty: &Type) -> Vec<DeclId> {
        let mut protos = Vec::new();
        for req in self.env_requirements() {
            if let Requirement::Conformance { subject, protocol } = req {
                if self.set.normalize(&subject) == *ty && !protos.contains(&protocol) {
                    protos.push(protocol);
                }
            }
        }
        protos
    }

    pub(crate) fn resolve_type_expr(&mut self, texpr: &TypeExpr) -> Type {
        let resolver = TypeResolver::new(self.set, self.context_decl());
        match resolver.resolve(texpr) {
            Ok(ty) => ty,
            Err(err) => {
                let span = err.span();
                self.error(TypeCheckErrorKind::Resolve(err.into_kind()), span);
                Type::Error
            }
        }
    }

    // -- Scopes --

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub(crate) fn pop_scope(&mut self) -> Vec<(String, NodeId)> {
        self.scopes.pop().unwrap_or_default()
    }

    pub(crate) fn declare_local(&mut self, name: &str, node: NodeId, ty: &Type, is_let: bool) {
        self.tables.locals.insert(
            node,
            LocalInfo {
                name: name.to_string(),
                ty: ty.clone(),
                is_let,
            },
        );
        if self.scopes.is_empty() {
            self.push_scope();
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name.to_string(), node));
        }
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<NodeId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(local, _)| local == name)
            .map(|(_, node)| *node)
    }

    /// Runs `f` with a fresh scope stack, as for a declaration body that
    /// cannot see the locals around it.
    pub(crate) fn with_detached_scopes<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::take(&mut self.scopes);
        let result = f(self);
        self.scopes = saved;
        result
    }

    pub(crate) fn visible_locals(&self) -> Vec<CompletionLocal> {
        let mut out: Vec<CompletionLocal> = Vec::new();
        for (name, node) in self.scopes.iter().rev().flat_map(|scope| scope.iter().rev()) {
            if out.iter().any(|local| &local.name == name) {
                continue;
            }
            if let Some(info) = self.tables.locals.get(node) {
                out.push(CompletionLocal {
                    name: name.clone(),
                    node: *node,
                    ty: info.ty.clone(),
                    is_let: info.is_let,
                });
            }
        }
        out
    }

    pub(crate) fn completion_facts(&mut self) -> &mut CompletionFacts {
        if self.completion.is_none() {
            let facts = CompletionFacts {
                context: self.context_decl(),
                locals: self.visible_locals(),
                in_static: self.func().is_some_and(|ctx| ctx.is_static),
                ..CompletionFacts::default()
            };
            self.completion = Some(facts);
        }
        self.completion.get_or_insert_with(CompletionFacts::default)
    }

    // -- Self --

    /// Type of `self` for members of `context` (a nominal, extension or
    /// protocol).
    pub(crate) fn self_type_for(&self, context: DeclId) -> Type {
        self.set.self_type_in(context)
    }

    pub(crate) fn is_class_context(&self) -> bool {
        self.func()
            .and_then(|ctx| ctx.self_ty.as_ref())
            .is_some_and(|ty| self.set.is_class_type(ty))
    }

    pub(crate) fn member_is_let(&self, decl: DeclId) -> bool {
        matches!(&self.set.decl(decl).kind, DeclKind::Var(info) if info.is_let)
    }

    // -- Finalization --

    /// Resolves every recorded type; variables that survived become errors.
    pub(crate) fn finalize(mut self) -> (TypeTables, Vec<TypeCheckError>, Option<CompletionFacts>) {
        let set = self.set;
        let vars = &self.vars;
        let fix = |ty: &Type| -> Type {
            let resolved = set.normalize(&vars.resolve(ty));
            resolved.map(&mut |node| match node {
                Type::Var(_) => Type::Error,
                other => other,
            })
        };
        let tables = &mut self.tables;
        for ty in tables.types.values_mut() {
            *ty = fix(ty);
        }
        for info in tables.locals.values_mut() {
            info.ty = fix(&info.ty);
        }
        for steps in tables.conversions.values_mut() {
            for step in steps.iter_mut() {
                step.to = fix(&step.to);
            }
        }
        let fix_subst = |subst: &crate::core::types::Substitution| subst.map_types(|ty| fix(ty));
        for value in tables.refs.values_mut() {
            match value {
                ValueRef::Decl(decl_ref) => {
                    decl_ref.subst = fix_subst(&decl_ref.subst);
                    decl_ref.base = decl_ref.base.as_ref().map(fix);
                }
                ValueRef::Type(ty) => *ty = fix(ty),
                _ => {}
            }
        }
        for call in tables.calls.values_mut() {
            if let Some(callee) = &mut call.callee {
                callee.subst = fix_subst(&callee.subst);
                callee.base = callee.base.as_ref().map(fix);
            }
            for ty in call.param_types.iter_mut() {
                *ty = fix(ty);
            }
            call.result = fix(&call.result);
        }
        let completion = self.completion.take().map(|mut facts| {
            for local in facts.locals.iter_mut() {
                local.ty = fix(&local.ty);
            }
            facts.expected = facts.expected.as_ref().map(fix);
            facts.base = facts.base.as_ref().map(fix);
            if let Some(call) = &mut facts.call {
                for candidate in call.candidates.iter_mut() {
                    for param in candidate.params.iter_mut() {
                        param.ty = fix(&param.ty);
                    }
                    candidate.result = fix(&candidate.result);
                }
            }
            facts
        });
        let tables = std::mem::take(&mut self.tables);
        (tables, self.errors, completion)
    }
}
