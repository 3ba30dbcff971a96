//! Call checking: candidate collection, instantiation, scoring and
//! application.
//!
//! Every candidate is instantiated with fresh variables and scored on a
//! snapshot of the variable store; only the winner is applied for real.
//! Arguments whose type depends on context (closures, implicit members,
//! the completion cursor) are checked after the winner is known, with the
//! parameter type as their contextual type.

use crate::core::diag::Span;
use crate::core::resolve::{
    ArgMatch, ArgShape, CompatibilityMode, DeclId, DeclKind, LookupOrigin,
    MemberAccess, MemberCandidate, ParamBinding, ParamDecl, ParamShape, Requirement,
    dynamic_lookup, lookup_members, lookup_unqualified, match_arguments, member_substitution,
};
use crate::core::tree::{Arg, Expr, ExprKind};
use crate::core::typecheck::engine::Checker;
use crate::core::typecheck::errors::TypeCheckErrorKind;
use crate::core::typecheck::model::*;
use crate::core::typecheck::unify::VarOrigin;
use crate::core::types::{FnParam, Substitution, Type, TypeRelation};

/// One declaration (or function value) competing for a call.
#[derive(Debug, Clone)]
pub(crate) struct Cand {
    pub(crate) decl: Option<DeclId>,
    pub(crate) origin: LookupOrigin,
    /// Instance type the member was found on.
    pub(crate) base: Option<Type>,
    pub(crate) implicit_self: bool,
    pub(crate) via_super: bool,
    pub(crate) dynamic: bool,
    /// Callee type when calling a value rather than a declaration.
    pub(crate) value_type: Option<Type>,
}

impl Cand {
    pub(crate) fn decl(decl: DeclId, origin: LookupOrigin, base: Option<Type>) -> Self {
        Cand {
            decl: Some(decl),
            origin,
            base,
            implicit_self: false,
            via_super: false,
            dynamic: false,
            value_type: None,
        }
    }

    pub(crate) fn value(ty: Type) -> Self {
        Cand {
            decl: None,
            origin: LookupOrigin::Local,
            base: None,
            implicit_self: false,
            via_super: false,
            dynamic: false,
            value_type: Some(ty),
        }
    }

    pub(crate) fn from_member(candidate: MemberCandidate) -> Self {
        Cand::decl(candidate.decl, candidate.origin, Some(candidate.base))
    }

    pub(crate) fn decl_ref(&self, subst: Substitution) -> Option<DeclRef> {
        Some(DeclRef {
            decl: self.decl?,
            subst,
            base: self.base.clone(),
            origin: self.origin,
            implicit_self: self.implicit_self,
            via_super: self.via_super,
        })
    }
}

/// A candidate with fresh variables for its generic parameters.
#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) result: Type,
    pub(crate) throws: bool,
    pub(crate) subst: Substitution,
    pub(crate) generic_params: Vec<DeclId>,
    pub(crate) target: CallTarget,
}

impl Instance {
    pub(crate) fn fn_type(&self) -> Type {
        Type::function(
            self.params.iter().map(ParamDecl::fn_param).collect(),
            self.result.clone(),
            self.throws,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deferred {
    No,
    Closure { params: usize },
    ImplicitMember,
    Completion,
}

/// An argument as seen by overload scoring.
#[derive(Debug, Clone)]
pub(crate) struct ArgInfo<'e> {
    pub(crate) label: Option<String>,
    pub(crate) trailing: bool,
    /// `None` for operands that have no expression of their own.
    pub(crate) expr: Option<&'e Expr>,
    /// Type from the pre-pass; `None` for deferred arguments.
    pub(crate) ty: Option<Type>,
    pub(crate) deferred: Deferred,
    pub(crate) member_name: Option<String>,
}

impl ArgInfo<'_> {
    fn shape(&self) -> ArgShape {
        ArgShape {
            label: self.label.clone(),
            trailing_closure: self.trailing,
        }
    }
}

struct MatchOutcome {
    matched: ArgMatch,
    layout: ArgLayout,
    splat_rejected: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    result: TypeRelation,
    worst: TypeRelation,
    conversions: usize,
    generic: bool,
    origin: LookupOrigin,
}

struct Evaluation {
    viable: bool,
    labels_ok: bool,
    score: Score,
}

fn deferred_kind(expr: &Expr) -> Deferred {
    match &expr.kind {
        ExprKind::Closure(closure) => Deferred::Closure {
            params: closure.params.len(),
        },
        ExprKind::ImplicitMember(_) => Deferred::ImplicitMember,
        ExprKind::Call { callee, .. } if matches!(callee.kind, ExprKind::ImplicitMember(_)) => {
            Deferred::ImplicitMember
        }
        ExprKind::CodeCompletion | ExprKind::ImplicitMemberCompletion => Deferred::Completion,
        ExprKind::Paren(inner) => deferred_kind(inner),
        _ => Deferred::No,
    }
}

fn implicit_member_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::ImplicitMember(name) => Some(name.clone()),
        ExprKind::Call { callee, .. } => implicit_member_name(callee),
        ExprKind::Paren(inner) => implicit_member_name(inner),
        _ => None,
    }
}

pub(crate) enum Callee {
    Candidates { name: String, cands: Vec<Cand> },
    Error,
}

impl<'s, 'a> Checker<'s, 'a> {
    // -- Arguments --

    /// Checks every argument whose type does not depend on the callee.
    pub(crate) fn precheck_args<'e>(&mut self, args: &'e [Arg]) -> Vec<ArgInfo<'e>> {
        args.iter()
            .map(|arg| {
                let deferred = deferred_kind(&arg.expr);
                let ty = match deferred {
                    Deferred::No => Some(self.infer_expr(&arg.expr, None)),
                    _ => None,
                };
                ArgInfo {
                    label: arg.label.clone(),
                    trailing: arg.trailing,
                    expr: Some(&arg.expr),
                    ty,
                    deferred,
                    member_name: implicit_member_name(&arg.expr),
                }
            })
            .collect()
    }

    pub(crate) fn operand_info<'e>(&mut self, expr: &'e Expr) -> ArgInfo<'e> {
        ArgInfo {
            label: None,
            trailing: false,
            expr: Some(expr),
            ty: Some(self.infer_expr(expr, None)),
            deferred: Deferred::No,
            member_name: None,
        }
    }

    // -- Candidates --

    /// Members of `base` named `name`, including `where`-clause protocols
    /// of archetypes and dynamic lookup on `AnyObject`.
    pub(crate) fn member_candidates(
        &mut self,
        base: &Type,
        name: Option<&str>,
        access: MemberAccess,
    ) -> Vec<Cand> {
        let base = self.resolved(base);
        if base == Type::AnyObject && access == MemberAccess::Instance {
            return dynamic_lookup(self.set, name)
                .into_iter()
                .map(|candidate| {
                    let mut cand = Cand::from_member(candidate);
                    cand.dynamic = true;
                    cand
                })
                .collect();
        }
        let mut found = lookup_members(self.set, &base, name, access);
        if matches!(base, Type::GenericParam(_) | Type::DependentMember { .. }) {
            let extra = self
                .env_protocols_of(&base)
                .into_iter()
                .filter(|proto| !self.set.abstract_conforms(&base, *proto))
                .collect::<Vec<_>>();
            if !extra.is_empty() {
                for mut candidate in
                    lookup_members(self.set, &Type::Existential(extra), name, access)
                {
                    if found.iter().any(|f| f.decl == candidate.decl) {
                        continue;
                    }
                    candidate.base = base.clone();
                    found.push(candidate);
                }
            }
        }
        found.into_iter().map(Cand::from_member).collect()
    }

    fn constructor_candidates(&mut self, ty: &Type) -> Vec<Cand> {
        self.member_candidates(ty, Some("init"), MemberAccess::Static)
            .into_iter()
            .filter(|cand| {
                cand.decl
                    .is_some_and(|decl| matches!(self.set.decl(decl).kind, DeclKind::Constructor { .. }))
            })
            .collect()
    }

    /// Type named by a type declaration used as a value; generic arguments
    /// that were not written become variables.
    pub(crate) fn type_of_type_decl(&mut self, decl: DeclId) -> Type {
        let d = self.set.decl(decl);
        match &d.kind {
            DeclKind::Struct(_) | DeclKind::Class(_) | DeclKind::Enum(_) => {
                let inside = self
                    .context_decl()
                    .is_some_and(|ctx| self.encloses(decl, ctx));
                if inside {
                    return self.set.declared_type(decl);
                }
                let args = d
                    .generics
                    .params
                    .iter()
                    .map(|param| self.fresh(VarOrigin::GenericParam(*param)))
                    .collect();
                self.set.make_nominal(decl, args)
            }
            DeclKind::Protocol(_) => Type::Existential(vec![decl]),
            DeclKind::TypeAlias { ty } => self.set.normalize(ty),
            DeclKind::GenericParam { .. } => Type::GenericParam(decl),
            DeclKind::AssociatedType { .. } => match self.func().and_then(|ctx| ctx.self_ty.clone()) {
                Some(self_ty) => self.set.normalize(&Type::DependentMember {
                    base: Box::new(self_ty),
                    assoc: decl,
                }),
                None => Type::Error,
            },
            _ => Type::Error,
        }
    }

    fn encloses(&self, nominal: DeclId, context: DeclId) -> bool {
        let mut current = Some(context);
        while let Some(id) = current {
            if self.set.nominal_of_context(id) == Some(nominal) {
                return true;
            }
            current = self.set.decl(id).parent;
        }
        false
    }

    /// Resolves what a call's callee denotes. Sub-expressions of the callee
    /// are checked and recorded here.
    pub(crate) fn callee_candidates(&mut self, callee: &Expr, expected: Option<&Type>) -> Callee {
        match &callee.kind {
            ExprKind::Ident(name) => {
                if let Some(node) = self.lookup_local(name) {
                    let ty = self.tables.locals.get(&node).map(|l| l.ty.clone()).unwrap_or(Type::Error);
                    self.record_ref(callee.id, ValueRef::Local(node));
                    self.record(callee.id, &ty);
                    return Callee::Candidates {
                        name: name.clone(),
                        cands: vec![Cand::value(ty)],
                    };
                }
                let results = lookup_unqualified(self.set, self.context_decl(), Some(name));
                if results.is_empty() {
                    self.error(TypeCheckErrorKind::UnresolvedIdentifier(name.clone()), callee.span);
                    return Callee::Error;
                }
                if let Some(first) = results.first() {
                    if self.set.decl(first.decl).is_type_decl() {
                        let ty = self.type_of_type_decl(first.decl);
                        self.record_ref(callee.id, ValueRef::Type(ty.clone()));
                        self.record(callee.id, &Type::Metatype(Box::new(ty.clone())));
                        return self.constructors_or_error(name, &ty, callee.span);
                    }
                }
                let cands = results
                    .into_iter()
                    .filter(|result| !self.set.decl(result.decl).is_type_decl())
                    .map(|result| match result.member {
                        Some(member) => {
                            let mut cand = Cand::from_member(member);
                            cand.implicit_self = true;
                            cand
                        }
                        None => Cand::decl(result.decl, result.origin, None),
                    })
                    .collect();
                Callee::Candidates {
                    name: name.clone(),
                    cands,
                }
            }
            ExprKind::Member { base, name, .. } => {
                if matches!(base.kind, ExprKind::SuperRef) {
                    return self.super_candidates(base, name, callee.span);
                }
                let base_ty = self.infer_expr(base, None);
                let base_ty = self.shallow(&base_ty);
                let cands = match &base_ty {
                    Type::Error => return Callee::Error,
                    Type::Var(_) => {
                        self.error(TypeCheckErrorKind::CannotInfer, base.span);
                        return Callee::Error;
                    }
                    Type::Metatype(inner) => {
                        if name == "init" {
                            self.constructor_candidates(inner)
                        } else {
                            self.member_candidates(inner, Some(name), MemberAccess::Static)
                        }
                    }
                    Type::Tuple(elems) => {
                        if let Some(index) = elems.iter().position(|e| e.label.as_deref() == Some(name)) {
                            let ty = elems[index].ty.clone();
                            self.record_ref(callee.id, ValueRef::TupleElement(index));
                            self.record(callee.id, &ty);
                            vec![Cand::value(ty)]
                        } else {
                            Vec::new()
                        }
                    }
                    other => self.member_candidates(other, Some(name), MemberAccess::Instance),
                };
                if cands.is_empty() {
                    self.report_missing_member(&base_ty, name, callee.span);
                    return Callee::Error;
                }
                Callee::Candidates {
                    name: name.clone(),
                    cands,
                }
            }
            ExprKind::ImplicitMember(name) => {
                let Some(base) = self.implicit_member_base(expected) else {
                    self.error(
                        TypeCheckErrorKind::ImplicitMemberWithoutContext(name.clone()),
                        callee.span,
                    );
                    return Callee::Error;
                };
                let cands = if name == "init" {
                    self.constructor_candidates(&base)
                } else {
                    self.member_candidates(&base, Some(name), MemberAccess::Static)
                };
                if cands.is_empty() {
                    self.report_missing_member(&base, name, callee.span);
                    return Callee::Error;
                }
                Callee::Candidates {
                    name: name.clone(),
                    cands,
                }
            }
            _ => {
                let ty = self.infer_expr(callee, None);
                match self.shallow(&ty) {
                    Type::Error => Callee::Error,
                    Type::Metatype(inner) => {
                        self.constructors_or_error("init", &inner, callee.span)
                    }
                    fn_ty @ Type::Function(_) => Callee::Candidates {
                        name: "function".to_string(),
                        cands: vec![Cand::value(fn_ty)],
                    },
                    // Solved later through unification with the arguments.
                    var @ Type::Var(_) => Callee::Candidates {
                        name: "function".to_string(),
                        cands: vec![Cand::value(var)],
                    },
                    other => {
                        let rendered = self.display(&other);
                        self.error(TypeCheckErrorKind::NotCallable(rendered), callee.span);
                        Callee::Error
                    }
                }
            }
        }
    }

    fn constructors_or_error(&mut self, name: &str, ty: &Type, span: Span) -> Callee {
        let cands = self.constructor_candidates(ty);
        if cands.is_empty() {
            let rendered = self.display(ty);
            self.error(
                TypeCheckErrorKind::UnresolvedMember {
                    base: rendered,
                    name: "init".to_string(),
                },
                span,
            );
            return Callee::Error;
        }
        Callee::Candidates {
            name: name.to_string(),
            cands,
        }
    }

    fn super_candidates(&mut self, base: &Expr, name: &str, span: Span) -> Callee {
        let Some(super_ty) = self.super_type() else {
            self.error(TypeCheckErrorKind::SuperOutsideClass, base.span);
            return Callee::Error;
        };
        self.record(base.id, &super_ty);
        self.record_ref(base.id, ValueRef::SelfValue);
        let mut cands = if name == "init" {
            self.constructor_candidates(&super_ty)
        } else {
            self.member_candidates(&super_ty, Some(name), MemberAccess::Instance)
        };
        for cand in cands.iter_mut() {
            cand.via_super = true;
        }
        if cands.is_empty() {
            self.report_missing_member(&super_ty, name, span);
            return Callee::Error;
        }
        Callee::Candidates {
            name: name.to_string(),
            cands,
        }
    }

    pub(crate) fn super_type(&self) -> Option<Type> {
        let self_ty = self.func()?.self_ty.clone()?;
        let self_ty = match self_ty {
            Type::Metatype(inner) => *inner,
            other => other,
        };
        self.set.superclass_of(&self_ty)
    }

    pub(crate) fn report_missing_member(&mut self, base: &Type, name: &str, span: Span) {
        if base.contains_error() {
            return;
        }
        let rendered = self.display(base);
        self.error(
            TypeCheckErrorKind::UnresolvedMember {
                base: rendered,
                name: name.to_string(),
            },
            span,
        );
    }

    /// Contextual type an implicit member expression is looked up in.
    pub(crate) fn implicit_member_base(&self, expected: Option<&Type>) -> Option<Type> {
        let expected = self.shallow(expected?);
        let base = match expected {
            Type::Optional(inner) => self.shallow(&inner),
            other => other,
        };
        match base {
            Type::Var(_) | Type::Error => None,
            other => Some(other),
        }
    }

    // -- Instantiation --

    pub(crate) fn instantiate(&mut self, cand: &Cand) -> Instance {
        let Some(decl_id) = cand.decl else {
            let ty = cand.value_type.clone().unwrap_or(Type::Error);
            return self.instantiate_value(&ty);
        };
        let decl = self.set.decl(decl_id);
        let mut subst = match &cand.base {
            Some(base) => member_substitution(
                self.set,
                &MemberCandidate {
                    decl: decl_id,
                    origin: cand.origin,
                    base: base.clone(),
                },
            ),
            None => Substitution::new(),
        };
        for param in &decl.generics.params {
            let var = self.fresh(VarOrigin::GenericParam(*param));
            subst.insert(*param, var);
        }
        let set = self.set;
        let apply = |ty: &Type| set.normalize(&subst.apply(ty));
        let map_params = |params: &[ParamDecl]| {
            params
                .iter()
                .map(|param| ParamDecl {
                    ty: apply(&param.ty),
                    ..param.clone()
                })
                .collect::<Vec<_>>()
        };
        let base_ty = cand.base.clone().unwrap_or(Type::Error);
        let (params, result, throws, target) = match &decl.kind {
            DeclKind::Func(sig) | DeclKind::Subscript { sig, .. } => {
                let target = if cand.dynamic {
                    CallTarget::Dynamic
                } else {
                    CallTarget::Function
                };
                (map_params(&sig.params), apply(&sig.result), sig.throws, target)
            }
            DeclKind::Constructor { sig, failable } => {
                let result = if *failable {
                    Type::optional(base_ty)
                } else {
                    base_ty
                };
                (map_params(&sig.params), result, sig.throws, CallTarget::Constructor)
            }
            DeclKind::EnumElement { payload, .. } => {
                let params = payload
                    .iter()
                    .flatten()
                    .map(|elem| ParamDecl {
                        label: elem.label.clone(),
                        name: elem.label.clone().unwrap_or_default(),
                        ty: apply(&elem.ty),
                        has_default: false,
                        variadic: false,
                        inout: false,
                        autoclosure: false,
                        escaping: true,
                    })
                    .collect();
                (params, base_ty, false, CallTarget::EnumElement)
            }
            DeclKind::Var(info) => {
                let value = self.instantiate_value(&apply(&info.ty));
                (value.params, value.result, value.throws, CallTarget::Value)
            }
            _ => (Vec::new(), Type::Error, false, CallTarget::Function),
        };
        Instance {
            params,
            result,
            throws,
            subst,
            generic_params: decl.generics.params.clone(),
            target,
        }
    }

    fn instantiate_value(&mut self, ty: &Type) -> Instance {
        let (params, result, throws) = match self.shallow(ty) {
            Type::Function(fn_ty) => (
                fn_ty
                    .params
                    .iter()
                    .map(|param| ParamDecl {
                        label: None,
                        name: String::new(),
                        ty: param.ty.clone(),
                        has_default: false,
                        variadic: param.variadic,
                        inout: param.inout,
                        autoclosure: param.autoclosure,
                        escaping: false,
                    })
                    .collect(),
                fn_ty.result.clone(),
                fn_ty.throws,
            ),
            _ => (Vec::new(), Type::Error, false),
        };
        Instance {
            params,
            result,
            throws,
            subst: Substitution::new(),
            generic_params: Vec::new(),
            target: CallTarget::Value,
        }
    }

    // -- Matching --

    fn match_args(&mut self, params: &[ParamDecl], args: &[ArgInfo<'_>]) -> MatchOutcome {
        let shapes = params.iter().map(ParamShape::from_decl).collect::<Vec<_>>();
        let arg_shapes = args.iter().map(ArgInfo::shape).collect::<Vec<_>>();
        let matched = match_arguments(&shapes, &arg_shapes);
        if matched.is_ok() {
            return MatchOutcome {
                matched,
                layout: ArgLayout::Normal,
                splat_rejected: None,
            };
        }

        // A single unlabeled tuple for several parameters.
        if let [only] = args {
            if only.label.is_none() && params.len() > 1 {
                let elems = only.ty.as_ref().map(|ty| self.shallow(ty));
                if let Some(Type::Tuple(elems)) = elems {
                    if elems.len() == params.len() {
                        return match self.compat {
                            CompatibilityMode::Swift3 => MatchOutcome {
                                matched: ArgMatch {
                                    bindings: vec![ParamBinding::Args(vec![0]); params.len()],
                                    errors: Vec::new(),
                                },
                                layout: ArgLayout::Splat,
                                splat_rejected: None,
                            },
                            CompatibilityMode::Swift4 => MatchOutcome {
                                matched,
                                layout: ArgLayout::Normal,
                                splat_rejected: Some(elems.len()),
                            },
                        };
                    }
                }
            }
        }

        // Several unlabeled arguments for one tuple parameter.
        if self.compat == CompatibilityMode::Swift3 {
            if let [param] = params {
                if let Type::Tuple(elems) = self.shallow(&param.ty) {
                    if elems.len() == args.len()
                        && args.len() > 1
                        && args.iter().all(|arg| arg.label.is_none())
                    {
                        return MatchOutcome {
                            matched: ArgMatch {
                                bindings: vec![ParamBinding::Args((0..args.len()).collect())],
                                errors: Vec::new(),
                            },
                            layout: ArgLayout::Implode,
                            splat_rejected: None,
                        };
                    }
                }
            }
        }
        MatchOutcome {
            matched,
            layout: ArgLayout::Normal,
            splat_rejected: None,
        }
    }

    /// Type an argument bound to `param` must convert to.
    fn arg_target(&self, param: &ParamDecl) -> Type {
        if param.autoclosure {
            if let Type::Function(fn_ty) = self.shallow(&param.ty) {
                return fn_ty.result.clone();
            }
        }
        param.ty.clone()
    }

    fn arg_relation(&mut self, arg: &ArgInfo<'_>, param: &ParamDecl) -> TypeRelation {
        let target = self.arg_target(param);
        match arg.deferred {
            Deferred::Completion => TypeRelation::Unknown,
            Deferred::Closure { params } => match self.shallow(&target) {
                Type::Function(fn_ty) if fn_ty.params.len() == params => {
                    TypeRelation::Identical
                }
                Type::Var(_) | Type::Error => TypeRelation::Unknown,
                _ => TypeRelation::Unrelated,
            },
            Deferred::ImplicitMember => {
                let Some(base) = self.implicit_member_base(Some(&target)) else {
                    return TypeRelation::Unknown;
                };
                let name = arg.member_name.as_deref();
                let found = match name {
                    Some("init") => !self.constructor_candidates(&base).is_empty(),
                    _ => !self
                        .member_candidates(&base, name, MemberAccess::Static)
                        .is_empty(),
                };
                if found {
                    TypeRelation::Identical
                } else {
                    TypeRelation::Unrelated
                }
            }
            Deferred::No => {
                let Some(actual) = &arg.ty else {
                    return TypeRelation::Unknown;
                };
                if param.inout {
                    return match self.shallow(actual) {
                        Type::InOut(inner) if self.unify(&inner, &target) => TypeRelation::Identical,
                        _ => TypeRelation::Unrelated,
                    };
                }
                if matches!(self.shallow(actual), Type::InOut(_)) {
                    return TypeRelation::Unrelated;
                }
                match self.coerce_types(actual, &target) {
                    Some((relation, _)) => relation,
                    None => TypeRelation::Unrelated,
                }
            }
        }
    }

    fn evaluate(&mut self, cand: &Cand, args: &[ArgInfo<'_>], expected: Option<&Type>) -> Evaluation {
        let snapshot = self.vars.clone();
        let inst = self.instantiate(cand);
        let outcome = self.match_args(&inst.params, args);
        let labels_ok = outcome.matched.is_ok();
        let mut worst = TypeRelation::Identical;
        let mut conversions = 0;
        let mut viable = labels_ok;
        if labels_ok {
            let mut pairs = Vec::new();
            for (index, binding) in outcome.matched.bindings.iter().enumerate() {
                if let ParamBinding::Args(bound) = binding {
                    for arg in bound {
                        pairs.push((*arg, index));
                    }
                }
            }
            // Context-independent arguments bind variables first.
            pairs.sort_by_key(|(arg, _)| (args[*arg].deferred != Deferred::No, *arg));
            for (arg, param) in pairs {
                let relation = match outcome.layout {
                    ArgLayout::Splat => self.splat_relation(&args[arg], param, &inst.params[param]),
                    ArgLayout::Implode => self.implode_relation(&args[arg], arg, &inst.params[param]),
                    ArgLayout::Normal => self.arg_relation(&args[arg], &inst.params[param]),
                };
                if relation >= TypeRelation::Unrelated {
                    viable = false;
                }
                if relation == TypeRelation::Convertible {
                    conversions += 1;
                }
                worst = worst.max(relation);
            }
        }
        let result = match expected {
            Some(expected) if viable => match self.coerce_types(&inst.result, expected) {
                Some((relation, _)) => relation,
                None => TypeRelation::Unrelated,
            },
            _ => TypeRelation::Identical,
        };
        if viable {
            if let Some(decl) = cand.decl {
                viable = self.check_requirements(decl, &inst, Span::default(), false);
            }
        }
        self.vars = snapshot;
        Evaluation {
            viable,
            labels_ok,
            score: Score {
                result,
                worst,
                conversions,
                generic: !inst.generic_params.is_empty(),
                origin: cand.origin,
            },
        }
    }

    fn splat_relation(&mut self, arg: &ArgInfo<'_>, index: usize, param: &ParamDecl) -> TypeRelation {
        let Some(Type::Tuple(elems)) = arg.ty.as_ref().map(|ty| self.shallow(ty)) else {
            return TypeRelation::Unrelated;
        };
        match elems.get(index) {
            Some(elem) if self.unify(&elem.ty, &param.ty) => TypeRelation::Identical,
            _ => TypeRelation::Unrelated,
        }
    }

    fn implode_relation(&mut self, arg: &ArgInfo<'_>, index: usize, param: &ParamDecl) -> TypeRelation {
        let Type::Tuple(elems) = self.shallow(&param.ty) else {
            return TypeRelation::Unrelated;
        };
        let (Some(elem), Some(actual)) = (elems.get(index), arg.ty.as_ref()) else {
            return TypeRelation::Unrelated;
        };
        match self.coerce_types(actual, &elem.ty) {
            Some(_) => TypeRelation::Convertible,
            None => TypeRelation::Unrelated,
        }
    }

    /// Picks the best candidate. The flag says whether applying it should
    /// report its own errors (false when a summary error was reported).
    pub(crate) fn choose(
        &mut self,
        name: &str,
        cands: &[Cand],
        args: &[ArgInfo<'_>],
        expected: Option<&Type>,
        span: Span,
    ) -> Option<(Cand, bool)> {
        match cands {
            [] => return None,
            [only] => return Some((only.clone(), true)),
            _ => {}
        }
        let evaluations = cands
            .iter()
            .map(|cand| self.evaluate(cand, args, expected))
            .collect::<Vec<_>>();
        let mut viable = evaluations
            .iter()
            .enumerate()
            .filter(|(_, eval)| eval.viable)
            .map(|(index, eval)| (eval.score, index))
            .collect::<Vec<_>>();
        viable.sort();
        let args_erroneous = args
            .iter()
            .any(|arg| arg.ty.as_ref().is_some_and(|ty| self.resolved(ty).contains_error()));
        match viable.as_slice() {
            [] => {
                if !args_erroneous {
                    let rendered = args
                        .iter()
                        .map(|arg| match &arg.ty {
                            Some(ty) => self.display(ty),
                            None => "_".to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.error(
                        TypeCheckErrorKind::NoMatchingOverload {
                            name: name.to_string(),
                            args: format!("({rendered})"),
                        },
                        span,
                    );
                }
                let fallback = evaluations
                    .iter()
                    .position(|eval| eval.labels_ok)
                    .unwrap_or(0);
                Some((cands[fallback].clone(), false))
            }
            [(best, index), rest @ ..] => {
                let tied = rest
                    .first()
                    .is_some_and(|(score, other)| score == best && cands[*other].decl != cands[*index].decl);
                if tied && !args_erroneous && self.completion_site.is_none() {
                    self.error(TypeCheckErrorKind::AmbiguousOverload(name.to_string()), span);
                }
                Some((cands[*index].clone(), true))
            }
        }
    }

    // -- Application --

    /// Applies the chosen candidate: binds arguments, checks deferred
    /// arguments in context and verifies generic requirements.
    pub(crate) fn apply_call(
        &mut self,
        cand: &Cand,
        args: &[ArgInfo<'_>],
        report: bool,
        span: Span,
    ) -> (Instance, CallInfo) {
        let errors_mark = self.errors.len();
        let inst = self.instantiate(cand);
        let outcome = self.match_args(&inst.params, args);
        if let Some(count) = outcome.splat_rejected {
            self.error(TypeCheckErrorKind::TupleSplatNotAllowed(count), span);
        } else {
            for label in &outcome.matched.errors {
                self.error(TypeCheckErrorKind::Label(label.clone()), span);
            }
        }

        // A rejected splat leaves its arguments unbound; they are only inferred.
        let mut bound_to = vec![None; args.len()];
        let bindings = match outcome.splat_rejected {
            Some(_) => &[][..],
            None => outcome.matched.bindings.as_slice(),
        };
        for (param, binding) in bindings.iter().enumerate() {
            if let ParamBinding::Args(bound) = binding {
                for arg in bound {
                    if let Some(slot) = bound_to.get_mut(*arg) {
                        *slot = Some(param);
                    }
                }
            }
        }

        // Context-independent arguments first, then deferred ones.
        let mut order = (0..args.len()).collect::<Vec<_>>();
        order.sort_by_key(|index| (args[*index].deferred != Deferred::No, *index));
        for index in order {
            let arg = &args[index];
            let Some(param_index) = bound_to[index] else {
                if let (Some(expr), None) = (arg.expr, &arg.ty) {
                    self.infer_expr(expr, None);
                }
                continue;
            };
            let param = &inst.params[param_index];
            match outcome.layout {
                ArgLayout::Splat => {
                    if let Some(Type::Tuple(elems)) = arg.ty.as_ref().map(|ty| self.shallow(ty)) {
                        if let Some(elem) = elems.get(param_index) {
                            if !self.unify(&elem.ty, &param.ty) {
                                let arg_span = arg.expr.map_or(span, |e| e.span);
                                self.mismatch(&param.ty, &elem.ty, arg_span);
                            }
                        }
                    }
                }
                ArgLayout::Implode => {
                    let position = outcome
                        .matched
                        .bindings
                        .first()
                        .and_then(|binding| match binding {
                            ParamBinding::Args(bound) => bound.iter().position(|a| *a == index),
                            ParamBinding::Default => None,
                        })
                        .unwrap_or(0);
                    if let Type::Tuple(elems) = self.shallow(&param.ty) {
                        if let Some(elem) = elems.get(position) {
                            let elem_param = ParamDecl {
                                ty: elem.ty.clone(),
                                ..param.clone()
                            };
                            self.bind_arg(arg, &elem_param, span);
                        }
                    }
                }
                ArgLayout::Normal => self.bind_arg(arg, param, span),
            }
        }

        if let Some(decl) = cand.decl {
            self.check_requirements(decl, &inst, span, true);
            if self.set.decl(decl).attrs.unavailable {
                let name = self.set.decl(decl).full_name();
                self.error(TypeCheckErrorKind::Unavailable(name), span);
            }
        }
        if inst.throws {
            self.check_throwing_call(span);
        }
        if !report {
            self.errors.truncate(errors_mark);
        }

        let info = CallInfo {
            target: inst.target,
            callee: cand.decl_ref(inst.subst.clone()),
            bindings: outcome.matched.bindings.clone(),
            layout: outcome.layout,
            throws: inst.throws,
            param_types: inst.params.iter().map(|param| param.ty.clone()).collect(),
            result: inst.result.clone(),
        };
        (inst, info)
    }

    fn bind_arg(&mut self, arg: &ArgInfo<'_>, param: &ParamDecl, span: Span) {
        let target = self.arg_target(param);
        let Some(expr) = arg.expr else {
            // Operands without an expression must match exactly.
            if let Some(actual) = &arg.ty {
                if !self.unify(actual, &target) {
                    self.mismatch(&target, actual, span);
                }
            }
            return;
        };
        match &arg.ty {
            None => {
                self.check_expr_with(expr, &target);
            }
            Some(actual) => {
                if param.inout {
                    match self.shallow(actual) {
                        Type::InOut(inner) => {
                            if !self.unify(&inner, &target) {
                                self.mismatch(&target, &inner, expr.span);
                            }
                        }
                        other => {
                            let expected = Type::InOut(Box::new(target.clone()));
                            self.mismatch(&expected, &other, expr.span);
                        }
                    }
                    return;
                }
                self.coerce_expr(expr, actual, &target);
            }
        }
    }

    /// Records conversions that make `expr` (of type `actual`) fit
    /// `expected`, or reports a mismatch.
    pub(crate) fn coerce_expr(&mut self, expr: &Expr, actual: &Type, expected: &Type) -> bool {
        match self.coerce_types(actual, expected) {
            Some((_, steps)) => {
                self.record_conversions(expr.id, steps);
                true
            }
            None => {
                self.mismatch(expected, actual, expr.span);
                false
            }
        }
    }

    pub(crate) fn check_throwing_call(&mut self, span: Span) {
        if self.try_depth == 0 {
            self.error(TypeCheckErrorKind::ThrowingCallWithoutTry, span);
        } else if !self.can_throw_here() {
            self.error(TypeCheckErrorKind::UnhandledThrow, span);
        }
    }

    pub(crate) fn can_throw_here(&self) -> bool {
        self.func()
            .is_some_and(|ctx| ctx.throws || ctx.catch_depth > 0 || ctx.kind == crate::core::typecheck::engine::BodyKind::TopLevel)
    }

    /// Checks the generic parameter bounds and `where` requirements of
    /// `decl` against the instance's bindings.
    pub(crate) fn check_requirements(
        &mut self,
        decl: DeclId,
        inst: &Instance,
        span: Span,
        report: bool,
    ) -> bool {
        let mut ok = true;
        let d = self.set.decl(decl);
        for param in &inst.generic_params {
            let Some(bound) = inst.subst.get(*param) else {
                continue;
            };
            let ty = self.resolved(bound);
            if ty.contains_vars() || ty.contains_error() {
                continue;
            }
            if let DeclKind::GenericParam {
                bounds, superclass, ..
            } = &self.set.decl(*param).kind
            {
                for proto in bounds {
                    if !self.conforms(&ty, *proto) {
                        ok = false;
                        if report {
                            self.report_nonconformance(&ty, *proto, span);
                        }
                    }
                }
                if let Some(superclass) = superclass {
                    let superclass = self.resolved(&inst.subst.apply(superclass));
                    if !self.set.is_subclass(&ty, &superclass) {
                        ok = false;
                        if report {
                            let text = format!(
                                "'{}' is not a subclass of '{}'",
                                self.display(&ty),
                                self.display(&superclass)
                            );
                            self.error(TypeCheckErrorKind::RequirementUnsatisfied(text), span);
                        }
                    }
                }
            }
        }
        for req in &d.generics.requirements {
            match req {
                Requirement::Conformance { subject, protocol } => {
                    let ty = self.resolved(&inst.subst.apply(subject));
                    if ty.contains_vars() || ty.contains_error() || ty.is_dependent() {
                        continue;
                    }
                    if !self.conforms(&ty, *protocol) {
                        ok = false;
                        if report {
                            self.report_nonconformance(&ty, *protocol, span);
                        }
                    }
                }
                Requirement::SameType { lhs, rhs } => {
                    let lhs = inst.subst.apply(lhs);
                    let rhs = inst.subst.apply(rhs);
                    if !self.unify(&lhs, &rhs) {
                        ok = false;
                        if report {
                            let text = format!(
                                "'{}' and '{}' must be the same type",
                                self.display(&lhs),
                                self.display(&rhs)
                            );
                            self.error(TypeCheckErrorKind::RequirementUnsatisfied(text), span);
                        }
                    }
                }
                Requirement::Superclass { subject, class } => {
                    let ty = self.resolved(&inst.subst.apply(subject));
                    let class = self.resolved(&inst.subst.apply(class));
                    if ty.contains_vars() || ty.is_dependent() {
                        continue;
                    }
                    if !self.set.is_subclass(&ty, &class) {
                        ok = false;
                        if report {
                            let text = format!(
                                "'{}' is not a subclass of '{}'",
                                self.display(&ty),
                                self.display(&class)
                            );
                            self.error(TypeCheckErrorKind::RequirementUnsatisfied(text), span);
                        }
                    }
                }
            }
        }
        ok
    }

    fn report_nonconformance(&mut self, ty: &Type, proto: DeclId, span: Span) {
        let kind = TypeCheckErrorKind::NonConformance {
            ty: self.display(ty),
            protocol: self.set.decl(proto).name.clone(),
        };
        self.error(kind, span);
    }

    // -- Calls --

    pub(crate) fn check_call(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        args: &[Arg],
        expected: Option<&Type>,
    ) -> Type {
        let infos = self.precheck_args(args);
        let Callee::Candidates { name, cands } = self.callee_candidates(callee, expected) else {
            for info in &infos {
                if let (Some(arg), None) = (info.expr, &info.ty) {
                    self.infer_expr(arg, None);
                }
            }
            return Type::Error;
        };
        if let Some(cursor) = infos.iter().position(|info| info.deferred == Deferred::Completion) {
            self.record_call_facts(&cands, &infos[..cursor], false, expected);
        }
        let Some((cand, report)) = self.choose(&name, &cands, &infos, expected, expr.span) else {
            return Type::Error;
        };
        let (inst, info) = self.apply_call(&cand, &infos, report, expr.span);
        self.check_mutating_call(&cand, callee);
        if let Some(decl_ref) = cand.decl_ref(inst.subst.clone()) {
            if !matches!(self.tables.refs.get(&callee.id), Some(ValueRef::Type(_))) {
                self.record_ref(callee.id, ValueRef::Decl(decl_ref));
                self.record(callee.id, &inst.fn_type());
            }
        }
        self.tables.calls.insert(expr.id, info);
        inst.result
    }

    pub(crate) fn check_subscript(&mut self, expr: &Expr, base: &Expr, args: &[Arg]) -> Type {
        let infos = self.precheck_args(args);
        let base_ty = self.infer_expr(base, None);
        let base_ty = self.shallow(&base_ty);
        if base_ty.is_error() {
            return Type::Error;
        }
        let cands = self.member_candidates(&base_ty, Some("subscript"), MemberAccess::Instance);
        if cands.is_empty() {
            self.report_missing_member(&base_ty, "subscript", expr.span);
            return Type::Error;
        }
        if let Some(cursor) = infos.iter().position(|info| info.deferred == Deferred::Completion) {
            self.record_call_facts(&cands, &infos[..cursor], true, None);
        }
        let Some((cand, report)) = self.choose("subscript", &cands, &infos, None, expr.span) else {
            return Type::Error;
        };
        let (inst, info) = self.apply_call(&cand, &infos, report, expr.span);
        if let Some(decl_ref) = cand.decl_ref(inst.subst.clone()) {
            self.record_ref(expr.id, ValueRef::Decl(decl_ref));
        }
        self.tables.calls.insert(expr.id, info);
        inst.result
    }

    /// Resolves an operator application among global operator functions
    /// and static operator members of the operand types.
    pub(crate) fn check_operator(
        &mut self,
        node: crate::core::tree::NodeId,
        name: &str,
        operands: Vec<ArgInfo<'_>>,
        expected: Option<&Type>,
        span: Span,
    ) -> Type {
        let arity = operands.len();
        let mut cands = Vec::new();
        for result in lookup_unqualified(self.set, None, Some(name)) {
            let decl = self.set.decl(result.decl);
            if let DeclKind::Func(sig) = &decl.kind {
                if sig.params.len() == arity {
                    cands.push(Cand::decl(result.decl, result.origin, None));
                }
            }
        }
        for operand in &operands {
            let Some(ty) = &operand.ty else { continue };
            let ty = self.shallow(ty);
            if matches!(ty, Type::Nominal { .. } | Type::GenericParam(_) | Type::Existential(_)) {
                for cand in self.member_candidates(&ty, Some(name), MemberAccess::Static) {
                    let is_match = cand.decl.is_some_and(|decl| {
                        matches!(&self.set.decl(decl).kind, DeclKind::Func(sig) if sig.params.len() == arity)
                    });
                    if is_match && !cands.iter().any(|c: &Cand| c.decl == cand.decl) {
                        cands.push(cand);
                    }
                }
            }
        }
        if cands.is_empty() {
            let rendered = operands
                .iter()
                .map(|operand| operand.ty.as_ref().map_or("_".to_string(), |ty| self.display(ty)))
                .collect::<Vec<_>>()
                .join(", ");
            if !operands
                .iter()
                .any(|operand| operand.ty.as_ref().is_some_and(|ty| self.resolved(ty).contains_error()))
            {
                self.error(
                    TypeCheckErrorKind::NoMatchingOverload {
                        name: name.to_string(),
                        args: format!("({rendered})"),
                    },
                    span,
                );
            }
            return Type::Error;
        }
        let Some((cand, report)) = self.choose(name, &cands, &operands, expected, span) else {
            return Type::Error;
        };
        let (inst, mut info) = self.apply_call(&cand, &operands, report, span);
        info.target = CallTarget::Operator;
        if let Some(decl_ref) = cand.decl_ref(inst.subst.clone()) {
            self.record_ref(node, ValueRef::Decl(decl_ref));
        }
        self.tables.calls.insert(node, info);
        inst.result
    }

    fn record_call_facts(
        &mut self,
        cands: &[Cand],
        before: &[ArgInfo<'_>],
        subscript: bool,
        expected: Option<&Type>,
    ) {
        let expected = expected.map(|ty| self.vars.resolve(ty));
        let snapshot = self.vars.clone();
        let candidates = cands
            .iter()
            .map(|cand| {
                let inst = self.instantiate(cand);
                CallCandidateFacts {
                    decl: cand.decl,
                    origin: cand.origin,
                    params: inst.params,
                    result: inst.result,
                }
            })
            .collect();
        self.vars = snapshot;
        let facts = CallFacts {
            candidates,
            args_before: before.iter().map(ArgInfo::shape).collect(),
            subscript,
            expected,
        };
        self.completion_facts().call = Some(facts);
    }

    /// Mutating methods need a mutable base.
    fn check_mutating_call(&mut self, cand: &Cand, callee: &Expr) {
        let Some(decl) = cand.decl else { return };
        let d = self.set.decl(decl);
        if !d.mutating || d.is_static {
            return;
        }
        if cand.base.as_ref().is_some_and(|base| self.set.is_class_type(base)) {
            return;
        }
        let mutable = match &callee.kind {
            ExprKind::Member { base, .. } => self.is_mutable(base),
            ExprKind::Ident(_) => self.func().is_some_and(|ctx| ctx.self_mutable),
            _ => true,
        };
        if !mutable {
            self.error(TypeCheckErrorKind::MutatingOnImmutable(d.name.clone()), callee.span);
        }
    }

    /// Function type of a member used as a value (not called).
    pub(crate) fn member_value_type(&mut self, cand: &Cand) -> (Type, Substitution) {
        let inst = self.instantiate(cand);
        let Some(decl) = cand.decl else {
            return (cand.value_type.clone().unwrap_or(Type::Error), inst.subst);
        };
        let ty = match &self.set.decl(decl).kind {
            DeclKind::Var(info) => self.set.normalize(&inst.subst.apply(&info.ty)),
            DeclKind::EnumElement { payload: None, .. } => inst.result.clone(),
            DeclKind::Func(_) | DeclKind::EnumElement { .. } | DeclKind::Constructor { .. } => {
                Type::function(
                    inst.params.iter().map(ParamDecl::fn_param).collect(),
                    inst.result.clone(),
                    inst.throws,
                )
            }
            _ => Type::Error,
        };
        (ty, inst.subst)
    }
}

/// Unlabeled function parameters for a closure type.
pub(crate) fn plain_params(types: Vec<Type>) -> Vec<FnParam> {
    types.into_iter().map(FnParam::plain).collect()
}
