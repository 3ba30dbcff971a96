//! Calls: argument evaluation, callee resolution and `apply`.
//!
//! Arguments are evaluated in source order into managed values, then passed
//! by the callee's interface conventions. Requirements of protocols are
//! called through the witness table of the base; members of existentials
//! open the existential first.

use crate::core::diag::Span;
use crate::core::ir::{ApplyArg, Convention, InstKind, LoadQualifier, Ownership, SigParam, StoreQualifier, Terminator, ValueId};
use crate::core::lower::errors::LowerErrorKind;
use crate::core::lower::func::{FuncLowerer, LowerResult, Managed, SelfSlot};
use crate::core::lower::names::{
    accessor_symbol, constructor_symbol, decl_symbol, default_arg_symbol, initializer_symbol,
};
use crate::core::lower::place::{Access, Place};
use crate::core::lower::stmt::strip_parens;
use crate::core::lower::types::{Abstraction, ParamAbstraction};
use crate::core::resolve::{AccessorKind, DeclId, DeclKind, ParamBinding};
use crate::core::tree::{Arg, Expr, ExprKind};
use crate::core::typecheck::{ArgLayout, CallInfo, CallTarget, DeclRef};
use crate::core::types::{FnType, Substitution, Type};

/// Where an argument comes from: an expression to evaluate, or a value the
/// caller already holds.
#[derive(Debug, Clone)]
pub(super) enum ArgSource<'a> {
    Expr(&'a Expr),
    Value(Managed, Type),
}

/// Base a member is accessed on.
#[derive(Debug, Clone, Copy)]
pub(super) enum CallBase<'a> {
    None,
    /// The body's own `self` (including `super`).
    Implicit,
    Expr(&'a Expr),
    Value(Managed),
}

/// `self` argument of a member call, once evaluated.
#[derive(Debug, Clone, Copy)]
pub(super) enum SelfAccess {
    None,
    Value(Managed),
    Addr(ValueId),
    Metatype(ValueId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EntryPoint {
    Decl,
    /// Initializing entry of a class constructor.
    Initializer,
    Accessor(AccessorKind),
}

pub(super) struct PreparedCall {
    pub(super) callee: ValueId,
    pub(super) abs: Abstraction,
    pub(super) subst: Option<Substitution>,
    pub(super) leading: Vec<ValueId>,
    pub(super) formals: Vec<ValueId>,
    pub(super) captures: Vec<ApplyArg>,
    pub(super) self_arg: Option<ValueId>,
}

#[derive(Default)]
pub(super) struct LoweredArgs {
    pub(super) values: Vec<(Managed, Type)>,
    /// `inout` arguments whose writebacks run after the call.
    pub(super) places: Vec<Place>,
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    pub(super) fn lower_call(&mut self, expr: &'a Expr, callee: &'a Expr, args: &'a [Arg]) -> LowerResult<Managed> {
        let tables = self.cx.tables;
        let span = expr.span;
        let Some(info) = tables.calls.get(&expr.id) else {
            return Err(self.error(LowerErrorKind::MissingType, span));
        };
        let sources = args.iter().map(|arg| ArgSource::Expr(&arg.expr)).collect::<Vec<_>>();
        match info.target {
            CallTarget::Value => self.lower_value_call(info, callee, sources, span),
            CallTarget::Dynamic => self.lower_dynamic_call(info, callee, sources, span),
            CallTarget::EnumElement => {
                let Some(element) = &info.callee else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                let args = self.lower_params(info, sources, &[], None, None, span)?;
                let ty = info.result.clone();
                let subst = self.cx.set.substitution_for(&ty);
                let payload_ty = self.element_payload_type(element.decl, &subst);
                let mut values = args.values;
                let payload = match (values.len(), payload_ty) {
                    (0, _) | (_, None) => None,
                    (1, Some(payload_ty)) => values.pop().map(|(m, _)| (m, payload_ty)),
                    (_, Some(payload_ty)) => Some((self.build_tuple(values, &payload_ty), payload_ty)),
                };
                let result = self.construct_enum(element.decl, &ty, payload)?;
                self.end_places(args.places)?;
                Ok(result)
            }
            CallTarget::Constructor => {
                let Some(ctor) = &info.callee else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                if let ExprKind::Member { base, .. } = &strip_parens(callee).kind {
                    let delegating = match base.kind {
                        ExprKind::SuperRef => Some(true),
                        ExprKind::SelfRef => Some(false),
                        _ => None,
                    };
                    if let (Some(via_super), true) = (delegating, self.in_init) {
                        self.lower_init_delegation(info, ctor, via_super, sources, span)?;
                        return Ok(Managed::value(self.b.unit()));
                    }
                }
                self.lower_decl_call(info, ctor, CallBase::None, sources, span)
            }
            CallTarget::Function | CallTarget::Operator => {
                let Some(decl_ref) = &info.callee else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                let base = match &strip_parens(callee).kind {
                    ExprKind::Member { base, .. } if !matches!(base.kind, ExprKind::SuperRef) => CallBase::Expr(base),
                    ExprKind::Member { .. } => CallBase::Implicit,
                    _ if decl_ref.implicit_self => CallBase::Implicit,
                    _ => CallBase::None,
                };
                self.lower_decl_call(info, decl_ref, base, sources, span)
            }
        }
    }

    /// Prefix, infix and `~=` operators, and compound assignments.
    pub(super) fn lower_operator_call(
        &mut self,
        info: &CallInfo,
        sources: Vec<ArgSource<'a>>,
        span: Span,
    ) -> LowerResult<Managed> {
        let Some(decl_ref) = &info.callee else {
            return Err(self.error(LowerErrorKind::MissingType, span));
        };
        self.lower_decl_call(info, decl_ref, CallBase::None, sources, span)
    }

    /// Calls constructor `ctor` of `ty` with arguments already lowered, one
    /// per parameter.
    pub(super) fn construct(&mut self, ctor: DeclId, ty: &Type, args: Vec<(Managed, Type)>, span: Span) -> LowerResult<Managed> {
        let set = self.cx.set;
        let decl_ref = DeclRef {
            decl: ctor,
            subst: set.substitution_for(ty),
            base: Some(ty.clone()),
            origin: crate::core::resolve::LookupOrigin::CurrNominal,
            implicit_self: false,
            via_super: false,
        };
        let info = CallInfo {
            target: CallTarget::Constructor,
            callee: Some(decl_ref.clone()),
            bindings: (0..args.len()).map(|index| ParamBinding::Args(vec![index])).collect(),
            layout: ArgLayout::Normal,
            throws: false,
            param_types: args.iter().map(|(_, ty)| ty.clone()).collect(),
            result: ty.clone(),
        };
        let sources = args.into_iter().map(|(m, ty)| ArgSource::Value(m, ty)).collect();
        self.lower_decl_call(&info, &decl_ref, CallBase::None, sources, span)
    }

    // -- Declarations --

    fn lower_decl_call(
        &mut self,
        info: &CallInfo,
        decl_ref: &DeclRef,
        base: CallBase<'a>,
        sources: Vec<ArgSource<'a>>,
        span: Span,
    ) -> LowerResult<Managed> {
        let set = self.cx.set;
        let d = set.decl(decl_ref.decl);
        if let Some(name) = &d.attrs.builtin {
            let args = self.lower_params(info, sources, &[], None, None, span)?;
            let result = self.lower_builtin(name, &args.values, &info.result);
            self.end_places(args.places)?;
            return Ok(result);
        }

        let mark = self.env.mark();
        let result = self.lower_decl_call_in_env(info, decl_ref, base, sources, span);
        self.env.reset(mark);
        result
    }

    fn lower_decl_call_in_env(
        &mut self,
        info: &CallInfo,
        decl_ref: &DeclRef,
        base: CallBase<'a>,
        sources: Vec<ArgSource<'a>>,
        span: Span,
    ) -> LowerResult<Managed> {
        let decl = decl_ref.decl;
        let (access, self_ty, base_place) = self.call_self(decl_ref, base, span)?;
        let access = match &self_ty {
            Some(ty) => self.open_if_existential(decl, access, ty),
            None => access,
        };
        let (capture_params, captures) = if self.is_local_function(decl) {
            self.local_function_captures(decl, span)?
        } else {
            (Vec::new(), Vec::new())
        };
        let (callee, abs, subst) =
            self.callee_value(decl, EntryPoint::Decl, &decl_ref.subst, self_ty.as_ref(), &capture_params, span)?;
        let leading = self.generic_args(&abs, &subst, span)?;
        let args = self.lower_params(info, sources, &abs.params, Some(&subst), Some((decl, &subst)), span)?;
        let formals = self.pass_params(&args.values, &abs.params);
        let self_arg = match (&abs.self_param, &self_ty) {
            (Some(param), Some(ty)) => Some(self.self_operand(access, param.convention, ty, span)?),
            _ => None,
        };
        let result = self.emit_apply(
            PreparedCall {
                callee,
                abs,
                subst: Some(subst),
                leading,
                formals,
                captures,
                self_arg,
            },
            span,
        )?;
        // Argument writebacks run before the base's, which may still need
        // an opened existential.
        let mut places = base_place.into_iter().collect::<Vec<_>>();
        places.extend(args.places);
        self.end_places(places)?;
        Ok(result)
    }

    /// Evaluates the base of a member call into the access its `self`
    /// parameter needs.
    pub(super) fn call_self(
        &mut self,
        decl_ref: &DeclRef,
        base: CallBase<'a>,
        span: Span,
    ) -> LowerResult<(SelfAccess, Option<Type>, Option<Place>)> {
        let set = self.cx.set;
        let types = self.cx.types;
        let d = set.decl(decl_ref.decl);
        let storage = match &d.kind {
            DeclKind::Accessor { storage, .. } => set.decl(*storage),
            _ => d,
        };
        let Some(context_self) = types.self_type_of(decl_ref.decl) else {
            return Ok((SelfAccess::None, None, None));
        };
        let instance_ty = decl_ref
            .base
            .clone()
            .or_else(|| self.self_ty.clone())
            .unwrap_or(context_self);
        if storage.is_static || matches!(d.kind, DeclKind::Constructor { .. }) {
            let metadata = self.metadata_for(&instance_ty);
            return Ok((SelfAccess::Metatype(metadata), Some(instance_ty), None));
        }
        match base {
            CallBase::Expr(expr) => {
                let mutating = d.mutating && !set.is_class_type(&instance_ty);
                if mutating {
                    let place = self.lower_place(expr, Access::Modify)?;
                    Ok((SelfAccess::Addr(place.addr), Some(instance_ty), Some(place)))
                } else {
                    let m = self.lower_expr(expr)?;
                    Ok((SelfAccess::Value(m), Some(instance_ty), None))
                }
            }
            CallBase::Value(m) => Ok((SelfAccess::Value(m), Some(instance_ty), None)),
            CallBase::Implicit | CallBase::None => {
                let access = self.self_access(span)?;
                Ok((access, Some(instance_ty), None))
            }
        }
    }

    pub(super) fn self_access(&self, span: Span) -> LowerResult<SelfAccess> {
        match self.self_slot {
            Some(SelfSlot::Value(value)) => Ok(SelfAccess::Value(Managed::value(value))),
            Some(SelfSlot::Addr(addr)) => Ok(SelfAccess::Addr(addr)),
            Some(SelfSlot::Metatype(value)) => Ok(SelfAccess::Metatype(value)),
            None => Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span)),
        }
    }

    /// Protocol whose requirement or extension member `decl` is.
    pub(super) fn member_protocol(&self, decl: DeclId) -> Option<DeclId> {
        let set = self.cx.set;
        let d = set.decl(decl);
        let parent = match &d.kind {
            DeclKind::Accessor { storage, .. } => set.decl(*storage).parent?,
            _ => d.parent?,
        };
        match &set.decl(parent).kind {
            DeclKind::Protocol(_) => Some(parent),
            DeclKind::Extension(info) => info.extended.filter(|extended| set.decl(*extended).is_protocol()),
            _ => None,
        }
    }

    fn is_requirement(&self, decl: DeclId) -> bool {
        let set = self.cx.set;
        let d = set.decl(decl);
        let parent = match &d.kind {
            DeclKind::Accessor { storage, .. } => set.decl(*storage).parent,
            _ => d.parent,
        };
        parent.is_some_and(|parent| set.decl(parent).is_protocol())
    }

    /// Opens an existential base for a protocol member, binding its
    /// metadata and witness table in the environment.
    pub(super) fn open_if_existential(&mut self, decl: DeclId, access: SelfAccess, ty: &Type) -> SelfAccess {
        let Type::Existential(_) = ty else {
            return access;
        };
        let Some(proto) = self.member_protocol(decl) else {
            return access;
        };
        let addr = match access {
            SelfAccess::Addr(addr) => addr,
            SelfAccess::Value(m) => self.to_addr(m, ty),
            SelfAccess::None | SelfAccess::Metatype(_) => return access,
        };
        let types = self.cx.types;
        let opened_ir = crate::core::ir::IrType::address(format!("@opened {}", types.type_name(ty)));
        let opened = self
            .b
            .emit_value(InstKind::OpenExistentialAddr { addr }, opened_ir, Ownership::Trivial);
        let metadata = self.b.emit_value(
            InstKind::ExistentialMetatype { opened },
            types.metatype(ty),
            Ownership::Trivial,
        );
        let table = self.b.emit_value(
            InstKind::ExistentialWitnessTable {
                opened,
                protocol: self.cx.set.decl(proto).name.clone(),
            },
            types.witness_table(ty, proto),
            Ownership::Trivial,
        );
        self.env.metadata.push((ty.clone(), metadata));
        self.env.tables.push((ty.clone(), proto, table));
        SelfAccess::Addr(opened)
    }

    /// Callee value of an entry point, its abstraction and the
    /// substitution to call it with.
    pub(super) fn callee_value(
        &mut self,
        decl: DeclId,
        entry: EntryPoint,
        subst: &Substitution,
        self_ty: Option<&Type>,
        captures: &[SigParam],
        span: Span,
    ) -> LowerResult<(ValueId, Abstraction, Substitution)> {
        let set = self.cx.set;
        let types = self.cx.types;
        let abs = match entry {
            EntryPoint::Decl => types.decl_abstraction(decl),
            EntryPoint::Initializer => types.initializer_abstraction(decl),
            EntryPoint::Accessor(kind) => types.accessor_abstraction(decl, kind),
        };
        let mut subst = subst.clone();
        let proto = self.member_protocol(decl);
        if let (Some(proto), Some(self_ty)) = (proto, self_ty) {
            if let DeclKind::Protocol(info) = &set.decl(proto).kind {
                if subst.get(info.self_param).is_none() {
                    subst.insert(info.self_param, self_ty.clone());
                }
            }
        }
        let symbol = match entry {
            EntryPoint::Decl if matches!(set.decl(decl).kind, DeclKind::Constructor { .. }) => {
                constructor_symbol(set, decl)
            }
            EntryPoint::Decl => decl_symbol(set, decl),
            EntryPoint::Initializer => initializer_symbol(set, decl),
            EntryPoint::Accessor(kind) => accessor_symbol(set, decl, kind.suffix()),
        };
        if self.is_requirement(decl) {
            let (Some(proto), Some(self_ty)) = (proto, self_ty) else {
                return Err(self.unsupported("a requirement without a base", span));
            };
            let table = self.table_for(self_ty, proto, span)?;
            let sig = types.signature(&abs, Some(&subst), &[]);
            let callee = self.b.emit_value(
                InstKind::WitnessMethod {
                    lookup: types.conformance_name(self_ty, proto),
                    member: symbol,
                    table,
                },
                types.function_ref_type(&sig),
                Ownership::Trivial,
            );
            return Ok((callee, abs, subst));
        }
        let sig = types.signature(&abs, None, captures);
        let callee = self.b.function_ref(&symbol, types.function_ref_type(&sig));
        Ok((callee, abs, subst))
    }

    pub(super) fn self_operand(
        &mut self,
        access: SelfAccess,
        convention: Convention,
        ty: &Type,
        span: Span,
    ) -> LowerResult<ValueId> {
        Ok(match access {
            SelfAccess::Metatype(metadata) => metadata,
            SelfAccess::Addr(addr) => match convention {
                Convention::Inout | Convention::InoutAliasable | Convention::InGuaranteed => addr,
                _ => self.pass_arg(Managed::addr(addr), ty, convention),
            },
            SelfAccess::Value(m) => self.pass_arg(m, ty, convention),
            SelfAccess::None => {
                return Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span));
            }
        })
    }

    /// `super.init(...)` and `self.init(...)` inside an initializer.
    fn lower_init_delegation(
        &mut self,
        info: &CallInfo,
        ctor_ref: &DeclRef,
        via_super: bool,
        sources: Vec<ArgSource<'a>>,
        span: Span,
    ) -> LowerResult<()> {
        let set = self.cx.set;
        let types = self.cx.types;
        if matches!(set.decl(ctor_ref.decl).kind, DeclKind::Constructor { failable: true, .. }) {
            return Err(self.unsupported("delegation to a failable initializer", span));
        }
        let (Some(SelfSlot::Addr(slot)), Some(self_ty)) = (self.self_slot, self.self_ty.clone()) else {
            return Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span));
        };
        if !self.self_is_class() {
            let m = self.lower_decl_call(info, ctor_ref, CallBase::None, sources, span)?;
            self.store_into(m, &self_ty, slot, true);
            return Ok(());
        }

        let target_ty = if via_super {
            ctor_ref
                .base
                .clone()
                .or_else(|| set.superclass_of(&self_ty))
                .unwrap_or(Type::Error)
        } else {
            self_ty.clone()
        };
        let mark = self.env.mark();
        let (callee, abs, subst) =
            self.callee_value(ctor_ref.decl, EntryPoint::Initializer, &ctor_ref.subst, Some(&target_ty), &[], span)?;
        let leading = self.generic_args(&abs, &subst, span)?;
        let args = self.lower_params(info, sources, &abs.params, Some(&subst), Some((ctor_ref.decl, &subst)), span)?;
        let formals = self.pass_params(&args.values, &abs.params);
        let object = self.b.load(slot, LoadQualifier::Take);
        let object = if via_super {
            let ir = self.ir(&target_ty);
            self.b
                .emit_value(InstKind::Upcast { value: object, ty: ir.clone() }, ir, Ownership::Owned)
        } else {
            object
        };
        let result = self.emit_apply(
            PreparedCall {
                callee,
                abs,
                subst: Some(subst),
                leading,
                formals,
                captures: Vec::new(),
                self_arg: Some(object),
            },
            span,
        );
        self.env.reset(mark);
        let value = self.owned(result?, &target_ty);
        let value = if via_super {
            let ir = types.ir_type(&self_ty);
            self.b
                .emit_value(InstKind::UncheckedRefCast { value, ty: ir.clone() }, ir, Ownership::Owned)
        } else {
            value
        };
        self.b.store(value, slot, StoreQualifier::Init);
        self.end_places(args.places)
    }

    // -- Other callees --

    fn lower_value_call(
        &mut self,
        info: &CallInfo,
        callee: &'a Expr,
        sources: Vec<ArgSource<'a>>,
        span: Span,
    ) -> LowerResult<Managed> {
        let types = self.cx.types;
        let callee_ty = self.cx.tables.converted_type_of(callee.id);
        let Some(fn_ty) = callee_ty.as_function().cloned() else {
            return Err(self.unsupported("a call of a non-function value", span));
        };
        let abs = types.fn_abstraction(&fn_ty);
        let m = self.lower_expr(callee)?;
        let callee = self.borrow(m, &callee_ty);
        let args = self.lower_params(info, sources, &abs.params, None, None, span)?;
        let formals = self.pass_params(&args.values, &abs.params);
        let result = self.emit_apply(
            PreparedCall {
                callee,
                abs,
                subst: None,
                leading: Vec::new(),
                formals,
                captures: Vec::new(),
                self_arg: None,
            },
            span,
        )?;
        self.end_places(args.places)?;
        Ok(result)
    }

    /// `AnyObject` method call, looked up by name at run time.
    fn lower_dynamic_call(
        &mut self,
        info: &CallInfo,
        callee: &'a Expr,
        sources: Vec<ArgSource<'a>>,
        span: Span,
    ) -> LowerResult<Managed> {
        let set = self.cx.set;
        let types = self.cx.types;
        let (Some(decl_ref), ExprKind::Member { base, .. }) = (&info.callee, &strip_parens(callee).kind) else {
            return Err(self.unsupported("a dynamic call without a member", span));
        };
        let abs = types.decl_abstraction(decl_ref.decl);
        if abs.is_generic() {
            return Err(self.unsupported("a dynamic call of a generic method", span));
        }
        let object_ty = Type::AnyObject;
        let m = self.lower_expr(base)?;
        let object = self.borrow(m, &object_ty);
        let sig = types.signature(&abs, None, &[]);
        let method = self.b.emit_value(
            InstKind::DynamicMethod {
                object,
                member: decl_symbol(set, decl_ref.decl),
            },
            types.function_ref_type(&sig),
            Ownership::Trivial,
        );
        let args = self.lower_params(info, sources, &abs.params, None, None, span)?;
        let formals = self.pass_params(&args.values, &abs.params);
        let self_arg = abs.self_param.as_ref().map(|_| object);
        let result = self.emit_apply(
            PreparedCall {
                callee: method,
                abs,
                subst: None,
                leading: Vec::new(),
                formals,
                captures: Vec::new(),
                self_arg,
            },
            span,
        )?;
        self.end_places(args.places)?;
        Ok(result)
    }

    pub(super) fn lower_builtin(&mut self, name: &str, values: &[(Managed, Type)], result: &Type) -> Managed {
        let args = values.iter().map(|(m, ty)| self.borrow(*m, ty)).collect::<Vec<_>>();
        let ir = self.ir(result);
        let ownership = self.cx.types.ownership(result);
        let value = self.b.emit_value(
            InstKind::Builtin {
                name: name.to_string(),
                args,
            },
            ir,
            ownership,
        );
        self.manage(value)
    }

    // -- Arguments --

    /// Evaluates the arguments of a call, one value per parameter.
    pub(super) fn lower_params(
        &mut self,
        info: &CallInfo,
        sources: Vec<ArgSource<'a>>,
        params: &[ParamAbstraction],
        subst: Option<&Substitution>,
        defaults: Option<(DeclId, &Substitution)>,
        span: Span,
    ) -> LowerResult<LoweredArgs> {
        let mut lowered = LoweredArgs::default();
        let param_ty = |index: usize| {
            info.param_types
                .get(index)
                .map(|ty| ty.without_inout().clone())
                .unwrap_or(Type::Error)
        };
        match info.layout {
            ArgLayout::Splat => {
                let Some(source) = sources.into_iter().next() else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                let (m, ty) = match source {
                    ArgSource::Value(m, ty) => (m, ty),
                    ArgSource::Expr(expr) => (self.lower_expr(expr)?, self.cx.tables.converted_type_of(expr.id)),
                };
                for index in 0..info.param_types.len() {
                    let elem = self.project_tuple(m, &ty, index, span)?;
                    lowered.values.push((elem, param_ty(index)));
                }
            }
            ArgLayout::Implode => {
                let ty = param_ty(0);
                let Type::Tuple(elem_tys) = &ty else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                let mut elems = Vec::with_capacity(elem_tys.len());
                for (source, elem) in sources.into_iter().zip(elem_tys) {
                    let m = self.lower_source(source, None, subst, &mut lowered.places)?;
                    elems.push((m, elem.ty.clone()));
                }
                let tuple = self.build_tuple(elems, &ty);
                lowered.values.push((tuple, ty));
            }
            ArgLayout::Normal => {
                let mut sources = sources.into_iter().map(Some).collect::<Vec<_>>();
                for (index, binding) in info.bindings.iter().enumerate() {
                    let ty = param_ty(index);
                    let param = params.get(index);
                    match binding {
                        ParamBinding::Default => {
                            let Some((callee, callee_subst)) = defaults else {
                                return Err(self.unsupported("a default argument of a function value", span));
                            };
                            let m = self.default_arg(callee, index, callee_subst, span)?;
                            lowered.values.push((m, ty));
                        }
                        ParamBinding::Args(indices) if param.is_some_and(|param| param.variadic) => {
                            let mut elems = Vec::with_capacity(indices.len());
                            for arg in indices {
                                let Some(source) = sources.get_mut(*arg).and_then(Option::take) else {
                                    continue;
                                };
                                let m = self.lower_source(source, None, subst, &mut lowered.places)?;
                                let elem = if self.is_address_only(&ty) {
                                    self.to_addr(m, &ty)
                                } else {
                                    self.borrow(m, &ty)
                                };
                                elems.push(elem);
                            }
                            let ir = self.cx.types.variadic_type(&ty);
                            let array = self.b.emit_value(
                                InstKind::Builtin {
                                    name: "make_array".to_string(),
                                    args: elems,
                                },
                                ir,
                                Ownership::Owned,
                            );
                            let array = self.manage(array);
                            lowered.values.push((array, ty));
                        }
                        ParamBinding::Args(indices) => {
                            let Some(source) = indices
                                .first()
                                .and_then(|arg| sources.get_mut(*arg))
                                .and_then(Option::take)
                            else {
                                return Err(self.error(LowerErrorKind::MissingType, span));
                            };
                            let m = self.lower_source(source, param, subst, &mut lowered.places)?;
                            lowered.values.push((m, ty));
                        }
                    }
                }
            }
        }
        Ok(lowered)
    }

    fn lower_source(
        &mut self,
        source: ArgSource<'a>,
        param: Option<&ParamAbstraction>,
        subst: Option<&Substitution>,
        places: &mut Vec<Place>,
    ) -> LowerResult<Managed> {
        let expr = match source {
            ArgSource::Value(m, _) => return Ok(m),
            ArgSource::Expr(expr) => expr,
        };
        let bare = strip_parens(expr);
        if let ExprKind::InOut(inner) = &bare.kind {
            let place = self.lower_place(inner, Access::Modify)?;
            let addr = place.addr;
            places.push(place);
            return Ok(Managed::addr(addr));
        }
        if let Some(interface) = param.and_then(|param| param.ty.as_function()) {
            if self.cx.captures.is_autoclosure(expr.id) {
                return self.lower_autoclosure(expr, interface, subst);
            }
            if let ExprKind::Closure(closure) = &bare.kind {
                if self.cx.tables.conversions_of(expr.id).is_empty() {
                    return self.lower_closure(bare, closure, Some((interface, subst)));
                }
            }
            self.check_reabstraction(interface, subst, expr.span)?;
        }
        self.lower_expr(expr)
    }

    /// Function values are passed as they are, so the callee's interface
    /// must use the conventions of the substituted type.
    fn check_reabstraction(&self, interface: &FnType, subst: Option<&Substitution>, span: Span) -> LowerResult<()> {
        let Some(subst) = subst else {
            return Ok(());
        };
        let types = self.cx.types;
        let interface_ty = Type::Function(Box::new(interface.clone()));
        let Type::Function(concrete) = types.apply(&interface_ty, Some(subst)) else {
            return Ok(());
        };
        let formal = types.fn_abstraction(interface);
        let actual = types.fn_abstraction(&concrete);
        let same = formal.result_convention == actual.result_convention
            && formal
                .params
                .iter()
                .zip(&actual.params)
                .all(|(a, b)| a.convention == b.convention);
        if same {
            Ok(())
        } else {
            Err(self.error(LowerErrorKind::Reabstraction(types.type_name(&interface_ty)), span))
        }
    }

    fn default_arg(&mut self, callee: DeclId, index: usize, subst: &Substitution, span: Span) -> LowerResult<Managed> {
        let set = self.cx.set;
        let types = self.cx.types;
        let abs = types.default_arg_abstraction(callee, index);
        let leading = self.generic_args(&abs, subst, span)?;
        let sig = types.signature(&abs, None, &[]);
        let func = self
            .b
            .function_ref(&default_arg_symbol(set, callee, index), types.function_ref_type(&sig));
        self.emit_apply(
            PreparedCall {
                callee: func,
                abs,
                subst: Some(subst.clone()),
                leading,
                formals: Vec::new(),
                captures: Vec::new(),
                self_arg: None,
            },
            span,
        )
    }

    pub(super) fn pass_params(&mut self, values: &[(Managed, Type)], params: &[ParamAbstraction]) -> Vec<ValueId> {
        values
            .iter()
            .zip(params)
            .map(|((m, ty), param)| self.pass_arg(*m, ty, param.convention))
            .collect()
    }

    pub(super) fn pass_arg(&mut self, m: Managed, ty: &Type, convention: Convention) -> ValueId {
        match convention {
            Convention::Trivial | Convention::Guaranteed => self.borrow(m, ty),
            Convention::Owned => self.owned(m, ty),
            Convention::InGuaranteed => self.to_addr(m, ty),
            Convention::In => self.take_into_temp(m, ty),
            Convention::Inout | Convention::InoutAliasable | Convention::Out => match m {
                Managed::Addr { addr, .. } => addr,
                Managed::Value { .. } => self.to_addr(m, ty),
            },
        }
    }

    pub(super) fn end_places(&mut self, places: Vec<Place>) -> LowerResult<()> {
        for place in places.into_iter().rev() {
            self.end_place(place)?;
        }
        Ok(())
    }

    // -- Apply --

    pub(super) fn emit_apply(&mut self, call: PreparedCall, span: Span) -> LowerResult<Managed> {
        let types = self.cx.types;
        let result_ty = types.apply(&call.abs.result, call.subst.as_ref());
        let mut args = Vec::new();
        let out = if call.abs.indirect_result() {
            let temp = self.alloc_temp(&result_ty, None);
            args.push(ApplyArg {
                value: temp,
                convention: Convention::Out,
            });
            Some(temp)
        } else {
            None
        };
        args.extend(call.leading.iter().map(|value| ApplyArg {
            value: *value,
            convention: Convention::Trivial,
        }));
        args.extend(call.formals.iter().zip(&call.abs.params).map(|(value, param)| ApplyArg {
            value: *value,
            convention: param.convention,
        }));
        args.extend(call.captures);
        if let (Some(value), Some(param)) = (call.self_arg, &call.abs.self_param) {
            args.push(ApplyArg {
                value,
                convention: param.convention,
            });
        }
        let (result_ir, ownership) = match out {
            Some(_) => (crate::core::ir::IrType::unit(), Ownership::Trivial),
            None => (types.ir_type(&result_ty), types.ownership(&result_ty)),
        };

        let value = if call.abs.throws {
            let normal = self.b.add_block();
            let error_bb = self.b.add_block();
            let value = self.b.add_block_param(normal, result_ir, ownership);
            let error_ty = self.cx.set.error_existential();
            let error_ir = self.ir(&error_ty);
            let error = self.b.add_block_param(error_bb, error_ir, Ownership::Owned);
            self.b.terminate(Terminator::TryApply {
                callee: call.callee,
                args,
                normal,
                error: error_bb,
            });
            let saved = self.save_cleanups();
            self.b.switch_to(error_bb);
            self.emit_throw(error, span)?;
            self.restore_cleanups(saved);
            self.b.switch_to(normal);
            value
        } else {
            self.b.emit_value(
                InstKind::Apply {
                    callee: call.callee,
                    args,
                },
                result_ir,
                ownership,
            )
        };
        Ok(match out {
            Some(temp) => self.manage_temp(temp, &result_ty),
            None => self.manage(value),
        })
    }
}
