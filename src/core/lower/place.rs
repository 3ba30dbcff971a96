//! Storage access: reads of properties and subscripts, and places for
//! assignment and `inout`.
//!
//! A place is an address valid until `end_place`. Stored properties give
//! the field's own address. Computed, observed and requirement storage is
//! accessed through a temporary: the getter fills it (unless the place is
//! only assigned) and the setter writes it back when the place ends, innermost
//! component first.

use crate::core::diag::Span;
use crate::core::ir::{InstKind, Ownership, SwitchCase, Terminator, ValueId};
use crate::core::lower::calls::{ArgSource, CallBase, EntryPoint, PreparedCall, SelfAccess};
use crate::core::lower::errors::LowerErrorKind;
use crate::core::lower::func::{Exit, FuncLowerer, LocalSlot, LowerResult, Managed, SelfSlot};
use crate::core::lower::names::decl_symbol;
use crate::core::lower::stmt::strip_parens;
use crate::core::resolve::{AccessorKind, DeclId, DeclKind, Storage};
use crate::core::tree::{Arg, AssignOp, Expr, ExprKind};
use crate::core::typecheck::{DeclRef, ValueRef};
use crate::core::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Access {
    /// Read, then written back.
    Modify,
    /// Only written.
    Assign,
}

#[derive(Debug, Clone)]
struct Writeback {
    storage: DeclId,
    decl_ref: DeclRef,
    self_ty: Option<Type>,
    access: SelfAccess,
    temp: ValueId,
    ty: Type,
    indices: Vec<(Managed, Type)>,
    span: Span,
}

#[derive(Debug, Clone)]
pub(super) struct Place {
    pub(super) addr: ValueId,
    pub(super) ty: Type,
    /// Storing into the place initializes it.
    pub(super) init: bool,
    writebacks: Vec<Writeback>,
    mark: (usize, usize),
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    pub(super) fn lower_place(&mut self, expr: &'a Expr, access: Access) -> LowerResult<Place> {
        let mark = self.env.mark();
        let tables = self.cx.tables;
        let expr = strip_parens(expr);
        let span = expr.span;
        let ty = tables.type_of(expr.id).without_inout().clone();
        let simple = |addr| Place {
            addr,
            ty: ty.clone(),
            init: false,
            writebacks: Vec::new(),
            mark,
        };
        match &expr.kind {
            ExprKind::Ident(name) | ExprKind::Member { name, .. } | ExprKind::ImplicitMember(name) => {
                let base = match &expr.kind {
                    ExprKind::Member { base, .. } => Some(&**base),
                    _ => None,
                };
                match tables.refs.get(&expr.id) {
                    Some(ValueRef::Local(node)) => match self.locals.get(node).copied() {
                        Some(LocalSlot::Addr(addr)) | Some(LocalSlot::Boxed { addr, .. }) => Ok(simple(addr)),
                        Some(LocalSlot::Value(_)) => Err(self.error(LowerErrorKind::NotAssignable, span)),
                        None => Err(self.error(LowerErrorKind::UnresolvedReference(name.clone()), span)),
                    },
                    Some(ValueRef::SelfValue) => self.self_place(&ty, mark, span),
                    Some(ValueRef::TupleElement(index)) => {
                        let Some(base) = base else {
                            return Err(self.error(LowerErrorKind::NotAssignable, span));
                        };
                        self.tuple_element_place(base, *index, mark)
                    }
                    Some(ValueRef::Decl(decl_ref)) => {
                        let call_base = match base {
                            Some(base) if !matches!(base.kind, ExprKind::SuperRef) => CallBase::Expr(base),
                            Some(_) => CallBase::Implicit,
                            None if decl_ref.implicit_self => CallBase::Implicit,
                            None => CallBase::None,
                        };
                        self.storage_place(decl_ref, call_base, &ty, access, mark, span)
                    }
                    _ => Err(self.error(LowerErrorKind::NotAssignable, span)),
                }
            }
            ExprKind::SelfRef => self.self_place(&ty, mark, span),
            ExprKind::TupleIndex { base, index } => self.tuple_element_place(base, *index, mark),
            ExprKind::Subscript { base, args } => self.subscript_place(expr, base, args, &ty, access, mark),
            ExprKind::ForceUnwrap(inner) => {
                let fail = self.b.add_block();
                let depth = self.depth();
                let place = self.payload_place(inner, &ty, Exit { block: fail, depth }, span)?;
                let cont = self.b.current_block();
                self.b.switch_to(fail);
                self.trap("unexpected_nil", Vec::new());
                if let Some(cont) = cont {
                    self.b.switch_to(cont);
                }
                Ok(place)
            }
            ExprKind::BindOptional(inner) => {
                let Some(exit) = self.chains.last().copied() else {
                    return Err(self.unsupported("'?' outside an optional chain", span));
                };
                self.payload_place(inner, &ty, exit, span)
            }
            _ => Err(self.error(LowerErrorKind::NotAssignable, span)),
        }
    }

    /// Runs the writebacks of a place, innermost first.
    pub(super) fn end_place(&mut self, place: Place) -> LowerResult<()> {
        for writeback in place.writebacks.into_iter().rev() {
            let value = self.take_managed(writeback.temp, &writeback.ty);
            self.call_accessor(
                writeback.storage,
                AccessorKind::Set,
                &writeback.decl_ref,
                writeback.self_ty.as_ref(),
                writeback.access,
                Some((value, writeback.ty.clone())),
                &writeback.indices,
                writeback.span,
            )?;
        }
        self.env.reset(place.mark);
        Ok(())
    }

    fn self_place(&mut self, ty: &Type, mark: (usize, usize), span: Span) -> LowerResult<Place> {
        match self.self_slot {
            Some(SelfSlot::Addr(addr)) => Ok(Place {
                addr,
                ty: ty.clone(),
                init: self.in_init && !self.self_is_class(),
                writebacks: Vec::new(),
                mark,
            }),
            Some(_) => Err(self.error(LowerErrorKind::NotAssignable, span)),
            None => Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span)),
        }
    }

    fn tuple_element_place(&mut self, base: &'a Expr, index: usize, mark: (usize, usize)) -> LowerResult<Place> {
        let mut place = self.lower_place(base, Access::Modify)?;
        let Type::Tuple(elems) = &place.ty else {
            return Err(self.error(LowerErrorKind::NotAssignable, base.span));
        };
        let Some(elem_ty) = elems.get(index).map(|elem| elem.ty.clone()) else {
            return Err(self.error(LowerErrorKind::NotAssignable, base.span));
        };
        let ir = self.ir(&elem_ty).address_of();
        place.addr = self
            .b
            .emit_value(InstKind::TupleElementAddr { addr: place.addr, index }, ir, Ownership::Trivial);
        place.ty = elem_ty;
        place.mark = mark;
        Ok(place)
    }

    /// Payload of the optional at `inner`'s place, exiting to `fail` when
    /// it is `nil`.
    fn payload_place(&mut self, inner: &'a Expr, payload_ty: &Type, fail: Exit, span: Span) -> LowerResult<Place> {
        let mark = self.env.mark();
        let mut place = self.lower_place(inner, Access::Modify)?;
        let case = self.optional_case("some", span)?;
        let some = self.b.add_block();
        let none = self.b.add_block();
        self.b.terminate(Terminator::SwitchEnumAddr {
            addr: place.addr,
            cases: vec![SwitchCase {
                case: case.clone(),
                target: some,
            }],
            default: Some(none),
        });
        self.b.switch_to(none);
        self.emit_cleanups_to(fail.depth)?;
        self.b.br(fail.block, Vec::new());
        self.b.switch_to(some);
        let ir = self.ir(payload_ty).address_of();
        place.addr = self.b.emit_value(
            InstKind::UncheckedTakeEnumDataAddr { addr: place.addr, case },
            ir,
            Ownership::Trivial,
        );
        place.ty = payload_ty.clone();
        place.mark = mark;
        Ok(place)
    }

    fn is_direct(&self, decl: DeclId, storage: &Storage) -> bool {
        match storage {
            Storage::Stored => true,
            Storage::Observed => self.direct_storage == Some(decl) || self.in_init,
            Storage::Computed { .. } | Storage::Requirement { .. } => false,
        }
    }

    fn storage_place(
        &mut self,
        decl_ref: &DeclRef,
        base: CallBase<'a>,
        ty: &Type,
        access: Access,
        mark: (usize, usize),
        span: Span,
    ) -> LowerResult<Place> {
        let set = self.cx.set;
        let types = self.cx.types;
        let decl = decl_ref.decl;
        let d = set.decl(decl);
        let DeclKind::Var(info) = &d.kind else {
            return Err(self.error(LowerErrorKind::NotAssignable, span));
        };
        let member = types.member_context(decl).is_some();
        if self.is_direct(decl, &info.storage) {
            if !member || d.is_static {
                let addr = self.global_addr(decl, ty);
                return Ok(Place {
                    addr,
                    ty: ty.clone(),
                    init: false,
                    writebacks: Vec::new(),
                    mark,
                });
            }
            let init = self.in_init && matches!(base, CallBase::Implicit) && !info.has_initial_value;
            let instance_ty = decl_ref.base.clone().or_else(|| self.self_ty.clone()).unwrap_or(Type::Error);
            if set.is_class_type(&instance_ty) {
                let object = match base {
                    CallBase::Expr(expr) => {
                        let m = self.lower_expr(expr)?;
                        let base_ty = self.cx.tables.converted_type_of(expr.id);
                        self.borrow(m, &base_ty)
                    }
                    CallBase::Value(m) => self.borrow(m, &instance_ty),
                    CallBase::Implicit | CallBase::None => {
                        let m = self.self_managed(span)?;
                        self.borrow(m, &instance_ty)
                    }
                };
                let ir = self.ir(ty).address_of();
                let addr = self.b.emit_value(
                    InstKind::RefElementAddr {
                        object,
                        field: d.name.clone(),
                    },
                    ir,
                    Ownership::Trivial,
                );
                return Ok(Place {
                    addr,
                    ty: ty.clone(),
                    init,
                    writebacks: Vec::new(),
                    mark,
                });
            }
            let mut place = match base {
                CallBase::Expr(expr) => self.lower_place(expr, Access::Modify)?,
                CallBase::Implicit | CallBase::None => self.self_place(&instance_ty, mark, span)?,
                CallBase::Value(_) => return Err(self.error(LowerErrorKind::NotAssignable, span)),
            };
            let ir = self.ir(ty).address_of();
            place.addr = self.b.emit_value(
                InstKind::StructElementAddr {
                    addr: place.addr,
                    field: d.name.clone(),
                },
                ir,
                Ownership::Trivial,
            );
            place.ty = ty.clone();
            place.init = init;
            place.mark = mark;
            return Ok(place);
        }

        let (self_access, self_ty, writebacks) = self.storage_self(decl_ref, base, true, span)?;
        self.accessor_place(decl, decl_ref, self_ty, self_access, writebacks, Vec::new(), ty, access, mark, span)
    }

    /// Temporary standing for storage reached through its accessors.
    #[allow(clippy::too_many_arguments)]
    fn accessor_place(
        &mut self,
        storage: DeclId,
        decl_ref: &DeclRef,
        self_ty: Option<Type>,
        self_access: SelfAccess,
        mut writebacks: Vec<Writeback>,
        indices: Vec<(Managed, Type)>,
        ty: &Type,
        access: Access,
        mark: (usize, usize),
        span: Span,
    ) -> LowerResult<Place> {
        let temp = self.alloc_temp(ty, None);
        if access == Access::Modify {
            let observed = self
                .cx
                .set
                .decl(storage)
                .var_info()
                .is_some_and(|info| info.storage == Storage::Observed);
            let current = if observed {
                self.observed_value(storage, self_ty.as_ref(), self_access, ty, span)?
            } else {
                self.call_accessor(
                    storage,
                    AccessorKind::Get,
                    decl_ref,
                    self_ty.as_ref(),
                    self_access,
                    None,
                    &indices,
                    span,
                )?
            };
            self.store_into(current, ty, temp, true);
        }
        writebacks.push(Writeback {
            storage,
            decl_ref: decl_ref.clone(),
            self_ty,
            access: self_access,
            temp,
            ty: ty.clone(),
            indices,
            span,
        });
        Ok(Place {
            addr: temp,
            ty: ty.clone(),
            init: access == Access::Assign,
            writebacks,
            mark,
        })
    }

    /// Current value of an observed property, which has no getter.
    fn observed_value(
        &mut self,
        storage: DeclId,
        self_ty: Option<&Type>,
        access: SelfAccess,
        ty: &Type,
        span: Span,
    ) -> LowerResult<Managed> {
        let d = self.cx.set.decl(storage);
        let base = match access {
            SelfAccess::Value(m) => m,
            SelfAccess::Addr(addr) => Managed::addr(addr),
            SelfAccess::None | SelfAccess::Metatype(_) => return Ok(Managed::addr(self.global_addr(storage, ty))),
        };
        let Some(base_ty) = self_ty else {
            return Err(self.error(LowerErrorKind::MissingType, span));
        };
        Ok(self.project_field(base, base_ty, &d.name, ty))
    }

    fn subscript_place(
        &mut self,
        expr: &'a Expr,
        base: &'a Expr,
        args: &'a [Arg],
        ty: &Type,
        access: Access,
        mark: (usize, usize),
    ) -> LowerResult<Place> {
        let span = expr.span;
        let (decl_ref, info) = self.subscript_info(expr)?;
        let call_base = match base.kind {
            ExprKind::SuperRef => CallBase::Implicit,
            _ => CallBase::Expr(base),
        };
        let (self_access, self_ty, writebacks) = self.storage_self(&decl_ref, call_base, true, span)?;
        let abs = self.cx.types.accessor_abstraction(decl_ref.decl, AccessorKind::Get);
        let sources = args.iter().map(|arg| ArgSource::Expr(&arg.expr)).collect();
        let indices = self.lower_params(
            &info,
            sources,
            &abs.params,
            Some(&decl_ref.subst),
            Some((decl_ref.decl, &decl_ref.subst)),
            span,
        )?;
        self.accessor_place(
            decl_ref.decl,
            &decl_ref,
            self_ty,
            self_access,
            writebacks,
            indices.values,
            ty,
            access,
            mark,
            span,
        )
    }

    fn subscript_info(&self, expr: &Expr) -> LowerResult<(DeclRef, crate::core::typecheck::CallInfo)> {
        let tables = self.cx.tables;
        match (tables.refs.get(&expr.id), tables.calls.get(&expr.id)) {
            (Some(ValueRef::Decl(decl_ref)), Some(info)) => Ok((decl_ref.clone(), info.clone())),
            _ => Err(self.error(LowerErrorKind::MissingType, expr.span)),
        }
    }

    /// `self` of an accessor call on `base`. With `mutable`, value-type
    /// bases are accessed through their place.
    fn storage_self(
        &mut self,
        decl_ref: &DeclRef,
        base: CallBase<'a>,
        mutable: bool,
        span: Span,
    ) -> LowerResult<(SelfAccess, Option<Type>, Vec<Writeback>)> {
        let set = self.cx.set;
        let types = self.cx.types;
        let decl = decl_ref.decl;
        let Some(context_self) = types.self_type_of(decl) else {
            return Ok((SelfAccess::None, None, Vec::new()));
        };
        let instance_ty = decl_ref
            .base
            .clone()
            .or_else(|| self.self_ty.clone())
            .unwrap_or(context_self);
        if set.decl(decl).is_static {
            let metadata = self.metadata_for(&instance_ty);
            return Ok((SelfAccess::Metatype(metadata), Some(instance_ty), Vec::new()));
        }
        let by_value = !mutable || set.is_class_type(&instance_ty);
        let (access, writebacks) = match base {
            CallBase::Expr(expr) if by_value => (SelfAccess::Value(self.lower_expr(expr)?), Vec::new()),
            CallBase::Expr(expr) => {
                let place = self.lower_place(expr, Access::Modify)?;
                (SelfAccess::Addr(place.addr), place.writebacks)
            }
            CallBase::Value(m) => (SelfAccess::Value(m), Vec::new()),
            CallBase::Implicit | CallBase::None => (self.self_access(span)?, Vec::new()),
        };
        let access = self.open_if_existential(decl, access, &instance_ty);
        Ok((access, Some(instance_ty), writebacks))
    }

    fn global_addr(&mut self, decl: DeclId, ty: &Type) -> ValueId {
        let name = decl_symbol(self.cx.set, decl);
        let ir = self.ir(ty).address_of();
        self.b.emit_value(InstKind::GlobalAddr { name }, ir, Ownership::Trivial)
    }

    /// Calls a getter, setter or observer of `storage`.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn call_accessor(
        &mut self,
        storage: DeclId,
        kind: AccessorKind,
        decl_ref: &DeclRef,
        self_ty: Option<&Type>,
        access: SelfAccess,
        value: Option<(Managed, Type)>,
        indices: &[(Managed, Type)],
        span: Span,
    ) -> LowerResult<Managed> {
        let mark = self.env.mark();
        let result = self.call_accessor_in_env(storage, kind, decl_ref, self_ty, access, value, indices, span);
        self.env.reset(mark);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn call_accessor_in_env(
        &mut self,
        storage: DeclId,
        kind: AccessorKind,
        decl_ref: &DeclRef,
        self_ty: Option<&Type>,
        access: SelfAccess,
        value: Option<(Managed, Type)>,
        indices: &[(Managed, Type)],
        span: Span,
    ) -> LowerResult<Managed> {
        let (callee, abs, subst) =
            self.callee_value(storage, EntryPoint::Accessor(kind), &decl_ref.subst, self_ty, &[], span)?;
        let leading = self.generic_args(&abs, &subst, span)?;
        let mut values = value.into_iter().collect::<Vec<_>>();
        values.extend(indices.iter().cloned());
        let formals = self.pass_params(&values, &abs.params);
        let self_arg = match (&abs.self_param, self_ty) {
            (Some(param), Some(ty)) => Some(self.self_operand(access, param.convention, ty, span)?),
            _ => None,
        };
        self.emit_apply(
            PreparedCall {
                callee,
                abs,
                subst: Some(subst),
                leading,
                formals,
                captures: Vec::new(),
                self_arg,
            },
            span,
        )
    }

    /// Value of a property or global.
    pub(super) fn read_storage(&mut self, decl_ref: &DeclRef, base: CallBase<'a>, span: Span) -> LowerResult<Managed> {
        let set = self.cx.set;
        let types = self.cx.types;
        let decl = decl_ref.decl;
        let d = set.decl(decl);
        let DeclKind::Var(info) = &d.kind else {
            return Err(self.unsupported(format!("a read of '{}'", d.name), span));
        };
        let member = types.member_context(decl).is_some();
        let direct = matches!(info.storage, Storage::Stored | Storage::Observed);
        if direct && (!member || d.is_static) {
            let ty = types.apply(&info.ty, Some(&decl_ref.subst));
            return Ok(Managed::addr(self.global_addr(decl, &ty)));
        }
        if direct {
            let ty = types.apply(&info.ty, Some(&decl_ref.subst));
            let (m, base_ty) = match base {
                CallBase::Expr(expr) => (self.lower_expr(expr)?, self.cx.tables.converted_type_of(expr.id)),
                CallBase::Value(m) => (m, decl_ref.base.clone().unwrap_or(Type::Error)),
                CallBase::Implicit | CallBase::None => {
                    (self.self_managed(span)?, self.self_ty.clone().unwrap_or(Type::Error))
                }
            };
            return Ok(self.project_field(m, &base_ty, &d.name, &ty));
        }

        let mark = self.env.mark();
        let result = match self.storage_self(decl_ref, base, false, span) {
            Ok((access, self_ty, _)) => {
                self.call_accessor(decl, AccessorKind::Get, decl_ref, self_ty.as_ref(), access, None, &[], span)
            }
            Err(err) => Err(err),
        };
        self.env.reset(mark);
        result
    }

    /// Stored property `field` of the instance `m`.
    pub(super) fn project_field(&mut self, m: Managed, base_ty: &Type, field: &str, ty: &Type) -> Managed {
        if self.cx.set.is_class_type(base_ty) {
            let object = self.borrow(m, base_ty);
            let ir = self.ir(ty).address_of();
            let addr = self.b.emit_value(
                InstKind::RefElementAddr {
                    object,
                    field: field.to_string(),
                },
                ir,
                Ownership::Trivial,
            );
            return Managed::addr(addr);
        }
        match m {
            Managed::Addr { addr, .. } => {
                let ir = self.ir(ty).address_of();
                let addr = self.b.emit_value(
                    InstKind::StructElementAddr {
                        addr,
                        field: field.to_string(),
                    },
                    ir,
                    Ownership::Trivial,
                );
                Managed::addr(addr)
            }
            Managed::Value { value, .. } => {
                let ir = self.ir(ty);
                let ownership = if self.is_trivial(ty) {
                    Ownership::Trivial
                } else {
                    Ownership::Guaranteed
                };
                let field = self.b.emit_value(
                    InstKind::StructExtract {
                        value,
                        field: field.to_string(),
                    },
                    ir,
                    ownership,
                );
                Managed::value(field)
            }
        }
    }

    pub(super) fn lower_subscript_get(&mut self, expr: &'a Expr, base: &'a Expr, args: &'a [Arg]) -> LowerResult<Managed> {
        let span = expr.span;
        let (decl_ref, info) = self.subscript_info(expr)?;
        let call_base = match base.kind {
            ExprKind::SuperRef => CallBase::Implicit,
            _ => CallBase::Expr(base),
        };
        let mark = self.env.mark();
        let result = self.subscript_get_in_env(&decl_ref, &info, call_base, args, span);
        self.env.reset(mark);
        result
    }

    fn subscript_get_in_env(
        &mut self,
        decl_ref: &DeclRef,
        info: &crate::core::typecheck::CallInfo,
        base: CallBase<'a>,
        args: &'a [Arg],
        span: Span,
    ) -> LowerResult<Managed> {
        let (access, self_ty, _) = self.storage_self(decl_ref, base, false, span)?;
        let abs = self.cx.types.accessor_abstraction(decl_ref.decl, AccessorKind::Get);
        let sources = args.iter().map(|arg| ArgSource::Expr(&arg.expr)).collect();
        let indices = self.lower_params(
            info,
            sources,
            &abs.params,
            Some(&decl_ref.subst),
            Some((decl_ref.decl, &decl_ref.subst)),
            span,
        )?;
        let value = self.call_accessor(
            decl_ref.decl,
            AccessorKind::Get,
            decl_ref,
            self_ty.as_ref(),
            access,
            None,
            &indices.values,
            span,
        )?;
        self.end_places(indices.places)?;
        Ok(value)
    }

    /// `lhs = rhs` and the compound assignments.
    pub(super) fn lower_assign(&mut self, expr: &'a Expr, op: AssignOp, lhs: &'a Expr, rhs: &'a Expr) -> LowerResult<()> {
        let tables = self.cx.tables;
        let span = expr.span;
        if let ExprKind::OptionalEval(inner) = &strip_parens(lhs).kind {
            let none = self.b.add_block();
            let cont = self.b.add_block();
            let depth = self.depth();
            self.chains.push(Exit { block: none, depth });
            let result = self.lower_assign(expr, op, inner, rhs);
            self.chains.pop();
            result?;
            self.pop_scope(depth)?;
            if self.b.is_reachable() {
                self.b.br(cont, Vec::new());
            }
            self.b.switch_to(none);
            self.b.br(cont, Vec::new());
            self.b.switch_to(cont);
            return Ok(());
        }

        match op {
            AssignOp::Assign => {
                let value = self.lower_expr(rhs)?;
                let place = self.lower_place(lhs, Access::Assign)?;
                let ty = place.ty.clone();
                self.store_into(value, &ty, place.addr, place.init);
                self.end_place(place)
            }
            AssignOp::Add | AssignOp::Sub | AssignOp::Mul => {
                let Some(info) = tables.calls.get(&expr.id) else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                let place = self.lower_place(lhs, Access::Modify)?;
                let ty = place.ty.clone();
                let sources = vec![ArgSource::Value(Managed::addr(place.addr), ty.clone()), ArgSource::Expr(rhs)];
                let result = self.lower_operator_call(info, sources, span)?;
                self.store_into(result, &ty, place.addr, false);
                self.end_place(place)
            }
        }
    }
}
