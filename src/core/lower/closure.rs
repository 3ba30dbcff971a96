//! Closures, autoclosures and local functions.
//!
//! Each frame becomes its own function whose trailing parameters are the
//! captures. Non-escaping frames borrow what they capture; escaping ones
//! own a copy of each value or box. Closure literals also capture the
//! enclosing generic environment, local functions receive it as ordinary
//! generic parameters.

use crate::core::diag::Span;
use crate::core::ir::{ApplyArg, Convention, FunctionKind, InstKind, Ownership, SigParam, ValueId};
use crate::core::lower::capture::CaptureKind;
use crate::core::lower::errors::LowerErrorKind;
use crate::core::lower::func::{FuncLowerer, LocalSlot, LowerResult, Managed, SelfSlot};
use crate::core::lower::names::{closure_symbol, decl_symbol};
use crate::core::resolve::DeclId;
use crate::core::tree::{ClosureExpr, Expr, FuncDecl, Item, NodeId};
use crate::core::typecheck::DeclRef;
use crate::core::types::{FnType, Substitution, Type};

#[derive(Debug, Clone)]
enum CaptureBinding {
    Local { node: NodeId, kind: CaptureKind, ty: Type, owned: bool },
    SelfValue { owned: bool },
    SelfAddr,
    SelfMetatype,
    Metadata(Type),
    Table(Type, DeclId),
}

#[derive(Debug, Clone, Default)]
struct CapturePlan {
    params: Vec<SigParam>,
    args: Vec<ApplyArg>,
    bindings: Vec<CaptureBinding>,
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    /// Works out the capture operands of frame `key` in the current body.
    fn capture_plan(&mut self, key: NodeId, with_env: bool, span: Span) -> LowerResult<CapturePlan> {
        let types = self.cx.types;
        let info = self.cx.captures.info(key);
        let mut plan = CapturePlan::default();
        for capture in &info.captures {
            let Some(local) = self.cx.tables.locals.get(&capture.node) else {
                continue;
            };
            let (name, ty) = (local.name.clone(), local.ty.clone());
            let Some(slot) = self.locals.get(&capture.node).copied() else {
                return Err(self.error(LowerErrorKind::UnresolvedReference(name), span));
            };
            let (param, arg, owned) = match capture.kind {
                CaptureKind::Value => {
                    let convention = if self.is_trivial(&ty) {
                        Convention::Trivial
                    } else if info.escaping {
                        Convention::Owned
                    } else {
                        Convention::Guaranteed
                    };
                    let current = match slot {
                        LocalSlot::Value(value) => Managed::value(value),
                        LocalSlot::Addr(addr) | LocalSlot::Boxed { addr, .. } => Managed::addr(addr),
                    };
                    let value = if convention == Convention::Owned {
                        self.owned(current, &ty)
                    } else {
                        self.borrow(current, &ty)
                    };
                    (SigParam { convention, ty: self.ir(&ty) }, value, convention == Convention::Owned)
                }
                CaptureKind::Box => {
                    let LocalSlot::Boxed { boxed, .. } = slot else {
                        return Err(self.unsupported(format!("capture of unboxed variable '{name}'"), span));
                    };
                    let (convention, value) = if info.escaping {
                        (Convention::Owned, self.b.copy_value(boxed))
                    } else {
                        (Convention::Guaranteed, boxed)
                    };
                    (SigParam { convention, ty: types.box_type(&ty) }, value, info.escaping)
                }
                CaptureKind::Address => {
                    let Some(addr) = slot.addr() else {
                        return Err(self.unsupported(format!("address capture of '{name}'"), span));
                    };
                    let param = SigParam {
                        convention: Convention::InoutAliasable,
                        ty: self.ir(&ty).address_of(),
                    };
                    (param, addr, false)
                }
            };
            plan.args.push(ApplyArg {
                value: arg,
                convention: param.convention,
            });
            plan.params.push(param);
            plan.bindings.push(CaptureBinding::Local {
                node: capture.node,
                kind: capture.kind,
                ty,
                owned,
            });
        }

        if info.captures_self {
            let self_ty = self.self_ty.clone().unwrap_or(Type::Error);
            let (param, arg, binding) = match self.self_slot {
                Some(SelfSlot::Value(value)) => {
                    let convention = if self.is_trivial(&self_ty) {
                        Convention::Trivial
                    } else if info.escaping {
                        Convention::Owned
                    } else {
                        Convention::Guaranteed
                    };
                    let owned = convention == Convention::Owned;
                    let arg = if owned { self.b.copy_value(value) } else { value };
                    (SigParam { convention, ty: self.ir(&self_ty) }, arg, CaptureBinding::SelfValue { owned })
                }
                Some(SelfSlot::Addr(addr)) => {
                    let param = SigParam {
                        convention: Convention::InoutAliasable,
                        ty: self.ir(&self_ty).address_of(),
                    };
                    (param, addr, CaptureBinding::SelfAddr)
                }
                Some(SelfSlot::Metatype(value)) => {
                    let param = SigParam {
                        convention: Convention::Trivial,
                        ty: types.metatype(&self_ty),
                    };
                    (param, value, CaptureBinding::SelfMetatype)
                }
                None => return Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span)),
            };
            plan.args.push(ApplyArg {
                value: arg,
                convention: param.convention,
            });
            plan.params.push(param);
            plan.bindings.push(binding);
        }

        if with_env {
            for (ty, value) in self.env.metadata.clone() {
                plan.params.push(SigParam {
                    convention: Convention::Trivial,
                    ty: types.metatype(&ty),
                });
                plan.args.push(ApplyArg {
                    value,
                    convention: Convention::Trivial,
                });
                plan.bindings.push(CaptureBinding::Metadata(ty));
            }
            for (ty, proto, value) in self.env.tables.clone() {
                plan.params.push(SigParam {
                    convention: Convention::Trivial,
                    ty: types.witness_table(&ty, proto),
                });
                plan.args.push(ApplyArg {
                    value,
                    convention: Convention::Trivial,
                });
                plan.bindings.push(CaptureBinding::Table(ty, proto));
            }
        }
        Ok(plan)
    }

    /// Binds the capture parameters of a frame's function.
    fn bind_captures(&mut self, values: &[ValueId], bindings: &[CaptureBinding]) {
        for (value, binding) in values.iter().copied().zip(bindings) {
            match binding {
                CaptureBinding::Local { node, kind, ty, owned } => {
                    if *owned {
                        self.manage(value);
                    }
                    let slot = match kind {
                        CaptureKind::Value => LocalSlot::Value(value),
                        CaptureKind::Address => LocalSlot::Addr(value),
                        CaptureKind::Box => {
                            let addr_ty = self.ir(ty).address_of();
                            let addr = self
                                .b
                                .emit_value(InstKind::ProjectBox { boxed: value }, addr_ty, Ownership::Trivial);
                            LocalSlot::Boxed { boxed: value, addr }
                        }
                    };
                    self.locals.insert(*node, slot);
                }
                CaptureBinding::SelfValue { owned } => {
                    if *owned {
                        self.manage(value);
                    }
                    self.self_slot = Some(SelfSlot::Value(value));
                }
                CaptureBinding::SelfAddr => self.self_slot = Some(SelfSlot::Addr(value)),
                CaptureBinding::SelfMetatype => self.self_slot = Some(SelfSlot::Metatype(value)),
                CaptureBinding::Metadata(ty) => self.env.metadata.push((ty.clone(), value)),
                CaptureBinding::Table(ty, proto) => self.env.tables.push((ty.clone(), *proto, value)),
            }
        }
    }

    /// Thin function reference, thickened with its captures.
    fn closure_value(&mut self, name: &str, fn_ref_ty: crate::core::ir::IrType, ty: &Type, captures: Vec<ApplyArg>) -> Managed {
        let func = self.b.function_ref(name, fn_ref_ty);
        let ir = self.ir(ty);
        let value = if captures.is_empty() {
            self.b.emit_value(InstKind::ThinToThick { func }, ir, Ownership::Owned)
        } else {
            self.b.emit_value(
                InstKind::PartialApply {
                    callee: func,
                    captures,
                },
                ir,
                Ownership::Owned,
            )
        };
        self.manage(value)
    }

    /// Closure literal. With an `interface`, the closure is emitted with
    /// the conventions of the parameter it is passed to.
    pub(super) fn lower_closure(
        &mut self,
        expr: &'a Expr,
        closure: &'a ClosureExpr,
        interface: Option<(&FnType, Option<&Substitution>)>,
    ) -> LowerResult<Managed> {
        let types = self.cx.types;
        let ty = self.cx.tables.type_of(expr.id);
        let Some(fn_ty) = ty.as_function().cloned() else {
            return Err(self.error(LowerErrorKind::MissingType, expr.span));
        };
        let (abs, subst) = match interface {
            Some((interface, subst)) => (types.fn_abstraction(interface), subst.cloned()),
            None => (types.fn_abstraction(&fn_ty), None),
        };
        let plan = self.capture_plan(expr.id, true, expr.span)?;
        let name = closure_symbol(&self.name(), self.next_closure_index());
        let self_ty = self.self_ty.clone();
        let param_tys = closure
            .params
            .iter()
            .zip(&fn_ty.params)
            .map(|(param, formal)| {
                self.cx
                    .tables
                    .locals
                    .get(&param.id)
                    .map(|local| local.ty.clone())
                    .unwrap_or_else(|| formal.ty.clone())
            })
            .collect::<Vec<_>>();
        tracing::trace!(target: "lower", closure = %name, captures = plan.params.len(), "lowering closure");

        let sig = types.signature(&abs, subst.as_ref(), &plan.params);
        {
            let (mut child, entry) = FuncLowerer::new(
                &mut *self.cx,
                name.clone(),
                FunctionKind::Closure,
                None,
                &abs,
                subst.as_ref(),
                &plan.params,
            );
            child.self_ty = self_ty;
            child.bind_captures(&entry.captures, &plan.bindings);
            for (((param, value), formal), ty) in closure.params.iter().zip(&entry.formals).zip(&abs.params).zip(&param_tys) {
                child.bind_param(param.id, &param.name, *value, formal.convention, ty)?;
            }
            child.lower_block(&closure.body)?;
            child.finish_body(closure.body.span)?;
            child.finish();
        }
        Ok(self.closure_value(&name, types.function_ref_type(&sig), &ty, plan.args))
    }

    /// `@autoclosure` argument: the expression becomes the body of a
    /// closure returning it.
    pub(super) fn lower_autoclosure(
        &mut self,
        expr: &'a Expr,
        interface: &FnType,
        subst: Option<&Substitution>,
    ) -> LowerResult<Managed> {
        let types = self.cx.types;
        let abs = types.fn_abstraction(interface);
        let plan = self.capture_plan(expr.id, true, expr.span)?;
        let name = closure_symbol(&self.name(), self.next_closure_index());
        let self_ty = self.self_ty.clone();
        let sig = types.signature(&abs, subst, &plan.params);
        {
            let (mut child, entry) =
                FuncLowerer::new(&mut *self.cx, name.clone(), FunctionKind::Closure, None, &abs, subst, &plan.params);
            child.self_ty = self_ty;
            child.bind_captures(&entry.captures, &plan.bindings);
            let result_ty = child.result_ty.clone();
            let m = child.lower_expr(expr)?;
            child.return_managed(Some(m), &result_ty)?;
            child.finish();
        }
        let fn_ty = types.apply(&Type::Function(Box::new(interface.clone())), subst);
        Ok(self.closure_value(&name, types.function_ref_type(&sig), &fn_ty, plan.args))
    }

    /// Nested `func`: lowered to its own function at the point of
    /// declaration, called with its captures appended.
    pub(super) fn lower_local_function(&mut self, item: &'a Item, func: &'a FuncDecl) -> LowerResult<()> {
        let set = self.cx.set;
        let types = self.cx.types;
        let Some(decl) = set.module(set.current()).decl_for_node(item.id) else {
            return Err(self.error(LowerErrorKind::UnresolvedReference(func.name.clone()), item.span));
        };
        let Some(body) = &func.body else {
            return Ok(());
        };
        let abs = types.decl_abstraction(decl);
        let plan = self.capture_plan(item.id, false, item.span)?;
        let name = decl_symbol(set, decl);
        let self_ty = self.self_ty.clone();
        tracing::trace!(target: "lower", function = %name, captures = plan.params.len(), "lowering local function");

        let (mut child, entry) =
            FuncLowerer::new(&mut *self.cx, name, FunctionKind::Normal, Some(decl), &abs, None, &plan.params);
        child.self_ty = self_ty;
        child.bind_captures(&entry.captures, &plan.bindings);
        child.bind_params(&func.params, &abs, &entry.formals)?;
        child.lower_block(body)?;
        child.finish_body(body.span)?;
        child.finish();
        Ok(())
    }

    /// Capture parameters and arguments for a call of local function
    /// `decl` from the current body.
    pub(super) fn local_function_captures(
        &mut self,
        decl: DeclId,
        span: Span,
    ) -> LowerResult<(Vec<SigParam>, Vec<ApplyArg>)> {
        let Some(node) = self.cx.set.decl(decl).node else {
            return Ok((Vec::new(), Vec::new()));
        };
        let plan = self.capture_plan(node, false, span)?;
        Ok((plan.params, plan.args))
    }

    /// Function declaration used as a value.
    pub(super) fn function_value(&mut self, expr: &'a Expr, decl_ref: &DeclRef) -> LowerResult<Managed> {
        let set = self.cx.set;
        let types = self.cx.types;
        let decl = decl_ref.decl;
        let abs = types.decl_abstraction(decl);
        if abs.is_generic() || abs.self_param.is_some() {
            return Err(self.unsupported("a generic function or method used as a value", expr.span));
        }
        let ty = self.cx.tables.type_of(expr.id);
        let (params, captures) = if self.is_local_function(decl) {
            self.local_function_captures(decl, expr.span)?
        } else {
            (Vec::new(), Vec::new())
        };
        let sig = types.signature(&abs, None, &params);
        Ok(self.closure_value(&decl_symbol(set, decl), types.function_ref_type(&sig), &ty, captures))
    }
}
