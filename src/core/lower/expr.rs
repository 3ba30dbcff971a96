//! Expressions.
//!
//! `lower_expr` produces the expression's value after the implicit
//! conversions the checker recorded for it.

use crate::core::diag::Span;
use crate::core::ir::{InstKind, Ownership, SwitchCase, Terminator, ValueId};
use crate::core::lower::calls::{ArgSource, CallBase};
use crate::core::lower::errors::LowerErrorKind;
use crate::core::lower::func::{Exit, FuncLowerer, LocalSlot, LowerResult, Managed, SelfSlot};
use crate::core::lower::stmt::strip_parens;
use crate::core::resolve::{DeclId, DeclKind, LiteralKind};
use crate::core::tree::{BinaryOp, Expr, ExprKind, TryKind};
use crate::core::typecheck::{Conversion, ConversionKind, DeclRef, ValueRef};
use crate::core::types::Type;

#[derive(Debug, Clone, Copy)]
enum Literal<'e> {
    Int(u64),
    Float(&'e str),
    String(&'e str),
    Bool(bool),
    Nil,
}

impl Literal<'_> {
    fn kind(self) -> LiteralKind {
        match self {
            Literal::Int(_) => LiteralKind::Integer,
            Literal::Float(_) => LiteralKind::Float,
            Literal::String(_) => LiteralKind::String,
            Literal::Bool(_) => LiteralKind::Boolean,
            Literal::Nil => LiteralKind::Nil,
        }
    }
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    pub(super) fn lower_expr(&mut self, expr: &'a Expr) -> LowerResult<Managed> {
        let tables = self.cx.tables;
        let m = self.lower_expr_raw(expr)?;
        let ty = tables.type_of(expr.id);
        self.apply_conversions(m, ty, tables.conversions_of(expr.id), expr.span)
    }

    fn apply_conversions(&mut self, m: Managed, from: Type, steps: &[Conversion], span: Span) -> LowerResult<Managed> {
        let mut m = m;
        let mut current = from;
        for step in steps {
            // A parenthesized operand carries its inner expression's steps too.
            if current == step.to {
                continue;
            }
            m = match step.kind {
                ConversionKind::WrapOptional => self.wrap_optional(m, &current, &step.to, span)?,
                ConversionKind::Upcast => {
                    let value = self.owned(m, &current);
                    let ir = self.ir(&step.to);
                    let cast = self
                        .b
                        .emit_value(InstKind::Upcast { value, ty: ir.clone() }, ir, Ownership::Owned);
                    self.manage(cast)
                }
                ConversionKind::Existential | ConversionKind::AnyObject => self.erase(m, &current, &step.to),
            };
            current = step.to.clone();
        }
        Ok(m)
    }

    /// Boxes a concrete value (or narrower existential) into `to`.
    fn erase(&mut self, m: Managed, from: &Type, to: &Type) -> Managed {
        if self.is_address_only(to) {
            let temp = self.alloc_temp(to, None);
            let concrete = self.cx.types.type_name(from);
            let payload_ir = self.ir(from).address_of();
            let payload = self.b.emit_value(
                InstKind::InitExistentialAddr { addr: temp, concrete },
                payload_ir,
                Ownership::Trivial,
            );
            self.store_into(m, from, payload, true);
            return self.manage_temp(temp, to);
        }
        let value = self.owned(m, from);
        let ir = self.ir(to);
        let boxed = self
            .b
            .emit_value(InstKind::InitExistentialRef { value, ty: ir.clone() }, ir, Ownership::Owned);
        self.manage(boxed)
    }

    // -- Optionals --

    /// Element `name` of the prelude's `Optional`.
    pub(super) fn optional_element(&self, name: &str, span: Span) -> LowerResult<DeclId> {
        let set = self.cx.set;
        set.known()
            .optional
            .and_then(|optional| set.decl(optional).nominal_info())
            .and_then(|info| info.elements.iter().copied().find(|element| set.decl(*element).name == name))
            .ok_or_else(|| self.unsupported("optionals without a declared 'Optional'", span))
    }

    pub(super) fn optional_case(&self, name: &str, span: Span) -> LowerResult<String> {
        self.optional_element(name, span).map(|element| self.case_name(element))
    }

    /// `Enum.case`, as switch and enum instructions spell it.
    pub(super) fn case_name(&self, element: DeclId) -> String {
        let set = self.cx.set;
        let d = set.decl(element);
        match d.parent {
            Some(parent) => format!("{}.{}", set.decl(parent).name, d.name),
            None => d.name.clone(),
        }
    }

    pub(super) fn wrap_optional(&mut self, m: Managed, from: &Type, to: &Type, span: Span) -> LowerResult<Managed> {
        let some = self.optional_element("some", span)?;
        self.construct_enum(some, to, Some((m, from.clone())))
    }

    pub(super) fn optional_none(&mut self, ty: &Type, span: Span) -> LowerResult<Managed> {
        let none = self.optional_element("none", span)?;
        self.construct_enum(none, ty, None)
    }

    /// Value of enum `ty` holding `element`.
    pub(super) fn construct_enum(
        &mut self,
        element: DeclId,
        ty: &Type,
        payload: Option<(Managed, Type)>,
    ) -> LowerResult<Managed> {
        let case = self.case_name(element);
        if self.is_address_only(ty) {
            let temp = self.alloc_temp(ty, None);
            if let Some((m, payload_ty)) = payload {
                let data_ir = self.ir(&payload_ty).address_of();
                let data = self.b.emit_value(
                    InstKind::InitEnumDataAddr {
                        addr: temp,
                        case: case.clone(),
                    },
                    data_ir,
                    Ownership::Trivial,
                );
                self.store_into(m, &payload_ty, data, true);
            }
            self.b.emit(InstKind::InjectEnumAddr { addr: temp, case });
            return Ok(self.manage_temp(temp, ty));
        }
        let payload = payload.map(|(m, payload_ty)| self.owned(m, &payload_ty));
        let ir = self.ir(ty);
        let ownership = self.cx.types.ownership(ty);
        let value = self.b.emit_value(
            InstKind::Enum {
                ty: ir.clone(),
                case,
                payload,
            },
            ir,
            ownership,
        );
        Ok(self.manage(value))
    }

    // -- Dispatch --

    fn lower_expr_raw(&mut self, expr: &'a Expr) -> LowerResult<Managed> {
        let tables = self.cx.tables;
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLit(value) => self.lower_literal(expr, Literal::Int(*value)),
            ExprKind::FloatLit(text) => self.lower_literal(expr, Literal::Float(text)),
            ExprKind::StringLit(text) => self.lower_literal(expr, Literal::String(text)),
            ExprKind::BoolLit(value) => self.lower_literal(expr, Literal::Bool(*value)),
            ExprKind::NilLit => self.lower_literal(expr, Literal::Nil),
            ExprKind::Ident(name) | ExprKind::ImplicitMember(name) => self.lower_ref(expr, None, name),
            ExprKind::SelfRef => self.self_managed(span),
            ExprKind::SuperRef => Err(self.unsupported("'super' outside a member access", span)),
            ExprKind::Member { base, name, .. } => self.lower_ref(expr, Some(base), name),
            ExprKind::TupleIndex { base, index } => {
                let ty = tables.converted_type_of(base.id);
                let m = self.lower_expr(base)?;
                self.project_tuple(m, &ty, *index, span)
            }
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args),
            ExprKind::Subscript { base, args } => self.lower_subscript_get(expr, base, args),
            ExprKind::Closure(closure) => self.lower_closure(expr, closure, None),
            ExprKind::Unary { operand, .. } => {
                let info = tables
                    .calls
                    .get(&expr.id)
                    .ok_or_else(|| self.error(LowerErrorKind::MissingType, span))?;
                self.lower_operator_call(info, vec![ArgSource::Expr(operand)], span)
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(expr, *op, lhs, rhs),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => self.lower_ternary(expr, cond, then_expr, else_expr),
            ExprKind::Assign { op, lhs, rhs } => {
                self.lower_assign(expr, *op, lhs, rhs)?;
                Ok(Managed::value(self.b.unit()))
            }
            ExprKind::ForceUnwrap(inner) => {
                let optional_ty = tables.converted_type_of(inner.id);
                let payload_ty = tables.type_of(expr.id);
                let m = self.lower_expr(inner)?;
                let depth = self.depth();
                let fail = self.b.add_block();
                let payload = self.unwrap_or_exit(m, &optional_ty, &payload_ty, Exit { block: fail, depth }, span)?;
                let cont = self.b.current_block();
                self.b.switch_to(fail);
                self.trap("unexpected_nil", Vec::new());
                if let Some(cont) = cont {
                    self.b.switch_to(cont);
                }
                Ok(payload)
            }
            ExprKind::BindOptional(inner) => {
                let Some(exit) = self.chains.last().copied() else {
                    return Err(self.unsupported("'?' outside of an optional chain", span));
                };
                let optional_ty = tables.converted_type_of(inner.id);
                let payload_ty = tables.type_of(expr.id);
                let m = self.lower_expr(inner)?;
                self.unwrap_or_exit(m, &optional_ty, &payload_ty, exit, span)
            }
            ExprKind::OptionalEval(inner) => self.lower_optional_eval(expr, inner),
            ExprKind::Paren(inner) => self.lower_expr(inner),
            ExprKind::Tuple(elems) => {
                let ty = tables.type_of(expr.id);
                let Type::Tuple(elem_tys) = &ty else {
                    return Err(self.error(LowerErrorKind::MissingType, span));
                };
                let mut values = Vec::with_capacity(elems.len());
                for (elem, elem_ty) in elems.iter().zip(elem_tys) {
                    let m = self.lower_expr(&elem.expr)?;
                    values.push((m, elem_ty.ty.clone()));
                }
                Ok(self.build_tuple(values, &ty))
            }
            ExprKind::Try { kind, expr: inner } => self.lower_try(expr, *kind, inner),
            ExprKind::As { expr: inner, .. } => self.lower_expr(inner),
            ExprKind::InOut(_) => Err(self.unsupported("'&' outside of an argument list", span)),
            ExprKind::CodeCompletion
            | ExprKind::MemberCompletion(_)
            | ExprKind::ImplicitMemberCompletion
            | ExprKind::Error => Err(self.unsupported("an invalid expression", span)),
        }
    }

    // -- Literals --

    fn lower_literal(&mut self, expr: &Expr, lit: Literal<'_>) -> LowerResult<Managed> {
        let ty = self.cx.tables.type_of(expr.id);
        if ty.is_error() {
            return Err(self.error(LowerErrorKind::MissingType, expr.span));
        }
        self.literal_value(&ty, lit, expr.span)
    }

    fn literal_value(&mut self, ty: &Type, lit: Literal<'_>, span: Span) -> LowerResult<Managed> {
        if let (Literal::Nil, Type::Optional(_)) = (lit, ty) {
            return self.optional_none(ty, span);
        }
        let set = self.cx.set;
        let builtin = set.nominal_decl_of(ty).and_then(|decl| set.decl(decl).attrs.builtin.as_deref());
        let ir = self.ir(ty);
        let float = |this: &mut Self, value: String| {
            this.b
                .emit_value(InstKind::FloatLiteral { ty: ir.clone(), value }, ir.clone(), Ownership::Trivial)
        };
        let value = match (builtin, lit) {
            (Some("Int"), Literal::Int(value)) => self.b.integer_literal(ir.clone(), i128::from(value)),
            (Some("Double"), Literal::Int(value)) => float(self, value.to_string()),
            (Some("Double"), Literal::Float(text)) => float(self, text.to_string()),
            (Some("Bool"), Literal::Bool(value)) => self.b.integer_literal(ir.clone(), i128::from(value)),
            (Some("String"), Literal::String(text)) => {
                let value = self.b.emit_value(
                    InstKind::StringLiteral {
                        value: text.to_string(),
                    },
                    ir.clone(),
                    Ownership::Owned,
                );
                return Ok(self.manage(value));
            }
            _ => return self.literal_through_protocol(ty, lit, span),
        };
        Ok(Managed::value(value))
    }

    /// `T(integerLiteral: 42)` and friends, for types other than the
    /// builtin ones.
    fn literal_through_protocol(&mut self, ty: &Type, lit: Literal<'_>, span: Span) -> LowerResult<Managed> {
        let set = self.cx.set;
        let kind = lit.kind();
        let Some(proto) = set.literal_protocol(kind) else {
            return Err(self.unsupported("literals without the prelude's literal protocols", span));
        };
        let Some(requirement) = set
            .decl(proto)
            .members()
            .iter()
            .copied()
            .find(|member| matches!(set.decl(*member).kind, DeclKind::Constructor { .. }))
        else {
            return Err(self.unsupported("a literal protocol without an initializer", span));
        };
        let (raw, raw_ty) = match kind {
            LiteralKind::Nil => (Managed::value(self.b.unit()), Type::void()),
            _ => {
                let raw_ty = set
                    .literal_default(kind)
                    .ok_or_else(|| self.unsupported("a literal without a default type", span))?;
                (self.literal_value(&raw_ty, lit, span)?, raw_ty)
            }
        };
        let ctor = match set.nominal_decl_of(ty).and_then(|nominal| set.conformance(nominal, proto)) {
            Some(conformance) => conformance
                .witness(requirement)
                .map(|witness| witness.decl())
                .ok_or_else(|| {
                    self.error(
                        LowerErrorKind::MissingWitness {
                            requirement: set.decl(requirement).full_name(),
                            protocol: set.decl(proto).name.clone(),
                        },
                        span,
                    )
                })?,
            None => requirement,
        };
        self.construct(ctor, ty, vec![(raw, raw_ty)], span)
    }

    // -- Names --

    pub(super) fn self_managed(&mut self, span: Span) -> LowerResult<Managed> {
        match self.self_slot {
            Some(SelfSlot::Value(value)) | Some(SelfSlot::Metatype(value)) => Ok(Managed::value(value)),
            Some(SelfSlot::Addr(addr)) => Ok(Managed::addr(addr)),
            None => Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span)),
        }
    }

    pub(super) fn read_local(&mut self, node: crate::core::tree::NodeId, name: &str, span: Span) -> LowerResult<Managed> {
        match self.locals.get(&node).copied() {
            Some(LocalSlot::Value(value)) => Ok(Managed::value(value)),
            Some(LocalSlot::Addr(addr)) | Some(LocalSlot::Boxed { addr, .. }) => Ok(Managed::addr(addr)),
            None => Err(self.error(LowerErrorKind::UnresolvedReference(name.to_string()), span)),
        }
    }

    fn lower_ref(&mut self, expr: &'a Expr, base: Option<&'a Expr>, name: &str) -> LowerResult<Managed> {
        let tables = self.cx.tables;
        let span = expr.span;
        let Some(value_ref) = tables.refs.get(&expr.id) else {
            return Err(self.error(LowerErrorKind::UnresolvedReference(name.to_string()), span));
        };
        match value_ref {
            ValueRef::Local(node) => self.read_local(*node, name, span),
            ValueRef::SelfValue => self.self_managed(span),
            ValueRef::Type(ty) => Ok(Managed::value(self.metadata_for(ty))),
            ValueRef::TupleElement(index) => {
                let Some(base) = base else {
                    return Err(self.error(LowerErrorKind::UnresolvedReference(name.to_string()), span));
                };
                let ty = tables.converted_type_of(base.id);
                let m = self.lower_expr(base)?;
                self.project_tuple(m, &ty, *index, span)
            }
            ValueRef::Decl(decl_ref) => self.lower_decl_ref(expr, decl_ref, base),
        }
    }

    fn lower_decl_ref(&mut self, expr: &'a Expr, decl_ref: &'a DeclRef, base: Option<&'a Expr>) -> LowerResult<Managed> {
        let set = self.cx.set;
        let d = set.decl(decl_ref.decl);
        match &d.kind {
            DeclKind::Var(_) => {
                let base = match base {
                    Some(base) if !matches!(base.kind, ExprKind::SuperRef) => CallBase::Expr(base),
                    Some(_) => CallBase::Implicit,
                    None if decl_ref.implicit_self => CallBase::Implicit,
                    None => CallBase::None,
                };
                self.read_storage(decl_ref, base, expr.span)
            }
            DeclKind::EnumElement { payload: None, .. } => {
                let ty = self.cx.tables.type_of(expr.id);
                self.construct_enum(decl_ref.decl, &ty, None)
            }
            DeclKind::Func(_) => self.function_value(expr, decl_ref),
            _ => Err(self.unsupported(format!("a reference to '{}' as a value", d.name), expr.span)),
        }
    }

    // -- Tuples --

    pub(super) fn project_tuple(&mut self, m: Managed, ty: &Type, index: usize, span: Span) -> LowerResult<Managed> {
        let Some(elem_ty) = (match ty {
            Type::Tuple(elems) => elems.get(index).map(|elem| elem.ty.clone()),
            _ => None,
        }) else {
            return Err(self.unsupported("a tuple element of a non-tuple", span));
        };
        match m {
            Managed::Addr { addr, .. } => {
                let ir = self.ir(&elem_ty).address_of();
                let elem = self
                    .b
                    .emit_value(InstKind::TupleElementAddr { addr, index }, ir, Ownership::Trivial);
                Ok(Managed::addr(elem))
            }
            Managed::Value { value, .. } => {
                let ir = self.ir(&elem_ty);
                let ownership = if self.is_trivial(&elem_ty) {
                    Ownership::Trivial
                } else {
                    Ownership::Guaranteed
                };
                let elem = self
                    .b
                    .emit_value(InstKind::TupleExtract { tuple: value, index }, ir, ownership);
                Ok(Managed::value(elem))
            }
        }
    }

    pub(super) fn build_tuple(&mut self, elems: Vec<(Managed, Type)>, ty: &Type) -> Managed {
        if self.is_address_only(ty) {
            let temp = self.alloc_temp(ty, None);
            for (index, (m, elem_ty)) in elems.into_iter().enumerate() {
                let ir = self.ir(&elem_ty).address_of();
                let addr = self
                    .b
                    .emit_value(InstKind::TupleElementAddr { addr: temp, index }, ir, Ownership::Trivial);
                self.store_into(m, &elem_ty, addr, true);
            }
            return self.manage_temp(temp, ty);
        }
        let values = elems
            .into_iter()
            .map(|(m, elem_ty)| self.owned(m, &elem_ty))
            .collect::<Vec<_>>();
        let ir = self.ir(ty);
        let ownership = self.cx.types.ownership(ty);
        let tuple = self.b.emit_value(InstKind::Tuple { elems: values }, ir, ownership);
        self.manage(tuple)
    }

    // -- Operators --

    fn lower_binary(&mut self, expr: &'a Expr, op: BinaryOp, lhs: &'a Expr, rhs: &'a Expr) -> LowerResult<Managed> {
        let span = expr.span;
        match op {
            BinaryOp::And | BinaryOp::Or => self.lower_logical(op, lhs, rhs),
            BinaryOp::NilCoalesce => self.lower_nil_coalesce(expr, lhs, rhs),
            BinaryOp::HalfOpenRange | BinaryOp::ClosedRange => {
                Err(self.unsupported("a range outside of 'for-in'", span))
            }
            BinaryOp::Eq | BinaryOp::Ne
                if matches!(strip_parens(lhs).kind, ExprKind::NilLit)
                    || matches!(strip_parens(rhs).kind, ExprKind::NilLit) =>
            {
                let value = if matches!(strip_parens(rhs).kind, ExprKind::NilLit) {
                    lhs
                } else {
                    rhs
                };
                self.lower_nil_compare(op == BinaryOp::Eq, value)
            }
            _ => {
                let info = self
                    .cx
                    .tables
                    .calls
                    .get(&expr.id)
                    .ok_or_else(|| self.error(LowerErrorKind::MissingType, span))?;
                self.lower_operator_call(info, vec![ArgSource::Expr(lhs), ArgSource::Expr(rhs)], span)
            }
        }
    }

    fn bool_literal(&mut self, value: bool) -> ValueId {
        let bool_ty = self.cx.set.bool_type();
        let ir = self.ir(&bool_ty);
        self.b.integer_literal(ir, i128::from(value))
    }

    /// `&&` and `||` evaluate the right side only when needed.
    fn lower_logical(&mut self, op: BinaryOp, lhs: &'a Expr, rhs: &'a Expr) -> LowerResult<Managed> {
        let bool_ty = self.cx.set.bool_type();
        let merge = self.begin_merge(&bool_ty);
        let depth = self.depth();
        let left = self.lower_bool(lhs)?;
        let rhs_bb = self.b.add_block();
        let short_bb = self.b.add_block();
        let short_value = op == BinaryOp::Or;
        if short_value {
            self.b.cond_br(left, short_bb, rhs_bb);
        } else {
            self.b.cond_br(left, rhs_bb, short_bb);
        }
        self.b.switch_to(short_bb);
        let short = self.bool_literal(short_value);
        self.branch_to_merge(&merge, Managed::value(short), depth)?;
        self.b.switch_to(rhs_bb);
        let right = self.lower_bool(rhs)?;
        self.branch_to_merge(&merge, Managed::value(right), depth)?;
        Ok(self.finish_merge(merge))
    }

    fn lower_nil_coalesce(&mut self, expr: &'a Expr, lhs: &'a Expr, rhs: &'a Expr) -> LowerResult<Managed> {
        let tables = self.cx.tables;
        let ty = tables.type_of(expr.id);
        let optional_ty = tables.converted_type_of(lhs.id);
        let payload_ty = optional_ty.optional_payload().cloned().unwrap_or_else(|| ty.clone());
        let merge = self.begin_merge(&ty);
        let depth = self.depth();
        let none_bb = self.b.add_block();
        let m = self.lower_expr(lhs)?;
        let payload = self.unwrap_or_exit(m, &optional_ty, &payload_ty, Exit { block: none_bb, depth }, expr.span)?;
        self.branch_to_merge(&merge, payload, depth)?;
        self.b.switch_to(none_bb);
        let fallback = self.lower_expr(rhs)?;
        self.branch_to_merge(&merge, fallback, depth)?;
        Ok(self.finish_merge(merge))
    }

    /// `x == nil` / `x != nil` test the optional's case.
    fn lower_nil_compare(&mut self, is_eq: bool, value: &'a Expr) -> LowerResult<Managed> {
        let optional_ty = self.cx.tables.converted_type_of(value.id);
        let bool_ty = self.cx.set.bool_type();
        let some = self.optional_case("some", value.span)?;
        let none = self.optional_case("none", value.span)?;
        let merge = self.begin_merge(&bool_ty);
        let depth = self.depth();
        let m = self.lower_expr(value)?;
        let some_bb = self.b.add_block();
        let none_bb = self.b.add_block();
        let cases = vec![
            SwitchCase {
                case: some,
                target: some_bb,
            },
            SwitchCase {
                case: none,
                target: none_bb,
            },
        ];
        if self.is_address_only(&optional_ty) {
            let addr = self.to_addr(m, &optional_ty);
            self.b.terminate(Terminator::SwitchEnumAddr {
                addr,
                cases,
                default: None,
            });
            self.b.switch_to(some_bb);
        } else {
            let value = self.owned(m, &optional_ty);
            self.b.terminate(Terminator::SwitchEnum {
                value,
                cases,
                default: None,
            });
            let payload_ty = optional_ty.optional_payload().cloned().unwrap_or(Type::Error);
            let payload_ir = self.ir(&payload_ty);
            let ownership = self.cx.types.ownership(&payload_ty);
            let payload = self.b.add_block_param(some_bb, payload_ir, ownership);
            self.b.switch_to(some_bb);
            self.b.destroy_value(payload);
        }
        let when_some = self.bool_literal(!is_eq);
        let saved = self.save_cleanups();
        self.branch_to_merge(&merge, Managed::value(when_some), depth)?;
        self.restore_cleanups(saved);
        self.b.switch_to(none_bb);
        let when_none = self.bool_literal(is_eq);
        self.branch_to_merge(&merge, Managed::value(when_none), depth)?;
        Ok(self.finish_merge(merge))
    }

    fn lower_ternary(
        &mut self,
        expr: &'a Expr,
        cond: &'a Expr,
        then_expr: &'a Expr,
        else_expr: &'a Expr,
    ) -> LowerResult<Managed> {
        let ty = self.cx.tables.type_of(expr.id);
        let merge = self.begin_merge(&ty);
        let depth = self.depth();
        let value = self.lower_bool(cond)?;
        let then_bb = self.b.add_block();
        let else_bb = self.b.add_block();
        self.b.cond_br(value, then_bb, else_bb);
        self.b.switch_to(then_bb);
        let m = self.lower_expr(then_expr)?;
        self.branch_to_merge(&merge, m, depth)?;
        self.b.switch_to(else_bb);
        let m = self.lower_expr(else_expr)?;
        self.branch_to_merge(&merge, m, depth)?;
        Ok(self.finish_merge(merge))
    }

    /// Root of an optional chain: `nil` when any `?` inside finds `nil`.
    fn lower_optional_eval(&mut self, expr: &'a Expr, inner: &'a Expr) -> LowerResult<Managed> {
        let tables = self.cx.tables;
        let ty = tables.type_of(expr.id);
        let inner_ty = tables.converted_type_of(inner.id);
        let merge = self.begin_merge(&ty);
        let depth = self.depth();
        let none_bb = self.b.add_block();
        self.chains.push(Exit { block: none_bb, depth });
        let result = self.lower_expr(inner);
        self.chains.pop();
        let m = result?;
        if self.b.is_reachable() {
            let m = if inner_ty == ty {
                m
            } else {
                self.wrap_optional(m, &inner_ty, &ty, expr.span)?
            };
            self.branch_to_merge(&merge, m, depth)?;
        }
        self.drop_cleanups(depth);
        self.b.switch_to(none_bb);
        let none = self.optional_none(&ty, expr.span)?;
        self.branch_to_merge(&merge, none, depth)?;
        Ok(self.finish_merge(merge))
    }

    fn lower_try(&mut self, expr: &'a Expr, kind: TryKind, inner: &'a Expr) -> LowerResult<Managed> {
        if kind == TryKind::Plain {
            return self.lower_expr(inner);
        }
        let tables = self.cx.tables;
        let error_ty = self.cx.set.error_existential();
        let error_ir = self.ir(&error_ty);
        let ty = tables.type_of(expr.id);
        let merge = match kind {
            TryKind::Optional => Some(self.begin_merge(&ty)),
            _ => None,
        };
        let depth = self.depth();
        let catch_bb = self.b.add_block();
        let error = self.b.add_block_param(catch_bb, error_ir, Ownership::Owned);
        self.catches.push(Exit { block: catch_bb, depth });
        let result = self.lower_expr(inner);
        self.catches.pop();
        let m = result?;

        let Some(merge) = merge else {
            // `try!`
            let cont = self.b.current_block();
            let saved = self.save_cleanups();
            self.drop_cleanups(depth);
            self.b.switch_to(catch_bb);
            self.trap("unexpected_error", vec![error]);
            self.restore_cleanups(saved);
            if let Some(cont) = cont {
                self.b.switch_to(cont);
            }
            return Ok(m);
        };

        if self.b.is_reachable() {
            let inner_ty = tables.converted_type_of(inner.id);
            let m = if inner_ty == ty {
                m
            } else {
                self.wrap_optional(m, &inner_ty, &ty, expr.span)?
            };
            self.branch_to_merge(&merge, m, depth)?;
        }
        self.drop_cleanups(depth);
        self.b.switch_to(catch_bb);
        self.b.destroy_value(error);
        let none = self.optional_none(&ty, expr.span)?;
        self.branch_to_merge(&merge, none, depth)?;
        Ok(self.finish_merge(merge))
    }
}
