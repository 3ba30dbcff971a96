//! Expression checking.

use crate::core::diag::Span;
use crate::core::resolve::{DeclKind, LiteralKind, MemberAccess, lookup_unqualified};
use crate::core::tree::{
    AssignOp, BinaryOp, ClosureExpr, Expr, ExprKind, StmtKind, TryKind, TupleElemExpr, UnaryOp,
};
use crate::core::typecheck::call::{ArgInfo, Cand, Deferred, plain_params};
use crate::core::typecheck::engine::{BodyKind, Checker, FuncContext};
use crate::core::typecheck::errors::TypeCheckErrorKind;
use crate::core::typecheck::model::*;
use crate::core::typecheck::unify::VarOrigin;
use crate::core::types::{Substitution, TupleElem, Type};

impl<'s, 'a> Checker<'s, 'a> {
    /// Infers the type of `expr`, using `expected` as a hint only.
    pub(crate) fn infer_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        let ty = self.infer_inner(expr, expected);
        self.record(expr.id, &ty);
        ty
    }

    /// Checks `expr` against `expected`, recording the conversions needed.
    pub(crate) fn check_expr_with(&mut self, expr: &Expr, expected: &Type) -> Type {
        let ty = self.infer_expr(expr, Some(expected));
        self.coerce_expr(expr, &ty, expected);
        ty
    }

    pub(crate) fn check_condition_expr(&mut self, expr: &Expr) {
        let bool_ty = self.set.bool_type();
        let ty = self.infer_expr(expr, Some(&bool_ty));
        if !self.try_unify(&ty, &bool_ty) {
            let found = self.display(&ty);
            self.error(TypeCheckErrorKind::ConditionNotBool(found), expr.span);
        }
    }

    fn infer_inner(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::IntLit(_) => self.fresh(VarOrigin::Literal(LiteralKind::Integer)),
            ExprKind::FloatLit(_) => self.fresh(VarOrigin::Literal(LiteralKind::Float)),
            ExprKind::StringLit(_) => self.fresh(VarOrigin::Literal(LiteralKind::String)),
            ExprKind::BoolLit(_) => self.fresh(VarOrigin::Literal(LiteralKind::Boolean)),
            ExprKind::NilLit => self.fresh(VarOrigin::Literal(LiteralKind::Nil)),
            ExprKind::Ident(name) => self.check_ident(expr, name, expected),
            ExprKind::SelfRef => self.check_self(expr),
            ExprKind::SuperRef => {
                self.error(
                    TypeCheckErrorKind::Unsupported("bare 'super'".to_string()),
                    expr.span,
                );
                Type::Error
            }
            ExprKind::Member { base, name, .. } => self.check_member(expr, base, name, expected),
            ExprKind::ImplicitMember(name) => self.check_implicit_member(expr, name, expected),
            ExprKind::TupleIndex { base, index } => {
                let base_ty = self.infer_expr(base, None);
                match self.shallow(&base_ty) {
                    Type::Tuple(elems) if *index < elems.len() => {
                        self.record_ref(expr.id, ValueRef::TupleElement(*index));
                        elems[*index].ty.clone()
                    }
                    Type::Error => Type::Error,
                    other => {
                        let ty = self.display(&other);
                        self.error(
                            TypeCheckErrorKind::TupleIndexOutOfRange { ty, index: *index },
                            expr.span,
                        );
                        Type::Error
                    }
                }
            }
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args, expected),
            ExprKind::Subscript { base, args } => self.check_subscript(expr, base, args),
            ExprKind::Closure(closure) => self.check_closure(closure, expected),
            ExprKind::Unary { op, operand } => {
                let name = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                let operands = vec![self.operand_info(operand)];
                self.check_operator(expr.id, name, operands, expected, expr.span)
            }
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(expr, *op, lhs, rhs, expected),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.check_condition_expr(cond);
                match expected {
                    Some(expected) => {
                        self.check_expr_with(then_expr, expected);
                        self.check_expr_with(else_expr, expected);
                        expected.clone()
                    }
                    None => {
                        let then_ty = self.infer_expr(then_expr, None);
                        self.check_expr_with(else_expr, &then_ty);
                        then_ty
                    }
                }
            }
            ExprKind::Assign { op, lhs, rhs } => {
                self.check_assign(expr, *op, lhs, rhs);
                Type::void()
            }
            ExprKind::ForceUnwrap(inner) => {
                let ty = self.infer_expr(inner, None);
                self.unwrap_optional(&ty, inner.span, false)
            }
            ExprKind::BindOptional(inner) => {
                let ty = self.infer_expr(inner, None);
                self.unwrap_optional(&ty, inner.span, true)
            }
            ExprKind::OptionalEval(inner) => {
                let hint = expected.map(|ty| match self.shallow(ty) {
                    Type::Optional(payload) => *payload,
                    other => other,
                });
                let ty = self.infer_expr(inner, hint.as_ref());
                match self.shallow(&ty) {
                    optional @ Type::Optional(_) => optional,
                    Type::Error => Type::Error,
                    other => Type::optional(other),
                }
            }
            ExprKind::Paren(inner) => match expected {
                Some(expected) => self.check_expr_with(inner, expected),
                None => self.infer_expr(inner, None),
            },
            ExprKind::Tuple(elems) => self.check_tuple(elems, expected),
            ExprKind::Try { kind, expr: inner } => self.check_try(*kind, inner, expected),
            ExprKind::As { expr: inner, ty } => {
                let target = self.resolve_type_expr(ty);
                self.check_expr_with(inner, &target);
                target
            }
            ExprKind::InOut(inner) => {
                let ty = self.infer_expr(inner, None);
                self.check_lvalue(inner);
                Type::InOut(Box::new(ty))
            }
            ExprKind::CodeCompletion => {
                let expected = expected.map(|ty| self.vars.resolve(ty));
                self.completion_facts().expected = expected;
                Type::Error
            }
            ExprKind::MemberCompletion(base) => {
                let base_ty = self.infer_expr(base, None);
                let base_ty = self.resolved(&base_ty);
                let expected = expected.map(|ty| self.vars.resolve(ty));
                let facts = self.completion_facts();
                facts.base = Some(base_ty);
                facts.expected = expected;
                Type::Error
            }
            ExprKind::ImplicitMemberCompletion => {
                let base = self.implicit_member_base(expected);
                let expected = expected.map(|ty| self.vars.resolve(ty));
                let facts = self.completion_facts();
                facts.expected = expected;
                facts.base = base.map(|ty| Type::Metatype(Box::new(ty)));
                Type::Error
            }
            ExprKind::Error => Type::Error,
        }
    }

    // -- Names --

    fn check_ident(&mut self, expr: &Expr, name: &str, expected: Option<&Type>) -> Type {
        if let Some(node) = self.lookup_local(name) {
            self.record_ref(expr.id, ValueRef::Local(node));
            return self
                .tables
                .locals
                .get(&node)
                .map(|local| local.ty.clone())
                .unwrap_or(Type::Error);
        }
        let results = lookup_unqualified(self.set, self.context_decl(), Some(name));
        let Some(first) = results.first() else {
            self.error(TypeCheckErrorKind::UnresolvedIdentifier(name.to_string()), expr.span);
            return Type::Error;
        };
        if self.set.decl(first.decl).is_type_decl() {
            let ty = self.type_of_type_decl(first.decl);
            self.record_ref(expr.id, ValueRef::Type(ty.clone()));
            return Type::Metatype(Box::new(ty));
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
            .collect::<Vec<_>>();
        self.pick_value(expr, name, &cands, expected)
    }

    fn check_self(&mut self, expr: &Expr) -> Type {
        let Some(ctx) = self.func() else {
            self.error(TypeCheckErrorKind::SelfOutsideType, expr.span);
            return Type::Error;
        };
        let is_static = ctx.is_static;
        let Some(self_ty) = ctx.self_ty.clone() else {
            self.error(TypeCheckErrorKind::SelfOutsideType, expr.span);
            return Type::Error;
        };
        self.record_ref(expr.id, ValueRef::SelfValue);
        if is_static {
            Type::Metatype(Box::new(self_ty))
        } else {
            self_ty
        }
    }

    /// Chooses among value candidates of a name used without a call.
    fn pick_value(&mut self, expr: &Expr, name: &str, cands: &[Cand], expected: Option<&Type>) -> Type {
        let mut ordered = cands.to_vec();
        ordered.sort_by_key(|cand| {
            cand.decl
                .is_some_and(|decl| matches!(self.set.decl(decl).kind, DeclKind::Func(_)))
        });
        if let Some(expected) = expected {
            for cand in &ordered {
                let snapshot = self.vars.clone();
                let (ty, subst) = self.member_value_type(cand);
                // Conversions are recorded by the caller.
                if self.coerce_types(&ty, expected).is_some() {
                    return self.commit_value(expr, cand, ty, subst);
                }
                self.vars = snapshot;
            }
        }
        let Some(first) = ordered.first() else {
            self.error(TypeCheckErrorKind::UnresolvedIdentifier(name.to_string()), expr.span);
            return Type::Error;
        };
        let functions = ordered
            .iter()
            .filter(|cand| {
                cand.decl
                    .is_some_and(|decl| matches!(self.set.decl(decl).kind, DeclKind::Func(_)))
            })
            .count();
        if functions > 1 && functions == ordered.len() && expected.is_none() {
            self.error(TypeCheckErrorKind::AmbiguousOverload(name.to_string()), expr.span);
        }
        let first = first.clone();
        let (ty, subst) = self.member_value_type(&first);
        self.commit_value(expr, &first, ty, subst)
    }

    fn commit_value(
        &mut self,
        expr: &Expr,
        cand: &Cand,
        ty: Type,
        subst: Substitution,
    ) -> Type {
        if let Some(decl) = cand.decl {
            let d = self.set.decl(decl);
            if d.attrs.unavailable {
                let name = d.full_name();
                self.error(TypeCheckErrorKind::Unavailable(name), expr.span);
            }
        }
        if let Some(decl_ref) = cand.decl_ref(subst) {
            self.record_ref(expr.id, ValueRef::Decl(decl_ref));
        }
        ty
    }

    // -- Members --

    fn check_member(&mut self, expr: &Expr, base: &Expr, name: &str, expected: Option<&Type>) -> Type {
        if matches!(base.kind, ExprKind::SuperRef) {
            let Some(super_ty) = self.super_type() else {
                self.error(TypeCheckErrorKind::SuperOutsideClass, base.span);
                return Type::Error;
            };
            self.record(base.id, &super_ty);
            self.record_ref(base.id, ValueRef::SelfValue);
            let mut cands = self.member_candidates(&super_ty, Some(name), MemberAccess::Instance);
            for cand in cands.iter_mut() {
                cand.via_super = true;
            }
            if cands.is_empty() {
                self.report_missing_member(&super_ty, name, expr.span);
                return Type::Error;
            }
            return self.pick_value(expr, name, &cands, expected);
        }

        let base_ty = self.infer_expr(base, None);
        let base_ty = self.shallow(&base_ty);
        let cands = match &base_ty {
            Type::Error => return Type::Error,
            Type::Var(_) => {
                self.error(TypeCheckErrorKind::CannotInfer, base.span);
                return Type::Error;
            }
            Type::Metatype(inner) => {
                let found = self.member_candidates(inner, Some(name), MemberAccess::Static);
                if found.is_empty()
                    && !self
                        .member_candidates(inner, Some(name), MemberAccess::Instance)
                        .is_empty()
                {
                    self.error(TypeCheckErrorKind::InstanceMemberOnType(name.to_string()), expr.span);
                    return Type::Error;
                }
                found
            }
            Type::Tuple(elems) => {
                if let Some(index) = elems.iter().position(|e| e.label.as_deref() == Some(name)) {
                    self.record_ref(expr.id, ValueRef::TupleElement(index));
                    return elems[index].ty.clone();
                }
                Vec::new()
            }
            other => {
                let found = self.member_candidates(other, Some(name), MemberAccess::Instance);
                if found.is_empty()
                    && !self
                        .member_candidates(other, Some(name), MemberAccess::Static)
                        .is_empty()
                {
                    self.error(TypeCheckErrorKind::StaticMemberOnInstance(name.to_string()), expr.span);
                    return Type::Error;
                }
                found
            }
        };
        if cands.is_empty() {
            self.report_missing_member(&base_ty, name, expr.span);
            return Type::Error;
        }
        self.pick_value(expr, name, &cands, expected)
    }

    fn check_implicit_member(&mut self, expr: &Expr, name: &str, expected: Option<&Type>) -> Type {
        let Some(base) = self.implicit_member_base(expected) else {
            self.error(
                TypeCheckErrorKind::ImplicitMemberWithoutContext(name.to_string()),
                expr.span,
            );
            return Type::Error;
        };
        let mut cands = self.member_candidates(&base, Some(name), MemberAccess::Static);
        if cands.is_empty() {
            // `.none` against `T?` names a member of the optional itself.
            if let Some(expected) = expected {
                let outer = self.shallow(expected);
                if matches!(outer, Type::Optional(_)) {
                    cands = self.member_candidates(&outer, Some(name), MemberAccess::Static);
                }
            }
        }
        if cands.is_empty() {
            self.report_missing_member(&base, name, expr.span);
            return Type::Error;
        }
        self.pick_value(expr, name, &cands, expected)
    }

    // -- Operators --

    fn check_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        expected: Option<&Type>,
    ) -> Type {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                self.check_condition_expr(lhs);
                self.check_condition_expr(rhs);
                self.set.bool_type()
            }
            BinaryOp::NilCoalesce => {
                let lhs_ty = self.infer_expr(lhs, None);
                let payload = match self.shallow(&lhs_ty) {
                    Type::Optional(payload) => *payload,
                    Type::Error => return Type::Error,
                    var @ Type::Var(_) => {
                        let payload = self.fresh(VarOrigin::Placeholder);
                        self.unify(&var, &Type::optional(payload.clone()));
                        payload
                    }
                    other => {
                        let found = self.display(&other);
                        self.error(TypeCheckErrorKind::ChainNonOptional(found), lhs.span);
                        return Type::Error;
                    }
                };
                self.check_expr_with(rhs, &payload);
                payload
            }
            BinaryOp::HalfOpenRange | BinaryOp::ClosedRange => {
                self.error(
                    TypeCheckErrorKind::Unsupported("range outside of 'for-in'".to_string()),
                    expr.span,
                );
                self.infer_expr(lhs, None);
                self.infer_expr(rhs, None);
                Type::Error
            }
            BinaryOp::Eq | BinaryOp::Ne
                if matches!(lhs.kind, ExprKind::NilLit) || matches!(rhs.kind, ExprKind::NilLit) =>
            {
                // `x == nil` compares the optional's case.
                let (value, nil) = if matches!(rhs.kind, ExprKind::NilLit) {
                    (lhs, rhs)
                } else {
                    (rhs, lhs)
                };
                let value_ty = self.infer_expr(value, None);
                match self.shallow(&value_ty) {
                    optional @ Type::Optional(_) => {
                        self.record(nil.id, &optional);
                    }
                    Type::Error => {}
                    other => {
                        let found = self.display(&other);
                        self.error(TypeCheckErrorKind::ChainNonOptional(found), value.span);
                    }
                }
                self.set.bool_type()
            }
            _ => {
                let operands = vec![self.operand_info(lhs), self.operand_info(rhs)];
                self.check_operator(expr.id, op.func_name(), operands, expected, expr.span)
            }
        }
    }

    /// Bounds of a `for-in` range; both sides are `Int`.
    pub(crate) fn check_range(&mut self, expr: &Expr) -> Type {
        let int = self.set.int_type();
        match &expr.kind {
            ExprKind::Binary {
                op: BinaryOp::HalfOpenRange | BinaryOp::ClosedRange,
                lhs,
                rhs,
            } => {
                self.check_expr_with(lhs, &int);
                self.check_expr_with(rhs, &int);
                let ty = Type::Tuple(vec![
                    TupleElem {
                        label: Some("lowerBound".to_string()),
                        ty: int.clone(),
                    },
                    TupleElem {
                        label: Some("upperBound".to_string()),
                        ty: int,
                    },
                ]);
                self.record(expr.id, &ty);
                ty
            }
            ExprKind::Paren(inner) => {
                let ty = self.check_range(inner);
                self.record(expr.id, &ty);
                ty
            }
            _ => {
                self.infer_expr(expr, None);
                self.error(
                    TypeCheckErrorKind::Unsupported("'for-in' over a non-range sequence".to_string()),
                    expr.span,
                );
                Type::Error
            }
        }
    }

    fn check_assign(&mut self, expr: &Expr, op: AssignOp, lhs: &Expr, rhs: &Expr) {
        let lhs_ty = self.infer_expr(lhs, None);
        self.check_lvalue(lhs);
        let operator = match op {
            AssignOp::Assign => {
                self.check_expr_with(rhs, &lhs_ty);
                return;
            }
            AssignOp::Add => "+",
            AssignOp::Sub => "-",
            AssignOp::Mul => "*",
        };
        let operands = vec![
            ArgInfo {
                label: None,
                trailing: false,
                expr: None,
                ty: Some(lhs_ty.clone()),
                deferred: Deferred::No,
                member_name: None,
            },
            self.operand_info(rhs),
        ];
        let result = self.check_operator(expr.id, operator, operands, Some(&lhs_ty), expr.span);
        if !self.unify(&result, &lhs_ty) {
            self.mismatch(&lhs_ty, &result, expr.span);
        }
    }

    fn unwrap_optional(&mut self, ty: &Type, span: Span, chain: bool) -> Type {
        match self.shallow(ty) {
            Type::Optional(payload) => *payload,
            Type::Error => Type::Error,
            var @ Type::Var(_) => {
                let payload = self.fresh(VarOrigin::Placeholder);
                self.unify(&var, &Type::optional(payload.clone()));
                payload
            }
            other => {
                let found = self.display(&other);
                let kind = if chain {
                    TypeCheckErrorKind::ChainNonOptional(found)
                } else {
                    TypeCheckErrorKind::ForceUnwrapNonOptional(found)
                };
                self.error(kind, span);
                Type::Error
            }
        }
    }

    fn check_tuple(&mut self, elems: &[TupleElemExpr], expected: Option<&Type>) -> Type {
        let hints = match expected.map(|ty| self.shallow(ty)) {
            Some(Type::Tuple(hints)) if hints.len() == elems.len() => Some(hints),
            _ => None,
        };
        let mut out = Vec::with_capacity(elems.len());
        for (index, elem) in elems.iter().enumerate() {
            let ty = match hints.as_ref().map(|hints| hints[index].ty.clone()) {
                Some(hint) => {
                    let ty = self.infer_expr(&elem.expr, Some(&hint));
                    if self.coerce_expr(&elem.expr, &ty, &hint) {
                        hint
                    } else {
                        ty
                    }
                }
                None => self.infer_expr(&elem.expr, None),
            };
            out.push(TupleElem {
                label: elem.label.clone(),
                ty,
            });
        }
        Type::Tuple(out)
    }

    fn check_try(&mut self, kind: TryKind, inner: &Expr, expected: Option<&Type>) -> Type {
        let handled = kind != TryKind::Plain;
        self.try_depth += 1;
        if handled {
            if let Some(ctx) = self.func_mut() {
                ctx.catch_depth += 1;
            }
        }
        let hint = match (kind, expected) {
            (TryKind::Optional, Some(expected)) => match self.shallow(expected) {
                Type::Optional(payload) => Some(*payload),
                _ => None,
            },
            (_, expected) => expected.cloned(),
        };
        let ty = self.infer_expr(inner, hint.as_ref());
        if handled {
            if let Some(ctx) = self.func_mut() {
                ctx.catch_depth -= 1;
            }
        }
        self.try_depth -= 1;
        match kind {
            TryKind::Optional => Type::optional(ty),
            _ => ty,
        }
    }

    // -- Closures --

    fn check_closure(&mut self, closure: &ClosureExpr, expected: Option<&Type>) -> Type {
        let hint = expected.and_then(|ty| match self.shallow(ty) {
            Type::Function(fn_ty) => Some(*fn_ty),
            Type::Optional(inner) => match self.shallow(&inner) {
                Type::Function(fn_ty) => Some(*fn_ty),
                _ => None,
            },
            _ => None,
        });
        if let Some(hint) = &hint {
            if hint.params.len() != closure.params.len() {
                let rendered = self.display(&Type::Function(Box::new(hint.clone())));
                self.error(
                    TypeCheckErrorKind::ClosureParamCount {
                        expected: rendered,
                        expected_count: hint.params.len(),
                        found: closure.params.len(),
                    },
                    closure.body.span,
                );
            }
        }
        let hint = hint.filter(|hint| hint.params.len() == closure.params.len());

        let mut params = Vec::with_capacity(closure.params.len());
        for (index, param) in closure.params.iter().enumerate() {
            let ty = match (&param.ty, &hint) {
                (Some(texpr), hint) => {
                    let ty = self.resolve_type_expr(texpr);
                    if let Some(hint) = hint {
                        self.unify(&ty, &hint.params[index].ty);
                    }
                    ty
                }
                (None, Some(hint)) => hint.params[index].ty.clone(),
                (None, None) => self.fresh(VarOrigin::ClosureParam),
            };
            params.push(ty);
        }
        let result = match (&closure.result, &hint) {
            (Some(texpr), hint) => {
                let ty = self.resolve_type_expr(texpr);
                if let Some(hint) = hint {
                    self.unify(&ty, &hint.result);
                }
                ty
            }
            (None, Some(hint)) => hint.result.clone(),
            (None, None) => self.fresh(VarOrigin::ClosureResult),
        };
        let throws = closure.throws || hint.as_ref().is_some_and(|hint| hint.throws);

        let outer = self.func().cloned();
        let mut ctx = FuncContext::new(BodyKind::Closure, self.context_decl(), result.clone());
        ctx.throws = throws;
        if let Some(outer) = &outer {
            ctx.self_ty = outer.self_ty.clone();
            ctx.self_mutable = outer.self_mutable;
            ctx.is_static = outer.is_static;
        }
        self.funcs.push(ctx);
        let saved_try = std::mem::replace(&mut self.try_depth, 0);
        self.push_scope();
        for (param, ty) in closure.params.iter().zip(&params) {
            if param.name != "_" {
                self.declare_local(&param.name, param.id, ty, true);
            } else {
                self.tables.locals.insert(
                    param.id,
                    LocalInfo {
                        name: "_".to_string(),
                        ty: ty.clone(),
                        is_let: true,
                    },
                );
            }
            self.record(param.id, ty);
        }

        let single = match closure.body.stmts.as_slice() {
            [stmt] => match &stmt.kind {
                StmtKind::Expr(expr) => Some(expr),
                _ => None,
            },
            _ => None,
        };
        match single {
            Some(body_expr) => {
                let ty = self.infer_expr(body_expr, Some(&result));
                let void_result = self.shallow(&result).is_void();
                if !(void_result && !self.shallow(&ty).is_void()) {
                    self.coerce_expr(body_expr, &ty, &result);
                    self.tables.implicit_returns.insert(body_expr.id);
                }
            }
            None => {
                self.check_stmts(&closure.body.stmts);
                let saw_return = self.func().is_some_and(|ctx| ctx.saw_return);
                if !saw_return && matches!(self.shallow(&result), Type::Var(_)) {
                    self.unify(&result, &Type::void());
                }
            }
        }
        self.pop_scope();
        self.try_depth = saved_try;
        self.funcs.pop();
        Type::function(plain_params(params), result, throws)
    }

    // -- Mutability --

    pub(crate) fn check_lvalue(&mut self, expr: &Expr) {
        if self.is_mutable(expr) {
            return;
        }
        let name = match &expr.kind {
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Member { name, .. } => name.clone(),
            ExprKind::SelfRef => "self".to_string(),
            _ => "expression".to_string(),
        };
        self.error(TypeCheckErrorKind::ImmutableAssignment(name), expr.span);
    }

    pub(crate) fn is_mutable(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Ident(_) | ExprKind::Member { .. } => {
                match self.tables.refs.get(&expr.id) {
                    Some(ValueRef::Local(node)) => {
                        self.tables.locals.get(node).is_some_and(|local| !local.is_let)
                    }
                    Some(ValueRef::Decl(decl_ref)) => self.decl_ref_mutable(expr, decl_ref),
                    Some(ValueRef::TupleElement(_)) => match &expr.kind {
                        ExprKind::Member { base, .. } => self.is_mutable(base),
                        _ => false,
                    },
                    Some(_) => false,
                    // Unresolved names were reported already.
                    None => true,
                }
            }
            ExprKind::SelfRef => self
                .func()
                .is_some_and(|ctx| ctx.self_mutable || self.is_class_context()),
            ExprKind::TupleIndex { base, .. } => self.is_mutable(base),
            ExprKind::Subscript { base, .. } => {
                let settable = match self.tables.refs.get(&expr.id) {
                    Some(ValueRef::Decl(decl_ref)) => matches!(
                        self.set.decl(decl_ref.decl).kind,
                        DeclKind::Subscript { settable: true, .. }
                    ),
                    _ => true,
                };
                let base_ty = self.tables.type_of(base.id);
                settable && (self.set.is_class_type(&self.resolved(&base_ty)) || self.is_mutable(base))
            }
            ExprKind::Paren(inner)
            | ExprKind::ForceUnwrap(inner)
            | ExprKind::BindOptional(inner)
            | ExprKind::OptionalEval(inner) => self.is_mutable(inner),
            ExprKind::Error => true,
            _ => false,
        }
    }

    fn decl_ref_mutable(&self, expr: &Expr, decl_ref: &DeclRef) -> bool {
        let decl = self.set.decl(decl_ref.decl);
        let DeclKind::Var(info) = &decl.kind else {
            return false;
        };
        let in_init = self
            .func()
            .is_some_and(|ctx| matches!(ctx.kind, BodyKind::Initializer { .. }));
        let through_self = decl_ref.implicit_self
            || matches!(&expr.kind, ExprKind::Member { base, .. } if matches!(base.kind, ExprKind::SelfRef));
        if info.is_let {
            return in_init && through_self;
        }
        if !info.is_settable() {
            return false;
        }
        if decl.parent.is_none() || decl.is_static {
            return true;
        }
        let base_is_class = decl_ref
            .base
            .as_ref()
            .is_some_and(|base| self.set.is_class_type(&self.resolved(base)));
        if base_is_class {
            return true;
        }
        match &expr.kind {
            ExprKind::Member { base, .. } => self.is_mutable(base),
            _ => self.func().is_some_and(|ctx| ctx.self_mutable),
        }
    }
}
