//! Pattern checking against a known subject type.

use crate::core::parse::CompletionSite;
use crate::core::resolve::{DeclKind, MemberAccess};
use crate::core::tree::{ExprKind, Pattern, PatternKind};
use crate::core::typecheck::call::ArgInfo;
use crate::core::typecheck::call::Deferred;
use crate::core::typecheck::engine::Checker;
use crate::core::typecheck::errors::TypeCheckErrorKind;
use crate::core::typecheck::model::ValueRef;
use crate::core::typecheck::unify::VarOrigin;
use crate::core::types::{TupleElem, Type};

impl<'s, 'a> Checker<'s, 'a> {
    /// Checks `pattern` against values of type `ty`. Bindings are declared
    /// in the current scope when `declare` is set.
    pub(crate) fn check_pattern(&mut self, pattern: &Pattern, ty: &Type, declare: bool) {
        self.record(pattern.id, ty);
        match &pattern.kind {
            PatternKind::Wildcard | PatternKind::Error => {}
            PatternKind::Binding { name, is_let } => {
                if declare {
                    self.declare_local(name, pattern.id, ty, *is_let);
                }
            }
            PatternKind::Tuple(elems) => {
                let elem_types = match self.shallow(ty) {
                    Type::Tuple(types) if types.len() == elems.len() => {
                        types.into_iter().map(|elem| elem.ty).collect::<Vec<_>>()
                    }
                    Type::Error => vec![Type::Error; elems.len()],
                    var @ Type::Var(_) => {
                        let types = (0..elems.len())
                            .map(|_| self.fresh(VarOrigin::Placeholder))
                            .collect::<Vec<_>>();
                        let tuple = Type::Tuple(types.iter().cloned().map(TupleElem::unlabeled).collect());
                        self.unify(&var, &tuple);
                        types
                    }
                    other => {
                        self.pattern_mismatch(pattern, "tuple", &other);
                        vec![Type::Error; elems.len()]
                    }
                };
                for (elem, elem_ty) in elems.iter().zip(&elem_types) {
                    self.check_pattern(elem, elem_ty, declare);
                }
            }
            PatternKind::EnumCase {
                parent,
                name,
                payload,
            } => self.check_enum_case_pattern(pattern, parent.as_ref(), name, payload.as_deref(), ty, declare),
            PatternKind::OptionalSome(inner) => {
                let payload = match self.shallow(ty) {
                    Type::Optional(payload) => *payload,
                    Type::Error => Type::Error,
                    var @ Type::Var(_) => {
                        let payload = self.fresh(VarOrigin::Placeholder);
                        self.unify(&var, &Type::optional(payload.clone()));
                        payload
                    }
                    other => {
                        self.pattern_mismatch(pattern, "Optional", &other);
                        Type::Error
                    }
                };
                self.check_pattern(inner, &payload, declare);
            }
            PatternKind::Expr(expr) => {
                if matches!(expr.kind, ExprKind::NilLit) {
                    match self.shallow(ty) {
                        optional @ Type::Optional(_) => self.record(expr.id, &optional),
                        Type::Error => {}
                        other => self.pattern_mismatch(pattern, "nil", &other),
                    }
                    return;
                }
                let value_ty = self.infer_expr(expr, Some(ty));
                let operands = vec![
                    ArgInfo {
                        label: None,
                        trailing: false,
                        expr: Some(expr),
                        ty: Some(value_ty),
                        deferred: Deferred::No,
                        member_name: None,
                    },
                    ArgInfo {
                        label: None,
                        trailing: false,
                        expr: None,
                        ty: Some(ty.clone()),
                        deferred: Deferred::No,
                        member_name: None,
                    },
                ];
                let bool_ty = self.set.bool_type();
                let result = self.check_operator(pattern.id, "==", operands, Some(&bool_ty), pattern.span);
                self.unify(&result, &bool_ty);
                // The pattern node keeps the subject type; the operator
                // result lives in the call table.
                self.record(pattern.id, ty);
            }
            PatternKind::CodeCompletion => {
                let after_dot = matches!(
                    self.completion_site,
                    Some(CompletionSite::InPatternPosition { after_dot: true, .. })
                );
                let expected = self.resolved(ty);
                let base = after_dot
                    .then(|| self.implicit_member_base(Some(&expected)))
                    .flatten()
                    .map(|base| Type::Metatype(Box::new(base)));
                let facts = self.completion_facts();
                facts.expected = Some(expected);
                facts.base = base;
            }
        }
    }

    fn check_enum_case_pattern(
        &mut self,
        pattern: &Pattern,
        parent: Option<&crate::core::tree::TypeExpr>,
        name: &str,
        payload: Option<&[Pattern]>,
        ty: &Type,
        declare: bool,
    ) {
        let base = match parent {
            Some(texpr) => self.resolve_type_expr(texpr),
            None => self.shallow(ty),
        };
        if base.is_error() {
            for sub in payload.unwrap_or_default() {
                self.check_pattern(sub, &Type::Error, declare);
            }
            return;
        }
        let cand = self
            .member_candidates(&base, Some(name), MemberAccess::Static)
            .into_iter()
            .find(|cand| {
                cand.decl
                    .is_some_and(|decl| matches!(self.set.decl(decl).kind, DeclKind::EnumElement { .. }))
            });
        let Some(cand) = cand else {
            self.report_missing_member(&base, name, pattern.span);
            for sub in payload.unwrap_or_default() {
                self.check_pattern(sub, &Type::Error, declare);
            }
            return;
        };
        let inst = self.instantiate(&cand);
        if !self.unify(&inst.result, ty) {
            let found = self.display(ty);
            let expected = self.display(&inst.result);
            self.error(
                TypeCheckErrorKind::PatternMismatch {
                    pattern: expected,
                    ty: found,
                },
                pattern.span,
            );
        }
        if let Some(decl_ref) = cand.decl_ref(inst.subst.clone()) {
            self.record_ref(pattern.id, ValueRef::Decl(decl_ref));
        }
        let Some(subpatterns) = payload else {
            return;
        };
        let fields = inst.params.iter().map(|param| param.ty.clone()).collect::<Vec<_>>();
        match (subpatterns, fields.len()) {
            (subs, count) if subs.len() == count => {
                for (sub, field) in subs.iter().zip(&fields) {
                    self.check_pattern(sub, field, declare);
                }
            }
            // One pattern for a multi-field payload binds the whole tuple.
            ([only], count) if count > 1 => {
                let tuple = Type::Tuple(
                    inst.params
                        .iter()
                        .map(|param| TupleElem {
                            label: param.label.clone(),
                            ty: param.ty.clone(),
                        })
                        .collect(),
                );
                self.check_pattern(only, &tuple, declare);
            }
            (subs, count) => {
                self.error(
                    TypeCheckErrorKind::PatternArity {
                        name: name.to_string(),
                        expected: count,
                        found: subs.len(),
                    },
                    pattern.span,
                );
                for sub in subs {
                    self.check_pattern(sub, &Type::Error, declare);
                }
            }
        }
    }

    fn pattern_mismatch(&mut self, pattern: &Pattern, expected: &str, found: &Type) {
        let ty = self.display(found);
        self.error(
            TypeCheckErrorKind::PatternMismatch {
                pattern: expected.to_string(),
                ty,
            },
            pattern.span,
        );
    }
}
