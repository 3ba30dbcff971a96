//! Statement checking and control-flow queries.

use crate::core::resolve::DeclKind;
use crate::core::tree::{
    Accessors, Block, Condition, Expr, ExprKind, Item, ItemKind, Pattern, PatternKind, Stmt, StmtKind,
    SwitchCase, VarDecl,
};
use crate::core::typecheck::engine::{BodyKind, Checker};
use crate::core::typecheck::errors::TypeCheckErrorKind;
use crate::core::typecheck::model::TypeTables;
use crate::core::typecheck::unify::VarOrigin;
use crate::core::types::Type;

impl<'s, 'a> Checker<'s, 'a> {
    pub(crate) fn check_block(&mut self, block: &Block) {
        self.push_scope();
        self.check_stmts(&block.stmts);
        self.pop_scope();
    }

    pub(crate) fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    pub(crate) fn check_stmt(&mut self, stmt: &Stmt) {
        let mark = self.vars.len();
        match &stmt.kind {
            StmtKind::Item(item) => self.check_local_item(item),
            StmtKind::Expr(expr) => {
                self.infer_expr(expr, None);
            }
            StmtKind::Return(value) => self.check_return(stmt, value.as_ref()),
            StmtKind::Break => {
                let ok = self
                    .func()
                    .is_some_and(|ctx| ctx.loop_depth + ctx.switch_depth > 0);
                if !ok {
                    self.error(TypeCheckErrorKind::BreakOutsideLoop, stmt.span);
                }
            }
            StmtKind::Continue => {
                if !self.func().is_some_and(|ctx| ctx.loop_depth > 0) {
                    self.error(TypeCheckErrorKind::ContinueOutsideLoop, stmt.span);
                }
            }
            StmtKind::Throw(expr) => {
                let error_ty = self.set.error_existential();
                self.check_expr_with(expr, &error_ty);
                if !self.can_throw_here() {
                    self.error(TypeCheckErrorKind::UnhandledThrow, stmt.span);
                }
            }
            StmtKind::Defer(block) => self.check_block(block),
            StmtKind::If {
                conds,
                then_block,
                else_branch,
            } => {
                self.push_scope();
                self.check_conditions(conds);
                self.check_block(then_block);
                self.pop_scope();
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::Guard { conds, else_block } => {
                self.push_scope();
                self.check_conditions(conds);
                let bindings = self.pop_scope();
                self.check_block(else_block);
                if !always_exits(&else_block.stmts, &self.tables) {
                    self.error(TypeCheckErrorKind::GuardFallthrough, else_block.span);
                }
                if self.scopes.is_empty() {
                    self.push_scope();
                }
                if let Some(scope) = self.scopes.last_mut() {
                    scope.extend(bindings);
                }
            }
            StmtKind::While { conds, body } => {
                self.push_scope();
                self.check_conditions(conds);
                self.in_loop(|this| this.check_block(body));
                self.pop_scope();
            }
            StmtKind::ForIn { pattern, seq, body } => {
                let range = self.check_range(seq);
                let element = match range {
                    Type::Error => Type::Error,
                    _ => self.set.int_type(),
                };
                self.push_scope();
                self.check_pattern(pattern, &element, true);
                self.in_loop(|this| this.check_block(body));
                self.pop_scope();
            }
            StmtKind::Switch { subject, cases } => {
                let subject_ty = self.infer_expr(subject, None);
                self.finish_statement(mark);
                if let Some(ctx) = self.func_mut() {
                    ctx.switch_depth += 1;
                }
                for case in cases {
                    self.push_scope();
                    for pattern in &case.patterns {
                        self.check_pattern(pattern, &subject_ty, true);
                    }
                    if let Some(guard) = &case.guard {
                        self.check_condition_expr(guard);
                    }
                    self.check_stmts(&case.body);
                    self.pop_scope();
                }
                if let Some(ctx) = self.func_mut() {
                    ctx.switch_depth -= 1;
                }
                let subject_ty = self.resolved(&subject_ty);
                if self.switch_is_exhaustive(&subject_ty, cases) {
                    self.tables.exhaustive_switches.insert(stmt.id);
                } else if !subject_ty.contains_error() && self.completion_site.is_none() {
                    self.error(TypeCheckErrorKind::NonExhaustiveSwitch, stmt.span);
                }
            }
            StmtKind::Do { body, catches } => {
                let handled = !catches.is_empty();
                if handled {
                    if let Some(ctx) = self.func_mut() {
                        ctx.catch_depth += 1;
                    }
                }
                self.check_block(body);
                if handled {
                    if let Some(ctx) = self.func_mut() {
                        ctx.catch_depth -= 1;
                    }
                }
                let error_ty = self.set.error_existential();
                for catch in catches {
                    self.push_scope();
                    let name = catch.binding.as_deref().unwrap_or("error");
                    self.declare_local(name, catch.id, &error_ty, true);
                    self.check_block(&catch.body);
                    self.pop_scope();
                }
            }
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Error => {}
        }
        self.finish_statement(mark);
    }

    fn in_loop(&mut self, f: impl FnOnce(&mut Self)) {
        if let Some(ctx) = self.func_mut() {
            ctx.loop_depth += 1;
        }
        f(self);
        if let Some(ctx) = self.func_mut() {
            ctx.loop_depth -= 1;
        }
    }

    fn check_return(&mut self, stmt: &Stmt, value: Option<&Expr>) {
        let Some(ctx) = self.func_mut() else {
            self.error(TypeCheckErrorKind::ReturnOutsideFunction, stmt.span);
            return;
        };
        ctx.saw_return = true;
        let kind = ctx.kind;
        let result = ctx.result.clone();
        if matches!(kind, BodyKind::TopLevel | BodyKind::Initial) {
            self.error(TypeCheckErrorKind::ReturnOutsideFunction, stmt.span);
            return;
        }
        match value {
            Some(value) => {
                if let BodyKind::Initializer { failable } = kind {
                    if !(failable && matches!(value.kind, ExprKind::NilLit)) {
                        self.error(TypeCheckErrorKind::UnexpectedReturnValue, value.span);
                    }
                    self.record(value.id, &Type::void());
                    return;
                }
                let expected = self.shallow(&result);
                if expected.is_void() {
                    let ty = self.infer_expr(value, None);
                    if !self.try_unify(&ty, &expected) {
                        self.error(TypeCheckErrorKind::UnexpectedReturnValue, value.span);
                    }
                    return;
                }
                self.check_expr_with(value, &result);
            }
            None => match self.shallow(&result) {
                var @ Type::Var(_) => {
                    self.unify(&var, &Type::void());
                }
                Type::Error => {}
                ty if ty.is_void() || matches!(kind, BodyKind::Initializer { .. }) => {}
                ty => {
                    let rendered = self.display(&ty);
                    self.error(TypeCheckErrorKind::ReturnValueMissing(rendered), stmt.span);
                }
            },
        }
    }

    pub(crate) fn check_conditions(&mut self, conds: &[Condition]) {
        for cond in conds {
            let mark = self.vars.len();
            match cond {
                Condition::Expr(expr) => self.check_condition_expr(expr),
                Condition::OptionalBinding {
                    id,
                    is_let,
                    name,
                    ty,
                    init,
                    span,
                } => {
                    let annotated = ty.as_ref().map(|texpr| self.resolve_type_expr(texpr));
                    let hint = annotated.clone().map(Type::optional);
                    let init_ty = self.infer_expr(init, hint.as_ref());
                    let payload = match self.shallow(&init_ty) {
                        Type::Optional(payload) => *payload,
                        Type::Error => Type::Error,
                        var @ Type::Var(_) => {
                            let payload = self.fresh(VarOrigin::Placeholder);
                            self.unify(&var, &Type::optional(payload.clone()));
                            payload
                        }
                        other => {
                            let found = self.display(&other);
                            self.error(TypeCheckErrorKind::BindingNotOptional(found), *span);
                            Type::Error
                        }
                    };
                    let bound = match annotated {
                        Some(annotated) => {
                            if self.coerce_types(&payload, &annotated).is_none() {
                                self.mismatch(&annotated, &payload, init.span);
                            }
                            annotated
                        }
                        None => payload,
                    };
                    self.finish_statement(mark);
                    self.record(*id, &bound);
                    self.declare_local(name, *id, &bound, *is_let);
                }
                Condition::Case { pattern, init } => {
                    let init_ty = self.infer_expr(init, None);
                    self.finish_statement(mark);
                    self.check_pattern(pattern, &init_ty, true);
                }
            }
            self.finish_statement(mark);
        }
    }

    // -- Local declarations --

    fn check_local_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Var(var) => self.check_local_var(item, var),
            // Local functions see the locals around them.
            ItemKind::Func(_) => self.check_item(item),
            _ => self.with_detached_scopes(|this| this.check_item(item)),
        }
    }

    fn check_local_var(&mut self, item: &Item, var: &VarDecl) {
        let mark = self.vars.len();
        if !matches!(var.accessors, Accessors::Stored) {
            self.error(
                TypeCheckErrorKind::Unsupported("local computed or observed variable".to_string()),
                item.span,
            );
        }
        let annotated = var.ty.as_ref().map(|texpr| self.resolve_type_expr(texpr));
        let ty = match (&annotated, &var.init) {
            (Some(annotated), Some(init)) => {
                self.check_expr_with(init, annotated);
                annotated.clone()
            }
            (Some(annotated), None) => annotated.clone(),
            (None, Some(init)) => self.infer_expr(init, None),
            (None, None) => {
                self.error(TypeCheckErrorKind::CannotInfer, var.pattern.span);
                Type::Error
            }
        };
        self.finish_statement(mark);
        self.bind_var_pattern(&var.pattern, &ty, var.is_let);
    }

    /// Binds the names of a `let`/`var` pattern.
    fn bind_var_pattern(&mut self, pattern: &Pattern, ty: &Type, is_let: bool) {
        match &pattern.kind {
            PatternKind::Binding { name, .. } => {
                self.record(pattern.id, ty);
                self.declare_local(name, pattern.id, ty, is_let);
            }
            _ => self.check_pattern(pattern, ty, true),
        }
    }

    // -- Switch exhaustiveness --

    fn switch_is_exhaustive(&self, subject: &Type, cases: &[SwitchCase]) -> bool {
        let unguarded = cases
            .iter()
            .filter(|case| case.guard.is_none())
            .collect::<Vec<_>>();
        if unguarded.iter().any(|case| case.patterns.is_empty()) {
            return true;
        }
        let patterns = unguarded
            .iter()
            .flat_map(|case| case.patterns.iter())
            .collect::<Vec<_>>();
        if patterns.iter().any(|pattern| is_irrefutable(pattern)) {
            return true;
        }
        match subject {
            Type::Optional(_) => {
                let some = patterns.iter().any(|pattern| match &pattern.kind {
                    PatternKind::OptionalSome(inner) => is_irrefutable(inner),
                    PatternKind::EnumCase { name, payload, .. } => {
                        name == "some" && payload_irrefutable(payload.as_deref())
                    }
                    _ => false,
                });
                let none = patterns.iter().any(|pattern| match &pattern.kind {
                    PatternKind::Expr(expr) => matches!(expr.kind, ExprKind::NilLit),
                    PatternKind::EnumCase { name, .. } => name == "none",
                    _ => false,
                });
                some && none
            }
            Type::Nominal { decl, .. } if self.set.known().bool == Some(*decl) => {
                let covers = |value: bool| {
                    patterns.iter().any(|pattern| {
                        matches!(&pattern.kind, PatternKind::Expr(expr)
                            if matches!(expr.kind, ExprKind::BoolLit(b) if b == value))
                    })
                };
                covers(true) && covers(false)
            }
            Type::Nominal { decl, .. } => {
                let Some(info) = self.set.decl(*decl).nominal_info() else {
                    return false;
                };
                if !matches!(self.set.decl(*decl).kind, DeclKind::Enum(_)) {
                    return false;
                }
                info.elements.iter().all(|element| {
                    let name = &self.set.decl(*element).name;
                    patterns.iter().any(|pattern| match &pattern.kind {
                        PatternKind::EnumCase {
                            name: case_name,
                            payload,
                            ..
                        } => case_name == name && payload_irrefutable(payload.as_deref()),
                        _ => false,
                    })
                })
            }
            _ => false,
        }
    }
}

fn payload_irrefutable(payload: Option<&[Pattern]>) -> bool {
    payload.is_none_or(|patterns| patterns.iter().all(is_irrefutable))
}

pub(crate) fn is_irrefutable(pattern: &Pattern) -> bool {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Binding { .. } => true,
        PatternKind::Tuple(elems) => elems.iter().all(is_irrefutable),
        _ => false,
    }
}

/// Whether control cannot fall off the end of `stmts`. Exhaustive
/// switches are read from `tables`, so the statements must be checked first.
pub(crate) fn always_exits(stmts: &[Stmt], tables: &TypeTables) -> bool {
    stmts.iter().any(|stmt| stmt_exits(stmt, tables))
}

fn stmt_exits(stmt: &Stmt, tables: &TypeTables) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Throw(_) | StmtKind::Break | StmtKind::Continue => true,
        StmtKind::If {
            then_block,
            else_branch: Some(else_branch),
            ..
        } => always_exits(&then_block.stmts, tables) && stmt_exits(else_branch, tables),
        StmtKind::Block(block) => always_exits(&block.stmts, tables),
        StmtKind::Do { body, catches } => {
            always_exits(&body.stmts, tables)
                && catches.iter().all(|c| always_exits(&c.body.stmts, tables))
        }
        StmtKind::Switch { cases, .. } => {
            let covered = tables.exhaustive_switches.contains(&stmt.id)
                || cases.iter().any(|case| case.patterns.is_empty());
            covered
                && cases.iter().all(|case| {
                    // `break` only leaves the switch.
                    always_exits(&case.body, tables)
                        && !case.body.iter().any(|s| matches!(s.kind, StmtKind::Break))
                })
        }
        _ => false,
    }
}
