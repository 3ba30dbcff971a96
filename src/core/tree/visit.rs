use crate::core::tree::*;

/// Read-only tree visitor with default traversal helpers.
///
/// Implement the methods you care about (e.g. `visit_expr`) and call the
/// corresponding `walk_*` function to recurse into children.
///
/// ```rust
/// use swiftlet::core::tree::Expr;
/// use swiftlet::core::tree::visit::{walk_expr, Visitor};
///
/// struct CountExprs(usize);
/// impl Visitor for CountExprs {
///     fn visit_expr(&mut self, expr: &Expr) {
///         self.0 += 1;
///         walk_expr(self, expr);
///     }
/// }
/// ```
pub trait Visitor {
    fn visit_item(&mut self, item: &Item) {
        walk_item(self, item)
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt)
    }

    fn visit_condition(&mut self, cond: &Condition) {
        walk_condition(self, cond)
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        walk_pattern(self, pattern)
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr)
    }

    fn visit_closure(&mut self, expr: &Expr, closure: &ClosureExpr) {
        let _ = expr;
        walk_closure(self, closure)
    }
}

pub fn walk_item<V: Visitor + ?Sized>(v: &mut V, item: &Item) {
    match &item.kind {
        ItemKind::Func(func) => {
            for param in &func.params {
                if let Some(default) = &param.default {
                    v.visit_expr(default);
                }
            }
            if let Some(body) = &func.body {
                v.visit_block(body);
            }
        }
        ItemKind::Init(init) => {
            if let Some(body) = &init.body {
                v.visit_block(body);
            }
        }
        ItemKind::Subscript(sub) => walk_accessors(v, &sub.accessors),
        ItemKind::Var(var) => {
            v.visit_pattern(&var.pattern);
            if let Some(init) = &var.init {
                v.visit_expr(init);
            }
            walk_accessors(v, &var.accessors);
        }
        ItemKind::Struct(nominal)
        | ItemKind::Class(nominal)
        | ItemKind::Enum(nominal)
        | ItemKind::Protocol(nominal) => {
            for member in &nominal.members {
                v.visit_item(member);
            }
        }
        ItemKind::Extension(ext) => {
            for member in &ext.members {
                v.visit_item(member);
            }
        }
        ItemKind::Stmt(stmt) => v.visit_stmt(stmt),
        ItemKind::EnumCase(_)
        | ItemKind::TypeAlias(_)
        | ItemKind::AssociatedType(_)
        | ItemKind::Import(_)
        | ItemKind::Error => {}
    }
}

fn walk_accessors<V: Visitor + ?Sized>(v: &mut V, accessors: &Accessors) {
    match accessors {
        Accessors::Computed { get, set } => {
            v.visit_block(get);
            if let Some(set) = set {
                v.visit_block(&set.body);
            }
        }
        Accessors::Observed { will_set, did_set } => {
            for body in [will_set, did_set].into_iter().flatten() {
                v.visit_block(&body.body);
            }
        }
        Accessors::Stored | Accessors::Requirement { .. } => {}
    }
}

pub fn walk_block<V: Visitor + ?Sized>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Item(item) => v.visit_item(item),
        StmtKind::Expr(expr) | StmtKind::Throw(expr) => v.visit_expr(expr),
        StmtKind::Return(expr) => {
            if let Some(expr) = expr {
                v.visit_expr(expr);
            }
        }
        StmtKind::Defer(block) | StmtKind::Block(block) => v.visit_block(block),
        StmtKind::If {
            conds,
            then_block,
            else_branch,
        } => {
            for cond in conds {
                v.visit_condition(cond);
            }
            v.visit_block(then_block);
            if let Some(else_branch) = else_branch {
                v.visit_stmt(else_branch);
            }
        }
        StmtKind::Guard { conds, else_block } => {
            for cond in conds {
                v.visit_condition(cond);
            }
            v.visit_block(else_block);
        }
        StmtKind::While { conds, body } => {
            for cond in conds {
                v.visit_condition(cond);
            }
            v.visit_block(body);
        }
        StmtKind::ForIn { pattern, seq, body } => {
            v.visit_expr(seq);
            v.visit_pattern(pattern);
            v.visit_block(body);
        }
        StmtKind::Switch { subject, cases } => {
            v.visit_expr(subject);
            for case in cases {
                for pattern in &case.patterns {
                    v.visit_pattern(pattern);
                }
                if let Some(guard) = &case.guard {
                    v.visit_expr(guard);
                }
                for stmt in &case.body {
                    v.visit_stmt(stmt);
                }
            }
        }
        StmtKind::Do { body, catches } => {
            v.visit_block(body);
            for clause in catches {
                v.visit_block(&clause.body);
            }
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Error => {}
    }
}

pub fn walk_condition<V: Visitor + ?Sized>(v: &mut V, cond: &Condition) {
    match cond {
        Condition::Expr(expr) => v.visit_expr(expr),
        Condition::OptionalBinding { init, .. } => v.visit_expr(init),
        Condition::Case { pattern, init } => {
            v.visit_expr(init);
            v.visit_pattern(pattern);
        }
    }
}

pub fn walk_pattern<V: Visitor + ?Sized>(v: &mut V, pattern: &Pattern) {
    match &pattern.kind {
        PatternKind::Tuple(elems) => {
            for elem in elems {
                v.visit_pattern(elem);
            }
        }
        PatternKind::EnumCase {
            payload: Some(payload),
            ..
        } => {
            for elem in payload {
                v.visit_pattern(elem);
            }
        }
        PatternKind::OptionalSome(inner) => v.visit_pattern(inner),
        PatternKind::Expr(expr) => v.visit_expr(expr),
        PatternKind::Wildcard
        | PatternKind::Binding { .. }
        | PatternKind::EnumCase { payload: None, .. }
        | PatternKind::CodeCompletion
        | PatternKind::Error => {}
    }
}

pub fn walk_closure<V: Visitor + ?Sized>(v: &mut V, closure: &ClosureExpr) {
    v.visit_block(&closure.body);
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Member { base, .. }
        | ExprKind::TupleIndex { base, .. }
        | ExprKind::MemberCompletion(base) => v.visit_expr(base),
        ExprKind::Call { callee, args } => {
            v.visit_expr(callee);
            for arg in args {
                v.visit_expr(&arg.expr);
            }
        }
        ExprKind::Subscript { base, args } => {
            v.visit_expr(base);
            for arg in args {
                v.visit_expr(&arg.expr);
            }
        }
        ExprKind::Closure(closure) => v.visit_closure(expr, closure),
        ExprKind::Unary { operand, .. } => v.visit_expr(operand),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs, .. } => {
            v.visit_expr(lhs);
            v.visit_expr(rhs);
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            v.visit_expr(cond);
            v.visit_expr(then_expr);
            v.visit_expr(else_expr);
        }
        ExprKind::ForceUnwrap(inner)
        | ExprKind::BindOptional(inner)
        | ExprKind::OptionalEval(inner)
        | ExprKind::Paren(inner)
        | ExprKind::InOut(inner) => v.visit_expr(inner),
        ExprKind::Try { expr: inner, .. } | ExprKind::As { expr: inner, .. } => {
            v.visit_expr(inner)
        }
        ExprKind::Tuple(elems) => {
            for elem in elems {
                v.visit_expr(&elem.expr);
            }
        }
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NilLit
        | ExprKind::Ident(_)
        | ExprKind::SelfRef
        | ExprKind::SuperRef
        | ExprKind::ImplicitMember(_)
        | ExprKind::CodeCompletion
        | ExprKind::ImplicitMemberCompletion
        | ExprKind::Error => {}
    }
}
