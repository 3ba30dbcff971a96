//! Declaration bodies: functions, initializers, accessors, property and
//! default-argument initializers, and the top-level script body.

use crate::core::diag::Span;
use crate::core::resolve::{DeclId, DeclKind};
use crate::core::tree::{
    AccessorBody, Accessors, Block, Expr, Item, ItemKind, NodeId, Param, SourceFile, StmtKind,
    SubscriptDecl, VarDecl,
};
use crate::core::typecheck::engine::{BodyKind, Checker, FuncContext};
use crate::core::typecheck::errors::TypeCheckErrorKind;
use crate::core::typecheck::stmt::always_exits;
use crate::core::types::Type;

impl<'s, 'a> Checker<'s, 'a> {
    pub(crate) fn decl_of(&self, node: NodeId) -> Option<DeclId> {
        self.set.module(self.set.current()).decl_for_node(node)
    }

    /// Checks the whole file. Top-level statements form the implicit main
    /// function; top-level variables are globals initialized in order.
    pub(crate) fn check_file(&mut self, file: &SourceFile) {
        let mut ctx = FuncContext::new(BodyKind::TopLevel, None, Type::void());
        ctx.throws = true;
        self.funcs.push(ctx);
        self.push_scope();
        let mark = self.vars.len();
        for item in &file.items {
            match &item.kind {
                ItemKind::Stmt(stmt) => self.check_stmt(stmt),
                ItemKind::Var(var) => {
                    self.check_var_init(item, var, false);
                    self.with_detached_scopes(|this| this.check_var_accessors(item, var));
                }
                _ => self.with_detached_scopes(|this| this.check_item(item)),
            }
        }
        let span = match (file.items.first(), file.items.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => Span::default(),
        };
        self.finish_body(mark, span);
        self.pop_scope();
        self.funcs.pop();
    }

    /// Checks a declaration that is not a top-level variable.
    pub(crate) fn check_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Func(func) => {
                if let Some(decl) = self.decl_of(item.id) {
                    self.check_function(decl, &func.params, func.body.as_ref(), BodyKind::Function);
                }
            }
            ItemKind::Init(init) => {
                if let Some(decl) = self.decl_of(item.id) {
                    let kind = BodyKind::Initializer {
                        failable: init.failable,
                    };
                    self.check_function(decl, &init.params, init.body.as_ref(), kind);
                }
            }
            ItemKind::Subscript(sub) => self.check_subscript_decl(item, sub),
            ItemKind::Var(var) => {
                self.check_var_init(item, var, true);
                self.check_var_accessors(item, var);
            }
            ItemKind::Struct(nominal)
            | ItemKind::Class(nominal)
            | ItemKind::Enum(nominal)
            | ItemKind::Protocol(nominal) => {
                for member in &nominal.members {
                    self.with_detached_scopes(|this| this.check_item(member));
                }
            }
            ItemKind::Extension(ext) => {
                for member in &ext.members {
                    self.with_detached_scopes(|this| this.check_item(member));
                }
            }
            ItemKind::Stmt(stmt) => self.check_stmt(stmt),
            ItemKind::EnumCase(_)
            | ItemKind::TypeAlias(_)
            | ItemKind::AssociatedType(_)
            | ItemKind::Import(_)
            | ItemKind::Error => {}
        }
    }

    fn body_context(&self, decl: DeclId, kind: BodyKind, result: Type) -> FuncContext {
        let d = self.set.decl(decl);
        let mut ctx = FuncContext::new(kind, Some(decl), result);
        ctx.self_ty = self
            .set
            .type_context_of(decl)
            .map(|context| self.self_type_for(context));
        ctx.is_static = d.is_static;
        ctx.self_mutable = d.mutating || matches!(kind, BodyKind::Initializer { .. });
        ctx
    }

    fn check_function(&mut self, decl: DeclId, params: &[Param], body: Option<&Block>, kind: BodyKind) {
        let Some(sig) = self.set.decl(decl).func_sig().cloned() else {
            return;
        };
        let result = match kind {
            BodyKind::Initializer { .. } => Type::void(),
            _ => sig.result.clone(),
        };
        for (param, decl_param) in params.iter().zip(&sig.params) {
            if let Some(default) = &param.default {
                self.check_initial_expr(decl, default, &decl_param.ty);
            }
        }
        let Some(body) = body else {
            return;
        };
        let mark = self.vars.len();
        let mut ctx = self.body_context(decl, kind, result.clone());
        ctx.throws = sig.throws;
        self.funcs.push(ctx);
        self.push_scope();
        for (param, decl_param) in params.iter().zip(&sig.params) {
            self.record(param.id, &decl_param.ty);
            self.declare_local(&param.name, param.id, &decl_param.ty, !decl_param.inout);
        }
        self.check_body(body, &result, kind);
        self.pop_scope();
        self.funcs.pop();
        self.finish_body(mark, body.span);
    }

    /// Body of a function or accessor; a lone expression in a non-`Void`
    /// body is its return value.
    fn check_body(&mut self, body: &Block, result: &Type, kind: BodyKind) {
        let returns_value = !self.shallow(result).is_void() && !result.is_error();
        if returns_value {
            if let [stmt] = body.stmts.as_slice() {
                if let StmtKind::Expr(expr) = &stmt.kind {
                    let mark = self.vars.len();
                    self.check_expr_with(expr, result);
                    self.tables.implicit_returns.insert(expr.id);
                    self.finish_statement(mark);
                    return;
                }
            }
        }
        self.check_stmts(&body.stmts);
        let initializer = matches!(kind, BodyKind::Initializer { .. });
        if returns_value && !initializer && !always_exits(&body.stmts, &self.tables) {
            let rendered = self.display(result);
            self.error(TypeCheckErrorKind::MissingReturn(rendered), body.span);
        }
    }

    /// Property initializers and default arguments.
    fn check_initial_expr(&mut self, context: DeclId, expr: &Expr, ty: &Type) {
        let mark = self.vars.len();
        let mut ctx = FuncContext::new(BodyKind::Initial, Some(context), ty.clone());
        ctx.is_static = self.set.decl(context).is_static;
        self.funcs.push(ctx);
        self.with_detached_scopes(|this| {
            this.check_expr_with(expr, ty);
        });
        self.funcs.pop();
        self.finish_body(mark, expr.span);
    }

    /// The initializer of a stored variable. Member initializers are
    /// checked in their own context; globals run inside the main body.
    fn check_var_init(&mut self, item: &Item, var: &VarDecl, member: bool) {
        let decl = self.decl_of(item.id);
        let declared = match (var.simple_name(), decl) {
            (Some(_), Some(decl)) => match &self.set.decl(decl).kind {
                DeclKind::Var(info) if !info.ty.is_error() => Some(info.ty.clone()),
                _ => None,
            },
            _ => None,
        };
        let Some(init) = &var.init else {
            if let Some(ty) = &declared {
                self.record(var.pattern.id, ty);
            }
            return;
        };
        if matches!(var.accessors, Accessors::Requirement { .. }) {
            return;
        }
        match (member, decl, &declared) {
            (true, Some(decl), Some(ty)) => {
                self.check_initial_expr(decl, init, ty);
                self.record(var.pattern.id, ty);
            }
            _ => {
                let mark = self.vars.len();
                let ty = match &declared {
                    Some(ty) => {
                        self.check_expr_with(init, ty);
                        ty.clone()
                    }
                    None => self.infer_expr(init, None),
                };
                self.finish_statement(mark);
                self.check_pattern(&var.pattern, &ty, false);
            }
        }
    }

    fn check_var_accessors(&mut self, item: &Item, var: &VarDecl) {
        let Some(decl) = self.decl_of(item.id) else {
            return;
        };
        let ty = match &self.set.decl(decl).kind {
            DeclKind::Var(info) => info.ty.clone(),
            _ => return,
        };
        match &var.accessors {
            Accessors::Computed { get, set } => {
                self.check_accessor(get, &ty, None);
                if let Some(set) = set {
                    self.check_setter_like(set, "newValue", &ty, &[]);
                }
            }
            Accessors::Observed { will_set, did_set } => {
                if let Some(body) = will_set {
                    self.check_setter_like(body, "newValue", &ty, &[]);
                }
                if let Some(body) = did_set {
                    self.check_setter_like(body, "oldValue", &ty, &[]);
                }
            }
            Accessors::Stored | Accessors::Requirement { .. } => {}
        }
    }

    fn check_subscript_decl(&mut self, item: &Item, sub: &SubscriptDecl) {
        let Some(decl) = self.decl_of(item.id) else {
            return;
        };
        let Some(sig) = self.set.decl(decl).func_sig().cloned() else {
            return;
        };
        let params = sub
            .params
            .iter()
            .zip(&sig.params)
            .map(|(param, decl_param)| (param.name.clone(), param.id, decl_param.ty.clone()))
            .collect::<Vec<_>>();
        if let Accessors::Computed { get, set } = &sub.accessors {
            self.check_accessor_with(get, &sig.result, None, &params);
            if let Some(set) = set {
                self.check_setter_like(set, "newValue", &sig.result, &params);
            }
        }
    }

    fn check_accessor(&mut self, body: &Block, result: &Type, param: Option<(&str, &Type)>) {
        self.check_accessor_with(body, result, param, &[]);
    }

    fn check_setter_like(
        &mut self,
        accessor: &AccessorBody,
        default_name: &str,
        value_ty: &Type,
        params: &[(String, NodeId, Type)],
    ) {
        let name = accessor.param.as_deref().unwrap_or(default_name);
        self.check_accessor_with(&accessor.body, &Type::void(), Some((name, value_ty)), params);
    }

    /// An accessor body. Its implicit value parameter is keyed by the body
    /// block's node.
    fn check_accessor_with(
        &mut self,
        body: &Block,
        result: &Type,
        value_param: Option<(&str, &Type)>,
        params: &[(String, NodeId, Type)],
    ) {
        let Some(decl) = self.decl_of(body.id) else {
            return;
        };
        let mark = self.vars.len();
        let ctx = self.body_context(decl, BodyKind::Accessor, result.clone());
        self.funcs.push(ctx);
        self.push_scope();
        for (name, node, ty) in params {
            self.record(*node, ty);
            self.declare_local(name, *node, ty, true);
        }
        if let Some((name, ty)) = value_param {
            self.declare_local(name, body.id, ty, true);
        }
        self.check_body(body, result, BodyKind::Accessor);
        self.pop_scope();
        self.funcs.pop();
        self.finish_body(mark, body.span);
    }
}
