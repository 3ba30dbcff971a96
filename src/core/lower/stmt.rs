//! Statements: control flow, local bindings, `return`, `throw`, `defer`.

use crate::core::diag::Span;
use crate::core::ir::{InstKind, LoadQualifier, Terminator, ValueId};
use crate::core::lower::errors::LowerErrorKind;
use crate::core::lower::func::{CleanupKind, Exit, FuncLowerer, LocalSlot, LoopExits, LowerResult, Managed, ReturnMode, SelfSlot};
use crate::core::tree::{
    BinaryOp, Block, CatchClause, Condition, Expr, ExprKind, Item, ItemKind, Pattern, PatternKind, Stmt,
    StmtKind, SwitchCase, VarDecl,
};
use crate::core::types::Type;

impl<'m, 'a> FuncLowerer<'m, 'a> {
    pub(super) fn lower_block(&mut self, block: &'a Block) -> LowerResult<()> {
        self.scoped(|this| this.lower_stmts(&block.stmts))
    }

    /// Lowers statements in order; anything after a terminator is dead.
    pub(super) fn lower_stmts(&mut self, stmts: &'a [Stmt]) -> LowerResult<()> {
        for stmt in stmts {
            if !self.b.is_reachable() {
                break;
            }
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Falls off the end of a body: an implicit `return`.
    pub(super) fn finish_body(&mut self, span: Span) -> LowerResult<()> {
        if self.b.is_reachable() {
            self.lower_return(None, span)?;
        }
        Ok(())
    }

    pub(super) fn lower_stmt(&mut self, stmt: &'a Stmt) -> LowerResult<()> {
        match &stmt.kind {
            StmtKind::Item(item) => self.lower_local_item(item),
            StmtKind::Expr(expr) => {
                if self.cx.tables.implicit_returns.contains(&expr.id) {
                    return self.lower_return(Some(expr), stmt.span);
                }
                self.scoped(|this| this.lower_expr(expr).map(|_| ()))
            }
            StmtKind::Return(value) => self.lower_return(value.as_ref(), stmt.span),
            StmtKind::Break => {
                let Some(exits) = self.loops.last().copied() else {
                    return Err(self.unsupported("'break' outside of a loop", stmt.span));
                };
                self.jump(exits.break_to)
            }
            StmtKind::Continue => {
                let Some(exits) = self.loops.last().copied() else {
                    return Err(self.unsupported("'continue' outside of a loop", stmt.span));
                };
                self.jump(exits.continue_to)
            }
            StmtKind::Throw(expr) => {
                let error_ty = self.cx.set.error_existential();
                let m = self.lower_expr(expr)?;
                let value = self.owned(m, &error_ty);
                self.emit_throw(value, stmt.span)
            }
            StmtKind::Defer(block) => {
                self.push_cleanup(CleanupKind::Defer(block));
                Ok(())
            }
            StmtKind::If {
                conds,
                then_block,
                else_branch,
            } => self.lower_if(conds, then_block, else_branch.as_deref()),
            StmtKind::Guard { conds, else_block } => self.lower_guard(conds, else_block),
            StmtKind::While { conds, body } => self.lower_while(conds, body),
            StmtKind::ForIn { pattern, seq, body } => self.lower_for_in(pattern, seq, body),
            StmtKind::Switch { subject, cases } => self.lower_switch(subject, cases),
            StmtKind::Do { body, catches } => self.lower_do(body, catches),
            StmtKind::Block(block) => self.lower_block(block),
            StmtKind::Error => Err(self.unsupported("invalid statement", stmt.span)),
        }
    }

    fn jump(&mut self, exit: Exit) -> LowerResult<()> {
        self.emit_cleanups_to(exit.depth)?;
        self.b.br(exit.block, Vec::new());
        Ok(())
    }

    // -- Conditions --

    /// Lowers a condition list. Failing conditions unwind to `fail.depth`
    /// and branch to `fail.block`; bindings stay in scope on success.
    pub(super) fn lower_conditions(&mut self, conds: &'a [Condition], fail: Exit) -> LowerResult<()> {
        for cond in conds {
            match cond {
                Condition::Expr(expr) => {
                    let value = self.lower_bool(expr)?;
                    let pass = self.b.add_block();
                    let failed = self.b.add_block();
                    self.b.cond_br(value, pass, failed);
                    self.b.switch_to(failed);
                    self.jump(fail)?;
                    self.b.switch_to(pass);
                }
                Condition::OptionalBinding {
                    id,
                    is_let,
                    name,
                    init,
                    span,
                    ..
                } => {
                    let optional_ty = self.cx.tables.converted_type_of(init.id);
                    let payload_ty = self.cx.tables.locals.get(id).map(|local| local.ty.clone()).unwrap_or(Type::Error);
                    let m = self.lower_expr(init)?;
                    let payload = self.unwrap_or_exit(m, &optional_ty, &payload_ty, fail, *span)?;
                    self.bind_local(*id, name, *is_let, payload, &payload_ty)?;
                }
                Condition::Case { pattern, init } => {
                    let ty = self.cx.tables.converted_type_of(init.id);
                    let m = self.lower_expr(init)?;
                    let m = self.owned_managed(m, &ty);
                    let addr = self.to_addr(m, &ty);
                    self.match_pattern(pattern, addr, &ty, fail)?;
                }
            }
        }
        Ok(())
    }

    /// `Bool` value of a condition; temporaries die before the branch.
    pub(super) fn lower_bool(&mut self, expr: &'a Expr) -> LowerResult<ValueId> {
        let bool_ty = self.cx.set.bool_type();
        self.scoped(|this| {
            let m = this.lower_expr(expr)?;
            Ok(this.borrow(m, &bool_ty))
        })
    }

    /// Payload of an optional, branching to `fail` when it is `nil`.
    pub(super) fn unwrap_or_exit(
        &mut self,
        m: Managed,
        optional_ty: &Type,
        payload_ty: &Type,
        fail: Exit,
        span: Span,
    ) -> LowerResult<Managed> {
        let some = self.optional_case("some", span)?;
        let none = self.optional_case("none", span)?;
        let some_bb = self.b.add_block();
        let none_bb = self.b.add_block();
        let cases = vec![
            crate::core::ir::SwitchCase {
                case: some.clone(),
                target: some_bb,
            },
            crate::core::ir::SwitchCase {
                case: none,
                target: none_bb,
            },
        ];
        if self.is_address_only(optional_ty) {
            let temp = self.alloc_temp(optional_ty, None);
            self.store_into(m, optional_ty, temp, true);
            self.b.terminate(Terminator::SwitchEnumAddr {
                addr: temp,
                cases,
                default: None,
            });
            self.b.switch_to(none_bb);
            self.jump(fail)?;
            self.b.switch_to(some_bb);
            let payload_ir = self.ir(payload_ty).address_of();
            let data = self.b.emit_value(
                InstKind::UncheckedTakeEnumDataAddr { addr: temp, case: some },
                payload_ir,
                crate::core::ir::Ownership::Trivial,
            );
            return Ok(self.manage_temp(data, payload_ty));
        }
        let value = self.owned(m, optional_ty);
        self.b.terminate(Terminator::SwitchEnum {
            value,
            cases,
            default: None,
        });
        self.b.switch_to(none_bb);
        self.jump(fail)?;
        let payload_ir = self.ir(payload_ty);
        let ownership = self.cx.types.ownership(payload_ty);
        let payload = self.b.add_block_param(some_bb, payload_ir, ownership);
        self.b.switch_to(some_bb);
        Ok(self.manage(payload))
    }

    // -- Control flow --

    fn lower_if(
        &mut self,
        conds: &'a [Condition],
        then_block: &'a Block,
        else_branch: Option<&'a Stmt>,
    ) -> LowerResult<()> {
        let depth = self.depth();
        let else_bb = self.b.add_block();
        let cont = self.b.add_block();
        let mut joined = false;
        self.lower_conditions(conds, Exit { block: else_bb, depth })?;
        self.lower_block(then_block)?;
        self.pop_scope(depth)?;
        if self.b.is_reachable() {
            self.b.br(cont, Vec::new());
            joined = true;
        }
        self.b.switch_to(else_bb);
        if let Some(else_branch) = else_branch {
            self.scoped(|this| this.lower_stmt(else_branch))?;
        }
        if self.b.is_reachable() {
            self.b.br(cont, Vec::new());
            joined = true;
        }
        if joined {
            self.b.switch_to(cont);
        }
        Ok(())
    }

    fn lower_guard(&mut self, conds: &'a [Condition], else_block: &'a Block) -> LowerResult<()> {
        let depth = self.depth();
        let else_bb = self.b.add_block();
        self.lower_conditions(conds, Exit { block: else_bb, depth })?;
        let cont = self.b.current_block();

        // The else block runs without the guard's bindings.
        let saved = self.save_cleanups();
        self.restore_cleanups(saved[..depth].to_vec());
        self.b.switch_to(else_bb);
        self.lower_block(else_block)?;
        if self.b.is_reachable() {
            self.b.terminate(Terminator::Unreachable);
        }
        self.restore_cleanups(saved);
        if let Some(cont) = cont {
            self.b.switch_to(cont);
        }
        Ok(())
    }

    fn lower_while(&mut self, conds: &'a [Condition], body: &'a Block) -> LowerResult<()> {
        let header = self.b.add_block();
        let exit = self.b.add_block();
        self.b.br(header, Vec::new());
        self.b.switch_to(header);
        let depth = self.depth();
        self.lower_conditions(conds, Exit { block: exit, depth })?;
        self.loops.push(LoopExits {
            break_to: Exit { block: exit, depth },
            continue_to: Exit { block: header, depth },
        });
        let result = self.lower_block(body);
        self.loops.pop();
        result?;
        self.pop_scope(depth)?;
        if self.b.is_reachable() {
            self.b.br(header, Vec::new());
        }
        self.b.switch_to(exit);
        Ok(())
    }

    /// `for i in a..<b` / `for i in a...b` over `Int`.
    fn lower_for_in(&mut self, pattern: &'a Pattern, seq: &'a Expr, body: &'a Block) -> LowerResult<()> {
        let (op, lhs, rhs) = range_bounds(seq).ok_or_else(|| self.unsupported("sequence other than a range", seq.span))?;
        let int_ty = self.cx.set.int_type();
        let bool_ty = self.cx.set.bool_type();
        let int_ir = self.ir(&int_ty);
        let bool_ir = self.ir(&bool_ty);

        let lower = self.lower_expr(lhs)?;
        let lower = self.borrow(lower, &int_ty);
        let upper = self.lower_expr(rhs)?;
        let upper = self.borrow(upper, &int_ty);
        let counter = self.alloc_temp(&int_ty, None);
        self.b.store(lower, counter, crate::core::ir::StoreQualifier::Trivial);

        let header = self.b.add_block();
        let body_bb = self.b.add_block();
        let latch = self.b.add_block();
        let exit = self.b.add_block();
        self.b.br(header, Vec::new());

        self.b.switch_to(header);
        let current = self.b.load(counter, LoadQualifier::Trivial);
        let compare = if op == BinaryOp::ClosedRange { "int_le" } else { "int_lt" };
        let more = self.b.emit_value(
            InstKind::Builtin {
                name: compare.to_string(),
                args: vec![current, upper],
            },
            bool_ir,
            crate::core::ir::Ownership::Trivial,
        );
        self.b.cond_br(more, body_bb, exit);

        self.b.switch_to(body_bb);
        let depth = self.depth();
        if let PatternKind::Binding { name, is_let } = &pattern.kind {
            self.bind_local(pattern.id, name, *is_let, Managed::value(current), &int_ty)?;
        }
        self.loops.push(LoopExits {
            break_to: Exit { block: exit, depth },
            continue_to: Exit { block: latch, depth },
        });
        let result = self.lower_block(body);
        self.loops.pop();
        result?;
        self.pop_scope(depth)?;
        if self.b.is_reachable() {
            self.b.br(latch, Vec::new());
        }

        self.b.switch_to(latch);
        let value = self.b.load(counter, LoadQualifier::Trivial);
        let one = self.b.integer_literal(int_ir.clone(), 1);
        let next = self.b.emit_value(
            InstKind::Builtin {
                name: "int_add".to_string(),
                args: vec![value, one],
            },
            int_ir,
            crate::core::ir::Ownership::Trivial,
        );
        self.b.store(next, counter, crate::core::ir::StoreQualifier::Trivial);
        self.b.br(header, Vec::new());

        self.b.switch_to(exit);
        Ok(())
    }

    fn lower_switch(&mut self, subject: &'a Expr, cases: &'a [SwitchCase]) -> LowerResult<()> {
        self.scoped(|this| {
            let ty = this.cx.tables.converted_type_of(subject.id);
            let m = this.lower_expr(subject)?;
            let temp = this.alloc_temp(&ty, None);
            this.store_into(m, &ty, temp, true);
            this.manage_temp(temp, &ty);
            let depth = this.depth();
            let cont = this.b.add_block();
            let outer_continue = this.loops.last().map(|exits| exits.continue_to);
            this.loops.push(LoopExits {
                break_to: Exit { block: cont, depth },
                continue_to: outer_continue.unwrap_or(Exit { block: cont, depth }),
            });
            let result = this.lower_cases(cases, temp, &ty, depth, cont);
            this.loops.pop();
            result?;
            if this.b.is_reachable() {
                this.b.terminate(Terminator::Unreachable);
            }
            this.b.switch_to(cont);
            Ok(())
        })
    }

    fn lower_cases(
        &mut self,
        cases: &'a [SwitchCase],
        subject: ValueId,
        ty: &Type,
        depth: usize,
        cont: crate::core::ir::BlockId,
    ) -> LowerResult<()> {
        for case in cases {
            if !self.b.is_reachable() {
                break;
            }
            let next = self.b.add_block();
            let fail = Exit { block: next, depth };
            match case.patterns.as_slice() {
                [] => {}
                [pattern] => self.match_pattern(pattern, subject, ty, fail)?,
                patterns => {
                    if patterns.iter().any(pattern_binds) {
                        return Err(self.unsupported("case with several patterns that bind variables", case.span));
                    }
                    let body_bb = self.b.add_block();
                    for (i, pattern) in patterns.iter().enumerate() {
                        let last = i + 1 == patterns.len();
                        let alternative = if last { next } else { self.b.add_block() };
                        self.match_pattern(pattern, subject, ty, Exit { block: alternative, depth })?;
                        self.jump(Exit { block: body_bb, depth })?;
                        self.drop_cleanups(depth);
                        if !last {
                            self.b.switch_to(alternative);
                        }
                    }
                    self.b.switch_to(body_bb);
                }
            }
            if let Some(guard) = &case.guard {
                let value = self.lower_bool(guard)?;
                let pass = self.b.add_block();
                let failed = self.b.add_block();
                self.b.cond_br(value, pass, failed);
                self.b.switch_to(failed);
                self.jump(fail)?;
                self.b.switch_to(pass);
            }
            self.lower_stmts(&case.body)?;
            self.pop_scope(depth)?;
            if self.b.is_reachable() {
                self.b.br(cont, Vec::new());
            }
            if case.patterns.is_empty() {
                // `default` is always last.
                break;
            }
            self.b.switch_to(next);
        }
        Ok(())
    }

    fn lower_do(&mut self, body: &'a Block, catches: &'a [CatchClause]) -> LowerResult<()> {
        let Some(clause) = catches.first() else {
            return self.lower_block(body);
        };
        let depth = self.depth();
        let error_ty = self.cx.set.error_existential();
        let catch_bb = self.b.add_block();
        let error_ir = self.ir(&error_ty);
        let error = self
            .b
            .add_block_param(catch_bb, error_ir, crate::core::ir::Ownership::Owned);
        let cont = self.b.add_block();
        let mut joined = false;

        self.catches.push(Exit { block: catch_bb, depth });
        let result = self.lower_block(body);
        self.catches.pop();
        result?;
        if self.b.is_reachable() {
            self.b.br(cont, Vec::new());
            joined = true;
        }

        self.b.switch_to(catch_bb);
        self.scoped(|this| {
            let name = clause.binding.clone().unwrap_or_else(|| "error".to_string());
            let m = this.manage(error);
            this.bind_local(clause.id, &name, true, m, &error_ty)?;
            this.lower_block(&clause.body)
        })?;
        if self.b.is_reachable() {
            self.b.br(cont, Vec::new());
            joined = true;
        }
        if joined {
            self.b.switch_to(cont);
        }
        Ok(())
    }

    // -- Exits --

    pub(super) fn lower_return(&mut self, value: Option<&'a Expr>, span: Span) -> LowerResult<()> {
        match self.return_mode {
            ReturnMode::Value => {
                let result_ty = self.result_ty.clone();
                let m = match value {
                    Some(expr) => Some(self.lower_expr(expr)?),
                    None => None,
                };
                self.return_managed(m, &result_ty)
            }
            ReturnMode::Init { failable, class } => {
                let is_nil = value.is_some_and(|expr| matches!(strip_parens(expr).kind, ExprKind::NilLit));
                if let Some(expr) = value {
                    if !is_nil {
                        return Err(self.unsupported("'return' with a value in an initializer", expr.span));
                    }
                }
                let Some(SelfSlot::Addr(slot)) = self.self_slot else {
                    return Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span));
                };
                let self_ty = self.self_ty.clone().unwrap_or(Type::Error);
                let result_ty = self.result_ty.clone();
                if is_nil {
                    if class {
                        let object = self.b.load(slot, LoadQualifier::Take);
                        self.b.destroy_value(object);
                    }
                    let none = self.optional_none(&result_ty, span)?;
                    return self.return_managed(Some(none), &result_ty);
                }
                let this = self.take_managed(slot, &self_ty);
                let this = if failable {
                    self.wrap_optional(this, &self_ty, &result_ty, span)?
                } else {
                    this
                };
                self.return_managed(Some(this), &result_ty)
            }
        }
    }

    /// Takes the contents of `addr` as an owned value or temporary.
    pub(super) fn take_managed(&mut self, addr: ValueId, ty: &Type) -> Managed {
        if self.is_address_only(ty) {
            let temp = self.alloc_temp(ty, None);
            self.b.emit(InstKind::CopyAddr {
                src: addr,
                dst: temp,
                take: true,
                init: true,
            });
            return self.manage_temp(temp, ty);
        }
        let qualifier = if self.is_trivial(ty) {
            LoadQualifier::Trivial
        } else {
            LoadQualifier::Take
        };
        let value = self.b.load(addr, qualifier);
        self.manage(value)
    }

    pub(super) fn return_managed(&mut self, m: Option<Managed>, ty: &Type) -> LowerResult<()> {
        let value = match (m, self.out) {
            (Some(m), Some(out)) => {
                self.store_into(m, ty, out, true);
                None
            }
            (Some(m), None) => Some(self.owned(m, ty)),
            (None, _) => None,
        };
        self.emit_cleanups_to(0)?;
        let value = match value {
            Some(value) => value,
            None => self.b.unit(),
        };
        self.b.terminate(Terminator::Return { value });
        Ok(())
    }

    /// Throws `error` (an owned error existential) to the innermost
    /// handler.
    pub(super) fn emit_throw(&mut self, error: ValueId, span: Span) -> LowerResult<()> {
        if let Some(exit) = self.catches.last().copied() {
            self.emit_cleanups_to(exit.depth)?;
            self.b.br(exit.block, vec![error]);
        } else if self.throws {
            self.emit_cleanups_to(0)?;
            self.b.terminate(Terminator::Throw { value: error });
        } else {
            tracing::trace!(target: "lower", ?span, "error escapes a non-throwing function");
            self.trap("unexpected_error", vec![error]);
        }
        Ok(())
    }

    /// Calls a runtime failure builtin and ends the block.
    pub(super) fn trap(&mut self, name: &str, args: Vec<ValueId>) {
        self.b.emit_value(
            InstKind::Builtin {
                name: name.to_string(),
                args,
            },
            crate::core::ir::IrType::unit(),
            crate::core::ir::Ownership::Trivial,
        );
        self.b.terminate(Terminator::Unreachable);
    }

    // -- Local declarations --

    fn lower_local_item(&mut self, item: &'a Item) -> LowerResult<()> {
        match &item.kind {
            ItemKind::Var(var) => self.lower_local_var(var),
            ItemKind::Func(func) => self.lower_local_function(item, func),
            ItemKind::Struct(_) | ItemKind::Class(_) | ItemKind::Enum(_) | ItemKind::TypeAlias(_) => {
                self.cx.lower_item(item);
                Ok(())
            }
            _ => Err(self.unsupported("local declaration", item.span)),
        }
    }

    fn lower_local_var(&mut self, var: &'a VarDecl) -> LowerResult<()> {
        let pattern = &var.pattern;
        match (&pattern.kind, &var.init) {
            (PatternKind::Binding { name, .. }, init) => {
                let ty = self.cx.tables.locals.get(&pattern.id).map(|local| local.ty.clone()).unwrap_or(Type::Error);
                let value = match init {
                    Some(init) => Some(self.lower_expr(init)?),
                    None => None,
                };
                match value {
                    Some(m) => self.bind_local(pattern.id, name, var.is_let, m, &ty),
                    None => {
                        self.declare_uninitialized(pattern.id, name, &ty);
                        Ok(())
                    }
                }
            }
            (_, Some(init)) => {
                let ty = self.cx.tables.converted_type_of(init.id);
                let m = self.lower_expr(init)?;
                let m = self.owned_managed(m, &ty);
                let addr = self.to_addr(m, &ty);
                let fail = self.b.add_block();
                let depth = self.depth();
                self.match_pattern(pattern, addr, &ty, Exit { block: fail, depth })?;
                let cont = self.b.current_block();
                self.b.switch_to(fail);
                self.b.terminate(Terminator::Unreachable);
                if let Some(cont) = cont {
                    self.b.switch_to(cont);
                }
                Ok(())
            }
            (_, None) => Err(self.unsupported("destructuring declaration without a value", var.pattern.span)),
        }
    }

    /// `var x: T` with no initial value: a slot the first assignment fills.
    fn declare_uninitialized(&mut self, node: crate::core::tree::NodeId, name: &str, ty: &Type) {
        if self.cx.captures.is_boxed(node) {
            let (boxed, addr) = self.alloc_box(ty, name);
            self.locals.insert(node, LocalSlot::Boxed { boxed, addr });
            return;
        }
        let slot = self.alloc_temp(ty, Some(name.to_string()));
        if !self.is_trivial(ty) {
            self.push_cleanup(CleanupKind::DestroyAddr(slot));
        }
        self.locals.insert(node, LocalSlot::Addr(slot));
    }

    fn alloc_box(&mut self, ty: &Type, name: &str) -> (ValueId, ValueId) {
        let box_ty = self.cx.types.box_type(ty);
        let boxed = self.b.emit_value(
            InstKind::AllocBox {
                ty: box_ty.clone(),
                name: Some(name.to_string()),
            },
            box_ty,
            crate::core::ir::Ownership::Owned,
        );
        self.push_cleanup(CleanupKind::DestroyValue(boxed));
        let addr_ty = self.ir(ty).address_of();
        let addr = self
            .b
            .emit_value(InstKind::ProjectBox { boxed }, addr_ty, crate::core::ir::Ownership::Trivial);
        (boxed, addr)
    }

    /// Binds a local to a value: boxed when captured by an escaping
    /// closure, a stack slot for `var`, the value itself for a loadable
    /// `let`.
    pub(super) fn bind_local(
        &mut self,
        node: crate::core::tree::NodeId,
        name: &str,
        is_let: bool,
        m: Managed,
        ty: &Type,
    ) -> LowerResult<()> {
        if self.cx.captures.is_boxed(node) {
            let (boxed, addr) = self.alloc_box(ty, name);
            self.store_into(m, ty, addr, true);
            self.locals.insert(node, LocalSlot::Boxed { boxed, addr });
            return Ok(());
        }
        if !is_let || self.is_address_only(ty) {
            let slot = self.alloc_temp(ty, Some(name.to_string()));
            self.store_into(m, ty, slot, true);
            if !self.is_trivial(ty) {
                self.push_cleanup(CleanupKind::DestroyAddr(slot));
            }
            self.locals.insert(node, LocalSlot::Addr(slot));
            return Ok(());
        }
        let m = self.owned_managed(m, ty);
        let value = match m {
            Managed::Value { value, .. } => value,
            Managed::Addr { addr, .. } => addr,
        };
        self.b.emit(InstKind::DebugValue {
            value,
            name: name.to_string(),
            is_let: true,
        });
        self.locals.insert(node, LocalSlot::Value(value));
        Ok(())
    }
}

pub(super) fn strip_parens(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Paren(inner) => strip_parens(inner),
        _ => expr,
    }
}

fn range_bounds(expr: &Expr) -> Option<(BinaryOp, &Expr, &Expr)> {
    match &strip_parens(expr).kind {
        ExprKind::Binary { op, lhs, rhs } if matches!(op, BinaryOp::HalfOpenRange | BinaryOp::ClosedRange) => {
            Some((*op, lhs, rhs))
        }
        _ => None,
    }
}

fn pattern_binds(pattern: &Pattern) -> bool {
    match &pattern.kind {
        PatternKind::Binding { .. } => true,
        PatternKind::Tuple(elems) => elems.iter().any(pattern_binds),
        PatternKind::EnumCase { payload, .. } => payload.iter().flatten().any(pattern_binds),
        PatternKind::OptionalSome(inner) => pattern_binds(inner),
        _ => false,
    }
}
