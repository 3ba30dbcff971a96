use super::*;

impl<'a> Parser<'a> {
    pub(super) fn parse_block(&mut self) -> Block {
        let marker = self.mark();
        let id = self.id_gen.new_id();
        let saved = std::mem::replace(&mut self.allow_trailing_closure, true);
        let mut stmts = Vec::new();
        if self.expect(&TK::LBrace) {
            while !self.at(&TK::RBrace) && !self.at(&TK::Eof) {
                let start = self.pos;
                if self.eat(&TK::Semicolon) {
                    continue;
                }
                stmts.push(self.parse_stmt());
                if self.pos == start {
                    self.advance();
                }
            }
            self.expect(&TK::RBrace);
        }
        self.allow_trailing_closure = saved;
        Block {
            id,
            stmts,
            span: self.close(marker),
        }
    }

    pub(super) fn parse_stmt(&mut self) -> Stmt {
        let marker = self.mark();
        let id = self.id_gen.new_id();
        let kind = match &self.curr_token.kind {
            _ if self.starts_decl() && !self.at(&TK::KwCase) => {
                StmtKind::Item(Box::new(self.parse_item()))
            }
            TK::KwIf => self.parse_if(),
            TK::KwGuard => {
                self.advance();
                let conds = self.parse_conditions();
                self.expect(&TK::KwElse);
                let else_block = self.parse_block();
                StmtKind::Guard { conds, else_block }
            }
            TK::KwWhile => {
                self.advance();
                let conds = self.parse_conditions();
                let body = self.parse_block();
                StmtKind::While { conds, body }
            }
            TK::KwFor => {
                self.advance();
                let pattern = match &self.curr_token.kind {
                    TK::Ident(_) => self.parse_pattern(Some(true)),
                    _ => self.parse_pattern(None),
                };
                self.expect(&TK::KwIn);
                let seq = self.parse_condition_expr();
                let body = self.parse_block();
                StmtKind::ForIn { pattern, seq, body }
            }
            TK::KwSwitch => self.parse_switch(),
            TK::KwDo => {
                self.advance();
                let body = self.parse_block();
                let mut catches = Vec::new();
                while self.at(&TK::KwCatch) {
                    let catch_marker = self.mark();
                    self.advance();
                    let binding = if self.eat(&TK::KwLet) || self.eat(&TK::KwVar) {
                        self.parse_ident()
                    } else {
                        None
                    };
                    let body = self.parse_block();
                    catches.push(CatchClause {
                        id: self.id_gen.new_id(),
                        binding,
                        body,
                        span: self.close(catch_marker),
                    });
                }
                StmtKind::Do { body, catches }
            }
            TK::KwReturn => {
                self.advance();
                let value = if self.at_stmt_boundary()
                    || matches!(self.curr_token.kind, TK::KwCase | TK::KwDefault)
                {
                    None
                } else {
                    Some(self.parse_expr())
                };
                StmtKind::Return(value)
            }
            TK::KwBreak => {
                self.advance();
                StmtKind::Break
            }
            TK::KwContinue => {
                self.advance();
                StmtKind::Continue
            }
            TK::KwThrow => {
                self.advance();
                StmtKind::Throw(self.parse_expr())
            }
            TK::KwDefer => {
                self.advance();
                StmtKind::Defer(self.parse_block())
            }
            _ => {
                let expr = self.parse_expr();
                if expr.is_error() && !self.at(&TK::CodeCompletion) {
                    self.synchronize();
                }
                StmtKind::Expr(expr)
            }
        };
        if !matches!(kind, StmtKind::Item(_)) {
            self.finish_stmt();
        }
        Stmt {
            id,
            kind,
            span: self.close(marker),
        }
    }

    fn parse_if(&mut self) -> StmtKind {
        self.advance(); // if
        let conds = self.parse_conditions();
        let then_block = self.parse_block();
        let else_branch = if self.eat(&TK::KwElse) {
            let marker = self.mark();
            let id = self.id_gen.new_id();
            let kind = if self.at(&TK::KwIf) {
                self.parse_if()
            } else {
                StmtKind::Block(self.parse_block())
            };
            Some(Box::new(Stmt {
                id,
                kind,
                span: self.close(marker),
            }))
        } else {
            None
        };
        StmtKind::If {
            conds,
            then_block,
            else_branch,
        }
    }

    fn parse_condition_expr(&mut self) -> Expr {
        let saved = std::mem::replace(&mut self.allow_trailing_closure, false);
        let expr = self.parse_expr();
        self.allow_trailing_closure = saved;
        expr
    }

    fn parse_conditions(&mut self) -> Vec<Condition> {
        let mut conds = Vec::new();
        loop {
            let marker = self.mark();
            let cond = match &self.curr_token.kind {
                TK::KwLet | TK::KwVar => {
                    let is_let = self.at(&TK::KwLet);
                    self.advance();
                    let name = self.parse_ident().unwrap_or_default();
                    let ty = if self.eat(&TK::Colon) {
                        Some(self.parse_type())
                    } else {
                        None
                    };
                    let init = if self.eat(&TK::Equals) {
                        self.parse_condition_expr()
                    } else {
                        // `if let x {` shorthand binds `x` to itself.
                        Expr {
                            id: self.id_gen.new_id(),
                            kind: ExprKind::Ident(name.clone()),
                            span: self.close(marker),
                        }
                    };
                    Condition::OptionalBinding {
                        id: self.id_gen.new_id(),
                        is_let,
                        name,
                        ty,
                        init,
                        span: self.close(marker),
                    }
                }
                TK::KwCase => {
                    self.advance();
                    let pattern = self.parse_pattern(None);
                    self.expect(&TK::Equals);
                    let init = self.parse_condition_expr();
                    Condition::Case { pattern, init }
                }
                _ => Condition::Expr(self.parse_condition_expr()),
            };
            conds.push(cond);
            if !self.eat(&TK::Comma) {
                break;
            }
        }
        conds
    }

    fn parse_switch(&mut self) -> StmtKind {
        self.advance(); // switch
        let subject = self.parse_condition_expr();
        let mut cases = Vec::new();
        let mut saw_default = false;
        if self.expect(&TK::LBrace) {
            while !self.at(&TK::RBrace) && !self.at(&TK::Eof) {
                let start = self.pos;
                let marker = self.mark();
                let patterns = if self.eat(&TK::KwDefault) {
                    saw_default = true;
                    Vec::new()
                } else if self.eat(&TK::KwCase) {
                    if saw_default {
                        let span = self.close(marker);
                        self.error(ParseErrorKind::DefaultNotLast, span);
                    }
                    let mut patterns = vec![self.parse_pattern(None)];
                    while self.eat(&TK::Comma) {
                        patterns.push(self.parse_pattern(None));
                    }
                    patterns
                } else {
                    self.error_here(ParseErrorKind::ExpectedToken(
                        TK::KwCase,
                        self.curr_token.clone(),
                    ));
                    self.synchronize();
                    if self.pos == start {
                        self.advance();
                    }
                    continue;
                };
                let guard = if self.eat(&TK::KwWhere) {
                    Some(self.parse_expr())
                } else {
                    None
                };
                self.expect(&TK::Colon);
                let mut body = Vec::new();
                while !matches!(
                    self.curr_token.kind,
                    TK::KwCase | TK::KwDefault | TK::RBrace | TK::Eof
                ) {
                    let stmt_start = self.pos;
                    if self.eat(&TK::Semicolon) {
                        continue;
                    }
                    body.push(self.parse_stmt());
                    if self.pos == stmt_start {
                        self.advance();
                    }
                }
                cases.push(SwitchCase {
                    id: self.id_gen.new_id(),
                    patterns,
                    guard,
                    body,
                    span: self.close(marker),
                });
            }
            self.expect(&TK::RBrace);
        }
        StmtKind::Switch { subject, cases }
    }
}
