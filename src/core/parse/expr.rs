use super::*;

const OR_PREC: u8 = 10;
const AND_PREC: u8 = 20;
const COMPARISON_PREC: u8 = 30;
const NIL_COALESCE_PREC: u8 = 40;
const CAST_PREC: u8 = 50;
pub(super) const RANGE_PREC: u8 = 60;
const ADD_PREC: u8 = 70;
const MUL_PREC: u8 = 80;

/// Binary operator, precedence and right associativity for a token.
fn token_to_binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8, bool)> {
    Some(match kind {
        TK::LogicalOr => (BinaryOp::Or, OR_PREC, false),
        TK::LogicalAnd => (BinaryOp::And, AND_PREC, false),
        TK::EqEq => (BinaryOp::Eq, COMPARISON_PREC, false),
        TK::NotEq => (BinaryOp::Ne, COMPARISON_PREC, false),
        TK::LessThan => (BinaryOp::Lt, COMPARISON_PREC, false),
        TK::LessThanEq => (BinaryOp::Le, COMPARISON_PREC, false),
        TK::GreaterThan => (BinaryOp::Gt, COMPARISON_PREC, false),
        TK::GreaterThanEq => (BinaryOp::Ge, COMPARISON_PREC, false),
        TK::NilCoalesce => (BinaryOp::NilCoalesce, NIL_COALESCE_PREC, true),
        TK::HalfOpenRange => (BinaryOp::HalfOpenRange, RANGE_PREC, false),
        TK::Ellipsis => (BinaryOp::ClosedRange, RANGE_PREC, false),
        TK::Plus => (BinaryOp::Add, ADD_PREC, false),
        TK::Minus => (BinaryOp::Sub, ADD_PREC, false),
        TK::Star => (BinaryOp::Mul, MUL_PREC, false),
        TK::Slash => (BinaryOp::Div, MUL_PREC, false),
        TK::Percent => (BinaryOp::Mod, MUL_PREC, false),
        _ => return None,
    })
}

fn token_to_assign_op(kind: &TokenKind) -> Option<AssignOp> {
    match kind {
        TK::Equals => Some(AssignOp::Assign),
        TK::PlusEquals => Some(AssignOp::Add),
        TK::MinusEquals => Some(AssignOp::Sub),
        TK::StarEquals => Some(AssignOp::Mul),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> Expr {
        let marker = self.mark();
        if self.at(&TK::KwTry) {
            self.advance();
            let kind = if !self.curr_token.spaced && self.eat(&TK::Question) {
                TryKind::Optional
            } else if !self.curr_token.spaced && self.eat(&TK::Bang) {
                TryKind::Force
            } else {
                TryKind::Plain
            };
            let inner = self.parse_assignment();
            return Expr {
                id: self.id_gen.new_id(),
                kind: ExprKind::Try {
                    kind,
                    expr: Box::new(inner),
                },
                span: self.close(marker),
            };
        }
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let marker = self.mark();
        let lhs = self.parse_ternary();
        let Some(op) = token_to_assign_op(&self.curr_token.kind) else {
            return lhs;
        };
        self.advance();
        let rhs = self.parse_expr();
        Expr {
            id: self.id_gen.new_id(),
            kind: ExprKind::Assign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span: self.close(marker),
        }
    }

    fn parse_ternary(&mut self) -> Expr {
        let marker = self.mark();
        let cond = self.parse_binary(0);
        if !(self.at(&TK::Question) && self.curr_token.spaced) {
            return cond;
        }
        self.advance();
        let then_expr = self.parse_expr();
        self.expect(&TK::Colon);
        let else_expr = self.parse_ternary();
        Expr {
            id: self.id_gen.new_id(),
            kind: ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span: self.close(marker),
        }
    }

    pub(super) fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let marker = self.mark();
        let mut lhs = self.parse_prefix();
        loop {
            if self.at(&TK::KwAs) {
                if CAST_PREC < min_prec {
                    break;
                }
                self.advance();
                let ty = self.parse_type();
                lhs = Expr {
                    id: self.id_gen.new_id(),
                    kind: ExprKind::As {
                        expr: Box::new(lhs),
                        ty,
                    },
                    span: self.close(marker),
                };
                continue;
            }
            let Some((op, prec, right_assoc)) = token_to_binary_op(&self.curr_token.kind) else {
                break;
            };
            // `a\n-b`: a prefix operator bound to the next operand starts a new expression.
            if self.curr_token.spaced && !self.peek().spaced && op == BinaryOp::Sub {
                break;
            }
            if prec < min_prec {
                break;
            }
            self.advance();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_binary(next_min);
            lhs = Expr {
                id: self.id_gen.new_id(),
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span: self.close(marker),
            };
        }
        lhs
    }

    fn parse_prefix(&mut self) -> Expr {
        let marker = self.mark();
        let kind = match self.curr_token.kind {
            TK::Minus => {
                self.advance();
                let operand = self.parse_prefix();
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                }
            }
            TK::Bang => {
                self.advance();
                let operand = self.parse_prefix();
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                }
            }
            TK::Ampersand => {
                self.advance();
                let operand = self.parse_prefix();
                ExprKind::InOut(Box::new(operand))
            }
            _ => return self.parse_postfix(),
        };
        Expr {
            id: self.id_gen.new_id(),
            kind,
            span: self.close(marker),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let marker = self.mark();
        let mut expr = self.parse_primary();
        let mut has_bind = false;
        loop {
            let token = self.curr_token;
            expr = match &token.kind {
                TK::LParen if !token.newline => self.parse_call(expr, marker),
                TK::LBracket if !token.newline => self.parse_subscript(expr, marker),
                TK::Dot => match self.parse_member_suffix(expr, marker) {
                    Ok(next) => next,
                    Err(stop) => {
                        expr = stop;
                        break;
                    }
                },
                TK::Bang if !token.spaced => {
                    self.advance();
                    Expr {
                        id: self.id_gen.new_id(),
                        kind: ExprKind::ForceUnwrap(Box::new(expr)),
                        span: self.close(marker),
                    }
                }
                TK::Question if !token.spaced => {
                    self.advance();
                    has_bind = true;
                    Expr {
                        id: self.id_gen.new_id(),
                        kind: ExprKind::BindOptional(Box::new(expr)),
                        span: self.close(marker),
                    }
                }
                TK::LBrace if self.accepts_trailing_closure(&expr) => {
                    let closure = self.parse_closure_expr();
                    Expr {
                        id: self.id_gen.new_id(),
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args: vec![Arg {
                                label: None,
                                label_span: None,
                                expr: closure,
                                trailing: true,
                            }],
                        },
                        span: self.close(marker),
                    }
                }
                _ => break,
            };
        }
        if has_bind {
            expr = Expr {
                id: self.id_gen.new_id(),
                kind: ExprKind::OptionalEval(Box::new(expr)),
                span: self.close(marker),
            };
        }
        expr
    }

    fn accepts_trailing_closure(&self, callee: &Expr) -> bool {
        self.allow_trailing_closure
            && !self.curr_token.newline
            && !self.block_starts_with_accessor()
            && matches!(
                callee.kind,
                ExprKind::Ident(_)
                    | ExprKind::Member { .. }
                    | ExprKind::ImplicitMember(_)
                    | ExprKind::Call { .. }
            )
    }

    /// Parses `.name`, `.0` or `.<cursor>` after `base`. Returns `Err(base)`
    /// when nothing usable follows the dot.
    fn parse_member_suffix(&mut self, base: Expr, marker: Marker) -> Result<Expr, Expr> {
        self.advance(); // .
        let token = self.curr_token;
        let kind = match &token.kind {
            TK::Ident(name) => {
                self.advance();
                ExprKind::Member {
                    base: Box::new(base),
                    name: name.clone(),
                    name_span: token.span,
                }
            }
            TK::KwInit => {
                self.advance();
                ExprKind::Member {
                    base: Box::new(base),
                    name: "init".to_string(),
                    name_span: token.span,
                }
            }
            TK::IntLit(index) => {
                self.advance();
                ExprKind::TupleIndex {
                    base: Box::new(base),
                    index: *index as usize,
                }
            }
            TK::FloatLit(text) => {
                // `t.0.1` lexes the indices as one float literal.
                self.advance();
                let mut expr = base;
                for part in text.split('.') {
                    let index = part.parse::<usize>().unwrap_or(0);
                    expr = Expr {
                        id: self.id_gen.new_id(),
                        kind: ExprKind::TupleIndex {
                            base: Box::new(expr),
                            index,
                        },
                        span: self.close(marker),
                    };
                }
                return Ok(expr);
            }
            TK::CodeCompletion => {
                self.advance();
                let id = self.id_gen.new_id();
                self.record_completion(CompletionSite::AfterDot {
                    base: Some(base.id),
                    expr: id,
                });
                return Ok(Expr {
                    id,
                    kind: ExprKind::MemberCompletion(Box::new(base)),
                    span: self.close(marker),
                });
            }
            _ => {
                self.error_here(ParseErrorKind::ExpectedMemberName(token.clone()));
                return Err(base);
            }
        };
        Ok(Expr {
            id: self.id_gen.new_id(),
            kind,
            span: self.close(marker),
        })
    }

    fn parse_call(&mut self, callee: Expr, marker: Marker) -> Expr {
        let id = self.id_gen.new_id();
        self.advance(); // (
        let mut args = self.parse_args(TK::RParen, id, false);
        self.expect(&TK::RParen);
        if self.at(&TK::LBrace) && self.accepts_trailing_closure(&callee) {
            let closure = self.parse_closure_expr();
            args.push(Arg {
                label: None,
                label_span: None,
                expr: closure,
                trailing: true,
            });
        }
        Expr {
            id,
            kind: ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span: self.close(marker),
        }
    }

    fn parse_subscript(&mut self, base: Expr, marker: Marker) -> Expr {
        let id = self.id_gen.new_id();
        self.advance(); // [
        let args = self.parse_args(TK::RBracket, id, true);
        self.expect(&TK::RBracket);
        Expr {
            id,
            kind: ExprKind::Subscript {
                base: Box::new(base),
                args,
            },
            span: self.close(marker),
        }
    }

    fn arg_label(&mut self) -> (Option<String>, Option<Span>) {
        if self.peek().kind != TK::Colon {
            return (None, None);
        }
        let span = self.curr_token.span;
        let label = match &self.curr_token.kind {
            TK::Ident(name) => name.clone(),
            TK::KwIn | TK::KwFor | TK::KwDefault | TK::KwWhere => self.curr_token.kind.to_string(),
            _ => return (None, None),
        };
        self.advance();
        self.advance();
        (Some(label), Some(span))
    }

    fn parse_args(&mut self, end: TokenKind, owner: NodeId, subscript: bool) -> Vec<Arg> {
        let saved = std::mem::replace(&mut self.allow_trailing_closure, true);
        let mut args = Vec::new();
        while !self.at(&end) && !self.at(&TK::Eof) {
            let start = self.pos;
            let (label, label_span) = self.arg_label();
            let at_cursor = self.at(&TK::CodeCompletion)
                && label.is_none()
                && matches!(self.peek().kind, TK::Comma | TK::RParen | TK::RBracket | TK::Eof);
            let expr = if at_cursor {
                let marker = self.mark();
                self.advance();
                let id = self.id_gen.new_id();
                let arg_index = args.len();
                self.record_completion(if subscript {
                    CompletionSite::InsideSubscriptArgList {
                        subscript: owner,
                        arg_index,
                        expr: id,
                    }
                } else {
                    CompletionSite::InsideCallArgList {
                        call: owner,
                        arg_index,
                        expr: id,
                    }
                });
                Expr {
                    id,
                    kind: ExprKind::CodeCompletion,
                    span: self.close(marker),
                }
            } else {
                self.parse_expr()
            };
            args.push(Arg {
                label,
                label_span,
                expr,
                trailing: false,
            });
            if !self.eat(&TK::Comma) || self.pos == start {
                break;
            }
        }
        self.allow_trailing_closure = saved;
        args
    }

    fn parse_primary(&mut self) -> Expr {
        let marker = self.mark();
        let id = self.id_gen.new_id();
        let kind = match &self.curr_token.kind {
            TK::IntLit(value) => {
                let value = *value;
                self.advance();
                ExprKind::IntLit(value)
            }
            TK::FloatLit(text) => {
                self.advance();
                ExprKind::FloatLit(text.clone())
            }
            TK::StringLit(text) => {
                self.advance();
                ExprKind::StringLit(text.clone())
            }
            TK::BoolLit(value) => {
                let value = *value;
                self.advance();
                ExprKind::BoolLit(value)
            }
            TK::KwNil => {
                self.advance();
                ExprKind::NilLit
            }
            TK::Ident(name) => {
                self.advance();
                ExprKind::Ident(name.clone())
            }
            TK::KwSelfType => {
                self.advance();
                ExprKind::Ident("Self".to_string())
            }
            TK::KwSelf => {
                self.advance();
                ExprKind::SelfRef
            }
            TK::KwSuper => {
                self.advance();
                ExprKind::SuperRef
            }
            TK::Dot => {
                self.advance();
                if self.at(&TK::CodeCompletion) {
                    self.advance();
                    self.record_completion(CompletionSite::AfterDot {
                        base: None,
                        expr: id,
                    });
                    ExprKind::ImplicitMemberCompletion
                } else {
                    ExprKind::ImplicitMember(self.parse_member_name())
                }
            }
            TK::LParen => self.parse_paren_or_tuple(),
            TK::LBrace => return self.parse_closure_expr(),
            TK::LBracket => {
                self.error_here(ParseErrorKind::ArrayLiteralUnsupported);
                self.skip_balanced(TK::LBracket, TK::RBracket);
                ExprKind::Error
            }
            TK::CodeCompletion => {
                self.advance();
                self.record_completion(CompletionSite::BeforeDot { expr: id });
                ExprKind::CodeCompletion
            }
            _ => {
                self.error_here(ParseErrorKind::ExpectedExpr(self.curr_token.clone()));
                ExprKind::Error
            }
        };
        Expr {
            id,
            kind,
            span: self.close(marker),
        }
    }

    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) {
        let mut depth = 0usize;
        loop {
            if self.at(&TK::Eof) {
                return;
            }
            if self.at(&open) {
                depth += 1;
            } else if self.at(&close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    self.advance();
                    return;
                }
            }
            self.advance();
        }
    }

    fn parse_paren_or_tuple(&mut self) -> ExprKind {
        self.advance(); // (
        let saved = std::mem::replace(&mut self.allow_trailing_closure, true);
        let mut elems = self.parse_list(TK::RParen, |parser| {
            let (label, _) = parser.arg_label();
            let expr = parser.parse_expr();
            TupleElemExpr { label, expr }
        });
        self.allow_trailing_closure = saved;
        self.expect(&TK::RParen);
        if elems.len() == 1 && elems[0].label.is_none() {
            let elem = elems.remove(0);
            return ExprKind::Paren(Box::new(elem.expr));
        }
        ExprKind::Tuple(elems)
    }

    /// Scans ahead for `in` that ends a closure signature on the first line.
    fn closure_has_signature(&self) -> bool {
        let mut depth = 0usize;
        let mut index = self.pos + 1; // after `{`
        let first = index;
        while index < self.tokens.len() {
            let token = &self.tokens[index];
            if index > first && token.newline && depth == 0 {
                return false;
            }
            match token.kind {
                TK::LParen => depth += 1,
                TK::RParen => depth = depth.saturating_sub(1),
                TK::KwIn if depth == 0 => return true,
                TK::LBrace | TK::RBrace | TK::Eof | TK::KwFor | TK::Equals => return false,
                _ => {}
            }
            index += 1;
        }
        false
    }

    fn parse_closure_param(&mut self) -> ClosureParam {
        let marker = self.mark();
        let name = match &self.curr_token.kind {
            TK::Underscore => {
                self.advance();
                "_".to_string()
            }
            _ => self.parse_ident().unwrap_or_default(),
        };
        let ty = if self.eat(&TK::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        ClosureParam {
            id: self.id_gen.new_id(),
            name,
            ty,
            span: self.close(marker),
        }
    }

    pub(super) fn parse_closure_expr(&mut self) -> Expr {
        let marker = self.mark();
        let has_signature = self.closure_has_signature();
        self.advance(); // {

        let mut params = Vec::new();
        let mut result = None;
        let mut throws = false;
        if has_signature {
            if self.eat(&TK::LParen) {
                params = self.parse_list(TK::RParen, |parser| parser.parse_closure_param());
                self.expect(&TK::RParen);
            } else {
                params = self.parse_list(TK::KwIn, |parser| parser.parse_closure_param());
            }
            throws = self.eat(&TK::KwThrows);
            if self.eat(&TK::Arrow) {
                result = Some(self.parse_type());
            }
            self.expect(&TK::KwIn);
        }

        let body_marker = self.mark();
        let body_id = self.id_gen.new_id();
        let saved = std::mem::replace(&mut self.allow_trailing_closure, true);
        let mut stmts = Vec::new();
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
        self.allow_trailing_closure = saved;
        let body_span = self.close(body_marker);
        self.expect(&TK::RBrace);

        Expr {
            id: self.id_gen.new_id(),
            kind: ExprKind::Closure(Box::new(ClosureExpr {
                params,
                result,
                throws,
                body: Block {
                    id: body_id,
                    stmts,
                    span: body_span,
                },
            })),
            span: self.close(marker),
        }
    }
}
