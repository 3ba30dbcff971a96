use super::*;
use super::expr::RANGE_PREC;

impl<'a> Parser<'a> {
    /// Parses a pattern. `binding` is `Some(is_let)` inside `let`/`var`,
    /// where bare identifiers introduce bindings.
    pub(super) fn parse_pattern(&mut self, binding: Option<bool>) -> Pattern {
        let marker = self.mark();
        let mut pattern = self.parse_primary_pattern(binding);
        while self.at(&TK::Question) && !self.curr_token.spaced {
            self.advance();
            pattern = Pattern {
                id: self.id_gen.new_id(),
                kind: PatternKind::OptionalSome(Box::new(pattern)),
                span: self.close(marker),
            };
        }
        pattern
    }

    fn parse_primary_pattern(&mut self, binding: Option<bool>) -> Pattern {
        let marker = self.mark();
        let id = self.id_gen.new_id();
        let kind = match &self.curr_token.kind {
            TK::Underscore => {
                self.advance();
                PatternKind::Wildcard
            }
            TK::KwLet | TK::KwVar => {
                let is_let = self.at(&TK::KwLet);
                self.advance();
                return self.parse_pattern(Some(is_let));
            }
            TK::CodeCompletion => {
                self.advance();
                self.record_completion(CompletionSite::InPatternPosition {
                    pattern: id,
                    after_dot: false,
                });
                PatternKind::CodeCompletion
            }
            TK::Dot => {
                self.advance();
                if self.at(&TK::CodeCompletion) {
                    self.advance();
                    self.record_completion(CompletionSite::InPatternPosition {
                        pattern: id,
                        after_dot: true,
                    });
                    PatternKind::CodeCompletion
                } else {
                    let name = self.parse_member_name();
                    let payload = self.parse_pattern_payload(binding);
                    PatternKind::EnumCase {
                        parent: None,
                        name,
                        payload,
                    }
                }
            }
            TK::LParen => {
                self.advance();
                let mut elems = self.parse_list(TK::RParen, |parser| parser.parse_pattern(binding));
                self.expect(&TK::RParen);
                if elems.len() == 1 {
                    return elems.remove(0);
                }
                PatternKind::Tuple(elems)
            }
            TK::Ident(name) if binding.is_some() => {
                let name = name.clone();
                self.advance();
                PatternKind::Binding {
                    name,
                    is_let: binding.unwrap_or(true),
                }
            }
            // `Type.case(...)`
            TK::Ident(_)
                if self.peek().kind == TK::Dot && matches!(self.peek_at(2).kind, TK::Ident(_)) =>
            {
                let parent = self.parse_type_path_for_pattern();
                let name = self.parse_member_name();
                let payload = self.parse_pattern_payload(binding);
                PatternKind::EnumCase {
                    parent: Some(parent),
                    name,
                    payload,
                }
            }
            TK::IntLit(_)
            | TK::FloatLit(_)
            | TK::StringLit(_)
            | TK::BoolLit(_)
            | TK::KwNil
            | TK::Minus
            | TK::Ident(_) => {
                let expr = self.parse_binary(RANGE_PREC);
                PatternKind::Expr(Box::new(expr))
            }
            _ => {
                self.error_here(ParseErrorKind::ExpectedPattern(self.curr_token.clone()));
                PatternKind::Error
            }
        };
        Pattern {
            id,
            kind,
            span: self.close(marker),
        }
    }

    /// `Shape` in `Shape.circle(...)`: one path segment followed by `.`.
    fn parse_type_path_for_pattern(&mut self) -> TypeExpr {
        let marker = self.mark();
        let name = self.parse_ident().unwrap_or_default();
        let ty = TypeExpr {
            id: self.id_gen.new_id(),
            kind: TypeExprKind::Path(vec![TypeSegment {
                name,
                args: Vec::new(),
            }]),
            span: self.close(marker),
        };
        self.expect(&TK::Dot);
        ty
    }

    pub(super) fn parse_member_name(&mut self) -> String {
        match &self.curr_token.kind {
            TK::Ident(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            TK::KwInit => {
                self.advance();
                "init".to_string()
            }
            _ => {
                self.error_here(ParseErrorKind::ExpectedMemberName(self.curr_token.clone()));
                String::new()
            }
        }
    }

    fn parse_pattern_payload(&mut self, binding: Option<bool>) -> Option<Vec<Pattern>> {
        if !self.at(&TK::LParen) {
            return None;
        }
        self.advance();
        let elems = self.parse_list(TK::RParen, |parser| {
            // Payload labels (`.point(x: let a, y: _)`) are accepted and dropped.
            if matches!(parser.curr_token.kind, TK::Ident(_)) && parser.peek().kind == TK::Colon
            {
                parser.advance();
                parser.advance();
            }
            parser.parse_pattern(binding)
        });
        self.expect(&TK::RParen);
        Some(elems)
    }
}
