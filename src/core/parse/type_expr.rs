use super::*;

impl<'a> Parser<'a> {
    pub(super) fn parse_type(&mut self) -> TypeExpr {
        let marker = self.mark();
        if self.eat(&TK::KwInout) {
            let inner = self.parse_type();
            return TypeExpr {
                id: self.id_gen.new_id(),
                kind: TypeExprKind::InOut(Box::new(inner)),
                span: self.close(marker),
            };
        }
        // Attributes on types (`@escaping`) carry no meaning at this level.
        let _ = self.parse_attribute_list();

        let first = self.parse_postfix_type();
        if !self.at(&TK::Ampersand) {
            return first;
        }
        let mut parts = vec![first];
        while self.eat(&TK::Ampersand) {
            parts.push(self.parse_postfix_type());
        }
        TypeExpr {
            id: self.id_gen.new_id(),
            kind: TypeExprKind::Composition(parts),
            span: self.close(marker),
        }
    }

    fn parse_postfix_type(&mut self) -> TypeExpr {
        let marker = self.mark();
        let mut ty = self.parse_primary_type();
        loop {
            match &self.curr_token.kind {
                TK::Question | TK::Bang if !self.curr_token.spaced => {
                    self.advance();
                    ty = TypeExpr {
                        id: self.id_gen.new_id(),
                        kind: TypeExprKind::Optional(Box::new(ty)),
                        span: self.close(marker),
                    };
                }
                TK::Dot if matches!(&self.peek().kind, TK::Ident(name) if name == "Type") => {
                    self.advance();
                    self.advance();
                    ty = TypeExpr {
                        id: self.id_gen.new_id(),
                        kind: TypeExprKind::Metatype(Box::new(ty)),
                        span: self.close(marker),
                    };
                }
                _ => break,
            }
        }
        ty
    }

    fn parse_primary_type(&mut self) -> TypeExpr {
        let marker = self.mark();
        let kind = match &self.curr_token.kind {
            TK::Ident(_) => TypeExprKind::Path(self.parse_type_path()),
            TK::KwSelfType => {
                self.advance();
                if self.at(&TK::Dot) && matches!(self.peek().kind, TK::Ident(_)) {
                    // `Self.Assoc`
                    self.advance();
                    let mut segments = vec![TypeSegment {
                        name: "Self".to_string(),
                        args: Vec::new(),
                    }];
                    segments.extend(self.parse_type_path());
                    TypeExprKind::Path(segments)
                } else {
                    TypeExprKind::SelfType
                }
            }
            TK::LParen => return self.parse_paren_or_function_type(),
            _ => {
                self.error_here(ParseErrorKind::ExpectedType(self.curr_token.clone()));
                TypeExprKind::Error
            }
        };
        TypeExpr {
            id: self.id_gen.new_id(),
            kind,
            span: self.close(marker),
        }
    }

    fn parse_type_path(&mut self) -> Vec<TypeSegment> {
        let mut segments = Vec::new();
        loop {
            let Some(name) = self.parse_ident() else {
                break;
            };
            let args = if self.at(&TK::LessThan) && !self.curr_token.spaced {
                self.advance();
                let args = self.parse_list(TK::GreaterThan, |parser| parser.parse_type());
                self.expect(&TK::GreaterThan);
                args
            } else {
                Vec::new()
            };
            segments.push(TypeSegment { name, args });
            let continues = self.at(&TK::Dot)
                && matches!(&self.peek().kind, TK::Ident(name) if name != "Type");
            if !continues {
                break;
            }
            self.advance();
        }
        segments
    }

    /// `( label: T, U )` element list, always producing a list.
    pub(super) fn parse_tuple_type_elems(&mut self) -> Vec<TupleTypeElem> {
        if !self.expect(&TK::LParen) {
            return Vec::new();
        }
        let elems = self.parse_list(TK::RParen, |parser| {
            let label = match (&parser.curr_token.kind, &parser.peek().kind) {
                (TK::Ident(name), TK::Colon) => {
                    let name = name.clone();
                    parser.advance();
                    parser.advance();
                    Some(name)
                }
                (TK::Underscore, TK::Colon) => {
                    parser.advance();
                    parser.advance();
                    None
                }
                // `_ name: T` in function type parameter lists
                (TK::Underscore, TK::Ident(_)) if matches!(parser.peek_at(2).kind, TK::Colon) => {
                    parser.advance();
                    parser.advance();
                    parser.advance();
                    None
                }
                _ => None,
            };
            let ty = parser.parse_type();
            // Variadic markers inside function types are accepted and dropped.
            parser.eat(&TK::Ellipsis);
            TupleTypeElem { label, ty }
        });
        self.expect(&TK::RParen);
        elems
    }

    fn parse_paren_or_function_type(&mut self) -> TypeExpr {
        let marker = self.mark();
        let elems = self.parse_tuple_type_elems();
        let throws = self.eat(&TK::KwThrows);
        if throws || self.at(&TK::Arrow) {
            self.expect(&TK::Arrow);
            let result = self.parse_type();
            return TypeExpr {
                id: self.id_gen.new_id(),
                kind: TypeExprKind::Function {
                    params: elems.into_iter().map(|elem| elem.ty).collect(),
                    result: Box::new(result),
                    throws,
                },
                span: self.close(marker),
            };
        }
        if elems.len() == 1 && elems[0].label.is_none() {
            // Parenthesized type.
            let mut elems = elems;
            return elems.remove(0).ty;
        }
        TypeExpr {
            id: self.id_gen.new_id(),
            kind: TypeExprKind::Tuple(elems),
            span: self.close(marker),
        }
    }
}
