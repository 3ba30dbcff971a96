use super::*;

impl<'a> Parser<'a> {
    pub(super) fn parse_item(&mut self) -> Item {
        let marker = self.mark();
        let attrs = self.parse_attribute_list();
        let modifiers = self.parse_modifiers();
        let id = self.id_gen.new_id();
        let kind = match &self.curr_token.kind {
            TK::KwFunc => ItemKind::Func(self.parse_func_decl()),
            TK::KwInit => ItemKind::Init(self.parse_init_decl()),
            TK::KwSubscript => ItemKind::Subscript(self.parse_subscript_decl()),
            TK::KwVar | TK::KwLet => ItemKind::Var(self.parse_var_decl()),
            TK::KwStruct => ItemKind::Struct(self.parse_nominal_decl(false)),
            TK::KwClass => ItemKind::Class(self.parse_nominal_decl(false)),
            TK::KwEnum => ItemKind::Enum(self.parse_nominal_decl(false)),
            TK::KwProtocol => ItemKind::Protocol(self.parse_nominal_decl(true)),
            TK::KwCase => ItemKind::EnumCase(self.parse_enum_case_decl()),
            TK::KwExtension => ItemKind::Extension(self.parse_extension_decl()),
            TK::KwTypealias => ItemKind::TypeAlias(self.parse_typealias_decl()),
            TK::KwAssociatedtype => ItemKind::AssociatedType(self.parse_assoc_type_decl()),
            TK::KwImport => {
                self.advance();
                let name = self.parse_ident().unwrap_or_default();
                ItemKind::Import(name)
            }
            _ => {
                self.error_here(ParseErrorKind::ExpectedDecl(self.curr_token.clone()));
                self.synchronize();
                ItemKind::Error
            }
        };
        self.finish_stmt();
        Item {
            id,
            attrs,
            modifiers,
            kind,
            span: self.close(marker),
        }
    }

    fn parse_member_block(&mut self, in_protocol: bool) -> Vec<Item> {
        let saved = std::mem::replace(&mut self.in_protocol, in_protocol);
        let mut members = Vec::new();
        if self.expect(&TK::LBrace) {
            while !self.at(&TK::RBrace) && !self.at(&TK::Eof) {
                let start = self.pos;
                if self.eat(&TK::Semicolon) {
                    continue;
                }
                if self.starts_decl() {
                    members.push(self.parse_item());
                } else {
                    self.error_here(ParseErrorKind::ExpectedDecl(self.curr_token.clone()));
                    self.synchronize();
                }
                if self.pos == start {
                    self.advance();
                }
            }
            self.expect(&TK::RBrace);
        }
        self.in_protocol = saved;
        members
    }

    pub(super) fn parse_generic_params(&mut self) -> Vec<GenericParamDecl> {
        if !self.at(&TK::LessThan) {
            return Vec::new();
        }
        self.advance();
        let params = self.parse_list(TK::GreaterThan, |parser| {
            let marker = parser.mark();
            let name = parser.parse_ident().unwrap_or_default();
            let mut bounds = Vec::new();
            if parser.eat(&TK::Colon) {
                bounds.push(parser.parse_type());
            }
            GenericParamDecl {
                id: parser.id_gen.new_id(),
                name,
                bounds,
                span: parser.close(marker),
            }
        });
        self.expect(&TK::GreaterThan);
        params
    }

    pub(super) fn parse_inheritance_clause(&mut self) -> Vec<TypeExpr> {
        if !self.eat(&TK::Colon) {
            return Vec::new();
        }
        let mut inherits = vec![self.parse_type()];
        while self.eat(&TK::Comma) {
            inherits.push(self.parse_type());
        }
        inherits
    }

    pub(super) fn parse_where_clause(&mut self) -> Vec<WhereRequirement> {
        if !self.eat(&TK::KwWhere) {
            return Vec::new();
        }
        let mut reqs = Vec::new();
        loop {
            let subject = self.parse_type();
            if self.eat(&TK::Colon) {
                let bounds = match self.parse_type() {
                    TypeExpr {
                        kind: TypeExprKind::Composition(parts),
                        ..
                    } => parts,
                    ty => vec![ty],
                };
                reqs.push(WhereRequirement::Conformance { subject, bounds });
            } else if self.eat(&TK::EqEq) {
                let rhs = self.parse_type();
                reqs.push(WhereRequirement::SameType { lhs: subject, rhs });
            } else {
                self.error_here(ParseErrorKind::ExpectedToken(
                    TK::Colon,
                    self.curr_token.clone(),
                ));
                break;
            }
            if !self.eat(&TK::Comma) {
                break;
            }
        }
        reqs
    }

    pub(super) fn parse_params(&mut self) -> Vec<Param> {
        if !self.expect(&TK::LParen) {
            return Vec::new();
        }
        let params = self.parse_list(TK::RParen, |parser| parser.parse_param());
        self.expect(&TK::RParen);
        params
    }

    fn parse_param(&mut self) -> Param {
        let marker = self.mark();
        // label name: T | _ name: T | name: T
        let first = match &self.curr_token.kind {
            TK::Underscore => {
                self.advance();
                None
            }
            _ => Some(self.parse_param_name()),
        };
        let (label, name) = match &self.curr_token.kind {
            TK::Ident(_) | TK::Underscore => {
                let second = self.parse_param_name();
                (first, second)
            }
            _ => {
                let name = first.clone().unwrap_or_else(|| "_".to_string());
                (first, name)
            }
        };
        self.expect(&TK::Colon);

        let attrs = self.parse_attribute_list();
        let escaping = attrs.iter().any(|attr| attr.name == "escaping");
        let autoclosure = attrs.iter().any(|attr| attr.name == "autoclosure");
        let inout = self.eat(&TK::KwInout);
        let ty = self.parse_type();
        let variadic = self.eat(&TK::Ellipsis);
        let default = if self.eat(&TK::Equals) {
            Some(self.parse_expr())
        } else {
            None
        };
        Param {
            id: self.id_gen.new_id(),
            label,
            name,
            ty,
            default,
            variadic,
            inout,
            autoclosure,
            escaping,
            span: self.close(marker),
        }
    }

    /// Parameter names may be keywords used as argument labels (`in`, `for`).
    fn parse_param_name(&mut self) -> String {
        match &self.curr_token.kind {
            TK::Ident(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            TK::Underscore => {
                self.advance();
                "_".to_string()
            }
            TK::KwIn | TK::KwFor | TK::KwDefault | TK::KwWhere => {
                let name = self.curr_token.kind.to_string();
                self.advance();
                name
            }
            _ => {
                self.error_here(ParseErrorKind::ExpectedIdent(self.curr_token.clone()));
                String::new()
            }
        }
    }

    fn parse_func_decl(&mut self) -> FuncDecl {
        self.advance(); // func
        let name_span = self.curr_token.span;
        let name = match self.curr_token.kind.operator_name() {
            Some(op) => {
                self.advance();
                op.to_string()
            }
            None => self.parse_ident().unwrap_or_default(),
        };
        let generics = self.parse_generic_params();
        let params = self.parse_params();
        let throws = self.eat(&TK::KwThrows);
        let result = if self.eat(&TK::Arrow) {
            Some(self.parse_type())
        } else {
            None
        };
        let where_clause = self.parse_where_clause();
        let body = if self.at(&TK::LBrace) {
            Some(self.parse_block())
        } else {
            None
        };
        FuncDecl {
            name,
            name_span,
            generics,
            params,
            result,
            throws,
            where_clause,
            body,
        }
    }

    fn parse_init_decl(&mut self) -> InitDecl {
        self.advance(); // init
        let failable = !self.curr_token.spaced && (self.eat(&TK::Question) || self.eat(&TK::Bang));
        let generics = self.parse_generic_params();
        let params = self.parse_params();
        let throws = self.eat(&TK::KwThrows);
        let where_clause = self.parse_where_clause();
        let body = if self.at(&TK::LBrace) {
            Some(self.parse_block())
        } else {
            None
        };
        InitDecl {
            failable,
            generics,
            params,
            throws,
            where_clause,
            body,
        }
    }

    fn parse_subscript_decl(&mut self) -> SubscriptDecl {
        self.advance(); // subscript
        let params = self.parse_params();
        self.expect(&TK::Arrow);
        let result = self.parse_type();
        let accessors = if self.at(&TK::LBrace) {
            self.parse_accessors()
        } else {
            self.error_here(ParseErrorKind::ExpectedToken(
                TK::LBrace,
                self.curr_token.clone(),
            ));
            Accessors::Requirement { settable: false }
        };
        SubscriptDecl {
            params,
            result,
            accessors,
        }
    }

    pub(super) fn parse_var_decl(&mut self) -> VarDecl {
        let is_let = self.at(&TK::KwLet);
        self.advance(); // let | var
        let pattern = self.parse_pattern(Some(is_let));
        let ty = if self.eat(&TK::Colon) {
            Some(self.parse_type())
        } else {
            None
        };
        let init = if self.eat(&TK::Equals) {
            Some(self.parse_expr())
        } else {
            None
        };
        let accessors = if self.at(&TK::LBrace) && !self.curr_token.newline {
            self.parse_accessors()
        } else {
            Accessors::Stored
        };
        VarDecl {
            is_let,
            pattern,
            ty,
            init,
            accessors,
        }
    }

    /// The current `{` opens an accessor list rather than a getter body.
    pub(super) fn block_starts_with_accessor(&self) -> bool {
        self.at(&TK::LBrace)
            && matches!(
                &self.peek().kind,
                TK::Ident(name) if matches!(name.as_str(), "get" | "set" | "willSet" | "didSet")
            )
            && matches!(self.peek_at(2).kind, TK::LBrace | TK::LParen | TK::RBrace)
            || self.at(&TK::LBrace)
                && matches!(&self.peek().kind, TK::Ident(name) if name == "get" || name == "set")
                && matches!(&self.peek_at(2).kind, TK::Ident(name) if name == "get" || name == "set")
    }

    fn accessor_keyword(&self) -> Option<&'a str> {
        match &self.curr_token.kind {
            TK::Ident(name) => match name.as_str() {
                "get" => Some("get"),
                "set" => Some("set"),
                "willSet" => Some("willSet"),
                "didSet" => Some("didSet"),
                _ => None,
            },
            _ => None,
        }
    }

    /// `{ get set }`, `{ get { } set(v) { } }`, `{ willSet { } didSet { } }`
    /// or a shorthand getter body.
    fn parse_accessors(&mut self) -> Accessors {
        if self.in_protocol {
            self.advance(); // {
            let mut settable = false;
            while let Some(keyword) = self.accessor_keyword() {
                settable |= keyword == "set";
                self.advance();
            }
            self.expect(&TK::RBrace);
            return Accessors::Requirement { settable };
        }

        if !self.block_starts_with_accessor() {
            return Accessors::Computed {
                get: self.parse_block(),
                set: None,
            };
        }

        let open = self.mark();
        self.advance(); // {
        let mut get = None;
        let mut set = None;
        let mut will_set = None;
        let mut did_set = None;
        while !self.at(&TK::RBrace) && !self.at(&TK::Eof) {
            let Some(keyword) = self.accessor_keyword() else {
                self.error_here(ParseErrorKind::ExpectedAccessor(self.curr_token.clone()));
                self.synchronize();
                if self.at(&TK::RBrace) {
                    break;
                }
                continue;
            };
            self.advance();
            let param = if self.at(&TK::LParen) {
                self.advance();
                let name = self.parse_ident();
                self.expect(&TK::RParen);
                name
            } else {
                None
            };
            let body = if self.at(&TK::LBrace) {
                self.parse_block()
            } else {
                // `{ get }` outside a protocol: an empty getter body is an error
                self.error_here(ParseErrorKind::ExpectedToken(
                    TK::LBrace,
                    self.curr_token.clone(),
                ));
                Block {
                    id: self.id_gen.new_id(),
                    stmts: Vec::new(),
                    span: self.curr_token.span,
                }
            };
            let accessor = AccessorBody { param, body };
            match keyword {
                "get" => get = Some(accessor.body),
                "set" => set = Some(accessor),
                "willSet" => will_set = Some(accessor),
                _ => did_set = Some(accessor),
            }
        }
        self.expect(&TK::RBrace);

        match get {
            Some(get) => Accessors::Computed { get, set },
            None if will_set.is_some() || did_set.is_some() => {
                Accessors::Observed { will_set, did_set }
            }
            None => {
                let span = self.close(open);
                self.error(
                    ParseErrorKind::ExpectedAccessor(self.curr_token.clone()),
                    span,
                );
                Accessors::Stored
            }
        }
    }

    fn parse_nominal_decl(&mut self, is_protocol: bool) -> NominalDecl {
        self.advance(); // struct | class | enum | protocol
        let name_span = self.curr_token.span;
        let name = self.parse_ident().unwrap_or_default();
        let generics = if is_protocol {
            Vec::new()
        } else {
            self.parse_generic_params()
        };
        let inherits = self.parse_inheritance_clause();
        let where_clause = self.parse_where_clause();
        let members = self.parse_member_block(is_protocol);
        NominalDecl {
            name,
            name_span,
            generics,
            inherits,
            where_clause,
            members,
        }
    }

    fn parse_enum_case_decl(&mut self) -> EnumCaseDecl {
        self.advance(); // case
        let elements = self.parse_list(TK::Eof, |parser| {
            let marker = parser.mark();
            let name = parser.parse_ident().unwrap_or_default();
            let payload = if parser.at(&TK::LParen) {
                Some(parser.parse_tuple_type_elems())
            } else {
                None
            };
            EnumElementDecl {
                id: parser.id_gen.new_id(),
                name,
                payload,
                span: parser.close(marker),
            }
        });
        EnumCaseDecl { elements }
    }

    fn parse_extension_decl(&mut self) -> ExtensionDecl {
        self.advance(); // extension
        let extended = self.parse_type();
        let inherits = self.parse_inheritance_clause();
        let where_clause = self.parse_where_clause();
        let members = self.parse_member_block(false);
        ExtensionDecl {
            extended,
            inherits,
            where_clause,
            members,
        }
    }

    fn parse_typealias_decl(&mut self) -> TypeAliasDecl {
        self.advance(); // typealias
        let name = self.parse_ident().unwrap_or_default();
        let generics = self.parse_generic_params();
        self.expect(&TK::Equals);
        let ty = self.parse_type();
        TypeAliasDecl { name, generics, ty }
    }

    fn parse_assoc_type_decl(&mut self) -> AssocTypeDecl {
        self.advance(); // associatedtype
        let name = self.parse_ident().unwrap_or_default();
        let bounds = self.parse_inheritance_clause();
        let default = if self.eat(&TK::Equals) {
            Some(self.parse_type())
        } else {
            None
        };
        let where_clause = self.parse_where_clause();
        AssocTypeDecl {
            name,
            bounds,
            default,
            where_clause,
        }
    }
}
