//! Turns declarations into completion items.

use crate::core::resolve::{
    Decl, DeclId, DeclKind, LookupOrigin, MemberCandidate, ModuleSet, ParamDecl, member_substitution,
};
use crate::core::types::{
    FnParam, Substitution, TupleElem, Type, TypeRelation, render_type, type_relation,
};
use crate::services::completion::results::{
    CompletionContext, CompletionItem, CompletionKind, DeclCompletionKind,
};

/// How a declaration is referenced at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Style {
    /// `f(a: Int)` called or `x` read directly.
    Plain,
    /// An instance method named through its type: `f({#self: S#})`.
    Curried,
    /// A member reached through `AnyObject`: `f!()`, `x: Int?`.
    Dynamic,
}

/// Accumulates items for one request.
pub(super) struct Collector<'a, 's> {
    pub set: &'a ModuleSet<'s>,
    pub expected: Option<Type>,
    pub items: Vec<CompletionItem>,
}

impl<'a, 's> Collector<'a, 's> {
    pub fn new(set: &'a ModuleSet<'s>, expected: Option<Type>) -> Self {
        Collector {
            set,
            expected,
            items: Vec::new(),
        }
    }

    pub fn ty(&self, ty: &Type) -> String {
        render_type(ty, self.set)
    }

    pub fn relation(&self, ty: &Type) -> Option<TypeRelation> {
        let expected = self.expected.as_ref()?;
        Some(type_relation(self.set, ty, expected))
    }

    pub fn context(&self, origin: LookupOrigin, decl: DeclId) -> CompletionContext {
        match origin {
            LookupOrigin::Local => CompletionContext::Local,
            LookupOrigin::CurrNominal => CompletionContext::CurrNominal,
            LookupOrigin::Super => CompletionContext::Super,
            LookupOrigin::CurrModule => CompletionContext::CurrModule,
            LookupOrigin::OtherModule | LookupOrigin::Dynamic => {
                CompletionContext::OtherModule(self.set.module(decl.module).name.clone())
            }
        }
    }

    pub fn member(&mut self, candidate: &MemberCandidate, style: Style) {
        let subst = member_substitution(self.set, candidate);
        self.decl(candidate.decl, candidate.origin, &subst, style);
    }

    /// Adds `id` if it is something an expression can name.
    pub fn decl(&mut self, id: DeclId, origin: LookupOrigin, subst: &Substitution, style: Style) {
        let decl = self.set.decl(id);
        let Some(kind) = self.kind_of(decl) else {
            return;
        };
        if decl.is_operator() || decl.is_implicit && kind != DeclCompletionKind::Constructor {
            return;
        }
        let apply = |ty: &Type| self.set.normalize(&subst.apply(ty));
        let (pattern, name, ty) = match &decl.kind {
            DeclKind::Func(sig) if style == Style::Curried => {
                let self_ty = self.ty(&apply(&self.set.self_type_in(owner(decl))));
                let fn_ty = apply(&sig.fn_type());
                (
                    format!("{}({{#self: {self_ty}#}})", decl.name),
                    format!("{}(self:)", decl.name),
                    Some(fn_ty),
                )
            }
            DeclKind::Func(sig) => {
                let bang = if style == Style::Dynamic { "!" } else { "" };
                (
                    format!("{}{bang}({})", decl.name, self.params(&sig.params, &apply)),
                    call_name(&decl.name, &sig.params),
                    Some(apply(&sig.result)),
                )
            }
            DeclKind::Constructor { sig, failable } => {
                let mut result = apply(&self.set.self_type_in(owner(decl)));
                if *failable {
                    result = Type::optional(result);
                }
                (
                    format!("init({})", self.params(&sig.params, &apply)),
                    call_name("init", &sig.params),
                    Some(result),
                )
            }
            DeclKind::Var(info) => {
                let mut ty = apply(&info.ty);
                if style == Style::Dynamic {
                    ty = Type::optional(ty);
                }
                (decl.name.clone(), decl.name.clone(), Some(ty))
            }
            DeclKind::EnumElement { payload, .. } => {
                let enum_ty = apply(&self.set.self_type_in(owner(decl)));
                match payload {
                    Some(elems) => {
                        let params = elems
                            .iter()
                            .map(|elem| FnParamView::from_elem(elem, &apply))
                            .collect::<Vec<_>>();
                        let fn_ty = Type::function(
                            elems
                                .iter()
                                .map(|elem| FnParam::plain(apply(&elem.ty)))
                                .collect(),
                            enum_ty,
                            false,
                        );
                        (
                            format!("{}({})", decl.name, self.placeholders(&params)),
                            format!("{}(", decl.name) + &labels_of(&params) + ")",
                            Some(fn_ty),
                        )
                    }
                    None => (decl.name.clone(), decl.name.clone(), Some(enum_ty)),
                }
            }
            DeclKind::Protocol(_) => {
                let ty = Type::Existential(vec![id]);
                return self.type_item(decl, kind, origin, ty);
            }
            DeclKind::Struct(_) | DeclKind::Class(_) | DeclKind::Enum(_) => {
                let ty = apply(&self.set.declared_type(id));
                return self.type_item(decl, kind, origin, ty);
            }
            DeclKind::TypeAlias { ty } => {
                let ty = apply(ty);
                return self.type_item(decl, kind, origin, ty);
            }
            DeclKind::GenericParam { .. } => {
                return self.type_item(decl, kind, origin, Type::GenericParam(id));
            }
            DeclKind::AssociatedType { .. } => (decl.name.clone(), decl.name.clone(), None),
            _ => return,
        };
        let relation = ty.as_ref().and_then(|ty| self.relation(ty));
        let item = CompletionItem {
            kind: CompletionKind::Decl(kind),
            context: self.context(origin, id),
            not_recommended: not_recommended(decl, relation),
            type_relation: relation,
            pattern,
            result_type: ty.map(|ty| self.ty(&ty)),
            name,
        };
        self.items.push(item);
    }

    fn type_item(&mut self, decl: &Decl, kind: DeclCompletionKind, origin: LookupOrigin, ty: Type) {
        self.items.push(CompletionItem {
            kind: CompletionKind::Decl(kind),
            context: self.context(origin, decl.id),
            not_recommended: not_recommended(decl, None),
            type_relation: None,
            pattern: decl.name.clone(),
            result_type: Some(self.ty(&ty)),
            name: decl.name.clone(),
        });
    }

    /// `({#a: Int#}, {#Int#})` body of a call pattern, without parentheses.
    pub fn params(&self, params: &[ParamDecl], apply: &dyn Fn(&Type) -> Type) -> String {
        let views = params
            .iter()
            .map(|param| FnParamView::from_param(param, apply))
            .collect::<Vec<_>>();
        self.placeholders(&views)
    }

    fn placeholders(&self, params: &[FnParamView]) -> String {
        params
            .iter()
            .map(|param| {
                let mut ty = String::new();
                if param.inout {
                    ty.push_str("inout ");
                }
                ty.push_str(&self.ty(&param.ty));
                if param.variadic {
                    ty.push_str("...");
                }
                match (&param.label, &param.name) {
                    (Some(label), _) => format!("{{#{label}: {ty}#}}"),
                    (None, Some(name)) => format!("{{#({name}): {ty}#}}"),
                    (None, None) => format!("{{#{ty}#}}"),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn kind_of(&self, decl: &Decl) -> Option<DeclCompletionKind> {
        let in_function = decl.parent.is_some_and(|parent| {
            matches!(
                self.set.decl(parent).kind,
                DeclKind::Func(_) | DeclKind::Constructor { .. } | DeclKind::Accessor { .. }
            )
        });
        let kind = match &decl.kind {
            DeclKind::Func(_) if decl.parent.is_none() || in_function => {
                DeclCompletionKind::FreeFunction
            }
            DeclKind::Func(_) if decl.is_static => DeclCompletionKind::StaticMethod,
            DeclKind::Func(_) => DeclCompletionKind::InstanceMethod,
            DeclKind::Constructor { .. } => DeclCompletionKind::Constructor,
            DeclKind::Var(_) if decl.parent.is_none() => DeclCompletionKind::GlobalVar,
            DeclKind::Var(_) if in_function => DeclCompletionKind::LocalVar,
            DeclKind::Var(_) if decl.is_static => DeclCompletionKind::StaticVar,
            DeclKind::Var(_) => DeclCompletionKind::InstanceVar,
            DeclKind::EnumElement { .. } => DeclCompletionKind::EnumElement,
            DeclKind::Struct(_) => DeclCompletionKind::Struct,
            DeclKind::Class(_) => DeclCompletionKind::Class,
            DeclKind::Enum(_) => DeclCompletionKind::Enum,
            DeclKind::Protocol(_) => DeclCompletionKind::Protocol,
            DeclKind::TypeAlias { .. } => DeclCompletionKind::TypeAlias,
            DeclKind::AssociatedType { .. } => DeclCompletionKind::AssociatedType,
            DeclKind::GenericParam { .. } => DeclCompletionKind::GenericTypeParam,
            DeclKind::Subscript { .. } | DeclKind::Extension(_) | DeclKind::Accessor { .. } => {
                return None;
            }
        };
        Some(kind)
    }
}

/// Parameter as shown in a placeholder.
pub(super) struct FnParamView {
    pub label: Option<String>,
    /// Internal name, shown as `(name)` when there is no label.
    pub name: Option<String>,
    pub ty: Type,
    pub inout: bool,
    pub variadic: bool,
}

impl FnParamView {
    pub fn from_param(param: &ParamDecl, apply: &dyn Fn(&Type) -> Type) -> Self {
        FnParamView {
            label: param.label.clone(),
            name: (!param.name.is_empty() && param.name != "_").then(|| param.name.clone()),
            ty: apply(param.ty.without_inout()),
            inout: param.inout,
            variadic: param.variadic,
        }
    }

    fn from_elem(elem: &TupleElem, apply: &dyn Fn(&Type) -> Type) -> Self {
        FnParamView {
            label: elem.label.clone(),
            name: None,
            ty: apply(&elem.ty),
            inout: false,
            variadic: false,
        }
    }
}

fn labels_of(params: &[FnParamView]) -> String {
    params
        .iter()
        .map(|param| format!("{}:", param.label.as_deref().unwrap_or("_")))
        .collect()
}

/// `f()` for nullary calls, `f(_:b:)` otherwise.
pub(super) fn call_name(base: &str, params: &[ParamDecl]) -> String {
    let labels = params
        .iter()
        .map(|param| format!("{}:", param.label.as_deref().unwrap_or("_")))
        .collect::<String>();
    format!("{base}({labels})")
}

pub(super) fn not_recommended(decl: &Decl, relation: Option<TypeRelation>) -> bool {
    decl.attrs.deprecated || decl.attrs.unavailable || relation == Some(TypeRelation::Invalid)
}

/// Context whose `Self` type a member produces.
fn owner(decl: &Decl) -> DeclId {
    decl.parent.unwrap_or(decl.id)
}
