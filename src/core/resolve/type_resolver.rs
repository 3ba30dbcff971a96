//! Resolves written types (`TypeExpr`) to semantic `Type`s.

use crate::core::resolve::decl::*;
use crate::core::resolve::errors::{ResolveError, ResolveErrorKind};
use crate::core::resolve::modules::ModuleSet;
use crate::core::resolve::scope::lookup_type;
use crate::core::tree::{TypeExpr, TypeExprKind, TypeSegment};
use crate::core::types::{FnParam, TupleElem, Type, render_type};

pub struct TypeResolver<'s, 'a> {
    set: &'s ModuleSet<'a>,
    /// Innermost declaration the type is written in.
    context: Option<DeclId>,
}

impl<'s, 'a> TypeResolver<'s, 'a> {
    pub fn new(set: &'s ModuleSet<'a>, context: Option<DeclId>) -> Self {
        TypeResolver { set, context }
    }

    pub fn resolve(&self, texpr: &TypeExpr) -> Result<Type, ResolveError> {
        let err = |kind| ResolveError::new(kind, texpr.span);
        match &texpr.kind {
            TypeExprKind::Error => Ok(Type::Error),
            TypeExprKind::SelfType => self.resolve_self().ok_or_else(|| err(ResolveErrorKind::SelfOutsideType)),
            TypeExprKind::Path(segments) => self.resolve_path(texpr, segments),
            TypeExprKind::Tuple(elems) => {
                let elems = elems
                    .iter()
                    .map(|elem| {
                        Ok(TupleElem {
                            label: elem.label.clone(),
                            ty: self.resolve(&elem.ty)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ResolveError>>()?;
                Ok(Type::Tuple(elems))
            }
            TypeExprKind::Function {
                params,
                result,
                throws,
            } => {
                let mut fn_params = Vec::with_capacity(params.len());
                for param in params {
                    let ty = self.resolve(param)?;
                    fn_params.push(match ty {
                        Type::InOut(inner) => FnParam {
                            ty: *inner,
                            inout: true,
                            variadic: false,
                            autoclosure: false,
                        },
                        ty => FnParam::plain(ty),
                    });
                }
                let result = self.resolve(result)?;
                Ok(Type::function(fn_params, result, *throws))
            }
            TypeExprKind::Optional(inner) => Ok(Type::optional(self.resolve(inner)?)),
            TypeExprKind::Composition(parts) => {
                let mut protos = Vec::new();
                for part in parts {
                    match self.resolve(part)? {
                        Type::Existential(ps) => protos.extend(ps),
                        // `AnyObject & P` keeps only the protocol part.
                        Type::AnyObject => {}
                        Type::Error => return Ok(Type::Error),
                        other => {
                            return Err(err(ResolveErrorKind::NotAProtocol(render_type(
                                &other, self.set,
                            ))));
                        }
                    }
                }
                Ok(Type::Existential(protos))
            }
            TypeExprKind::Metatype(inner) => Ok(Type::Metatype(Box::new(self.resolve(inner)?))),
            TypeExprKind::InOut(inner) => Ok(Type::InOut(Box::new(self.resolve(inner)?))),
        }
    }

    /// Resolves a type that must name a protocol.
    pub fn resolve_protocol(&self, texpr: &TypeExpr) -> Result<Option<DeclId>, ResolveError> {
        match self.resolve(texpr)? {
            Type::Existential(protos) if protos.len() == 1 => Ok(protos.first().copied()),
            Type::Error => Ok(None),
            other => Err(ResolveError::new(
                ResolveErrorKind::NotAProtocol(render_type(&other, self.set)),
                texpr.span,
            )),
        }
    }

    fn resolve_self(&self) -> Option<Type> {
        let mut current = self.context;
        while let Some(id) = current {
            let decl = self.set.decl(id);
            match &decl.kind {
                DeclKind::Protocol(info) => return Some(Type::GenericParam(info.self_param)),
                DeclKind::Struct(_) | DeclKind::Class(_) | DeclKind::Enum(_) => {
                    return Some(self.set.declared_type(id));
                }
                DeclKind::Extension(info) => {
                    let extended = info.extended?;
                    return Some(self.set.declared_type(extended));
                }
                _ => current = decl.parent,
            }
        }
        None
    }

    fn resolve_path(&self, texpr: &TypeExpr, segments: &[TypeSegment]) -> Result<Type, ResolveError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Type::Error);
        };
        let mut ty = self.resolve_first_segment(texpr, first)?;
        for segment in rest {
            ty = self.resolve_member_segment(texpr, ty, segment)?;
        }
        Ok(ty)
    }

    fn resolve_args(&self, segment: &TypeSegment) -> Result<Vec<Type>, ResolveError> {
        segment.args.iter().map(|arg| self.resolve(arg)).collect()
    }

    fn resolve_first_segment(&self, texpr: &TypeExpr, segment: &TypeSegment) -> Result<Type, ResolveError> {
        match segment.name.as_str() {
            "Any" => return Ok(Type::any()),
            "AnyObject" => return Ok(Type::AnyObject),
            "Void" if segment.args.is_empty() => return Ok(Type::void()),
            "Self" => {
                return self
                    .resolve_self()
                    .ok_or_else(|| ResolveError::new(ResolveErrorKind::SelfOutsideType, texpr.span));
            }
            _ => {}
        }
        let Some(decl) = lookup_type(self.set, self.context, &segment.name) else {
            return Err(ResolveError::new(
                ResolveErrorKind::UnknownType(segment.name.clone()),
                texpr.span,
            ));
        };
        let args = self.resolve_args(segment)?;
        self.type_for_decl(texpr, decl, args, None)
    }

    fn resolve_member_segment(
        &self,
        texpr: &TypeExpr,
        base: Type,
        segment: &TypeSegment,
    ) -> Result<Type, ResolveError> {
        if base.is_error() {
            return Ok(Type::Error);
        }
        let unknown = || {
            ResolveError::new(
                ResolveErrorKind::UnknownMemberType {
                    base: render_type(&base, self.set),
                    name: segment.name.clone(),
                },
                texpr.span,
            )
        };
        match &base {
            Type::GenericParam(_) | Type::DependentMember { .. } => {
                let mut protos = Vec::new();
                for bound in self.set.abstract_bounds(&base) {
                    protos.extend(self.set.protocol_closure(bound));
                }
                for proto in protos {
                    let DeclKind::Protocol(info) = &self.set.decl(proto).kind else {
                        continue;
                    };
                    if let Some(assoc) = info
                        .assoc_types
                        .iter()
                        .copied()
                        .find(|assoc| self.set.decl(*assoc).name == segment.name)
                    {
                        return Ok(Type::DependentMember {
                            base: Box::new(base),
                            assoc,
                        });
                    }
                }
                Err(unknown())
            }
            Type::Nominal { .. } | Type::Optional(_) => {
                let Some(nominal) = self.set.nominal_decl_of(&base) else {
                    return Err(unknown());
                };
                let member = self.set.all_members(nominal).into_iter().find(|member| {
                    let decl = self.set.decl(*member);
                    decl.name == segment.name && decl.is_type_decl()
                });
                match member {
                    Some(member) => {
                        let args = self.resolve_args(segment)?;
                        self.type_for_decl(texpr, member, args, Some(&base))
                    }
                    None => {
                        // Associated type witnesses of a conformance.
                        for proto in self.set.all_protocols(nominal) {
                            let DeclKind::Protocol(info) = &self.set.decl(proto).kind else {
                                continue;
                            };
                            for assoc in &info.assoc_types {
                                if self.set.decl(*assoc).name == segment.name {
                                    if let Some(ty) = self.set.resolve_dependent(&base, *assoc) {
                                        return Ok(ty);
                                    }
                                }
                            }
                        }
                        Err(unknown())
                    }
                }
            }
            _ => Err(unknown()),
        }
    }

    fn type_for_decl(
        &self,
        texpr: &TypeExpr,
        decl_id: DeclId,
        args: Vec<Type>,
        outer: Option<&Type>,
    ) -> Result<Type, ResolveError> {
        let decl = self.set.decl(decl_id);
        let outer_subst = outer.map(|outer| self.set.substitution_for(outer));
        match &decl.kind {
            DeclKind::Struct(_) | DeclKind::Class(_) | DeclKind::Enum(_) => {
                let params = &decl.generics.params;
                if args.is_empty() && !params.is_empty() && self.inside(decl_id) {
                    // `Box` inside its own body means `Box<T>`.
                    return Ok(self.set.declared_type(decl_id));
                }
                if args.len() != params.len() {
                    return Err(ResolveError::new(
                        ResolveErrorKind::GenericArgCount {
                            name: decl.name.clone(),
                            expected: params.len(),
                            found: args.len(),
                        },
                        texpr.span,
                    ));
                }
                Ok(self.set.make_nominal(decl_id, args))
            }
            DeclKind::Protocol(_) => Ok(Type::Existential(vec![decl_id])),
            DeclKind::TypeAlias { ty } => {
                let ty = match outer_subst {
                    Some(subst) => subst.apply(ty),
                    None => ty.clone(),
                };
                Ok(self.set.normalize(&ty))
            }
            DeclKind::GenericParam { .. } => Ok(Type::GenericParam(decl_id)),
            DeclKind::AssociatedType { .. } => {
                let Some(proto) = decl.parent else {
                    return Ok(Type::Error);
                };
                let base = match self.resolve_self() {
                    Some(self_ty @ Type::GenericParam(_)) => self_ty,
                    Some(concrete) => {
                        // Inside a conforming type, `Assoc` is the witness.
                        return Ok(self
                            .set
                            .resolve_dependent(&concrete, decl_id)
                            .unwrap_or(Type::Error));
                    }
                    None => match &self.set.decl(proto).kind {
                        DeclKind::Protocol(info) => Type::GenericParam(info.self_param),
                        _ => Type::Error,
                    },
                };
                Ok(Type::DependentMember {
                    base: Box::new(base),
                    assoc: decl_id,
                })
            }
            _ => Err(ResolveError::new(
                ResolveErrorKind::NotAType(decl.name.clone()),
                texpr.span,
            )),
        }
    }

    fn inside(&self, decl: DeclId) -> bool {
        let mut current = self.context;
        while let Some(id) = current {
            if self.set.nominal_of_context(id) == Some(decl) {
                return true;
            }
            current = self.set.decl(id).parent;
        }
        false
    }
}
