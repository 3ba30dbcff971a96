//! Type lowering: value categories, IR type names and the calling
//! conventions of declarations and function values.

use crate::core::ir::{Convention, FunctionSig, IrType, Ownership, ResultConvention, SigParam};
use crate::core::resolve::{AccessorKind, Decl, DeclId, DeclKind, ModuleSet, Requirement};
use crate::core::types::{FnType, Substitution, Type, render_type};

/// How values of a type are held during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeClass {
    /// No ownership; copied bit for bit.
    Trivial,
    /// Held in SSA values that must be copied and destroyed.
    Loadable,
    /// Layout unknown at the lowering site; always kept in memory.
    AddressOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamAbstraction {
    pub convention: Convention,
    pub ty: Type,
    pub variadic: bool,
}

/// Calling convention of a function in terms of its interface types.
#[derive(Debug, Clone, PartialEq)]
pub struct Abstraction {
    /// Generic parameters whose metadata is passed, outermost first.
    pub generic_params: Vec<DeclId>,
    /// Conformances whose witness tables are passed after the metadata.
    pub requirements: Vec<(Type, DeclId)>,
    pub params: Vec<ParamAbstraction>,
    pub self_param: Option<ParamAbstraction>,
    pub result: Type,
    pub result_convention: ResultConvention,
    pub throws: bool,
}

impl Abstraction {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty() || !self.requirements.is_empty()
    }

    pub fn indirect_result(&self) -> bool {
        self.result_convention == ResultConvention::Indirect
    }
}

#[derive(Clone, Copy)]
pub struct TypeLowerer<'a> {
    set: &'a ModuleSet<'a>,
}

impl<'a> TypeLowerer<'a> {
    pub fn new(set: &'a ModuleSet<'a>) -> Self {
        TypeLowerer { set }
    }

    pub fn set(&self) -> &'a ModuleSet<'a> {
        self.set
    }

    // -- Classification --

    pub fn classify(&self, ty: &Type) -> TypeClass {
        self.classify_at(ty, 0)
    }

    pub fn is_trivial(&self, ty: &Type) -> bool {
        self.classify(ty) == TypeClass::Trivial
    }

    pub fn is_address_only(&self, ty: &Type) -> bool {
        self.classify(ty) == TypeClass::AddressOnly
    }

    pub fn ownership(&self, ty: &Type) -> Ownership {
        match self.classify(ty) {
            TypeClass::Trivial => Ownership::Trivial,
            _ => Ownership::Owned,
        }
    }

    fn classify_at(&self, ty: &Type, depth: usize) -> TypeClass {
        if depth > 16 {
            return TypeClass::Loadable;
        }
        match ty {
            Type::Error | Type::Var(_) | Type::Metatype(_) => TypeClass::Trivial,
            Type::Tuple(elems) => elems
                .iter()
                .map(|elem| self.classify_at(&elem.ty, depth + 1))
                .max()
                .unwrap_or(TypeClass::Trivial),
            Type::Function(_) | Type::AnyObject => TypeClass::Loadable,
            Type::Optional(inner) | Type::InOut(inner) => self.classify_at(inner, depth + 1),
            Type::Existential(protos) => {
                let is_error = protos.len() == 1 && Some(protos[0]) == self.set.known().error;
                if is_error || self.set.is_class_type(ty) {
                    TypeClass::Loadable
                } else {
                    TypeClass::AddressOnly
                }
            }
            Type::GenericParam(_) => {
                if self.set.is_class_type(ty) {
                    TypeClass::Loadable
                } else {
                    TypeClass::AddressOnly
                }
            }
            Type::DependentMember { .. } => TypeClass::AddressOnly,
            Type::Nominal { decl, .. } => self.classify_nominal(ty, *decl, depth),
        }
    }

    fn classify_nominal(&self, ty: &Type, decl: DeclId, depth: usize) -> TypeClass {
        let d = self.set.decl(decl);
        if let Some(builtin) = &d.attrs.builtin {
            return if builtin == "String" {
                TypeClass::Loadable
            } else {
                TypeClass::Trivial
            };
        }
        let subst = self.set.substitution_for(ty);
        match &d.kind {
            DeclKind::Struct(info) => info
                .stored
                .iter()
                .filter_map(|field| self.set.decl(*field).var_info())
                .map(|var| self.classify_at(&self.set.normalize(&subst.apply(&var.ty)), depth + 1))
                .max()
                .unwrap_or(TypeClass::Trivial),
            DeclKind::Enum(info) if info.indirect => TypeClass::Loadable,
            DeclKind::Enum(info) => info
                .elements
                .iter()
                .filter_map(|element| match &self.set.decl(*element).kind {
                    DeclKind::EnumElement {
                        payload: Some(payload),
                        ..
                    } => Some(payload),
                    _ => None,
                })
                .flatten()
                .map(|elem| self.classify_at(&self.set.normalize(&subst.apply(&elem.ty)), depth + 1))
                .max()
                .unwrap_or(TypeClass::Trivial),
            _ => TypeClass::Loadable,
        }
    }

    // -- Names --

    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            _ if ty.is_void() => "()".to_string(),
            Type::Metatype(inner) => format!("@thick {}.Type", self.type_name(inner)),
            Type::InOut(inner) => self.type_name(inner),
            _ => render_type(ty, self.set),
        }
    }

    pub fn ir_type(&self, ty: &Type) -> IrType {
        IrType::object(self.type_name(ty))
    }

    pub fn metatype(&self, ty: &Type) -> IrType {
        self.ir_type(&Type::Metatype(Box::new(ty.clone())))
    }

    pub fn conformance_name(&self, ty: &Type, proto: DeclId) -> String {
        format!("{}: {}", self.type_name(ty), self.set.decl(proto).name)
    }

    pub fn witness_table(&self, ty: &Type, proto: DeclId) -> IrType {
        IrType::object(format!("@witness_table {}", self.conformance_name(ty, proto)))
    }

    pub fn box_type(&self, ty: &Type) -> IrType {
        IrType::object(format!("{{ var {} }}", self.type_name(ty)))
    }

    pub fn variadic_type(&self, ty: &Type) -> IrType {
        IrType::object(format!("[{}]", self.type_name(ty)))
    }

    // -- Conventions --

    pub fn formal_convention(&self, ty: &Type, inout: bool) -> Convention {
        if inout {
            return Convention::Inout;
        }
        match self.classify(ty) {
            TypeClass::Trivial => Convention::Trivial,
            TypeClass::Loadable => Convention::Guaranteed,
            TypeClass::AddressOnly => Convention::InGuaranteed,
        }
    }

    pub fn result_convention(&self, ty: &Type) -> ResultConvention {
        match self.classify(ty) {
            TypeClass::Trivial => ResultConvention::Trivial,
            TypeClass::Loadable => ResultConvention::Owned,
            TypeClass::AddressOnly => ResultConvention::Indirect,
        }
    }

    fn formal(&self, ty: &Type, inout: bool, variadic: bool) -> ParamAbstraction {
        let convention = if variadic {
            Convention::Guaranteed
        } else {
            self.formal_convention(ty, inout)
        };
        ParamAbstraction {
            convention,
            ty: ty.clone(),
            variadic,
        }
    }

    /// Abstraction of a function value of type `fn_ty`.
    pub fn fn_abstraction(&self, fn_ty: &FnType) -> Abstraction {
        Abstraction {
            generic_params: Vec::new(),
            requirements: Vec::new(),
            params: fn_ty
                .params
                .iter()
                .map(|param| self.formal(&param.ty, param.inout, param.variadic))
                .collect(),
            self_param: None,
            result: fn_ty.result.clone(),
            result_convention: self.result_convention(&fn_ty.result),
            throws: fn_ty.throws,
        }
    }

    /// Metadata and witness-table parameters of `decl`, including those of
    /// its enclosing contexts.
    pub fn generic_env(&self, decl: DeclId) -> (Vec<DeclId>, Vec<(Type, DeclId)>) {
        let params = self.set.generic_params_in_scope(decl);
        let mut reqs: Vec<(Type, DeclId)> = Vec::new();
        let mut push = |subject: Type, proto: DeclId| {
            if !reqs.iter().any(|(ty, p)| *ty == subject && *p == proto) {
                reqs.push((subject, proto));
            }
        };
        for param in &params {
            if let DeclKind::GenericParam { bounds, .. } = &self.set.decl(*param).kind {
                for proto in bounds {
                    push(Type::GenericParam(*param), *proto);
                }
            }
        }
        for req in self.set.requirements_in_scope(decl) {
            if let Requirement::Conformance { subject, protocol } = req {
                push(subject, protocol);
            }
        }
        (params, reqs)
    }

    /// Nominal, extension or protocol `decl` is a member of. Accessors
    /// belong to the context of their storage.
    pub fn member_context(&self, decl: DeclId) -> Option<DeclId> {
        let d = self.set.decl(decl);
        let owner = match &d.kind {
            DeclKind::Accessor { storage, .. } => self.set.decl(*storage).parent?,
            _ => d.parent?,
        };
        let o = self.set.decl(owner);
        (o.is_nominal() || o.is_protocol() || matches!(o.kind, DeclKind::Extension(_))).then_some(owner)
    }

    pub fn self_type_of(&self, decl: DeclId) -> Option<Type> {
        self.member_context(decl).map(|ctx| self.set.self_type_in(ctx))
    }

    fn self_param(&self, self_ty: &Type, is_static: bool, mutating: bool) -> ParamAbstraction {
        if is_static {
            return ParamAbstraction {
                convention: Convention::Trivial,
                ty: Type::Metatype(Box::new(self_ty.clone())),
                variadic: false,
            };
        }
        let convention = if mutating && !self.set.is_class_type(self_ty) {
            Convention::Inout
        } else {
            self.formal_convention(self_ty, false)
        };
        ParamAbstraction {
            convention,
            ty: self_ty.clone(),
            variadic: false,
        }
    }

    fn with_env(&self, decl: DeclId, params: Vec<ParamAbstraction>, result: Type, throws: bool) -> Abstraction {
        let (generic_params, requirements) = self.generic_env(decl);
        Abstraction {
            generic_params,
            requirements,
            params,
            self_param: None,
            result_convention: self.result_convention(&result),
            result,
            throws,
        }
    }

    /// Abstraction of a function, method or allocating constructor.
    pub fn decl_abstraction(&self, decl: DeclId) -> Abstraction {
        let d = self.set.decl(decl);
        match &d.kind {
            DeclKind::Accessor { kind, storage } => self.accessor_abstraction(*storage, *kind),
            DeclKind::Constructor { sig, failable } => {
                let self_ty = self.self_type_of(decl).unwrap_or(Type::Error);
                let result = if *failable {
                    Type::optional(self_ty.clone())
                } else {
                    self_ty.clone()
                };
                let params = self.formals(d);
                let mut abs = self.with_env(decl, params, result, sig.throws);
                abs.self_param = Some(self.self_param(&self_ty, true, false));
                abs
            }
            DeclKind::Func(sig) => {
                let params = self.formals(d);
                let mut abs = self.with_env(decl, params, sig.result.clone(), sig.throws);
                if let Some(self_ty) = self.self_type_of(decl) {
                    abs.self_param = Some(self.self_param(&self_ty, d.is_static, d.mutating));
                }
                abs
            }
            _ => self.with_env(decl, Vec::new(), Type::void(), false),
        }
    }

    /// Initializing entry of a class constructor: takes the allocated
    /// instance and returns it initialized.
    pub fn initializer_abstraction(&self, ctor: DeclId) -> Abstraction {
        let mut abs = self.decl_abstraction(ctor);
        let self_ty = self.self_type_of(ctor).unwrap_or(Type::Error);
        abs.self_param = Some(ParamAbstraction {
            convention: Convention::Owned,
            ty: self_ty,
            variadic: false,
        });
        abs
    }

    /// Getter, setter or observer of `storage`, which may be a property
    /// requirement without accessor declarations.
    pub fn accessor_abstraction(&self, storage: DeclId, kind: AccessorKind) -> Abstraction {
        let d = self.set.decl(storage);
        let (indices, value_ty, throws) = match &d.kind {
            DeclKind::Subscript { sig, .. } => (self.formals(d), sig.result.clone(), sig.throws),
            DeclKind::Var(info) => (Vec::new(), info.ty.clone(), false),
            _ => (Vec::new(), Type::Error, false),
        };
        let (params, result) = match kind {
            AccessorKind::Get => (indices, value_ty),
            AccessorKind::Set | AccessorKind::WillSet | AccessorKind::DidSet => {
                let mut params = vec![self.formal(&value_ty, false, false)];
                params.extend(indices);
                (params, Type::void())
            }
        };
        let mut abs = self.with_env(storage, params, result, throws);
        if let Some(self_ty) = self.self_type_of(storage) {
            let mutating = kind != AccessorKind::Get && !d.is_static;
            abs.self_param = Some(self.self_param(&self_ty, d.is_static, mutating));
        }
        abs
    }

    /// Generator of the default value of parameter `index` of `callee`.
    pub fn default_arg_abstraction(&self, callee: DeclId, index: usize) -> Abstraction {
        let ty = self
            .set
            .decl(callee)
            .func_sig()
            .and_then(|sig| sig.params.get(index))
            .map(|param| param.ty.clone())
            .unwrap_or(Type::Error);
        self.with_env(callee, Vec::new(), ty, false)
    }

    fn formals(&self, d: &Decl) -> Vec<ParamAbstraction> {
        d.func_sig()
            .map(|sig| {
                sig.params
                    .iter()
                    .map(|param| self.formal(&param.ty, param.inout, param.variadic))
                    .collect()
            })
            .unwrap_or_default()
    }

    // -- Signatures --

    /// IR type of a formal parameter value inside the callee.
    pub fn param_type(&self, param: &ParamAbstraction, subst: Option<&Substitution>) -> IrType {
        let ty = self.apply(&param.ty, subst);
        let ir = if param.variadic {
            self.variadic_type(&ty)
        } else {
            self.ir_type(&ty)
        };
        if param.convention.is_indirect() {
            ir.address_of()
        } else {
            ir
        }
    }

    pub fn apply(&self, ty: &Type, subst: Option<&Substitution>) -> Type {
        match subst {
            Some(subst) => self.set.normalize(&subst.apply(ty)),
            None => ty.clone(),
        }
    }

    /// Full signature: indirect result, metadata, witness tables, formals,
    /// captures, `self`.
    pub fn signature(&self, abs: &Abstraction, subst: Option<&Substitution>, captures: &[SigParam]) -> FunctionSig {
        let mut params = Vec::new();
        let result = self.apply(&abs.result, subst);
        if abs.indirect_result() {
            params.push(SigParam {
                convention: Convention::Out,
                ty: self.ir_type(&result).address_of(),
            });
        }
        for param in &abs.generic_params {
            params.push(SigParam {
                convention: Convention::Trivial,
                ty: self.metatype(&self.apply(&Type::GenericParam(*param), subst)),
            });
        }
        for (subject, proto) in &abs.requirements {
            params.push(SigParam {
                convention: Convention::Trivial,
                ty: self.witness_table(&self.apply(subject, subst), *proto),
            });
        }
        for param in &abs.params {
            params.push(SigParam {
                convention: param.convention,
                ty: self.param_type(param, subst),
            });
        }
        params.extend_from_slice(captures);
        if let Some(self_param) = &abs.self_param {
            params.push(SigParam {
                convention: self_param.convention,
                ty: self.param_type(self_param, subst),
            });
        }
        let generics = if subst.is_some() {
            String::new()
        } else {
            self.render_generics(abs)
        };
        FunctionSig {
            generics,
            params,
            result: if abs.indirect_result() {
                IrType::unit()
            } else {
                self.ir_type(&result)
            },
            result_convention: abs.result_convention,
            throws: abs.throws,
        }
    }

    fn render_generics(&self, abs: &Abstraction) -> String {
        if abs.generic_params.is_empty() {
            return String::new();
        }
        let params = abs
            .generic_params
            .iter()
            .map(|param| self.set.decl(*param).name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        if abs.requirements.is_empty() {
            return format!("<{params}>");
        }
        let reqs = abs
            .requirements
            .iter()
            .map(|(subject, proto)| format!("{} : {}", self.type_name(subject), self.set.decl(*proto).name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("<{params} where {reqs}>")
    }

    /// Type of a `function_ref` to a function with this signature.
    pub fn function_ref_type(&self, sig: &FunctionSig) -> IrType {
        IrType::object(format!("@convention(thin) {}", sig.render()))
    }
}
