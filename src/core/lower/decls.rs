//! Declarations: one IR function per body-carrying declaration, plus the
//! synthesized entries (class allocators, memberwise initializers,
//! property setters with observers, default-argument generators) and
//! `main` for the top-level code.

use crate::core::diag::Span;
use crate::core::ir::{Convention, FunctionKind, IrGlobal, InstKind, Ownership, StoreQualifier, ValueId};
use crate::core::lower::calls::{PreparedCall, SelfAccess};
use crate::core::lower::errors::LowerErrorKind;
use crate::core::lower::func::{Entry, FuncLowerer, LocalSlot, LowerResult, Managed, ReturnMode, SelfSlot};
use crate::core::lower::names::{
    accessor_symbol, allocator_symbol, constructor_symbol, decl_symbol, default_arg_symbol, initializer_symbol,
};
use crate::core::lower::types::Abstraction;
use crate::core::lower::ModuleLowerer;
use crate::core::resolve::{AccessorKind, DeclId, DeclKind, LookupOrigin, Storage};
use crate::core::tree::{
    AccessorBody, Accessors, Block, Expr, InitDecl, Item, ItemKind, NodeId, Param, SourceFile, VarDecl,
};
use crate::core::typecheck::DeclRef;
use crate::core::types::{FnType, Substitution, Type};

impl<'a> ModuleLowerer<'a> {
    fn decl_of(&self, node: NodeId) -> Option<DeclId> {
        self.set.module(self.set.current()).decl_for_node(node)
    }

    /// Records initial values and default arguments before any body is
    /// lowered; initializers and call sites refer to them.
    pub(super) fn index_file(&mut self, file: &'a SourceFile) {
        for item in &file.items {
            self.index_item(item);
        }
    }

    fn index_item(&mut self, item: &'a Item) {
        let params: &'a [Param] = match &item.kind {
            ItemKind::Func(func) => &func.params,
            ItemKind::Init(init) => &init.params,
            ItemKind::Subscript(sub) => &sub.params,
            ItemKind::Var(var) => {
                if let (Some(init), Some(decl)) = (&var.init, self.decl_of(item.id)) {
                    self.initial_values.insert(decl, init);
                }
                &[]
            }
            ItemKind::Struct(nominal) | ItemKind::Class(nominal) | ItemKind::Enum(nominal) => {
                for member in &nominal.members {
                    self.index_item(member);
                }
                &[]
            }
            ItemKind::Extension(ext) => {
                for member in &ext.members {
                    self.index_item(member);
                }
                &[]
            }
            _ => &[],
        };
        let Some(decl) = self.decl_of(item.id) else {
            return;
        };
        for (index, param) in params.iter().enumerate() {
            if let Some(default) = &param.default {
                self.defaults.insert((decl, index), default);
            }
        }
    }

    pub(super) fn lower_file(&mut self, file: &'a SourceFile) {
        for item in &file.items {
            if !matches!(item.kind, ItemKind::Stmt(_)) {
                self.lower_item(item);
            }
        }
        self.lower_main(file);
    }

    /// Lowers a declaration and everything nested in it. Failures are
    /// recorded and the declaration is left out.
    pub(super) fn lower_item(&mut self, item: &'a Item) {
        match &item.kind {
            ItemKind::Func(func) => {
                let (Some(decl), Some(body)) = (self.decl_of(item.id), &func.body) else {
                    return;
                };
                self.lower_defaults(decl, &func.params);
                self.lower_function(decl, &func.params, body);
            }
            ItemKind::Init(init) => {
                let Some(decl) = self.decl_of(item.id) else {
                    return;
                };
                self.lower_defaults(decl, &init.params);
                self.lower_constructor(decl, init);
            }
            ItemKind::Subscript(sub) => {
                let Some(decl) = self.decl_of(item.id) else {
                    return;
                };
                self.lower_defaults(decl, &sub.params);
                if let Accessors::Computed { get, set } = &sub.accessors {
                    self.lower_accessor(decl, AccessorKind::Get, get, None, &sub.params);
                    if let Some(set) = set {
                        self.lower_accessor(decl, AccessorKind::Set, &set.body, Some(set), &sub.params);
                    }
                }
            }
            ItemKind::Var(var) => self.lower_var(item, var),
            ItemKind::Struct(nominal) | ItemKind::Class(nominal) | ItemKind::Enum(nominal) => {
                for member in &nominal.members {
                    self.lower_item(member);
                }
                let Some(decl) = self.decl_of(item.id) else {
                    return;
                };
                let implicit = self
                    .set
                    .decl(decl)
                    .members()
                    .iter()
                    .copied()
                    .filter(|member| {
                        let d = self.set.decl(*member);
                        d.is_implicit && matches!(d.kind, DeclKind::Constructor { .. })
                    })
                    .collect::<Vec<_>>();
                for ctor in implicit {
                    self.lower_implicit_constructor(ctor);
                }
            }
            ItemKind::Extension(ext) => {
                for member in &ext.members {
                    self.lower_item(member);
                }
            }
            _ => {}
        }
    }

    /// Runs `body` on a fresh function lowerer, adding the function to the
    /// module on success.
    fn lower_body(
        &mut self,
        name: String,
        kind: FunctionKind,
        decl: Option<DeclId>,
        abs: &Abstraction,
        body: impl FnOnce(&mut FuncLowerer<'_, 'a>, Entry) -> LowerResult<()>,
    ) {
        tracing::trace!(target: "lower", function = %name, "lowering function");
        let (mut func, entry) = FuncLowerer::new(self, name.clone(), kind, decl, abs, None, &[]);
        match body(&mut func, entry) {
            Ok(()) => func.finish(),
            Err(err) => {
                drop(func);
                tracing::debug!(target: "lower", function = %name, error = %err, "function left out");
                self.errors.push(err);
            }
        }
    }

    fn lower_function(&mut self, decl: DeclId, params: &'a [Param], body: &'a Block) {
        let abs = self.types.decl_abstraction(decl);
        let name = decl_symbol(self.set, decl);
        self.lower_body(name, FunctionKind::Normal, Some(decl), &abs, |func, entry| {
            func.bind_self(&abs, entry.self_value);
            func.bind_params(params, &abs, &entry.formals)?;
            func.lower_block(body)?;
            func.finish_body(body.span)
        });
    }

    fn lower_defaults(&mut self, callee: DeclId, params: &'a [Param]) {
        for (index, param) in params.iter().enumerate() {
            let Some(default) = &param.default else {
                continue;
            };
            let abs = self.types.default_arg_abstraction(callee, index);
            let name = default_arg_symbol(self.set, callee, index);
            self.lower_body(name, FunctionKind::DefaultArgument, None, &abs, |func, _| {
                let ty = func.result_ty.clone();
                let m = func.lower_expr(default)?;
                func.return_managed(Some(m), &ty)
            });
        }
    }

    // -- Properties --

    fn lower_var(&mut self, item: &'a Item, var: &'a VarDecl) {
        let Some(decl) = self.decl_of(item.id) else {
            return;
        };
        let d = self.set.decl(decl);
        let Some(info) = d.var_info() else {
            return;
        };
        let member = self.types.member_context(decl).is_some();
        let stored = matches!(info.storage, Storage::Stored | Storage::Observed);
        if stored && (!member || d.is_static) {
            let ty = self.types.ir_type(&info.ty);
            self.module.globals.push(IrGlobal {
                name: decl_symbol(self.set, decl),
                ty,
            });
        }
        match &var.accessors {
            Accessors::Computed { get, set } => {
                self.lower_accessor(decl, AccessorKind::Get, get, None, &[]);
                if let Some(set) = set {
                    self.lower_accessor(decl, AccessorKind::Set, &set.body, Some(set), &[]);
                }
            }
            Accessors::Observed { will_set, did_set } => {
                if let Some(body) = will_set {
                    self.lower_accessor(decl, AccessorKind::WillSet, &body.body, Some(body), &[]);
                }
                if let Some(body) = did_set {
                    self.lower_accessor(decl, AccessorKind::DidSet, &body.body, Some(body), &[]);
                }
                self.lower_observed_setter(decl, will_set.is_some(), did_set.is_some());
            }
            Accessors::Stored | Accessors::Requirement { .. } => {}
        }
    }

    /// Getter, setter or observer body. The value parameter of a setter or
    /// observer is keyed by the body block.
    fn lower_accessor(
        &mut self,
        storage: DeclId,
        kind: AccessorKind,
        body: &'a Block,
        value: Option<&'a AccessorBody>,
        indices: &'a [Param],
    ) {
        let abs = self.types.accessor_abstraction(storage, kind);
        let name = accessor_symbol(self.set, storage, kind.suffix());
        let decl = self.decl_of(body.id);
        let observer = matches!(kind, AccessorKind::WillSet | AccessorKind::DidSet);
        let value_name = match (value.and_then(|value| value.param.clone()), kind) {
            (Some(name), _) => name,
            (None, AccessorKind::DidSet) => "oldValue".to_string(),
            (None, _) => "newValue".to_string(),
        };
        self.lower_body(name, FunctionKind::Normal, decl, &abs, |func, entry| {
            func.bind_self(&abs, entry.self_value);
            if observer {
                func.direct_storage = Some(storage);
            }
            let mut formals = entry.formals.as_slice();
            let mut params = abs.params.as_slice();
            if kind != AccessorKind::Get {
                if let (Some((value, rest)), Some((param, rest_params))) = (formals.split_first(), params.split_first()) {
                    let ty = func
                        .cx
                        .tables
                        .locals
                        .get(&body.id)
                        .map(|local| local.ty.clone())
                        .unwrap_or_else(|| param.ty.clone());
                    func.bind_param(body.id, &value_name, *value, param.convention, &ty)?;
                    formals = rest;
                    params = rest_params;
                }
            }
            for ((param, formal), value) in indices.iter().zip(params).zip(formals) {
                let ty = func
                    .cx
                    .tables
                    .locals
                    .get(&param.id)
                    .map(|local| local.ty.clone())
                    .unwrap_or_else(|| formal.ty.clone());
                func.bind_param(param.id, &param.name, *value, formal.convention, &ty)?;
            }
            func.lower_block(body)?;
            func.finish_body(body.span)
        });
    }

    /// `X!setter` of an observed property: `willSet`, store, `didSet`.
    fn lower_observed_setter(&mut self, storage: DeclId, will_set: bool, did_set: bool) {
        let abs = self.types.accessor_abstraction(storage, AccessorKind::Set);
        let name = accessor_symbol(self.set, storage, AccessorKind::Set.suffix());
        let span = self.set.decl(storage).span;
        self.lower_body(name, FunctionKind::Normal, None, &abs, |func, entry| {
            func.bind_self(&abs, entry.self_value);
            func.direct_storage = Some(storage);
            let (Some(value), Some(param)) = (entry.formals.first().copied(), abs.params.first()) else {
                return Err(func.error(LowerErrorKind::MissingType, span));
            };
            let ty = param.ty.clone();
            let new_value = match param.convention {
                Convention::InGuaranteed => Managed::addr(value),
                _ => Managed::value(value),
            };
            let decl_ref = func.own_decl_ref(storage);
            let self_ty = func.self_ty.clone();
            if will_set {
                let access = func.setter_self_access(span)?;
                let m = func.call_accessor(
                    storage,
                    AccessorKind::WillSet,
                    &decl_ref,
                    self_ty.as_ref(),
                    access,
                    Some((new_value, ty.clone())),
                    &[],
                    span,
                )?;
                func.discard(m);
            }
            let addr = func.stored_addr(storage, &ty, span)?;
            let old_value = if did_set {
                let old = func.take_managed(addr, &ty);
                func.store_into(new_value, &ty, addr, true);
                Some(old)
            } else {
                func.store_into(new_value, &ty, addr, false);
                None
            };
            if let Some(old) = old_value {
                let access = func.setter_self_access(span)?;
                let m = func.call_accessor(
                    storage,
                    AccessorKind::DidSet,
                    &decl_ref,
                    self_ty.as_ref(),
                    access,
                    Some((old, ty.clone())),
                    &[],
                    span,
                )?;
                func.discard(m);
            }
            func.finish_body(span)
        });
    }

    // -- Constructors --

    fn lower_constructor(&mut self, ctor: DeclId, init: &'a InitDecl) {
        let Some(body) = &init.body else {
            return;
        };
        let is_class = self.is_class_member(ctor);
        if is_class {
            self.lower_allocator(ctor);
        }
        let (abs, name) = if is_class {
            (self.types.initializer_abstraction(ctor), initializer_symbol(self.set, ctor))
        } else {
            (self.types.decl_abstraction(ctor), constructor_symbol(self.set, ctor))
        };
        let failable = init.failable;
        self.lower_body(name, FunctionKind::Normal, Some(ctor), &abs, |func, entry| {
            func.begin_init(ctor, failable, entry.self_value, body.span)?;
            func.bind_params(&init.params, &abs, &entry.formals)?;
            func.lower_block(body)?;
            func.finish_body(body.span)
        });
    }

    /// Memberwise or default initializer the collector synthesized.
    fn lower_implicit_constructor(&mut self, ctor: DeclId) {
        let is_class = self.is_class_member(ctor);
        if is_class {
            self.lower_allocator(ctor);
        }
        let (abs, name) = if is_class {
            (self.types.initializer_abstraction(ctor), initializer_symbol(self.set, ctor))
        } else {
            (self.types.decl_abstraction(ctor), constructor_symbol(self.set, ctor))
        };
        let set = self.set;
        let span = set.decl(ctor).span;
        let params = set
            .decl(ctor)
            .func_sig()
            .map(|sig| sig.params.iter().map(|param| param.name.clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        self.lower_body(name, FunctionKind::Normal, Some(ctor), &abs, |func, entry| {
            func.begin_init(ctor, false, entry.self_value, span)?;
            for ((name, value), param) in params.iter().zip(&entry.formals).zip(&abs.params) {
                let Some(field) = func.stored_property(name) else {
                    return Err(func.error(LowerErrorKind::UnresolvedReference(name.clone()), span));
                };
                let ty = param.ty.clone();
                let m = match param.convention {
                    Convention::InGuaranteed => Managed::addr(*value),
                    _ => Managed::value(*value),
                };
                let addr = func.stored_addr(field, &ty, span)?;
                func.store_into(m, &ty, addr, true);
            }
            func.lower_return(None, span)
        });
    }

    fn is_class_member(&self, decl: DeclId) -> bool {
        self.set
            .decl(decl)
            .parent
            .and_then(|parent| self.set.nominal_of_context(parent))
            .is_some_and(|nominal| self.set.decl(nominal).is_class())
    }

    /// Allocating entry of a class constructor: allocates the instance and
    /// hands it to the initializing entry.
    fn lower_allocator(&mut self, ctor: DeclId) {
        let abs = self.types.decl_abstraction(ctor);
        let init_abs = self.types.initializer_abstraction(ctor);
        let name = allocator_symbol(self.set, ctor);
        let initializer = initializer_symbol(self.set, ctor);
        let span = self.set.decl(ctor).span;
        self.lower_body(name, FunctionKind::Normal, Some(ctor), &abs, |func, entry| {
            let types = func.cx.types;
            let self_ty = func.self_ty.clone().unwrap_or(Type::Error);
            let ir = func.ir(&self_ty);
            let object = func
                .b
                .emit_value(InstKind::AllocRef { ty: ir.clone() }, ir, Ownership::Owned);
            let leading = func.generic_args(&init_abs, &Substitution::new(), span)?;
            let sig = types.signature(&init_abs, None, &[]);
            let callee = func.b.function_ref(&initializer, types.function_ref_type(&sig));
            let result = func.emit_apply(
                PreparedCall {
                    callee,
                    abs: init_abs.clone(),
                    subst: None,
                    leading,
                    formals: entry.formals.clone(),
                    captures: Vec::new(),
                    self_arg: Some(object),
                },
                span,
            )?;
            let result_ty = func.result_ty.clone();
            func.return_managed(Some(result), &result_ty)
        });
    }

    // -- main --

    fn lower_main(&mut self, file: &'a SourceFile) {
        let abs = self.types.fn_abstraction(&FnType {
            params: Vec::new(),
            result: Type::void(),
            throws: false,
            is_async: false,
        });
        let statics = self.static_initializers(file);
        let span = match (file.items.first(), file.items.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => Span::default(),
        };
        self.lower_body("main".to_string(), FunctionKind::Normal, None, &abs, |func, _| {
            for (decl, init) in statics {
                func.init_global(decl, init, None)?;
            }
            for item in &file.items {
                if !func.b.is_reachable() {
                    break;
                }
                match &item.kind {
                    ItemKind::Stmt(stmt) => func.lower_stmt(stmt)?,
                    ItemKind::Var(var) => func.lower_global_var(item, var)?,
                    _ => {}
                }
            }
            func.finish_body(span)
        });
    }

    /// Static stored properties with initial values, in declaration order.
    fn static_initializers(&self, file: &'a SourceFile) -> Vec<(DeclId, &'a Expr)> {
        let mut out = Vec::new();
        let mut stack = file.items.iter().rev().collect::<Vec<_>>();
        while let Some(item) = stack.pop() {
            match &item.kind {
                ItemKind::Struct(nominal) | ItemKind::Class(nominal) | ItemKind::Enum(nominal) => {
                    stack.extend(nominal.members.iter().rev());
                }
                ItemKind::Extension(ext) => stack.extend(ext.members.iter().rev()),
                ItemKind::Var(var) if item.modifiers.is_static => {
                    if let (Some(decl), Some(init)) = (self.decl_of(item.id), &var.init) {
                        out.push((decl, init));
                    }
                }
                _ => {}
            }
        }
        out
    }
}

impl<'m, 'a> FuncLowerer<'m, 'a> {
    /// Binds an entry parameter to a local by its convention.
    pub(super) fn bind_param(
        &mut self,
        node: NodeId,
        name: &str,
        value: ValueId,
        convention: Convention,
        ty: &Type,
    ) -> LowerResult<()> {
        let m = match convention {
            Convention::Owned => self.manage(value),
            Convention::In => self.manage_temp(value, ty),
            Convention::Inout | Convention::InoutAliasable => {
                self.locals.insert(node, LocalSlot::Addr(value));
                return Ok(());
            }
            Convention::InGuaranteed => Managed::addr(value),
            Convention::Guaranteed | Convention::Trivial | Convention::Out => Managed::value(value),
        };
        if self.cx.captures.is_boxed(node) {
            return self.bind_local(node, name, true, m, ty);
        }
        match m {
            Managed::Value { value, .. } => {
                self.b.emit(InstKind::DebugValue {
                    value,
                    name: name.to_string(),
                    is_let: true,
                });
                self.locals.insert(node, LocalSlot::Value(value));
            }
            Managed::Addr { addr, .. } => {
                self.locals.insert(node, LocalSlot::Addr(addr));
            }
        }
        Ok(())
    }

    pub(super) fn bind_params(&mut self, params: &'a [Param], abs: &Abstraction, formals: &[ValueId]) -> LowerResult<()> {
        for ((param, formal), value) in params.iter().zip(&abs.params).zip(formals) {
            let ty = self
                .cx
                .tables
                .locals
                .get(&param.id)
                .map(|local| local.ty.clone())
                .unwrap_or_else(|| formal.ty.clone());
            self.bind_param(param.id, &param.name, *value, formal.convention, &ty)?;
        }
        Ok(())
    }

    /// Reference to a member of the body's own type.
    fn own_decl_ref(&self, decl: DeclId) -> DeclRef {
        DeclRef {
            decl,
            subst: Substitution::new(),
            base: self.self_ty.clone(),
            origin: LookupOrigin::CurrNominal,
            implicit_self: self.self_slot.is_some(),
            via_super: false,
        }
    }

    fn setter_self_access(&self, span: Span) -> LowerResult<SelfAccess> {
        if self.self_slot.is_none() {
            return Ok(SelfAccess::None);
        }
        self.self_access(span)
    }

    /// Stored property of the body's own nominal named `name`.
    fn stored_property(&self, name: &str) -> Option<DeclId> {
        let set = self.cx.set;
        let nominal = self.self_nominal()?;
        set.decl(nominal)
            .nominal_info()?
            .stored
            .iter()
            .copied()
            .find(|field| set.decl(*field).name == name)
    }

    /// Address of stored property `field` of `self`, or of a global.
    fn stored_addr(&mut self, field: DeclId, ty: &Type, span: Span) -> LowerResult<ValueId> {
        let set = self.cx.set;
        let d = set.decl(field);
        let ir = self.ir(ty).address_of();
        if self.cx.types.member_context(field).is_none() || d.is_static {
            let name = decl_symbol(set, field);
            return Ok(self.b.emit_value(InstKind::GlobalAddr { name }, ir, Ownership::Trivial));
        }
        let self_ty = self.self_ty.clone().unwrap_or(Type::Error);
        let m = self.self_managed(span)?;
        match self.project_field(m, &self_ty, &d.name, ty) {
            Managed::Addr { addr, .. } => Ok(addr),
            Managed::Value { .. } => Err(self.error(LowerErrorKind::NotAssignable, span)),
        }
    }

    /// Sets up `self` for an initializer body: a marked slot the body
    /// fills, with stored properties given their initial values.
    fn begin_init(&mut self, ctor: DeclId, failable: bool, self_value: Option<ValueId>, span: Span) -> LowerResult<()> {
        let set = self.cx.set;
        let self_ty = self.self_ty.clone().unwrap_or(Type::Error);
        let class = set.is_class_type(&self_ty);
        let ir = self.ir(&self_ty);
        let slot = self.b.alloc_stack(&ir, Some("self".to_string()));
        self.push_cleanup(crate::core::lower::func::CleanupKind::DeallocStack(slot));
        let marked = self
            .b
            .emit_value(InstKind::MarkUninitialized { addr: slot }, ir.address_of(), Ownership::Trivial);
        if let (true, Some(object)) = (class, self_value) {
            self.b.store(object, marked, StoreQualifier::Init);
        }
        self.self_slot = Some(SelfSlot::Addr(marked));
        self.in_init = true;
        self.return_mode = ReturnMode::Init { failable, class };

        let Some(nominal) = self.self_nominal() else {
            return Err(self.error(LowerErrorKind::UnresolvedReference("self".to_string()), span));
        };
        let stored = set
            .decl(nominal)
            .nominal_info()
            .map(|info| info.stored.clone())
            .unwrap_or_default();
        tracing::trace!(target: "lower", ctor = %decl_symbol(set, ctor), fields = stored.len(), "initializing stored properties");
        for field in stored {
            let Some(init) = self.cx.initial_values.get(&field).copied() else {
                continue;
            };
            let ty = set.decl(field).var_info().map(|info| info.ty.clone()).unwrap_or(Type::Error);
            self.scoped(|this| {
                let m = this.lower_expr(init)?;
                let addr = this.stored_addr(field, &ty, init.span)?;
                this.store_into(m, &ty, addr, true);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Initial value of a global or static stored property.
    fn init_global(&mut self, decl: DeclId, init: &'a Expr, local: Option<NodeId>) -> LowerResult<()> {
        let set = self.cx.set;
        let ty = set.decl(decl).var_info().map(|info| info.ty.clone()).unwrap_or(Type::Error);
        let ir = self.ir(&ty).address_of();
        let name = decl_symbol(set, decl);
        let addr = self.b.emit_value(InstKind::GlobalAddr { name }, ir, Ownership::Trivial);
        self.scoped(|this| {
            let m = this.lower_expr(init)?;
            this.store_into(m, &ty, addr, true);
            Ok(())
        })?;
        if let Some(node) = local {
            self.locals.insert(node, LocalSlot::Addr(addr));
        }
        Ok(())
    }

    /// Top-level `var`/`let`: a global that the rest of the top-level code
    /// addresses directly.
    fn lower_global_var(&mut self, item: &'a Item, var: &'a VarDecl) -> LowerResult<()> {
        let set = self.cx.set;
        let Some(decl) = set.module(set.current()).decl_for_node(item.id) else {
            return Err(self.unsupported("a destructuring global declaration", item.span));
        };
        let stored = set
            .decl(decl)
            .var_info()
            .is_some_and(|info| matches!(info.storage, Storage::Stored | Storage::Observed));
        if !stored {
            return Ok(());
        }
        match &var.init {
            Some(init) => self.init_global(decl, init, Some(var.pattern.id)),
            None => {
                let ty = set.decl(decl).var_info().map(|info| info.ty.clone()).unwrap_or(Type::Error);
                let ir = self.ir(&ty).address_of();
                let addr = self.b.emit_value(
                    InstKind::GlobalAddr {
                        name: decl_symbol(set, decl),
                    },
                    ir,
                    Ownership::Trivial,
                );
                self.locals.insert(var.pattern.id, LocalSlot::Addr(addr));
                Ok(())
            }
        }
    }
}
