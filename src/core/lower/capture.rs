//! Capture analysis.
//!
//! Closure literals, local functions and `@autoclosure` arguments each form
//! a frame. A frame captures every local it uses that is bound outside it,
//! including the captures of local functions it references. A `var` is
//! boxed when some frame mutates it or an escaping frame captures it; other
//! variables are captured by address, and `let`s by value.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::lower::types::TypeLowerer;
use crate::core::resolve::{DeclKind, ModuleSet, ParamBinding};
use crate::core::tree::visit::{self, Visitor};
use crate::core::tree::{
    ClosureExpr, Condition, Expr, ExprKind, Item, ItemKind, NodeId, Pattern, PatternKind, SourceFile, Stmt,
    StmtKind,
};
use crate::core::typecheck::{ArgLayout, CallTarget, TypeTables, ValueRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CaptureKind {
    /// Immutable copy of the value.
    Value,
    /// The variable's heap box.
    Box,
    /// Address of the variable (`inout_aliasable`).
    Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Capture {
    pub(super) node: NodeId,
    pub(super) kind: CaptureKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct CaptureInfo {
    /// Ordered by binding node.
    pub(super) captures: Vec<Capture>,
    pub(super) captures_self: bool,
    pub(super) escaping: bool,
}

#[derive(Debug, Clone, Default)]
pub(super) struct CaptureAnalysis {
    infos: HashMap<NodeId, CaptureInfo>,
    boxed: HashSet<NodeId>,
    autoclosures: HashSet<NodeId>,
}

impl CaptureAnalysis {
    pub(super) fn run(set: &ModuleSet<'_>, types: TypeLowerer<'_>, tables: &TypeTables, file: &SourceFile) -> Self {
        let mut analyzer = Analyzer {
            set,
            tables,
            frames: Vec::new(),
            stack: Vec::new(),
            nonescaping: HashSet::new(),
            autoclosures: HashMap::new(),
            escaping_funcs: HashSet::new(),
            callees: HashSet::new(),
            inout_params: HashSet::new(),
        };
        for item in &file.items {
            analyzer.visit_item(item);
        }
        analyzer.resolve_local_functions();
        analyzer.finish(types)
    }

    /// Captures of a closure expression, local function item or
    /// autoclosure argument.
    pub(super) fn info(&self, key: NodeId) -> CaptureInfo {
        self.infos.get(&key).cloned().unwrap_or_default()
    }

    pub(super) fn is_boxed(&self, node: NodeId) -> bool {
        self.boxed.contains(&node)
    }

    pub(super) fn is_autoclosure(&self, node: NodeId) -> bool {
        self.autoclosures.contains(&node)
    }
}

#[derive(Debug, Default)]
struct Frame {
    key: NodeId,
    parent: Option<usize>,
    bound: HashSet<NodeId>,
    used: BTreeSet<NodeId>,
    mutated: HashSet<NodeId>,
    local_funcs: HashSet<NodeId>,
    uses_self: bool,
    escaping: bool,
    is_local_func: bool,
}

impl Frame {
    fn captured(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.used.iter().copied().filter(|node| !self.bound.contains(node))
    }
}

struct Analyzer<'s> {
    set: &'s ModuleSet<'s>,
    tables: &'s TypeTables,
    frames: Vec<Frame>,
    stack: Vec<usize>,
    /// Closure literals passed directly to non-escaping parameters.
    nonescaping: HashSet<NodeId>,
    /// Autoclosure arguments and whether their parameter escapes.
    autoclosures: HashMap<NodeId, bool>,
    /// Local functions referenced as values.
    escaping_funcs: HashSet<NodeId>,
    callees: HashSet<NodeId>,
    inout_params: HashSet<NodeId>,
}

impl Analyzer<'_> {
    fn push_frame(&mut self, key: NodeId, escaping: bool, is_local_func: bool) {
        let parent = self.stack.last().copied();
        self.frames.push(Frame {
            key,
            parent,
            escaping,
            is_local_func,
            ..Frame::default()
        });
        self.stack.push(self.frames.len() - 1);
    }

    fn pop_frame(&mut self) {
        let Some(index) = self.stack.pop() else {
            return;
        };
        let Some(parent) = self.stack.last().copied() else {
            return;
        };
        let frame = &self.frames[index];
        let captured = frame.captured().collect::<Vec<_>>();
        let mutated = frame
            .mutated
            .iter()
            .copied()
            .filter(|node| !frame.bound.contains(node))
            .collect::<Vec<_>>();
        let uses_self = frame.uses_self;
        let local_funcs = frame.local_funcs.iter().copied().collect::<Vec<_>>();
        let parent = &mut self.frames[parent];
        parent.used.extend(captured);
        parent.mutated.extend(mutated);
        parent.uses_self |= uses_self;
        parent.local_funcs.extend(local_funcs);
    }

    fn top(&mut self) -> Option<&mut Frame> {
        let index = *self.stack.last()?;
        self.frames.get_mut(index)
    }

    fn bind(&mut self, node: NodeId) {
        if let Some(frame) = self.top() {
            frame.bound.insert(node);
        }
    }

    fn use_local(&mut self, node: NodeId) {
        if let Some(frame) = self.top() {
            frame.used.insert(node);
        }
    }

    fn use_self(&mut self) {
        if let Some(frame) = self.top() {
            frame.uses_self = true;
        }
    }

    fn mutate(&mut self, expr: &Expr) {
        if let Some(node) = self.root_local(expr) {
            if let Some(frame) = self.top() {
                frame.mutated.insert(node);
            }
        }
    }

    fn root_local(&self, expr: &Expr) -> Option<NodeId> {
        match &expr.kind {
            ExprKind::Ident(_) => match self.tables.refs.get(&expr.id) {
                Some(ValueRef::Local(node)) => Some(*node),
                _ => None,
            },
            ExprKind::Member { base, .. }
            | ExprKind::TupleIndex { base, .. }
            | ExprKind::Subscript { base, .. }
            | ExprKind::ForceUnwrap(base)
            | ExprKind::BindOptional(base)
            | ExprKind::OptionalEval(base)
            | ExprKind::Paren(base) => self.root_local(base),
            _ => None,
        }
    }

    fn is_local_func(&self, decl: crate::core::resolve::DeclId) -> bool {
        let d = self.set.decl(decl);
        matches!(d.kind, DeclKind::Func(_))
            && d.parent.is_some_and(|parent| {
                matches!(
                    self.set.decl(parent).kind,
                    DeclKind::Func(_) | DeclKind::Constructor { .. } | DeclKind::Accessor { .. }
                )
            })
    }

    /// Marks closure literals and autoclosure arguments of a call.
    fn classify_args(&mut self, expr: &Expr, callee: &Expr, args: &[crate::core::tree::Arg]) {
        self.callees.insert(callee.id);
        if let ExprKind::Paren(inner) = &callee.kind {
            self.callees.insert(inner.id);
        }
        let Some(info) = self.tables.calls.get(&expr.id) else {
            return;
        };
        if let (ExprKind::Member { base, .. }, Some(callee_ref)) = (&callee.kind, &info.callee) {
            if self.set.decl(callee_ref.decl).mutating {
                self.mutate(base);
            }
        }
        if info.layout != ArgLayout::Normal {
            return;
        }
        let params = match (&info.callee, info.target) {
            (Some(callee), CallTarget::Function | CallTarget::Constructor | CallTarget::Operator) => {
                match self.set.decl(callee.decl).func_sig() {
                    Some(sig) => sig.params.clone(),
                    None => return,
                }
            }
            _ => return,
        };
        for (param, binding) in params.iter().zip(&info.bindings) {
            let ParamBinding::Args(indices) = binding else {
                continue;
            };
            for index in indices {
                let Some(arg) = args.get(*index) else {
                    continue;
                };
                if param.autoclosure {
                    self.autoclosures.insert(arg.expr.id, param.escaping);
                } else if !param.escaping && param.ty.as_function().is_some() {
                    let mut target = &arg.expr;
                    while let ExprKind::Paren(inner) = &target.kind {
                        target = inner;
                    }
                    if matches!(target.kind, ExprKind::Closure(_)) {
                        self.nonescaping.insert(target.id);
                    }
                }
            }
        }
    }

    fn visit_local_func(&mut self, item: &Item) {
        let ItemKind::Func(func) = &item.kind else {
            return;
        };
        self.push_frame(item.id, false, true);
        for param in &func.params {
            self.bind(param.id);
            if param.inout {
                self.inout_params.insert(param.id);
            }
        }
        if let Some(body) = &func.body {
            self.visit_block(body);
        }
        self.pop_frame();
    }

    /// Adds the captures of referenced local functions until nothing
    /// changes.
    fn resolve_local_functions(&mut self) {
        let index_of = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.is_local_func)
            .map(|(index, frame)| (frame.key, index))
            .collect::<HashMap<_, _>>();
        loop {
            let mut changed = false;
            for index in 0..self.frames.len() {
                let mut extra = Vec::new();
                let mut uses_self = false;
                for func in &self.frames[index].local_funcs {
                    if let Some(&callee) = index_of.get(func) {
                        extra.extend(self.frames[callee].captured());
                        uses_self |= self.frames[callee].uses_self;
                    }
                }
                let mut current = Some(index);
                while let Some(at) = current {
                    let frame = &mut self.frames[at];
                    if uses_self && !frame.uses_self {
                        frame.uses_self = true;
                        changed = true;
                    }
                    for node in &extra {
                        if !frame.bound.contains(node) && frame.used.insert(*node) {
                            changed = true;
                        }
                    }
                    current = frame.parent;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn finish(mut self, types: TypeLowerer<'_>) -> CaptureAnalysis {
        for frame in &mut self.frames {
            if frame.is_local_func {
                frame.escaping = self.escaping_funcs.contains(&frame.key);
            }
        }
        let mut boxed = HashSet::new();
        for frame in &self.frames {
            for node in frame.captured() {
                if self.inout_params.contains(&node) {
                    continue;
                }
                let Some(local) = self.tables.locals.get(&node) else {
                    continue;
                };
                let needs_box = if local.is_let {
                    frame.escaping && types.is_address_only(&local.ty)
                } else {
                    frame.escaping || frame.mutated.contains(&node)
                };
                if needs_box {
                    boxed.insert(node);
                }
            }
        }
        let mut infos = HashMap::new();
        for frame in &self.frames {
            let captures = frame
                .captured()
                .filter(|node| self.tables.locals.contains_key(node))
                .map(|node| {
                    let local = &self.tables.locals[&node];
                    let kind = if boxed.contains(&node) {
                        CaptureKind::Box
                    } else if self.inout_params.contains(&node)
                        || !local.is_let
                        || types.is_address_only(&local.ty)
                    {
                        CaptureKind::Address
                    } else {
                        CaptureKind::Value
                    };
                    Capture { node, kind }
                })
                .collect();
            infos.insert(
                frame.key,
                CaptureInfo {
                    captures,
                    captures_self: frame.uses_self,
                    escaping: frame.escaping,
                },
            );
        }
        CaptureAnalysis {
            infos,
            boxed,
            autoclosures: self.autoclosures.keys().copied().collect(),
        }
    }
}

impl Visitor for Analyzer<'_> {
    fn visit_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Func(func) => {
                for param in &func.params {
                    if param.inout {
                        self.inout_params.insert(param.id);
                    }
                }
                visit::walk_item(self, item);
            }
            ItemKind::Init(init) => {
                for param in &init.params {
                    if param.inout {
                        self.inout_params.insert(param.id);
                    }
                }
                visit::walk_item(self, item);
            }
            _ => visit::walk_item(self, item),
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Item(item) if matches!(item.kind, ItemKind::Func(_)) => self.visit_local_func(item),
            StmtKind::Do { catches, .. } => {
                for clause in catches {
                    self.bind(clause.id);
                }
                visit::walk_stmt(self, stmt);
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }

    fn visit_condition(&mut self, cond: &Condition) {
        if let Condition::OptionalBinding { id, .. } = cond {
            self.bind(*id);
        }
        visit::walk_condition(self, cond);
    }

    fn visit_pattern(&mut self, pattern: &Pattern) {
        if let PatternKind::Binding { .. } = pattern.kind {
            self.bind(pattern.id);
        }
        visit::walk_pattern(self, pattern);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Some(escaping) = self.autoclosures.get(&expr.id).copied() {
            self.push_frame(expr.id, escaping, false);
            self.visit_expr_inner(expr);
            self.pop_frame();
            return;
        }
        self.visit_expr_inner(expr);
    }

    fn visit_closure(&mut self, expr: &Expr, closure: &ClosureExpr) {
        let escaping = !self.nonescaping.contains(&expr.id);
        self.push_frame(expr.id, escaping, false);
        for param in &closure.params {
            self.bind(param.id);
        }
        visit::walk_closure(self, closure);
        self.pop_frame();
    }
}

impl Analyzer<'_> {
    fn visit_expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(_) => match self.tables.refs.get(&expr.id) {
                Some(ValueRef::Local(node)) => self.use_local(*node),
                Some(ValueRef::SelfValue) => self.use_self(),
                Some(ValueRef::Decl(decl_ref)) => {
                    if decl_ref.implicit_self {
                        self.use_self();
                    }
                    if self.is_local_func(decl_ref.decl) {
                        if let Some(node) = self.set.decl(decl_ref.decl).node {
                            if let Some(frame) = self.top() {
                                frame.local_funcs.insert(node);
                            }
                            if !self.callees.contains(&expr.id) {
                                self.escaping_funcs.insert(node);
                            }
                        }
                    }
                }
                _ => {}
            },
            ExprKind::SelfRef | ExprKind::SuperRef => self.use_self(),
            ExprKind::Call { callee, args } => self.classify_args(expr, callee, args),
            ExprKind::Assign { lhs, .. } => self.mutate(lhs),
            ExprKind::InOut(inner) => self.mutate(inner),
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}
