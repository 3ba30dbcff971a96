//! Textual form of the IR.
//!
//! Values and blocks are renumbered densely in print order, so the output
//! does not depend on how many values lowering allocated along the way.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::model::*;

pub fn format_module(module: &IrModule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "sil_stage raw");
    let _ = writeln!(out);
    let _ = writeln!(out, "// module {}", module.name);
    for global in &module.globals {
        let _ = writeln!(out);
        let _ = writeln!(out, "sil_global @{} : {}", global.name, global.ty);
    }
    for func in module.functions.values() {
        let _ = writeln!(out);
        out.push_str(&format_function(func));
    }
    for table in &module.witness_tables {
        let _ = writeln!(out);
        out.push_str(&format_witness_table(table));
    }
    out
}

pub fn format_witness_table(table: &IrWitnessTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "sil_witness_table {} {{", table.conformance);
    for entry in &table.entries {
        let _ = match entry {
            WitnessEntry::Method { requirement, thunk } => {
                writeln!(out, "  method #{requirement}: @{thunk}")
            }
            WitnessEntry::AssociatedType { name, ty } => {
                writeln!(out, "  associated_type {name}: {ty}")
            }
            WitnessEntry::AssociatedConformance {
                path,
                protocol,
                conformance,
            } => writeln!(
                out,
                "  associated_type_protocol ({path}: {protocol}): {conformance}"
            ),
            WitnessEntry::BaseProtocol {
                protocol,
                conformance,
            } => writeln!(out, "  base_protocol {protocol}: {conformance}"),
        };
    }
    let _ = writeln!(out, "}}");
    out
}

pub fn format_function(func: &IrFunction) -> String {
    let mut formatter = Formatter::new(func);
    formatter.write_function();
    formatter.out
}

struct Formatter<'a> {
    func: &'a IrFunction,
    values: HashMap<ValueId, usize>,
    blocks: HashMap<BlockId, usize>,
    types: HashMap<ValueId, &'a IrType>,
    out: String,
}

impl<'a> Formatter<'a> {
    fn new(func: &'a IrFunction) -> Self {
        let mut values = HashMap::new();
        let mut blocks = HashMap::new();
        let mut types = HashMap::new();
        for (index, block) in func.blocks.iter().enumerate() {
            blocks.insert(block.id, index);
            let defs = block
                .params
                .iter()
                .chain(block.insts.iter().flat_map(|inst| inst.results.iter()));
            for def in defs {
                let next = values.len();
                values.insert(def.id, next);
                types.insert(def.id, &def.ty);
            }
        }
        Formatter {
            func,
            values,
            blocks,
            types,
            out: String::new(),
        }
    }

    fn v(&self, id: ValueId) -> String {
        match self.values.get(&id) {
            Some(index) => format!("%{index}"),
            None => format!("%undef{}", id.0),
        }
    }

    /// Operand with its type, `%3 : $Int`.
    fn typed(&self, id: ValueId) -> String {
        match self.types.get(&id) {
            Some(ty) => format!("{} : {}", self.v(id), ty),
            None => self.v(id),
        }
    }

    fn bb(&self, id: BlockId) -> String {
        match self.blocks.get(&id) {
            Some(index) => format!("bb{index}"),
            None => format!("bb_undef{}", id.0),
        }
    }

    fn list(&self, ids: &[ValueId]) -> String {
        ids.iter().map(|id| self.v(*id)).collect::<Vec<_>>().join(", ")
    }

    fn args(&self, args: &[ApplyArg]) -> String {
        args.iter()
            .map(|arg| self.v(arg.value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn write_function(&mut self) {
        let attr = match self.func.kind {
            FunctionKind::Normal => "",
            FunctionKind::Closure => "private ",
            FunctionKind::Thunk => "[thunk] ",
            FunctionKind::DefaultArgument => "[default_argument] ",
        };
        let _ = writeln!(
            self.out,
            "sil {attr}@{} : $@convention(thin) {} {{",
            self.func.name,
            self.func.sig.render()
        );
        for (index, block) in self.func.blocks.iter().enumerate() {
            if index > 0 {
                let _ = writeln!(self.out);
            }
            self.write_block(block);
        }
        let _ = writeln!(self.out, "}}");
    }

    fn write_block(&mut self, block: &Block) {
        let mut header = self.bb(block.id);
        if !block.params.is_empty() {
            let params = block
                .params
                .iter()
                .map(|param| match param.ownership {
                    Ownership::Trivial => format!("{} : {}", self.v(param.id), param.ty),
                    ownership => format!("{} : {} {}", self.v(param.id), ownership, param.ty),
                })
                .collect::<Vec<_>>()
                .join(", ");
            header = format!("{header}({params})");
        }
        let _ = writeln!(self.out, "{header}:");
        for inst in &block.insts {
            let text = self.inst_text(inst);
            let line = match inst.results.as_slice() {
                [] => text,
                [one] => format!("{} = {text}", self.v(one.id)),
                many => {
                    let ids = many.iter().map(|def| def.id).collect::<Vec<_>>();
                    format!("({}) = {text}", self.list(&ids))
                }
            };
            let _ = writeln!(self.out, "  {line}");
        }
        let term = self.term_text(&block.term);
        let _ = writeln!(self.out, "  {term}");
    }

    fn result_ty(inst: &Instruction) -> String {
        inst.result()
            .map(|def| def.ty.to_string())
            .unwrap_or_else(|| "$()".to_string())
    }

    fn inst_text(&self, inst: &Instruction) -> String {
        match &inst.kind {
            InstKind::IntegerLiteral { ty, value } => format!("integer_literal {ty}, {value}"),
            InstKind::FloatLiteral { ty, value } => format!("float_literal {ty}, {value}"),
            InstKind::StringLiteral { value } => format!("string_literal {value:?}"),
            InstKind::FunctionRef { name } => {
                format!("function_ref @{name} : {}", Self::result_ty(inst))
            }
            InstKind::ThinToThick { func } => format!("thin_to_thick_function {}", self.typed(*func)),
            InstKind::Builtin { name, args } => {
                format!("builtin {name:?}({}) : {}", self.list(args), Self::result_ty(inst))
            }
            InstKind::Metatype { ty } => format!("metatype {ty}"),
            InstKind::WitnessTable { conformance } => format!("witness_table {conformance}"),
            InstKind::WitnessMethod {
                lookup,
                member,
                table,
            } => format!("witness_method ${lookup}, #{member}, {}", self.v(*table)),
            InstKind::AssocWitnessTable {
                table,
                path,
                protocol,
            } => format!("associated_witness_table {}, ({path}: {protocol})", self.v(*table)),
            InstKind::TupleExtract { tuple, index } => {
                format!("tuple_extract {}, {index}", self.typed(*tuple))
            }
            InstKind::StructExtract { value, field } => {
                format!("struct_extract {}, #{field}", self.typed(*value))
            }
            InstKind::DynamicMethod { object, member } => {
                format!("dynamic_method {}, #{member}", self.typed(*object))
            }
            InstKind::Apply { callee, args } => {
                format!("apply {}({}) : {}", self.v(*callee), self.args(args), Self::result_ty(inst))
            }
            InstKind::PartialApply { callee, captures } => format!(
                "partial_apply [callee_guaranteed] {}({})",
                self.v(*callee),
                self.args(captures)
            ),
            InstKind::Tuple { elems } => format!("tuple ({})", self.list(elems)),
            InstKind::DestructureTuple { tuple } => format!("destructure_tuple {}", self.typed(*tuple)),
            InstKind::TupleElementAddr { addr, index } => {
                format!("tuple_element_addr {}, {index}", self.typed(*addr))
            }
            InstKind::Struct { ty, fields } => format!("struct {ty} ({})", self.list(fields)),
            InstKind::DestructureStruct { value } => {
                format!("destructure_struct {}", self.typed(*value))
            }
            InstKind::StructElementAddr { addr, field } => {
                format!("struct_element_addr {}, #{field}", self.typed(*addr))
            }
            InstKind::Enum { ty, case, payload } => match payload {
                Some(payload) => format!("enum {ty}, #{case}!enumelt, {}", self.v(*payload)),
                None => format!("enum {ty}, #{case}!enumelt"),
            },
            InstKind::InitEnumDataAddr { addr, case } => {
                format!("init_enum_data_addr {}, #{case}!enumelt", self.typed(*addr))
            }
            InstKind::InjectEnumAddr { addr, case } => {
                format!("inject_enum_addr {}, #{case}!enumelt", self.typed(*addr))
            }
            InstKind::UncheckedTakeEnumDataAddr { addr, case } => format!(
                "unchecked_take_enum_data_addr {}, #{case}!enumelt",
                self.typed(*addr)
            ),
            InstKind::AllocStack { ty, name } => match name {
                Some(name) => format!("alloc_stack {ty}, name {name:?}"),
                None => format!("alloc_stack {ty}"),
            },
            InstKind::DeallocStack { addr } => format!("dealloc_stack {}", self.typed(*addr)),
            InstKind::AllocBox { ty, name } => match name {
                Some(name) => format!("alloc_box ${{ var {} }}, name {name:?}", ty.name),
                None => format!("alloc_box ${{ var {} }}", ty.name),
            },
            InstKind::ProjectBox { boxed } => format!("project_box {}, 0", self.typed(*boxed)),
            InstKind::AllocRef { ty } => format!("alloc_ref {ty}"),
            InstKind::RefElementAddr { object, field } => {
                format!("ref_element_addr {}, #{field}", self.typed(*object))
            }
            InstKind::GlobalAddr { name } => {
                format!("global_addr @{name} : {}", Self::result_ty(inst))
            }
            InstKind::MarkUninitialized { addr } => {
                format!("mark_uninitialized [var] {}", self.typed(*addr))
            }
            InstKind::Load { addr, qualifier } => {
                let q = match qualifier {
                    LoadQualifier::Take => "take",
                    LoadQualifier::Copy => "copy",
                    LoadQualifier::Trivial => "trivial",
                };
                format!("load [{q}] {}", self.typed(*addr))
            }
            InstKind::Store {
                value,
                addr,
                qualifier,
            } => {
                let q = match qualifier {
                    StoreQualifier::Init => "init",
                    StoreQualifier::Assign => "assign",
                    StoreQualifier::Trivial => "trivial",
                };
                format!("store {} to [{q}] {}", self.v(*value), self.typed(*addr))
            }
            InstKind::CopyAddr {
                src,
                dst,
                take,
                init,
            } => {
                let take = if *take { "[take] " } else { "" };
                let init = if *init { "[init] " } else { "" };
                format!("copy_addr {take}{} to {init}{}", self.v(*src), self.typed(*dst))
            }
            InstKind::DestroyAddr { addr } => format!("destroy_addr {}", self.typed(*addr)),
            InstKind::CopyValue { value } => format!("copy_value {}", self.typed(*value)),
            InstKind::DestroyValue { value } => format!("destroy_value {}", self.typed(*value)),
            InstKind::Upcast { value, ty } => format!("upcast {} to {ty}", self.typed(*value)),
            InstKind::UncheckedRefCast { value, ty } => {
                format!("unchecked_ref_cast {} to {ty}", self.typed(*value))
            }
            InstKind::InitExistentialAddr { addr, concrete } => {
                format!("init_existential_addr {}, ${concrete}", self.typed(*addr))
            }
            InstKind::InitExistentialRef { value, ty } => {
                format!("init_existential_ref {}, {ty}", self.typed(*value))
            }
            InstKind::OpenExistentialAddr { addr } => format!(
                "open_existential_addr immutable_access {} to {}",
                self.typed(*addr),
                Self::result_ty(inst)
            ),
            InstKind::ExistentialMetatype { opened } => {
                format!("existential_metatype {}", self.typed(*opened))
            }
            InstKind::ExistentialWitnessTable { opened, protocol } => {
                format!("existential_witness_table {}, {protocol}", self.typed(*opened))
            }
            InstKind::DebugValue {
                value,
                name,
                is_let,
            } => {
                let kind = if *is_let { "let" } else { "var" };
                format!("debug_value {}, {kind}, name {name:?}", self.typed(*value))
            }
        }
    }

    fn cases(&self, cases: &[SwitchCase], default: Option<BlockId>) -> String {
        let mut parts = cases
            .iter()
            .map(|case| format!("case #{}!enumelt: {}", case.case, self.bb(case.target)))
            .collect::<Vec<_>>();
        if let Some(default) = default {
            parts.push(format!("default {}", self.bb(default)));
        }
        parts.join(", ")
    }

    fn term_text(&self, term: &Terminator) -> String {
        match term {
            Terminator::Return { value } => format!("return {}", self.typed(*value)),
            Terminator::Throw { value } => format!("throw {}", self.typed(*value)),
            Terminator::Br { target, args } if args.is_empty() => format!("br {}", self.bb(*target)),
            Terminator::Br { target, args } => {
                format!("br {}({})", self.bb(*target), self.list(args))
            }
            Terminator::CondBr {
                cond,
                then_bb,
                else_bb,
            } => format!(
                "cond_br {}, {}, {}",
                self.v(*cond),
                self.bb(*then_bb),
                self.bb(*else_bb)
            ),
            Terminator::SwitchEnum {
                value,
                cases,
                default,
            } => format!("switch_enum {}, {}", self.typed(*value), self.cases(cases, *default)),
            Terminator::SwitchEnumAddr {
                addr,
                cases,
                default,
            } => format!(
                "switch_enum_addr {}, {}",
                self.typed(*addr),
                self.cases(cases, *default)
            ),
            Terminator::TryApply {
                callee,
                args,
                normal,
                error,
            } => format!(
                "try_apply {}({}) : normal {}, error {}",
                self.v(*callee),
                self.args(args),
                self.bb(*normal),
                self.bb(*error)
            ),
            Terminator::Unreachable => "unreachable".to_string(),
        }
    }
}
