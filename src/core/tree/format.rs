//! AST dump for `--emit-ast`.
//!
//! Declarations and statements are printed one per line, indented by
//! nesting; expressions, patterns and types are printed compactly in
//! source-like syntax with explicit parentheses.

use std::fmt::Write;

use crate::core::tree::*;

pub fn format_source_file(file: &SourceFile) -> String {
    let mut out = String::new();
    for item in &file.items {
        format_item(item, 0, &mut out);
    }
    out
}

fn line(out: &mut String, depth: usize, text: &str) {
    let _ = writeln!(out, "{}{text}", "  ".repeat(depth));
}

fn format_item(item: &Item, depth: usize, out: &mut String) {
    let mut prefix = String::new();
    for attr in &item.attrs {
        prefix.push('@');
        prefix.push_str(&attr.name);
        if !attr.args.is_empty() {
            let _ = write!(prefix, "({})", attr.args.join(", "));
        }
        prefix.push(' ');
    }
    if item.modifiers.is_static {
        prefix.push_str("static ");
    }
    if item.modifiers.mutating {
        prefix.push_str("mutating ");
    }
    if item.modifiers.is_override {
        prefix.push_str("override ");
    }
    if item.modifiers.indirect {
        prefix.push_str("indirect ");
    }
    match &item.kind {
        ItemKind::Func(func) => {
            let result = func
                .result
                .as_ref()
                .map(|ty| format!(" -> {}", format_type_compact(ty)))
                .unwrap_or_default();
            line(
                out,
                depth,
                &format!(
                    "{prefix}func {}{}({}){}{result}{}",
                    func.name,
                    format_generics(&func.generics),
                    format_params(&func.params),
                    if func.throws { " throws" } else { "" },
                    format_where(&func.where_clause),
                ),
            );
            if let Some(body) = &func.body {
                format_block(body, depth + 1, out);
            }
        }
        ItemKind::Init(init) => {
            line(
                out,
                depth,
                &format!(
                    "{prefix}init{}{}({}){}{}",
                    if init.failable { "?" } else { "" },
                    format_generics(&init.generics),
                    format_params(&init.params),
                    if init.throws { " throws" } else { "" },
                    format_where(&init.where_clause),
                ),
            );
            if let Some(body) = &init.body {
                format_block(body, depth + 1, out);
            }
        }
        ItemKind::Subscript(sub) => {
            line(
                out,
                depth,
                &format!(
                    "{prefix}subscript({}) -> {}",
                    format_params(&sub.params),
                    format_type_compact(&sub.result)
                ),
            );
            format_accessors(&sub.accessors, depth + 1, out);
        }
        ItemKind::Var(var) => {
            let ty = var
                .ty
                .as_ref()
                .map(|ty| format!(": {}", format_type_compact(ty)))
                .unwrap_or_default();
            let init = var
                .init
                .as_ref()
                .map(|expr| format!(" = {}", format_expr_compact(expr)))
                .unwrap_or_default();
            line(
                out,
                depth,
                &format!(
                    "{prefix}{} {}{ty}{init}",
                    if var.is_let { "let" } else { "var" },
                    format_binding_pattern(&var.pattern)
                ),
            );
            format_accessors(&var.accessors, depth + 1, out);
        }
        ItemKind::Struct(decl) => format_nominal(&prefix, "struct", decl, depth, out),
        ItemKind::Class(decl) => format_nominal(&prefix, "class", decl, depth, out),
        ItemKind::Enum(decl) => format_nominal(&prefix, "enum", decl, depth, out),
        ItemKind::Protocol(decl) => format_nominal(&prefix, "protocol", decl, depth, out),
        ItemKind::EnumCase(case) => {
            let elements = case
                .elements
                .iter()
                .map(|element| match &element.payload {
                    Some(payload) => format!("{}{}", element.name, format_tuple_type(payload)),
                    None => element.name.clone(),
                })
                .collect::<Vec<_>>();
            line(out, depth, &format!("{prefix}case {}", elements.join(", ")));
        }
        ItemKind::Extension(ext) => {
            line(
                out,
                depth,
                &format!(
                    "{prefix}extension {}{}{}",
                    format_type_compact(&ext.extended),
                    format_inherits(&ext.inherits),
                    format_where(&ext.where_clause),
                ),
            );
            for member in &ext.members {
                format_item(member, depth + 1, out);
            }
        }
        ItemKind::TypeAlias(alias) => line(
            out,
            depth,
            &format!(
                "{prefix}typealias {}{} = {}",
                alias.name,
                format_generics(&alias.generics),
                format_type_compact(&alias.ty)
            ),
        ),
        ItemKind::AssociatedType(assoc) => {
            let default = assoc
                .default
                .as_ref()
                .map(|ty| format!(" = {}", format_type_compact(ty)))
                .unwrap_or_default();
            line(
                out,
                depth,
                &format!(
                    "{prefix}associatedtype {}{}{default}{}",
                    assoc.name,
                    format_inherits(&assoc.bounds),
                    format_where(&assoc.where_clause),
                ),
            );
        }
        ItemKind::Import(name) => line(out, depth, &format!("import {name}")),
        ItemKind::Stmt(stmt) => format_stmt(stmt, depth, out),
        ItemKind::Error => line(out, depth, "<error>"),
    }
}

fn format_nominal(prefix: &str, keyword: &str, decl: &NominalDecl, depth: usize, out: &mut String) {
    line(
        out,
        depth,
        &format!(
            "{prefix}{keyword} {}{}{}{}",
            decl.name,
            format_generics(&decl.generics),
            format_inherits(&decl.inherits),
            format_where(&decl.where_clause),
        ),
    );
    for member in &decl.members {
        format_item(member, depth + 1, out);
    }
}

fn format_accessors(accessors: &Accessors, depth: usize, out: &mut String) {
    let named = |keyword: &str, body: &AccessorBody| match &body.param {
        Some(param) => format!("{keyword}({param})"),
        None => keyword.to_string(),
    };
    match accessors {
        Accessors::Stored => {}
        Accessors::Computed { get, set } => {
            line(out, depth, "get");
            format_block(get, depth + 1, out);
            if let Some(set) = set {
                line(out, depth, &named("set", set));
                format_block(&set.body, depth + 1, out);
            }
        }
        Accessors::Observed { will_set, did_set } => {
            if let Some(will_set) = will_set {
                line(out, depth, &named("willSet", will_set));
                format_block(&will_set.body, depth + 1, out);
            }
            if let Some(did_set) = did_set {
                line(out, depth, &named("didSet", did_set));
                format_block(&did_set.body, depth + 1, out);
            }
        }
        Accessors::Requirement { settable } => {
            line(out, depth, if *settable { "{ get set }" } else { "{ get }" });
        }
    }
}

fn format_block(block: &Block, depth: usize, out: &mut String) {
    for stmt in &block.stmts {
        format_stmt(stmt, depth, out);
    }
}

fn format_stmt(stmt: &Stmt, depth: usize, out: &mut String) {
    match &stmt.kind {
        StmtKind::Item(item) => format_item(item, depth, out),
        StmtKind::Expr(expr) => line(out, depth, &format_expr_compact(expr)),
        StmtKind::Return(Some(expr)) => {
            line(out, depth, &format!("return {}", format_expr_compact(expr)))
        }
        StmtKind::Return(None) => line(out, depth, "return"),
        StmtKind::Break => line(out, depth, "break"),
        StmtKind::Continue => line(out, depth, "continue"),
        StmtKind::Throw(expr) => line(out, depth, &format!("throw {}", format_expr_compact(expr))),
        StmtKind::Defer(body) => {
            line(out, depth, "defer");
            format_block(body, depth + 1, out);
        }
        StmtKind::If {
            conds,
            then_block,
            else_branch,
        } => {
            line(out, depth, &format!("if {}", format_conds(conds)));
            format_block(then_block, depth + 1, out);
            if let Some(else_branch) = else_branch {
                line(out, depth, "else");
                format_stmt(else_branch, depth + 1, out);
            }
        }
        StmtKind::Guard { conds, else_block } => {
            line(out, depth, &format!("guard {} else", format_conds(conds)));
            format_block(else_block, depth + 1, out);
        }
        StmtKind::While { conds, body } => {
            line(out, depth, &format!("while {}", format_conds(conds)));
            format_block(body, depth + 1, out);
        }
        StmtKind::ForIn { pattern, seq, body } => {
            line(
                out,
                depth,
                &format!(
                    "for {} in {}",
                    format_binding_pattern(pattern),
                    format_expr_compact(seq)
                ),
            );
            format_block(body, depth + 1, out);
        }
        StmtKind::Switch { subject, cases } => {
            line(out, depth, &format!("switch {}", format_expr_compact(subject)));
            for case in cases {
                let head = if case.patterns.is_empty() {
                    "default".to_string()
                } else {
                    let patterns = case
                        .patterns
                        .iter()
                        .map(format_pattern_compact)
                        .collect::<Vec<_>>();
                    format!("case {}", patterns.join(", "))
                };
                let guard = case
                    .guard
                    .as_ref()
                    .map(|guard| format!(" where {}", format_expr_compact(guard)))
                    .unwrap_or_default();
                line(out, depth + 1, &format!("{head}{guard}"));
                for stmt in &case.body {
                    format_stmt(stmt, depth + 2, out);
                }
            }
        }
        StmtKind::Do { body, catches } => {
            line(out, depth, "do");
            format_block(body, depth + 1, out);
            for catch in catches {
                match &catch.binding {
                    Some(name) => line(out, depth, &format!("catch let {name}")),
                    None => line(out, depth, "catch"),
                }
                format_block(&catch.body, depth + 1, out);
            }
        }
        StmtKind::Block(block) => {
            line(out, depth, "do");
            format_block(block, depth + 1, out);
        }
        StmtKind::Error => line(out, depth, "<error>"),
    }
}

fn format_conds(conds: &[Condition]) -> String {
    conds
        .iter()
        .map(|cond| match cond {
            Condition::Expr(expr) => format_expr_compact(expr),
            Condition::OptionalBinding {
                is_let,
                name,
                ty,
                init,
                ..
            } => {
                let ty = ty
                    .as_ref()
                    .map(|ty| format!(": {}", format_type_compact(ty)))
                    .unwrap_or_default();
                format!(
                    "{} {name}{ty} = {}",
                    if *is_let { "let" } else { "var" },
                    format_expr_compact(init)
                )
            }
            Condition::Case { pattern, init } => format!(
                "case {} = {}",
                format_pattern_compact(pattern),
                format_expr_compact(init)
            ),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_generics(generics: &[GenericParamDecl]) -> String {
    if generics.is_empty() {
        return String::new();
    }
    let params = generics
        .iter()
        .map(|param| {
            if param.bounds.is_empty() {
                param.name.clone()
            } else {
                let bounds = param.bounds.iter().map(format_type_compact).collect::<Vec<_>>();
                format!("{}: {}", param.name, bounds.join(" & "))
            }
        })
        .collect::<Vec<_>>();
    format!("<{}>", params.join(", "))
}

fn format_inherits(inherits: &[TypeExpr]) -> String {
    if inherits.is_empty() {
        return String::new();
    }
    let types = inherits.iter().map(format_type_compact).collect::<Vec<_>>();
    format!(": {}", types.join(", "))
}

fn format_where(reqs: &[WhereRequirement]) -> String {
    if reqs.is_empty() {
        return String::new();
    }
    let reqs = reqs
        .iter()
        .map(|req| match req {
            WhereRequirement::Conformance { subject, bounds } => {
                let bounds = bounds.iter().map(format_type_compact).collect::<Vec<_>>();
                format!("{}: {}", format_type_compact(subject), bounds.join(" & "))
            }
            WhereRequirement::SameType { lhs, rhs } => {
                format!("{} == {}", format_type_compact(lhs), format_type_compact(rhs))
            }
        })
        .collect::<Vec<_>>();
    format!(" where {}", reqs.join(", "))
}

fn format_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|param| {
            let mut text = String::new();
            match &param.label {
                Some(label) if *label == param.name => {}
                Some(label) => {
                    text.push_str(label);
                    text.push(' ');
                }
                None => text.push_str("_ "),
            }
            let _ = write!(text, "{}: ", param.name);
            if param.autoclosure {
                text.push_str("@autoclosure ");
            }
            if param.escaping {
                text.push_str("@escaping ");
            }
            if param.inout {
                text.push_str("inout ");
            }
            text.push_str(&format_type_compact(&param.ty));
            if param.variadic {
                text.push_str("...");
            }
            if let Some(default) = &param.default {
                let _ = write!(text, " = {}", format_expr_compact(default));
            }
            text
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_tuple_type(elems: &[TupleTypeElem]) -> String {
    let elems = elems
        .iter()
        .map(|elem| match &elem.label {
            Some(label) => format!("{label}: {}", format_type_compact(&elem.ty)),
            None => format_type_compact(&elem.ty),
        })
        .collect::<Vec<_>>();
    format!("({})", elems.join(", "))
}

pub fn format_type_compact(ty: &TypeExpr) -> String {
    match &ty.kind {
        TypeExprKind::Path(segments) => segments
            .iter()
            .map(|segment| {
                if segment.args.is_empty() {
                    segment.name.clone()
                } else {
                    let args = segment.args.iter().map(format_type_compact).collect::<Vec<_>>();
                    format!("{}<{}>", segment.name, args.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("."),
        TypeExprKind::SelfType => "Self".to_string(),
        TypeExprKind::Tuple(elems) => format_tuple_type(elems),
        TypeExprKind::Function {
            params,
            result,
            throws,
        } => {
            let params = params.iter().map(format_type_compact).collect::<Vec<_>>();
            format!(
                "({}){} -> {}",
                params.join(", "),
                if *throws { " throws" } else { "" },
                format_type_compact(result)
            )
        }
        TypeExprKind::Optional(inner) => format!("{}?", format_type_compact(inner)),
        TypeExprKind::Composition(parts) => parts
            .iter()
            .map(format_type_compact)
            .collect::<Vec<_>>()
            .join(" & "),
        TypeExprKind::Metatype(inner) => format!("{}.Type", format_type_compact(inner)),
        TypeExprKind::InOut(inner) => format!("inout {}", format_type_compact(inner)),
        TypeExprKind::Error => "<error>".to_string(),
    }
}

/// Pattern after `let`/`var`/`for`, where bindings are bare names.
fn format_binding_pattern(pattern: &Pattern) -> String {
    match &pattern.kind {
        PatternKind::Binding { name, .. } => name.clone(),
        PatternKind::Tuple(elems) => {
            let elems = elems.iter().map(format_binding_pattern).collect::<Vec<_>>();
            format!("({})", elems.join(", "))
        }
        _ => format_pattern_compact(pattern),
    }
}

pub fn format_pattern_compact(pattern: &Pattern) -> String {
    match &pattern.kind {
        PatternKind::Wildcard => "_".to_string(),
        PatternKind::Binding { name, is_let } => {
            format!("{} {name}", if *is_let { "let" } else { "var" })
        }
        PatternKind::Tuple(elems) => {
            let elems = elems.iter().map(format_pattern_compact).collect::<Vec<_>>();
            format!("({})", elems.join(", "))
        }
        PatternKind::EnumCase {
            parent,
            name,
            payload,
        } => {
            let parent = parent.as_ref().map(format_type_compact).unwrap_or_default();
            let payload = payload
                .as_ref()
                .map(|payload| {
                    let elems = payload.iter().map(format_pattern_compact).collect::<Vec<_>>();
                    format!("({})", elems.join(", "))
                })
                .unwrap_or_default();
            format!("{parent}.{name}{payload}")
        }
        PatternKind::OptionalSome(inner) => format!("{}?", format_pattern_compact(inner)),
        PatternKind::Expr(expr) => format_expr_compact(expr),
        PatternKind::CodeCompletion => "<complete>".to_string(),
        PatternKind::Error => "<error>".to_string(),
    }
}

fn format_args(args: &[Arg]) -> String {
    args.iter()
        .map(|arg| match &arg.label {
            Some(label) => format!("{label}: {}", format_expr_compact(&arg.expr)),
            None => format_expr_compact(&arg.expr),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_expr_compact(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntLit(value) => value.to_string(),
        ExprKind::FloatLit(text) => text.clone(),
        ExprKind::StringLit(text) => format!("{text:?}"),
        ExprKind::BoolLit(value) => value.to_string(),
        ExprKind::NilLit => "nil".to_string(),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::SelfRef => "self".to_string(),
        ExprKind::SuperRef => "super".to_string(),
        ExprKind::Member { base, name, .. } => format!("{}.{name}", format_expr_compact(base)),
        ExprKind::ImplicitMember(name) => format!(".{name}"),
        ExprKind::TupleIndex { base, index } => format!("{}.{index}", format_expr_compact(base)),
        ExprKind::Call { callee, args } => {
            format!("{}({})", format_expr_compact(callee), format_args(args))
        }
        ExprKind::Subscript { base, args } => {
            format!("{}[{}]", format_expr_compact(base), format_args(args))
        }
        ExprKind::Closure(closure) => {
            let params = closure
                .params
                .iter()
                .map(|param| match &param.ty {
                    Some(ty) => format!("{}: {}", param.name, format_type_compact(ty)),
                    None => param.name.clone(),
                })
                .collect::<Vec<_>>();
            format!(
                "{{ ({}) in <{} stmts> }}",
                params.join(", "),
                closure.body.stmts.len()
            )
        }
        ExprKind::Unary { op, operand } => {
            let op = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("({op}{})", format_expr_compact(operand))
        }
        ExprKind::Binary { op, lhs, rhs } => format!(
            "({} {} {})",
            format_expr_compact(lhs),
            op.func_name(),
            format_expr_compact(rhs)
        ),
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => format!(
            "({} ? {} : {})",
            format_expr_compact(cond),
            format_expr_compact(then_expr),
            format_expr_compact(else_expr)
        ),
        ExprKind::Assign { op, lhs, rhs } => {
            let op = match op {
                AssignOp::Assign => "=",
                AssignOp::Add => "+=",
                AssignOp::Sub => "-=",
                AssignOp::Mul => "*=",
            };
            format!("{} {op} {}", format_expr_compact(lhs), format_expr_compact(rhs))
        }
        ExprKind::ForceUnwrap(inner) => format!("{}!", format_expr_compact(inner)),
        ExprKind::BindOptional(inner) => format!("{}?", format_expr_compact(inner)),
        ExprKind::OptionalEval(inner) => format_expr_compact(inner),
        ExprKind::Paren(inner) => format!("({})", format_expr_compact(inner)),
        ExprKind::Tuple(elems) => {
            let elems = elems
                .iter()
                .map(|elem| match &elem.label {
                    Some(label) => format!("{label}: {}", format_expr_compact(&elem.expr)),
                    None => format_expr_compact(&elem.expr),
                })
                .collect::<Vec<_>>();
            format!("({})", elems.join(", "))
        }
        ExprKind::Try { kind, expr } => {
            let keyword = match kind {
                TryKind::Plain => "try",
                TryKind::Optional => "try?",
                TryKind::Force => "try!",
            };
            format!("{keyword} {}", format_expr_compact(expr))
        }
        ExprKind::As { expr, ty } => {
            format!("({} as {})", format_expr_compact(expr), format_type_compact(ty))
        }
        ExprKind::InOut(inner) => format!("&{}", format_expr_compact(inner)),
        ExprKind::CodeCompletion => "<complete>".to_string(),
        ExprKind::MemberCompletion(base) => format!("{}.<complete>", format_expr_compact(base)),
        ExprKind::ImplicitMemberCompletion => ".<complete>".to_string(),
        ExprKind::Error => "<error>".to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/tree/t_format.rs"]
mod tests;
