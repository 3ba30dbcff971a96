use super::{FnType, Type};
use crate::core::resolve::DeclId;

/// Source of declaration names for rendering.
pub trait DeclNames {
    fn decl_name(&self, id: DeclId) -> &str;
}

pub fn render_type(ty: &Type, names: &dyn DeclNames) -> String {
    match ty {
        Type::Nominal { decl, args } => {
            let name = names.decl_name(*decl);
            if args.is_empty() {
                name.to_string()
            } else {
                let args = args
                    .iter()
                    .map(|arg| render_type(arg, names))
                    .collect::<Vec<_>>();
                format!("{name}<{}>", args.join(", "))
            }
        }
        Type::Tuple(elems) if elems.is_empty() => "Void".to_string(),
        Type::Tuple(elems) => {
            let elems = elems
                .iter()
                .map(|elem| match &elem.label {
                    Some(label) => format!("{label}: {}", render_type(&elem.ty, names)),
                    None => render_type(&elem.ty, names),
                })
                .collect::<Vec<_>>();
            format!("({})", elems.join(", "))
        }
        Type::Function(fn_ty) => render_fn_type(fn_ty, names),
        Type::Optional(inner) => {
            let inner_text = render_type(inner, names);
            if needs_parens_for_postfix(inner) {
                format!("({inner_text})?")
            } else {
                format!("{inner_text}?")
            }
        }
        Type::Existential(protos) if protos.is_empty() => "Any".to_string(),
        Type::Existential(protos) => protos
            .iter()
            .map(|proto| names.decl_name(*proto).to_string())
            .collect::<Vec<_>>()
            .join(" & "),
        Type::AnyObject => "AnyObject".to_string(),
        Type::Metatype(inner) => {
            let inner_text = render_type(inner, names);
            if needs_parens_for_postfix(inner) {
                format!("({inner_text}).Type")
            } else {
                format!("{inner_text}.Type")
            }
        }
        Type::GenericParam(param) => names.decl_name(*param).to_string(),
        Type::DependentMember { base, assoc } => {
            format!("{}.{}", render_type(base, names), names.decl_name(*assoc))
        }
        Type::Var(var) => format!("$T{}", var.0),
        Type::InOut(inner) => format!("inout {}", render_type(inner, names)),
        Type::Error => "<<error type>>".to_string(),
    }
}

fn needs_parens_for_postfix(ty: &Type) -> bool {
    matches!(ty, Type::Function(_) | Type::InOut(_))
        || matches!(ty, Type::Existential(protos) if protos.len() > 1)
}

fn render_fn_type(fn_ty: &FnType, names: &dyn DeclNames) -> String {
    let params = fn_ty
        .params
        .iter()
        .map(|param| {
            let mut text = String::new();
            if param.inout {
                text.push_str("inout ");
            }
            if param.autoclosure {
                text.push_str("@autoclosure ");
            }
            text.push_str(&render_type(param.ty.without_inout(), names));
            if param.variadic {
                text.push_str("...");
            }
            text
        })
        .collect::<Vec<_>>();
    let throws = if fn_ty.throws { " throws" } else { "" };
    format!(
        "({}){throws} -> {}",
        params.join(", "),
        render_type(&fn_ty.result, names)
    )
}
