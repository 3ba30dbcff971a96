use super::*;
use crate::core::session::{CompilationSession, CompilerOptions};
use crate::core::types::{FnParam, TupleElem};

fn session() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

#[test]
fn test_unify_var_with_concrete() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let var = vars.fresh(VarOrigin::Placeholder);
    assert!(vars.unify(&set, &var, &set.int_type()));
    assert_eq!(vars.resolve(&var), set.int_type());
}

#[test]
fn test_unify_var_with_var_links() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let a = vars.fresh(VarOrigin::Placeholder);
    let b = vars.fresh(VarOrigin::Placeholder);
    assert!(vars.unify(&set, &a, &b));
    assert!(vars.unify(&set, &b, &set.string_type()));
    assert_eq!(vars.resolve(&a), set.string_type());
}

#[test]
fn test_unify_occurs_check() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let var = vars.fresh(VarOrigin::Placeholder);
    let wrapped = Type::optional(var.clone());
    assert!(!vars.unify(&set, &var, &wrapped));
}

#[test]
fn test_unify_structural_function_types() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let param = vars.fresh(VarOrigin::Placeholder);
    let result = vars.fresh(VarOrigin::Placeholder);
    let pattern = Type::function(vec![FnParam::plain(param.clone())], result.clone(), false);
    let concrete = Type::function(
        vec![FnParam::plain(set.int_type())],
        set.bool_type(),
        false,
    );
    assert!(vars.unify(&set, &pattern, &concrete));
    assert_eq!(vars.resolve(&param), set.int_type());
    assert_eq!(vars.resolve(&result), set.bool_type());
}

#[test]
fn test_unify_rejects_throws_mismatch() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let plain = Type::function(Vec::new(), Type::void(), false);
    let throwing = Type::function(Vec::new(), Type::void(), true);
    assert!(!vars.unify(&set, &plain, &throwing));
}

#[test]
fn test_unify_tuple_labels_must_agree() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let labeled = |label: &str| {
        Type::Tuple(vec![TupleElem {
            label: Some(label.to_string()),
            ty: set.int_type(),
        }, TupleElem::unlabeled(set.int_type())])
    };
    assert!(vars.unify(&set, &labeled("a"), &labeled("a")));
    assert!(!vars.unify(&set, &labeled("a"), &labeled("b")));
    let unlabeled = Type::Tuple(vec![
        TupleElem::unlabeled(set.int_type()),
        TupleElem::unlabeled(set.int_type()),
    ]);
    assert!(vars.unify(&set, &labeled("a"), &unlabeled));
}

#[test]
fn test_integer_literal_var_rejects_non_conforming_type() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let lit = vars.fresh(VarOrigin::Literal(LiteralKind::Integer));
    assert!(!vars.unify(&set, &lit, &set.bool_type()));
    assert!(vars.unify(&set, &lit, &set.double_type()));
    assert_eq!(vars.resolve(&lit), set.double_type());
}

#[test]
fn test_integer_and_float_literals_merge_to_float() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let int_lit = vars.fresh(VarOrigin::Literal(LiteralKind::Integer));
    let float_lit = vars.fresh(VarOrigin::Literal(LiteralKind::Float));
    assert!(vars.unify(&set, &int_lit, &float_lit));
    vars.default_literals(&set, 0);
    assert_eq!(vars.resolve(&int_lit), set.double_type());
}

#[test]
fn test_string_and_integer_literals_do_not_merge() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let int_lit = vars.fresh(VarOrigin::Literal(LiteralKind::Integer));
    let string_lit = vars.fresh(VarOrigin::Literal(LiteralKind::String));
    assert!(!vars.unify(&set, &int_lit, &string_lit));
}

#[test]
fn test_default_literals_uses_literal_type_aliases() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let int_lit = vars.fresh(VarOrigin::Literal(LiteralKind::Integer));
    let string_lit = vars.fresh(VarOrigin::Literal(LiteralKind::String));
    let other = vars.fresh(VarOrigin::ClosureResult);
    vars.default_literals(&set, 0);
    assert_eq!(vars.resolve(&int_lit), set.int_type());
    assert_eq!(vars.resolve(&string_lit), set.string_type());
    assert!(vars.resolve(&other).is_var());
    vars.poison_unbound(0);
    assert!(vars.resolve(&other).is_error());
}

#[test]
fn test_snapshot_by_clone_is_independent() {
    let session = session();
    let set = session.view();
    let mut vars = TypeVars::new();
    let var = vars.fresh(VarOrigin::Placeholder);
    let mut trial = vars.clone();
    assert!(trial.unify(&set, &var, &set.int_type()));
    assert!(vars.resolve(&var).is_var());
    assert_eq!(vars.origin(TypeVarId(0)), Some(VarOrigin::Placeholder));
}
