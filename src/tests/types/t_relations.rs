use super::*;
use crate::core::parse::parse_source;
use crate::core::session::{CheckedModule, CompilationSession, CompilerOptions};
use crate::core::types::{FnParam, Type};
use indoc::indoc;

fn prelude() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

fn check(session: &CompilationSession, source: &str) -> CheckedModule {
    let parsed = parse_source(source, session.id_gen());
    let checked = session.check("main", parsed, None);
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    checked
}

fn declared(checked: &CheckedModule, session: &CompilationSession, name: &str) -> Type {
    let decl = checked
        .module
        .decls
        .iter()
        .find(|decl| decl.name == name)
        .map(|decl| decl.id)
        .unwrap_or_else(|| panic!("no declaration named {name}"));
    session.view_with(&checked.module).declared_type(decl)
}

#[test]
fn test_identical_and_unrelated_builtins() {
    let session = prelude();
    let set = session.view();
    assert_eq!(
        type_relation(&set, &set.int_type(), &set.int_type()),
        TypeRelation::Identical
    );
    assert_eq!(
        type_relation(&set, &set.int_type(), &set.string_type()),
        TypeRelation::Unrelated
    );
}

#[test]
fn test_optional_promotion_is_convertible() {
    let session = prelude();
    let set = session.view();
    let int = set.int_type();
    assert_eq!(
        type_relation(&set, &int, &Type::optional(int.clone())),
        TypeRelation::Convertible
    );
    assert_eq!(
        type_relation(&set, &Type::optional(int.clone()), &int),
        TypeRelation::Unrelated
    );
}

#[test]
fn test_void_is_invalid_for_non_void_context() {
    let session = prelude();
    let set = session.view();
    assert_eq!(
        type_relation(&set, &Type::void(), &set.int_type()),
        TypeRelation::Invalid
    );
    assert_eq!(
        type_relation(&set, &Type::void(), &Type::void()),
        TypeRelation::Identical
    );
}

#[test]
fn test_error_types_are_unknown() {
    let session = prelude();
    let set = session.view();
    assert_eq!(
        type_relation(&set, &Type::Error, &set.int_type()),
        TypeRelation::Unknown
    );
    let fn_ty = Type::function(vec![FnParam::plain(Type::Error)], set.int_type(), false);
    assert_eq!(
        type_relation(&set, &set.int_type(), &fn_ty),
        TypeRelation::Unknown
    );
}

#[test]
fn test_any_accepts_everything() {
    let session = prelude();
    let set = session.view();
    assert!(is_convertible(&set, &set.bool_type(), &Type::any()));
    assert!(!is_convertible(&set, &set.bool_type(), &Type::AnyObject));
}

#[test]
fn test_class_upcast_and_anyobject() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            class Animal {}
            class Dog: Animal {}
            struct Rock {}
        "},
    );
    let set = session.view_with(&checked.module);
    let animal = declared(&checked, &session, "Animal");
    let dog = declared(&checked, &session, "Dog");
    let rock = declared(&checked, &session, "Rock");
    assert_eq!(type_relation(&set, &dog, &animal), TypeRelation::Convertible);
    assert_eq!(type_relation(&set, &animal, &dog), TypeRelation::Unrelated);
    assert!(is_convertible(&set, &dog, &Type::AnyObject));
    assert!(!is_convertible(&set, &rock, &Type::AnyObject));
    assert_eq!(
        type_relation(&set, &dog, &Type::optional(animal)),
        TypeRelation::Convertible
    );
}

#[test]
fn test_existential_conformance() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Shape {}
            protocol Polygon: Shape {}
            struct Square: Polygon {}
            struct Line {}
        "},
    );
    let set = session.view_with(&checked.module);
    let id = |name: &str| {
        checked
            .module
            .decls
            .iter()
            .find(|decl| decl.name == name)
            .map(|decl| decl.id)
            .expect("declared")
    };
    let shape = Type::Existential(vec![id("Shape")]);
    let polygon = Type::Existential(vec![id("Polygon")]);
    assert!(is_convertible(&set, &declared(&checked, &session, "Square"), &shape));
    assert!(!is_convertible(&set, &declared(&checked, &session, "Line"), &shape));
    assert!(is_convertible(&set, &polygon, &shape));
    assert!(!is_convertible(&set, &shape, &polygon));
}
