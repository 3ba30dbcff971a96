use super::*;
use crate::core::diag::CompileError;
use crate::core::parse::parse_source;
use crate::core::session::{CheckedModule, CompilationSession, CompilerOptions};
use indoc::indoc;

fn prelude() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

fn check(session: &CompilationSession, source: &str) -> CheckedModule {
    let parsed = parse_source(source, session.id_gen());
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    session.check("main", parsed, None)
}

fn conformance_errors(checked: &CheckedModule) -> Vec<ConformanceErrorKind> {
    checked
        .errors
        .iter()
        .filter_map(|err| match err {
            CompileError::Conformance(err) => Some(err.kind().clone()),
            _ => None,
        })
        .collect()
}

fn decl_named(module: &LoadedModule, name: &str) -> DeclId {
    module
        .decls
        .iter()
        .find(|decl| decl.name == name)
        .map(|decl| decl.id)
        .unwrap_or_else(|| panic!("no declaration named {name}"))
}

/// Member `name` declared directly inside `owner`.
fn member_named(module: &LoadedModule, owner: DeclId, name: &str) -> DeclId {
    module
        .decls
        .iter()
        .find(|decl| decl.name == name && decl.parent == Some(owner))
        .map(|decl| decl.id)
        .unwrap_or_else(|| panic!("no member named {name}"))
}

fn conformance<'m>(module: &'m LoadedModule, ty: &str, protocol: &str) -> &'m Conformance {
    let ty = decl_named(module, ty);
    let protocol = decl_named(module, protocol);
    module
        .conformances
        .iter()
        .find(|c| c.ty_decl == ty && c.protocol == protocol)
        .expect("conformance exists")
}

#[test]
fn test_direct_witness() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol P { func f() -> Int }
            struct S: P { func f() -> Int { return 1 } }
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let record = conformance(module, "S", "P");
    assert_eq!(record.origin, ConformanceOrigin::Declared);
    let requirement = member_named(module, decl_named(module, "P"), "f");
    let witness = member_named(module, decl_named(module, "S"), "f");
    assert_eq!(record.witness(requirement), Some(Witness::Direct(witness)));
}

#[test]
fn test_missing_witness_is_reported() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol P { func f(x: Int) -> Int }
            struct T: P { func f(y: Int) -> Int { return y } }
        "},
    );
    assert_eq!(
        conformance_errors(&checked),
        vec![ConformanceErrorKind::MissingWitness {
            ty: "T".to_string(),
            protocol: "P".to_string(),
            requirement: "f(x:)".to_string(),
        }]
    );
}

#[test]
fn test_default_witness_from_protocol_extension() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol P { func f() -> Int }
            extension P { func f() -> Int { return 0 } }
            struct U: P {}
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let requirement = member_named(module, decl_named(module, "P"), "f");
    let record = conformance(module, "U", "P");
    assert!(matches!(record.witness(requirement), Some(Witness::Default(_))));
}

#[test]
fn test_inherited_witness_from_superclass() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol P { func f() -> Int }
            class Base { func f() -> Int { return 1 } }
            class Derived: Base, P {}
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let requirement = member_named(module, decl_named(module, "P"), "f");
    let base_f = member_named(module, decl_named(module, "Base"), "f");
    let record = conformance(module, "Derived", "P");
    assert_eq!(record.witness(requirement), Some(Witness::Inherited(base_f)));
}

#[test]
fn test_assoc_type_inferred_from_witness_signature() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Source {
                associatedtype Element
                func next() -> Element
            }
            struct Counter: Source { func next() -> Int { return 1 } }
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let element = member_named(module, decl_named(module, "Source"), "Element");
    let record = conformance(module, "Counter", "Source");
    let set = session.view_with(module);
    assert_eq!(record.assoc_type(element), Some(&set.int_type()));
}

#[test]
fn test_assoc_type_from_typealias_and_default() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Container {
                associatedtype Item
                associatedtype Index = Int
            }
            struct Bag: Container { typealias Item = String }
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let proto = decl_named(module, "Container");
    let record = conformance(module, "Bag", "Container");
    let set = session.view_with(module);
    assert_eq!(
        record.assoc_type(member_named(module, proto, "Item")),
        Some(&set.string_type())
    );
    assert_eq!(
        record.assoc_type(member_named(module, proto, "Index")),
        Some(&set.int_type())
    );
}

#[test]
fn test_unresolved_assoc_type() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol R { associatedtype A }
            struct X: R {}
        "},
    );
    assert_eq!(
        conformance_errors(&checked),
        vec![ConformanceErrorKind::UnresolvedAssocType {
            ty: "X".to_string(),
            protocol: "R".to_string(),
            assoc: "A".to_string(),
        }]
    );
}

#[test]
fn test_refined_protocol_implies_conformance() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Named {}
            protocol Titled: Named {}
            struct Book: Titled {}
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    assert_eq!(module.conformances.len(), 2);
    assert_eq!(
        conformance(module, "Book", "Named").origin,
        ConformanceOrigin::Implied {
            by: decl_named(module, "Titled")
        }
    );
    let set = session.view_with(module);
    let book = set.declared_type(decl_named(module, "Book"));
    assert!(set.conforms(&book, decl_named(module, "Named")));
}

#[test]
fn test_redundant_conformance() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol P {}
            struct Z: P {}
            extension Z: P {}
        "},
    );
    assert_eq!(
        conformance_errors(&checked),
        vec![ConformanceErrorKind::Redundant {
            ty: "Z".to_string(),
            protocol: "P".to_string(),
        }]
    );
}

#[test]
fn test_assoc_conformance_points_at_concrete_table() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Keyed {
                associatedtype Key: Hashable
                func key() -> Key
            }
            struct Entry: Keyed { func key() -> Int { return 0 } }
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let key = member_named(module, decl_named(module, "Keyed"), "Key");
    let set = session.view_with(module);
    let hashable = decl_named(&session.modules()[0], "Hashable");
    let int = set.known().int.expect("Int is known");
    let expected = set.conformance(int, hashable).expect("Int: Hashable").id;

    let record = conformance(module, "Entry", "Keyed");
    assert_eq!(
        record.assoc_conformance(&[key], hashable),
        Some(ConformanceRef::Indirect(expected))
    );
}

#[test]
fn test_assoc_non_conformance() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Keyed {
                associatedtype Key: Hashable
                func key() -> Key
            }
            struct Plain {}
            struct Entry: Keyed { func key() -> Plain { return Plain() } }
        "},
    );
    assert_eq!(
        conformance_errors(&checked),
        vec![ConformanceErrorKind::AssocNonConformance {
            ty: "Entry".to_string(),
            protocol: "Keyed".to_string(),
            path: "Key".to_string(),
            bound: "Hashable".to_string(),
        }]
    );
}

#[test]
fn test_assoc_conformance_through_nested_path() {
    let session = prelude();
    let checked = check(
        &session,
        indoc! {"
            protocol Q {}
            protocol P2 { associatedtype AssocP2 }
            protocol P3 {
                associatedtype AssocP3: P2 where AssocP3.AssocP2: Q
            }
            struct Leaf: Q {}
            struct Inner: P2 { typealias AssocP2 = Leaf }
            struct Outer: P3 { typealias AssocP3 = Inner }
        "},
    );
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let module = &checked.module;
    let assoc_p3 = member_named(module, decl_named(module, "P3"), "AssocP3");
    let assoc_p2 = member_named(module, decl_named(module, "P2"), "AssocP2");
    let p2 = decl_named(module, "P2");
    let q = decl_named(module, "Q");

    let outer = conformance(module, "Outer", "P3");
    let inner = conformance(module, "Inner", "P2");
    let leaf = conformance(module, "Leaf", "Q");
    assert_eq!(
        outer.assoc_conformance(&[assoc_p3], p2),
        Some(ConformanceRef::Indirect(inner.id))
    );
    assert_eq!(
        outer.assoc_conformance(&[assoc_p3, assoc_p2], q),
        Some(ConformanceRef::Indirect(leaf.id))
    );
}
