use super::*;
use crate::core::parse::parse_source;
use crate::core::session::{CompilationSession, CompilerOptions};
use indoc::indoc;

const SOURCE: &str = indoc! {"
    class A {
        func foo(_ x: Int) -> Int { return x }
        var v: Int = 0
        static func s() {}
    }
    class B {
        func foo(_ x: Int) -> Int { return x }
        func bar() {}
    }
    struct S {
        func baz() {}
    }
"};

fn names(set: &ModuleSet<'_>, found: &[MemberCandidate]) -> Vec<String> {
    found
        .iter()
        .map(|candidate| set.decl(candidate.decl).name.clone())
        .collect()
}

#[test]
fn test_dynamic_lookup_collects_class_instance_members() {
    let session = CompilationSession::new(CompilerOptions::default()).expect("prelude loads");
    let checked = session.check("main", parse_source(SOURCE, session.id_gen()), None);
    assert!(!checked.has_errors(), "{:?}", checked.errors);
    let set = session.view_with(&checked.module);

    let found = dynamic_lookup(&set, None);
    // `B.foo` has the same signature as `A.foo` and collapses into it.
    assert_eq!(names(&set, &found), vec!["foo", "v", "bar"]);
    assert!(
        found
            .iter()
            .all(|candidate| candidate.origin == LookupOrigin::Dynamic)
    );
}

#[test]
fn test_dynamic_lookup_by_name() {
    let session = CompilationSession::new(CompilerOptions::default()).expect("prelude loads");
    let checked = session.check("main", parse_source(SOURCE, session.id_gen()), None);
    let set = session.view_with(&checked.module);

    let found = dynamic_lookup(&set, Some("bar"));
    assert_eq!(found.len(), 1);
    let class_b = checked
        .module
        .decls
        .iter()
        .find(|decl| decl.name == "B")
        .map(|decl| decl.id)
        .expect("class B");
    assert_eq!(found[0].base, set.declared_type(class_b));
    assert!(dynamic_lookup(&set, Some("baz")).is_empty());
}

#[test]
fn test_dynamic_lookup_follows_module_load_order() {
    let mut session = CompilationSession::new(CompilerOptions::default()).expect("prelude loads");
    let lib = parse_source("class L { func zed() {} }", session.id_gen());
    session.load_module("Lib", lib).expect("library loads");
    let checked = session.check("main", parse_source("class M { func alpha() {} }", session.id_gen()), None);
    let set = session.view_with(&checked.module);
    assert_eq!(names(&set, &dynamic_lookup(&set, None)), vec!["zed", "alpha"]);
}
