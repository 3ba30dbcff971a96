use super::*;
use crate::core::parse::parse_source;
use crate::core::session::{CompilationSession, CompilerOptions};
use crate::core::types::{Type, render_type};
use indoc::indoc;

fn prelude() -> CompilationSession {
    CompilationSession::new(CompilerOptions::default()).expect("prelude loads")
}

fn collect(session: &CompilationSession, source: &str) -> (LoadedModule, Vec<ResolveError>) {
    let parsed = parse_source(source, session.id_gen());
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    let deps = session.modules().iter().collect::<Vec<_>>();
    collect_module(&deps, session.next_module_id(), "main", &parsed.file)
}

fn named<'m>(module: &'m LoadedModule, name: &str) -> &'m Decl {
    module
        .decls
        .iter()
        .find(|decl| decl.name == name)
        .unwrap_or_else(|| panic!("no declaration named {name}"))
}

#[test]
fn test_collect_struct_members_and_memberwise_init() {
    let session = prelude();
    let (module, errors) = collect(
        &session,
        indoc! {"
            struct Point {
                var x: Int
                let y: Int = 0
                var z = 1.5
                func norm() -> Int { return x }
            }
        "},
    );
    assert!(errors.is_empty(), "{errors:?}");
    let point = named(&module, "Point");
    let info = point.nominal_info().expect("struct info");
    assert_eq!(info.stored.len(), 3);

    let inits = info
        .members
        .iter()
        .map(|id| module.decl(*id))
        .filter(|decl| matches!(decl.kind, DeclKind::Constructor { .. }))
        .collect::<Vec<_>>();
    assert_eq!(inits.len(), 1);
    assert!(inits[0].is_implicit);
    // `let` properties with an initial value are not memberwise parameters.
    assert_eq!(inits[0].full_name(), "init(x:z:)");
}

#[test]
fn test_collect_all_initialized_struct_gets_empty_init() {
    let session = prelude();
    let (module, _) = collect(&session, "struct S { var a = 1 }");
    let names = named(&module, "S")
        .nominal_info()
        .map(|info| {
            info.members
                .iter()
                .map(|id| module.decl(*id))
                .filter(|decl| matches!(decl.kind, DeclKind::Constructor { .. }))
                .map(Decl::full_name)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    assert_eq!(names, vec!["init()", "init(a:)"]);
}

#[test]
fn test_collect_explicit_init_suppresses_implicit_ones() {
    let session = prelude();
    let (module, _) = collect(&session, "struct S { var a: Int\n init() { a = 0 } }");
    let ctors = module
        .decls
        .iter()
        .filter(|decl| matches!(decl.kind, DeclKind::Constructor { .. }))
        .collect::<Vec<_>>();
    assert_eq!(ctors.len(), 1);
    assert!(!ctors[0].is_implicit);
}

#[test]
fn test_collect_enum_elements_are_indexed() {
    let session = prelude();
    let (module, errors) = collect(&session, "enum E { case a, b(Int)\n case c(x: Int, y: Int) }");
    assert!(errors.is_empty(), "{errors:?}");
    let indices = ["a", "b", "c"].map(|name| match &named(&module, name).kind {
        DeclKind::EnumElement { index, .. } => *index,
        other => panic!("expected element, found {other:?}"),
    });
    assert_eq!(indices, [0, 1, 2]);
    let DeclKind::EnumElement {
        payload: Some(payload),
        ..
    } = &named(&module, "c").kind
    else {
        panic!("expected payload");
    };
    assert_eq!(payload[0].label.as_deref(), Some("x"));
}

#[test]
fn test_collect_extension_binds_to_nominal() {
    let session = prelude();
    let (module, errors) = collect(
        &session,
        indoc! {"
            struct S {}
            extension S {
                func f() {}
            }
        "},
    );
    assert!(errors.is_empty(), "{errors:?}");
    let s = named(&module, "S").id;
    let ext = module
        .decls
        .iter()
        .find(|decl| matches!(decl.kind, DeclKind::Extension(_)))
        .expect("extension");
    let DeclKind::Extension(info) = &ext.kind else {
        unreachable!()
    };
    assert_eq!(info.extended, Some(s));
    assert_eq!(info.members.len(), 1);
}

#[test]
fn test_collect_extension_of_prelude_type() {
    let session = prelude();
    let (module, errors) = collect(&session, "extension Int { func twice() -> Int { return self } }");
    assert!(errors.is_empty(), "{errors:?}");
    let set = {
        let mut modules = session.modules().iter().collect::<Vec<_>>();
        modules.push(&module);
        ModuleSet::new(modules)
    };
    let int = set.known().int.expect("Int");
    let members = set
        .all_members(int)
        .into_iter()
        .map(|id| set.decl(id).name.clone())
        .collect::<Vec<_>>();
    assert!(members.contains(&"twice".to_string()), "{members:?}");
}

#[test]
fn test_collect_protocol_has_implicit_self_and_assoc_types() {
    let session = prelude();
    let (module, errors) = collect(
        &session,
        indoc! {"
            protocol Container {
                associatedtype Item
                func get() -> Item
            }
        "},
    );
    assert!(errors.is_empty(), "{errors:?}");
    let DeclKind::Protocol(info) = &named(&module, "Container").kind else {
        panic!("expected protocol");
    };
    assert_eq!(info.assoc_types.len(), 1);
    assert!(module.decl(info.self_param).is_implicit);
    assert_eq!(module.decl(info.self_param).name, "Self");
}

#[test]
fn test_collect_resolves_signature_types() {
    let session = prelude();
    let (module, errors) = collect(&session, "func f(_ a: Int, b: String?) -> (Int, Bool) { return (a, true) }");
    assert!(errors.is_empty(), "{errors:?}");
    let mut modules = session.modules().iter().collect::<Vec<_>>();
    modules.push(&module);
    let set = ModuleSet::new(modules);
    let sig = named(&module, "f").func_sig().expect("signature").clone();
    assert_eq!(render_type(&sig.fn_type(), &set), "(Int, String?) -> (Int, Bool)");
    assert_eq!(named(&module, "f").full_name(), "f(_:b:)");
}

#[test]
fn test_collect_reports_unknown_type() {
    let session = prelude();
    let (module, errors) = collect(&session, "func f(a: Missing) {}");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind(),
        &ResolveErrorKind::UnknownType("Missing".to_string())
    );
    let sig = named(&module, "f").func_sig().expect("signature");
    assert_eq!(sig.params[0].ty, Type::Error);
}

#[test]
fn test_collect_reports_type_redeclaration() {
    let session = prelude();
    let (_, errors) = collect(&session, "struct A {}\nclass A {}");
    assert!(
        errors
            .iter()
            .any(|err| err.kind() == &ResolveErrorKind::Redeclaration("A".to_string()))
    );
}

#[test]
fn test_collect_records_availability_attributes() {
    let session = prelude();
    let (module, _) = collect(
        &session,
        indoc! {"
            @available(*, deprecated) func old() {}
            @available(*, unavailable) func gone() {}
        "},
    );
    assert!(named(&module, "old").attrs.deprecated);
    assert!(named(&module, "gone").attrs.unavailable);
}

#[test]
fn test_binding_names_walks_tuples() {
    let parsed = parse_source("let (a, (b, _)) = (1, (2, 3))", crate::core::tree::NodeIdGen::new());
    let crate::core::tree::ItemKind::Var(var) = &parsed.file.items[0].kind else {
        panic!("expected var");
    };
    let mut names = Vec::new();
    binding_names(&var.pattern, &mut names);
    let names = names.into_iter().map(|(name, _)| name).collect::<Vec<_>>();
    assert_eq!(names, vec!["a", "b"]);
}
