use super::*;
use crate::core::ir::{
    Block, FunctionKind, InstKind, IrFunction, IrType, Terminator, WitnessEntry, format_module,
};
use crate::core::parse::parse_source;
use crate::core::session::{CompilationSession, CompilerOptions};
use indoc::indoc;

/// Checks, lowers and verifies `source` as module `main`.
fn lower(source: &str) -> IrModule {
    let session = CompilationSession::new(CompilerOptions::default()).expect("prelude loads");
    let parsed = parse_source(source, session.id_gen());
    let checked = session.check("main", parsed, None);
    assert!(checked.errors.is_empty(), "{:?}", checked.errors);
    let set = session.view_with(&checked.module);
    lower_module(&set, &checked.parsed.file, &checked.tables, session.options())
        .unwrap_or_else(|errors| panic!("lowering failed: {errors:?}"))
}

fn function<'m>(module: &'m IrModule, name: &str) -> &'m IrFunction {
    module.function(name).unwrap_or_else(|| {
        panic!(
            "no function @{name}; have {:?}",
            module.functions.keys().collect::<Vec<_>>()
        )
    })
}

fn insts(func: &IrFunction) -> impl Iterator<Item = &InstKind> {
    func.blocks
        .iter()
        .flat_map(|block| block.insts.iter().map(|inst| &inst.kind))
}

/// Asserts that every fragment occurs in the printed IR, in order.
fn assert_ir_contains(ir: &str, fragments: &[&str]) {
    let mut rest = ir;
    for fragment in fragments {
        match rest.find(fragment) {
            Some(at) => rest = &rest[at + fragment.len()..],
            None => panic!("`{fragment}` not found in order in:\n{ir}"),
        }
    }
}

#[test]
fn test_trivial_function_uses_builtins() {
    let module = lower("func add(_ a: Int, _ b: Int) -> Int { return a + b }");
    let add = function(&module, "add(_:_:)");
    assert_eq!(add.sig.render(), "(@trivial Int, @trivial Int) -> Int");
    assert!(insts(add).any(|inst| matches!(inst, InstKind::Builtin { name, .. } if name == "int_add")));
    assert!(module.function("main").is_some());
}

#[test]
fn test_module_text_starts_with_stage_header() {
    let module = lower("func f() {}");
    let text = format_module(&module);
    assert!(text.starts_with("sil_stage raw\n\n// module main\n"), "{text}");
    assert_ir_contains(&text, &["sil @f() : $@convention(thin) () -> ()", "return"]);
}

#[test]
fn test_loadable_parameters_are_guaranteed() {
    let module = lower("func echo(_ s: String) -> String { return s }");
    let echo = function(&module, "echo(_:)");
    assert_eq!(echo.sig.render(), "(@guaranteed String) -> @owned String");
    assert!(insts(echo).any(|inst| matches!(inst, InstKind::CopyValue { .. })));
}

#[test]
fn test_top_level_variables_become_globals() {
    let module = lower(indoc! {"
        let x = 1
        var name = \"swift\"
    "});
    let globals = module
        .globals
        .iter()
        .map(|global| (global.name.as_str(), global.ty.to_string()))
        .collect::<Vec<_>>();
    assert_eq!(globals, vec![("x", "$Int".to_string()), ("name", "$String".to_string())]);
    let main = function(&module, "main");
    assert!(insts(main).any(|inst| matches!(inst, InstKind::GlobalAddr { name } if name == "x")));
    assert_ir_contains(
        &format_module(&module),
        &["sil_global @x : $Int", "sil_global @name : $String", "sil @main"],
    );
}

#[test]
fn test_memberwise_init_stores_each_field() {
    let module = lower("struct Point { var x: Int\n var y: Int }\nlet p = Point(x: 1, y: 2)");
    let init = function(&module, "Point.init(x:y:)");
    let fields = insts(init)
        .filter_map(|inst| match inst {
            InstKind::StructElementAddr { field, .. } => Some(field.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(fields, vec!["x", "y"]);
    assert_eq!(
        insts(init)
            .filter(|inst| matches!(inst, InstKind::Store { .. }))
            .count(),
        2
    );
    assert_ir_contains(
        &format_module(&module),
        &[
            "sil @Point.init(x:y:)",
            "alloc_stack $Point, name \"self\"",
            "mark_uninitialized [var]",
            "struct_element_addr",
            "#x",
            "struct_element_addr",
            "#y",
            "return",
        ],
    );
    let main = function(&module, "main");
    assert!(insts(main).any(|inst| matches!(inst, InstKind::FunctionRef { name } if name == "Point.init(x:y:)")));
}

#[test]
fn test_class_constructor_allocates() {
    let module = lower("class Box { var label = \"a\" }\nlet b = Box()");
    let alloc = function(&module, "Box.init()!allocator");
    assert!(insts(alloc).any(|inst| matches!(inst, InstKind::AllocRef { .. })));
}

#[test]
fn test_enum_case_construction() {
    let module = lower(indoc! {"
        enum Token {
            case end
            case number(Int)
        }
        let t = Token.number(4)
        let e = Token.end
    "});
    let main = function(&module, "main");
    let cases = insts(main)
        .filter_map(|inst| match inst {
            InstKind::Enum { case, payload, .. } => Some((case.as_str(), payload.is_some())),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert!(cases.contains(&("Token.number", true)), "{cases:?}");
    assert!(cases.contains(&("Token.end", false)), "{cases:?}");
}

#[test]
fn test_witness_table_and_thunk() {
    let module = lower(indoc! {"
        protocol Shape { func area() -> Int }
        struct Square: Shape {
            var side: Int
            func area() -> Int { return side * side }
        }
    "});
    assert_eq!(module.witness_tables.len(), 1);
    let table = &module.witness_tables[0];
    assert_eq!(table.conformance, "Square: Shape");
    assert_eq!(
        table.entries,
        vec![WitnessEntry::Method {
            requirement: "Shape.area()".to_string(),
            thunk: "Square.Shape.area()!witness".to_string(),
        }]
    );
    let thunk = function(&module, "Square.Shape.area()!witness");
    assert_eq!(thunk.kind, FunctionKind::Thunk);
    assert!(insts(thunk).any(|inst| matches!(inst, InstKind::FunctionRef { name } if name == "Square.area()")));
}

#[test]
fn test_default_argument_generator() {
    let module = lower("func greet(times: Int = 3) {}\ngreet()");
    let generator = function(&module, "greet(times:)!default_arg.0");
    assert_eq!(generator.kind, FunctionKind::DefaultArgument);
    let main = function(&module, "main");
    assert!(insts(main).any(|inst| matches!(
        inst,
        InstKind::FunctionRef { name } if name == "greet(times:)!default_arg.0"
    )));
}

#[test]
fn test_closures_are_separate_functions() {
    let module = lower(indoc! {"
        func run() -> Int {
            let one = { () -> Int in return 1 }
            return one()
        }
    "});
    let closures = module
        .functions
        .values()
        .filter(|func| func.kind == FunctionKind::Closure)
        .map(|func| func.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(closures.len(), 1);
    assert!(closures[0].starts_with("run().closure#"), "{closures:?}");
}

#[test]
fn test_switch_lowers_to_switch_enum() {
    let module = lower(indoc! {"
        enum Light { case red, green }
        func go(_ l: Light) -> Bool {
            switch l {
            case .red: return false
            case .green: return true
            }
        }
    "});
    let text = format_module(&module);
    assert_ir_contains(
        &text,
        &["sil @go(_:)", "switch_enum", "case #Light.red!enumelt", "case #Light.green!enumelt"],
    );
}

#[test]
fn test_defer_bodies_run_in_reverse_order() {
    let module = lower(indoc! {"
        func f() {
            defer { print(1) }
            defer { print(2) }
            print(3)
        }
    "});
    let text = format_module(&module);
    assert_ir_contains(
        &text,
        &[
            "sil @f()",
            "integer_literal $Int, 3",
            "integer_literal $Int, 2",
            "integer_literal $Int, 1",
            "return",
        ],
    );
}

#[test]
fn test_defer_runs_on_every_exit() {
    let module = lower(indoc! {"
        func g(_ c: Bool) -> Int {
            defer { print(7) }
            if c { return 1 }
            return 2
        }
    "});
    let g = function(&module, "g(_:)");
    let sevens = insts(g)
        .filter(|inst| matches!(inst, InstKind::IntegerLiteral { value: 7, .. }))
        .count();
    assert_eq!(sevens, 2);
}

#[test]
fn test_generic_calls_pass_metadata_and_witness_tables() {
    let module = lower(indoc! {"
        protocol Shape { func area() -> Int }
        struct Sq: Shape { func area() -> Int { return 4 } }
        func measure<T: Shape>(_ s: T) -> Int { return s.area() }
        let a = measure(Sq())
    "});
    let measure = function(&module, "measure(_:)");
    assert!(insts(measure).any(|inst| matches!(inst, InstKind::WitnessMethod { .. })));
    let main = function(&module, "main");
    assert!(insts(main).any(|inst| matches!(inst, InstKind::Metatype { .. })));
    assert!(insts(main).any(
        |inst| matches!(inst, InstKind::WitnessTable { conformance } if conformance == "Sq: Shape")
    ));
}

#[test]
fn test_mutated_capture_is_boxed() {
    let module = lower(indoc! {"
        func counter() -> Int {
            var n = 0
            let bump = { () -> Void in n += 1 }
            bump()
            return n
        }
    "});
    let counter = function(&module, "counter()");
    assert!(insts(counter).any(|inst| matches!(inst, InstKind::AllocBox { .. })));
    assert!(insts(counter).any(|inst| matches!(inst, InstKind::PartialApply { .. })));
}

fn blocks_of<'f>(func: &'f IrFunction) -> impl Iterator<Item = &'f Block> {
    func.blocks.iter()
}

#[test]
fn test_loadable_enum_payload_round_trips() {
    let module = lower(indoc! {"
        enum Token {
            case number(Int)
            case end
        }
        func value(_ t: Token) -> Int {
            switch t {
            case .number(let n): return n
            case .end: return 0
            }
        }
        let v = value(Token.number(4))
    "});
    let main = function(&module, "main");
    assert!(insts(main).any(|inst| matches!(
        inst,
        InstKind::Enum { case, payload: Some(_), .. } if case == "Token.number"
    )));

    let value = function(&module, "value(_:)");
    let target = blocks_of(value)
        .find_map(|block| match &block.term {
            Terminator::SwitchEnum { cases, .. } => cases
                .iter()
                .find(|case| case.case == "Token.number")
                .map(|case| case.target),
            _ => None,
        })
        .expect("switch_enum on Token");
    let payload_block = blocks_of(value)
        .find(|block| block.id == target)
        .expect("case block");
    assert_eq!(payload_block.params.len(), 1);
    assert_eq!(payload_block.params[0].ty, IrType::object("Int"));
}

#[test]
fn test_address_only_enum_payload_round_trips() {
    let module = lower(indoc! {"
        enum G<T> {
            case v(T)
        }
        func wrap<T>(_ x: T) -> G<T> { return .v(x) }
        func unwrap<T>(_ g: G<T>) -> T {
            switch g {
            case .v(let x): return x
            }
        }
    "});
    let wrap = function(&module, "wrap(_:)");
    assert!(insts(wrap).any(|inst| matches!(inst, InstKind::InitEnumDataAddr { case, .. } if case == "G.v")));
    assert!(insts(wrap).any(|inst| matches!(inst, InstKind::InjectEnumAddr { case, .. } if case == "G.v")));
    assert!(!insts(wrap).any(|inst| matches!(inst, InstKind::Enum { .. })));

    let unwrap = function(&module, "unwrap(_:)");
    assert!(blocks_of(unwrap).any(|block| matches!(
        &block.term,
        Terminator::SwitchEnumAddr { cases, .. } if cases.iter().any(|case| case.case == "G.v")
    )));
    assert!(insts(unwrap).any(
        |inst| matches!(inst, InstKind::UncheckedTakeEnumDataAddr { case, .. } if case == "G.v")
    ));
}

#[test]
fn test_defer_runs_on_break() {
    let module = lower(indoc! {"
        func spin(_ c: Bool) {
            while true {
                defer { print(5) }
                if c { break }
                print(6)
            }
        }
    "});
    let spin = function(&module, "spin(_:)");
    let fives = insts(spin)
        .filter(|inst| matches!(inst, InstKind::IntegerLiteral { value: 5, .. }))
        .count();
    assert_eq!(fives, 2);
}

#[test]
fn test_defer_runs_on_error_edge() {
    let module = lower(indoc! {"
        func risky() throws -> Int { return 1 }
        func guarded() throws -> Int {
            defer { print(8) }
            let v = try risky()
            return v
        }
    "});
    let guarded = function(&module, "guarded()");
    let error_block = blocks_of(guarded)
        .find_map(|block| match &block.term {
            Terminator::TryApply { error, .. } => Some(*error),
            _ => None,
        })
        .expect("try_apply");
    let eights = insts(guarded)
        .filter(|inst| matches!(inst, InstKind::IntegerLiteral { value: 8, .. }))
        .count();
    assert_eq!(eights, 2);
    let rethrow = blocks_of(guarded)
        .find(|block| block.id == error_block)
        .expect("error block");
    assert!(
        rethrow
            .insts
            .iter()
            .any(|inst| matches!(inst.kind, InstKind::IntegerLiteral { value: 8, .. }))
    );
    assert!(matches!(rethrow.term, Terminator::Throw { .. }));
}

#[test]
fn test_metatype_prints_thick_type_once() {
    let module = lower(indoc! {"
        protocol Shape { func area() -> Int }
        struct Sq: Shape { func area() -> Int { return 4 } }
        func measure<T: Shape>(_ s: T) -> Int { return s.area() }
        let a = measure(Sq())
    "});
    let text = format_module(&module);
    assert!(text.contains("metatype $@thick Sq.Type"), "{text}");
    assert!(!text.contains(".Type.Type"), "{text}");
}
