use super::*;
use crate::core::ir::format_function;
use indoc::indoc;

fn int() -> IrType {
    IrType::object("Int")
}

fn sig(params: Vec<(Convention, IrType)>, result: IrType, result_convention: ResultConvention) -> FunctionSig {
    FunctionSig {
        generics: String::new(),
        params: params
            .into_iter()
            .map(|(convention, ty)| SigParam { convention, ty })
            .collect(),
        result,
        result_convention,
        throws: false,
    }
}

/// Compares printed IR, showing both texts on mismatch.
fn assert_ir_eq(actual: &str, expected: &str) {
    assert!(
        actual == expected,
        "IR mismatch\n--- expected\n{expected}\n--- actual\n{actual}"
    );
}

#[test]
fn test_owned_identity_function() {
    let string = IrType::object("String");
    let mut builder = FunctionBuilder::new(
        "id",
        FunctionKind::Normal,
        sig(
            vec![(Convention::Owned, string.clone())],
            string.clone(),
            ResultConvention::Owned,
        ),
    );
    let entry = builder.entry();
    let param = builder.add_block_param(entry, string, Ownership::Owned);
    builder.terminate(Terminator::Return { value: param });
    assert!(!builder.is_reachable());

    let expected = indoc! {"
        sil @id : $@convention(thin) (@owned String) -> @owned String {
        bb0(%0 : @owned $String):
          return %0 : $String
        }
    "};
    assert_ir_eq(&format_function(&builder.finish()), expected);
}

#[test]
fn test_values_are_renumbered_in_print_order() {
    let bool_ty = IrType::object("Bool");
    let mut builder = FunctionBuilder::new(
        "pick",
        FunctionKind::Normal,
        sig(vec![(Convention::Trivial, bool_ty.clone())], int(), ResultConvention::Trivial),
    );
    let entry = builder.entry();
    let cond = builder.add_block_param(entry, bool_ty, Ownership::Trivial);
    let then_bb = builder.add_block();
    let else_bb = builder.add_block();
    let join = builder.add_block();
    let result = builder.add_block_param(join, int(), Ownership::Trivial);
    builder.cond_br(cond, then_bb, else_bb);

    builder.switch_to(then_bb);
    let one = builder.integer_literal(int(), 1);
    builder.br(join, vec![one]);

    builder.switch_to(else_bb);
    let two = builder.integer_literal(int(), 2);
    builder.br(join, vec![two]);

    builder.switch_to(join);
    builder.terminate(Terminator::Return { value: result });

    let expected = indoc! {"
        sil @pick : $@convention(thin) (@trivial Bool) -> Int {
        bb0(%0 : $Bool):
          cond_br %0, bb1, bb2

        bb1:
          %1 = integer_literal $Int, 1
          br bb3(%1)

        bb2:
          %2 = integer_literal $Int, 2
          br bb3(%2)

        bb3(%3 : $Int):
          return %3 : $Int
        }
    "};
    assert_ir_eq(&format_function(&builder.finish()), expected);
}

#[test]
fn test_code_after_terminator_is_dropped() {
    let mut builder = FunctionBuilder::new(
        "early",
        FunctionKind::Normal,
        sig(Vec::new(), int(), ResultConvention::Trivial),
    );
    let value = builder.integer_literal(int(), 1);
    builder.terminate(Terminator::Return { value });
    let dead = builder.integer_literal(int(), 2);
    assert!(builder.is_reachable());
    builder.terminate(Terminator::Return { value: dead });

    let func = builder.finish();
    assert_eq!(func.blocks.len(), 1);
    assert_eq!(func.blocks[0].insts.len(), 1);
}

#[test]
fn test_copy_and_destroy_skip_trivial_values() {
    let mut builder = FunctionBuilder::new(
        "copies",
        FunctionKind::Normal,
        sig(
            vec![(Convention::Guaranteed, IrType::object("String"))],
            IrType::unit(),
            ResultConvention::Trivial,
        ),
    );
    let entry = builder.entry();
    let borrowed = builder.add_block_param(entry, IrType::object("String"), Ownership::Guaranteed);
    let literal = builder.integer_literal(int(), 3);
    assert_eq!(builder.copy_value(literal), literal);

    let copy = builder.copy_value(borrowed);
    assert_ne!(copy, borrowed);
    assert_eq!(builder.ownership(copy), Ownership::Owned);
    builder.destroy_value(borrowed);
    builder.destroy_value(copy);
    let unit = builder.unit();
    builder.terminate(Terminator::Return { value: unit });

    let func = builder.finish();
    let kinds = func.blocks[0]
        .insts
        .iter()
        .map(|inst| match &inst.kind {
            InstKind::IntegerLiteral { .. } => "integer_literal",
            InstKind::CopyValue { .. } => "copy_value",
            InstKind::DestroyValue { .. } => "destroy_value",
            InstKind::Tuple { .. } => "tuple",
            _ => "other",
        })
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["integer_literal", "copy_value", "destroy_value", "tuple"]);
}

#[test]
fn test_stack_slot_load_and_store() {
    let string = IrType::object("String");
    let mut builder = FunctionBuilder::new(
        "slot",
        FunctionKind::Normal,
        sig(
            vec![(Convention::Owned, string.clone())],
            string.clone(),
            ResultConvention::Owned,
        ),
    );
    let entry = builder.entry();
    let param = builder.add_block_param(entry, string.clone(), Ownership::Owned);
    let slot = builder.alloc_stack(&string, Some("s".to_string()));
    assert!(builder.value_type(slot).is_address());
    builder.store(param, slot, StoreQualifier::Init);
    let loaded = builder.load(slot, LoadQualifier::Take);
    assert_eq!(builder.value_type(loaded), string);
    builder.dealloc_stack(slot);
    builder.terminate(Terminator::Return { value: loaded });

    let expected = indoc! {r#"
        sil @slot : $@convention(thin) (@owned String) -> @owned String {
        bb0(%0 : @owned $String):
          %1 = alloc_stack $String, name "s"
          store %0 to [init] %1 : $*String
          %2 = load [take] %1 : $*String
          dealloc_stack %1 : $*String
          return %2 : $String
        }
    "#};
    assert_ir_eq(&format_function(&builder.finish()), expected);
}

#[test]
fn test_module_format_header_and_tables() {
    let mut module = IrModule::new("main");
    module.globals.push(IrGlobal {
        name: "x".to_string(),
        ty: int(),
    });
    module.witness_tables.push(IrWitnessTable {
        conformance: "S: P".to_string(),
        entries: vec![
            WitnessEntry::AssociatedType {
                name: "Element".to_string(),
                ty: "Int".to_string(),
            },
            WitnessEntry::Method {
                requirement: "P.f".to_string(),
                thunk: "S_P_f_witness".to_string(),
            },
        ],
    });
    let expected = indoc! {"
        sil_stage raw

        // module main

        sil_global @x : $Int

        sil_witness_table S: P {
          associated_type Element: Int
          method #P.f: @S_P_f_witness
        }
    "};
    assert_ir_eq(&crate::core::ir::format_module(&module), expected);
}
