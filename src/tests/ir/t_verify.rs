use super::*;
use crate::core::ir::builder::FunctionBuilder;

fn string() -> IrType {
    IrType::object("String")
}

/// Builder for `(@owned String) -> ()` with the parameter defined in bb0.
fn owned_param_fn(name: &str) -> (FunctionBuilder, ValueId) {
    let sig = FunctionSig {
        generics: String::new(),
        params: vec![SigParam {
            convention: Convention::Owned,
            ty: string(),
        }],
        result: IrType::unit(),
        result_convention: ResultConvention::Trivial,
        throws: false,
    };
    let mut builder = FunctionBuilder::new(name, FunctionKind::Normal, sig);
    let entry = builder.entry();
    let param = builder.add_block_param(entry, string(), Ownership::Owned);
    (builder, param)
}

fn return_unit(builder: &mut FunctionBuilder) {
    let unit = builder.unit();
    builder.terminate(Terminator::Return { value: unit });
}

#[test]
fn test_consumed_owned_value_verifies() {
    let (mut builder, param) = owned_param_fn("consume");
    builder.destroy_value(param);
    return_unit(&mut builder);
    assert_eq!(verify_function(&builder.finish()), Ok(()));
}

#[test]
fn test_leaked_owned_value() {
    let (mut builder, _) = owned_param_fn("leak");
    return_unit(&mut builder);
    let err = verify_function(&builder.finish()).expect_err("leak");
    assert_eq!(
        err.kind(),
        &VerifyErrorKind::Leaked {
            function: "leak".to_string(),
            block: 0,
            values: "%0".to_string(),
        }
    );
}

#[test]
fn test_double_consume() {
    let (mut builder, param) = owned_param_fn("twice");
    builder.emit(InstKind::DestroyValue { value: param });
    builder.emit(InstKind::DestroyValue { value: param });
    return_unit(&mut builder);
    let err = verify_function(&builder.finish()).expect_err("use after consume");
    assert_eq!(
        err.kind(),
        &VerifyErrorKind::UseAfterConsume {
            function: "twice".to_string(),
            value: 0,
        }
    );
}

#[test]
fn test_borrow_after_consume() {
    let (mut builder, param) = owned_param_fn("late_copy");
    builder.destroy_value(param);
    builder.emit_value(InstKind::CopyValue { value: param }, string(), Ownership::Owned);
    return_unit(&mut builder);
    let err = verify_function(&builder.finish()).expect_err("use after consume");
    assert!(matches!(err.kind(), VerifyErrorKind::UseAfterConsume { value: 0, .. }));
}

#[test]
fn test_guaranteed_value_cannot_be_consumed() {
    let sig = FunctionSig {
        generics: String::new(),
        params: vec![SigParam {
            convention: Convention::Guaranteed,
            ty: string(),
        }],
        result: IrType::unit(),
        result_convention: ResultConvention::Trivial,
        throws: false,
    };
    let mut builder = FunctionBuilder::new("borrowed", FunctionKind::Normal, sig);
    let entry = builder.entry();
    let param = builder.add_block_param(entry, string(), Ownership::Guaranteed);
    builder.emit(InstKind::DestroyValue { value: param });
    return_unit(&mut builder);
    let err = verify_function(&builder.finish()).expect_err("guaranteed consumed");
    assert_eq!(
        err.kind(),
        &VerifyErrorKind::ConsumedGuaranteed {
            function: "borrowed".to_string(),
            value: 0,
        }
    );
}

#[test]
fn test_branches_must_agree_on_live_values() {
    let (mut builder, param) = owned_param_fn("merge");
    let cond = builder.integer_literal(IrType::object("Bool"), 1);
    let then_bb = builder.add_block();
    let else_bb = builder.add_block();
    let join = builder.add_block();
    builder.cond_br(cond, then_bb, else_bb);

    builder.switch_to(then_bb);
    builder.br(join, Vec::new());

    builder.switch_to(else_bb);
    builder.destroy_value(param);
    builder.br(join, Vec::new());

    builder.switch_to(join);
    return_unit(&mut builder);

    let err = verify_function(&builder.finish()).expect_err("inconsistent merge");
    assert!(matches!(
        err.kind(),
        VerifyErrorKind::InconsistentMerge { block: 3, .. }
    ));
}

#[test]
fn test_owned_value_forwarded_through_block_param() {
    let (mut builder, param) = owned_param_fn("forward");
    let next = builder.add_block();
    let moved = builder.add_block_param(next, string(), Ownership::Owned);
    builder.br(next, vec![param]);
    builder.switch_to(next);
    builder.destroy_value(moved);
    return_unit(&mut builder);
    assert_eq!(verify_function(&builder.finish()), Ok(()));
}

#[test]
fn test_unreachable_path_may_leave_values_live() {
    let (mut builder, _) = owned_param_fn("trap");
    builder.terminate(Terminator::Unreachable);
    assert_eq!(verify_function(&builder.finish()), Ok(()));
}

#[test]
fn test_undefined_value_and_block() {
    let (mut builder, param) = owned_param_fn("dangling");
    builder.destroy_value(param);
    builder.terminate(Terminator::Return { value: ValueId(99) });
    let err = verify_function(&builder.finish()).expect_err("undefined value");
    assert!(matches!(
        err.kind(),
        VerifyErrorKind::UndefinedValue { value: 99, .. }
    ));

    let (mut builder, param) = owned_param_fn("nowhere");
    builder.destroy_value(param);
    builder.br(BlockId(7), Vec::new());
    let err = verify_function(&builder.finish()).expect_err("undefined block");
    assert!(matches!(
        err.kind(),
        VerifyErrorKind::UndefinedBlock { block: 7, .. }
    ));
}

#[test]
fn test_verify_module_collects_every_failure() {
    let mut module = IrModule::new("main");
    for name in ["a", "b"] {
        let (mut builder, _) = owned_param_fn(name);
        return_unit(&mut builder);
        module.functions.insert(name.to_string(), builder.finish());
    }
    let (mut builder, param) = owned_param_fn("ok");
    builder.destroy_value(param);
    return_unit(&mut builder);
    module.functions.insert("ok".to_string(), builder.finish());

    let errors = verify_module(&module).expect_err("two leaks");
    assert_eq!(errors.len(), 2);
}
