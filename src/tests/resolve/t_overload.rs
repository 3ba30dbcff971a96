use super::*;

fn param(label: Option<&str>) -> ParamShape {
    ParamShape {
        label: label.map(str::to_string),
        has_default: false,
        variadic: false,
        is_function: false,
    }
}

fn defaulted(label: Option<&str>) -> ParamShape {
    ParamShape {
        has_default: true,
        ..param(label)
    }
}

fn variadic(label: Option<&str>) -> ParamShape {
    ParamShape {
        variadic: true,
        ..param(label)
    }
}

fn arg(label: Option<&str>) -> ArgShape {
    ArgShape {
        label: label.map(str::to_string),
        trailing_closure: false,
    }
}

fn trailing() -> ArgShape {
    ArgShape {
        label: None,
        trailing_closure: true,
    }
}

#[test]
fn test_match_labels_in_order() {
    let matched = match_arguments(&[param(None), param(Some("b"))], &[arg(None), arg(Some("b"))]);
    assert!(matched.is_ok());
    assert_eq!(
        matched.bindings,
        vec![ParamBinding::Args(vec![0]), ParamBinding::Args(vec![1])]
    );
}

#[test]
fn test_match_missing_label() {
    let matched = match_arguments(&[param(Some("a"))], &[arg(None)]);
    assert_eq!(
        matched.errors,
        vec![LabelError::MissingArgumentLabel("a".to_string())]
    );
    assert_eq!(matched.bindings, vec![ParamBinding::Args(vec![0])]);
}

#[test]
fn test_match_extra_label() {
    let matched = match_arguments(&[param(None)], &[arg(Some("x"))]);
    assert_eq!(
        matched.errors,
        vec![LabelError::ExtraArgumentLabel("x".to_string())]
    );
}

#[test]
fn test_match_incorrect_label() {
    let matched = match_arguments(&[param(Some("a"))], &[arg(Some("b"))]);
    assert_eq!(
        matched.errors,
        vec![LabelError::IncorrectArgumentLabel {
            expected: "a".to_string(),
            found: "b".to_string(),
        }]
    );
}

#[test]
fn test_match_out_of_order_argument() {
    let params = [param(Some("a")), param(Some("b")), defaulted(Some("c"))];
    let matched = match_arguments(&params, &[arg(Some("b")), arg(Some("a"))]);
    assert!(
        matched
            .errors
            .contains(&LabelError::OutOfOrderArgument("a".to_string(), "b".to_string())),
        "{:?}",
        matched.errors
    );
}

#[test]
fn test_match_defaults_fill_missing_parameters() {
    let matched = match_arguments(&[param(Some("a")), defaulted(Some("b"))], &[arg(Some("a"))]);
    assert!(matched.is_ok());
    assert_eq!(matched.bindings[1], ParamBinding::Default);
}

#[test]
fn test_match_missing_argument() {
    let matched = match_arguments(&[param(Some("a")), param(Some("b"))], &[arg(Some("a"))]);
    assert_eq!(
        matched.errors,
        vec![LabelError::MissingArgument("b".to_string())]
    );
}

#[test]
fn test_match_extra_argument() {
    let matched = match_arguments(&[param(None)], &[arg(None), arg(None)]);
    assert_eq!(matched.errors, vec![LabelError::ExtraArgument]);
}

#[test]
fn test_match_variadic_collects_unlabeled_arguments() {
    let matched = match_arguments(
        &[variadic(None), param(Some("sep"))],
        &[arg(None), arg(None), arg(None), arg(Some("sep"))],
    );
    assert!(matched.is_ok());
    assert_eq!(
        matched.bindings,
        vec![
            ParamBinding::Args(vec![0, 1, 2]),
            ParamBinding::Args(vec![3])
        ]
    );
}

#[test]
fn test_match_trailing_closure_binds_last_parameter() {
    let closure_param = ParamShape {
        is_function: true,
        ..param(Some("body"))
    };
    let matched = match_arguments(&[param(Some("a")), closure_param], &[arg(Some("a")), trailing()]);
    assert!(matched.is_ok());
    assert_eq!(matched.bindings[1], ParamBinding::Args(vec![1]));
}

#[test]
fn test_next_params_after_first_argument() {
    let params = [param(None), param(Some("b"))];
    assert_eq!(next_params(&params, &[arg(None)]), Some(vec![1]));
}

#[test]
fn test_next_params_include_defaulted_run() {
    let params = [defaulted(Some("a")), defaulted(Some("b")), param(Some("c"))];
    assert_eq!(next_params(&params, &[]), Some(vec![0, 1, 2]));
}

#[test]
fn test_next_params_after_variadic_offers_it_again() {
    let params = [variadic(None), param(Some("y"))];
    assert_eq!(next_params(&params, &[arg(None)]), Some(vec![0, 1]));
}

#[test]
fn test_next_params_rejects_mismatched_prefix() {
    assert_eq!(next_params(&[param(Some("a"))], &[arg(Some("x"))]), None);
}

#[test]
fn test_param_shape_from_decl() {
    use crate::core::types::{FnParam, Type};
    let decl = ParamDecl {
        label: Some("body".to_string()),
        name: "body".to_string(),
        ty: Type::function(vec![FnParam::plain(Type::void())], Type::void(), false),
        has_default: false,
        variadic: false,
        inout: false,
        autoclosure: false,
        escaping: true,
    };
    let shape = ParamShape::from_decl(&decl);
    assert!(shape.is_function);
    assert_eq!(shape.label.as_deref(), Some("body"));
}
