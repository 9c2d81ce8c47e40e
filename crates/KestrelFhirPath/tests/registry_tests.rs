mod common;

use std::sync::Arc;

use common::*;
use kestrel_fhirpath::ast::Expression;
use kestrel_fhirpath::registry::{FunctionDefinition, FunctionRegistry};
use kestrel_fhirpath::{EvaluationContext, FhirPathEngine, evaluate};
use kestrel_fhirpath_support::{Collection, ErrorKind, EvaluationError, Value};

fn doubled() -> FunctionDefinition {
    FunctionDefinition::new("doubled", 0, Some(0), |input, _, _| {
        input
            .iter()
            .map(|v| match v {
                Value::Integer(i) => Ok(Value::Integer(i * 2)),
                other => Err(EvaluationError::TypeError(format!(
                    "doubled() expects Integers, found {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Collection::from_vec)
    })
}

#[test]
fn test_custom_function_in_isolated_registry() {
    let registry = Arc::new(FunctionRegistry::with_builtins());
    registry.register(doubled()).unwrap();

    let engine = FhirPathEngine::new().with_registry(registry);
    let expr = int_union(&[1, 2]).call("doubled", vec![]);
    let ctx = engine.context(Collection::empty());
    assert_eq!(
        engine.evaluate(&expr, &ctx).unwrap(),
        Collection::from_vec(vec![Value::Integer(2), Value::Integer(4)])
    );

    let err = eval_empty(&expr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FunctionNotFound);
    assert!(!FunctionRegistry::global().has("doubled"));
}

#[test]
fn test_empty_registry_has_no_builtins() {
    let ctx = EvaluationContext::builder(Collection::empty())
        .functions(Arc::new(FunctionRegistry::empty()))
        .build();
    let expr = int_union(&[1, 2]).call("count", vec![]);
    assert_eq!(evaluate(&expr, &ctx).unwrap_err().kind(), ErrorKind::FunctionNotFound);

    // Special forms live in the evaluator and keep working.
    let expr = int_union(&[1, 2]).call("exists", vec![]);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::boolean(true));
}

#[test]
fn test_override_builtin_in_isolated_registry() {
    let registry = Arc::new(FunctionRegistry::with_builtins());
    let previous = registry
        .register(FunctionDefinition::new("count", 0, Some(0), |_, _, _| {
            Ok(Collection::single(-1))
        }))
        .unwrap();
    assert!(previous.is_some());

    let ctx = EvaluationContext::builder(Collection::empty())
        .functions(registry)
        .build();
    let expr = int_union(&[1, 2]).call("count", vec![]);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::single(-1));
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single(2));
}

#[test]
fn test_special_form_names_are_reserved() {
    let registry = FunctionRegistry::with_builtins();
    for name in ["where", "select", "iif", "aggregate", "trace"] {
        let err = registry
            .register(FunctionDefinition::new(name, 0, None, |input, _, _| Ok(input.clone())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExpression, "{}", name);
    }
}

#[test]
fn test_inverted_arity_is_rejected() {
    let registry = FunctionRegistry::empty();
    let err = registry
        .register(FunctionDefinition::new("broken", 2, Some(1), |input, _, _| Ok(input.clone())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidExpression);
}

#[test]
fn test_registry_enforces_arity() {
    let expr = Expression::string("abc").call("upper", vec![Expression::integer(1)]);
    match eval_empty(&expr).unwrap_err().innermost() {
        EvaluationError::InvalidArguments { function, actual, .. } => {
            assert_eq!(function, "upper");
            assert_eq!(*actual, 1);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_arguments_evaluate_in_caller_scope() {
    // Patient.name.given.where($this = %resource.name.given.first())
    let expr = Expression::path("Patient.name.given").call(
        "where",
        vec![eq(
            Expression::ThisRef,
            Expression::constant("resource").member("name").member("given").call("first", vec![]),
        )],
    );
    assert_eq!(eval(&expr, &patient()).unwrap().len(), 2);

    // indexOf's argument is evaluated against the outer focus, not the input string.
    let expr = Expression::path("Patient.gender").call("indexOf", vec![Expression::string("le")]);
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single(2));
}

#[test]
fn test_listing() {
    let registry = FunctionRegistry::with_builtins();
    let names = registry.list();
    for expected in ["count", "matches", "resolve", "sum", "toQuantity", "descendants"] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}
