mod common;

use std::sync::Arc;

use common::*;
use kestrel_fhirpath::ast::{BinaryOperator, Expression};
use kestrel_fhirpath::resolver::{ResolverError, SharedResolver};
use kestrel_fhirpath::{EvaluationContext, FhirPathEngine, evaluate};
use kestrel_fhirpath_support::{Collection, ErrorKind, Value};
use rust_decimal_macros::dec;
use serde_json::json;

#[test]
fn test_existence_functions() {
    let cases = vec![
        (Expression::path("Patient.name").call("count", vec![]), Collection::single(3)),
        (Expression::path("Patient.contact").call("empty", vec![]), Collection::boolean(true)),
        (Expression::path("Patient.name.given").call("isDistinct", vec![]), Collection::boolean(false)),
        (Expression::path("Patient.name.given").call("distinct", vec![]).call("count", vec![]), Collection::single(3)),
        (Expression::path("Patient.name.given").call("first", vec![]), Collection::single("Peter")),
        (Expression::path("Patient.name.given").call("last", vec![]), Collection::single("James")),
        (Expression::path("Patient.name.given").call("tail", vec![]).call("count", vec![]), Collection::single(4)),
    ];
    for (expr, expected) in cases {
        assert_eq!(eval(&expr, &patient()).unwrap(), expected, "{}", expr);
    }
}

#[test]
fn test_single_requires_at_most_one() {
    let expr = Expression::path("Patient.name.given").call("single", vec![]);
    assert_eq!(eval(&expr, &patient()).unwrap_err().kind(), ErrorKind::SingletonExpected);
    let expr = Expression::path("Patient.contact").call("single", vec![]);
    assert!(eval(&expr, &patient()).unwrap().is_empty());
}

#[test]
fn test_skip_and_take() {
    let expr = int_union(&[1, 2, 3, 4]).call("skip", vec![Expression::integer(1)]).call("take", vec![Expression::integer(2)]);
    assert_eq!(
        eval_empty(&expr).unwrap(),
        Collection::from_vec(vec![Value::Integer(2), Value::Integer(3)])
    );
}

#[test]
fn test_set_functions() {
    let expr = int_union(&[1, 2, 3]).call("intersect", vec![int_union(&[2, 3, 4])]);
    assert_eq!(eval_empty(&expr).unwrap(), Collection::from_vec(vec![Value::Integer(2), Value::Integer(3)]));

    let expr = int_union(&[1, 2, 3]).call("exclude", vec![int_union(&[2])]);
    assert_eq!(eval_empty(&expr).unwrap(), Collection::from_vec(vec![Value::Integer(1), Value::Integer(3)]));

    let expr = int_union(&[1, 2]).call("combine", vec![int_union(&[2, 3])]).call("count", vec![]);
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single(4));

    let expr = int_union(&[1, 2]).call("subsetOf", vec![int_union(&[1, 2, 3])]);
    assert_eq!(eval_empty(&expr).unwrap(), Collection::boolean(true));
}

#[test]
fn test_aggregate_sum_of_values() {
    // (1 | 2 | 3 | 4).aggregate($this + $total, 0)
    let expr = int_union(&[1, 2, 3, 4]).call(
        "aggregate",
        vec![
            binary(BinaryOperator::Add, Expression::ThisRef, Expression::TotalRef),
            Expression::integer(0),
        ],
    );
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single(10));
}

#[test]
fn test_aggregate_without_init_starts_empty() {
    // (3 | 7 | 5).aggregate(iif($total.empty() or $this > $total, $this, $total))
    let greater = binary(
        BinaryOperator::Or,
        Expression::TotalRef.call("empty", vec![]),
        binary(BinaryOperator::GreaterThan, Expression::ThisRef, Expression::TotalRef),
    );
    let expr = int_union(&[3, 7, 5]).call(
        "aggregate",
        vec![Expression::function(
            "iif",
            vec![greater, Expression::ThisRef, Expression::TotalRef],
        )],
    );
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single(7));
}

#[test]
fn test_aggregate_functions() {
    let values = int_union(&[2, 4, 9]);
    assert_eq!(eval_empty(&values.clone().call("sum", vec![])).unwrap(), Collection::single(15));
    assert_eq!(eval_empty(&values.clone().call("min", vec![])).unwrap(), Collection::single(2));
    assert_eq!(eval_empty(&values.clone().call("max", vec![])).unwrap(), Collection::single(9));
    assert_eq!(eval_empty(&values.call("avg", vec![])).unwrap(), Collection::single(dec!(5)));
}

#[test]
fn test_repeat_walks_nested_items() {
    let questionnaire = json!({
        "resourceType": "Questionnaire",
        "item": [
            {"linkId": "1", "item": [{"linkId": "1.1"}]},
            {"linkId": "2"}
        ]
    });
    let expr = Expression::path("Questionnaire")
        .call("repeat", vec![Expression::identifier("item")])
        .member("linkId");
    assert_eq!(strings(&eval(&expr, &questionnaire).unwrap()), vec!["1", "2", "1.1"]);
}

#[test]
fn test_trace_returns_input_and_records() {
    let ctx = context_for(&patient());
    let expr = Expression::path("Patient.name")
        .call("trace", vec![Expression::string("names"), Expression::identifier("family")])
        .call("count", vec![]);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::single(3));
    let traces = ctx.trace_outputs();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].0, "names");
    assert_eq!(strings(&traces[0].1), vec!["Chalmers", "Windsor"]);
}

#[test]
fn test_string_functions() {
    let cases = vec![
        (Expression::string("abcdef").call("substring", vec![Expression::integer(2), Expression::integer(3)]), Collection::single("cde")),
        (Expression::string("abcdef").call("indexOf", vec![Expression::string("cd")]), Collection::single(2)),
        (Expression::string("Hello").call("upper", vec![]), Collection::single("HELLO")),
        (Expression::string("  pad ").call("trim", vec![]), Collection::single("pad")),
        (Expression::string("a,b,c").call("split", vec![Expression::string(",")]).call("count", vec![]), Collection::single(3)),
        (Expression::string("abc").call("startsWith", vec![Expression::string("ab")]), Collection::boolean(true)),
        (Expression::string("abc").call("replace", vec![Expression::string("b"), Expression::string("x")]), Collection::single("axc")),
        (Expression::string("hello").call("encode", vec![Expression::string("base64")]), Collection::single("aGVsbG8=")),
        (Expression::string("aGVsbG8=").call("decode", vec![Expression::string("base64")]), Collection::single("hello")),
        (Expression::string("hi").call("encode", vec![Expression::string("hex")]), Collection::single("6869")),
    ];
    for (expr, expected) in cases {
        assert_eq!(eval_empty(&expr).unwrap(), expected, "{}", expr);
    }
}

#[test]
fn test_string_function_on_non_string_is_type_error() {
    let expr = Expression::integer(5).call("upper", vec![]);
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn test_matches_and_replace_matches() {
    let expr = Expression::path("Patient.telecom.value")
        .call("where", vec![Expression::ThisRef.call("matches", vec![Expression::string("@example\\.org$")])]);
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("p.chalmers@example.org"));

    let expr = Expression::string("2024-06-15").call(
        "replaceMatches",
        vec![Expression::string("(\\d+)-(\\d+)-(\\d+)"), Expression::string("$3/$2/$1")],
    );
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single("15/06/2024"));
}

#[test]
fn test_conversion_functions() {
    let cases = vec![
        (Expression::string("42").call("toInteger", vec![]), Collection::single(42)),
        (Expression::string("4.2").call("toInteger", vec![]), Collection::empty()),
        (Expression::string("4.2").call("convertsToDecimal", vec![]), Collection::boolean(true)),
        (Expression::string("yes").call("toBoolean", vec![]), Collection::boolean(true)),
        (Expression::integer(7).call("toString", vec![]), Collection::single("7")),
        (Expression::string("2024-06").call("toDate", vec![]).call("toString", vec![]), Collection::single("2024-06")),
    ];
    for (expr, expected) in cases {
        assert_eq!(eval_empty(&expr).unwrap(), expected, "{}", expr);
    }
}

#[test]
fn test_math_functions() {
    let cases = vec![
        (Expression::decimal("2.5").call("round", vec![]), Collection::single(dec!(3))),
        (Expression::integer(-3).call("abs", vec![]), Collection::single(3)),
        (Expression::integer(2).call("power", vec![Expression::integer(10)]), Collection::single(1024)),
        (Expression::decimal("1.9").call("floor", vec![]), Collection::single(1)),
        (Expression::integer(-1).call("sqrt", vec![]), Collection::empty()),
    ];
    for (expr, expected) in cases {
        assert_eq!(eval_empty(&expr).unwrap(), expected, "{}", expr);
    }
}

#[test]
fn test_tree_navigation() {
    let expr = Expression::path("Patient.managingOrganization").call("children", vec![]);
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("Organization/1"));

    let expr = Expression::path("Patient.telecom").call("descendants", vec![]).call("count", vec![]);
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single(5));
}

#[test]
fn test_type_reflection() {
    let expr = Expression::path("Patient").call("type", vec![]).member("name");
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("Patient"));
    let expr = Expression::integer(1).call("type", vec![]).member("namespace");
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single("System"));
}

#[test]
fn test_extension_lookup() {
    let resource = json!({
        "resourceType": "Patient",
        "extension": [
            {"url": "http://hl7.org/fhir/StructureDefinition/patient-birthTime", "valueDateTime": "1974-12-25T14:35:45-05:00"}
        ]
    });
    let expr = Expression::path("Patient")
        .call("extension", vec![Expression::constant("ext-patient-birthTime")])
        .member("value");
    let result = eval(&expr, &resource).unwrap();
    assert_eq!(result.len(), 1);
    assert!(matches!(result.first(), Some(Value::DateTime(_))));
}

#[test]
fn test_resolve_without_resolver_is_empty() {
    let expr = Expression::path("Patient.managingOrganization").call("resolve", vec![]);
    assert!(eval(&expr, &patient()).unwrap().is_empty());
}

#[test]
fn test_resolve_with_engine_resolver() {
    let resolver: SharedResolver = Arc::new(|reference: &str| match reference {
        "Organization/1" => Ok(br#"{"resourceType": "Organization", "name": "ACME"}"#.to_vec()),
        other => Err(ResolverError::NotFound(other.to_string())),
    });
    let engine = FhirPathEngine::new().with_resolver(resolver);
    let context = engine.context(Collection::from_json(&patient()));
    let expr = Expression::path("Patient.managingOrganization")
        .call("resolve", vec![])
        .member("name");
    assert_eq!(engine.evaluate(&expr, &context).unwrap(), Collection::single("ACME"));
}

#[test]
fn test_now_is_stable_within_evaluation() {
    let ctx = EvaluationContext::new(Collection::empty());
    let expr = binary(
        BinaryOperator::Equal,
        Expression::function("now", vec![]),
        Expression::function("now", vec![]),
    );
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::boolean(true));
}
