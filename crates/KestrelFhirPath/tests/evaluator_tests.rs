mod common;

use common::*;
use kestrel_fhirpath::ast::{BinaryOperator, Expression, UnaryOperator};
use kestrel_fhirpath_support::{Collection, ErrorKind, Quantity, Value};
use rust_decimal_macros::dec;

#[test]
fn test_integer_arithmetic() {
    let cases = vec![
        (BinaryOperator::Add, 2, 3, Value::Integer(5)),
        (BinaryOperator::Subtract, 2, 3, Value::Integer(-1)),
        (BinaryOperator::Multiply, 4, 3, Value::Integer(12)),
        (BinaryOperator::Divide, 10, 4, Value::Decimal(dec!(2.5))),
        (BinaryOperator::Div, 5, 2, Value::Integer(2)),
        (BinaryOperator::Mod, 5, 2, Value::Integer(1)),
    ];
    for (op, l, r, expected) in cases {
        let expr = binary(op, Expression::integer(l), Expression::integer(r));
        assert_eq!(eval_empty(&expr).unwrap(), Collection::single(expected), "{}", expr);
    }
}

#[test]
fn test_division_by_zero_and_overflow() {
    let expr = binary(BinaryOperator::Div, Expression::integer(1), Expression::integer(0));
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::DivisionByZero);

    let expr = binary(BinaryOperator::Add, Expression::integer(i64::MAX), Expression::integer(1));
    assert!(eval_empty(&expr).unwrap().is_empty());
}

#[test]
fn test_empty_propagates_through_arithmetic() {
    let expr = binary(BinaryOperator::Add, Expression::null(), Expression::integer(1));
    assert!(eval_empty(&expr).unwrap().is_empty());
    let expr = binary(BinaryOperator::LessThan, Expression::integer(1), Expression::null());
    assert!(eval_empty(&expr).unwrap().is_empty());
}

#[test]
fn test_multi_element_arithmetic_operand_is_rejected() {
    let expr = binary(BinaryOperator::Add, int_union(&[1, 2]), Expression::integer(3));
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::SingletonExpected);
}

#[test]
fn test_unary_minus_and_string_concatenation() {
    let expr = Expression::unary(UnaryOperator::Minus, Expression::decimal("1.5"));
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single(dec!(-1.5)));

    let expr = binary(BinaryOperator::Concatenate, Expression::string("a"), Expression::null());
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single("a"));
}

#[test]
fn test_path_navigation() {
    let result = eval(&Expression::path("Patient.name.given"), &patient()).unwrap();
    assert_eq!(strings(&result), vec!["Peter", "James", "Jim", "Peter", "James"]);

    let result = eval(&Expression::path("name.family"), &patient()).unwrap();
    assert_eq!(strings(&result), vec!["Chalmers", "Windsor"]);

    assert!(eval(&Expression::path("Observation.status"), &patient()).unwrap().is_empty());
}

#[test]
fn test_where_then_member() {
    let expr = Expression::path("Patient.name")
        .call(
            "where",
            vec![eq(Expression::identifier("use"), Expression::string("official"))],
        )
        .member("family");
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("Chalmers"));
}

#[test]
fn test_where_binds_index() {
    // (10 | 20 | 30).where($index > 0)
    let expr = int_union(&[10, 20, 30]).call(
        "where",
        vec![binary(BinaryOperator::GreaterThan, Expression::IndexRef, Expression::integer(0))],
    );
    assert_eq!(
        eval_empty(&expr).unwrap(),
        Collection::from_vec(vec![Value::Integer(20), Value::Integer(30)])
    );
}

#[test]
fn test_where_requires_boolean_criteria() {
    let expr = Expression::path("Patient.name").call("where", vec![Expression::identifier("family")]);
    assert_eq!(eval(&expr, &patient()).unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn test_select_flattens_projection() {
    let expr = Expression::path("Patient.name").call("select", vec![Expression::identifier("given")]);
    assert_eq!(eval(&expr, &patient()).unwrap().len(), 5);
}

#[test]
fn test_all_and_exists() {
    let has_system = Expression::path("Patient.telecom").call(
        "all",
        vec![Expression::identifier("system").call("exists", vec![])],
    );
    assert_eq!(eval(&has_system, &patient()).unwrap(), Collection::single(true));

    let email = Expression::path("Patient.telecom").call(
        "exists",
        vec![eq(Expression::identifier("system"), Expression::string("email"))],
    );
    assert_eq!(eval(&email, &patient()).unwrap(), Collection::single(true));

    let empty_all = Expression::path("Patient.contact").call("all", vec![Expression::boolean(false)]);
    assert_eq!(eval(&empty_all, &patient()).unwrap(), Collection::single(true));
}

#[test]
fn test_iif_evaluates_only_selected_branch() {
    let failing = binary(BinaryOperator::Div, Expression::integer(1), Expression::integer(0));
    let expr = Expression::function(
        "iif",
        vec![Expression::boolean(true), Expression::string("yes"), failing],
    );
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single("yes"));
}

#[test]
fn test_indexer() {
    let expr = Expression::path("Patient.name.given").index(Expression::integer(2));
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("Jim"));
    let expr = Expression::path("Patient.name.given").index(Expression::integer(20));
    assert!(eval(&expr, &patient()).unwrap().is_empty());
}

#[test]
fn test_polymorphic_value_navigation() {
    let value = eval(&Expression::path("Observation.value.value"), &observation()).unwrap();
    assert_eq!(value, Collection::single(185));

    let is_quantity = Expression::path("Observation.value").is_type("Quantity");
    assert_eq!(eval(&is_quantity, &observation()).unwrap(), Collection::single(true));

    let strings_only = Expression::path("Observation.component.value").call(
        "ofType",
        vec![Expression::identifier("string")],
    );
    assert_eq!(eval(&strings_only, &observation()).unwrap(), Collection::single("sitting"));
}

#[test]
fn test_resource_type_hierarchy() {
    let bundle_is_domain = Expression::identifier("Bundle").is_type("DomainResource");
    assert_eq!(eval(&bundle_is_domain, &bundle()).unwrap(), Collection::single(false));

    let bundle_is_resource = Expression::identifier("Bundle").is_type("Resource");
    assert_eq!(eval(&bundle_is_resource, &bundle()).unwrap(), Collection::single(true));

    let patient_is_domain = Expression::identifier("Patient").is_type("DomainResource");
    assert_eq!(eval(&patient_is_domain, &patient()).unwrap(), Collection::single(true));

    let entries = Expression::path("Bundle.entry.resource").call(
        "ofType",
        vec![Expression::identifier("Patient")],
    );
    assert_eq!(eval(&entries, &bundle()).unwrap().len(), 1);
}

#[test]
fn test_as_filters_by_type() {
    let expr = Expression::path("Patient.gender").as_type("String");
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("male"));
    let expr = Expression::path("Patient.gender").as_type("Integer");
    assert!(eval(&expr, &patient()).unwrap().is_empty());
}

#[test]
fn test_date_arithmetic() {
    let expr = binary(
        BinaryOperator::Add,
        Expression::date("@2020-02-29"),
        Expression::quantity("1 year"),
    );
    assert_eq!(strings(&eval_empty(&expr).unwrap()), vec!["2021-02-28"]);

    let expr = binary(
        BinaryOperator::Subtract,
        Expression::date("@2024-03-31"),
        Expression::quantity("1 month"),
    );
    assert_eq!(strings(&eval_empty(&expr).unwrap()), vec!["2024-02-29"]);

    let expr = binary(
        BinaryOperator::Add,
        Expression::date("@2024-01-01"),
        Expression::quantity("1 'mo'"),
    );
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_date_comparison_with_json_string() {
    let expr = binary(
        BinaryOperator::LessThan,
        Expression::path("Patient.birthDate"),
        Expression::date("@1980-01-01"),
    );
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single(true));
}

#[test]
fn test_ambiguous_date_comparison_is_empty() {
    let expr = binary(
        BinaryOperator::LessThan,
        Expression::date("@2020"),
        Expression::date("@2020-06-01"),
    );
    assert!(eval_empty(&expr).unwrap().is_empty());
}

#[test]
fn test_incomparable_types_are_invalid_operations() {
    let expr = binary(BinaryOperator::LessThan, Expression::integer(1), Expression::string("a"));
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_quantity_comparison_converts_units() {
    let expr = binary(
        BinaryOperator::GreaterThan,
        Expression::quantity("1 'kg'"),
        Expression::quantity("500 'g'"),
    );
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single(true));

    let expr = binary(
        BinaryOperator::LessThan,
        Expression::quantity("1 'kg'"),
        Expression::quantity("1 's'"),
    );
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_unitless_quantity_arithmetic() {
    let cases = vec![
        (BinaryOperator::Add, "5 'mg'", "3 ''", dec!(8)),
        (BinaryOperator::Add, "3 ''", "5 'mg'", dec!(8)),
        (BinaryOperator::Subtract, "5 'mg'", "3 ''", dec!(2)),
        (BinaryOperator::Subtract, "3 ''", "5 'mg'", dec!(-2)),
    ];
    for (op, l, r, expected) in cases {
        let expr = binary(op, Expression::quantity(l), Expression::quantity(r));
        assert_eq!(
            eval_empty(&expr).unwrap(),
            Collection::single(Value::Quantity(Quantity::new(expected, "mg"))),
            "{}",
            expr
        );
    }
}

#[test]
fn test_external_constants() {
    let expr = Expression::constant("ucum");
    assert_eq!(eval_empty(&expr).unwrap(), Collection::single("http://unitsofmeasure.org"));

    let expr = Expression::constant("vs-administrative-gender");
    assert_eq!(
        eval_empty(&expr).unwrap(),
        Collection::single("http://hl7.org/fhir/ValueSet/administrative-gender")
    );

    let expr = Expression::constant("resource").member("id");
    assert_eq!(eval(&expr, &patient()).unwrap(), Collection::single("example"));

    let expr = Expression::constant("undefined");
    assert_eq!(eval_empty(&expr).unwrap_err().kind(), ErrorKind::InvalidPath);
}

#[test]
fn test_unknown_function() {
    let expr = Expression::path("Patient").call("frobnicate", vec![]);
    assert_eq!(eval(&expr, &patient()).unwrap_err().kind(), ErrorKind::FunctionNotFound);
}

#[test]
fn test_wrong_arity() {
    let expr = Expression::path("Patient.name").call("where", vec![]);
    assert_eq!(eval(&expr, &patient()).unwrap_err().kind(), ErrorKind::InvalidArguments);
}

#[test]
fn test_quantity_literal_value() {
    let result = eval_empty(&Expression::quantity("5 'mg'")).unwrap();
    assert_eq!(result, Collection::single(Quantity::new(dec!(5), "mg")));
}
