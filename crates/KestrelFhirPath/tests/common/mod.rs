#![allow(dead_code)]

use kestrel_fhirpath::ast::{BinaryOperator, Expression};
use kestrel_fhirpath::{EvaluationContext, evaluate};
use kestrel_fhirpath_support::{Collection, EvaluationError};
use serde_json::{Value as JsonValue, json};

pub fn patient() -> JsonValue {
    json!({
        "resourceType": "Patient",
        "id": "example",
        "active": true,
        "gender": "male",
        "birthDate": "1974-12-25",
        "name": [
            {"use": "official", "family": "Chalmers", "given": ["Peter", "James"]},
            {"use": "usual", "given": ["Jim"]},
            {"use": "maiden", "family": "Windsor", "given": ["Peter", "James"]}
        ],
        "telecom": [
            {"system": "phone", "value": "(03) 5555 6473", "use": "work"},
            {"system": "email", "value": "p.chalmers@example.org"}
        ],
        "managingOrganization": {"reference": "Organization/1"}
    })
}

pub fn observation() -> JsonValue {
    json!({
        "resourceType": "Observation",
        "id": "bp",
        "status": "final",
        "valueQuantity": {"value": 185, "unit": "lbs", "system": "http://unitsofmeasure.org", "code": "[lb_av]"},
        "component": [
            {"code": {"text": "systolic"}, "valueQuantity": {"value": 107, "code": "mm[Hg]"}},
            {"code": {"text": "diastolic"}, "valueQuantity": {"value": 60, "code": "mm[Hg]"}},
            {"code": {"text": "note"}, "valueString": "sitting"}
        ]
    })
}

pub fn bundle() -> JsonValue {
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            {"resource": patient()},
            {"resource": observation()}
        ]
    })
}

pub fn context_for(resource: &JsonValue) -> EvaluationContext {
    EvaluationContext::new(Collection::from_json(resource))
}

pub fn empty_context() -> EvaluationContext {
    EvaluationContext::new(Collection::empty())
}

pub fn eval(expr: &Expression, resource: &JsonValue) -> Result<Collection, EvaluationError> {
    evaluate(expr, &context_for(resource))
}

pub fn eval_empty(expr: &Expression) -> Result<Collection, EvaluationError> {
    evaluate(expr, &empty_context())
}

pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::binary(op, left, right)
}

pub fn eq(left: Expression, right: Expression) -> Expression {
    Expression::binary(BinaryOperator::Equal, left, right)
}

/// `(a | b | ...)` built from integer literals.
pub fn int_union(values: &[i64]) -> Expression {
    let mut iter = values.iter();
    let first = Expression::integer(*iter.next().expect("at least one value"));
    iter.fold(first, |acc, v| {
        Expression::binary(BinaryOperator::Union, acc, Expression::integer(*v))
    })
}

pub fn strings(collection: &Collection) -> Vec<String> {
    collection.iter().map(|v| v.to_string()).collect()
}
