//! # FHIRPath Boolean Logic
//!
//! Three-valued logic for `and`, `or`, `xor`, `implies` and `not()`, where an
//! empty collection stands for "unknown", plus the collection reductions
//! `allTrue()`, `anyTrue()`, `allFalse()` and `anyFalse()`.
//!
//! | left  | right | and   | or    | implies |
//! |-------|-------|-------|-------|---------|
//! | true  | true  | true  | true  | true    |
//! | true  | false | false | true  | false   |
//! | true  | {}    | {}    | true  | {}      |
//! | false | any   | false | right | true    |
//! | {}    | true  | {}    | true  | true    |
//! | {}    | false | false | {}    | {}      |
//! | {}    | {}    | {}    | {}    | {}      |

use kestrel_fhirpath_support::{Collection, EvaluationError, Value};

use crate::registry::FunctionRegistry;

/// Reads a collection as a logical operand.
///
/// Empty is unknown (`None`), a single Boolean is its value, and any other
/// single value counts as `true`. More than one element is `SingletonExpected`.
pub fn singleton_boolean(collection: &Collection, operation: &str) -> Result<Option<bool>, EvaluationError> {
    Ok(collection.singleton(operation)?.map(|value| match value {
        Value::Boolean(b) => *b,
        _ => true,
    }))
}

pub fn and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

pub fn or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

pub fn xor(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l != r),
        _ => None,
    }
}

pub fn implies(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(true)) => Some(true),
        (Some(true), Some(false)) => Some(false),
        _ => None,
    }
}

pub fn not(operand: Option<bool>) -> Option<bool> {
    operand.map(|b| !b)
}

/// Wraps a three-valued result as a collection.
pub fn logical_result(value: Option<bool>) -> Collection {
    value.map(Collection::boolean).unwrap_or_default()
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("not", 0, Some(0), |input, _, _| {
        Ok(logical_result(not(singleton_boolean(input, "not()")?)))
    });
    registry.define("allTrue", 0, Some(0), |input, _, _| {
        Ok(Collection::boolean(input.all_true()))
    });
    registry.define("anyTrue", 0, Some(0), |input, _, _| {
        Ok(Collection::boolean(input.any_true()))
    });
    registry.define("allFalse", 0, Some(0), |input, _, _| {
        Ok(Collection::boolean(input.all_false()))
    });
    registry.define("anyFalse", 0, Some(0), |input, _, _| {
        Ok(Collection::boolean(input.any_false()))
    });
}
