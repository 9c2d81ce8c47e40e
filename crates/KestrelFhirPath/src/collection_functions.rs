//! # FHIRPath Collection Functions
//!
//! Existence and subsetting functions that look only at the input collection:
//! `empty()`, `count()`, `distinct()`, `isDistinct()`, `single()`, `first()`
//! and `last()`. `where()`, `select()`, `all()` and `exists()` need their
//! argument unevaluated and live in the evaluator.

use kestrel_fhirpath_support::{Collection, EvaluationError, Value};

use crate::registry::FunctionRegistry;

/// Implements the FHIRPath count() function
///
/// # Returns
///
/// * The number of elements as an Integer; `0` for an empty input
///
/// # Examples
///
/// ```text
/// Patient.name.count() = 2
/// {}.count() = 0
/// ```
pub fn count(input: &Collection) -> Collection {
    Collection::single(Value::Integer(input.len() as i64))
}

/// Implements the FHIRPath single() function
///
/// Returns the input when it holds at most one element.
///
/// # Returns
///
/// * The single element, or empty for an empty input
/// * `Err(SingletonExpected)` when the input has more than one element
pub fn single(input: &Collection) -> Result<Collection, EvaluationError> {
    input.single_or_error()
}

pub fn first(input: &Collection) -> Collection {
    input.first().cloned().into()
}

pub fn last(input: &Collection) -> Collection {
    input.last().cloned().into()
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("empty", 0, Some(0), |input, _, _| {
        Ok(Collection::boolean(input.is_empty()))
    });
    registry.define("count", 0, Some(0), |input, _, _| Ok(count(input)));
    registry.define("distinct", 0, Some(0), |input, _, ctx| {
        ctx.check_cancelled()?;
        Ok(input.distinct())
    });
    registry.define("isDistinct", 0, Some(0), |input, _, ctx| {
        ctx.check_cancelled()?;
        Ok(Collection::boolean(input.is_distinct()))
    });
    registry.define("single", 0, Some(0), |input, _, _| single(input));
    registry.define("first", 0, Some(0), |input, _, _| Ok(first(input)));
    registry.define("last", 0, Some(0), |input, _, _| Ok(last(input)));
}
