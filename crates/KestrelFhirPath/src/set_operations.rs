//! # FHIRPath Set Operations
//!
//! `union()`, `combine()`, `intersect()` and `exclude()`. Element identity is
//! FHIRPath `=`, so `1` and `1.0` are the same element while `'a'` and `'A'`
//! are not.

use kestrel_fhirpath_support::{Collection, EvaluationError};

use crate::context::EvaluationContext;
use crate::registry::FunctionRegistry;

/// Implements the FHIRPath union() function
///
/// Syntax: collection.union(other : collection) : collection
///
/// Equivalent to the `|` operator: both inputs merged with duplicates
/// removed, keeping the order in which elements first appear.
///
/// # Examples
///
/// ```text
/// (1 | 2).union(2 | 3) = (1 | 2 | 3)
/// {}.union(1) = 1
/// ```
pub fn union(
    input: &Collection,
    other: &Collection,
    ctx: &EvaluationContext,
) -> Result<Collection, EvaluationError> {
    ctx.check_cancelled()?;
    let mut merged = input.union(other);
    ctx.enforce_collection_size(&mut merged)?;
    Ok(merged)
}

/// Implements the FHIRPath combine() function
///
/// Concatenation of both inputs with duplicates kept.
///
/// # Examples
///
/// ```text
/// (1 | 2).combine(2 | 3) = [1, 2, 2, 3]
/// ```
pub fn combine(
    input: &Collection,
    other: &Collection,
    ctx: &EvaluationContext,
) -> Result<Collection, EvaluationError> {
    let mut combined = input.combine(other);
    ctx.enforce_collection_size(&mut combined)?;
    Ok(combined)
}

/// Implements the FHIRPath intersect() function
///
/// Elements of the input that are also in `other`, de-duplicated.
///
/// # Examples
///
/// ```text
/// [1, 2, 2, 3].intersect([2, 3, 4]) = [2, 3]
/// ```
pub fn intersect(input: &Collection, other: &Collection) -> Collection {
    input.intersect(other)
}

/// Implements the FHIRPath exclude() function
///
/// Elements of the input that are not in `other`. Duplicates in the input are
/// preserved, excluded values never come back.
///
/// # Examples
///
/// ```text
/// [1, 2, 2, 3].exclude([3]) = [1, 2, 2]
/// [1, 2, 2, 3].exclude([2]) = [1, 3]
/// ```
pub fn exclude(input: &Collection, other: &Collection) -> Collection {
    input.exclude(other)
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("union", 1, Some(1), |input, args, ctx| union(input, &args[0], ctx));
    registry.define("combine", 1, Some(1), |input, args, ctx| combine(input, &args[0], ctx));
    registry.define("intersect", 1, Some(1), |input, args, _| Ok(intersect(input, &args[0])));
    registry.define("exclude", 1, Some(1), |input, args, _| Ok(exclude(input, &args[0])));
}
