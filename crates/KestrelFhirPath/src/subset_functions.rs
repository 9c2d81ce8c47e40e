//! # FHIRPath Subset Functions
//!
//! `subsetOf()` and `supersetOf()`. An empty collection is a subset of every
//! collection, so `{}.subsetOf(x)` and `x.supersetOf({})` are always `true`.

use kestrel_fhirpath_support::Collection;

use crate::registry::FunctionRegistry;

/// Implements the FHIRPath subsetOf() function
///
/// # Examples
///
/// ```text
/// (1 | 2).subsetOf(1 | 2 | 3) = true
/// (1 | 4).subsetOf(1 | 2 | 3) = false
/// {}.subsetOf(1) = true
/// ```
pub fn subset_of(input: &Collection, other: &Collection) -> Collection {
    Collection::boolean(input.subset_of(other))
}

pub fn superset_of(input: &Collection, other: &Collection) -> Collection {
    Collection::boolean(input.superset_of(other))
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("subsetOf", 1, Some(1), |input, args, _| Ok(subset_of(input, &args[0])));
    registry.define("supersetOf", 1, Some(1), |input, args, _| Ok(superset_of(input, &args[0])));
}
