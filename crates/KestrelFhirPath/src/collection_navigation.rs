//! # FHIRPath Collection Navigation
//!
//! Positional subsetting (`skip()`, `take()`, `tail()`) and tree navigation
//! (`children()`, `descendants()`).

use kestrel_fhirpath_support::{Collection, EvaluationError, Value};
use tracing::trace;

use crate::config::OverflowPolicy;
use crate::context::EvaluationContext;
use crate::evaluator::poll_cancellation;
use crate::registry::{FunctionRegistry, integer_arg};

/// Implements the FHIRPath `skip` function
///
/// Syntax: collection.skip(num : Integer) : collection
///
/// Returns all but the first `num` items. A count past the end gives an empty
/// collection and a count of zero or less returns the input unchanged.
///
/// # Examples
///
/// ```text
/// [1, 2, 3].skip(1) = [2, 3]
/// [1, 2, 3].skip(4) = []
/// [1, 2, 3].skip(-1) = [1, 2, 3]
/// ```
pub fn skip(input: &Collection, num: i64) -> Collection {
    input.skip(usize::try_from(num).unwrap_or(0))
}

/// Implements the FHIRPath `take` function
///
/// Syntax: collection.take(num : Integer) : collection
///
/// Returns the first `num` items. A count of zero or less gives an empty
/// collection; a count past the end returns the whole input.
///
/// # Examples
///
/// ```text
/// [1, 2, 3].take(2) = [1, 2]
/// [1, 2, 3].take(5) = [1, 2, 3]
/// [1, 2, 3].take(0) = []
/// ```
pub fn take(input: &Collection, num: i64) -> Collection {
    input.take(usize::try_from(num).unwrap_or(0))
}

/// Direct children of every element, in document order. Primitives have none.
pub fn children(input: &Collection) -> Collection {
    let mut out = Collection::empty();
    for item in input {
        if let Value::Object(obj) = item {
            out.extend(obj.children());
        }
    }
    out
}

/// Implements the FHIRPath `descendants` function
///
/// Every node below the input elements: their children, the children of those,
/// and so on. Equivalent to `repeat(children())` without de-duplication, since
/// a JSON tree cannot revisit a node.
///
/// # Returns
///
/// * All descendants, level by level
/// * `Err(InvalidExpression)` when the result outgrows `maxCollectionSize` under the reject policy
/// * `Err(Timeout)` when the evaluation is cancelled while walking the tree
pub fn descendants(input: &Collection, ctx: &EvaluationContext) -> Result<Collection, EvaluationError> {
    let mut result = Collection::empty();
    let mut level = children(input);
    let mut depth = 0usize;
    while !level.is_empty() {
        poll_cancellation(ctx, depth)?;
        let mut next = Collection::empty();
        for (index, item) in level.iter().enumerate() {
            poll_cancellation(ctx, index)?;
            if let Value::Object(obj) = item {
                next.extend(obj.children());
            }
        }
        result.extend(level);
        ctx.enforce_collection_size(&mut result)?;
        if ctx.limits().collection_overflow == OverflowPolicy::Truncate
            && result.len() >= ctx.limits().max_collection_size
        {
            // anything deeper would be cut off anyway
            break;
        }
        level = next;
        depth += 1;
    }
    trace!(levels = depth, nodes = result.len(), "descendants collected");
    Ok(result)
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("skip", 1, Some(1), |input, args, _| {
        Ok(match integer_arg(args, 0, "skip")? {
            Some(num) => skip(input, num),
            None => Collection::empty(),
        })
    });
    registry.define("take", 1, Some(1), |input, args, _| {
        Ok(match integer_arg(args, 0, "take")? {
            Some(num) => take(input, num),
            None => Collection::empty(),
        })
    });
    registry.define("tail", 0, Some(0), |input, _, _| Ok(input.tail()));
    registry.define("children", 0, Some(0), |input, _, ctx| {
        let mut out = children(input);
        ctx.enforce_collection_size(&mut out)?;
        Ok(out)
    });
    registry.define("descendants", 0, Some(0), |input, _, ctx| descendants(input, ctx));
}
