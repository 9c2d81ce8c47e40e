use kestrel_fhirpath_support::{Collection, EvaluationError};
use tracing::trace;

use crate::ast::Expression;
use crate::context::EvaluationContext;
use crate::evaluator::{check_arity, eval, poll_cancellation};

/// Implements the FHIRPath repeat() function
///
/// Syntax: repeat(projection: expression) : collection
///
/// Applies the projection to every element of the input, then to every
/// element of that result, and so on until a round produces nothing new.
/// The input elements themselves are not part of the output unless the
/// projection reaches them from another element; duplicates (by `=`) are
/// dropped, so cyclic structures terminate.
///
/// # Arguments
///
/// * `input` - The collection to start from
/// * `args` - The single projection expression
/// * `ctx` - The evaluation context; the projection runs with `$this` bound to each element
/// * `depth` - Current expression nesting depth
///
/// # Returns
///
/// * Every element reachable through repeated projection, in discovery order
/// * `Err(Timeout)` when cancelled between rounds or between elements
/// * `Err(InvalidExpression)` when the result outgrows the collection limit under the reject policy
///
/// # Examples
///
/// ```text
/// Questionnaire.repeat(item)            // every item, at any nesting level
/// ValueSet.expansion.repeat(contains)   // the full expansion tree, flattened
/// ```
pub fn evaluate_repeat(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("repeat", args, 1, Some(1))?;
    let projection = &args[0];

    let mut result = Collection::empty();
    let mut frontier = input.clone();
    let mut rounds = 0usize;
    while !frontier.is_empty() {
        ctx.check_cancelled()?;
        rounds += 1;
        let mut discovered = Collection::empty();
        for (index, item) in frontier.iter().enumerate() {
            poll_cancellation(ctx, index)?;
            let projected = eval(projection, &ctx.with_item(item, index), depth + 1)?;
            for value in projected {
                if !result.contains_value(&value) && !discovered.contains_value(&value) {
                    discovered.push(value);
                }
            }
        }
        result.extend(discovered.clone());
        ctx.enforce_collection_size(&mut result)?;
        frontier = discovered;
    }
    trace!(rounds, items = result.len(), "repeat reached a fixed point");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Limits, OverflowPolicy};
    use crate::evaluator::evaluate;
    use kestrel_fhirpath_support::ErrorKind;
    use serde_json::json;

    fn questionnaire() -> Collection {
        Collection::from_json(&json!({
            "resourceType": "Questionnaire",
            "item": [
                {"linkId": "1", "item": [{"linkId": "1.1"}, {"linkId": "1.2", "item": [{"linkId": "1.2.1"}]}]},
                {"linkId": "2"}
            ]
        }))
    }

    #[test]
    fn repeat_flattens_nested_items() {
        let ctx = EvaluationContext::new(questionnaire());
        let expr = Expression::function("repeat", vec![Expression::identifier("item")]).member("linkId");
        let ids: Vec<String> = evaluate(&expr, &ctx)
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["1", "2", "1.1", "1.2", "1.2.1"]);
    }

    #[test]
    fn repeat_of_empty_is_empty() {
        let ctx = EvaluationContext::new(Collection::empty());
        let expr = Expression::function("repeat", vec![Expression::identifier("item")]);
        assert!(evaluate(&expr, &ctx).unwrap().is_empty());
    }

    #[test]
    fn repeat_terminates_on_cycles() {
        // 'a' projects to itself forever unless duplicates are dropped
        let ctx = EvaluationContext::new(Collection::single("a"));
        let expr = Expression::function("repeat", vec![Expression::string("a")]);
        assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::single("a"));
    }

    #[test]
    fn repeat_respects_collection_limit() {
        let limits = Limits {
            max_collection_size: 2,
            collection_overflow: OverflowPolicy::Reject,
            ..Limits::default()
        };
        let ctx = EvaluationContext::builder(questionnaire()).limits(limits).build();
        let expr = Expression::function("repeat", vec![Expression::identifier("item")]);
        let err = evaluate(&expr, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExpression);
    }
}
