//! # FHIRPath Aggregates
//!
//! `aggregate()` folds a collection through an expression with a running
//! `$total`. `sum()`, `min()`, `max()` and `avg()` are the fixed-purpose
//! aggregates; they check for cancellation before touching the input.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use kestrel_fhirpath_support::{Collection, ComparisonError, EvaluationError, Value};

use crate::ast::Expression;
use crate::context::EvaluationContext;
use crate::evaluator::{check_arity, eval, poll_cancellation};
use crate::registry::FunctionRegistry;

/// Implements the FHIRPath aggregate() function
///
/// Syntax: aggregate(aggregator: expression [, init: value]) : value
///
/// The aggregator is evaluated once per element with `$this` bound to the
/// element, `$index` to its position and `$total` to the result of the
/// previous step. `$total` starts as `init`, or empty when no initial value is
/// given. The result of the last step is returned.
///
/// # Examples
///
/// ```text
/// (1 | 2 | 3).aggregate($this + $total, 0) = 6
/// (1 | 2 | 3).aggregate(iif($total.empty(), $this, iif($this < $total, $this, $total))) = 1
/// {}.aggregate($total + 1, 10) = 10
/// ```
pub fn evaluate_aggregate(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("aggregate", args, 1, Some(2))?;
    let mut total = match args.get(1) {
        Some(init) => eval(init, ctx, depth + 1)?,
        None => Collection::empty(),
    };
    for (index, item) in input.iter().enumerate() {
        poll_cancellation(ctx, index)?;
        let scope = ctx.with_item(item, index).with_total(total);
        total = eval(&args[0], &scope, depth + 1)?;
        ctx.enforce_collection_size(&mut total)?;
    }
    Ok(total)
}

fn non_numeric(function: &str, value: &Value) -> EvaluationError {
    EvaluationError::TypeError(format!(
        "{}() expects numeric or Quantity values, found {}",
        function,
        value.type_name()
    ))
}

/// `sum()`: Integer when every element is an Integer, Decimal when any is a
/// Decimal, Quantity for quantities. Empty input gives empty; overflow gives empty.
pub fn sum(input: &Collection, ctx: &EvaluationContext) -> Result<Collection, EvaluationError> {
    ctx.check_cancelled()?;
    let mut items = input.iter();
    let Some(first) = items.next() else {
        return Ok(Collection::empty());
    };
    if !(first.is_numeric() || matches!(first, Value::Quantity(_))) {
        return Err(non_numeric("sum", first));
    }
    let mut total = first.clone();
    for (index, item) in items.enumerate() {
        poll_cancellation(ctx, index + 1)?;
        if !(item.is_numeric() || matches!(item, Value::Quantity(_))) {
            return Err(non_numeric("sum", item));
        }
        match total.add(item)? {
            Some(next) => total = next,
            None => return Ok(Collection::empty()),
        }
    }
    Ok(Collection::single(total))
}

/// `min()` and `max()` over mutually comparable values.
fn extreme(
    function: &str,
    wanted: Ordering,
    input: &Collection,
    ctx: &EvaluationContext,
) -> Result<Collection, EvaluationError> {
    ctx.check_cancelled()?;
    let mut best: Option<&Value> = None;
    for (index, item) in input.iter().enumerate() {
        poll_cancellation(ctx, index)?;
        if matches!(item, Value::Boolean(_) | Value::Object(_)) {
            return Err(EvaluationError::TypeError(format!(
                "{}() cannot order {} values",
                function,
                item.type_name()
            )));
        }
        let Some(current) = best else {
            best = Some(item);
            continue;
        };
        match item.compare(current) {
            Ok(ordering) if ordering == wanted => best = Some(item),
            Ok(_) => {}
            Err(ComparisonError::Ambiguous) => return Ok(Collection::empty()),
            Err(_) => {
                return Err(EvaluationError::invalid_operation(
                    function,
                    current.type_name(),
                    item.type_name(),
                ));
            }
        }
    }
    Ok(best.cloned().into())
}

/// `avg()`: the Decimal mean of numeric values, or the mean Quantity.
pub fn avg(input: &Collection, ctx: &EvaluationContext) -> Result<Collection, EvaluationError> {
    let total = sum(input, ctx)?;
    let Some(total) = total.first() else {
        return Ok(Collection::empty());
    };
    let count = Decimal::from(input.len());
    Ok(match total {
        Value::Quantity(q) => q
            .value
            .checked_div(count)
            .map(|value| Value::quantity(value, q.unit.clone()))
            .into(),
        other => other
            .to_decimal()
            .and_then(|d| d.checked_div(count))
            .map(Value::Decimal)
            .into(),
    })
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("sum", 0, Some(0), |input, _, ctx| sum(input, ctx));
    registry.define("min", 0, Some(0), |input, _, ctx| {
        extreme("min", Ordering::Less, input, ctx)
    });
    registry.define("max", 0, Some(0), |input, _, ctx| {
        extreme("max", Ordering::Greater, input, ctx)
    });
    registry.define("avg", 0, Some(0), |input, _, ctx| avg(input, ctx));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::cancellation::CancellationToken;
    use crate::evaluator::evaluate;
    use kestrel_fhirpath_support::{ErrorKind, Quantity};
    use rust_decimal_macros::dec;

    fn ints(values: &[i64]) -> Collection {
        values.iter().map(|v| Value::Integer(*v)).collect()
    }

    #[test]
    fn aggregate_threads_total() {
        let ctx = EvaluationContext::new(ints(&[1, 2, 3]));
        let expr = Expression::function(
            "aggregate",
            vec![
                Expression::binary(BinaryOperator::Add, Expression::ThisRef, Expression::TotalRef),
                Expression::integer(0),
            ],
        );
        assert_eq!(evaluate(&expr, &ctx).unwrap(), ints(&[6]));
    }

    #[test]
    fn aggregate_of_empty_returns_init() {
        let ctx = EvaluationContext::new(Collection::empty());
        let expr = Expression::function(
            "aggregate",
            vec![
                Expression::binary(BinaryOperator::Add, Expression::ThisRef, Expression::TotalRef),
                Expression::integer(10),
            ],
        );
        assert_eq!(evaluate(&expr, &ctx).unwrap(), ints(&[10]));
    }

    #[test]
    fn sum_widens_to_decimal() {
        let ctx = EvaluationContext::new(Collection::empty());
        assert_eq!(sum(&ints(&[1, 2, 3]), &ctx).unwrap(), ints(&[6]));
        let mixed = Collection::from_vec(vec![Value::Integer(1), Value::Decimal(dec!(0.5))]);
        assert_eq!(sum(&mixed, &ctx).unwrap(), Collection::single(dec!(1.5)));
        assert!(sum(&Collection::empty(), &ctx).unwrap().is_empty());
        assert_eq!(
            sum(&Collection::single("a"), &ctx).unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn sum_of_quantities() {
        let ctx = EvaluationContext::new(Collection::empty());
        let q = Collection::from_vec(vec![
            Value::Quantity(Quantity::new(dec!(1), "g")),
            Value::Quantity(Quantity::new(dec!(500), "mg")),
        ]);
        assert_eq!(
            sum(&q, &ctx).unwrap(),
            Collection::single(Quantity::new(dec!(1.5), "g"))
        );
    }

    #[test]
    fn min_max_avg() {
        let ctx = EvaluationContext::new(Collection::empty());
        let values = ints(&[4, 1, 9]);
        assert_eq!(extreme("min", Ordering::Less, &values, &ctx).unwrap(), ints(&[1]));
        assert_eq!(extreme("max", Ordering::Greater, &values, &ctx).unwrap(), ints(&[9]));
        assert_eq!(avg(&ints(&[1, 2]), &ctx).unwrap(), Collection::single(dec!(1.5)));
    }

    #[test]
    fn aggregates_check_cancellation_first() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = EvaluationContext::builder(Collection::empty())
            .cancellation(token)
            .build();
        assert!(sum(&Collection::empty(), &ctx).unwrap_err().is_timeout());
        assert!(avg(&ints(&[1]), &ctx).unwrap_err().is_timeout());
    }
}
