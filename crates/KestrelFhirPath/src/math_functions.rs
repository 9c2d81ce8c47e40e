//! # FHIRPath Math Functions
//!
//! `abs()`, `ceiling()`, `exp()`, `floor()`, `ln()`, `log()`, `power()`,
//! `round()`, `sqrt()` and `truncate()` over a singleton Integer, Decimal or
//! (for `abs()`) Quantity. Empty input gives empty, and so does a result that
//! is not a finite number (`sqrt(-1)`, overflow).
//!
//! The transcendental functions are computed in `f64` and converted back to
//! Decimal.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use kestrel_fhirpath_support::value::integer_from_decimal;
use kestrel_fhirpath_support::{Collection, EvaluationError, Value};

use crate::registry::{FunctionRegistry, integer_arg, optional_arg};

/// The numeric input, `None` when empty.
fn numeric_input<'a>(input: &'a Collection, function: &str) -> Result<Option<&'a Value>, EvaluationError> {
    match input.singleton(&format!("{}()", function))? {
        None => Ok(None),
        Some(value @ (Value::Integer(_) | Value::Decimal(_))) => Ok(Some(value)),
        Some(Value::Quantity(_)) if function == "abs" => Ok(input.first()),
        Some(other) => Err(EvaluationError::TypeError(format!(
            "{}() requires a numeric input, found {}",
            function,
            other.type_name()
        ))),
    }
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    value.to_decimal()
}

fn from_f64(value: f64) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| Value::Decimal(d.normalize()))
}

/// Applies an `f64` function to a numeric value.
fn via_f64(value: &Value, f: impl Fn(f64) -> f64) -> Option<Value> {
    from_f64(f(decimal_of(value)?.to_f64()?))
}

pub fn abs(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => i.checked_abs().map(Value::Integer),
        Value::Decimal(d) => Some(Value::Decimal(d.abs())),
        Value::Quantity(q) => Some(Value::quantity(q.value.abs(), q.unit.clone())),
        _ => None,
    }
}

/// Rounds towards an Integer with `f`; Integer inputs are returned unchanged.
fn to_integer(value: &Value, f: impl Fn(Decimal) -> Decimal) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Integer(*i)),
        Value::Decimal(d) => integer_from_decimal(f(*d)),
        _ => None,
    }
}

/// Implements the FHIRPath round() function
///
/// Syntax: round([precision : Integer]) : Decimal
///
/// Rounds half away from zero to `precision` decimal places (default 0).
///
/// # Examples
///
/// ```text
/// 1.5.round() = 2
/// (-1.5).round() = -2
/// 3.14159.round(3) = 3.142
/// ```
pub fn round(value: &Value, precision: u32) -> Option<Value> {
    let d = decimal_of(value)?;
    Some(Value::Decimal(
        d.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero),
    ))
}

/// Implements the FHIRPath power() function
///
/// Integer raised to a non-negative Integer stays an Integer; every other
/// combination is computed as a Decimal. A result that is not a real number
/// (`(-1).power(0.5)`) is empty.
///
/// # Examples
///
/// ```text
/// 2.power(3) = 8
/// 2.5.power(2) = 6.25
/// (-1).power(0.5) = {}
/// ```
pub fn power(base: &Value, exponent: &Value) -> Option<Value> {
    if let (Value::Integer(b), Value::Integer(e)) = (base, exponent) {
        if let Ok(e) = u32::try_from(*e) {
            return b.checked_pow(e).map(Value::Integer);
        }
    }
    let b = decimal_of(base)?.to_f64()?;
    let e = decimal_of(exponent)?.to_f64()?;
    from_f64(b.powf(e))
}

/// Logarithm of `value` to `base`.
pub fn log(value: &Value, base: &Value) -> Option<Value> {
    let v = decimal_of(value)?.to_f64()?;
    let b = decimal_of(base)?.to_f64()?;
    if v <= 0.0 || b <= 0.0 || b == 1.0 {
        return None;
    }
    let result = if b == 10.0 {
        v.log10()
    } else if b == 2.0 {
        v.log2()
    } else {
        v.ln() / b.ln()
    };
    from_f64(result)
}

/// Numeric argument `index`, `TypeError` when it is not a number.
fn numeric_arg<'a>(args: &'a [Collection], index: usize, function: &str) -> Result<Option<&'a Value>, EvaluationError> {
    match optional_arg(args, index, function)? {
        None => Ok(None),
        Some(value) if value.is_numeric() => Ok(Some(value)),
        Some(other) => Err(EvaluationError::TypeError(format!(
            "{}() expects a numeric argument, found {}",
            function,
            other.type_name()
        ))),
    }
}

/// Registers a zero-argument function mapping one numeric value to an optional result.
fn define_unary(registry: &FunctionRegistry, name: &'static str, f: fn(&Value) -> Option<Value>) {
    registry.define(name, 0, Some(0), move |input, _, _| {
        Ok(numeric_input(input, name)?.and_then(f).into())
    });
}

pub(crate) fn register(registry: &FunctionRegistry) {
    define_unary(registry, "abs", abs);
    define_unary(registry, "ceiling", |v| to_integer(v, |d| d.ceil()));
    define_unary(registry, "floor", |v| to_integer(v, |d| d.floor()));
    define_unary(registry, "truncate", |v| to_integer(v, |d| d.trunc()));
    define_unary(registry, "exp", |v| via_f64(v, f64::exp));
    define_unary(registry, "ln", |v| {
        if decimal_of(v)? <= Decimal::ZERO {
            return None;
        }
        via_f64(v, f64::ln)
    });
    define_unary(registry, "sqrt", |v| {
        if decimal_of(v)? < Decimal::ZERO {
            return None;
        }
        via_f64(v, f64::sqrt)
    });
    registry.define("round", 0, Some(1), |input, args, _| {
        let Some(value) = numeric_input(input, "round")? else {
            return Ok(Collection::empty());
        };
        let precision = match integer_arg(args, 0, "round")? {
            None => 0,
            Some(p) => u32::try_from(p).map_err(|_| {
                EvaluationError::invalid_expression(format!(
                    "round() precision must be non-negative, found {}",
                    p
                ))
            })?,
        };
        Ok(round(value, precision).into())
    });
    registry.define("power", 1, Some(1), |input, args, _| {
        let Some(base) = numeric_input(input, "power")? else {
            return Ok(Collection::empty());
        };
        let Some(exponent) = numeric_arg(args, 0, "power")? else {
            return Ok(Collection::empty());
        };
        Ok(power(base, exponent).into())
    });
    registry.define("log", 1, Some(1), |input, args, _| {
        let Some(value) = numeric_input(input, "log")? else {
            return Ok(Collection::empty());
        };
        let Some(base) = numeric_arg(args, 0, "log")? else {
            return Ok(Collection::empty());
        };
        Ok(log(value, base).into())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvaluationContext;
    use kestrel_fhirpath_support::{ErrorKind, Quantity};
    use rust_decimal_macros::dec;

    fn call(name: &str, input: impl Into<Value>, args: &[Value]) -> Result<Collection, EvaluationError> {
        let registry = FunctionRegistry::with_builtins();
        let ctx = EvaluationContext::new(Collection::empty());
        let args: Vec<Collection> = args.iter().cloned().map(Collection::single).collect();
        registry
            .get(name)
            .unwrap()
            .call(&Collection::single(input.into()), &args, &ctx)
    }

    #[test]
    fn rounding_family_returns_integers() {
        assert_eq!(call("ceiling", dec!(1.1), &[]).unwrap(), Collection::single(2));
        assert_eq!(call("floor", dec!(-1.1), &[]).unwrap(), Collection::single(-2));
        assert_eq!(call("truncate", dec!(-1.9), &[]).unwrap(), Collection::single(-1));
        assert_eq!(call("ceiling", 5, &[]).unwrap(), Collection::single(5));
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(round(&Value::Decimal(dec!(1.5)), 0), Some(Value::Decimal(dec!(2))));
        assert_eq!(round(&Value::Decimal(dec!(-1.5)), 0), Some(Value::Decimal(dec!(-2))));
        assert_eq!(
            call("round", dec!(3.14159), &[Value::Integer(3)]).unwrap(),
            Collection::single(dec!(3.142))
        );
        let err = call("round", dec!(1.5), &[Value::Integer(-1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExpression);
    }

    #[test]
    fn abs_keeps_quantity_unit() {
        assert_eq!(call("abs", -5, &[]).unwrap(), Collection::single(5));
        assert_eq!(
            call("abs", Quantity::new(dec!(-2.5), "mg"), &[]).unwrap(),
            Collection::single(Quantity::new(dec!(2.5), "mg"))
        );
        assert!(call("abs", i64::MIN, &[]).unwrap().is_empty());
    }

    #[test]
    fn power_and_roots() {
        assert_eq!(power(&Value::Integer(2), &Value::Integer(3)), Some(Value::Integer(8)));
        assert_eq!(
            power(&Value::Decimal(dec!(2.5)), &Value::Integer(2)),
            Some(Value::Decimal(dec!(6.25)))
        );
        assert_eq!(power(&Value::Integer(-1), &Value::Decimal(dec!(0.5))), None);
        assert_eq!(call("sqrt", 16, &[]).unwrap(), Collection::single(dec!(4)));
        assert!(call("sqrt", -1, &[]).unwrap().is_empty());
    }

    #[test]
    fn logarithms() {
        assert_eq!(call("ln", 1, &[]).unwrap(), Collection::single(dec!(0)));
        assert!(call("ln", 0, &[]).unwrap().is_empty());
        assert_eq!(
            call("log", 100, &[Value::Integer(10)]).unwrap(),
            Collection::single(dec!(2))
        );
    }

    #[test]
    fn non_numeric_input_is_a_type_error() {
        assert_eq!(call("floor", "x", &[]).unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(call("sqrt", Quantity::new(dec!(4), "m"), &[]).unwrap_err().kind(), ErrorKind::Type);
    }
}
