//! Arithmetic on singleton values.
//!
//! Each operation dispatches on the operand variants. `Ok(None)` is an empty
//! result (integer overflow, a date shifted out of range); unsupported operand
//! combinations are `InvalidOperation`, and a zero divisor is always
//! `DivisionByZero`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::evaluation_error::EvaluationError;
use crate::quantity::Quantity;
use crate::temporal::CalendarUnit;
use crate::value::Value;

type ArithmeticResult = Result<Option<Value>, EvaluationError>;

fn invalid(operator: &str, left: &Value, right: &Value) -> EvaluationError {
    EvaluationError::invalid_operation(operator, left.type_name(), right.type_name())
}

fn decimals(left: &Value, right: &Value) -> Option<(Decimal, Decimal)> {
    if left.is_numeric() && right.is_numeric() {
        Some((left.to_decimal()?, right.to_decimal()?))
    } else {
        None
    }
}

fn quantities(left: &Value, right: &Value) -> Option<(Quantity, Quantity)> {
    if matches!(left, Value::Quantity(_)) || matches!(right, Value::Quantity(_)) {
        Some((left.as_quantity()?, right.as_quantity()?))
    } else {
        None
    }
}

/// Shifts a temporal value by a time-valued quantity.
fn shift_temporal(operator: &str, temporal: &Value, quantity: &Quantity, sign: Decimal) -> ArithmeticResult {
    let unit = CalendarUnit::from_unit(&quantity.unit).ok_or_else(|| {
        EvaluationError::invalid_operation(
            operator,
            temporal.type_name(),
            format!("Quantity '{}'", quantity.unit),
        )
    })?;
    let amount = quantity.value * sign;
    Ok(match temporal {
        Value::Date(d) => d.add_duration(amount, unit).map(Value::Date),
        Value::DateTime(dt) => dt.add_duration(amount, unit).map(Value::DateTime),
        Value::Time(t) => t.add_duration(amount, unit).map(Value::Time),
        _ => None,
    })
}

impl Value {
    pub fn add(&self, other: &Value) -> ArithmeticResult {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.checked_add(*b).map(Value::Integer)),
            (Value::String(a), Value::String(b)) => Ok(Some(Value::String(format!("{}{}", a, b)))),
            (Value::Date(_) | Value::DateTime(_) | Value::Time(_), Value::Quantity(q)) => {
                shift_temporal("+", self, q, Decimal::ONE)
            }
            _ => {
                if let Some((a, b)) = decimals(self, other) {
                    return Ok(a.checked_add(b).map(Value::Decimal));
                }
                if let Some((a, b)) = quantities(self, other) {
                    return a
                        .add(&b)
                        .map(|q| Some(Value::Quantity(q)))
                        .ok_or_else(|| invalid("+", self, other));
                }
                Err(invalid("+", self, other))
            }
        }
    }

    pub fn subtract(&self, other: &Value) -> ArithmeticResult {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.checked_sub(*b).map(Value::Integer)),
            (Value::Date(_) | Value::DateTime(_) | Value::Time(_), Value::Quantity(q)) => {
                shift_temporal("-", self, q, Decimal::NEGATIVE_ONE)
            }
            _ => {
                if let Some((a, b)) = decimals(self, other) {
                    return Ok(a.checked_sub(b).map(Value::Decimal));
                }
                if let Some((a, b)) = quantities(self, other) {
                    return a
                        .subtract(&b)
                        .map(|q| Some(Value::Quantity(q)))
                        .ok_or_else(|| invalid("-", self, other));
                }
                Err(invalid("-", self, other))
            }
        }
    }

    pub fn multiply(&self, other: &Value) -> ArithmeticResult {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.checked_mul(*b).map(Value::Integer)),
            (Value::Quantity(q), n) | (n, Value::Quantity(q)) if n.is_numeric() => {
                let factor = n.to_decimal().ok_or_else(|| invalid("*", self, other))?;
                Ok(q.scale(factor).map(Value::Quantity))
            }
            _ => {
                if let Some((a, b)) = decimals(self, other) {
                    return Ok(a.checked_mul(b).map(Value::Decimal));
                }
                if let Some((a, b)) = quantities(self, other) {
                    return Ok(a.multiply(&b).map(Value::Quantity));
                }
                Err(invalid("*", self, other))
            }
        }
    }

    /// `/`: always Decimal for numbers.
    pub fn divide(&self, other: &Value) -> ArithmeticResult {
        if let Some((a, b)) = decimals(self, other) {
            if b.is_zero() {
                return Err(EvaluationError::DivisionByZero);
            }
            return Ok(a.checked_div(b).map(Value::Decimal));
        }
        if let (Value::Quantity(q), n) = (self, other) {
            if n.is_numeric() {
                let divisor = n.to_decimal().ok_or_else(|| invalid("/", self, other))?;
                if divisor.is_zero() {
                    return Err(EvaluationError::DivisionByZero);
                }
                return Ok(q
                    .value
                    .checked_div(divisor)
                    .map(|v| Value::Quantity(Quantity::new(v, q.unit.clone()))));
            }
        }
        if let Some((a, b)) = quantities(self, other) {
            if b.value.is_zero() {
                return Err(EvaluationError::DivisionByZero);
            }
            return Ok(a.divide(&b).map(Value::Quantity));
        }
        Err(invalid("/", self, other))
    }

    /// `div`: truncated integer division.
    pub fn div(&self, other: &Value) -> ArithmeticResult {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvaluationError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(a.checked_div(*b).map(Value::Integer)),
            _ => {
                let (a, b) = decimals(self, other).ok_or_else(|| invalid("div", self, other))?;
                if b.is_zero() {
                    return Err(EvaluationError::DivisionByZero);
                }
                Ok(a
                    .checked_div(b)
                    .and_then(|q| q.trunc().to_i64())
                    .map(Value::Integer))
            }
        }
    }

    /// `mod`: remainder carrying the sign of the dividend.
    pub fn modulo(&self, other: &Value) -> ArithmeticResult {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvaluationError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(a.checked_rem(*b).map(Value::Integer)),
            _ => {
                let (a, b) = decimals(self, other).ok_or_else(|| invalid("mod", self, other))?;
                if b.is_zero() {
                    return Err(EvaluationError::DivisionByZero);
                }
                Ok(a.checked_rem(b).map(Value::Decimal))
            }
        }
    }

    pub fn negate(&self) -> ArithmeticResult {
        match self {
            Value::Integer(i) => Ok(i.checked_neg().map(Value::Integer)),
            Value::Decimal(d) => Ok(Some(Value::Decimal(-*d))),
            Value::Quantity(q) => Ok(Some(Value::Quantity(q.negate()))),
            other => Err(EvaluationError::invalid_operation(
                "unary -",
                other.type_name(),
                "",
            )),
        }
    }
}
