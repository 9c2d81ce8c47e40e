//! # FHIRPath Values
//!
//! [`Value`] is the closed set of variants a FHIRPath expression can produce:
//! the System primitives, quantities, and structured objects. Values are
//! immutable; objects share their underlying node, so cloning is cheap.
//!
//! Three relations are defined over values:
//!
//! - [`Value::equal`] backs `=`. It is precision sensitive and may be unknown
//!   (`None`) when two temporal values of different precision agree on every
//!   component they share.
//! - [`Value::equivalent`] backs `~`. It never produces unknown: strings compare
//!   case- and whitespace-insensitively, decimals at the coarser scale, and
//!   quantities after unit normalization.
//! - [`Value::compare`] backs the relational operators and reports why two
//!   values cannot be ordered through [`ComparisonError`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::object::ObjectValue;
use crate::quantity::Quantity;
use crate::temporal::{
    DateTimePrecision, PrecisionDate, PrecisionDateTime, PrecisionTime, TimePrecision,
};
use crate::type_info::TypeInfo;

/// Reasons two values cannot be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    /// Temporal values of different precision that agree on every shared component.
    Ambiguous,
    /// The variants have no ordering between them.
    Incomparable {
        left: String,
        right: String,
    },
    /// Quantities whose units cannot be converted into each other.
    IncompatibleUnits {
        left: String,
        right: String,
    },
}

impl fmt::Display for ComparisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonError::Ambiguous => write!(f, "comparison is ambiguous at differing precision"),
            ComparisonError::Incomparable { left, right } => {
                write!(f, "cannot compare {} with {}", left, right)
            }
            ComparisonError::IncompatibleUnits { left, right } => {
                write!(f, "units '{}' and '{}' are not comparable", left, right)
            }
        }
    }
}

impl std::error::Error for ComparisonError {}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Date(PrecisionDate),
    DateTime(PrecisionDateTime),
    Time(PrecisionTime),
    Quantity(Quantity),
    Object(ObjectValue),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn quantity(value: Decimal, unit: impl Into<String>) -> Self {
        Value::Quantity(Quantity::new(value, unit))
    }

    /// Builds an object value from JSON. Non-object JSON yields `None`.
    pub fn object(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Object(map) => Some(Value::Object(ObjectValue::new(map, None))),
            _ => None,
        }
    }

    /// Name of the variant, or the FHIR type of an object when it is known.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Integer(_) => "Integer",
            Value::Decimal(_) => "Decimal",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::Time(_) => "Time",
            Value::Quantity(_) => "Quantity",
            Value::Object(obj) => obj.type_name().unwrap_or("Object"),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        match self {
            Value::Object(obj) => TypeInfo::fhir(obj.type_name().unwrap_or("Element")),
            other => TypeInfo::system(other.type_name()),
        }
    }

    /// `true` for an empty string or an object without fields.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Object(obj) => obj.is_empty(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Decimal(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer and Decimal values widened to Decimal.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Quantity(q) => Some(q.value),
            _ => None,
        }
    }

    /// Quantities, including FHIR Quantity objects.
    pub fn as_quantity(&self) -> Option<Quantity> {
        match self {
            Value::Quantity(q) => Some(q.clone()),
            Value::Object(obj) => obj.as_quantity(),
            _ => None,
        }
    }

    // === Conversions backing the to*/convertsTo* functions ===

    pub fn convert_to_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(1) => Some(true),
            Value::Integer(0) => Some(false),
            Value::Decimal(d) if *d == Decimal::ONE => Some(true),
            Value::Decimal(d) if d.is_zero() => Some(false),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
                "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn convert_to_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::String(s) => {
                let trimmed = s.strip_prefix('+').unwrap_or(s);
                if !trimmed.is_empty()
                    && trimmed
                        .strip_prefix('-')
                        .unwrap_or(trimmed)
                        .chars()
                        .all(|c| c.is_ascii_digit())
                {
                    trimmed.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn convert_to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Boolean(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
            Value::String(s) => {
                let looks_numeric = !s.is_empty()
                    && s.chars()
                        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
                if looks_numeric {
                    Decimal::from_str(s.strip_prefix('+').unwrap_or(s)).ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn convert_to_quantity(&self) -> Option<Quantity> {
        match self {
            Value::Integer(i) => Some(Quantity::new(Decimal::from(*i), "1")),
            Value::Decimal(d) => Some(Quantity::new(*d, "1")),
            Value::Boolean(b) => Some(Quantity::new(
                if *b { Decimal::ONE } else { Decimal::ZERO },
                "1",
            )),
            Value::String(s) => Quantity::parse(s),
            other => other.as_quantity(),
        }
    }

    pub fn convert_to_date(&self) -> Option<PrecisionDate> {
        match self {
            Value::Date(d) => Some(d.clone()),
            Value::DateTime(dt) => Some(dt.date().clone()),
            Value::String(s) => PrecisionDate::parse(s)
                .or_else(|| PrecisionDateTime::parse(s).map(|dt| dt.date().clone())),
            _ => None,
        }
    }

    pub fn convert_to_date_time(&self) -> Option<PrecisionDateTime> {
        match self {
            Value::DateTime(dt) => Some(dt.clone()),
            Value::Date(d) => Some(PrecisionDateTime::from_date(d.clone())),
            Value::String(s) => PrecisionDateTime::parse(s),
            _ => None,
        }
    }

    pub fn convert_to_time(&self) -> Option<PrecisionTime> {
        match self {
            Value::Time(t) => Some(t.clone()),
            Value::String(s) => PrecisionTime::parse(s),
            _ => None,
        }
    }

    /// String form used by `toString()`. Objects have none.
    pub fn convert_to_string(&self) -> Option<String> {
        match self {
            Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    // === Relations ===

    /// Exact equality. `None` means the result is unknown (temporal values of
    /// differing precision that agree on every shared component).
    pub fn equal(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (Value::String(a), Value::String(b)) => Some(a == b),
            (Value::Integer(a), Value::Integer(b)) => Some(a == b),
            (Value::Object(a), Value::Object(b)) => Some(a == b),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(a.to_decimal() == b.to_decimal()),
            (Value::Quantity(a), b) | (b, Value::Quantity(a)) => match b.as_quantity() {
                Some(b) => Some(a.equal(&b)),
                None => Some(false),
            },
            (a, b) if a.is_temporal() || b.is_temporal() => match a.compare_temporal(b) {
                Ok(ordering) => Some(ordering == Ordering::Equal),
                Err(ComparisonError::Ambiguous) => None,
                Err(_) => Some(false),
            },
            _ => Some(false),
        }
    }

    /// Equivalence (`~`). Never unknown.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => normalize_text(a) == normalize_text(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                match (a.to_decimal(), b.to_decimal()) {
                    (Some(a), Some(b)) => {
                        let scale = a.scale().min(b.scale());
                        a.round_dp(scale) == b.round_dp(scale)
                    }
                    _ => false,
                }
            }
            (Value::Quantity(a), b) | (b, Value::Quantity(a)) => {
                b.as_quantity().is_some_and(|b| a.equivalent(&b))
            }
            (a, b) if a.is_temporal() || b.is_temporal() => {
                a.same_temporal_precision(b)
                    && matches!(a.compare_temporal(b), Ok(Ordering::Equal))
            }
            (a, b) => a.equal(b).unwrap_or(false),
        }
    }

    /// Ordering for the relational operators.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ComparisonError> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.to_decimal(), b.to_decimal()) {
                (Some(a), Some(b)) => Ok(a.cmp(&b)),
                _ => Err(self.incomparable(other)),
            },
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Quantity(a), b) => match b.as_quantity() {
                Some(b) => a.compare(&b),
                None => Err(self.incomparable(other)),
            },
            (a, Value::Quantity(b)) => match a.as_quantity() {
                Some(a) => a.compare(b),
                None => Err(self.incomparable(other)),
            },
            (a, b) if a.is_temporal() || b.is_temporal() => a.compare_temporal(b),
            _ => Err(self.incomparable(other)),
        }
    }

    fn incomparable(&self, other: &Value) -> ComparisonError {
        ComparisonError::Incomparable {
            left: self.type_name().to_string(),
            right: other.type_name().to_string(),
        }
    }

    fn is_temporal(&self) -> bool {
        matches!(self, Value::Date(_) | Value::DateTime(_) | Value::Time(_))
    }

    /// Compares temporal values, promoting Date to DateTime and parsing strings
    /// into the type of the other operand.
    fn compare_temporal(&self, other: &Value) -> Result<Ordering, ComparisonError> {
        let ordering = match (self, other) {
            (Value::Date(a), Value::Date(b)) => a.compare(b),
            (Value::Time(a), Value::Time(b)) => a.compare(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.compare(b),
            (Value::Date(a), Value::DateTime(b)) => {
                PrecisionDateTime::from_date(a.clone()).compare(b)
            }
            (Value::DateTime(a), Value::Date(b)) => {
                a.compare(&PrecisionDateTime::from_date(b.clone()))
            }
            (Value::String(s), b) => {
                let coerced = coerce_string_like(s, b).ok_or_else(|| self.incomparable(other))?;
                return coerced.compare_temporal(b);
            }
            (a, Value::String(s)) => {
                let coerced = coerce_string_like(s, a).ok_or_else(|| self.incomparable(other))?;
                return a.compare_temporal(&coerced);
            }
            _ => return Err(self.incomparable(other)),
        };
        ordering.ok_or(ComparisonError::Ambiguous)
    }

    fn same_temporal_precision(&self, other: &Value) -> bool {
        fn level(value: &Value) -> Option<(u8, DateTimePrecision)> {
            let collapse = |p: DateTimePrecision| match p {
                DateTimePrecision::Millisecond => DateTimePrecision::Second,
                p => p,
            };
            match value {
                Value::Date(d) => Some((0, collapse(PrecisionDateTime::from_date(d.clone()).precision()))),
                Value::DateTime(dt) => Some((0, collapse(dt.precision()))),
                Value::Time(t) => {
                    let p = match t.precision() {
                        TimePrecision::Hour => DateTimePrecision::Hour,
                        TimePrecision::Minute => DateTimePrecision::Minute,
                        _ => DateTimePrecision::Second,
                    };
                    Some((1, p))
                }
                _ => None,
            }
        }
        let coerced;
        let (left, right) = match (self, other) {
            (Value::String(s), b) => {
                coerced = coerce_string_like(s, b);
                match &coerced {
                    Some(c) => (c, other),
                    None => return false,
                }
            }
            (a, Value::String(s)) => {
                coerced = coerce_string_like(s, a);
                match &coerced {
                    Some(c) => (self, c),
                    None => return false,
                }
            }
            _ => (self, other),
        };
        match (level(left), level(right)) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        }
    }
}

/// Parses `s` into the temporal variant of `like`.
fn coerce_string_like(s: &str, like: &Value) -> Option<Value> {
    match like {
        Value::Date(_) => PrecisionDate::parse(s)
            .map(Value::Date)
            .or_else(|| PrecisionDateTime::parse(s).map(Value::DateTime)),
        Value::DateTime(_) => PrecisionDateTime::parse(s).map(Value::DateTime),
        Value::Time(_) => PrecisionTime::parse(s).map(Value::Time),
        _ => None,
    }
}

/// Lower-cases and collapses runs of whitespace for string equivalence.
fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Time(t) => write!(f, "{}", t),
            Value::Quantity(q) => write!(f, "{}", q),
            Value::Object(obj) => write!(f, "{}", obj.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Quantity> for Value {
    fn from(value: Quantity) -> Self {
        Value::Quantity(value)
    }
}

impl From<PrecisionDate> for Value {
    fn from(value: PrecisionDate) -> Self {
        Value::Date(value)
    }
}

impl From<PrecisionDateTime> for Value {
    fn from(value: PrecisionDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<PrecisionTime> for Value {
    fn from(value: PrecisionTime) -> Self {
        Value::Time(value)
    }
}

/// Converts a decimal with no fractional part to an Integer value.
pub fn integer_from_decimal(value: Decimal) -> Option<Value> {
    value.trunc().to_i64().map(Value::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> Value {
        Value::Date(PrecisionDate::parse(s).unwrap())
    }

    fn datetime(s: &str) -> Value {
        Value::DateTime(PrecisionDateTime::parse(s).unwrap())
    }

    #[test]
    fn integers_and_decimals_compare_numerically() {
        assert_eq!(Value::Integer(5).equal(&Value::Decimal(dec!(5.0))), Some(true));
        assert_eq!(
            Value::Integer(2).compare(&Value::Decimal(dec!(2.5))),
            Ok(Ordering::Less)
        );
    }

    #[test]
    fn date_precision_drives_equality() {
        assert_eq!(date("2024").equal(&date("2024-06-15")), None);
        assert_eq!(date("2024").equal(&date("2025-06-15")), Some(false));
        assert_eq!(date("2024-06-15").equal(&date("2024-06-15")), Some(true));
    }

    #[test]
    fn ambiguous_date_ordering_is_an_error() {
        assert_eq!(
            date("2024").compare(&date("2024-06-15")),
            Err(ComparisonError::Ambiguous)
        );
        assert_eq!(date("2024").compare(&date("2025-06-15")), Ok(Ordering::Less));
    }

    #[test]
    fn dates_promote_against_date_times() {
        assert_eq!(
            date("2024-06-15").compare(&datetime("2024-06-16T10:00:00Z")),
            Ok(Ordering::Less)
        );
        assert_eq!(date("2024-06-15").equal(&datetime("2024-06-15T10:00:00Z")), None);
    }

    #[test]
    fn strings_coerce_against_temporal_values() {
        let text = Value::string("2024-06-15");
        assert_eq!(text.compare(&date("2024-01-01")), Ok(Ordering::Greater));
        assert!(text.equivalent(&date("2024-06-15")));
    }

    #[test]
    fn string_equivalence_ignores_case_and_whitespace() {
        assert!(Value::string("Hello  World ").equivalent(&Value::string("hello world")));
        assert!(!Value::string("Hello").equivalent(&Value::string("Help")));
        assert_eq!(Value::string("a").equal(&Value::string("A")), Some(false));
    }

    #[test]
    fn decimal_equivalence_uses_coarser_scale() {
        assert!(Value::Decimal(dec!(1.2)).equivalent(&Value::Decimal(dec!(1.23))));
        assert!(!Value::Decimal(dec!(1.2)).equivalent(&Value::Decimal(dec!(1.3))));
    }

    #[test]
    fn temporal_equivalence_requires_same_precision() {
        assert!(!date("2024").equivalent(&date("2024-06-15")));
        assert!(date("2024-06").equivalent(&date("2024-06")));
    }

    #[test]
    fn incomparable_types_are_reported() {
        assert!(matches!(
            Value::Boolean(true).compare(&Value::Integer(1)),
            Err(ComparisonError::Incomparable { .. })
        ));
        assert_eq!(Value::Boolean(true).equal(&Value::Integer(1)), Some(false));
    }

    #[test]
    fn soft_conversions() {
        assert_eq!(Value::string("yes").convert_to_boolean(), Some(true));
        assert_eq!(Value::string("12a").convert_to_integer(), None);
        assert_eq!(Value::string("-12").convert_to_integer(), Some(-12));
        assert_eq!(Value::string("1.50").convert_to_decimal(), Some(dec!(1.50)));
        assert_eq!(Value::string("abc").convert_to_decimal(), None);
        assert_eq!(
            Value::string("5 'mg'").convert_to_quantity(),
            Some(Quantity::new(dec!(5), "mg"))
        );
        assert_eq!(Value::Decimal(dec!(2.0)).convert_to_boolean(), None);
    }

    #[test]
    fn quantities_compare_across_units() {
        let a = Value::quantity(dec!(1), "kg");
        let b = Value::quantity(dec!(999), "g");
        assert_eq!(a.compare(&b), Ok(Ordering::Greater));
        assert_eq!(a.equal(&b), Some(false));
    }
}
