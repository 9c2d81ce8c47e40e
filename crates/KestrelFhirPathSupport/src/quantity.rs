//! Quantities: a decimal value with a unit code.
//!
//! Units are UCUM codes or FHIRPath calendar keywords (`year`, `days`, ...).
//! Calendar keywords map onto their UCUM counterparts for conversion, so
//! `1 year` and `12 months` are equivalent while remaining unequal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::ucum;
use crate::value::ComparisonError;

static QUANTITY_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\d+(?:\.\d+)?)\s*(?:'((?:[^'\\]|\\.)*)'|([A-Za-z]+))?\s*$")
        .expect("valid quantity grammar")
});

const CALENDAR_KEYWORDS: &[(&str, &str)] = &[
    ("year", "a"),
    ("years", "a"),
    ("month", "mo"),
    ("months", "mo"),
    ("week", "wk"),
    ("weeks", "wk"),
    ("day", "d"),
    ("days", "d"),
    ("hour", "h"),
    ("hours", "h"),
    ("minute", "min"),
    ("minutes", "min"),
    ("second", "s"),
    ("seconds", "s"),
    ("millisecond", "ms"),
    ("milliseconds", "ms"),
];

/// Relative difference under which two normalized quantities are equivalent.
fn equivalence_tolerance() -> Decimal {
    Decimal::new(1, 6)
}

/// Maps a calendar keyword to its UCUM code. Other units pass through.
pub fn calendar_to_ucum(unit: &str) -> &str {
    CALENDAR_KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == unit)
        .map(|(_, code)| *code)
        .unwrap_or(unit)
}

pub fn is_calendar_keyword(unit: &str) -> bool {
    CALENDAR_KEYWORDS.iter().any(|(keyword, _)| *keyword == unit)
}

fn is_dimensionless(unit: &str) -> bool {
    unit.is_empty() || unit == "1"
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Parses `<number> [unit]` where the unit is a quoted UCUM code
    /// (`'mg/dL'`, with `\'` and `\\` escapes) or a bare word such as `days`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = QUANTITY_GRAMMAR.captures(text)?;
        let value = Decimal::from_str(caps.get(1)?.as_str()).ok()?;
        let unit = match (caps.get(2), caps.get(3)) {
            (Some(quoted), _) => unescape_unit(quoted.as_str()),
            (None, Some(word)) => word.as_str().to_string(),
            (None, None) => String::new(),
        };
        Some(Self { value, unit })
    }

    /// The UCUM code used for conversion, with calendar keywords mapped.
    fn ucum_code(&self) -> &str {
        if is_dimensionless(&self.unit) {
            "1"
        } else {
            calendar_to_ucum(&self.unit)
        }
    }

    /// Exact equality: identical units, or units the UCUM table lists as aliases.
    /// Values are never rescaled, so `1 'kg'` is not equal to `1000 'g'`.
    pub fn equal(&self, other: &Quantity) -> bool {
        let same_unit = self.unit == other.unit
            || (is_dimensionless(&self.unit) && is_dimensionless(&other.unit))
            || (!is_calendar_keyword(&self.unit)
                && !is_calendar_keyword(&other.unit)
                && ucum::are_aliases(&self.unit, &other.unit));
        same_unit && self.value == other.value
    }

    /// Equivalence: both sides normalized to canonical units, equal within a
    /// relative tolerance. Unit codes compare case-insensitively.
    pub fn equivalent(&self, other: &Quantity) -> bool {
        let (left, left_code) = ucum::normalize(self.value, self.ucum_code());
        let (right, right_code) = ucum::normalize(other.value, other.ucum_code());
        if !left_code.eq_ignore_ascii_case(&right_code) {
            return false;
        }
        let scale = left.abs().max(right.abs());
        if scale.is_zero() {
            return true;
        }
        (left - right).abs() <= scale * equivalence_tolerance()
    }

    /// Orders two quantities after converting `other` into this unit.
    pub fn compare(&self, other: &Quantity) -> Result<Ordering, ComparisonError> {
        let converted = self.convert_other(other)?;
        Ok(self.value.cmp(&converted))
    }

    fn convert_other(&self, other: &Quantity) -> Result<Decimal, ComparisonError> {
        if self.unit == other.unit || (is_dimensionless(&self.unit) && is_dimensionless(&other.unit))
        {
            return Ok(other.value);
        }
        ucum::convert(other.value, other.ucum_code(), self.ucum_code()).ok_or_else(|| {
            ComparisonError::IncompatibleUnits {
                left: self.unit.clone(),
                right: other.unit.clone(),
            }
        })
    }

    /// The right operand of `+`/`-` and the unit of the result. A unitless
    /// side is compatible with any unit and takes on the other side's unit.
    fn additive_operand(&self, other: &Quantity) -> Option<(Decimal, String)> {
        match (is_dimensionless(&self.unit), is_dimensionless(&other.unit)) {
            (true, false) => Some((other.value, other.unit.clone())),
            (false, true) => Some((other.value, self.unit.clone())),
            _ => Some((self.convert_other(other).ok()?, self.unit.clone())),
        }
    }

    /// Sum in this quantity's unit. `None` when the units cannot be converted.
    pub fn add(&self, other: &Quantity) -> Option<Quantity> {
        let (converted, unit) = self.additive_operand(other)?;
        Some(Quantity::new(self.value.checked_add(converted)?, unit))
    }

    pub fn subtract(&self, other: &Quantity) -> Option<Quantity> {
        let (converted, unit) = self.additive_operand(other)?;
        Some(Quantity::new(self.value.checked_sub(converted)?, unit))
    }

    /// Product with a composed UCUM unit (`m.m`).
    pub fn multiply(&self, other: &Quantity) -> Option<Quantity> {
        let value = self.value.checked_mul(other.value)?;
        let unit = match (is_dimensionless(&self.unit), is_dimensionless(&other.unit)) {
            (true, true) => String::new(),
            (true, false) => other.ucum_code().to_string(),
            (false, true) => self.ucum_code().to_string(),
            (false, false) => format!("{}.{}", self.ucum_code(), other.ucum_code()),
        };
        Some(Quantity::new(value, unit))
    }

    /// Quotient. Dividing by an equal unit yields a dimensionless `'1'`.
    /// `None` when the divisor is zero.
    pub fn divide(&self, other: &Quantity) -> Option<Quantity> {
        if other.value.is_zero() {
            return None;
        }
        if self.unit == other.unit {
            return Some(Quantity::new(self.value.checked_div(other.value)?, "1"));
        }
        if let Ok(converted) = self.convert_other(other) {
            if converted.is_zero() {
                return None;
            }
            return Some(Quantity::new(self.value.checked_div(converted)?, "1"));
        }
        let unit = match (is_dimensionless(&self.unit), is_dimensionless(&other.unit)) {
            (_, true) => self.unit.clone(),
            (true, false) => format!("/{}", other.ucum_code()),
            (false, false) => format!("{}/{}", self.ucum_code(), other.ucum_code()),
        };
        Some(Quantity::new(self.value.checked_div(other.value)?, unit))
    }

    /// Scales the value, keeping the unit.
    pub fn scale(&self, factor: Decimal) -> Option<Quantity> {
        Some(Quantity::new(self.value.checked_mul(factor)?, self.unit.clone()))
    }

    pub fn negate(&self) -> Quantity {
        Quantity::new(-self.value, self.unit.clone())
    }
}

fn unescape_unit(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", self.value)
        } else if is_calendar_keyword(&self.unit) {
            write!(f, "{} {}", self.value, self.unit)
        } else {
            let escaped = self.unit.replace('\\', "\\\\").replace('\'', "\\'");
            write!(f, "{} '{}'", self.value, escaped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn q(value: Decimal, unit: &str) -> Quantity {
        Quantity::new(value, unit)
    }

    #[test]
    fn parses_quoted_and_keyword_units() {
        assert_eq!(Quantity::parse("10 'mg'"), Some(q(dec!(10), "mg")));
        assert_eq!(Quantity::parse("4.5 days"), Some(q(dec!(4.5), "days")));
        assert_eq!(Quantity::parse("-3"), Some(q(dec!(-3), "")));
        assert_eq!(Quantity::parse("1 'it\\'s'"), Some(q(dec!(1), "it's")));
        assert!(Quantity::parse("mg 10").is_none());
    }

    #[test]
    fn display_reparses_to_equal_quantity() {
        for quantity in [
            q(dec!(1.50), "mg/dL"),
            q(dec!(2), "weeks"),
            q(dec!(7), ""),
            q(dec!(3), "{beats} per min"),
            q(dec!(1), "o'clock\\"),
        ] {
            let reparsed = Quantity::parse(&quantity.to_string()).unwrap();
            assert_eq!(reparsed, quantity);
        }
    }

    #[test]
    fn equality_does_not_rescale() {
        assert!(!q(dec!(10), "kg").equal(&q(dec!(10000), "g")));
        assert!(q(dec!(5), "mL").equal(&q(dec!(5), "ml")));
        assert!(!q(dec!(1), "year").equal(&q(dec!(1), "a")));
    }

    #[test]
    fn equivalence_normalizes_units() {
        assert!(q(dec!(10), "kg").equivalent(&q(dec!(10000), "g")));
        assert!(q(dec!(1), "year").equivalent(&q(dec!(1), "a")));
        assert!(!q(dec!(1), "kg").equivalent(&q(dec!(1), "m")));
    }

    #[test]
    fn compare_converts_to_left_unit() {
        assert_eq!(q(dec!(1), "kg").compare(&q(dec!(999), "g")), Ok(Ordering::Greater));
        assert!(matches!(
            q(dec!(1), "{a}").compare(&q(dec!(1), "{b}")),
            Err(ComparisonError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn arithmetic_keeps_left_unit() {
        assert_eq!(q(dec!(1), "kg").add(&q(dec!(500), "g")), Some(q(dec!(1.5), "kg")));
        assert_eq!(q(dec!(2), "m").multiply(&q(dec!(3), "m")), Some(q(dec!(6), "m.m")));
        assert_eq!(q(dec!(6), "mg").divide(&q(dec!(3), "mg")), Some(q(dec!(2), "1")));
        assert_eq!(q(dec!(6), "mg").divide(&q(dec!(3), "mL")), Some(q(dec!(2), "mg/mL")));
        assert!(q(dec!(1), "m").add(&q(dec!(1), "s")).is_none());
    }

    #[test]
    fn unitless_operand_takes_the_other_unit() {
        let mg = q(dec!(5), "mg");
        let bare = q(dec!(3), "");
        assert_eq!(mg.add(&bare), Some(q(dec!(8), "mg")));
        assert_eq!(bare.add(&mg), Some(q(dec!(8), "mg")));
        assert_eq!(mg.subtract(&bare), Some(q(dec!(2), "mg")));
        assert_eq!(bare.subtract(&mg), Some(q(dec!(-2), "mg")));
        assert_eq!(q(dec!(2), "1").add(&q(dec!(1), "kg")), Some(q(dec!(3), "kg")));
        assert_eq!(bare.add(&q(dec!(1), "")), Some(q(dec!(4), "")));
    }
}
