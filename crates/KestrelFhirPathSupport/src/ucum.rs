//! # UCUM Unit Normalization
//!
//! A static table mapping common UCUM unit codes to a canonical code of the same
//! dimension and the factor that converts a value into it (`mg` becomes `g`
//! with factor `0.001`). Lookup is exact first and case-insensitive second.
//! Codes the table does not know normalize to themselves with factor 1.
//!
//! The table covers the dimensions that show up in clinical data: mass, length,
//! volume, time, pressure, mass and molar concentration, cell counts, energy,
//! rates, international units and dimensionless ratios.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

/// A known unit: the canonical code of its dimension and the conversion factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDefinition {
    pub code: &'static str,
    pub canonical: &'static str,
    pub factor: Decimal,
}

// (code, canonical code, factor mantissa, factor scale)
const UNIT_TABLE: &[(&str, &str, i64, u32)] = &[
    // mass
    ("g", "g", 1, 0),
    ("kg", "g", 1000, 0),
    ("mg", "g", 1, 3),
    ("ug", "g", 1, 6),
    ("mcg", "g", 1, 6),
    ("ng", "g", 1, 9),
    ("pg", "g", 1, 12),
    ("[lb_av]", "g", 45359237, 5),
    ("[oz_av]", "g", 28349523125, 9),
    // length
    ("m", "m", 1, 0),
    ("km", "m", 1000, 0),
    ("cm", "m", 1, 2),
    ("mm", "m", 1, 3),
    ("um", "m", 1, 6),
    ("nm", "m", 1, 9),
    ("[in_i]", "m", 254, 4),
    ("[ft_i]", "m", 3048, 4),
    // volume
    ("L", "L", 1, 0),
    ("l", "L", 1, 0),
    ("dL", "L", 1, 1),
    ("dl", "L", 1, 1),
    ("cL", "L", 1, 2),
    ("mL", "L", 1, 3),
    ("ml", "L", 1, 3),
    ("uL", "L", 1, 6),
    ("ul", "L", 1, 6),
    ("cm3", "L", 1, 3),
    ("m3", "L", 1000, 0),
    // time
    ("s", "s", 1, 0),
    ("ms", "s", 1, 3),
    ("min", "s", 60, 0),
    ("h", "s", 3600, 0),
    ("d", "s", 86400, 0),
    ("wk", "s", 604800, 0),
    ("mo", "s", 2629800, 0),
    ("a", "s", 31557600, 0),
    // pressure
    ("Pa", "Pa", 1, 0),
    ("kPa", "Pa", 1000, 0),
    ("bar", "Pa", 100000, 0),
    ("mm[Hg]", "Pa", 133322387415, 9),
    ("cm[H2O]", "Pa", 98066500, 6),
    // mass concentration
    ("g/L", "g/L", 1, 0),
    ("g/dL", "g/L", 10, 0),
    ("mg/L", "g/L", 1, 3),
    ("mg/dL", "g/L", 1, 2),
    ("mg/mL", "g/L", 1, 0),
    ("ug/mL", "g/L", 1, 3),
    ("ug/L", "g/L", 1, 6),
    ("ng/mL", "g/L", 1, 6),
    ("pg/mL", "g/L", 1, 9),
    // molar concentration
    ("mol/L", "mol/L", 1, 0),
    ("mmol/L", "mol/L", 1, 3),
    ("umol/L", "mol/L", 1, 6),
    ("nmol/L", "mol/L", 1, 9),
    ("pmol/L", "mol/L", 1, 12),
    // cell counts
    ("/L", "/L", 1, 0),
    ("/mL", "/L", 1000, 0),
    ("/uL", "/L", 1_000_000, 0),
    ("10*3/uL", "/L", 1_000_000_000, 0),
    ("10*6/uL", "/L", 1_000_000_000_000, 0),
    ("10*9/L", "/L", 1_000_000_000, 0),
    ("10*12/L", "/L", 1_000_000_000_000, 0),
    // energy
    ("J", "J", 1, 0),
    ("kJ", "J", 1000, 0),
    ("cal", "J", 4184, 3),
    ("kcal", "J", 4184, 0),
    // rates
    ("/s", "/s", 1, 0),
    ("/min", "/s", 1, 0),
    ("/h", "/s", 1, 0),
    ("{beats}/min", "/s", 1, 0),
    ("{breaths}/min", "/s", 1, 0),
    // international units
    ("[IU]", "[IU]", 1, 0),
    ("[iU]", "[IU]", 1, 0),
    ("m[IU]", "[IU]", 1, 3),
    ("[IU]/L", "[IU]/L", 1, 0),
    ("[IU]/mL", "[IU]/L", 1000, 0),
    ("m[IU]/L", "[IU]/L", 1, 3),
    // dimensionless
    ("1", "1", 1, 0),
    ("%", "1", 1, 2),
    ("[ppm]", "1", 1, 6),
];

/// Factors for per-minute and per-hour rates cannot be written as an integer
/// mantissa with a scale, so they are patched in after the table is loaded.
fn rate_factor(code: &str) -> Option<Decimal> {
    match code {
        "/min" | "{beats}/min" | "{breaths}/min" => Some(Decimal::ONE / Decimal::from(60)),
        "/h" => Some(Decimal::ONE / Decimal::from(3600)),
        _ => None,
    }
}

static UNITS: Lazy<HashMap<&'static str, UnitDefinition>> = Lazy::new(|| {
    UNIT_TABLE
        .iter()
        .map(|&(code, canonical, mantissa, scale)| {
            let factor = rate_factor(code).unwrap_or_else(|| Decimal::new(mantissa, scale));
            (
                code,
                UnitDefinition {
                    code,
                    canonical,
                    factor,
                },
            )
        })
        .collect()
});

static UNITS_CASE_INSENSITIVE: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut folded = HashMap::new();
    for &(code, ..) in UNIT_TABLE {
        folded.entry(code.to_lowercase()).or_insert(code);
    }
    folded
});

/// Looks up a unit code, exactly first and then ignoring case.
pub fn lookup(code: &str) -> Option<UnitDefinition> {
    if let Some(def) = UNITS.get(code) {
        return Some(*def);
    }
    let exact = UNITS_CASE_INSENSITIVE.get(&code.to_lowercase())?;
    UNITS.get(exact).copied()
}

/// Converts `value` in `code` to the canonical unit of its dimension.
///
/// Unknown codes come back unchanged with the original value.
pub fn normalize(value: Decimal, code: &str) -> (Decimal, String) {
    match lookup(code) {
        Some(def) => match value.checked_mul(def.factor) {
            Some(converted) => (converted, def.canonical.to_string()),
            None => (value, code.to_string()),
        },
        None => (value, code.to_string()),
    }
}

/// The canonical code a unit normalizes to.
pub fn canonical_code(code: &str) -> String {
    lookup(code)
        .map(|def| def.canonical.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Whether two codes name the same unit: identical strings, or table entries
/// sharing canonical code and factor (`mL` and `ml`, `[IU]` and `[iU]`).
pub fn are_aliases(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }
    match (lookup(left), lookup(right)) {
        (Some(l), Some(r)) => l.canonical == r.canonical && l.factor == r.factor,
        _ => false,
    }
}

/// Whether values in the two units can be converted into each other.
pub fn are_comparable(left: &str, right: &str) -> bool {
    left == right || canonical_code(left) == canonical_code(right)
}

/// Converts `value` from unit `from` into unit `to`, if both share a dimension.
pub fn convert(value: Decimal, from: &str, to: &str) -> Option<Decimal> {
    if from == to {
        return Some(value);
    }
    let from_def = lookup(from)?;
    let to_def = lookup(to)?;
    if from_def.canonical != to_def.canonical {
        return None;
    }
    value.checked_mul(from_def.factor)?.checked_div(to_def.factor)
}
