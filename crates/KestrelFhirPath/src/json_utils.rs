//! JSON rendering of evaluation results
//!
//! Used by the CLI output and by `trace()` logging, so both show values the
//! same way. Quantities become FHIR Quantity objects; dates and times keep
//! their original partial-precision text.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value as JsonValue, json};

use kestrel_fhirpath_support::{Collection, Value, ucum};

/// Converts a quantity to a FHIR Quantity object.
///
/// Units the UCUM table knows get the UCUM `system` and `code`; calendar
/// keywords and unknown units only carry `unit`.
pub fn quantity_to_json(value: &Decimal, unit: &str) -> JsonValue {
    let numeric_value = decimal_to_json(value);
    if ucum::lookup(unit).is_some() {
        json!({
            "value": numeric_value,
            "unit": unit,
            "system": "http://unitsofmeasure.org",
            "code": unit
        })
    } else {
        json!({
            "value": numeric_value,
            "unit": unit
        })
    }
}

/// Integral decimals become JSON integers, everything else a JSON float.
fn decimal_to_json(value: &Decimal) -> JsonValue {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        if let Some(i) = normalized.to_i64() {
            return json!(i);
        }
    }
    value
        .to_f64()
        .map(|f| json!(f))
        .unwrap_or_else(|| JsonValue::String(value.to_string()))
}

pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Boolean(b) => json!(b),
        Value::String(s) => json!(s),
        Value::Integer(i) => json!(i),
        Value::Decimal(d) => decimal_to_json(d),
        Value::Date(_) | Value::DateTime(_) | Value::Time(_) => json!(value.to_string()),
        Value::Quantity(q) => quantity_to_json(&q.value, &q.unit),
        Value::Object(obj) => obj.to_json(),
    }
}

/// A collection as a JSON array.
pub fn collection_to_json(collection: &Collection) -> JsonValue {
    JsonValue::Array(collection.iter().map(value_to_json).collect())
}
