//! # FHIRPath Type Conversion Functions
//!
//! `toBoolean()`, `toInteger()`, `toDecimal()`, `toString()`, `toDate()`,
//! `toDateTime()`, `toTime()` and `toQuantity()`, with a `convertsTo*`
//! counterpart for each.
//!
//! Conversions are soft: input that cannot be converted gives an empty result
//! (and `false` from the `convertsTo*` form), never an error. Only a
//! multi-element input is an error.

use kestrel_fhirpath_support::quantity::calendar_to_ucum;
use kestrel_fhirpath_support::{Collection, EvaluationError, Quantity, Value, ucum};

use crate::registry::{FunctionRegistry, string_arg};

/// A single-value conversion; `None` when the value does not convert.
type Converter = fn(&Value) -> Option<Value>;

/// Conversion name, `convertsTo*` name and the converter backing both.
const CONVERSIONS: &[(&str, &str, Converter)] = &[
    ("toBoolean", "convertsToBoolean", |v| v.convert_to_boolean().map(Value::Boolean)),
    ("toInteger", "convertsToInteger", |v| v.convert_to_integer().map(Value::Integer)),
    ("toDecimal", "convertsToDecimal", |v| v.convert_to_decimal().map(Value::Decimal)),
    ("toString", "convertsToString", |v| v.convert_to_string().map(Value::String)),
    ("toDate", "convertsToDate", |v| v.convert_to_date().map(Value::Date)),
    ("toDateTime", "convertsToDateTime", |v| v.convert_to_date_time().map(Value::DateTime)),
    ("toTime", "convertsToTime", |v| v.convert_to_time().map(Value::Time)),
];

/// Applies `converter` to a singleton input.
///
/// # Returns
///
/// * `Ok(Some(_))` - The converted value
/// * `Ok(None)` - The input is empty or does not convert
/// * `Err(SingletonExpected)` - The input has more than one element
fn convert_singleton(
    input: &Collection,
    function: &str,
    converter: impl Fn(&Value) -> Option<Value>,
) -> Result<Option<Value>, EvaluationError> {
    Ok(input.singleton(&format!("{}()", function))?.and_then(converter))
}

/// Implements the FHIRPath toQuantity() function
///
/// Syntax: toQuantity([unit : String]) : Quantity
///
/// Numbers become dimensionless quantities and strings are parsed as
/// `<number> [unit]`. With a target unit the quantity is converted through the
/// UCUM table; a unit in another dimension gives empty.
///
/// # Examples
///
/// ```text
/// '5 mg'.toQuantity() = 5 'mg'
/// '1 g'.toQuantity('mg') = 1000 'mg'
/// '1 g'.toQuantity('m') = {}
/// 4.toQuantity() = 4 '1'
/// ```
pub fn to_quantity(value: &Value, unit: Option<&str>) -> Option<Quantity> {
    let quantity = value.convert_to_quantity()?;
    let Some(target) = unit else {
        return Some(quantity);
    };
    let from = calendar_to_ucum(&quantity.unit);
    let to = calendar_to_ucum(target);
    ucum::convert(quantity.value, from, to).map(|converted| Quantity::new(converted, target))
}

pub(crate) fn register(registry: &FunctionRegistry) {
    for &(to_name, converts_name, converter) in CONVERSIONS {
        registry.define(to_name, 0, Some(0), move |input, _, _| {
            Ok(convert_singleton(input, to_name, converter)?.into())
        });
        registry.define(converts_name, 0, Some(0), move |input, _, _| {
            if input.is_empty() {
                return Ok(Collection::empty());
            }
            let converted = convert_singleton(input, converts_name, converter)?;
            Ok(Collection::boolean(converted.is_some()))
        });
    }
    registry.define("toQuantity", 0, Some(1), |input, args, _| {
        let unit = string_arg(args, 0, "toQuantity")?;
        Ok(convert_singleton(input, "toQuantity", |v| to_quantity(v, unit).map(Value::Quantity))?.into())
    });
    registry.define("convertsToQuantity", 0, Some(1), |input, args, _| {
        if input.is_empty() {
            return Ok(Collection::empty());
        }
        let unit = string_arg(args, 0, "convertsToQuantity")?;
        let converted = convert_singleton(input, "convertsToQuantity", |v| {
            to_quantity(v, unit).map(Value::Quantity)
        })?;
        Ok(Collection::boolean(converted.is_some()))
    });
}
