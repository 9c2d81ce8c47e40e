//! # FHIRPath Extension Function
//!
//! `extension(url)` selects the extensions with the given URL from the
//! `extension` and `modifierExtension` arrays of each input element.

use kestrel_fhirpath_support::{Collection, Value};

use crate::registry::{FunctionRegistry, string_arg};

/// Implementation of the FHIRPath extension() function
///
/// # Arguments
///
/// * `input` - The elements to read extensions from
/// * `url` - The extension URL to match exactly
///
/// # Returns
///
/// * Every matching extension, in input order; empty when nothing matches
///
/// # Examples
///
/// ```text
/// Patient.extension('http://hl7.org/fhir/StructureDefinition/patient-birthPlace').value
/// ```
pub fn extension(input: &Collection, url: &str) -> Collection {
    let mut out = Collection::empty();
    for item in input {
        let Value::Object(obj) = item else {
            continue;
        };
        for field in ["extension", "modifierExtension"] {
            for ext in obj.get(field) {
                let matches = match &ext {
                    Value::Object(e) => e.get("url").first().and_then(Value::as_str) == Some(url),
                    _ => false,
                };
                if matches {
                    out.push(ext);
                }
            }
        }
    }
    out
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("extension", 1, Some(1), |input, args, _| {
        Ok(match string_arg(args, 0, "extension")? {
            Some(url) => extension(input, url),
            None => Collection::empty(),
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BIRTH_PLACE: &str = "http://hl7.org/fhir/StructureDefinition/patient-birthPlace";

    fn patient() -> Collection {
        Collection::from_json(&json!({
            "resourceType": "Patient",
            "extension": [
                {"url": BIRTH_PLACE, "valueAddress": {"city": "Amsterdam"}},
                {"url": "http://example.org/other", "valueString": "x"}
            ],
            "modifierExtension": [
                {"url": BIRTH_PLACE, "valueAddress": {"city": "Utrecht"}}
            ]
        }))
    }

    #[test]
    fn selects_by_url_from_both_arrays() {
        let found = extension(&patient(), BIRTH_PLACE);
        assert_eq!(found.len(), 2);
        let cities: Vec<String> = found
            .iter()
            .filter_map(|e| match e {
                Value::Object(obj) => match obj.get("value").first() {
                    Some(Value::Object(addr)) => addr.get("city").first().and_then(Value::as_str).map(str::to_string),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(cities, vec!["Amsterdam", "Utrecht"]);
    }

    #[test]
    fn unknown_url_is_empty() {
        assert!(extension(&patient(), "http://example.org/missing").is_empty());
        assert!(extension(&Collection::single("text"), BIRTH_PLACE).is_empty());
    }
}
