//! Choice-element (`value[x]`) resolution.
//!
//! FHIR serializes a choice element under a type-suffixed key: `valueQuantity`,
//! `valueString`, `onsetDateTime`. Navigating `value` has to find whichever
//! variant is present. The candidate suffixes live in a data table rather than
//! in branching code, so supporting another FHIR type is a one-line change.

use serde_json::{Map, Value as JsonValue};

/// Type suffixes tried, in order, when a field is not present under its plain name.
pub const CHOICE_TYPE_SUFFIXES: &[&str] = &[
    "Boolean",
    "Integer",
    "Integer64",
    "Decimal",
    "String",
    "Date",
    "DateTime",
    "Time",
    "Instant",
    "Code",
    "Id",
    "Uri",
    "Url",
    "Canonical",
    "Oid",
    "Uuid",
    "Markdown",
    "Base64Binary",
    "PositiveInt",
    "UnsignedInt",
    "Quantity",
    "Age",
    "Duration",
    "Distance",
    "Count",
    "Money",
    "Range",
    "Ratio",
    "RatioRange",
    "Period",
    "SampledData",
    "Attachment",
    "CodeableConcept",
    "CodeableReference",
    "Coding",
    "Identifier",
    "HumanName",
    "Address",
    "ContactPoint",
    "Timing",
    "Reference",
    "Annotation",
    "Signature",
    "Meta",
    "Expression",
    "Dosage",
    "ContactDetail",
    "UsageContext",
    "TriggerDefinition",
    "DataRequirement",
    "ParameterDefinition",
    "RelatedArtifact",
];

/// Finds the variant of choice element `name` present in `fields`.
///
/// Returns the JSON value together with the FHIR type named by its suffix.
pub fn resolve_choice<'a>(
    fields: &'a Map<String, JsonValue>,
    name: &str,
) -> Option<(&'a JsonValue, &'static str)> {
    CHOICE_TYPE_SUFFIXES.iter().find_map(|suffix| {
        let key = format!("{}{}", name, suffix);
        fields.get(&key).map(|value| (value, *suffix))
    })
}

/// FHIR type names the suffix table knows, in the lower-camel form used for
/// primitive types (`dateTime`, `positiveInt`).
pub fn fhir_type_for_suffix(suffix: &str) -> String {
    let mut chars = suffix.chars();
    match chars.next() {
        Some(first) if is_primitive_suffix(suffix) => {
            first.to_lowercase().chain(chars).collect()
        }
        _ => suffix.to_string(),
    }
}

fn is_primitive_suffix(suffix: &str) -> bool {
    matches!(
        suffix,
        "Boolean"
            | "Integer"
            | "Integer64"
            | "Decimal"
            | "String"
            | "Date"
            | "DateTime"
            | "Time"
            | "Instant"
            | "Code"
            | "Id"
            | "Uri"
            | "Url"
            | "Canonical"
            | "Oid"
            | "Uuid"
            | "Markdown"
            | "Base64Binary"
            | "PositiveInt"
            | "UnsignedInt"
    )
}
