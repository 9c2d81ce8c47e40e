//! # FHIRPath Type Function
//!
//! `type()` reflects on each input element and returns an object with
//! `namespace` and `name` fields, e.g. `{ "namespace": "System", "name": "Integer" }`
//! or `{ "namespace": "FHIR", "name": "Patient" }`.

use serde_json::{Map, Value as JsonValue};

use kestrel_fhirpath_support::{Collection, ObjectValue, TypeInfo, Value};

use crate::registry::FunctionRegistry;

/// FHIRPath type() function implementation
///
/// Returns one type object per input element, in input order.
pub fn type_of(input: &Collection) -> Collection {
    input
        .iter()
        .map(|item| type_object(&item.type_info()))
        .collect()
}

fn type_object(info: &TypeInfo) -> Value {
    let mut fields = Map::new();
    fields.insert("namespace".to_string(), JsonValue::String(info.namespace.clone()));
    fields.insert("name".to_string(), JsonValue::String(info.name.clone()));
    Value::Object(ObjectValue::new(fields, Some("TypeInfo")))
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("type", 0, Some(0), |input, _, _| Ok(type_of(input)));
}
