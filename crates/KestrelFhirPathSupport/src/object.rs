//! Structured values backed by a JSON object.
//!
//! An [`ObjectValue`] is a cheap, shareable handle: clones share the underlying
//! node. Fields that exist are converted into collections once and cached on
//! the node, so repeated navigation of the same path does not redo the
//! conversion. Missing fields are not cached, which keeps the cache bounded by
//! the object's own keys.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::{Map, Value as JsonValue};

use crate::collection::Collection;
use crate::polymorphic::{fhir_type_for_suffix, resolve_choice};
use crate::quantity::Quantity;
use crate::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::value::Value;

struct ObjectNode {
    fields: Map<String, JsonValue>,
    type_name: Option<String>,
    cache: RwLock<HashMap<String, Collection>>,
}

#[derive(Clone)]
pub struct ObjectValue {
    node: Arc<ObjectNode>,
}

impl ObjectValue {
    /// Wraps a JSON object. The type is taken from `resourceType` when present,
    /// otherwise from `type_hint` (the FHIR type a choice suffix named).
    pub fn new(fields: Map<String, JsonValue>, type_hint: Option<&str>) -> Self {
        let type_name = fields
            .get("resourceType")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .or_else(|| type_hint.map(str::to_string));
        Self {
            node: Arc::new(ObjectNode {
                fields,
                type_name,
                cache: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The FHIR type of this object, if known.
    pub fn type_name(&self) -> Option<&str> {
        self.node.type_name.as_deref()
    }

    /// Whether this object is a resource (carries `resourceType`).
    pub fn is_resource(&self) -> bool {
        self.node.fields.contains_key("resourceType")
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.node.fields
    }

    pub fn is_empty(&self) -> bool {
        self.node.fields.is_empty()
    }

    /// Navigates to a child field, resolving choice elements through their
    /// type-suffixed keys. Missing fields yield an empty collection.
    pub fn get(&self, name: &str) -> Collection {
        if let Some(cached) = self.node.cache.read().get(name) {
            return cached.clone();
        }
        let resolved = match self.node.fields.get(name) {
            Some(json) => json_to_collection(json, None),
            None => match resolve_choice(&self.node.fields, name) {
                Some((json, suffix)) => json_to_collection(json, Some(suffix)),
                None => return Collection::empty(),
            },
        };
        self.node
            .cache
            .write()
            .insert(name.to_string(), resolved.clone());
        resolved
    }

    #[cfg(test)]
    fn cached_fields(&self) -> usize {
        self.node.cache.read().len()
    }

    /// All child values in document order, excluding `resourceType` and
    /// primitive extension (`_field`) entries.
    pub fn children(&self) -> Collection {
        let mut out = Collection::empty();
        for key in self.node.fields.keys() {
            if key == "resourceType" || key.starts_with('_') {
                continue;
            }
            out.extend(self.get(key));
        }
        out
    }

    /// Reads a FHIR Quantity-shaped object (`value` plus `code` or `unit`).
    pub fn as_quantity(&self) -> Option<Quantity> {
        let value = json_decimal(self.node.fields.get("value")?)?;
        let unit = self
            .node
            .fields
            .get("code")
            .or_else(|| self.node.fields.get("unit"))
            .and_then(JsonValue::as_str)
            .unwrap_or("");
        Some(Quantity::new(value, unit))
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.node.fields.clone())
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node) || self.node.fields == other.node.fields
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type_name", &self.node.type_name)
            .field("fields", &self.node.fields.len())
            .finish()
    }
}

fn json_decimal(json: &JsonValue) -> Option<Decimal> {
    let JsonValue::Number(number) = json else {
        return None;
    };
    if let Some(i) = number.as_i64() {
        return Some(Decimal::from(i));
    }
    Decimal::from_str(&number.to_string())
        .ok()
        .or_else(|| number.as_f64().and_then(Decimal::from_f64))
}

/// Converts a JSON node to a collection. Arrays flatten into their elements,
/// `null` is empty. `suffix` is the choice-type suffix the node was found under
/// and drives conversion of string-encoded primitives.
pub fn json_to_collection(json: &JsonValue, suffix: Option<&str>) -> Collection {
    match json {
        JsonValue::Null => Collection::empty(),
        JsonValue::Array(items) => items
            .iter()
            .flat_map(|item| json_to_collection(item, suffix))
            .collect(),
        other => json_to_value(other, suffix).into_iter().collect(),
    }
}

fn json_to_value(json: &JsonValue, suffix: Option<&str>) -> Option<Value> {
    match json {
        JsonValue::Bool(b) => Some(Value::Boolean(*b)),
        JsonValue::Number(n) => match (n.as_i64(), suffix) {
            (Some(i), Some("Decimal")) => Some(Value::Decimal(Decimal::from(i))),
            (Some(i), _) => Some(Value::Integer(i)),
            (None, _) => json_decimal(json).map(Value::Decimal),
        },
        JsonValue::String(s) => Some(match suffix {
            Some("Date") => PrecisionDate::parse(s)
                .map(Value::Date)
                .unwrap_or_else(|| Value::String(s.clone())),
            Some("DateTime") | Some("Instant") => PrecisionDateTime::parse(s)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::String(s.clone())),
            Some("Time") => PrecisionTime::parse(s)
                .map(Value::Time)
                .unwrap_or_else(|| Value::String(s.clone())),
            Some("Integer64") => s
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::String(s.clone())),
            _ => Value::String(s.clone()),
        }),
        JsonValue::Object(map) => {
            let hint = suffix.map(fhir_type_for_suffix);
            Some(Value::Object(ObjectValue::new(map.clone(), hint.as_deref())))
        }
        JsonValue::Null | JsonValue::Array(_) => None,
    }
}
