//! # FHIR Type Hierarchy
//!
//! Type tests for `is`, `as` and `ofType()`.
//!
//! System values match their own FHIRPath type and every FHIR primitive that
//! maps onto it (`uri` and `code` are Strings, `positiveInt` is an Integer).
//! Objects match their concrete FHIR type, `Resource` when they carry a
//! `resourceType`, and `DomainResource` unless they are one of the resource
//! types that derive from `Resource` directly. Names compare
//! case-insensitively and may be qualified with `System.` or `FHIR.`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use kestrel_fhirpath_support::Value;
use kestrel_fhirpath_support::type_info::{FHIR_NAMESPACE, SYSTEM_NAMESPACE};

use crate::ast::TypeSpecifier;

/// FHIR primitive type (lower-cased) to the System type that represents it.
static PRIMITIVE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("boolean", "Boolean"),
        ("string", "String"),
        ("uri", "String"),
        ("url", "String"),
        ("canonical", "String"),
        ("code", "String"),
        ("id", "String"),
        ("oid", "String"),
        ("uuid", "String"),
        ("markdown", "String"),
        ("base64binary", "String"),
        ("xhtml", "String"),
        ("integer", "Integer"),
        ("positiveint", "Integer"),
        ("unsignedint", "Integer"),
        ("integer64", "Integer"),
        ("decimal", "Decimal"),
        ("date", "Date"),
        ("datetime", "DateTime"),
        ("instant", "DateTime"),
        ("time", "Time"),
        ("quantity", "Quantity"),
    ]
    .into_iter()
    .collect()
});

/// Resource types that derive from `Resource` without going through `DomainResource`.
pub const NON_DOMAIN_RESOURCES: &[&str] = &["Bundle", "Binary", "Parameters"];

/// Profiles of Quantity that are also Quantities.
static QUANTITY_SUBTYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["age", "distance", "duration", "count", "simplequantity", "moneyquantity"]
        .into_iter()
        .collect()
});

/// Checks if a type is a FHIR primitive type.
pub fn is_fhir_primitive_type(type_name: &str) -> bool {
    let lower = type_name.to_lowercase();
    lower != "quantity" && PRIMITIVE_ALIASES.contains_key(lower.as_str())
}

/// Whether a resource type inherits from `DomainResource`.
pub fn is_domain_resource(resource_type: &str) -> bool {
    !NON_DOMAIN_RESOURCES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(resource_type))
}

/// Whether `value` is an instance of the named type (or one of its subtypes).
pub fn type_matches(value: &Value, specifier: &TypeSpecifier) -> bool {
    let namespace = specifier.namespace.as_deref();
    let wanted = specifier.name.to_lowercase();
    match value {
        Value::Object(obj) => {
            if namespace.is_some_and(|ns| ns.eq_ignore_ascii_case(SYSTEM_NAMESPACE)) {
                return false;
            }
            let Some(actual) = obj.type_name() else {
                return false;
            };
            let actual = actual.to_lowercase();
            if actual == wanted {
                return true;
            }
            if obj.is_resource() {
                return wanted == "resource"
                    || (wanted == "domainresource" && is_domain_resource(&actual));
            }
            wanted == "quantity" && QUANTITY_SUBTYPES.contains(actual.as_str())
        }
        primitive => {
            let actual = primitive.type_name().to_lowercase();
            match namespace {
                Some(ns) if ns.eq_ignore_ascii_case(SYSTEM_NAMESPACE) => actual == wanted,
                Some(ns) if ns.eq_ignore_ascii_case(FHIR_NAMESPACE) => PRIMITIVE_ALIASES
                    .get(wanted.as_str())
                    .is_some_and(|system| system.eq_ignore_ascii_case(&actual)),
                Some(_) => false,
                None => {
                    actual == wanted
                        || PRIMITIVE_ALIASES
                            .get(wanted.as_str())
                            .is_some_and(|system| system.eq_ignore_ascii_case(&actual))
                }
            }
        }
    }
}
