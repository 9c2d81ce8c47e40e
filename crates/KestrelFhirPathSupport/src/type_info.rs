//! # Type Information
//!
//! Namespace-qualified type names reported by `type()` and consulted by the
//! `is`/`as`/`ofType` type tests.

use std::fmt;

pub const SYSTEM_NAMESPACE: &str = "System";
pub const FHIR_NAMESPACE: &str = "FHIR";

/// A type name together with the namespace it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub namespace: String,
    pub name: String,
}

impl TypeInfo {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn system(name: &str) -> Self {
        Self::new(SYSTEM_NAMESPACE, name)
    }

    pub fn fhir(name: &str) -> Self {
        Self::new(FHIR_NAMESPACE, name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}
