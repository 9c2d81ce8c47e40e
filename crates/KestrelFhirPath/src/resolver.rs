//! # Reference Resolution
//!
//! `resolve()` turns reference strings (`Patient/123`, absolute URLs) into
//! resources. The engine does not know where resources live, so embedders
//! supply a [`ReferenceResolver`]. Without one, `resolve()` yields an empty
//! collection.

use std::fmt;
use std::sync::Arc;

use kestrel_fhirpath_support::{Collection, EvaluationError, Value};
use tracing::debug;

use crate::context::EvaluationContext;

/// Failure reported by a [`ReferenceResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// No resource exists for the reference; `resolve()` skips it.
    NotFound(String),
    /// The lookup itself failed; evaluation aborts with the message.
    Failed(String),
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::NotFound(reference) => write!(f, "reference not found: {}", reference),
            ResolverError::Failed(message) => write!(f, "reference lookup failed: {}", message),
        }
    }
}

impl std::error::Error for ResolverError {}

/// Looks up referenced resources as raw JSON bytes.
///
/// Implementations are shared across concurrent evaluations.
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolverError>;
}

impl<F> ReferenceResolver for F
where
    F: Fn(&str) -> Result<Vec<u8>, ResolverError> + Send + Sync,
{
    fn resolve(&self, reference: &str) -> Result<Vec<u8>, ResolverError> {
        self(reference)
    }
}

pub type SharedResolver = Arc<dyn ReferenceResolver>;

/// The reference string carried by an input element: plain strings are taken as
/// is, `Reference` objects contribute their `reference` field.
fn reference_string(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .fields()
            .get("reference")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// `resolve()`: resolves every reference in `input` through the context's resolver.
pub fn resolve_references(
    input: &Collection,
    context: &EvaluationContext,
) -> Result<Collection, EvaluationError> {
    let Some(resolver) = context.resolver() else {
        debug!("resolve() called without a resolver");
        return Ok(Collection::empty());
    };

    let mut out = Collection::empty();
    for item in input {
        let Some(reference) = reference_string(item) else {
            continue;
        };
        match resolver.resolve(&reference) {
            Ok(bytes) => out.extend(Collection::from_json_slice(&bytes)?),
            Err(ResolverError::NotFound(_)) => {
                debug!(reference = %reference, "reference did not resolve");
            }
            Err(err @ ResolverError::Failed(_)) => {
                return Err(EvaluationError::invalid_expression_with_cause(
                    format!("could not resolve '{}'", reference),
                    err,
                ));
            }
        }
        context.enforce_collection_size(&mut out)?;
    }
    Ok(out)
}
