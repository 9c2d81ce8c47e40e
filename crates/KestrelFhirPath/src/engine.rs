//! Kestrel FHIRPath evaluation engine.
//!
//! [`FhirPathEngine`] bundles everything an evaluation needs besides the
//! expression and the data: configuration, the function registry, the regex
//! cache and an optional reference resolver. It hands out contexts wired to
//! those shared pieces and offers convenience entry points that coerce the
//! result to the shape a caller needs.
//!
//! ## What this engine does
//! - Builds an [`EvaluationContext`] from JSON bytes or a ready-made collection.
//! - Applies the configured limits and the optional whole-evaluation timeout.
//! - Evaluates a parse tree and coerces the result (boolean, string, count, ...).
//!
//! The engine is cheap to clone (it holds shared `Arc` references) and may be
//! used from many threads at once; each evaluation owns its own context.
//!
//! ```rust
//! use kestrel_fhirpath::ast::Expression;
//! use kestrel_fhirpath::engine::FhirPathEngine;
//!
//! let engine = FhirPathEngine::new();
//! let patient = br#"{"resourceType": "Patient", "name": [{"family": "Chalmers"}]}"#;
//! let family = engine
//!     .evaluate_json(&Expression::path("Patient.name.family"), patient)
//!     .unwrap();
//! assert_eq!(family.len(), 1);
//! ```

use std::sync::Arc;

use tracing::debug;

use kestrel_fhirpath_support::{Collection, EvaluationError, Value};

use crate::ast::Expression;
use crate::config::EngineConfig;
use crate::context::{ContextBuilder, EvaluationContext};
use crate::evaluator::evaluate;
use crate::regex_cache::RegexCache;
use crate::registry::FunctionRegistry;
use crate::resolver::SharedResolver;

#[derive(Clone)]
pub struct FhirPathEngine {
    config: EngineConfig,
    functions: Arc<FunctionRegistry>,
    regex: Arc<RegexCache>,
    resolver: Option<SharedResolver>,
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl FhirPathEngine {
    /// Create a new engine with default configuration and the global function registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with an explicit configuration.
    ///
    /// The engine gets its own regex cache sized by `config.regex`; the function
    /// registry is the shared global one until [`with_registry`](Self::with_registry)
    /// replaces it.
    pub fn with_config(config: EngineConfig) -> Self {
        let regex = Arc::new(RegexCache::new(config.regex.clone()));
        Self {
            config,
            functions: FunctionRegistry::global(),
            regex,
            resolver: None,
        }
    }

    /// Use an isolated function registry, e.g. one holding custom functions.
    pub fn with_registry(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    /// Attach a resolver consulted by `resolve()`.
    pub fn with_resolver(mut self, resolver: SharedResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    pub fn regex_cache(&self) -> &Arc<RegexCache> {
        &self.regex
    }

    /// A context builder preconfigured with this engine's limits, registry,
    /// regex cache, resolver and timeout. Add variables or a cancellation
    /// token before building.
    pub fn context_builder(&self, root: impl Into<Collection>) -> ContextBuilder {
        let mut builder = EvaluationContext::builder(root)
            .limits(self.config.limits)
            .functions(self.functions.clone())
            .regex_cache(self.regex.clone());
        if let Some(resolver) = &self.resolver {
            builder = builder.resolver(resolver.clone());
        }
        if let Some(timeout) = self.config.evaluation_timeout() {
            builder = builder.timeout(timeout);
        }
        builder
    }

    pub fn context(&self, root: impl Into<Collection>) -> EvaluationContext {
        self.context_builder(root).build()
    }

    /// Parses a JSON document and builds a context rooted at it.
    pub fn context_from_json(&self, bytes: &[u8]) -> Result<EvaluationContext, EvaluationError> {
        Ok(self.context(Collection::from_json_slice(bytes)?))
    }

    pub fn evaluate(
        &self,
        expr: &Expression,
        context: &EvaluationContext,
    ) -> Result<Collection, EvaluationError> {
        evaluate(expr, context)
    }

    /// Evaluates against a JSON document in one step.
    pub fn evaluate_json(&self, expr: &Expression, bytes: &[u8]) -> Result<Collection, EvaluationError> {
        let context = self.context_from_json(bytes)?;
        evaluate(expr, &context)
    }

    /// Evaluate and coerce the result into a *singleton* boolean.
    ///
    /// The evaluator may produce:
    /// - an empty collection (treated as `false`)
    /// - a single Boolean (returned as-is)
    /// - multi-item collections (`SingletonExpected`) or non-Boolean values (`TypeError`)
    pub fn evaluate_to_boolean(
        &self,
        expr: &Expression,
        context: &EvaluationContext,
    ) -> Result<bool, EvaluationError> {
        let result = evaluate(expr, context)?;
        match result.singleton("boolean result")? {
            None => Ok(false),
            Some(Value::Boolean(b)) => Ok(*b),
            Some(other) => Err(EvaluationError::TypeError(format!(
                "expression '{}' must evaluate to a Boolean, got {}",
                expr,
                other.type_name()
            ))),
        }
    }

    /// Evaluate and render a singleton result as text; `None` for an empty result.
    /// Objects render as their JSON.
    pub fn evaluate_to_string(
        &self,
        expr: &Expression,
        context: &EvaluationContext,
    ) -> Result<Option<String>, EvaluationError> {
        let result = evaluate(expr, context)?;
        Ok(result.singleton("string result")?.map(Value::to_string))
    }

    /// Evaluate and render every element as text.
    pub fn evaluate_to_strings(
        &self,
        expr: &Expression,
        context: &EvaluationContext,
    ) -> Result<Vec<String>, EvaluationError> {
        let result = evaluate(expr, context)?;
        Ok(result.iter().map(Value::to_string).collect())
    }

    pub fn evaluate_count(
        &self,
        expr: &Expression,
        context: &EvaluationContext,
    ) -> Result<usize, EvaluationError> {
        let count = evaluate(expr, context)?.len();
        debug!(expression = %expr, count, "counted result");
        Ok(count)
    }

    /// Whether the expression yields at least one element.
    pub fn evaluate_exists(
        &self,
        expr: &Expression,
        context: &EvaluationContext,
    ) -> Result<bool, EvaluationError> {
        Ok(!evaluate(expr, context)?.is_empty())
    }
}
