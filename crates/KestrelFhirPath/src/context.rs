//! # Evaluation Context
//!
//! An [`EvaluationContext`] is created once per top-level evaluation. It holds
//! the root collection, the current focus (`$this`), the loop variables
//! `$index` and `$total`, external variables, limits, the cancellation token,
//! the evaluation deadline, and handles to the function registry, regex
//! cache and reference resolver.
//!
//! Contexts are never mutated during evaluation. Nested per-element
//! evaluation inside `where()`, `select()` and similar functions derives a new
//! context with [`with_this`](EvaluationContext::with_this) and
//! [`with_index`](EvaluationContext::with_index); the caller's context is left
//! untouched. Everything that does not change between scopes lives behind a
//! shared pointer, so deriving a scope only copies the focus.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_fhirpath::context::EvaluationContext;
//! use kestrel_fhirpath_support::Collection;
//!
//! let ctx = EvaluationContext::builder(Collection::single("root"))
//!     .variable("threshold", Collection::single(5))
//!     .build();
//! assert_eq!(ctx.variable("threshold"), Some(&Collection::single(5)));
//! assert_eq!(ctx.variable("%resource"), Some(&Collection::single("root")));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Local};
use parking_lot::Mutex;
use tracing::warn;

use kestrel_fhirpath_support::{Collection, EvaluationError, Value};

use crate::cancellation::CancellationToken;
use crate::config::{Limits, OverflowPolicy};
use crate::regex_cache::RegexCache;
use crate::registry::FunctionRegistry;
use crate::resolver::SharedResolver;

/// State shared by every scope of one evaluation.
struct SharedState {
    root: Collection,
    variables: HashMap<String, Collection>,
    limits: Limits,
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
    resolver: Option<SharedResolver>,
    functions: Arc<FunctionRegistry>,
    regex: Arc<RegexCache>,
    /// Fixed at construction so `now()` is stable within one evaluation.
    now: DateTime<FixedOffset>,
    trace_outputs: Mutex<Vec<(String, Collection)>>,
}

#[derive(Clone)]
pub struct EvaluationContext {
    shared: Arc<SharedState>,
    this: Collection,
    index: Option<usize>,
    total: Option<Collection>,
    scoped: bool,
}

pub struct ContextBuilder {
    root: Collection,
    variables: HashMap<String, Collection>,
    limits: Limits,
    cancellation: Option<CancellationToken>,
    timeout: Option<Duration>,
    resolver: Option<SharedResolver>,
    functions: Option<Arc<FunctionRegistry>>,
    regex: Option<Arc<RegexCache>>,
    now: Option<DateTime<FixedOffset>>,
}

fn variable_key(name: &str) -> &str {
    let name = name.strip_prefix('%').unwrap_or(name);
    name.strip_prefix('`')
        .and_then(|n| n.strip_suffix('`'))
        .unwrap_or(name)
}

impl ContextBuilder {
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Binds an external variable, addressed as `%name` in expressions.
    pub fn variable(mut self, name: &str, value: impl Into<Collection>) -> Self {
        self.variables
            .insert(variable_key(name).to_string(), value.into());
        self
    }

    pub fn resolver(mut self, resolver: SharedResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn regex_cache(mut self, regex: Arc<RegexCache>) -> Self {
        self.regex = Some(regex);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Deadline for the whole evaluation, measured from [`build`](Self::build).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Pins the clock read by `now()`, `today()` and `timeOfDay()`.
    pub fn now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn build(self) -> EvaluationContext {
        let mut variables = self.variables;
        for seeded in ["resource", "context", "rootResource"] {
            variables
                .entry(seeded.to_string())
                .or_insert_with(|| self.root.clone());
        }
        for (name, system) in [
            ("ucum", "http://unitsofmeasure.org"),
            ("sct", "http://snomed.info/sct"),
            ("loinc", "http://loinc.org"),
        ] {
            variables
                .entry(name.to_string())
                .or_insert_with(|| Collection::single(system));
        }

        let shared = SharedState {
            root: self.root,
            variables,
            limits: self.limits,
            cancellation: self.cancellation,
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
            resolver: self.resolver,
            functions: self.functions.unwrap_or_else(FunctionRegistry::global),
            regex: self.regex.unwrap_or_else(RegexCache::global),
            now: self.now.unwrap_or_else(|| Local::now().fixed_offset()),
            trace_outputs: Mutex::new(Vec::new()),
        };
        EvaluationContext {
            this: shared.root.clone(),
            shared: Arc::new(shared),
            index: None,
            total: None,
            scoped: false,
        }
    }
}

impl EvaluationContext {
    pub fn builder(root: impl Into<Collection>) -> ContextBuilder {
        ContextBuilder {
            root: root.into(),
            variables: HashMap::new(),
            limits: Limits::default(),
            cancellation: None,
            timeout: None,
            resolver: None,
            functions: None,
            regex: None,
            now: None,
        }
    }

    /// A context with default limits and the global registry and regex cache.
    pub fn new(root: impl Into<Collection>) -> Self {
        Self::builder(root).build()
    }

    /// Parses JSON input and uses it as the root collection.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, EvaluationError> {
        Ok(Self::new(Collection::from_json_slice(bytes)?))
    }

    pub fn root(&self) -> &Collection {
        &self.shared.root
    }

    /// `$this`: the current focus.
    pub fn this(&self) -> &Collection {
        &self.this
    }

    /// Whether the focus is still the root, i.e. no per-element scope was entered.
    pub fn at_root(&self) -> bool {
        !self.scoped
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn total(&self) -> Option<&Collection> {
        self.total.as_ref()
    }

    /// A scope whose `$this` is `focus`; all other bindings are kept.
    pub fn with_this(&self, focus: impl Into<Collection>) -> Self {
        Self {
            shared: self.shared.clone(),
            this: focus.into(),
            index: self.index,
            total: self.total.clone(),
            scoped: true,
        }
    }

    /// A scope focused on one element of a per-element iteration.
    pub fn with_item(&self, item: &Value, index: usize) -> Self {
        self.with_this(item.clone()).with_index(index)
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_total(mut self, total: Collection) -> Self {
        self.total = Some(total);
        self
    }

    /// Looks up an external variable. A leading `%` and backtick delimiters
    /// are ignored.
    pub fn variable(&self, name: &str) -> Option<&Collection> {
        self.shared.variables.get(variable_key(name))
    }

    /// Like [`variable`](Self::variable), also expanding the `%vs-` and `%ext-` shorthands.
    pub fn resolve_variable(&self, name: &str) -> Option<Collection> {
        if let Some(bound) = self.variable(name) {
            return Some(bound.clone());
        }
        let key = variable_key(name);
        if let Some(value_set) = key.strip_prefix("vs-") {
            return Some(Collection::single(format!(
                "http://hl7.org/fhir/ValueSet/{}",
                value_set
            )));
        }
        key.strip_prefix("ext-").map(|extension| {
            Collection::single(format!(
                "http://hl7.org/fhir/StructureDefinition/{}",
                extension
            ))
        })
    }

    pub fn limits(&self) -> &Limits {
        &self.shared.limits
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.shared.functions
    }

    pub fn regex_cache(&self) -> &RegexCache {
        &self.shared.regex
    }

    pub fn resolver(&self) -> Option<&SharedResolver> {
        self.shared.resolver.as_ref()
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.shared.cancellation.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.shared.deadline
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.shared.now
    }

    /// Deadline for one regex operation: the configured regex timeout, capped
    /// by the evaluation deadline.
    pub fn regex_deadline(&self) -> Instant {
        let own = Instant::now() + self.shared.regex.config().default_timeout();
        match self.shared.deadline {
            Some(deadline) => own.min(deadline),
            None => own,
        }
    }

    /// Fails with `Timeout` once the evaluation was cancelled or ran past its deadline.
    pub fn check_cancelled(&self) -> Result<(), EvaluationError> {
        if self
            .shared
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(EvaluationError::Timeout("evaluation was cancelled".into()));
        }
        if self
            .shared
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            return Err(EvaluationError::Timeout(
                "evaluation exceeded its deadline".into(),
            ));
        }
        Ok(())
    }

    /// Applies `maxCollectionSize` to a collection under construction.
    ///
    /// Under [`OverflowPolicy::Reject`] an oversized collection is an
    /// `InvalidExpression` error; under [`OverflowPolicy::Truncate`] it is cut
    /// down to the limit and a warning is logged.
    pub fn enforce_collection_size(&self, collection: &mut Collection) -> Result<(), EvaluationError> {
        let limit = self.shared.limits.max_collection_size;
        if collection.len() <= limit {
            return Ok(());
        }
        match self.shared.limits.collection_overflow {
            OverflowPolicy::Reject => Err(EvaluationError::invalid_expression(format!(
                "collection of {} elements exceeds maxCollectionSize of {}",
                collection.len(),
                limit
            ))),
            OverflowPolicy::Truncate => {
                warn!(
                    size = collection.len(),
                    limit, "truncating collection to maxCollectionSize"
                );
                collection.truncate(limit);
                Ok(())
            }
        }
    }

    pub(crate) fn record_trace(&self, name: &str, values: Collection) {
        self.shared
            .trace_outputs
            .lock()
            .push((name.to_string(), values));
    }

    /// Everything passed to `trace()` so far, in call order.
    pub fn trace_outputs(&self) -> Vec<(String, Collection)> {
        self.shared.trace_outputs.lock().clone()
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("this", &self.this.len())
            .field("index", &self.index)
            .field("limits", &self.shared.limits)
            .finish()
    }
}
