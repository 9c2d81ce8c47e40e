//! # Function Registry
//!
//! A name-keyed table of function definitions. Each definition carries its
//! arity bounds and an implementation that receives the input collection and
//! the already-evaluated argument collections.
//!
//! Registries are ordinary values. [`FunctionRegistry::global`] returns a shared,
//! pre-populated instance for convenience, while [`FunctionRegistry::with_builtins`]
//! and [`FunctionRegistry::empty`] build isolated tables for sandboxing or for
//! testing custom functions.
//!
//! Functions that need their arguments unevaluated (`where`, `select`, `iif`,
//! `ofType`, ...) are evaluated by the evaluator itself; their names are
//! reserved and cannot be registered.
//!
//! ## Registering a custom function
//!
//! ```rust
//! use kestrel_fhirpath::registry::{FunctionDefinition, FunctionRegistry};
//! use kestrel_fhirpath_support::Collection;
//!
//! let registry = FunctionRegistry::with_builtins();
//! registry
//!     .register(FunctionDefinition::new("answer", 0, Some(0), |_, _, _| {
//!         Ok(Collection::single(42))
//!     }))
//!     .unwrap();
//! assert!(registry.has("answer"));
//! assert!(!FunctionRegistry::global().has("answer"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use kestrel_fhirpath_support::{Collection, EvaluationError};

use crate::context::EvaluationContext;

/// Signature of a registered function: input collection, evaluated arguments, context.
pub type FunctionImpl = dyn Fn(&Collection, &[Collection], &EvaluationContext) -> Result<Collection, EvaluationError>
    + Send
    + Sync;

/// Names evaluated directly by the evaluator.
pub const SPECIAL_FORMS: &[&str] = &[
    "where", "select", "all", "exists", "iif", "ofType", "is", "as", "aggregate", "repeat",
    "trace",
];

static GLOBAL_REGISTRY: Lazy<Arc<FunctionRegistry>> =
    Lazy::new(|| Arc::new(FunctionRegistry::with_builtins()));

pub struct FunctionDefinition {
    pub name: String,
    pub min_arity: usize,
    /// `None` means any number of arguments.
    pub max_arity: Option<usize>,
    implementation: Arc<FunctionImpl>,
}

impl FunctionDefinition {
    pub fn new<F>(name: impl Into<String>, min_arity: usize, max_arity: Option<usize>, implementation: F) -> Self
    where
        F: Fn(&Collection, &[Collection], &EvaluationContext) -> Result<Collection, EvaluationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            min_arity,
            max_arity,
            implementation: Arc::new(implementation),
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_arity && self.max_arity.is_none_or(|max| count <= max)
    }

    /// Human-readable arity, e.g. `1`, `0..1` or `2+`.
    pub fn arity(&self) -> String {
        describe_arity(self.min_arity, self.max_arity)
    }

    /// Checks the argument count and runs the implementation.
    pub fn call(
        &self,
        input: &Collection,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> Result<Collection, EvaluationError> {
        if !self.accepts(args.len()) {
            return Err(EvaluationError::InvalidArguments {
                function: self.name.clone(),
                expected: self.arity(),
                actual: args.len(),
            });
        }
        (self.implementation)(input, args, context)
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .finish()
    }
}

pub(crate) fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{}..{}", min, max),
        None => format!("{}+", min),
    }
}

#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<FunctionDefinition>>>,
}

impl FunctionRegistry {
    /// A registry with no functions at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fresh registry holding the built-in function library.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        crate::boolean_functions::register(&registry);
        crate::collection_functions::register(&registry);
        crate::subset_functions::register(&registry);
        crate::set_operations::register(&registry);
        crate::conversion_functions::register(&registry);
        crate::string_functions::register(&registry);
        crate::math_functions::register(&registry);
        crate::aggregate_function::register(&registry);
        crate::collection_navigation::register(&registry);
        crate::date_functions::register(&registry);
        crate::type_function::register(&registry);
        crate::extension_function::register(&registry);
        registry.define("resolve", 0, Some(0), |input, _, ctx| {
            crate::resolver::resolve_references(input, ctx)
        });
        debug!(functions = registry.len(), "built-in function registry ready");
        registry
    }

    /// The shared default registry.
    pub fn global() -> Arc<FunctionRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Adds or replaces a function, returning the definition it replaced.
    ///
    /// Names of evaluator-level forms such as `where` are rejected with
    /// `InvalidExpression`.
    pub fn register(
        &self,
        definition: FunctionDefinition,
    ) -> Result<Option<Arc<FunctionDefinition>>, EvaluationError> {
        if SPECIAL_FORMS.contains(&definition.name.as_str()) {
            return Err(EvaluationError::invalid_expression(format!(
                "'{}' is evaluated by the evaluator and cannot be registered",
                definition.name
            )));
        }
        if let (min, Some(max)) = (definition.min_arity, definition.max_arity) {
            if max < min {
                return Err(EvaluationError::invalid_expression(format!(
                    "'{}' declares max arity {} below min arity {}",
                    definition.name, max, min
                )));
            }
        }
        debug!(name = %definition.name, arity = %definition.arity(), "registering function");
        Ok(self.insert(definition))
    }

    /// Registers a built-in without the reserved-name check.
    pub(crate) fn define<F>(&self, name: &str, min_arity: usize, max_arity: Option<usize>, implementation: F)
    where
        F: Fn(&Collection, &[Collection], &EvaluationContext) -> Result<Collection, EvaluationError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(FunctionDefinition::new(name, min_arity, max_arity, implementation));
    }

    fn insert(&self, definition: FunctionDefinition) -> Option<Arc<FunctionDefinition>> {
        self.functions
            .write()
            .insert(definition.name.clone(), Arc::new(definition))
    }

    pub fn get(&self, name: &str) -> Option<Arc<FunctionDefinition>> {
        self.functions.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Registered names in alphabetical order.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.len())
            .finish()
    }
}

/// Reads an optional singleton argument.
pub(crate) fn optional_arg<'a>(
    args: &'a [Collection],
    index: usize,
    function: &str,
) -> Result<Option<&'a kestrel_fhirpath_support::Value>, EvaluationError> {
    match args.get(index) {
        Some(arg) => arg.singleton(&format!("{}() argument {}", function, index + 1)),
        None => Ok(None),
    }
}

/// Reads an optional singleton Integer argument.
pub(crate) fn integer_arg(
    args: &[Collection],
    index: usize,
    function: &str,
) -> Result<Option<i64>, EvaluationError> {
    match optional_arg(args, index, function)? {
        None => Ok(None),
        Some(value) => value.as_integer().map(Some).ok_or_else(|| {
            EvaluationError::TypeError(format!(
                "{}() expects an Integer argument, found {}",
                function,
                value.type_name()
            ))
        }),
    }
}

/// Reads an optional singleton String argument.
pub(crate) fn string_arg<'a>(
    args: &'a [Collection],
    index: usize,
    function: &str,
) -> Result<Option<&'a str>, EvaluationError> {
    match optional_arg(args, index, function)? {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or_else(|| {
            EvaluationError::TypeError(format!(
                "{}() expects a String argument, found {}",
                function,
                value.type_name()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_fhirpath_support::ErrorKind;

    #[test]
    fn builtins_cover_the_function_library() {
        let registry = FunctionRegistry::with_builtins();
        for name in ["count", "first", "substring", "toInteger", "sum", "children", "resolve"] {
            assert!(registry.has(name), "{}", name);
        }
        for name in SPECIAL_FORMS {
            assert!(!registry.has(name), "{}", name);
        }
    }

    #[test]
    fn special_forms_cannot_be_registered() {
        let registry = FunctionRegistry::empty();
        let err = registry
            .register(FunctionDefinition::new("where", 1, Some(1), |input, _, _| {
                Ok(input.clone())
            }))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidExpression);
    }

    #[test]
    fn registration_replaces_and_returns_previous() {
        let registry = FunctionRegistry::empty();
        let first = FunctionDefinition::new("f", 0, Some(0), |_, _, _| Ok(Collection::single(1)));
        let second = FunctionDefinition::new("f", 0, None, |_, _, _| Ok(Collection::single(2)));
        assert!(registry.register(first).unwrap().is_none());
        let previous = registry.register(second).unwrap().unwrap();
        assert_eq!(previous.max_arity, Some(0));
        assert_eq!(registry.get("f").unwrap().max_arity, None);
        assert_eq!(registry.list(), vec!["f".to_string()]);
    }

    #[test]
    fn arity_is_checked_on_call() {
        let def = FunctionDefinition::new("pair", 1, Some(2), |_, args, _| {
            Ok(Collection::single(args.len() as i64))
        });
        let ctx = EvaluationContext::new(Collection::empty());
        let err = def.call(&Collection::empty(), &[], &ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Arguments: pair() expects 1..2 argument(s), got 0"
        );
        let out = def
            .call(&Collection::empty(), &[Collection::empty(), Collection::empty()], &ctx)
            .unwrap();
        assert_eq!(out, Collection::single(2));
    }

    #[test]
    fn unbounded_arity_is_described() {
        assert_eq!(describe_arity(1, None), "1+");
        assert_eq!(describe_arity(0, Some(1)), "0..1");
        assert_eq!(describe_arity(2, Some(2)), "2");
    }
}
