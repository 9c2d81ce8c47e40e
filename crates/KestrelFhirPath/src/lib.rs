//! # FHIRPath Expression Engine
//!
//! This crate evaluates FHIRPath expressions against FHIR resources held as
//! JSON. It takes an already-parsed expression tree ([`Expression`]) and a
//! context ([`EvaluationContext`]) and produces an ordered [`Collection`] of
//! values. Text parsing is left to the caller; trees can be built with the
//! helpers on [`Expression`] or deserialized from JSON.
//!
//! ## Overview
//!
//! - **Navigate resources** with member access, including polymorphic
//!   `value[x]` fields (`Observation.value` finds `valueQuantity`)
//! - **Filter and project** with `where`, `select`, `all`, `exists`, `repeat`
//!   and `aggregate`, which bind `$this`, `$index` and `$total`
//! - **Compute** with three-valued boolean logic, Integer/Decimal/Quantity
//!   arithmetic, unit-aware comparison and calendar arithmetic on dates
//! - **Extend** the function library through a [`FunctionRegistry`]
//!
//! ## Architecture
//!
//! - **Parse trees** (`ast.rs`): the expression node types and builders
//! - **Evaluator** (`evaluator.rs`): walks the tree, dispatching special forms
//!   and registry functions
//! - **Operators** (`operators.rs`): equality, equivalence, ordering, arithmetic
//! - **Function Modules**: one file per family of built-in functions
//! - **Context** (`context.rs`): root, variables, limits, cancellation, deadline
//! - **Engine** (`engine.rs`): configuration plus convenience entry points
//! - **Support Types**: values, collections and errors from `kestrel_fhirpath_support`
//!
//! ## Usage Examples
//!
//! ```rust
//! use kestrel_fhirpath::{EvaluationContext, Expression, evaluate};
//! use kestrel_fhirpath::ast::BinaryOperator;
//!
//! let context = EvaluationContext::from_json_slice(br#"{
//!     "resourceType": "Patient",
//!     "name": [{"use": "official", "family": "Chalmers"}, {"use": "usual", "given": ["Jim"]}]
//! }"#)?;
//!
//! // Patient.name.where(use = 'official').family
//! let official = Expression::path("Patient.name")
//!     .call(
//!         "where",
//!         vec![Expression::binary(
//!             BinaryOperator::Equal,
//!             Expression::identifier("use"),
//!             Expression::string("official"),
//!         )],
//!     )
//!     .member("family");
//!
//! let result = evaluate(&official, &context)?;
//! assert_eq!(result.first().and_then(|v| v.as_str()), Some("Chalmers"));
//! # Ok::<(), kestrel_fhirpath::EvaluationError>(())
//! ```
//!
//! ### Engine
//!
//! ```rust
//! use kestrel_fhirpath::{EngineConfig, Expression, FhirPathEngine};
//!
//! let engine = FhirPathEngine::with_config(EngineConfig::default());
//! let context = engine.context_from_json(br#"{"resourceType": "Patient", "active": true}"#)?;
//! assert!(engine.evaluate_to_boolean(&Expression::path("Patient.active"), &context)?);
//! # Ok::<(), kestrel_fhirpath::EvaluationError>(())
//! ```

pub mod aggregate_function;
pub mod ast;
pub mod boolean_functions;
pub mod cancellation;
pub mod cli;
pub mod collection_functions;
pub mod collection_navigation;
pub mod config;
pub mod context;
pub mod conversion_functions;
pub mod date_functions;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod extension_function;
pub mod fhir_type_hierarchy;
pub mod json_utils;
pub mod math_functions;
pub mod operators;
pub mod regex_cache;
pub mod registry;
pub mod repeat_function;
pub mod resolver;
pub mod set_operations;
pub mod string_functions;
pub mod subset_functions;
pub mod trace_function;
pub mod type_function;

pub use ast::{BinaryOperator, Expression, LiteralKind, TypeOperator, TypeSpecifier, UnaryOperator};
pub use cancellation::CancellationToken;
pub use config::{EngineConfig, Limits, OverflowPolicy, RegexCacheConfig};
pub use context::{ContextBuilder, EvaluationContext};
pub use engine::FhirPathEngine;
pub use evaluator::evaluate;
pub use regex_cache::RegexCache;
pub use registry::{FunctionDefinition, FunctionRegistry};
pub use resolver::{ReferenceResolver, ResolverError, SharedResolver};

pub use kestrel_fhirpath_support::{Collection, ErrorKind, EvaluationError, Quantity, Value};
