//! # FHIRPath Support Types
//!
//! The value model shared by the evaluator and anything that feeds it data:
//! values, collections, partial-precision temporal types, quantities with UCUM
//! normalization, JSON-backed objects and the evaluation error taxonomy.
//!
//! ## Core Types
//!
//! - [`Value`] - a single FHIRPath value
//! - [`Collection`] - the ordered result of every expression
//! - [`EvaluationError`] - failures raised during evaluation
//!
//! ## Usage Example
//!
//! ```rust
//! use kestrel_fhirpath_support::{Collection, Value};
//!
//! let patient = Collection::from_json_slice(br#"{"resourceType": "Patient", "active": true}"#)
//!     .unwrap();
//! let Some(Value::Object(obj)) = patient.first() else { panic!() };
//! assert_eq!(obj.get("active"), Collection::boolean(true));
//! ```

pub mod arithmetic;
pub mod collection;
pub mod evaluation_error;
pub mod object;
pub mod polymorphic;
pub mod quantity;
pub mod temporal;
pub mod type_info;
pub mod ucum;
pub mod value;

pub use collection::Collection;
pub use evaluation_error::{ErrorCause, ErrorKind, EvaluationError};
pub use object::ObjectValue;
pub use quantity::Quantity;
pub use temporal::{
    CalendarUnit, DatePrecision, DateTimePrecision, PrecisionDate, PrecisionDateTime,
    PrecisionTime, TimePrecision,
};
pub use type_info::TypeInfo;
pub use value::{ComparisonError, Value};
