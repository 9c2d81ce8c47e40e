use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Shared, cloneable handle to an underlying error cause.
pub type ErrorCause = Arc<dyn Error + Send + Sync + 'static>;

/// Error type for FHIRPath evaluation failures.
///
/// Every failure raised while evaluating a parse tree is reported through this
/// enum. Soft conversion failures (`toInteger()` on non-numeric text and similar)
/// never reach it: they produce an empty collection instead.
///
/// # Error Categories
///
/// - **Input Errors**: `Parse` for malformed literals or input documents
/// - **Type Errors**: `TypeError` and `InvalidOperation` for operand mismatches
/// - **Cardinality Errors**: `SingletonExpected` when a singleton was required
/// - **Call Errors**: `FunctionNotFound` and `InvalidArguments`
/// - **Runtime Errors**: `DivisionByZero`, `InvalidPath`, `Timeout`
/// - **Structural Errors**: `InvalidExpression` for malformed trees, unsafe regex
///   patterns and exceeded limits
///
/// Any error can be wrapped in `Located` to record where in the expression it
/// was raised. Use [`EvaluationError::kind`] to look through that wrapper.
///
/// # Examples
///
/// ```rust
/// use kestrel_fhirpath_support::{ErrorKind, EvaluationError};
///
/// let error = EvaluationError::SingletonExpected {
///     operation: "+".to_string(),
///     count: 3,
/// }
/// .at("Patient.name.given + 'x'");
///
/// assert_eq!(error.kind(), ErrorKind::SingletonExpected);
/// ```
#[derive(Debug, Clone)]
pub enum EvaluationError {
    /// Malformed literal text or input document.
    Parse {
        message: String,
        cause: Option<ErrorCause>,
    },
    /// Value of an unexpected type.
    ///
    /// Example: "matches() requires a String input, found Integer"
    TypeError(String),
    /// An operation required a collection of at most one element.
    SingletonExpected { operation: String, count: usize },
    /// No function with this name is registered.
    FunctionNotFound(String),
    /// A function was called with an argument count outside its arity.
    InvalidArguments {
        function: String,
        expected: String,
        actual: usize,
    },
    /// Division or modulus by zero.
    DivisionByZero,
    /// Undefined external constant or unusable navigation path.
    InvalidPath(String),
    /// Evaluation was cancelled or ran past its deadline.
    Timeout(String),
    /// Operator applied to operand types it does not support.
    InvalidOperation {
        operator: String,
        left_type: String,
        right_type: String,
    },
    /// Structurally invalid expression, rejected pattern or exceeded limit.
    InvalidExpression {
        message: String,
        cause: Option<ErrorCause>,
    },
    /// Another error annotated with the expression path it was raised at.
    Located {
        location: String,
        error: Box<EvaluationError>,
    },
}

/// Category of an [`EvaluationError`], independent of any location wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    Type,
    SingletonExpected,
    FunctionNotFound,
    InvalidArguments,
    DivisionByZero,
    InvalidPath,
    Timeout,
    InvalidOperation,
    InvalidExpression,
}

impl EvaluationError {
    pub fn parse(message: impl Into<String>) -> Self {
        EvaluationError::Parse {
            message: message.into(),
            cause: None,
        }
    }

    pub fn parse_with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        EvaluationError::Parse {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn invalid_expression(message: impl Into<String>) -> Self {
        EvaluationError::InvalidExpression {
            message: message.into(),
            cause: None,
        }
    }

    pub fn invalid_expression_with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        EvaluationError::InvalidExpression {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn invalid_operation(
        operator: impl Into<String>,
        left_type: impl Into<String>,
        right_type: impl Into<String>,
    ) -> Self {
        EvaluationError::InvalidOperation {
            operator: operator.into(),
            left_type: left_type.into(),
            right_type: right_type.into(),
        }
    }

    pub fn singleton_expected(operation: impl Into<String>, count: usize) -> Self {
        EvaluationError::SingletonExpected {
            operation: operation.into(),
            count,
        }
    }

    /// Annotates the error with the expression path it was raised at.
    ///
    /// An error that already carries a location keeps its innermost one, so the
    /// reported path is the most specific node that failed.
    pub fn at(self, location: impl Into<String>) -> Self {
        match self {
            located @ EvaluationError::Located { .. } => located,
            error => EvaluationError::Located {
                location: location.into(),
                error: Box::new(error),
            },
        }
    }

    /// Returns the category of this error, looking through location wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvaluationError::Parse { .. } => ErrorKind::Parse,
            EvaluationError::TypeError(_) => ErrorKind::Type,
            EvaluationError::SingletonExpected { .. } => ErrorKind::SingletonExpected,
            EvaluationError::FunctionNotFound(_) => ErrorKind::FunctionNotFound,
            EvaluationError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            EvaluationError::DivisionByZero => ErrorKind::DivisionByZero,
            EvaluationError::InvalidPath(_) => ErrorKind::InvalidPath,
            EvaluationError::Timeout(_) => ErrorKind::Timeout,
            EvaluationError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            EvaluationError::InvalidExpression { .. } => ErrorKind::InvalidExpression,
            EvaluationError::Located { error, .. } => error.kind(),
        }
    }

    /// Returns the error without its location wrapper.
    pub fn innermost(&self) -> &EvaluationError {
        match self {
            EvaluationError::Located { error, .. } => error.innermost(),
            other => other,
        }
    }

    /// The expression path recorded by [`EvaluationError::at`], if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            EvaluationError::Located { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::Parse { message, .. } => write!(f, "Parse Error: {}", message),
            EvaluationError::TypeError(msg) => write!(f, "Type Error: {}", msg),
            EvaluationError::SingletonExpected { operation, count } => write!(
                f,
                "Singleton Expected: {} requires at most one item, found {}",
                operation, count
            ),
            EvaluationError::FunctionNotFound(name) => {
                write!(f, "Function Not Found: {}", name)
            }
            EvaluationError::InvalidArguments {
                function,
                expected,
                actual,
            } => write!(
                f,
                "Invalid Arguments: {}() expects {} argument(s), got {}",
                function, expected, actual
            ),
            EvaluationError::DivisionByZero => write!(f, "Division by zero"),
            EvaluationError::InvalidPath(msg) => write!(f, "Invalid Path: {}", msg),
            EvaluationError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            EvaluationError::InvalidOperation {
                operator,
                left_type,
                right_type,
            } => write!(
                f,
                "Invalid Operation: cannot apply '{}' to {} and {}",
                operator, left_type, right_type
            ),
            EvaluationError::InvalidExpression { message, .. } => {
                write!(f, "Invalid Expression: {}", message)
            }
            EvaluationError::Located { location, error } => {
                write!(f, "{} (at {})", error, location)
            }
        }
    }
}

impl Error for EvaluationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EvaluationError::Parse {
                cause: Some(cause), ..
            }
            | EvaluationError::InvalidExpression {
                cause: Some(cause), ..
            } => Some(cause.as_ref() as &(dyn Error + 'static)),
            EvaluationError::Located { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EvaluationError {
    fn from(err: serde_json::Error) -> Self {
        EvaluationError::parse_with_cause("input is not valid JSON", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_errors_keep_their_kind() {
        let err = EvaluationError::DivisionByZero.at("1 / 0");
        assert_eq!(err.kind(), ErrorKind::DivisionByZero);
        assert_eq!(err.location(), Some("1 / 0"));
        assert_eq!(err.to_string(), "Division by zero (at 1 / 0)");
    }

    #[test]
    fn innermost_location_wins() {
        let err = EvaluationError::TypeError("bad".into())
            .at("inner")
            .at("outer");
        assert_eq!(err.location(), Some("inner"));
    }

    #[test]
    fn json_errors_are_exposed_as_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = EvaluationError::from(json_err);
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_arguments_message() {
        let err = EvaluationError::InvalidArguments {
            function: "substring".into(),
            expected: "1..2".into(),
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invalid Arguments: substring() expects 1..2 argument(s), got 3"
        );
    }
}
