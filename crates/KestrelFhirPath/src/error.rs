//! Error types for the FHIRPath CLI
//!
//! Evaluation itself reports [`EvaluationError`]; this module wraps it together
//! with the I/O and JSON failures the command-line tool can run into.

use std::fmt;

use kestrel_fhirpath_support::EvaluationError;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Error types for CLI operations
#[derive(Debug)]
pub enum CliError {
    /// IO error (file operations, etc.)
    Io(std::io::Error),

    /// JSON serialization/deserialization error
    Json(serde_json::Error),

    /// Evaluation failed
    Evaluation(EvaluationError),

    /// Invalid input parameters
    InvalidInput(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(err) => write!(f, "JSON error: {}", err),
            CliError::Evaluation(err) => write!(f, "Evaluation error: {}", err),
            CliError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::Json(err) => Some(err),
            CliError::Evaluation(err) => Some(err),
            CliError::InvalidInput(_) => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err)
    }
}

impl From<EvaluationError> for CliError {
    fn from(err: EvaluationError) -> Self {
        CliError::Evaluation(err)
    }
}

impl From<String> for CliError {
    fn from(err: String) -> Self {
        CliError::InvalidInput(err)
    }
}
