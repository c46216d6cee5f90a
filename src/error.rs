//! Error types for the evaluation pipeline

use thiserror::Error;

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Main error type for the evaluation pipeline
///
/// Structural errors abort the call that raised them. Numeric degeneracies
/// (`DivisionUndefined`, `DegenerateSubgroup`) are localized: analyzers record
/// NaN in the affected row and keep going.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: split '{split}' is empty")]
    InsufficientData { split: String },

    #[error("Division undefined for {quantity} ({context})")]
    DivisionUndefined { context: String, quantity: String },

    #[error("Degenerate subgroup: {context}")]
    DegenerateSubgroup { context: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EvalError {
    /// Whether the error aborts the analysis step.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EvalError::DivisionUndefined { .. } | EvalError::DegenerateSubgroup { .. }
        )
    }
}

impl From<polars::error::PolarsError> for EvalError {
    fn from(err: polars::error::PolarsError) -> Self {
        EvalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EvalError::InsufficientData { split: "calibration-test".to_string() };
        assert_eq!(err.to_string(), "Insufficient data: split 'calibration-test' is empty");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EvalError = io_err.into();
        assert!(matches!(err, EvalError::IoError(_)));
    }

    #[test]
    fn test_fatality_classes() {
        assert!(EvalError::InvalidInput("x".into()).is_fatal());
        assert!(EvalError::InsufficientData { split: "train".into() }.is_fatal());
        assert!(!EvalError::DegenerateSubgroup { context: "sex=1".into() }.is_fatal());
        assert!(!EvalError::DivisionUndefined {
            context: "threshold 0.5".into(),
            quantity: "likelihood_ratio_pos".into(),
        }
        .is_fatal());
    }
}
