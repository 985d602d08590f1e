//! Error types for the risk engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the risk engine
///
/// Cloneable so that a coalesced computation can hand the same failure to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Input errors
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // Pipeline errors
    #[error("Detector '{detector}' failed: {reason}")]
    DetectorFailure { detector: String, reason: String },

    #[error("Aggregation invariant violated: {0}")]
    AggregationInvariantViolation(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error should be shown to the caller as a bad request
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::InvalidIdentifier(_))
    }

    /// Check if this error indicates a programming defect rather than bad input
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Error::AggregationInvariantViolation(_) | Error::Internal(_)
        )
    }

    /// Shorthand for a detector failure
    pub fn detector(detector: &str, reason: impl Into<String>) -> Self {
        Error::DetectorFailure {
            detector: detector.to_string(),
            reason: reason.into(),
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            Error::Deserialization(e.to_string())
        } else {
            Error::Serialization(e.to_string())
        }
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidIdentifier("abc".to_string()).is_user_facing());
        assert!(!Error::InvalidIdentifier("abc".to_string()).is_defect());

        let violation = Error::AggregationInvariantViolation("weights".to_string());
        assert!(violation.is_defect());
        assert!(!violation.is_user_facing());

        let detector = Error::detector("sniper", "bad slot");
        assert!(!detector.is_defect());
        assert_eq!(detector.to_string(), "Detector 'sniper' failed: bad slot");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
