use std::path::PathBuf;
use thiserror::Error;

/// Session-level errors for a hyperparameter search.
///
/// Every variant is fatal to the session. Trial failures that the search can
/// absorb never surface here; they are reported as
/// [`crate::TrialOutcome::RecoverableFailure`] instead.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search space: {message}")]
    InvalidSpace { message: String },

    #[error("Failed to write audit record to {}: {source}", .path.display())]
    AuditWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Trial {trial_number} failed fatally: {reason}")]
    TrialFailed { trial_number: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Classified failure signalled by the external training procedure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainingError {
    /// Loss or weights diverged (NaN/Inf). Expected while searching over
    /// unstable learning rates.
    #[error("numeric instability: {message}")]
    NumericInstability { message: String },

    /// Anything else: bad paths, missing binaries, crashed trainer.
    #[error("training failed: {message}")]
    Failed { message: String },
}

impl TrainingError {
    pub fn numeric_instability(message: impl Into<String>) -> Self {
        Self::NumericInstability {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Macro for creating invalid-space errors
#[macro_export]
macro_rules! invalid_space {
    ($($arg:tt)*) => {
        $crate::SearchError::InvalidSpace { message: format!($($arg)*) }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SearchError::TrialFailed {
            trial_number: 4,
            reason: "trainer not found".to_string(),
        };

        assert!(error.to_string().contains("Trial 4"));
        assert!(error.to_string().contains("trainer not found"));
    }

    #[test]
    fn test_audit_error_names_path() {
        let error = SearchError::AuditWrite {
            path: PathBuf::from("/tmp/hyp/args.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };

        let message = error.to_string();
        assert!(message.contains("/tmp/hyp/args.txt"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_macro() {
        let err = invalid_space!("range for {} is empty", "lr");
        match err {
            SearchError::InvalidSpace { message } => assert_eq!(message, "range for lr is empty"),
            other => panic!("Expected InvalidSpace error, got {other:?}"),
        }
    }

    #[test]
    fn test_training_error_constructors() {
        assert_eq!(
            TrainingError::numeric_instability("loss is NaN"),
            TrainingError::NumericInstability {
                message: "loss is NaN".to_string()
            }
        );
        assert!(TrainingError::failed("boom").to_string().contains("boom"));
    }
}
