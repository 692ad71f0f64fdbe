//! Error types for calbridge.

use std::fmt;

use thiserror::Error;

use crate::event::Action;

/// Errors that can occur while syncing.
#[derive(Error, Debug)]
pub enum CalBridgeError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Pull from source failed: {0}")]
    Pull(String),

    #[error("Recurrence parse error: {0}")]
    RecurrenceParse(String),

    #[error("Invalid identifier '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("Remote conflict for '{id}': {reason}")]
    RemoteConflict { id: String, reason: String },

    #[error("{0}")]
    AggregateBatchFailure(BatchFailure),

    #[error("Remote item not found: {0}")]
    NotFound(String),

    #[error("Invalid event '{id}': {reason}")]
    InvalidEvent { id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Remote temporarily unavailable: {0}")]
    Transient(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CalBridgeError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CalBridgeError::ProviderTimeout(_) | CalBridgeError::Transient(_)
        )
    }

    /// Whether the error is a recurrence translation failure.
    pub fn is_recurrence_error(&self) -> bool {
        matches!(self, CalBridgeError::RecurrenceParse(_))
    }
}

/// One item that could not be applied to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub id: String,
    pub action: Action,
    pub message: String,
}

/// Every item-level failure from one push batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchFailure {
    pub failures: Vec<ItemFailure>,
}

impl BatchFailure {
    pub fn ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} item(s) failed to sync:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {} {}: {}", failure.action, failure.id, failure.message)?;
        }
        Ok(())
    }
}

/// Result type alias for calbridge operations.
pub type CalBridgeResult<T> = Result<T, CalBridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failure_lists_every_item() {
        let failure = BatchFailure {
            failures: vec![
                ItemFailure {
                    id: "e2".to_string(),
                    action: Action::Update,
                    message: "stale sequence".to_string(),
                },
                ItemFailure {
                    id: "e5".to_string(),
                    action: Action::Add,
                    message: "rejected".to_string(),
                },
            ],
        };

        let text = CalBridgeError::AggregateBatchFailure(failure.clone()).to_string();
        assert!(text.starts_with("2 item(s) failed to sync"));
        assert!(text.contains("~ e2: stale sequence"), "got:\n{text}");
        assert!(text.contains("+ e5: rejected"), "got:\n{text}");
        assert_eq!(failure.ids(), vec!["e2", "e5"]);
    }

    #[test]
    fn test_transient_classification() {
        assert!(CalBridgeError::ProviderTimeout(10).is_transient());
        assert!(CalBridgeError::Transient("503".into()).is_transient());
        assert!(!CalBridgeError::Pull("boom".into()).is_transient());
        assert!(CalBridgeError::RecurrenceParse("unsupported recurrence type 'Hourly'".into()).is_recurrence_error());
    }
}
