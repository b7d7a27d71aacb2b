//! Provider error types

use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Bad credentials or environment. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rejected at the declarative boundary, before any network call
    #[error("Invalid value for {field:?}: {message}")]
    Validation { field: String, message: String },

    /// Terminal failure reported by a long-running operation
    #[error("Remote operation failed: {code}: {message}")]
    RemoteOperation { code: String, message: String },

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("API request failed with status {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Cannot parse resource ID {id:?}: {reason}")]
    InvalidResourceId { id: String, reason: String },

    #[error("{context}: {source}")]
    Step {
        context: String,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The innermost error, skipping any step context
    pub fn root(&self) -> &ProviderError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for 404-class failures
    pub fn is_not_found(&self) -> bool {
        match self.root() {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

/// Attach the failed step (and the resource it concerned) to an error
pub trait StepExt<T> {
    fn step<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> StepExt<T> for Result<T> {
    fn step<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| ProviderError::Step {
            context: context(),
            source: Box::new(source),
        })
    }
}
