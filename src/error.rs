//! Library error type.
//!
//! Malformed input records are never errors: transforms skip them and log a
//! warning. [`FlowError`] only covers failures the caller has to act on.

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A fetch in the current cycle failed; the whole barrier was aborted.
    #[error("failed to fetch {resource}: {message}")]
    Fetch {
        resource: &'static str,
        message: String,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    pub fn fetch(resource: &'static str, message: impl Into<String>) -> Self {
        FlowError::Fetch {
            resource,
            message: message.into(),
        }
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
