use serde_json::{json, Value};
use thiserror::Error;

use crate::ranking::embedder::EmbeddingError;

/// Batch-level error type. Anything that reaches the caller as a failed
/// screening request is one of these; per-document problems never are.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unreadable archive: {0}")]
    InvalidArchive(String),

    #[error("No processable documents: {0}")]
    EmptyBatch(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ScreenError {
    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ScreenError::Validation(_) => "VALIDATION_ERROR",
            ScreenError::InvalidArchive(_) => "INVALID_ARCHIVE",
            ScreenError::EmptyBatch(_) => "EMPTY_BATCH",
            ScreenError::Embedding(_) => "EMBEDDING_ERROR",
            ScreenError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// `ERROR` when the caller can fix the input, `FATAL_ERROR` otherwise.
    pub fn status(&self) -> &'static str {
        match self {
            ScreenError::Validation(_)
            | ScreenError::InvalidArchive(_)
            | ScreenError::EmptyBatch(_) => "ERROR",
            ScreenError::Embedding(_) | ScreenError::Internal(_) => "FATAL_ERROR",
        }
    }

    /// Renders the JSON error body returned to the caller.
    pub fn to_body(&self) -> Value {
        let message = match self {
            ScreenError::Embedding(e) => {
                tracing::error!("Embedding error: {e}");
                self.to_string()
            }
            ScreenError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal error occurred while screening the batch".to_string()
            }
            _ => self.to_string(),
        };

        json!({
            "status": self.status(),
            "error": {
                "code": self.code(),
                "message": message
            }
        })
    }
}
