/// Domain-specific error types for hotscore
///
/// Only failures that a caller can act on surface here. Missing signal inputs
/// (no embedding, no topics, empty history) are resolved inside the scorer with
/// fallback values and never become errors.

#[derive(Debug, thiserror::Error)]
pub enum HotScoreError {
    #[error("Dimension mismatch: vectors have lengths {left} and {right}")]
    DimensionMismatch {
        left: usize,
        right: usize,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Signal weights must sum to 1.0 (got {sum})")]
    InvalidWeights {
        sum: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::embedding::EmbeddingError> for HotScoreError {
    fn from(e: crate::embedding::EmbeddingError) -> Self {
        HotScoreError::Embedding(e.to_string())
    }
}

impl HotScoreError {
    /// Helper to create validation errors with field names
    ///
    /// Example:
    /// ```
    /// use hotscore::errors::HotScoreError;
    /// let err = HotScoreError::validation("title", "Title cannot be empty");
    /// ```
    pub fn validation(field: &str, message: &str) -> Self {
        HotScoreError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }
}
