//! Optimizer error types

/// Optimizer error types
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    // Collaborator/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The shared cache tier could not be reached or answered with an error.
    #[error("shared tier error: {0}")]
    SharedTier(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Batch queue errors
    /// The bulk handler failed for the slice this item was part of.
    #[error("batch handler failed: {0}")]
    Batch(String),

    /// The bulk handler returned fewer results than items it was given.
    #[error("no result for batch item at index {index}")]
    MissingBatchResult { index: usize },

    /// The drain task stopped before answering this item.
    #[error("batch processor dropped the item before answering")]
    BatchClosed,
}

impl From<reqwest::Error> for OptimizerError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => OptimizerError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => OptimizerError::Http(err.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for OptimizerError {
    fn from(err: redis::RedisError) -> Self {
        OptimizerError::SharedTier(err.to_string())
    }
}

/// Result type alias for optimizer operations
pub type Result<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_batch_result_names_index() {
        let err = OptimizerError::MissingBatchResult { index: 3 };
        assert_eq!(err.to_string(), "no result for batch item at index 3");
    }

    #[test]
    fn json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: OptimizerError = parse.unwrap_err().into();
        assert!(matches!(err, OptimizerError::Json(_)));
    }
}
