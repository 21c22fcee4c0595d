use thiserror::Error;

/// Central error type for skin resolution.
/// Every module returns `AppResult<T>`.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Network ─────────────────────────────────────────
    /// Transport failure or non-success HTTP status. Feeds the retry loop.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // ── Data ────────────────────────────────────────────
    /// Malformed or schema-mismatched JSON. Never retried.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Texture decode error: {0}")]
    Decode(String),

    // ── Local ───────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ── Task engine ─────────────────────────────────────
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Task failed: {0}")]
    Task(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether the fetch retry loop may try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Io(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        AppError::Decode(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            AppError::Task("worker was aborted".to_string())
        } else {
            AppError::Task(format!("worker panicked: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AppError::Network("reset".into()).is_retryable());
        assert!(AppError::Io("disk".into()).is_retryable());
        assert!(!AppError::Parse("bad".into()).is_retryable());
        assert!(!AppError::Cancelled.is_retryable());
    }

    #[test]
    fn test_json_error_is_parse() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, AppError::Parse(_)));
    }
}
