use std::io;

/// Custom error type for gitlab_webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Log file error: {0}")]
    LogFileError(String),

    #[error("Invalid push payload: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Helper type for Results that use WebhookError
pub type Result<T> = std::result::Result<T, WebhookError>;
