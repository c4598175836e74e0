use thiserror::Error;

/// Main error type for the trading assistant core
#[derive(Error, Debug)]
pub enum OrdergateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Broker errors
    #[error("Contract qualification failed: {0}")]
    Qualification(String),

    #[error("Order submission failed: {0}")]
    OrderSubmission(String),

    #[error("Broker error: {0}")]
    Broker(String),

    // Notification channel errors
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    // Agent pipeline errors
    #[error("Agent pipeline error: {0}")]
    Pipeline(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(i64),

    // Scheduling errors
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for OrdergateError
pub type Result<T> = std::result::Result<T, OrdergateError>;
