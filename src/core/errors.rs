use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Negotiation failed on '{channel}': code {code} - {message}")]
    NegotiationFailed {
        channel: String,
        code: i64,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Stream cancelled")]
    Cancelled,

    #[error("User stream is already running")]
    AlreadyRunning,
}

impl ExchangeError {
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
