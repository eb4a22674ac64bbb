use thiserror::Error;

/// Typed error hierarchy for the relay.
///
/// Use at module boundaries (verification, platform calls, request parsing).
/// Internal/leaf functions can continue using `anyhow::Result` — the `Internal`
/// variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {call}: {message}")]
    Upstream { call: String, message: String },

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `RelayError`.
pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl RelayError {
    pub fn upstream(call: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::Upstream {
            call: call.into(),
            message: message.into(),
        }
    }

    /// Whether the error must surface as an authentication rejection at the
    /// HTTP boundary rather than being reported in-band.
    pub fn is_auth(&self) -> bool {
        matches!(self, RelayError::Auth(_))
    }
}
