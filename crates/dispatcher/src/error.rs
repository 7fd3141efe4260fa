//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Negative flush interval
    #[error("flush interval must not be negative, got {0}ms")]
    InvalidFlushInterval(i64),

    /// Invalid rate limit options
    #[error("invalid rate limit: {0}")]
    RateLimit(#[from] ratelimit::RateLimitError),

    /// Route handler could not be built
    #[error("failed to create handler '{name}': {message}")]
    HandlerCreation { name: String, message: String },

    /// A handler failed to buffer its commands
    #[error("handler '{handler}' failed: {source}")]
    Handler {
        handler: String,
        #[source]
        source: contracts::ContractError,
    },

    /// The store round trip failed
    #[error("flush failed: {0}")]
    Flush(#[source] contracts::ContractError),

    /// No store connection could be acquired
    #[error("store connection unavailable: {0}")]
    Connection(#[source] contracts::ContractError),

    /// Dispatch was called after stop
    #[error("dispatcher is stopped")]
    Stopped,
}

impl DispatcherError {
    /// Create a handler creation error
    pub fn handler_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a handler error
    pub fn handler(handler: impl Into<String>, source: contracts::ContractError) -> Self {
        Self::Handler {
            handler: handler.into(),
            source,
        }
    }
}
