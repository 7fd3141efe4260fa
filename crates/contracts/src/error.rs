//! Layered error definitions
//!
//! Categorized by source: config / payload / store / delivery

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Payload Errors =====
    /// Message body is not a JSON document
    #[error("malformed payload for message {message_id}: {message}")]
    MalformedPayload { message_id: String, message: String },

    // ===== Store Errors =====
    /// Could not obtain a store connection
    #[error("store connection error: {message}")]
    StoreConnection { message: String },

    /// A command could not be buffered on the transport
    #[error("store send error for '{command}': {message}")]
    StoreSend { command: String, message: String },

    /// The transport write buffer could not be flushed
    #[error("store flush error: {message}")]
    StoreFlush { message: String },

    /// A pipelined reply could not be read
    #[error("store receive error: {message}")]
    StoreReceive { message: String },

    // ===== Delivery Errors =====
    /// A delivery handler refused the message (the queue should redeliver)
    #[error("delivery failed: {0}")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create store connection error
    pub fn store_connection(message: impl Into<String>) -> Self {
        Self::StoreConnection {
            message: message.into(),
        }
    }

    /// Create store send error
    pub fn store_send(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreSend {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create store flush error
    pub fn store_flush(message: impl Into<String>) -> Self {
        Self::StoreFlush {
            message: message.into(),
        }
    }

    /// Create store receive error
    pub fn store_receive(message: impl Into<String>) -> Self {
        Self::StoreReceive {
            message: message.into(),
        }
    }

    /// Wrap a handler-side error as a redelivery signal
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Box::new(err))
    }
}
