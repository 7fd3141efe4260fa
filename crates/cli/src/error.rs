//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Redis connection error
    #[error("Failed to connect to Redis at {url}: {message}")]
    StoreConnection { url: String, message: String },

    /// Relay execution error
    #[error("Relay execution failed: {message}")]
    Relay { message: String },

    /// Graceful shutdown error
    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    #[cfg_attr(not(feature = "real-redis"), allow(dead_code))]
    pub fn store_connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn relay(message: impl Into<String>) -> Self {
        Self::Relay {
            message: message.into(),
        }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }
}
