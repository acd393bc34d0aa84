//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use gougestop_core::{FlowError, PortError};

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// A step that the current screen does not allow, or a port error raised by the flow.
    #[error("{0}")]
    Flow(#[from] FlowError),

    /// Building the HTTP client failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., reading the document to upload).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The command stopped on a screen the user has to act on (sign in, retry).
    #[error("{0}")]
    NotCompleted(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
