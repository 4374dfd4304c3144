//! Error types for askdb.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for askdb operations.
#[derive(Error, Debug)]
pub enum AskdbError {
    /// Schema introspection never ran or failed (connection lost, query rejected).
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// Query execution errors (malformed SQL, permission errors, connectivity loss).
    #[error("Query error: {0}")]
    Query(String),

    /// SQL generation errors (inference endpoint unreachable, bad response).
    #[error("Generation error: {0}")]
    Generation(String),

    /// Configuration errors (invalid config file, missing required fields).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport errors (WebSocket handshake, send/receive failures).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal application errors (unexpected states, bugs).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskdbError {
    /// Creates a schema-unavailable error with the given message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaUnavailable(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a generation error with the given message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SchemaUnavailable(_) => "Schema Error",
            Self::Query(_) => "Query Error",
            Self::Generation(_) => "Generation Error",
            Self::Config(_) => "Configuration Error",
            Self::Transport(_) => "Transport Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using AskdbError.
pub type Result<T> = std::result::Result<T, AskdbError>;
