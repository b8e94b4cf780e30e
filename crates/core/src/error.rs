//! Error types for bridgekv
//!
//! This module defines all error types surfaced by the adapter.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The adapter never retries and never swallows an error: every failed
//! engine call ends up in exactly one `Result` handed back to the caller.

use thiserror::Error;

use crate::codec::CodecError;

/// Result type alias for bridgekv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes reported by the engine across the bridge.
pub mod codes {
    /// A database handle was opened twice.
    pub const ALREADY_OPEN: &str = "E_ALREADY_OPEN";
    /// A database or iterator handle is not known to the engine.
    pub const UNKNOWN_HANDLE: &str = "E_UNKNOWN_HANDLE";
    /// The database could not be opened.
    pub const OPEN_ERROR: &str = "E_OPEN_ERROR";
    /// A put failed.
    pub const PUT_ERROR: &str = "E_PUT_ERROR";
    /// A delete failed.
    pub const DELETE_ERROR: &str = "E_DELETE_ERROR";
    /// A batch failed and was not applied.
    pub const BATCH_OPERATION_ERROR: &str = "E_BATCH_OPERATION_ERROR";
    /// A get failed.
    pub const GET_ERROR: &str = "E_GET_ERROR";
    /// A range clear failed.
    pub const CLEAR_ERROR: &str = "E_CLEAR_ERROR";
    /// An iterator could not be created.
    pub const ITERATOR_CREATE: &str = "E_ITERATOR_CREATE";
    /// An iterator handle was created twice.
    pub const ALREADY_INITIALIZED: &str = "E_ALREADY_INITIALIZED";
    /// Reading from an iterator failed.
    pub const ITERATOR_GET: &str = "E_ITERATOR_GET";
    /// Repositioning an iterator failed.
    pub const ITERATOR_SEEK: &str = "E_ITERATOR_SEEK";
    /// Releasing an iterator failed.
    pub const ITERATOR_CLOSE: &str = "E_ITERATOR_CLOSE";
}

/// Failure reported by the engine for one call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct EngineError {
    /// Machine-readable code, one of [`codes`] for the reference engine
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl EngineError {
    /// Create an engine error with the given code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Unknown database or iterator handle
    pub fn unknown_handle(kind: &str, handle: u64) -> Self {
        Self::new(
            codes::UNKNOWN_HANDLE,
            format!("Unknown {} handle {}", kind, handle),
        )
    }
}

/// Error types for the adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The bridge returned a string the codec cannot decode
    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    /// The bridge returned a response with the wrong shape
    #[error("Protocol error: malformed engine response: {0}")]
    MalformedResponse(String),

    /// The engine reported a failure, surfaced verbatim
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Key not found (only from `get`)
    #[error("Key not found")]
    NotFound,

    /// Operation attempted on an ended iterator or a store that is not open
    #[error("Invalid state: {0}")]
    State(String),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Config(String),
}

impl Error {
    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedResponse(msg.into())
    }

    /// True for a `get` miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// True when the bridge sent data this side cannot understand
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::MalformedResponse(_))
    }

    /// True when calling again may succeed.
    ///
    /// Engine failures leave adapter state untouched, so the same call can
    /// be issued again. An unknown handle stays unknown, and everything else
    /// fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Engine(e) => e.code != codes::UNKNOWN_HANDLE,
            _ => false,
        }
    }

    /// Engine error code, if this is an engine failure
    pub fn engine_code(&self) -> Option<&str> {
        match self {
            Error::Engine(e) => Some(e.code.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_protocol() {
        let err: Error = CodecError::InvalidKey("odd length".to_string()).into();
        let msg = err.to_string();
        assert!(msg.contains("Protocol error"));
        assert!(msg.contains("odd length"));
        assert!(err.is_protocol());
    }

    #[test]
    fn test_error_display_malformed() {
        let err = Error::malformed("readCount 3 but 2 keys");
        assert!(err.to_string().contains("malformed engine response"));
        assert!(err.is_protocol());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display_engine() {
        let err: Error = EngineError::new(codes::PUT_ERROR, "disk full").into();
        let msg = err.to_string();
        assert!(msg.contains("E_PUT_ERROR"));
        assert!(msg.contains("disk full"));
        assert_eq!(err.engine_code(), Some("E_PUT_ERROR"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unknown_handle_message() {
        let err = EngineError::unknown_handle("iterator", 7);
        assert_eq!(err.code, codes::UNKNOWN_HANDLE);
        assert_eq!(err.message, "Unknown iterator handle 7");
    }

    #[test]
    fn test_unknown_handle_not_retryable() {
        let err: Error = EngineError::unknown_handle("DB", 3).into();
        assert_eq!(err.engine_code(), Some(codes::UNKNOWN_HANDLE));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found() {
        let err = Error::NotFound;
        assert!(err.is_not_found());
        assert!(!err.is_protocol());
        assert_eq!(err.engine_code(), None);
    }

    #[test]
    fn test_error_display_state() {
        let err = Error::state("iterator has ended");
        assert_eq!(err.to_string(), "Invalid state: iterator has ended");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::config("read_batch_size must be at least 1");
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }

        fn returns_error() -> Result<i32> {
            Err(Error::state("test"))
        }

        assert_eq!(returns_result().unwrap(), 42);
        assert!(returns_error().is_err());
    }
}
