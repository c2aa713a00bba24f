use thiserror::Error;

/// Main error type for Ember+ operations
#[derive(Error, Debug)]
pub enum EmberError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Frame invalid: {0}")]
    Frame(String),

    #[error("BER encoding error: {0}")]
    Encode(String),

    #[error("BER decoding error: {0}")]
    Decode(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias for Ember+ operations
pub type EmberResult<T> = Result<T, EmberError>;
