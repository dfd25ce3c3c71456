//! Error types for the proctoring signal library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Perspective-n-Point solve failed or was degenerate
    #[error("Pose solve error: {0}")]
    PoseSolveError(String),

    /// Recorded trace could not be parsed
    #[error("Trace error: {0}")]
    TraceError(String),

    /// A frame source, landmark provider, face detector or sink failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
