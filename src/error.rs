use thiserror::Error;

/// Convenience type alias for Results with ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Main error type for Forge Core
///
/// Mirrors the failure taxonomy of the execution pipeline: synchronous input
/// validation, agent production, sandbox supervision, deadline and
/// cancellation outcomes, and the tenant-scoped lookup errors surfaced at
/// the interface boundary.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("agent error: {message}")]
    Agent { message: String },

    #[error("sandbox error: {message}")]
    Sandbox { message: String },

    #[error("completion oracle error: {0}")]
    Completion(String),

    #[error("execution timed out: {message}")]
    Timeout { message: String },

    #[error("execution canceled")]
    Canceled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
