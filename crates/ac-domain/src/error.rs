//! Shared error taxonomy for the adaptation core.
//!
//! Variant names follow the error kinds named by the external-interface and
//! error-handling design: each carries a stable `code()` for the `error`
//! transport frame and the tool-interface `status: "error"` payload.

/// Shared error type used across all adaptation-core crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("deadline exceeded: {op} (budget {budget_ms}ms)")]
    DeadlineExceeded { op: String, budget_ms: u64 },

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("numeric fault: {0}")]
    Numeric(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Stable machine-readable code carried by `error` transport frames and
    /// tool-interface error payloads. Never echoes raw learner payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "invalid_action",
            Error::Auth(_) => "auth_failed",
            Error::NotFound(_) => "no_session",
            Error::Busy(_) => "busy",
            Error::DeadlineExceeded { .. } => "deadline_exceeded",
            Error::Persistence(_) => "processing_error",
            Error::Transport(_) => "transport_error",
            Error::Numeric(_) => "processing_error",
            Error::Internal(_) => "server_error",
            Error::Io(_) => "processing_error",
            Error::Json(_) => "invalid_action",
            Error::Config(_) => "server_error",
        }
    }

    /// True for errors surfaced to the caller over the `error` frame while
    /// the session continues (validation/auth/not-found/busy).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Auth(_) | Error::NotFound(_) | Error::Busy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
