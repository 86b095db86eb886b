//! Common error types used throughout streamforge.
//!
//! Covers lookups that found nothing, request paths that were refused, upload
//! conflicts and I/O failures against the storage layout.

/// Common error type for streamforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested artifact or record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A path component was refused by the storage layout.
    ///
    /// Rendered to clients exactly like [`Error::NotFound`].
    #[error("Path rejected: {0}")]
    PathRejected(String),

    /// The target is busy or already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An upload exceeded the configured size limit.
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new PathRejected error.
    pub fn path_rejected<S: Into<String>>(msg: S) -> Self {
        Self::PathRejected(msg.into())
    }

    /// Create a new Conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code a handler should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) | Error::PathRejected(_) => 404,
            Error::Conflict(_) => 409,
            Error::InvalidInput(_) => 400,
            Error::PayloadTooLarge { .. } => 413,
            Error::Io(_) | Error::Internal(_) => 500,
        }
    }

    /// True for errors that must be indistinguishable from a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::PathRejected(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
