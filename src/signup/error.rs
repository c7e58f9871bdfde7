use thiserror::Error;

/// Caller-visible signup outcome categories.
///
/// `Internal` is deliberately opaque; the cause is only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignupError {
    #[error("invalid request")]
    InvalidArgument { fields: Vec<String> },
    #[error("user with this email address already exists")]
    AlreadyExists,
    #[error("")]
    Internal,
}

impl SignupError {
    /// Connect protocol error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::AlreadyExists => "already_exists",
            Self::Internal => "internal",
        }
    }
}
