//! Error taxonomy shared by services, the session manager and the dispatcher.

/// Malformed or missing request field.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Missing, unknown or expired session.
pub const AUTH_ERROR: &str = "AUTH_ERROR";
/// Authenticated caller lacks the required role or ownership.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
/// Referenced entity does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Duplicate key or illegal state transition.
pub const CONFLICT: &str = "CONFLICT";
/// Socket read or write failure.
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
/// Broken internal invariant.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Coarse classification used for logging and response routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    Conflict,
    Transport,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LexisError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LexisError>;

impl LexisError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthenticated(_) | Self::Forbidden(_) => ErrorKind::Auth,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable code carried in error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => VALIDATION_ERROR,
            Self::Unauthenticated(_) => AUTH_ERROR,
            Self::Forbidden(_) => PERMISSION_DENIED,
            Self::NotFound(_) => NOT_FOUND,
            Self::Conflict(_) => CONFLICT,
            Self::Transport(_) => TRANSPORT_ERROR,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Only transport failures end a connection; everything else becomes an
    /// error response.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Message safe to put on the wire. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for LexisError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for LexisError {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(format!("malformed JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_variants_share_kind() {
        assert_eq!(LexisError::Unauthenticated("x".into()).kind(), ErrorKind::Auth);
        assert_eq!(LexisError::forbidden("x").kind(), ErrorKind::Auth);
        assert_ne!(
            LexisError::Unauthenticated("x".into()).code(),
            LexisError::forbidden("x").code()
        );
    }

    #[test]
    fn only_transport_is_fatal() {
        assert!(LexisError::Transport("reset".into()).is_fatal());
        assert!(!LexisError::validation("bad").is_fatal());
        assert!(!LexisError::conflict("dup").is_fatal());
        assert!(!LexisError::not_found("gone").is_fatal());
        assert!(!LexisError::Internal("boom".into()).is_fatal());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(LexisError::validation("a").code(), "VALIDATION_ERROR");
        assert_eq!(LexisError::Unauthenticated("a".into()).code(), "AUTH_ERROR");
        assert_eq!(LexisError::forbidden("a").code(), "PERMISSION_DENIED");
        assert_eq!(LexisError::not_found("a").code(), "NOT_FOUND");
        assert_eq!(LexisError::conflict("a").code(), "CONFLICT");
        assert_eq!(LexisError::Transport("a".into()).code(), "TRANSPORT_ERROR");
    }

    #[test]
    fn internal_message_is_sanitized() {
        let err = LexisError::Internal("lock poisoned at store.rs:42".into());
        assert_eq!(err.client_message(), "Internal error");
        let err = LexisError::validation("Missing required field: email");
        assert_eq!(err.client_message(), "Missing required field: email");
    }

    #[test]
    fn io_error_converts_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: LexisError = io.into();
        assert!(err.is_fatal());
    }

    #[test]
    fn json_error_converts_to_validation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: LexisError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
