use lexis_core::LexisError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<StoreError> for LexisError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => LexisError::NotFound(m),
            StoreError::Conflict(m) | StoreError::InvalidTransition(m) => LexisError::Conflict(m),
            StoreError::Invariant(m) => LexisError::Internal(m),
        }
    }
}
