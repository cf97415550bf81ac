use lexis_core::LexisError;

/// Failures while reading, parsing or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    /// Whether the underlying stream is unusable after this error.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<ProtocolError> for LexisError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(io) => LexisError::Transport(io.to_string()),
            ProtocolError::Encode(err) => LexisError::Internal(err.to_string()),
            other => LexisError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn io_maps_to_transport() {
        let err: LexisError =
            ProtocolError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).into();
        assert_matches!(err, LexisError::Transport(_));
        assert!(err.is_fatal());
    }

    #[test]
    fn parse_failures_map_to_validation() {
        let err: LexisError = ProtocolError::MissingField("messageType").into();
        assert_matches!(err, LexisError::Validation(ref m) if m.contains("messageType"));
        assert!(!ProtocolError::InvalidUtf8.is_transport());
    }
}
