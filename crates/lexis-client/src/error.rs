use lexis_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no response to {message_type} within the timeout")]
    Timeout { message_type: String },

    #[error("no frame arrived within the timeout")]
    NoPush,

    #[error("connection closed by server")]
    Disconnected,

    #[error("request fields must be a JSON object")]
    NotAnObject,

    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("response is missing {0}")]
    MissingData(&'static str),
}

impl ClientError {
    /// The server's error code, for rejected requests.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
