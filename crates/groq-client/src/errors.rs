/// Errors returned directly by client calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration or request (nothing was sent).
    #[error("config error: {0}")]
    Config(String),
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body was not the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub(crate) fn transport(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{context}: {err}"))
    }

    pub(crate) fn decode(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{context}: {err}"))
    }
}

/// Failure carried by an error [`crate::Fragment`].
///
/// `Decode` is local to one event and the stream keeps going; every other
/// variant is the last fragment of its stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamError {
    /// One event payload was not a valid completion chunk.
    #[error("failed to decode stream event: {message}")]
    Decode { message: String },
    /// The service rejected the stream request.
    #[error("stream request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// Connecting or reading the event stream failed.
    #[error("stream transport failure: {message}")]
    Transport { message: String },
    /// The response was not an event stream.
    #[error("stream protocol failure: {message}")]
    Protocol { message: String },
}

impl StreamError {
    /// Returns `true` when the stream continues after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

impl From<StreamError> for ClientError {
    fn from(value: StreamError) -> Self {
        match value {
            StreamError::Decode { message } => ClientError::Decode(message),
            StreamError::Status { status, body } => ClientError::Status { status, body },
            StreamError::Transport { message } => ClientError::Transport(message),
            StreamError::Protocol { message } => ClientError::Transport(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decode_errors_are_recoverable() {
        assert!(
            StreamError::Decode {
                message: "bad".into()
            }
            .is_recoverable()
        );
        assert!(
            !StreamError::Transport {
                message: "reset".into()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn stream_status_maps_to_client_status() {
        let err: ClientError = StreamError::Status {
            status: 401,
            body: "unauthorized".into(),
        }
        .into();
        assert_eq!(
            err,
            ClientError::Status {
                status: 401,
                body: "unauthorized".into()
            }
        );
        assert!(err.to_string().contains("401"));
    }
}
