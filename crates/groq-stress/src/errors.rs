use groq_client::{ClientError, StreamError};

/// Failure of one unit of work. Only counted by the load generator; the
/// message is kept for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct WorkError(String);

impl WorkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Wraps an underlying error with a short description of the step.
    pub fn context(context: &str, err: impl std::fmt::Display) -> Self {
        Self(format!("{context}: {err}"))
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<ClientError> for WorkError {
    fn from(value: ClientError) -> Self {
        Self(value.to_string())
    }
}

impl From<StreamError> for WorkError {
    fn from(value: StreamError) -> Self {
        Self(value.to_string())
    }
}

/// Errors that stop a stress run before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StressError {
    /// Invalid load test or driver configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The API client could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// A result could not be written out.
    #[error("output error: {0}")]
    Output(String),
}
