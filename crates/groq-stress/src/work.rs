use std::future::Future;

use crate::errors::WorkError;

/// A zero-argument operation driven by the load generator.
///
/// Implemented for plain async closures:
///
/// ```
/// use groq_stress::{Work, WorkError};
///
/// fn assert_work(_: &impl Work) {}
/// assert_work(&|| async { Ok::<(), WorkError>(()) });
/// ```
#[async_trait::async_trait]
pub trait Work: Send + Sync {
    async fn call(&self) -> Result<(), WorkError>;
}

#[async_trait::async_trait]
impl<F, Fut> Work for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), WorkError>> + Send,
{
    async fn call(&self) -> Result<(), WorkError> {
        (self)().await
    }
}

/// Result of one dispatched unit, with the failure detail dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failure,
}

impl<T, E> From<&Result<T, E>> for RequestOutcome {
    fn from(value: &Result<T, E>) -> Self {
        match value {
            Ok(_) => Self::Success,
            Err(_) => Self::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closures_are_work() {
        let ok = || async { Ok::<(), WorkError>(()) };
        let failing = || async { Err::<(), WorkError>(WorkError::new("boom")) };
        assert_eq!(RequestOutcome::from(&Work::call(&ok).await), RequestOutcome::Success);
        assert_eq!(
            RequestOutcome::from(&Work::call(&failing).await),
            RequestOutcome::Failure
        );
    }
}
