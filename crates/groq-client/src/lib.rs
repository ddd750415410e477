//! Async client for the Groq (OpenAI-compatible) API.
//!
//! Streamed chat completions are exposed as a [`FragmentStream`]: one
//! connection per stream, read by a background task, with a cloneable
//! [`CancelHandle`] for early termination.
//!
//! ```no_run
//! use groq_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = GroqClient::from_env()?;
//! let req = ChatCompletionRequest::new(ModelId::llama3_70b())
//!     .message(Message::user("Explain the importance of fast language models"))
//!     .max_tokens(150)
//!     .stream(true);
//!
//! let mut stream = client.create_chat_completion_stream(&req).await?;
//! while let Some(fragment) = stream.next_fragment().await {
//!     match fragment {
//!         Fragment::Chunk(chunk) => print!("{}", chunk.text()),
//!         Fragment::Error(err) => eprintln!("stream error: {err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// HTTP client and endpoint calls.
pub mod client;
/// Chat completion request/response types.
pub mod completion;
/// Client configuration.
pub mod config;
/// Error types.
pub mod errors;
/// Model identifiers and metadata.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
mod sse;
/// Streamed completions: fragments, stream handle, cancellation.
pub mod stream;

pub use client::GroqClient;
pub use completion::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, Delta, Message, MessageRole, Usage,
};
pub use config::{GroqClientConfig, SentinelMatch};
pub use errors::{ClientError, StreamError};
pub use model::{Model, ModelId, ModelList};
pub use stream::{CancelHandle, Fragment, FragmentStream};
