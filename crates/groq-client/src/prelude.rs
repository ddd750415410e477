//! Common imports for typical client usage.
pub use crate::{
    CancelHandle, ChatCompletionRequest, ChatCompletionResponse, ClientError, Fragment,
    FragmentStream, GroqClient, GroqClientConfig, Message, ModelId, SentinelMatch, StreamError,
};
