use serde::de::DeserializeOwned;
use tracing::debug;

use crate::completion::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::GroqClientConfig;
use crate::errors::ClientError;
use crate::model::{Model, ModelId, ModelList};
use crate::stream::FragmentStream;

/// Client for the Groq chat completion and model endpoints.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct GroqClient {
    http: reqwest::Client,
    config: GroqClientConfig,
}

impl GroqClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: GroqClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Creates a client using `GROQ_API_KEY`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(GroqClientConfig::from_env()?)
    }

    pub fn config(&self) -> &GroqClientConfig {
        &self.config
    }

    /// Sends a non-streaming chat completion request.
    pub async fn create_chat_completion(
        &self,
        req: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        if req.stream {
            return Err(ClientError::Config(
                "stream must be false; use create_chat_completion_stream".into(),
            ));
        }
        debug!(model = %req.model, "creating chat completion");
        let http_req = self
            .http
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(req);
        self.send_json(http_req, "chat completion").await
    }

    /// Opens a streamed chat completion.
    ///
    /// Fails immediately with [`ClientError::Config`] unless `req.stream` is
    /// set; nothing is sent in that case. Otherwise the request is sent by a
    /// background task and every later failure (connect, status, read)
    /// arrives as a terminal error fragment. Must be called from within a
    /// Tokio runtime.
    pub async fn create_chat_completion_stream(
        &self,
        req: &ChatCompletionRequest,
    ) -> Result<FragmentStream, ClientError> {
        if !req.stream {
            return Err(ClientError::Config("stream must be set to true".into()));
        }
        let body = serde_json::to_vec(req)
            .map_err(|e| ClientError::Config(format!("failed to marshal request: {e}")))?;
        let http_req = self
            .http
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .body(body);
        let stream = FragmentStream::connect(
            http_req,
            self.config.sentinel,
            self.config.stream_buffer_capacity,
        );
        debug!(model = %req.model, session_id = %stream.session_id(), "opened chat completion stream");
        Ok(stream)
    }

    /// Lists the models available to the API key.
    pub async fn list_models(&self) -> Result<ModelList, ClientError> {
        let http_req = self
            .http
            .get(self.config.models_url())
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        self.send_json(http_req, "list models").await
    }

    /// Retrieves one model by id.
    pub async fn retrieve_model(&self, id: &ModelId) -> Result<Model, ClientError> {
        let url = format!("{}/{}", self.config.models_url(), id);
        let http_req = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        self.send_json(http_req, "retrieve model").await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        http_req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, ClientError> {
        let response = http_req
            .send()
            .await
            .map_err(|e| ClientError::transport(&format!("{what} request failed"), e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(&format!("{what} response read failed"), e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::decode(&format!("failed to decode {what} response"), e))
    }
}
