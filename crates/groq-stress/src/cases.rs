//! Work units exercising each Groq endpoint, and the default suite.

use groq_client::{ChatCompletionRequest, Fragment, FragmentStream, GroqClient, Message, ModelId};

use crate::errors::{StressError, WorkError};
use crate::load::LoadTestConfig;
use crate::settings::Settings;
use crate::work::Work;

fn probe_request(model: &ModelId) -> ChatCompletionRequest {
    ChatCompletionRequest::new(model.clone())
        .message(Message::system("You are a developer."))
        .message(Message::user("How do I write a function?"))
        .max_tokens(1)
        .num_choices(1)
}

fn check_shape(model: &ModelId, returned: &str, choices: usize) -> Result<(), WorkError> {
    if *model != *returned {
        return Err(WorkError::new(format!(
            "model mismatch: expected {model}, got {returned}"
        )));
    }
    if choices != 1 {
        return Err(WorkError::new(format!(
            "unexpected number of choices: {choices}"
        )));
    }
    Ok(())
}

/// One non-streaming chat completion.
#[derive(Clone, Debug)]
pub struct CompletionCase {
    client: GroqClient,
    model: ModelId,
}

impl CompletionCase {
    pub fn new(client: GroqClient, model: ModelId) -> Self {
        Self { client, model }
    }
}

#[async_trait::async_trait]
impl Work for CompletionCase {
    async fn call(&self) -> Result<(), WorkError> {
        let completion = self
            .client
            .create_chat_completion(&probe_request(&self.model))
            .await
            .map_err(|e| WorkError::context("failed to create chat completion", e))?;
        check_shape(&self.model, &completion.model, completion.choices.len())
    }
}

/// One streamed chat completion, read to the end.
#[derive(Clone, Debug)]
pub struct CompletionStreamCase {
    client: GroqClient,
    model: ModelId,
}

impl CompletionStreamCase {
    pub fn new(client: GroqClient, model: ModelId) -> Self {
        Self { client, model }
    }

    async fn drain(&self, stream: &mut FragmentStream) -> Result<(), WorkError> {
        while let Some(fragment) = stream.next_fragment().await {
            match fragment {
                Fragment::Chunk(chunk) => {
                    check_shape(&self.model, &chunk.model, chunk.choices.len())?
                }
                Fragment::Error(err) => {
                    return Err(WorkError::context("failed to get response", err));
                }
            }
        }
        if stream.next_fragment().await.is_some() {
            return Err(WorkError::new("stream should be closed"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Work for CompletionStreamCase {
    async fn call(&self) -> Result<(), WorkError> {
        let mut stream = self
            .client
            .create_chat_completion_stream(&probe_request(&self.model).stream(true))
            .await
            .map_err(|e| WorkError::context("failed to create chat completion", e))?;
        let cancel = stream.cancel_handle();
        let outcome = self.drain(&mut stream).await;
        cancel.cancel();
        outcome
    }
}

/// Lists models and expects at least one.
#[derive(Clone, Debug)]
pub struct ListModelsCase {
    client: GroqClient,
}

impl ListModelsCase {
    pub fn new(client: GroqClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Work for ListModelsCase {
    async fn call(&self) -> Result<(), WorkError> {
        let models = self
            .client
            .list_models()
            .await
            .map_err(|e| WorkError::context("failed to list models", e))?;
        if models.data.is_empty() {
            return Err(WorkError::new("models list is empty"));
        }
        Ok(())
    }
}

/// Retrieves one model and checks the returned id.
#[derive(Clone, Debug)]
pub struct RetrieveModelCase {
    client: GroqClient,
    model: ModelId,
}

impl RetrieveModelCase {
    pub fn new(client: GroqClient, model: ModelId) -> Self {
        Self { client, model }
    }
}

#[async_trait::async_trait]
impl Work for RetrieveModelCase {
    async fn call(&self) -> Result<(), WorkError> {
        let model = self
            .client
            .retrieve_model(&self.model)
            .await
            .map_err(|e| WorkError::context("failed to retrieve model", e))?;
        if model.id != self.model {
            return Err(WorkError::new(format!(
                "model mismatch: expected {}, got {}",
                self.model, model.id
            )));
        }
        Ok(())
    }
}

/// Builds the four endpoint load tests sharing one client.
pub fn suite(client: &GroqClient, settings: &Settings) -> Result<Vec<LoadTestConfig>, StressError> {
    let model = settings.model_id();
    let rate = settings.rate;
    let duration = settings.duration;

    let mut configs = vec![
        LoadTestConfig::new(
            "Chat completion",
            rate,
            duration,
            CompletionCase::new(client.clone(), model.clone()),
        )?,
        LoadTestConfig::new(
            "Chat stream completion",
            rate,
            duration,
            CompletionStreamCase::new(client.clone(), model.clone()),
        )?,
        LoadTestConfig::new("List Models", rate, duration, ListModelsCase::new(client.clone()))?,
        LoadTestConfig::new(
            "Retrieve Model",
            rate,
            duration,
            RetrieveModelCase::new(client.clone(), model),
        )?,
    ];
    if let Some(limit) = settings.max_in_flight {
        configs = configs
            .into_iter()
            .map(|config| config.max_in_flight(limit))
            .collect::<Result<_, _>>()?;
    }
    Ok(configs)
}
