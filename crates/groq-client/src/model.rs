use std::fmt;

/// Model identifier as used by the API (for example `llama3-70b-8192`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    pub const LLAMA3_8B: &'static str = "llama3-8b-8192";
    pub const LLAMA3_70B: &'static str = "llama3-70b-8192";
    pub const MIXTRAL_8X7B: &'static str = "mixtral-8x7b-32768";
    pub const GEMMA_7B: &'static str = "gemma-7b-it";

    /// Creates a model id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn llama3_8b() -> Self {
        Self::new(Self::LLAMA3_8B)
    }

    pub fn llama3_70b() -> Self {
        Self::new(Self::LLAMA3_70B)
    }

    pub fn mixtral_8x7b() -> Self {
        Self::new(Self::MIXTRAL_8X7B)
    }

    pub fn gemma_7b() -> Self {
        Self::new(Self::GEMMA_7B)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for ModelId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModelId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A single model as returned by the list/retrieve model endpoints.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Model {
    pub id: ModelId,
    #[serde(default)]
    pub object: String,
    /// Creation timestamp (seconds).
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub context_window: u64,
}

/// Response of `GET /v1/models`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub data: Vec<Model>,
}

impl ModelList {
    /// Looks up a model by id.
    pub fn get(&self, id: &ModelId) -> Option<&Model> {
        self.data.iter().find(|model| &model.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_list_decodes_service_shape() {
        let body = serde_json::json!({
            "object": "list",
            "data": [{
                "id": "llama3-70b-8192",
                "object": "model",
                "created": 1693721698,
                "owned_by": "Meta",
                "active": true,
                "context_window": 8192
            }]
        });
        let list: ModelList = serde_json::from_value(body).expect("decode");
        let model = list.get(&ModelId::llama3_70b()).expect("listed");
        assert!(model.active);
        assert_eq!(model.context_window, 8192);
        assert_eq!(model.id, ModelId::LLAMA3_70B);
    }

    #[test]
    fn unknown_ids_are_kept_verbatim() {
        let id: ModelId = serde_json::from_str("\"custom-model\"").expect("decode");
        assert_eq!(id.as_str(), "custom-model");
        assert_eq!(serde_json::to_string(&id).expect("encode"), "\"custom-model\"");
    }
}
