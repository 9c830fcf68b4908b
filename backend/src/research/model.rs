//! Typed model calls
//!
//! Every stage asks a language model for a value of a known shape. The
//! `ModelClient` trait is the injected capability (Gemini in production, a stub
//! in tests); `typed_call` turns its raw JSON text into a validated value.

use crate::research::api_client::call_gemini_api;
use crate::research::config::ResearchConfig;
use crate::research::error::ModelInvocationError;
use crate::research::gemini_types::GeminiApiRequest;
use crate::research::utils::strip_code_fence;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One model invocation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Role instructions
    pub instructions: String,
    /// Task input
    pub input: String,
    /// Shape the JSON output must follow
    pub schema: Value,
}

/// Capability: ask a model for JSON output of a given shape
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run the request and return the raw JSON text
    async fn invoke(&self, request: ModelRequest) -> Result<String, ModelInvocationError>;
}

/// A value a model can be asked to produce
pub trait TypedOutput: DeserializeOwned {
    /// Schema sent with the request
    fn schema() -> Value;

    /// Checks serde cannot express (non-empty strings, counts)
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Invoke `model` and decode its answer as `T`
///
/// # Errors
/// Propagates the client's error unchanged; output that fails to parse or
/// validate becomes `ModelInvocationError::MalformedOutput`.
pub async fn typed_call<T: TypedOutput>(
    model: &dyn ModelClient,
    instructions: &str,
    input: &str,
) -> Result<T, ModelInvocationError> {
    let request = ModelRequest {
        instructions: instructions.to_string(),
        input: input.to_string(),
        schema: T::schema(),
    };

    let raw = model.invoke(request).await?;

    let value: T = serde_json::from_str(strip_code_fence(&raw)).map_err(|e| {
        ModelInvocationError::MalformedOutput(format!("{} - Response: {}", e, raw))
    })?;
    value
        .validate()
        .map_err(ModelInvocationError::MalformedOutput)?;

    Ok(value)
}

/// Gemini-backed model client
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    /// Create a client for the model named in `config`
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, config: &ResearchConfig) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: config.gemini_model.clone(),
            base_url: config.gemini_api_base_url.clone(),
        }
    }
}

#[async_trait]
impl ModelClient for GeminiModel {
    async fn invoke(&self, request: ModelRequest) -> Result<String, ModelInvocationError> {
        let body =
            GeminiApiRequest::structured(&request.instructions, &request.input, request.schema);
        call_gemini_api(&self.client, &self.api_key, &self.base_url, &self.model, &body).await
    }
}
