//! Gemini API client
//!
//! Direct HTTP client for the Gemini `generateContent` endpoint. Both the
//! typed model calls and the grounded web searches go through here.

use crate::research::error::ModelInvocationError;
use crate::research::gemini_types::{GeminiApiRequest, GeminiApiResponse};

/// Call the Gemini API and return the text of the first candidate
///
/// # Arguments
/// * `client` - Shared HTTP client (connection pooling)
/// * `api_key` - Gemini API key
/// * `base_url` - API base URL (overridable for tests)
/// * `model` - Model name (e.g., "gemini-2.5-flash")
/// * `request` - Request body
///
/// # Errors
/// * `MissingApiKey` if the key is empty
/// * `Transport` if the request cannot be sent or the body cannot be read
/// * `RateLimited` / `Status` for non-success HTTP statuses
/// * `MalformedOutput` if the body is not a Gemini response
/// * `Blocked` / `EmptyResponse` if no usable text came back
pub async fn call_gemini_api(
    client: &reqwest::Client,
    api_key: &str,
    base_url: &str,
    model: &str,
    request: &GeminiApiRequest,
) -> Result<String, ModelInvocationError> {
    if api_key.is_empty() {
        return Err(ModelInvocationError::MissingApiKey);
    }

    let url = format!(
        "{}/models/{}:generateContent?key={}",
        base_url.trim_end_matches('/'),
        model,
        api_key
    );

    tracing::debug!(
        model = %model,
        json_mode = request.generation_config.is_some(),
        tools = request.tools.len(),
        "Calling Gemini API"
    );

    let response = client
        .post(&url)
        .json(request)
        .send()
        .await
        .map_err(|e| ModelInvocationError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let status_code = status.as_u16();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());

        tracing::error!(
            status_code = status_code,
            error_body = %error_body,
            "Gemini API returned error status"
        );

        if status_code == 429 {
            return Err(ModelInvocationError::RateLimited(error_body));
        }

        return Err(ModelInvocationError::Status {
            status: status_code,
            body: error_body,
        });
    }

    let response_body = response
        .text()
        .await
        .map_err(|e| ModelInvocationError::Transport(format!("Failed to read response body: {}", e)))?;

    let parsed: GeminiApiResponse = serde_json::from_str(&response_body).map_err(|e| {
        ModelInvocationError::MalformedOutput(format!(
            "Failed to parse JSON response from Gemini API: {} - Response body: {}",
            e, response_body
        ))
    })?;

    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
    {
        return Err(ModelInvocationError::Blocked(reason.clone()));
    }

    let text = parsed.first_candidate_text().ok_or_else(|| {
        let finish_reason = parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| "no candidates".to_string());
        ModelInvocationError::EmptyResponse(finish_reason)
    })?;

    if text.trim().is_empty() {
        return Err(ModelInvocationError::EmptyResponse(
            "response text is empty".to_string(),
        ));
    }

    tracing::debug!(
        response_len = text.len(),
        "Successfully received response from Gemini API"
    );

    Ok(text)
}
