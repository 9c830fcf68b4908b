//! Gemini-grounded web search

use crate::research::api_client::call_gemini_api;
use crate::research::config::ResearchConfig;
use crate::research::error::SearchTaskError;
use crate::research::gemini_types::GeminiApiRequest;
use crate::research::stages::search::{search_input, SearchCapability};
use crate::research::types::{ClarificationContext, SearchTask};
use async_trait::async_trait;

const SEARCH_INSTRUCTIONS: &str = "You are a research assistant. Given a search term, you search the web for that term and \
produce a concise summary of the results. The summary must be 2-3 paragraphs and less than 300 words. \
Capture the main points. Write succinctly, no need to have complete sentences or good grammar. \
This will be consumed by someone synthesizing a report, so it's vital you capture the essence and ignore any fluff. \
Do not include any additional commentary other than the summary itself.";

/// Search capability backed by Gemini's Google Search grounding tool
#[derive(Debug, Clone)]
pub struct GeminiSearch {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSearch {
    /// Create a search client for the model named in `config`
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
impl SearchCapability for GeminiSearch {
    async fn search(
        &self,
        task: &SearchTask,
        context: Option<&ClarificationContext>,
    ) -> Result<String, SearchTaskError> {
        let request = GeminiApiRequest::grounded_search(SEARCH_INSTRUCTIONS, &search_input(task, context));
        let summary =
            call_gemini_api(&self.client, &self.api_key, &self.base_url, &self.model, &request)
                .await?;
        Ok(summary)
    }
}
