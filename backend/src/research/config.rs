//! Research pipeline configuration
//!
//! Tunables for the model, the planner and the search stage.

use crate::error::AppError;
use crate::research::constants::{
    DEFAULT_SEARCH_COUNT, DEFAULT_SEARCH_TIMEOUT_SECS, GEMINI_API_BASE_URL,
};
use serde::{Deserialize, Serialize};
use std::env;

/// Research pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchConfig {
    /// Gemini model name
    pub gemini_model: String,
    /// Gemini API base URL
    pub gemini_api_base_url: String,
    /// HTTP timeout for a single Gemini call in seconds
    pub gemini_timeout_secs: u64,
    /// Number of web searches the planner is asked for
    pub num_searches: usize,
    /// Deadline for one search task in seconds
    pub search_timeout_secs: u64,
    /// Maximum query length in characters
    pub max_query_length: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_api_base_url: GEMINI_API_BASE_URL.to_string(),
            gemini_timeout_secs: 60,
            num_searches: DEFAULT_SEARCH_COUNT,
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            max_query_length: 10_000,
        }
    }
}

impl ResearchConfig {
    /// Defaults overridden by environment variables where set and parseable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gemini_model: env::var("GEMINI_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.gemini_model),
            gemini_api_base_url: env::var("GEMINI_API_BASE_URL")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.gemini_api_base_url),
            gemini_timeout_secs: parse_env("GEMINI_TIMEOUT_SECS")
                .unwrap_or(defaults.gemini_timeout_secs),
            num_searches: positive_env("RESEARCH_NUM_SEARCHES", defaults.num_searches),
            search_timeout_secs: positive_env(
                "RESEARCH_SEARCH_TIMEOUT_SECS",
                defaults.search_timeout_secs,
            ),
            max_query_length: positive_env(
                "RESEARCH_MAX_QUERY_LENGTH",
                defaults.max_query_length,
            ),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Like `parse_env`, but zero falls back to `default` with a warning
fn positive_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Default + PartialEq + std::fmt::Display,
{
    match parse_env::<T>(key) {
        Some(value) if value == T::default() => {
            tracing::warn!(
                key = key,
                default = %default,
                "Ignoring zero value from environment, using default"
            );
            default
        }
        Some(value) => value,
        None => default,
    }
}

/// Request body for updating research configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdateRequest {
    /// Gemini model name (optional)
    pub gemini_model: Option<String>,
    /// Number of planned searches (optional)
    pub num_searches: Option<usize>,
    /// Per-search deadline in seconds (optional)
    pub search_timeout_secs: Option<u64>,
    /// Maximum query length in characters (optional)
    pub max_query_length: Option<usize>,
}

/// Validate and apply configuration updates
///
/// All fields are checked before anything is applied, so a rejected request
/// leaves the configuration untouched.
///
/// # Returns
/// * `Ok(ResearchConfig)` - The updated configuration
/// * `Err(AppError::InvalidConfig)` - If validation fails
pub fn validate_and_apply_config_update(
    mut config: ResearchConfig,
    request: ConfigUpdateRequest,
) -> Result<ResearchConfig, AppError> {
    if let Some(model) = request.gemini_model {
        if model.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "gemini_model cannot be empty".to_string(),
            ));
        }
        config.gemini_model = model.trim().to_string();
    }

    if let Some(num_searches) = request.num_searches {
        if num_searches == 0 {
            return Err(AppError::InvalidConfig(
                "num_searches must be > 0".to_string(),
            ));
        }
        config.num_searches = num_searches;
    }

    if let Some(timeout) = request.search_timeout_secs {
        if timeout == 0 {
            return Err(AppError::InvalidConfig(
                "search_timeout_secs must be > 0".to_string(),
            ));
        }
        config.search_timeout_secs = timeout;
    }

    if let Some(max_length) = request.max_query_length {
        if max_length == 0 {
            return Err(AppError::InvalidConfig(
                "max_query_length must be > 0".to_string(),
            ));
        }
        config.max_query_length = max_length;
    }

    Ok(config)
}
