//! Research utility functions
//!
//! Common helpers for hashing, input validation and model output cleanup.

use crate::research::error::ResearchError;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute a short hash for a query string
///
/// Returns an 8-character hexadecimal hash suitable for logging and tracing
/// without writing the query text itself to the logs.
pub fn hash_query(query: &str) -> String {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    format!("{:016x}", hasher.finish())[..8].to_string()
}

/// Validate a research query
///
/// # Returns
/// * `Ok(&str)` - The trimmed query
/// * `Err(ResearchError::InvalidInput)` - Query is empty or too long
pub fn validate_query(query: &str, max_length: usize) -> Result<&str, ResearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::InvalidInput(
            "Query cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > max_length {
        return Err(ResearchError::InvalidInput(format!(
            "Query too long ({} > {} characters)",
            trimmed.len(),
            max_length
        )));
    }
    Ok(trimmed)
}

/// Strip a markdown code fence that models sometimes wrap JSON in
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Reduce a question to lowercase alphanumeric words for comparison
pub fn normalize_question(question: &str) -> String {
    question
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `candidate` repeats any of the `prior` questions after normalization
pub fn is_duplicate_question(candidate: &str, prior: &[String]) -> bool {
    let normalized = normalize_question(candidate);
    prior.iter().any(|q| normalize_question(q) == normalized)
}
