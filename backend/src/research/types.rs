//! Research data model
//!
//! Value types that flow between the stages. Everything here is immutable once
//! built; the only mutable aggregate is `SessionState`.

use crate::research::model::TypedOutput;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The original user request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResearchQuery(String);

impl ResearchQuery {
    /// Wrap a query string, trimming surrounding whitespace
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    /// Borrow the query text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generated clarifying question and its 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClarifyingQuestion {
    /// Position in generation order, starting at 1
    pub ordinal: usize,
    /// Question text
    pub text: String,
}

/// A user's answer to the clarifying question with the same ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    /// Ordinal of the question this answers
    pub ordinal: usize,
    /// Free-text answer
    pub text: String,
}

/// Text block combining all question/answer pairs for downstream stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClarificationContext(String);

impl ClarificationContext {
    /// Pair questions and answers by ordinal
    ///
    /// Blank answers are skipped. Returns `None` when nothing is left.
    pub fn from_pairs(questions: &[ClarifyingQuestion], answers: &[Answer]) -> Option<Self> {
        let parts: Vec<String> = answers
            .iter()
            .filter(|answer| !answer.text.trim().is_empty())
            .map(|answer| {
                match questions.iter().find(|q| q.ordinal == answer.ordinal) {
                    Some(question) => format!(
                        "Question {n}: {q}\nAnswer {n}: {a}",
                        n = answer.ordinal,
                        q = question.text,
                        a = answer.text.trim()
                    ),
                    None => format!("Answer {}: {}", answer.ordinal, answer.text.trim()),
                }
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(Self(parts.join("\n\n")))
        }
    }

    /// Use a caller-supplied clarification block as-is
    ///
    /// Returns `None` for a blank block.
    pub fn from_block(block: &str) -> Option<Self> {
        let trimmed = block.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Borrow the context text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One planned web search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTask {
    /// Search term to use
    pub query: String,
    /// Why this search matters for the query
    pub reason: String,
}

/// Planner output shape
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPlan {
    /// Searches to perform, in planned order
    pub searches: Vec<SearchTask>,
}

impl TypedOutput for SearchPlan {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "searches": {
                    "type": "ARRAY",
                    "description": "Web searches to perform to best answer the query",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "reason": {
                                "type": "STRING",
                                "description": "Why this search is important to the query"
                            },
                            "query": {
                                "type": "STRING",
                                "description": "The search term to use"
                            }
                        },
                        "required": ["reason", "query"]
                    }
                }
            },
            "required": ["searches"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.searches.is_empty() {
            return Err("plan contains no searches".to_string());
        }
        for (idx, task) in self.searches.iter().enumerate() {
            if task.query.trim().is_empty() {
                return Err(format!("search {} has an empty query", idx + 1));
            }
            if task.reason.trim().is_empty() {
                return Err(format!("search {} has an empty reason", idx + 1));
            }
        }
        Ok(())
    }
}

/// The synthesized research report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Two or three sentence summary of the findings
    pub short_summary: String,
    /// Full report body in markdown
    pub markdown_report: String,
    /// Suggested topics to research further
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

impl TypedOutput for Report {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "short_summary": {
                    "type": "STRING",
                    "description": "A short 2-3 sentence summary of the findings"
                },
                "markdown_report": {
                    "type": "STRING",
                    "description": "The final report in markdown"
                },
                "follow_up_questions": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Suggested topics to research further"
                }
            },
            "required": ["short_summary", "markdown_report", "follow_up_questions"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.markdown_report.trim().is_empty() {
            return Err("report has an empty markdown body".to_string());
        }
        if self.short_summary.trim().is_empty() {
            return Err("report has an empty summary".to_string());
        }
        Ok(())
    }
}

/// Classified result of handing the report to the delivery transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The transport accepted the report
    Success,
    /// The transport refused or could not be reached
    Failure {
        /// Raw error message
        reason: String,
        /// Likely root causes and remediation, when the failure class is known
        diagnostic_hint: Option<String>,
    },
}

impl DeliveryOutcome {
    /// Whether the report was accepted for delivery
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success)
    }
}
