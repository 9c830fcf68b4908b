//! Clarification stage
//!
//! Generates the clarifying questions asked before any research happens.

use crate::research::constants::CLARIFYING_QUESTION_COUNT;
use crate::research::error::ModelInvocationError;
use crate::research::model::{typed_call, ModelClient, TypedOutput};
use crate::research::types::ResearchQuery;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const SINGLE_QUESTION_INSTRUCTIONS: &str = "You are a research assistant who helps clarify research queries by asking insightful questions.
Given a research query and any previously asked questions, generate the next clarifying question that will help refine and focus the research.

The question should:
1. Help understand the user's specific needs or context
2. Narrow down the scope if the query is too broad
3. Identify any specific aspects, timeframes, or perspectives the user cares about
4. Be different from previously asked questions

Make the question concise, specific, and actionable. It should be a question that, when answered, will significantly improve the quality and relevance of the research.";

const BATCH_INSTRUCTIONS: &str = "You are a research assistant who helps clarify research queries by asking insightful questions.
Given a research query, generate exactly 3 clarifying questions that will help refine and focus the research.
These questions should:
1. Help understand the user's specific needs or context
2. Narrow down the scope if the query is too broad
3. Identify any specific aspects, timeframes, or perspectives the user cares about

Make the questions concise, specific, and actionable. They should be questions that, when answered, will significantly improve the quality and relevance of the research.";

#[derive(Debug, Deserialize)]
struct SingleQuestion {
    question: String,
}

impl TypedOutput for SingleQuestion {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "question": {
                    "type": "STRING",
                    "description": "A single clarifying question to help refine the research query"
                }
            },
            "required": ["question"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("clarifying question is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ClarificationQuestions {
    questions: Vec<String>,
}

impl TypedOutput for ClarificationQuestions {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "questions": {
                    "type": "ARRAY",
                    "description": "Exactly 3 clarifying questions to help refine the research query",
                    "items": { "type": "STRING" },
                    "minItems": CLARIFYING_QUESTION_COUNT,
                    "maxItems": CLARIFYING_QUESTION_COUNT
                }
            },
            "required": ["questions"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.questions.len() != CLARIFYING_QUESTION_COUNT {
            return Err(format!(
                "expected {} clarifying questions, got {}",
                CLARIFYING_QUESTION_COUNT,
                self.questions.len()
            ));
        }
        if self.questions.iter().any(|q| q.trim().is_empty()) {
            return Err("clarifying question is empty".to_string());
        }
        Ok(())
    }
}

/// Asks the model for clarifying questions
#[derive(Clone)]
pub struct ClarifyStage {
    model: Arc<dyn ModelClient>,
}

impl ClarifyStage {
    /// Create the stage around a shared model client
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Generate the next question, conditioned on every question asked so far
    pub async fn next_question(
        &self,
        query: &ResearchQuery,
        prior: &[String],
    ) -> Result<String, ModelInvocationError> {
        let input = question_input(query, prior);
        let output: SingleQuestion =
            typed_call(self.model.as_ref(), SINGLE_QUESTION_INSTRUCTIONS, &input).await?;

        tracing::debug!(
            prior_questions = prior.len(),
            question_len = output.question.len(),
            "Generated clarifying question"
        );
        Ok(output.question.trim().to_string())
    }

    /// Generate all three questions in a single call
    pub async fn batch_questions(
        &self,
        query: &ResearchQuery,
    ) -> Result<[String; CLARIFYING_QUESTION_COUNT], ModelInvocationError> {
        let input = format!("Research query: {}", query);
        let output: ClarificationQuestions =
            typed_call(self.model.as_ref(), BATCH_INSTRUCTIONS, &input).await?;

        let questions: Vec<String> = output
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .collect();
        // validate() already checked the count
        questions.try_into().map_err(|rest: Vec<String>| {
            ModelInvocationError::MalformedOutput(format!(
                "expected {} clarifying questions, got {}",
                CLARIFYING_QUESTION_COUNT,
                rest.len()
            ))
        })
    }
}

fn question_input(query: &ResearchQuery, prior: &[String]) -> String {
    let mut input = format!("Research query: {}", query);
    if !prior.is_empty() {
        input.push_str("\n\nPreviously asked questions:\n");
        let listed: Vec<String> = prior.iter().map(|q| format!("- {}", q)).collect();
        input.push_str(&listed.join("\n"));
        input.push_str(
            "\n\nGenerate a NEW question that is different from the above and helps further clarify the research.",
        );
    }
    input
}
