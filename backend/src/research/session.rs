//! Research session state machine
//!
//! `SessionState` is the single mutable aggregate threaded through a research
//! run. It is owned by one `Orchestrator`; phase changes go through
//! `transition`, which rejects moves the pipeline does not allow.

use crate::research::constants::CLARIFYING_QUESTION_COUNT;
use crate::research::error::ResearchError;
use crate::research::types::{
    Answer, ClarificationContext, ClarifyingQuestion, DeliveryOutcome, Report, ResearchQuery,
    SearchTask,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Current phase of a research session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "detail", rename_all = "snake_case")]
pub enum ResearchPhase {
    /// No query yet
    Idle,
    /// Waiting on clarifying question k (1-based)
    Clarifying(usize),
    /// Turning the query into search tasks
    Planning,
    /// Running search tasks
    Searching,
    /// Synthesizing the report
    Writing,
    /// Handing the report to the delivery transport
    Delivering,
    /// Report produced (delivery may still have failed)
    Done,
    /// A model call failed; carries the error message
    Aborted(String),
}

impl ResearchPhase {
    /// `Done` and `Aborted` accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchPhase::Done | ResearchPhase::Aborted(_))
    }

    /// Whether the pipeline allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: &ResearchPhase) -> bool {
        use ResearchPhase::*;
        match (self, next) {
            (from, Aborted(_)) => !from.is_terminal(),
            (Idle, Clarifying(1)) => true,
            // Pre-baked clarifications skip the question loop
            (Idle, Planning) => true,
            (Clarifying(k), Clarifying(n)) => *n == k + 1 && *n <= CLARIFYING_QUESTION_COUNT,
            (Clarifying(k), Planning) => *k == CLARIFYING_QUESTION_COUNT,
            (Planning, Searching)
            | (Searching, Writing)
            | (Writing, Delivering)
            | (Delivering, Done) => true,
            _ => false,
        }
    }

    /// Step number used in streamed status updates
    pub fn step(&self) -> u32 {
        match self {
            ResearchPhase::Idle | ResearchPhase::Aborted(_) => 0,
            ResearchPhase::Clarifying(k) => *k as u32,
            ResearchPhase::Planning => 4,
            ResearchPhase::Searching => 5,
            ResearchPhase::Writing => 6,
            ResearchPhase::Delivering => 7,
            ResearchPhase::Done => 8,
        }
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResearchPhase::Idle => write!(f, "idle"),
            ResearchPhase::Clarifying(k) => write!(f, "clarifying({})", k),
            ResearchPhase::Planning => write!(f, "planning"),
            ResearchPhase::Searching => write!(f, "searching"),
            ResearchPhase::Writing => write!(f, "writing"),
            ResearchPhase::Delivering => write!(f, "delivering"),
            ResearchPhase::Done => write!(f, "done"),
            ResearchPhase::Aborted(_) => write!(f, "aborted"),
        }
    }
}

/// State of one research session
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    /// Unique session ID
    pub id: Uuid,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    query: ResearchQuery,
    questions: Vec<ClarifyingQuestion>,
    answers: Vec<Answer>,
    clarification_block: Option<String>,
    /// Tasks produced by the planning stage
    pub search_tasks: Vec<SearchTask>,
    /// Successful search summaries, in completion order
    pub search_results: Vec<String>,
    /// Number of search tasks that failed or timed out
    pub failed_searches: usize,
    /// Report produced by the writing stage
    pub report: Option<Report>,
    /// Classified delivery result
    pub delivery: Option<DeliveryOutcome>,
    phase: ResearchPhase,
    narrative: Vec<String>,
}

impl SessionState {
    /// Start a session for `query` in the `Idle` phase
    pub fn new(query: ResearchQuery) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            query,
            questions: Vec::new(),
            answers: Vec::new(),
            clarification_block: None,
            search_tasks: Vec::new(),
            search_results: Vec::new(),
            failed_searches: 0,
            report: None,
            delivery: None,
            phase: ResearchPhase::Idle,
            narrative: Vec::new(),
        }
    }

    /// Start a session whose clarifications were supplied up front
    ///
    /// An empty block is allowed and means "no clarifications".
    pub fn with_clarifications(query: ResearchQuery, block: impl Into<String>) -> Self {
        Self {
            clarification_block: Some(block.into()),
            ..Self::new(query)
        }
    }

    /// The original query
    pub fn query(&self) -> &ResearchQuery {
        &self.query
    }

    /// Questions in generation order
    pub fn questions(&self) -> &[ClarifyingQuestion] {
        &self.questions
    }

    /// Question texts, for conditioning the next question
    pub fn question_texts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.text.clone()).collect()
    }

    /// Answers in submission order
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Current phase
    pub fn phase(&self) -> &ResearchPhase {
        &self.phase
    }

    /// Append-only progress narrative
    pub fn narrative(&self) -> &[String] {
        &self.narrative
    }

    /// Move to `next`, or fail without changing anything
    pub fn transition(&mut self, next: ResearchPhase) -> Result<(), ResearchError> {
        if !self.phase.can_transition_to(&next) {
            return Err(ResearchError::InvalidTransition {
                from: self.phase.clone(),
                to: next,
            });
        }
        tracing::debug!(
            session_id = %self.id,
            from = %self.phase,
            to = %next,
            "Research phase transition"
        );
        self.phase = next;
        Ok(())
    }

    /// Move to `Aborted` unless the session already finished
    pub fn abort(&mut self, error: &ResearchError) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = ResearchPhase::Aborted(error.to_string());
    }

    /// Append a generated question with the next ordinal
    pub fn record_question(&mut self, text: String) -> &ClarifyingQuestion {
        let ordinal = self.questions.len() + 1;
        self.questions.push(ClarifyingQuestion { ordinal, text });
        &self.questions[ordinal - 1]
    }

    /// Record the answer to the most recent unanswered question
    ///
    /// # Errors
    /// * `NoActiveSession` if no question has been asked
    /// * `InvalidInput` if the answer is blank or every question is answered
    pub fn record_answer(&mut self, text: &str) -> Result<&Answer, ResearchError> {
        if text.trim().is_empty() && !self.questions.is_empty() {
            return Err(ResearchError::InvalidInput(
                "Answer cannot be empty".to_string(),
            ));
        }
        self.push_answer(text.trim())
    }

    /// Record an empty answer to the most recent question
    ///
    /// Skipped answers count towards the three but are left out of the
    /// clarification context.
    pub fn skip_answer(&mut self) -> Result<&Answer, ResearchError> {
        self.push_answer("")
    }

    fn push_answer(&mut self, text: &str) -> Result<&Answer, ResearchError> {
        if self.questions.is_empty() {
            return Err(ResearchError::NoActiveSession);
        }
        if self.answers.len() >= self.questions.len() {
            return Err(ResearchError::InvalidInput(
                "Every clarifying question has already been answered".to_string(),
            ));
        }
        let ordinal = self.answers.len() + 1;
        self.answers.push(Answer {
            ordinal,
            text: text.to_string(),
        });
        Ok(&self.answers[ordinal - 1])
    }

    /// Whether all clarifying questions have answers
    pub fn all_questions_answered(&self) -> bool {
        self.answers.len() == CLARIFYING_QUESTION_COUNT
    }

    /// Whether planning may start from the current state
    pub fn ready_for_planning(&self) -> bool {
        match &self.phase {
            ResearchPhase::Idle => self.clarification_block.is_some(),
            ResearchPhase::Clarifying(k) => {
                *k == CLARIFYING_QUESTION_COUNT && self.all_questions_answered()
            }
            _ => false,
        }
    }

    /// Whether this session entered planning through a pre-baked block
    pub fn uses_direct_entry(&self) -> bool {
        self.clarification_block.is_some()
    }

    /// Derived clarification context, recomputed on every call
    pub fn clarification_context(&self) -> Option<ClarificationContext> {
        match &self.clarification_block {
            Some(block) => ClarificationContext::from_block(block),
            None => ClarificationContext::from_pairs(&self.questions, &self.answers),
        }
    }

    /// Append a line to the narrative
    pub fn push_narrative(&mut self, entry: String) {
        self.narrative.push(entry);
    }
}
