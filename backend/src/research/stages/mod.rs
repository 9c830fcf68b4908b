//! Pipeline stages
//!
//! Each stage is a variant of `Stage` with the same contract: read the session,
//! call its capability, return a `StageOutput`. Stages never mutate the
//! session; the orchestrator applies their output.

pub mod clarify;
pub mod deliver;
pub mod plan;
pub mod search;
pub mod write;

pub use clarify::ClarifyStage;
pub use deliver::{classify, DeliverStage, DeliveryTransport, TransportStatus};
pub use plan::PlanStage;
pub use search::{SearchCapability, SearchOutcome, SearchStage};
pub use write::WriteStage;

use crate::research::error::ResearchError;
use crate::research::progress::ProgressReporter;
use crate::research::session::{ResearchPhase, SessionState};
use crate::research::types::{DeliveryOutcome, Report, SearchTask};
use crate::research::utils::is_duplicate_question;

/// What a stage sees while it runs
pub struct StageContext<'a> {
    /// Read-only view of the session
    pub session: &'a SessionState,
    /// Where intermediate progress goes
    pub progress: &'a ProgressReporter,
}

/// Result of running one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// Next clarifying question
    Question(String),
    /// Every clarifying question at once
    Questions(Vec<String>),
    /// Planned searches
    Plan(Vec<SearchTask>),
    /// Successful search summaries and the number dropped
    SearchResults(SearchOutcome),
    /// Synthesized report
    Report(Report),
    /// Classified delivery result
    Delivery(DeliveryOutcome),
}

/// A pipeline stage
#[derive(Clone)]
pub enum Stage {
    /// Clarifying question generation, one at a time
    Clarify(ClarifyStage),
    /// Clarifying question generation, all three in one call
    ClarifyBatch(ClarifyStage),
    /// Search planning
    Plan(PlanStage),
    /// Concurrent search execution
    Search(SearchStage),
    /// Report synthesis
    Write(WriteStage),
    /// Report delivery
    Deliver(DeliverStage),
}

impl Stage {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Clarify(_) => "clarify",
            Stage::ClarifyBatch(_) => "clarify_batch",
            Stage::Plan(_) => "plan",
            Stage::Search(_) => "search",
            Stage::Write(_) => "write",
            Stage::Deliver(_) => "deliver",
        }
    }

    /// Phase the session enters before this stage runs
    ///
    /// Clarification has no fixed phase: the question number decides it.
    pub fn phase(&self) -> Option<ResearchPhase> {
        match self {
            Stage::Clarify(_) | Stage::ClarifyBatch(_) => None,
            Stage::Plan(_) => Some(ResearchPhase::Planning),
            Stage::Search(_) => Some(ResearchPhase::Searching),
            Stage::Write(_) => Some(ResearchPhase::Writing),
            Stage::Deliver(_) => Some(ResearchPhase::Delivering),
        }
    }

    /// Run the stage against the current session
    ///
    /// # Errors
    /// * `ResearchError::Model` if a model call fails
    /// * `ResearchError::Internal` if delivery is attempted without a report
    pub async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput, ResearchError> {
        let session = ctx.session;
        match self {
            Stage::Clarify(stage) => {
                let prior = session.question_texts();
                let question = stage.next_question(session.query(), &prior).await?;
                if is_duplicate_question(&question, &prior) {
                    tracing::warn!(
                        session_id = %session.id,
                        ordinal = prior.len() + 1,
                        "Clarifying question repeats an earlier one"
                    );
                    ctx.progress.tick(
                        session.phase(),
                        "⚠️ *This question is similar to an earlier one.*",
                    );
                }
                Ok(StageOutput::Question(question))
            }
            Stage::ClarifyBatch(stage) => {
                let questions = stage.batch_questions(session.query()).await?;
                for (idx, question) in questions.iter().enumerate() {
                    if is_duplicate_question(question, &questions[..idx]) {
                        tracing::warn!(
                            session_id = %session.id,
                            ordinal = idx + 1,
                            "Clarifying question repeats an earlier one"
                        );
                    }
                }
                Ok(StageOutput::Questions(questions.to_vec()))
            }
            Stage::Plan(stage) => {
                let context = session.clarification_context();
                let tasks = stage.plan(session.query(), context.as_ref()).await?;
                Ok(StageOutput::Plan(tasks))
            }
            Stage::Search(stage) => {
                let context = session.clarification_context();
                let outcome = stage
                    .execute_all(&session.search_tasks, context.as_ref(), ctx.progress)
                    .await;
                Ok(StageOutput::SearchResults(outcome))
            }
            Stage::Write(stage) => {
                let context = session.clarification_context();
                let report = stage
                    .write(session.query(), context.as_ref(), &session.search_results)
                    .await?;
                Ok(StageOutput::Report(report))
            }
            Stage::Deliver(stage) => {
                let report = session.report.as_ref().ok_or_else(|| {
                    ResearchError::Internal("Delivery requires a written report".to_string())
                })?;
                Ok(StageOutput::Delivery(stage.deliver(report).await))
            }
        }
    }
}
