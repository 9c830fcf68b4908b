//! Research orchestrator
//!
//! Drives one `SessionState` through clarification and the fixed
//! plan → search → write → deliver pipeline, narrating every transition.
//!
//! Two entry modes:
//! - interactive: `start_session` (or `start_session_batch`), then
//!   `submit_answer` three times, then `run`
//! - one-shot: `run_research` (three answers) or
//!   `run_research_with_clarifications` (pre-baked block, skips the questions)

use crate::config::Config;
use crate::research::config::ResearchConfig;
use crate::research::constants::{CLARIFYING_QUESTION_COUNT, SENDGRID_API_BASE_URL};
use crate::research::email_client::SendGridTransport;
use crate::research::error::ResearchError;
use crate::research::model::{GeminiModel, ModelClient};
use crate::research::progress::{ProgressReporter, StatusKind};
use crate::research::session::{ResearchPhase, SessionState};
use crate::research::stages::{
    ClarifyStage, DeliverStage, DeliveryTransport, PlanStage, SearchCapability, SearchStage,
    Stage, StageContext, StageOutput, WriteStage,
};
use crate::research::types::{ClarifyingQuestion, DeliveryOutcome, Report, ResearchQuery};
use crate::research::utils::{hash_query, validate_query};
use crate::research::web_search::GeminiSearch;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// External capabilities the pipeline depends on
#[derive(Clone)]
pub struct ResearchServices {
    /// Typed model calls (clarify, plan, write)
    pub model: Arc<dyn ModelClient>,
    /// Web search
    pub search: Arc<dyn SearchCapability>,
    /// Report delivery
    pub delivery: Arc<dyn DeliveryTransport>,
}

impl ResearchServices {
    /// Production services: Gemini for models and search, SendGrid for email
    ///
    /// All three share one HTTP client (connection pooling).
    pub fn gemini(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.research.gemini_timeout_secs))
            .build()?;

        Ok(Self {
            model: Arc::new(GeminiModel::new(
                client.clone(),
                config.gemini_api_key.clone(),
                &config.research,
            )),
            search: Arc::new(GeminiSearch::new(
                client.clone(),
                config.gemini_api_key.clone(),
                &config.research,
            )),
            delivery: Arc::new(SendGridTransport::new(
                client,
                config.email.sendgrid_api_key.clone(),
                SENDGRID_API_BASE_URL,
                config.email.from_address.clone(),
                config.email.to_address.clone(),
            )),
        })
    }
}

/// Result of `submit_answer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Another question needs answering
    NextQuestion {
        /// The question
        question: ClarifyingQuestion,
    },
    /// All three answers are in; `run` may be called
    ReadyForResearch,
}

/// Final products of a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchOutcome {
    /// The synthesized report
    pub report: Report,
    /// What happened when the report was sent
    pub delivery: DeliveryOutcome,
    /// Full progress narrative, ending with the report
    pub narrative: Vec<String>,
}

/// Owns one research session and runs the stages against it
pub struct Orchestrator {
    config: ResearchConfig,
    clarify: Stage,
    clarify_batch: Stage,
    pipeline: Vec<Stage>,
    session: Option<SessionState>,
    progress: ProgressReporter,
}

impl Orchestrator {
    /// Build the stage list from `services`
    pub fn new(services: &ResearchServices, config: &ResearchConfig) -> Self {
        let pipeline = vec![
            Stage::Plan(PlanStage::new(
                Arc::clone(&services.model),
                config.num_searches,
            )),
            Stage::Search(SearchStage::new(
                Arc::clone(&services.search),
                Duration::from_secs(config.search_timeout_secs),
            )),
            Stage::Write(WriteStage::new(Arc::clone(&services.model))),
            Stage::Deliver(DeliverStage::new(Arc::clone(&services.delivery))),
        ];

        Self {
            config: config.clone(),
            clarify: Stage::Clarify(ClarifyStage::new(Arc::clone(&services.model))),
            clarify_batch: Stage::ClarifyBatch(ClarifyStage::new(Arc::clone(&services.model))),
            pipeline,
            session: None,
            progress: ProgressReporter::silent(),
        }
    }

    /// Send progress updates to `progress`
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Resume an existing session
    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = Some(session);
        self
    }

    /// The current session, if any
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// Give up ownership of the session
    pub fn into_session(self) -> Option<SessionState> {
        self.session
    }

    /// Start a new session for `query` and generate the first question
    ///
    /// Any previous session is discarded.
    ///
    /// # Errors
    /// * `InvalidInput` for an empty or over-long query
    /// * `Model` if question generation fails (the session is aborted)
    pub async fn start_session(&mut self, query: &str) -> Result<ClarifyingQuestion, ResearchError> {
        self.open_session(query)?;
        self.ask_next_question().await
    }

    /// Start a new session and generate all three questions in one call
    ///
    /// The questions are then answered one at a time with `submit_answer`,
    /// which never calls the model again.
    ///
    /// # Errors
    /// Same as `start_session`.
    pub async fn start_session_batch(
        &mut self,
        query: &str,
    ) -> Result<Vec<ClarifyingQuestion>, ResearchError> {
        self.open_session(query)?;

        let session = self.session.as_mut().ok_or(ResearchError::NoActiveSession)?;
        session.transition(ResearchPhase::Clarifying(1))?;
        self.progress.narrate(
            session,
            format!("**Generating {} questions...**", CLARIFYING_QUESTION_COUNT),
        );

        self.clarify(true).await?;
        Ok(self
            .session
            .as_ref()
            .map(|s| s.questions().to_vec())
            .unwrap_or_default())
    }

    /// Record the answer to the pending question
    ///
    /// # Errors
    /// * `NoActiveSession` if `start_session` was never called
    /// * `InvalidInput` for a blank answer or when no question is pending
    /// * `Model` if generating the next question fails
    pub async fn submit_answer(&mut self, text: &str) -> Result<AnswerOutcome, ResearchError> {
        let session = self.session.as_mut().ok_or(ResearchError::NoActiveSession)?;
        if !matches!(session.phase(), ResearchPhase::Clarifying(_)) {
            return Err(ResearchError::InvalidInput(format!(
                "No clarifying question is awaiting an answer (session is {})",
                session.phase()
            )));
        }
        session.record_answer(text)?;
        self.after_answer().await
    }

    /// Run planning through delivery on a session that is ready for it
    ///
    /// # Errors
    /// * `NoActiveSession` if there is no session
    /// * `InvalidTransition` if answers are still missing
    /// * `Model` if planning or writing fails (the session is aborted)
    pub async fn run(&mut self) -> Result<ResearchOutcome, ResearchError> {
        let Orchestrator {
            pipeline,
            session,
            progress,
            ..
        } = self;
        let session = session.as_mut().ok_or(ResearchError::NoActiveSession)?;

        if !session.ready_for_planning() {
            return Err(ResearchError::InvalidTransition {
                from: session.phase().clone(),
                to: ResearchPhase::Planning,
            });
        }

        tracing::info!(
            session_id = %session.id,
            direct_entry = session.uses_direct_entry(),
            "Starting research pipeline"
        );

        let source = if session.uses_direct_entry() {
            "clarifications"
        } else {
            "answers"
        };
        match session.clarification_context() {
            Some(context) => progress.narrate(
                session,
                format!(
                    "**Using your {} to tune the research:**\n\n{}",
                    source,
                    context.as_str()
                ),
            ),
            None => progress.narrate(
                session,
                "⚠️ *No answers provided. Proceeding with general research.*",
            ),
        }

        for stage in pipeline.iter() {
            if let Some(phase) = stage.phase() {
                session.transition(phase)?;
            }
            if let Some(intro) = stage_intro(stage) {
                progress.narrate(session, intro);
            }

            tracing::debug!(session_id = %session.id, stage = stage.name(), "Running stage");
            let output = {
                let ctx = StageContext {
                    session: &*session,
                    progress: &*progress,
                };
                stage.run(&ctx).await
            };

            match output {
                Ok(output) => {
                    let note = apply_output(session, output);
                    progress.narrate(session, note);
                }
                Err(e) => {
                    abort_session(session, progress, &e);
                    return Err(e);
                }
            }
        }

        session.transition(ResearchPhase::Done)?;

        let report = session.report.clone().ok_or_else(|| {
            ResearchError::Internal("Session finished without a report".to_string())
        })?;
        let delivery = session.delivery.clone().ok_or_else(|| {
            ResearchError::Internal("Session finished without a delivery outcome".to_string())
        })?;

        progress.narrate_as(
            session,
            format!("## Research Report\n\n{}", report.markdown_report),
            StatusKind::Completed,
        );

        tracing::info!(
            session_id = %session.id,
            delivered = delivery.is_success(),
            results = session.search_results.len(),
            failed_searches = session.failed_searches,
            "Research session complete"
        );

        Ok(ResearchOutcome {
            report,
            delivery,
            narrative: session.narrative().to_vec(),
        })
    }

    /// One-shot: start, answer all three questions, run
    ///
    /// Blank answers count as skipped rather than being rejected.
    pub async fn run_research(
        &mut self,
        query: &str,
        answers: &[String; CLARIFYING_QUESTION_COUNT],
    ) -> Result<ResearchOutcome, ResearchError> {
        self.start_session(query).await?;

        for answer in answers {
            let session = self.session.as_mut().ok_or(ResearchError::NoActiveSession)?;
            if answer.trim().is_empty() {
                session.skip_answer()?;
            } else {
                session.record_answer(answer)?;
            }
            if let AnswerOutcome::ReadyForResearch = self.after_answer().await? {
                break;
            }
        }

        self.run().await
    }

    /// One-shot with a pre-baked clarification block; no questions are generated
    pub async fn run_research_with_clarifications(
        &mut self,
        query: &str,
        clarifications: &str,
    ) -> Result<ResearchOutcome, ResearchError> {
        let query = validate_query(query, self.config.max_query_length)?;
        let mut session =
            SessionState::with_clarifications(ResearchQuery::new(query), clarifications);

        tracing::info!(
            session_id = %session.id,
            query_hash = %hash_query(query),
            "Starting research session with pre-baked clarifications"
        );
        let marker = format!("Research session: {}", session.id);
        self.progress.narrate(&mut session, marker);
        self.session = Some(session);

        self.run().await
    }

    fn open_session(&mut self, query: &str) -> Result<(), ResearchError> {
        let query = validate_query(query, self.config.max_query_length)?;
        let mut session = SessionState::new(ResearchQuery::new(query));

        tracing::info!(
            session_id = %session.id,
            query_hash = %hash_query(query),
            "Starting research session"
        );

        let marker = format!("Research session: {}", session.id);
        self.progress.narrate(&mut session, marker);
        self.progress.narrate(
            &mut session,
            format!(
                "## Generating Clarifying Questions\n\nI'll ask you {} questions to better understand your research needs.",
                CLARIFYING_QUESTION_COUNT
            ),
        );
        self.session = Some(session);
        Ok(())
    }

    async fn after_answer(&mut self) -> Result<AnswerOutcome, ResearchError> {
        let session = self.session.as_mut().ok_or(ResearchError::NoActiveSession)?;
        if session.all_questions_answered() {
            self.progress.narrate(
                session,
                "All questions answered. Ready to start the research.",
            );
            return Ok(AnswerOutcome::ReadyForResearch);
        }

        // Batch sessions already hold the next question
        if let Some(question) = session.questions().get(session.answers().len()).cloned() {
            session.transition(ResearchPhase::Clarifying(question.ordinal))?;
            self.progress.narrate(
                session,
                format!("### Question {}:\n\n{}", question.ordinal, question.text),
            );
            return Ok(AnswerOutcome::NextQuestion { question });
        }

        let question = self.ask_next_question().await?;
        Ok(AnswerOutcome::NextQuestion { question })
    }

    async fn ask_next_question(&mut self) -> Result<ClarifyingQuestion, ResearchError> {
        let session = self.session.as_mut().ok_or(ResearchError::NoActiveSession)?;
        let ordinal = session.questions().len() + 1;
        session.transition(ResearchPhase::Clarifying(ordinal))?;
        self.progress
            .narrate(session, format!("**Generating question {}...**", ordinal));

        self.clarify(false).await?;
        self.session
            .as_ref()
            .and_then(|s| s.questions().last().cloned())
            .ok_or_else(|| ResearchError::Internal("Question was not recorded".to_string()))
    }

    /// Run a clarify stage and record its questions, aborting on failure
    async fn clarify(&mut self, batch: bool) -> Result<(), ResearchError> {
        let Orchestrator {
            clarify,
            clarify_batch,
            session,
            progress,
            ..
        } = self;
        let stage = if batch { clarify_batch } else { clarify };
        let session = session.as_mut().ok_or(ResearchError::NoActiveSession)?;

        let output = {
            let ctx = StageContext {
                session: &*session,
                progress: &*progress,
            };
            stage.run(&ctx).await
        };

        match output {
            Ok(output @ (StageOutput::Question(_) | StageOutput::Questions(_))) => {
                let note = apply_output(session, output);
                progress.narrate(session, note);
                Ok(())
            }
            Ok(other) => {
                let e = ResearchError::Internal(format!(
                    "Clarify stage produced unexpected output: {:?}",
                    other
                ));
                abort_session(session, progress, &e);
                Err(e)
            }
            Err(e) => {
                abort_session(session, progress, &e);
                Err(e)
            }
        }
    }
}

fn stage_intro(stage: &Stage) -> Option<&'static str> {
    match stage {
        Stage::Plan(_) => Some("## Planning searches based on your answers..."),
        Stage::Search(_) => Some("## Searching the web..."),
        _ => None,
    }
}

/// Store a stage's output on the session and return the narrative line for it
fn apply_output(session: &mut SessionState, output: StageOutput) -> String {
    match output {
        StageOutput::Question(text) => {
            let question = session.record_question(text);
            format!("### Question {}:\n\n{}", question.ordinal, question.text)
        }
        StageOutput::Questions(texts) => texts
            .into_iter()
            .map(|text| {
                let question = session.record_question(text);
                format!("### Question {}:\n\n{}", question.ordinal, question.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        StageOutput::Plan(tasks) => {
            let note = format!(
                "✓ Searches planned ({} searches), starting to search...",
                tasks.len()
            );
            session.search_tasks = tasks;
            note
        }
        StageOutput::SearchResults(outcome) => {
            let note = if outcome.failed > 0 {
                format!(
                    "✓ Searches complete ({} results, {} failed), writing report...",
                    outcome.results.len(),
                    outcome.failed
                )
            } else {
                format!(
                    "✓ Searches complete ({} results), writing report...",
                    outcome.results.len()
                )
            };
            session.search_results = outcome.results;
            session.failed_searches = outcome.failed;
            note
        }
        StageOutput::Report(report) => {
            session.report = Some(report);
            "✓ Report written, sending email...".to_string()
        }
        StageOutput::Delivery(outcome) => {
            let note = match &outcome {
                DeliveryOutcome::Success => "✓ Email sent successfully!".to_string(),
                DeliveryOutcome::Failure {
                    reason,
                    diagnostic_hint: Some(hint),
                } => format!("⚠️ Email sending issue: {}\n\n{}", reason, hint),
                DeliveryOutcome::Failure { reason, .. } => {
                    format!("⚠️ Email sending issue: {}", reason)
                }
            };
            session.delivery = Some(outcome);
            note
        }
    }
}

fn abort_session(session: &mut SessionState, progress: &ProgressReporter, error: &ResearchError) {
    tracing::error!(
        session_id = %session.id,
        phase = %session.phase(),
        error = %error,
        "Research session aborted"
    );
    session.abort(error);
    progress.narrate_as(
        session,
        format!("❌ Research aborted: {}", error),
        StatusKind::Error,
    );
}
