//! Research API handlers
//!
//! Interactive flow: `POST /api/research/session` returns the first question,
//! `POST /api/research/answer` returns the next one (or reports readiness),
//! `POST /api/research/run` streams the rest of the pipeline over SSE.
//! `POST /api/research` runs everything in one request.

use crate::api::streaming::{research_stream, sse_response, ResearchJob};
use crate::error::AppError;
use crate::research::config::{validate_and_apply_config_update, ConfigUpdateRequest, ResearchConfig};
use crate::research::constants::CLARIFYING_QUESTION_COUNT;
use crate::research::error::ResearchError;
use crate::research::pipeline::{AnswerOutcome, Orchestrator};
use crate::research::session::{ResearchPhase, SessionState};
use crate::research::types::ClarifyingQuestion;
use crate::research::utils::validate_query;
use crate::state::SharedState;
use axum::{extract::State, response::Response, Json};
use serde::{Deserialize, Serialize};
use std::future::Future;
use uuid::Uuid;

const SESSION_BUSY: &str = "The research session is in use by another request";

/// Request to start an interactive session
#[derive(Deserialize, Debug)]
pub struct StartSessionRequest {
    /// The research query
    pub query: String,
    /// Generate all three questions up front in a single model call
    #[serde(default)]
    pub batch: bool,
}

/// Answer to the pending clarifying question
#[derive(Deserialize, Debug)]
pub struct AnswerRequest {
    /// Free-text answer
    pub answer: String,
}

/// One-shot research request
///
/// With `answers`, three questions are generated and answered in order. Without
/// them, `clarifications` (possibly empty) is used and no questions are asked.
#[derive(Deserialize, Debug)]
pub struct ResearchRequest {
    /// The research query
    pub query: String,
    /// Answers to the three generated questions
    #[serde(default)]
    pub answers: Option<Vec<String>>,
    /// Pre-baked clarification text
    #[serde(default)]
    pub clarifications: Option<String>,
}

/// Interactive session state returned to the client
#[derive(Serialize, Debug)]
pub struct SessionResponse {
    /// Session ID
    pub session_id: Uuid,
    /// Current phase
    pub phase: ResearchPhase,
    /// Question awaiting an answer, if any
    pub question: Option<ClarifyingQuestion>,
    /// Every generated question, for batch sessions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<ClarifyingQuestion>,
    /// Whether `POST /api/research/run` may be called
    pub ready: bool,
}

impl SessionResponse {
    fn from_orchestrator(
        orchestrator: &Orchestrator,
        question: Option<ClarifyingQuestion>,
        questions: Vec<ClarifyingQuestion>,
    ) -> Result<Self, AppError> {
        let session = orchestrator
            .session()
            .ok_or(ResearchError::NoActiveSession)?;
        Ok(Self {
            session_id: session.id,
            phase: session.phase().clone(),
            question,
            questions,
            ready: session.ready_for_planning(),
        })
    }
}

/// Claim the session, run `work` on its own task, then store the session it
/// hands back and release the claim
///
/// The task runs to completion even if the client disconnects, so the claim is
/// always released. A second request arriving meanwhile gets 409.
async fn with_claimed_session<F, Fut, T>(state: &SharedState, work: F) -> Result<T, AppError>
where
    F: FnOnce(Orchestrator, Option<SessionState>) -> Fut + Send + 'static,
    Fut: Future<Output = (Result<T, AppError>, Option<SessionState>)> + Send + 'static,
    T: Send + 'static,
{
    let (orchestrator, session) = {
        let mut state_write = state.write().await;
        if !state_write.try_claim() {
            return Err(AppError::Conflict(SESSION_BUSY.to_string()));
        }
        (state_write.orchestrator(), state_write.take_session())
    };

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let (result, session) = work(orchestrator, session).await;
        task_state.write().await.release(session);
        result
    });

    match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Session task failed to complete");
            state.write().await.release(None);
            Err(AppError::Internal(anyhow::anyhow!("Session task failed: {}", e)))
        }
    }
}

/// POST /api/research/session - Start (or restart) an interactive session
///
/// # Returns
/// * `Ok(Json<SessionResponse>)` - Session with the first question (all three with `batch`)
/// * `Err(AppError)` - Invalid query, session busy, or model failure
pub async fn start_session(
    State(state): State<SharedState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let StartSessionRequest { query, batch } = request;

    with_claimed_session(&state, move |mut orchestrator, previous| async move {
        let result = if batch {
            orchestrator.start_session_batch(&query).await
        } else {
            orchestrator.start_session(&query).await.map(|q| vec![q])
        };

        let response = match result {
            Ok(questions) => {
                let first = questions.first().cloned();
                let all = if batch { questions } else { Vec::new() };
                SessionResponse::from_orchestrator(&orchestrator, first, all)
            }
            Err(e) => Err(e.into()),
        };

        // A failed validation never created a session; keep the previous one
        (response, orchestrator.into_session().or(previous))
    })
    .await
    .map(Json)
}

/// POST /api/research/answer - Answer the pending clarifying question
///
/// # Returns
/// * `Ok(Json<SessionResponse>)` - Next question, or `ready: true` after the third answer
/// * `Err(AppError)` - Blank answer, no session, session busy, or model failure
pub async fn submit_answer(
    State(state): State<SharedState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    with_claimed_session(&state, move |orchestrator, session| async move {
        let Some(session) = session else {
            return (Err(AppError::from(ResearchError::NoActiveSession)), None);
        };
        let mut orchestrator = orchestrator.with_session(session);

        let response = match orchestrator.submit_answer(&request.answer).await {
            Ok(AnswerOutcome::NextQuestion { question }) => {
                SessionResponse::from_orchestrator(&orchestrator, Some(question), Vec::new())
            }
            Ok(AnswerOutcome::ReadyForResearch) => {
                SessionResponse::from_orchestrator(&orchestrator, None, Vec::new())
            }
            Err(e) => Err(e.into()),
        };
        (response, orchestrator.into_session())
    })
    .await
    .map(Json)
}

/// POST /api/research/run - Stream planning through delivery for the active session
///
/// # Returns
/// * `Ok(Response)` - SSE stream of status updates
/// * `Err(AppError)` - No session, answers missing, or session busy
pub async fn run_session(State(state): State<SharedState>) -> Result<Response, AppError> {
    let (session, orchestrator) = {
        let mut state_write = state.write().await;
        if !state_write.try_claim() {
            return Err(AppError::Conflict(SESSION_BUSY.to_string()));
        }
        let Some(session) = state_write.take_session() else {
            state_write.release(None);
            return Err(ResearchError::NoActiveSession.into());
        };
        if !session.ready_for_planning() {
            let error = ResearchError::InvalidTransition {
                from: session.phase().clone(),
                to: ResearchPhase::Planning,
            };
            state_write.release(Some(session));
            return Err(error.into());
        }
        (session, state_write.orchestrator())
    };

    tracing::info!(session_id = %session.id, "Streaming research run");
    sse_response(research_stream(
        state.clone(),
        orchestrator,
        ResearchJob::Resume(session),
    ))
}

/// POST /api/research - One-shot research with answers or clarifications
///
/// The run's session replaces the active one when it finishes.
///
/// # Returns
/// * `Ok(Response)` - SSE stream of status updates
/// * `Err(AppError)` - Invalid request or session busy
pub async fn research(
    State(state): State<SharedState>,
    Json(request): Json<ResearchRequest>,
) -> Result<Response, AppError> {
    let job = build_job(request, &state).await?;

    let orchestrator = {
        let mut state_write = state.write().await;
        if !state_write.try_claim() {
            return Err(AppError::Conflict(SESSION_BUSY.to_string()));
        }
        state_write.orchestrator()
    };

    sse_response(research_stream(state.clone(), orchestrator, job))
}

async fn build_job(request: ResearchRequest, state: &SharedState) -> Result<ResearchJob, AppError> {
    let max_length = state.read().await.research_config().max_query_length;
    let query = validate_query(&request.query, max_length)?.to_string();

    match (request.answers, request.clarifications) {
        (Some(_), Some(_)) => Err(AppError::BadRequest(
            "Provide either answers or clarifications, not both".to_string(),
        )),
        (Some(answers), None) => {
            let count = answers.len();
            let answers: [String; CLARIFYING_QUESTION_COUNT] =
                answers.try_into().map_err(|_| {
                    AppError::BadRequest(format!(
                        "Expected {} answers, got {}",
                        CLARIFYING_QUESTION_COUNT, count
                    ))
                })?;
            Ok(ResearchJob::WithAnswers { query, answers })
        }
        (None, clarifications) => Ok(ResearchJob::WithClarifications {
            query,
            clarifications: clarifications.unwrap_or_default(),
        }),
    }
}

/// GET /api/config - Current research configuration
pub async fn get_config(State(state): State<SharedState>) -> Json<ResearchConfig> {
    Json(state.read().await.research_config().clone())
}

/// POST /api/config - Update research configuration
///
/// Rejected with 409 while the session is in use, so a request never sees the
/// configuration change halfway through.
///
/// # Returns
/// * `Ok(Json<ResearchConfig>)` - The updated configuration
/// * `Err(AppError::InvalidConfig)` - If validation fails (nothing is applied)
pub async fn update_config(
    State(state): State<SharedState>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<ResearchConfig>, AppError> {
    let mut state_write = state.write().await;
    if state_write.is_busy() {
        return Err(AppError::Conflict(SESSION_BUSY.to_string()));
    }
    let updated = validate_and_apply_config_update(state_write.research_config().clone(), request)?;
    state_write.set_research_config(updated.clone())?;
    tracing::info!(config = ?updated, "Research configuration updated");
    Ok(Json(updated))
}
