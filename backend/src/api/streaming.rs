//! Streaming utilities for Server-Sent Events (SSE)
//!
//! A research run executes on its own task; its progress channel is drained
//! into an SSE body. The run writes its session back to the shared state when
//! it finishes, whether or not the client is still listening.

use crate::error::AppError;
use crate::research::constants::{CLARIFYING_QUESTION_COUNT, SSE_DONE_SIGNAL, SSE_ERROR_PREFIX};
use crate::research::error::ResearchError;
use crate::research::pipeline::{Orchestrator, ResearchOutcome};
use crate::research::progress::ProgressReporter;
use crate::research::session::SessionState;
use crate::state::SharedState;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use futures_util::{stream::Stream, StreamExt};

/// What a streamed run starts from
#[derive(Debug)]
pub enum ResearchJob {
    /// Continue an interactive session whose questions are answered
    Resume(SessionState),
    /// One-shot run with three answers
    WithAnswers {
        /// Research query
        query: String,
        /// Answers to the generated questions, in order
        answers: [String; CLARIFYING_QUESTION_COUNT],
    },
    /// One-shot run with a pre-baked clarification block
    WithClarifications {
        /// Research query
        query: String,
        /// Clarification text (may be empty)
        clarifications: String,
    },
}

/// Helper function to format a stream into SSE (Server-Sent Events) format
///
/// Takes a stream of `Result<String, axum::Error>` and converts it to SSE format
/// where each item is formatted as "data: <content>\n\n"
pub fn format_sse_stream(
    stream: impl Stream<Item = Result<String, axum::Error>> + Send + 'static,
) -> impl Stream<Item = Result<String, std::io::Error>> {
    stream.map(|event_result| {
        let sse_text = match event_result {
            Ok(data) => format!("data: {}\n\n", data),
            Err(e) => format!("data: {} {}\n\n", SSE_ERROR_PREFIX, e),
        };
        Ok::<_, std::io::Error>(sse_text)
    })
}

/// Wrap a formatted stream in an SSE HTTP response
pub fn sse_response(
    stream: impl Stream<Item = Result<String, axum::Error>> + Send + 'static,
) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(format_sse_stream(stream)))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build SSE response: {}", e)))
}

async fn execute(
    mut orchestrator: Orchestrator,
    job: ResearchJob,
) -> (Result<ResearchOutcome, ResearchError>, Option<SessionState>) {
    let result = match job {
        ResearchJob::Resume(session) => {
            orchestrator = orchestrator.with_session(session);
            orchestrator.run().await
        }
        ResearchJob::WithAnswers { query, answers } => {
            orchestrator.run_research(&query, &answers).await
        }
        ResearchJob::WithClarifications {
            query,
            clarifications,
        } => {
            orchestrator
                .run_research_with_clarifications(&query, &clarifications)
                .await
        }
    };
    (result, orchestrator.into_session())
}

/// Run `job` in the background and stream its progress
///
/// The caller must already hold the claim on `state`; the run releases it.
///
/// # Returns
/// * `impl Stream<Item = Result<String, axum::Error>>` - JSON status updates,
///   then an `[ERROR]` line if the run failed, then `[DONE]`
pub fn research_stream(
    state: SharedState,
    orchestrator: Orchestrator,
    job: ResearchJob,
) -> impl Stream<Item = Result<String, axum::Error>> {
    use async_stream::stream;

    let (progress, mut rx) = ProgressReporter::channel();
    let orchestrator = orchestrator.with_progress(progress);

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let (result, session) = execute(orchestrator, job).await;
        task_state.write().await.release(session);
        result
    });

    stream! {
        while let Some(status) = rx.recv().await {
            match serde_json::to_string(&status) {
                Ok(json) => yield Ok(json),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize research status"),
            }
        }

        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => yield Ok(format!("{} {}", SSE_ERROR_PREFIX, e)),
            Err(e) => {
                tracing::error!(error = %e, "Research task failed to complete");
                state.write().await.release(None);
                yield Ok(format!("{} Research task failed: {}", SSE_ERROR_PREFIX, e));
            }
        }

        yield Ok(SSE_DONE_SIGNAL.to_string());
    }
}
