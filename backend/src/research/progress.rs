//! Progress reporting
//!
//! Status updates are sent over an unbounded channel so stages never wait on a
//! slow consumer. Narrative lines also go into the session's append-only log.

use crate::research::session::{ResearchPhase, SessionState};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Status of a single update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// A stage is in progress
    Running,
    /// Intermediate tick inside a stage (not part of the narrative)
    Progress,
    /// The session finished
    Completed,
    /// The session aborted
    Error,
}

/// Research status update
/// Sent via SSE to provide real-time feedback on research progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchStatus {
    /// Step number derived from the phase
    pub step: u32,
    /// Phase name
    pub phase: String,
    /// Markdown message
    pub message: String,
    /// Kind of update
    pub status: StatusKind,
}

impl ResearchStatus {
    /// Build an update for `phase`
    pub fn new(phase: &ResearchPhase, message: impl Into<String>, status: StatusKind) -> Self {
        Self {
            step: phase.step(),
            phase: phase.to_string(),
            message: message.into(),
            status,
        }
    }
}

/// Sender side of the progress stream
///
/// A silent reporter drops every update; stages do not need to know whether
/// anyone is listening.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<ResearchStatus>>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver that consumes its updates
    pub fn channel() -> (Self, UnboundedReceiver<ResearchStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards updates
    pub fn silent() -> Self {
        Self { tx: None }
    }

    /// Send an update; a closed receiver is ignored
    pub fn emit(&self, status: ResearchStatus) {
        if let Some(tx) = &self.tx {
            if tx.send(status).is_err() {
                tracing::debug!("Progress receiver dropped, discarding update");
            }
        }
    }

    /// Append `message` to the session narrative and emit it as a running update
    pub fn narrate(&self, session: &mut SessionState, message: impl Into<String>) {
        self.narrate_as(session, message, StatusKind::Running);
    }

    /// Append `message` to the narrative and emit it with the given kind
    pub fn narrate_as(&self, session: &mut SessionState, message: impl Into<String>, status: StatusKind) {
        let message = message.into();
        session.push_narrative(message.clone());
        self.emit(ResearchStatus::new(session.phase(), message, status));
    }

    /// Emit a tick that is not recorded in the narrative
    pub fn tick(&self, phase: &ResearchPhase, message: impl Into<String>) {
        self.emit(ResearchStatus::new(phase, message, StatusKind::Progress));
    }
}
