//! Deep research pipeline
//!
//! Clarify the query with three generated questions, plan web searches, run
//! them concurrently, synthesize a report and email it. Model, search and
//! delivery are injected capabilities so the whole pipeline runs against stubs
//! in tests.

pub mod api_client;
pub mod config;
pub mod constants;
pub mod email_client;
pub mod error;
pub mod gemini_types;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stages;
pub mod types;
pub mod utils;
pub mod web_search;

pub use config::ResearchConfig;
pub use error::{DeliveryError, ModelInvocationError, ResearchError, SearchTaskError};
pub use model::{ModelClient, ModelRequest};
pub use pipeline::{AnswerOutcome, Orchestrator, ResearchOutcome, ResearchServices};
pub use progress::{ProgressReporter, ResearchStatus, StatusKind};
pub use session::{ResearchPhase, SessionState};
pub use stages::{DeliveryTransport, SearchCapability, TransportStatus};
pub use types::{
    Answer, ClarificationContext, ClarifyingQuestion, DeliveryOutcome, Report, ResearchQuery,
    SearchTask,
};
