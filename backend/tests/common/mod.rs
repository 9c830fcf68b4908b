//! Shared stubs for the integration tests
//!
//! The model answers by looking at the requested schema, the search stub fails
//! any task whose query contains "fail", and the transport replays a fixed status.

#![allow(dead_code)]

use async_trait::async_trait;
use deep_research_backend::config::{Config, EmailConfig, ServerConfig};
use deep_research_backend::research::{
    ClarificationContext, DeliveryError, DeliveryTransport, ModelClient, ModelInvocationError,
    ModelRequest, ResearchConfig, ResearchServices, SearchCapability, SearchTask,
    SearchTaskError, TransportStatus,
};
use deep_research_backend::state::{AppState, SharedState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Which stage a model request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Question,
    Batch,
    Plan,
    Report,
}

fn kind_of(request: &ModelRequest) -> CallKind {
    let properties = &request.schema["properties"];
    if properties.get("questions").is_some() {
        CallKind::Batch
    } else if properties.get("searches").is_some() {
        CallKind::Plan
    } else if properties.get("markdown_report").is_some() {
        CallKind::Report
    } else {
        CallKind::Question
    }
}

/// Model stub keyed on the output schema
pub struct ScriptedModel {
    /// Search queries the planner returns
    pub plan: Vec<&'static str>,
    /// Stage whose call fails with HTTP 500
    pub fail_on: Option<CallKind>,
    /// Time every call takes
    pub delay: Option<Duration>,
    /// Every request received, in order
    pub calls: Mutex<Vec<(CallKind, String)>>,
}

impl ScriptedModel {
    pub fn new(plan: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            plan,
            fail_on: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_on(plan: Vec<&'static str>, kind: CallKind) -> Arc<Self> {
        Arc::new(Self {
            plan,
            fail_on: Some(kind),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(plan: Vec<&'static str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            plan,
            fail_on: None,
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn inputs(&self, kind: CallKind) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, input)| input.clone())
            .collect()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(&self, request: ModelRequest) -> Result<String, ModelInvocationError> {
        let kind = kind_of(&request);
        let asked = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((kind, request.input.clone()));
            calls.iter().filter(|(k, _)| *k == CallKind::Question).count()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on == Some(kind) {
            return Err(ModelInvocationError::Status {
                status: 500,
                body: format!("{:?} model unavailable", kind),
            });
        }

        let reply = match kind {
            CallKind::Question => serde_json::json!({
                "question": format!("Clarifying question {}?", asked)
            }),
            CallKind::Batch => serde_json::json!({
                "questions": ["Which region?", "Which period?", "Which audience?"]
            }),
            CallKind::Plan => serde_json::json!({
                "searches": self
                    .plan
                    .iter()
                    .map(|q| serde_json::json!({"query": q, "reason": format!("covers {}", q)}))
                    .collect::<Vec<_>>()
            }),
            CallKind::Report => serde_json::json!({
                "short_summary": "AI safety research is expanding quickly.",
                "markdown_report": "# AI Safety Trends\n\nInterpretability and evaluations lead.",
                "follow_up_questions": ["How is regulation evolving?"]
            }),
        };
        Ok(reply.to_string())
    }
}

/// Search stub that fails tasks containing "fail" and tracks concurrency
#[derive(Default)]
pub struct StubSearch {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub contexts: Mutex<Vec<Option<String>>>,
}

impl StubSearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCapability for StubSearch {
    async fn search(
        &self,
        task: &SearchTask,
        context: Option<&ClarificationContext>,
    ) -> Result<String, SearchTaskError> {
        self.contexts
            .lock()
            .unwrap()
            .push(context.map(|c| c.as_str().to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if task.query.contains("fail") {
            Err(SearchTaskError::Failed(format!("no results for {}", task.query)))
        } else {
            Ok(format!("Summary for {}", task.query))
        }
    }
}

/// Transport stub replaying a fixed status and recording what it was given
pub struct StubTransport {
    status: TransportStatus,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl StubTransport {
    pub fn new(status: TransportStatus) -> Arc<Self> {
        Arc::new(Self {
            status,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new(TransportStatus::Accepted)
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryTransport for StubTransport {
    async fn send(&self, subject: &str, html_body: &str) -> Result<TransportStatus, DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), html_body.to_string()));
        Ok(self.status.clone())
    }
}

pub fn services(
    model: Arc<ScriptedModel>,
    search: Arc<StubSearch>,
    transport: Arc<StubTransport>,
) -> ResearchServices {
    ResearchServices {
        model,
        search,
        delivery: transport,
    }
}

pub fn five_searches_two_failing() -> Vec<&'static str> {
    vec![
        "AI safety research 2024",
        "fail: alignment funding",
        "AI evaluation benchmarks",
        "fail: policy tracker",
        "interpretability progress",
    ]
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        research: ResearchConfig {
            search_timeout_secs: 5,
            ..Default::default()
        },
        gemini_api_key: String::new(),
        email: EmailConfig {
            sendgrid_api_key: String::new(),
            from_address: "sender@example.com".to_string(),
            to_address: "reader@example.com".to_string(),
        },
    }
}

pub fn test_state(services: ResearchServices) -> SharedState {
    Arc::new(RwLock::new(AppState::new(test_config(), services)))
}

/// State whose services are real Gemini clients pointed at `base_url`
pub fn gemini_state(base_url: String, model: &str) -> SharedState {
    let mut config = test_config();
    config.gemini_api_key = "test-key".to_string();
    config.research.gemini_api_base_url = base_url;
    config.research.gemini_model = model.to_string();
    let state = AppState::with_builder(config, ResearchServices::gemini).unwrap();
    Arc::new(RwLock::new(state))
}
