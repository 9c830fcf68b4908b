// Application state management
// Holds configuration, the injected research services and the active session

use crate::config::Config;
use crate::research::config::ResearchConfig;
use crate::research::pipeline::{Orchestrator, ResearchServices};
use crate::research::session::SessionState;

/// Builds research services from the full application configuration
pub type ServiceBuilder = fn(&Config) -> anyhow::Result<ResearchServices>;

/// Shared application state
///
/// Wrapped in `Arc<RwLock<_>>` by the server. There is at most one research
/// session. A request that advances it claims the state first and releases it
/// when done, so two writers never work on copies of the same session.
pub struct AppState {
    config: Config,
    services: ResearchServices,
    builder: Option<ServiceBuilder>,
    session: Option<SessionState>,
    claimed: bool,
}

impl AppState {
    /// Create state with fixed services
    pub fn new(config: Config, services: ResearchServices) -> Self {
        Self {
            config,
            services,
            builder: None,
            session: None,
            claimed: false,
        }
    }

    /// Create state whose services are built from `config` by `builder`
    ///
    /// The services are rebuilt when the model name changes.
    pub fn with_builder(config: Config, builder: ServiceBuilder) -> anyhow::Result<Self> {
        let services = builder(&config)?;
        Ok(Self {
            builder: Some(builder),
            ..Self::new(config, services)
        })
    }

    /// Application configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Research tunables
    pub fn research_config(&self) -> &ResearchConfig {
        &self.config.research
    }

    /// Replace the research tunables
    ///
    /// Takes effect for orchestrators built afterwards. A new model name
    /// rebuilds the services; if that fails nothing is changed.
    pub fn set_research_config(&mut self, research: ResearchConfig) -> anyhow::Result<()> {
        let model_changed = research.gemini_model != self.config.research.gemini_model;
        let previous = std::mem::replace(&mut self.config.research, research);

        if let (true, Some(build)) = (model_changed, self.builder) {
            match build(&self.config) {
                Ok(services) => {
                    tracing::info!(
                        model = %self.config.research.gemini_model,
                        "Rebuilt research services for new model"
                    );
                    self.services = services;
                }
                Err(e) => {
                    self.config.research = previous;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Build an orchestrator over the current services and configuration
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(&self.services, &self.config.research)
    }

    /// The active session, if any
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    /// Whether a request or a pipeline run currently owns the session
    pub fn is_busy(&self) -> bool {
        self.claimed
    }

    /// Claim exclusive use of the session
    ///
    /// Returns `false` if another request already holds it.
    pub fn try_claim(&mut self) -> bool {
        if self.claimed {
            return false;
        }
        self.claimed = true;
        true
    }

    /// Move the session out; only meaningful while claimed
    pub fn take_session(&mut self) -> Option<SessionState> {
        self.session.take()
    }

    /// Store the session a claim ended with and release the claim
    pub fn release(&mut self, session: Option<SessionState>) {
        self.session = session;
        self.claimed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmailConfig, ServerConfig};
    use crate::research::error::{DeliveryError, ModelInvocationError, SearchTaskError};
    use crate::research::model::{ModelClient, ModelRequest};
    use crate::research::stages::{DeliveryTransport, SearchCapability, TransportStatus};
    use crate::research::types::{ClarificationContext, ResearchQuery, SearchTask};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unused;

    #[async_trait]
    impl ModelClient for Unused {
        async fn invoke(&self, _: ModelRequest) -> Result<String, ModelInvocationError> {
            Err(ModelInvocationError::MissingApiKey)
        }
    }

    #[async_trait]
    impl SearchCapability for Unused {
        async fn search(
            &self,
            _: &SearchTask,
            _: Option<&ClarificationContext>,
        ) -> Result<String, SearchTaskError> {
            Err(SearchTaskError::Failed("unused".to_string()))
        }
    }

    #[async_trait]
    impl DeliveryTransport for Unused {
        async fn send(&self, _: &str, _: &str) -> Result<TransportStatus, DeliveryError> {
            Ok(TransportStatus::Accepted)
        }
    }

    fn services() -> ResearchServices {
        ResearchServices {
            model: Arc::new(Unused),
            search: Arc::new(Unused),
            delivery: Arc::new(Unused),
        }
    }

    fn state() -> AppState {
        let services = services();
        AppState::new(config(), services)
    }

    fn config() -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
            },
            research: ResearchConfig::default(),
            gemini_api_key: String::new(),
            email: EmailConfig {
                sendgrid_api_key: String::new(),
                from_address: String::new(),
                to_address: String::new(),
            },
        }
    }

    #[test]
    fn test_app_state_creation() {
        let state = state();
        assert!(state.session().is_none());
        assert!(!state.is_busy());
    }

    #[test]
    fn test_claim_is_exclusive() {
        let mut state = state();
        state.release(Some(SessionState::new(ResearchQuery::new("topic"))));

        assert!(state.try_claim());
        assert!(!state.try_claim());
        let session = state.take_session().unwrap();
        assert!(state.session().is_none());

        state.release(Some(session));
        assert!(!state.is_busy());
        assert_eq!(state.session().unwrap().query().as_str(), "topic");
        assert!(state.try_claim());
    }

    #[test]
    fn test_research_config_update_with_fixed_services() {
        let mut state = state();
        let updated = ResearchConfig {
            num_searches: 2,
            gemini_model: "other-model".to_string(),
            ..state.research_config().clone()
        };
        state.set_research_config(updated).unwrap();
        assert_eq!(state.research_config().num_searches, 2);
        assert_eq!(state.research_config().gemini_model, "other-model");
    }

    fn failing_builder(config: &Config) -> anyhow::Result<ResearchServices> {
        if config.research.gemini_model == "broken" {
            anyhow::bail!("cannot build services");
        }
        Ok(services())
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_config() {
        let mut state = AppState::with_builder(config(), failing_builder).unwrap();
        let updated = ResearchConfig {
            gemini_model: "broken".to_string(),
            num_searches: 9,
            ..state.research_config().clone()
        };

        assert!(state.set_research_config(updated).is_err());
        assert_eq!(state.research_config().gemini_model, "gemini-2.5-flash");
        assert_eq!(state.research_config().num_searches, 5);
    }
}
