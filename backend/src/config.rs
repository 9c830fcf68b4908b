//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use crate::research::config::ResearchConfig;
use std::env;
use std::fmt;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Research pipeline tunables
    pub research: ResearchConfig,
    /// Gemini API key (empty when unset)
    pub gemini_api_key: String,
    /// Email delivery configuration
    pub email: EmailConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Email delivery configuration
#[derive(Clone)]
pub struct EmailConfig {
    /// SendGrid API key (empty when unset)
    pub sendgrid_api_key: String,
    /// Verified sender address
    pub from_address: String,
    /// Recipient address
    pub to_address: String,
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

// Keys must never reach the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("research", &self.research)
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("email", &self.email)
            .finish()
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sendgrid_api_key", &redact(&self.sendgrid_api_key))
            .field("from_address", &self.from_address)
            .field("to_address", &self.to_address)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let from_address = env::var("EMAIL_FROM").unwrap_or_default();
        Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            research: ResearchConfig::from_env(),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            email: EmailConfig {
                sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
                // Reports go to the sender unless a recipient is given
                to_address: env::var("EMAIL_TO").unwrap_or_else(|_| from_address.clone()),
                from_address,
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
