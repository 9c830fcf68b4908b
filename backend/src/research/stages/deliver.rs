//! Delivery stage
//!
//! Renders the report to HTML, hands it to the delivery transport and
//! classifies what came back. Delivery problems never invalidate the report.

use crate::research::error::DeliveryError;
use crate::research::types::{DeliveryOutcome, Report};
use async_trait::async_trait;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use std::sync::Arc;

const MAX_SUBJECT_CHARS: usize = 120;

/// Likely causes of a forbidden response and how to fix them
pub const FORBIDDEN_HINT: &str = "This usually means:
1. The API key doesn't have 'Mail Send' permission
2. The sender email address is not verified with the email provider
3. The email provider account has restrictions

To fix:
- Check the API key's permissions and make sure 'Mail Send' is enabled
- Verify the sender address under the provider's sender authentication settings
- Review the account for sending restrictions";

/// Status reported by a delivery transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    /// Queued for delivery
    Accepted,
    /// Rejected for permission or identity reasons
    Forbidden {
        /// HTTP status code
        code: u16,
        /// Response body
        message: String,
    },
    /// Any other non-success status
    Other {
        /// HTTP status code
        code: u16,
        /// Response body
        message: String,
    },
}

/// Capability: deliver rendered content to the configured recipient
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Send one message
    async fn send(&self, subject: &str, html_body: &str)
        -> Result<TransportStatus, DeliveryError>;
}

/// Map a transport result onto a `DeliveryOutcome`
pub fn classify(result: Result<TransportStatus, DeliveryError>) -> DeliveryOutcome {
    match result {
        Ok(TransportStatus::Accepted) => DeliveryOutcome::Success,
        Ok(TransportStatus::Forbidden { code, message }) => DeliveryOutcome::Failure {
            reason: format!("HTTP Error {}: Forbidden {}", code, message)
                .trim_end()
                .to_string(),
            diagnostic_hint: Some(FORBIDDEN_HINT.to_string()),
        },
        Ok(TransportStatus::Other { code, message }) => DeliveryOutcome::Failure {
            reason: format!("Unexpected status code {} from email service: {}", code, message),
            diagnostic_hint: None,
        },
        Err(e) => DeliveryOutcome::Failure {
            reason: e.to_string(),
            diagnostic_hint: None,
        },
    }
}

/// Render markdown to an HTML document
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut body = String::new();
    html::push_html(&mut body, Parser::new_ext(markdown, options));
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n{}</body>\n</html>\n",
        body
    )
}

/// Text of the first heading, if the markdown has one
fn first_heading(markdown: &str) -> Option<String> {
    let mut title: Option<String> = None;
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) => title = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(ref mut title) = title {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(found) = title.take() {
                    if !found.trim().is_empty() {
                        return Some(found.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Subject line: first heading, else the short summary
pub fn subject_for(report: &Report) -> String {
    let subject = first_heading(&report.markdown_report)
        .unwrap_or_else(|| report.short_summary.trim().to_string());
    subject.chars().take(MAX_SUBJECT_CHARS).collect()
}

/// Sends the finished report
#[derive(Clone)]
pub struct DeliverStage {
    transport: Arc<dyn DeliveryTransport>,
}

impl DeliverStage {
    /// Create the stage around a delivery transport
    pub fn new(transport: Arc<dyn DeliveryTransport>) -> Self {
        Self { transport }
    }

    /// Send `report` exactly once and classify the result
    pub async fn deliver(&self, report: &Report) -> DeliveryOutcome {
        let subject = subject_for(report);
        let html_body = render_html(&report.markdown_report);

        tracing::debug!(
            subject_len = subject.len(),
            body_len = html_body.len(),
            "Sending research report"
        );

        let outcome = classify(self.transport.send(&subject, &html_body).await);
        match &outcome {
            DeliveryOutcome::Success => tracing::info!("Report accepted for delivery"),
            DeliveryOutcome::Failure { reason, .. } => {
                tracing::warn!(reason = %reason, "Report delivery failed")
            }
        }
        outcome
    }
}
