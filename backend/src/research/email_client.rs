//! SendGrid email client
//!
//! Direct HTTP client for the SendGrid v3 `mail/send` endpoint.

use crate::research::error::DeliveryError;
use crate::research::stages::deliver::{DeliveryTransport, TransportStatus};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Serialize, Debug)]
struct MailRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<MailContent<'a>>,
}

#[derive(Serialize, Debug)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize, Debug)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize, Debug)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    mime_type: &'a str,
    value: &'a str,
}

/// Delivers reports through SendGrid
#[derive(Debug, Clone)]
pub struct SendGridTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    from: String,
    to: String,
}

impl SendGridTransport {
    /// Create a transport sending from `from` to `to`
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

#[async_trait]
impl DeliveryTransport for SendGridTransport {
    async fn send(
        &self,
        subject: &str,
        html_body: &str,
    ) -> Result<TransportStatus, DeliveryError> {
        if self.api_key.is_empty() {
            return Err(DeliveryError::NotConfigured(
                "SENDGRID_API_KEY environment variable is not set".to_string(),
            ));
        }
        if self.from.is_empty() || self.to.is_empty() {
            return Err(DeliveryError::NotConfigured(
                "sender and recipient addresses must both be set".to_string(),
            ));
        }

        let body = MailRequest {
            personalizations: vec![Personalization {
                to: vec![Address { email: &self.to }],
            }],
            from: Address { email: &self.from },
            subject,
            content: vec![MailContent {
                mime_type: "text/html",
                value: html_body,
            }],
        };

        let url = format!("{}/v3/mail/send", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let code = response.status().as_u16();
        tracing::debug!(status_code = code, "Email response status");

        if response.status().is_success() {
            return Ok(TransportStatus::Accepted);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());

        match code {
            401 | 403 => Ok(TransportStatus::Forbidden { code, message }),
            _ => Ok(TransportStatus::Other { code, message }),
        }
    }
}
