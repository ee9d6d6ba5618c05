use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use super::{truncate_body, Delivery, Notifier, NotifyError, Reminder};
use crate::config::{CredentialSource, EmailConfig, MAIL_API_TOKEN, RECIPIENT_EMAIL};
use crate::util::{validate_endpoint, UrlValidationError};

const CHANNEL: &str = "email";

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    to: &'a str,
    subject: &'a str,
    text: String,
    html: String,
}

/// Sends reminders through an HTTP mail relay.
///
/// The relay takes `{to, subject, text, html}` as JSON. `MAIL_API_TOKEN`,
/// when present, is sent as a bearer token. Without a relay endpoint or a
/// `RECIPIENT_EMAIL` the channel is skipped.
pub struct MailRelayNotifier {
    client: reqwest::Client,
    endpoint: Option<Url>,
    subject: String,
    credentials: Arc<dyn CredentialSource>,
}

impl MailRelayNotifier {
    pub fn new(
        client: reqwest::Client,
        config: &EmailConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, UrlValidationError> {
        let endpoint = config
            .api_url
            .as_deref()
            .map(validate_endpoint)
            .transpose()?;
        Ok(Self {
            client,
            endpoint,
            subject: config.subject.clone(),
            credentials,
        })
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, reminder: &Reminder) -> Result<Delivery, NotifyError> {
        let Some(endpoint) = &self.endpoint else {
            tracing::warn!("No mail relay configured, skipping email");
            return Ok(Delivery::Skipped);
        };
        let Some(recipient) = self.credentials.get(RECIPIENT_EMAIL) else {
            tracing::warn!("RECIPIENT_EMAIL not set, skipping email");
            return Ok(Delivery::Skipped);
        };

        let body = MailRequest {
            to: recipient.expose_secret(),
            subject: &self.subject,
            text: reminder.plain_text(),
            html: reminder.html(),
        };

        let mut request = self.client.post(endpoint.clone()).json(&body);
        if let Some(token) = self.credentials.get(MAIL_API_TOKEN) {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|source| NotifyError::Network {
            channel: CHANNEL,
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = truncate_body(response.text().await.unwrap_or_default());
            return Err(NotifyError::HttpStatus {
                channel: CHANNEL,
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(episodes = reminder.items.len(), "Email accepted by relay");
        Ok(Delivery::Sent)
    }
}
