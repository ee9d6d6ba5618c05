use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;

use super::{truncate_body, Delivery, Notifier, NotifyError, Reminder};
use crate::config::{CredentialSource, SlackConfig, SLACK_WEB_HOOK_URL};
use crate::util::validate_endpoint;

const CHANNEL: &str = "slack";

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    username: &'a str,
    icon_emoji: &'a str,
    text: String,
}

/// Posts reminders to an incoming chat webhook.
///
/// Delivery here is best-effort: a non-2xx answer or an unreachable hook is
/// logged and reported as [`Delivery::Rejected`], never as an error.
pub struct SlackNotifier {
    client: reqwest::Client,
    config: SlackConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl SlackNotifier {
    pub fn new(
        client: reqwest::Client,
        config: SlackConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            client,
            config,
            credentials,
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, reminder: &Reminder) -> Result<Delivery, NotifyError> {
        let Some(hook) = self.credentials.get(SLACK_WEB_HOOK_URL) else {
            tracing::warn!("SLACK_WEB_HOOK_URL not set, skipping chat notification");
            return Ok(Delivery::Skipped);
        };
        let url = match validate_endpoint(hook.expose_secret()) {
            Ok(url) => url,
            Err(e) => {
                // The URL embeds a token; never log it
                tracing::warn!(error = %e, "Unusable SLACK_WEB_HOOK_URL, skipping chat notification");
                return Ok(Delivery::Skipped);
            }
        };

        let payload = WebhookPayload {
            channel: &self.config.channel,
            username: &self.config.username,
            icon_emoji: &self.config.icon_emoji,
            text: reminder.slack_text(),
        };

        let response = match self.client.post(url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e.without_url(), "Chat webhook unreachable");
                return Ok(Delivery::Rejected { status: None });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = truncate_body(response.text().await.unwrap_or_default());
            tracing::warn!(status = status.as_u16(), body = %body, "Chat webhook rejected the message");
            return Ok(Delivery::Rejected {
                status: Some(status.as_u16()),
            });
        }

        Ok(Delivery::Sent)
    }
}
