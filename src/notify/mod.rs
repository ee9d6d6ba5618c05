//! Reminder delivery.
//!
//! Two independent channels, a mail relay and a chat webhook, both behind
//! [`Notifier`]. [`Dispatcher::dispatch`] attempts every channel even when
//! an earlier one fails, and reports the first hard error afterwards.
//!
//! Failure policy lives in the notifiers:
//! - unconfigured channel → `Delivery::Skipped`, logged as a warning
//! - webhook rejection or transport error → `Delivery::Rejected`, logged
//! - mail relay failure → `Err(NotifyError)`

mod email;
mod message;
mod slack;

use async_trait::async_trait;
use thiserror::Error;

pub use email::MailRelayNotifier;
pub use message::{Reminder, ReminderItem};
pub use slack::SlackNotifier;

/// Longest response body kept for logs and error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{channel} request failed: {source}")]
    Network {
        channel: &'static str,
        source: reqwest::Error,
    },
    #[error("{channel} rejected the message: status {status}: {body}")]
    HttpStatus {
        channel: &'static str,
        status: u16,
        body: String,
    },
}

/// Outcome of one delivery attempt that did not raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Destination not configured.
    Skipped,
    /// Destination answered with a non-success status (or was unreachable);
    /// already logged.
    Rejected { status: Option<u16> },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable channel name for logs (`email`, `slack`).
    fn channel(&self) -> &'static str;

    async fn send(&self, reminder: &Reminder) -> Result<Delivery, NotifyError>;
}

/// Per-channel outcomes of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub deliveries: Vec<(&'static str, Delivery)>,
}

impl DispatchReport {
    pub fn delivery(&self, channel: &str) -> Option<&Delivery> {
        self.deliveries
            .iter()
            .find(|(name, _)| *name == channel)
            .map(|(_, d)| d)
    }
}

/// Sends a reminder through every registered channel.
pub struct Dispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Attempt every channel in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first channel error, but only after all channels have
    /// been attempted.
    pub async fn dispatch(&self, reminder: &Reminder) -> Result<DispatchReport, NotifyError> {
        let mut report = DispatchReport::default();
        let mut first_error = None;

        for notifier in &self.notifiers {
            match notifier.send(reminder).await {
                Ok(delivery) => {
                    tracing::info!(
                        channel = notifier.channel(),
                        outcome = ?delivery,
                        episodes = reminder.items.len(),
                        "Reminder delivery finished"
                    );
                    report.deliveries.push((notifier.channel(), delivery));
                }
                Err(e) => {
                    tracing::error!(channel = notifier.channel(), error = %e, "Reminder delivery failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

/// Cut an error response body down to [`MAX_ERROR_BODY`] bytes on a char
/// boundary.
fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
