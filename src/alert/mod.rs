//! Alert dispatch on service state transitions.
//!
//! The dispatcher classifies a (previous, new) status pair through the
//! [`ServiceState`] machine, applies a per-(service, status) cooldown and
//! hands the formatted message to a [`Notifier`]. Delivery problems are
//! logged and reported as `false`, never as errors to the caller.

mod cooldown;
mod notifier;
mod state;

pub use cooldown::*;
pub use notifier::*;
pub use state::*;

use crate::db::{Service, Status};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Minimum gap between two alerts for the same (service, status).
pub const ALERT_COOLDOWN_MINUTES: i64 = 5;

/// Alert delivery error types.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("alert channel not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("channel rejected message: {0}")]
    Rejected(String),
}

pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    cooldowns: Arc<dyn CooldownStore>,
    cooldown: ChronoDuration,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, cooldowns: Arc<dyn CooldownStore>) -> Self {
        Self {
            notifier,
            cooldowns,
            cooldown: ChronoDuration::minutes(ALERT_COOLDOWN_MINUTES),
        }
    }

    /// Send an alert for `service` moving from `previous` to `status`.
    ///
    /// Returns whether a notification was delivered.
    pub async fn notify(
        &self,
        service: Service,
        status: Status,
        message: Option<&str>,
        previous: Option<Status>,
    ) -> bool {
        self.notify_at(service, status, message, previous, Utc::now()).await
    }

    pub async fn notify_at(
        &self,
        service: Service,
        status: Status,
        message: Option<&str>,
        previous: Option<Status>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(kind) = ServiceState::from(previous).transition(status) else {
            return false;
        };

        if !self.cooldowns.try_reserve(service, status, now, self.cooldown).await {
            tracing::info!("Alert cooldown active for {}-{}", service, status);
            return false;
        }

        let text = format_alert(kind, service, message, now);

        let delivered = match self.notifier.send(&text).await {
            Ok(()) => {
                tracing::info!("Sent {:?} alert for {}", kind, service);
                true
            }
            Err(AlertError::NotConfigured) => {
                tracing::debug!("Skipping {:?} alert for {}: no channel", kind, service);
                false
            }
            Err(e) => {
                tracing::error!("Failed to send alert for {}: {}", service, e);
                false
            }
        };

        if !delivered {
            self.cooldowns.release(service, status, now).await;
        }
        delivered
    }
}

/// Render the HTML message sent to the alert channel.
pub fn format_alert(kind: AlertKind, service: Service, message: Option<&str>, at: DateTime<Utc>) -> String {
    let (emoji, title, detail_label) = match kind {
        AlertKind::Down => ("\u{274C}", "SERVICE DOWN", Some("Error")),
        AlertKind::Degraded => ("\u{26A0}\u{FE0F}", "SERVICE DEGRADED", Some("Issue")),
        AlertKind::Recovered => ("\u{2705}", "SERVICE RECOVERED", None),
    };

    let mut text = format!(
        "{} <b>{}</b>\n\n<b>Service:</b> {}\n<b>Status:</b> {}\n",
        emoji,
        title,
        service.display_name(),
        kind.status().as_str().to_uppercase()
    );

    if let (Some(label), Some(msg)) = (detail_label, message) {
        text.push_str(&format!("<b>{}:</b> {}\n", label, escape_html(msg)));
    }

    text.push_str(&format!("<b>Time:</b> {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    text
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
