//! Outbound alert channels.

use super::AlertError;
use crate::config::ServerConfig;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Sends a formatted text message to a preconfigured destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), AlertError>;
}

/// Stand-in used when no channel credentials are configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _text: &str) -> Result<(), AlertError> {
        Err(AlertError::NotConfigured)
    }
}

/// Telegram Bot API `sendMessage` delivery.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), AlertError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response: TelegramResponse = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(10))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(AlertError::Rejected(
                response.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(())
    }
}

/// Pick the channel the configuration allows.
pub fn notifier_from_config(cfg: &ServerConfig, client: Client) -> Arc<dyn Notifier> {
    match (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
        (Some(token), Some(chat_id)) => Arc::new(TelegramNotifier::new(
            client,
            &cfg.telegram_api_base,
            token,
            chat_id,
        )),
        _ => {
            tracing::warn!("Alerting disabled: TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set");
            Arc::new(DisabledNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_telegram_send_ok() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "parse_mode": "HTML",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{}}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(Client::new(), &server.url(), "TOKEN", "42");
        tokio_test::assert_ok!(notifier.send("hello").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_telegram_rejection_is_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(Client::new(), &server.url(), "TOKEN", "42");
        match notifier.send("hello").await {
            Err(AlertError::Rejected(desc)) => assert!(desc.contains("chat not found")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_disable_alerting() {
        let notifier = notifier_from_config(&ServerConfig::default(), Client::new());
        assert!(matches!(notifier.send("x").await, Err(AlertError::NotConfigured)));
    }
}
