//! Notification delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;
use crate::models::TelegramConfig;
use crate::utils::http;

/// Notification delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or unusable destination settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The messaging platform rejected the request
    #[error("Platform error: {0}")]
    Platform(String),
}

/// Sends pre-formatted messages to an operator.
///
/// Implementations must report failure through the returned `Result` and
/// never panic.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> std::result::Result<(), NotifyError>;
}

/// Payload for the Telegram `sendMessage` method.
#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Notifier backed by the Telegram Bot API.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Ok(Self {
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: http::create_notify_client(config)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> std::result::Result<(), NotifyError> {
        if self.bot_token.is_empty() || self.chat_id.is_empty() {
            return Err(NotifyError::Config(
                "bot token and chat id must be set".to_string(),
            ));
        }

        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Platform(format!(
                "Telegram API returned {}: {}",
                status, body
            )));
        }

        log::info!("Telegram message sent.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["disable_web_page_preview"], true);
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            api_base: "https://api.telegram.org/".to_string(),
            ..TelegramConfig::default()
        };
        let notifier = TelegramNotifier::new(&config).unwrap();
        assert_eq!(
            notifier.endpoint(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_request() {
        let notifier = TelegramNotifier::new(&TelegramConfig::default()).unwrap();
        let result = notifier.send("hello").await;
        assert!(matches!(result, Err(NotifyError::Config(_))));
    }
}
