//! Minimal Telegram Bot API client over reqwest.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use super::types::{ApiResponse, Message, TgFile, Update};
use crate::config::TelegramConfig;

/// Errors from Bot API calls.
#[derive(Debug, thiserror::Error)]
pub enum BotApiError {
    #[error("Bot API transport error: {0}")]
    Transport(reqwest::Error),

    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Bot API returned no result for {method}")]
    MissingResult { method: String },

    #[error("Invalid Bot API configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<reqwest::Error> for BotApiError {
    fn from(error: reqwest::Error) -> Self {
        // Request URLs embed the bot token.
        Self::Transport(error.without_url())
    }
}

impl BotApiError {
    /// Whether the error means the requested file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            BotApiError::Api { code: 404, .. } => true,
            BotApiError::Api {
                code: 400,
                description,
            } => {
                let description = description.to_lowercase();
                description.contains("file not found")
                    || description.contains("invalid file_id")
                    || description.contains("wrong file_id")
            }
            _ => false,
        }
    }

    /// Whether the Bot API refused a file for exceeding its download cap.
    pub fn is_too_big(&self) -> bool {
        matches!(
            self,
            BotApiError::Api { code: 400, description }
                if description.to_lowercase().contains("file is too big")
        )
    }
}

/// Bot API client bound to one bot token.
#[derive(Clone)]
pub struct BotApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    request_timeout: Duration,
    poll_timeout: Duration,
    max_download_bytes: u64,
}

impl std::fmt::Debug for BotApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApiClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl BotApiClient {
    /// Creates a client from Telegram configuration.
    ///
    /// # Errors
    /// - `BotApiError::InvalidConfig` - Missing token or unparseable API base URL
    pub fn new(config: &TelegramConfig) -> Result<Self, BotApiError> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| BotApiError::InvalidConfig {
                reason: "bot token is not set".to_string(),
            })?;

        let api_base = Url::parse(&config.api_base_url)
            .map_err(|e| BotApiError::InvalidConfig {
                reason: format!("invalid API base URL '{}': {e}", config.api_base_url),
            })?
            .to_string();

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            request_timeout: config.request_timeout,
            poll_timeout: config.poll_timeout,
            max_download_bytes: config.max_download_bytes,
        })
    }

    /// Largest file this client's Bot API server will hand out.
    pub fn max_download_bytes(&self) -> u64 {
        self.max_download_bytes
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    fn download_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token)
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R, BotApiError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?;

        let status = response.status();
        let envelope: ApiResponse<R> = response.json().await?;

        if !envelope.ok {
            return Err(BotApiError::Api {
                code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        envelope.result.ok_or_else(|| BotApiError::MissingResult {
            method: method.to_string(),
        })
    }

    /// Resolves a file id to its download path and size.
    pub async fn get_file(&self, file_id: &str) -> Result<TgFile, BotApiError> {
        self.call("getFile", &json!({ "file_id": file_id }), self.request_timeout)
            .await
    }

    /// Starts downloading a file previously resolved with [`get_file`].
    ///
    /// Only the response headers are awaited; the body is left for the caller
    /// to stream. No overall timeout applies.
    ///
    /// [`get_file`]: BotApiClient::get_file
    pub async fn download(&self, file_path: &str) -> Result<reqwest::Response, BotApiError> {
        let response = self.http.get(self.download_url(file_path)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotApiError::Api {
                code: i64::from(status.as_u16()),
                description: status
                    .canonical_reason()
                    .unwrap_or("download failed")
                    .to_string(),
            });
        }

        Ok(response)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, BotApiError> {
        let params = json!({
            "offset": offset,
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        self.call(
            "getUpdates",
            &params,
            self.poll_timeout + self.request_timeout,
        )
        .await
    }

    /// Forwards a message, returning the copy in the destination chat.
    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<Message, BotApiError> {
        let params = json!({
            "chat_id": chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        self.call("forwardMessage", &params, self.request_timeout)
            .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, BotApiError> {
        let params = json!({ "chat_id": chat_id, "text": text });
        self.call("sendMessage", &params, self.request_timeout)
            .await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<Message, BotApiError> {
        let params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        self.call("editMessageText", &params, self.request_timeout)
            .await
    }
}
