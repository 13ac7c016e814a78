//! Storage backend reading objects out of the Telegram storage channel.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use super::client::{BotApiClient, BotApiError};
use crate::backend::{FetchError, ObjectBody, StorageBackend};
use crate::metadata::BackendLocator;

/// Backend whose locators are Bot API file ids.
#[derive(Debug, Clone)]
pub struct TelegramBackend {
    client: BotApiClient,
}

impl TelegramBackend {
    pub fn new(client: BotApiClient) -> Self {
        Self { client }
    }
}

fn classify(error: BotApiError, locator: &BackendLocator) -> FetchError {
    if error.is_too_big() {
        warn!(%locator, "Bot API refused download: file exceeds its size limit");
        FetchError::ObjectTooLarge {
            locator: locator.clone(),
        }
    } else if error.is_not_found() {
        FetchError::ObjectNotFound {
            locator: locator.clone(),
        }
    } else {
        FetchError::BackendUnavailable {
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for TelegramBackend {
    async fn open_object(&self, locator: &BackendLocator) -> Result<ObjectBody, FetchError> {
        let file = self
            .client
            .get_file(locator.as_str())
            .await
            .map_err(|e| classify(e, locator))?;

        // getFile omits the path for files it will not serve
        let Some(file_path) = file.file_path else {
            warn!(%locator, size = ?file.file_size, "Bot API returned no download path");
            return Err(FetchError::ObjectTooLarge {
                locator: locator.clone(),
            });
        };

        let response = self
            .client
            .download(&file_path)
            .await
            .map_err(|e| classify(e, locator))?;

        let declared_len = response.content_length().or(file.file_size);
        debug!(%locator, ?declared_len, "Opened Telegram download");

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| FetchError::FetchInterrupted {
                    reason: e.without_url().to_string(),
                })
            })
            .boxed();

        Ok(ObjectBody::new(declared_len, stream))
    }

    fn backend_type(&self) -> &'static str {
        "telegram"
    }
}
