//! Long-polling loop that ingests files sent to the bot.
//!
//! Each media message is forwarded into the storage channel. The forwarded
//! copy's file id becomes the backend locator, the sender's file id becomes
//! the public [`FileId`], and the sender gets the view and download links.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::client::{BotApiClient, BotApiError};
use super::types::{InboundMedia, Message, Update};
use crate::ingest::{FileEvent, Ingestor};
use crate::metadata::{BackendLocator, FileId};
use crate::{GatewayError, Result};

/// Reply to messages that carry no servable attachment.
pub const NO_MEDIA_REPLY: &str = "Please send a file!";

const PROCESSING_REPLY: &str = "Processing your file...";
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Receives bot updates and ingests the files they carry.
pub struct UpdatePoller {
    client: BotApiClient,
    ingestor: Ingestor,
    storage_channel_id: i64,
    offset: Option<i64>,
}

impl UpdatePoller {
    pub fn new(client: BotApiClient, ingestor: Ingestor, storage_channel_id: i64) -> Self {
        Self {
            client,
            ingestor,
            storage_channel_id,
            offset: None,
        }
    }

    /// Polls until `shutdown` resolves.
    ///
    /// Poll failures are logged and retried after a short delay; a single
    /// bad update never stops the loop.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(channel = self.storage_channel_id, "Telegram update poller started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                polled = self.client.get_updates(self.offset) => match polled {
                    Ok(updates) => self.handle_updates(updates).await,
                    Err(e) => {
                        warn!(error = %e, "getUpdates failed, retrying in {:?}", RETRY_DELAY);
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(RETRY_DELAY) => {}
                        }
                    }
                },
            }
        }

        info!("Telegram update poller stopped");
    }

    /// Handles one batch of updates and advances the offset past them.
    pub async fn handle_updates(&mut self, updates: Vec<Update>) {
        for update in updates {
            self.offset = Some(update.update_id + 1);
            if let Some(message) = update.message {
                self.handle_message(&message).await;
            }
        }
    }

    async fn handle_message(&self, message: &Message) {
        let chat_id = message.chat.id;

        let Some(media) = message.media() else {
            if let Err(e) = self.client.send_message(chat_id, NO_MEDIA_REPLY).await {
                warn!(chat_id, error = %e, "Failed to reply to non-media message");
            }
            return;
        };

        let status = match self.client.send_message(chat_id, PROCESSING_REPLY).await {
            Ok(status) => Some(status.message_id),
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to send status message");
                None
            }
        };

        let reply = match self.store_media(message, &media).await {
            Ok(summary) => summary,
            Err(e) => {
                if e.is_user_error() {
                    info!(chat_id, file_id = %media.file_id, reason = %e, "Refused file");
                } else {
                    warn!(chat_id, file_id = %media.file_id, error = %e, "Failed to ingest file");
                }
                format!("Error: {}", e.user_message())
            }
        };

        let sent = match status {
            Some(status_id) => self
                .client
                .edit_message_text(chat_id, status_id, &reply)
                .await
                .map(|_| ()),
            None => self.client.send_message(chat_id, &reply).await.map(|_| ()),
        };
        if let Err(e) = sent {
            warn!(chat_id, error = %e, "Failed to deliver ingest reply");
        }
    }

    async fn store_media(&self, message: &Message, media: &InboundMedia) -> Result<String> {
        let limit_bytes = self.client.max_download_bytes();
        if let Some(size_bytes) = media.file_size {
            check_download_limit(size_bytes, limit_bytes)?;
        }

        let forwarded = self
            .client
            .forward_message(self.storage_channel_id, message.chat.id, message.message_id)
            .await?;
        debug!(
            file_id = %media.file_id,
            storage_message = forwarded.message_id,
            "Forwarded file to storage channel"
        );

        let mut event = file_event(media, forwarded.media().as_ref());
        if media.file_size.is_none() {
            let file = self.client.get_file(event.locator.as_str()).await?;
            event.size_bytes = file.file_size.ok_or_else(|| BotApiError::MissingResult {
                method: "getFile file_size".to_string(),
            })?;
            check_download_limit(event.size_bytes, limit_bytes)?;
        }

        let receipt = self.ingestor.ingest(event).await?;
        Ok(receipt.summary())
    }
}

/// Files the backend could never stream are refused before links go out.
fn check_download_limit(size_bytes: u64, limit_bytes: u64) -> Result<()> {
    if size_bytes > limit_bytes {
        return Err(GatewayError::FileTooLarge {
            size_bytes,
            limit_bytes,
        });
    }
    Ok(())
}

/// Builds the ingest event for `media`.
///
/// The locator is the storage copy's file id when the forwarded message
/// carries one, otherwise the sender's.
pub fn file_event(media: &InboundMedia, stored: Option<&InboundMedia>) -> FileEvent {
    let locator = stored.map_or(&media.file_id, |copy| &copy.file_id);
    FileEvent {
        id: FileId::new(media.file_id.clone()),
        file_name: media.file_name_or_default(),
        size_bytes: media.file_size.unwrap_or(0),
        locator: BackendLocator::new(locator.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::types::MediaKind;

    fn media(file_id: &str, name: Option<&str>, size: Option<u64>) -> InboundMedia {
        InboundMedia {
            kind: MediaKind::Video,
            file_id: file_id.to_string(),
            file_name: name.map(str::to_string),
            file_size: size,
        }
    }

    #[test]
    fn test_file_event_prefers_storage_copy() {
        let sent = media("user-copy", Some("clip.mp4"), Some(4096));
        let stored = media("channel-copy", Some("clip.mp4"), Some(4096));

        let event = file_event(&sent, Some(&stored));
        assert_eq!(event.id.as_str(), "user-copy");
        assert_eq!(event.locator.as_str(), "channel-copy");
        assert_eq!(event.file_name, "clip.mp4");
        assert_eq!(event.size_bytes, 4096);
    }

    #[test]
    fn test_download_limit_is_inclusive() {
        assert!(check_download_limit(20, 20).is_ok());
        assert!(matches!(
            check_download_limit(21, 20),
            Err(GatewayError::FileTooLarge {
                size_bytes: 21,
                limit_bytes: 20
            })
        ));
    }

    #[test]
    fn test_file_event_default_name() {
        let sent = media("AbC", None, Some(10));
        let event = file_event(&sent, None);
        assert_eq!(event.file_name, "video_AbC.mp4");
        assert_eq!(event.locator.as_str(), "AbC");
    }
}
