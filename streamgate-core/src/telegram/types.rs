//! Bot API wire types
//!
//! Only the fields Streamgate reads are modelled; serde ignores the rest.

use serde::Deserialize;

/// Envelope around every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub document: Option<MediaFile>,
    pub video: Option<MediaFile>,
    pub audio: Option<MediaFile>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
}

/// Document, video or audio attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaFile {
    pub file_id: String,
    pub file_unique_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

/// One resolution of a photo; messages carry several, smallest first.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct TgFile {
    pub file_id: String,
    pub file_unique_id: String,
    pub file_size: Option<u64>,
    /// Absent when the file is too large for Bot API downloads
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Document,
    Video,
    Audio,
    Photo,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Document => "document",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Photo => "photo",
        }
    }

    /// Extension used when the sender supplied no file name.
    fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Document => "bin",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Photo => "jpg",
        }
    }
}

/// The servable attachment of a message, whichever kind it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMedia {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

impl InboundMedia {
    /// Sender's file name, or `<kind>_<file_id>.<ext>` when there is none.
    pub fn file_name_or_default(&self) -> String {
        match &self.file_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!(
                "{}_{}.{}",
                self.kind.as_str(),
                self.file_id,
                self.kind.default_extension()
            ),
        }
    }
}

impl Message {
    /// The attachment to serve: document, then video, then audio, then the
    /// largest photo size.
    pub fn media(&self) -> Option<InboundMedia> {
        let attached = [
            (MediaKind::Document, &self.document),
            (MediaKind::Video, &self.video),
            (MediaKind::Audio, &self.audio),
        ];
        for (kind, file) in attached {
            if let Some(file) = file {
                return Some(InboundMedia {
                    kind,
                    file_id: file.file_id.clone(),
                    file_name: file.file_name.clone(),
                    file_size: file.file_size,
                });
            }
        }

        self.photo.last().map(|photo| InboundMedia {
            kind: MediaKind::Photo,
            file_id: photo.file_id.clone(),
            file_name: None,
            file_size: photo.file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_message(json: &str) -> Message {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_document_message() {
        let message = parse_message(
            r#"{
                "message_id": 7,
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "document": {
                    "file_id": "BQACAgIAAxkBAAIB",
                    "file_unique_id": "AgADxx",
                    "file_name": "report.pdf",
                    "mime_type": "application/pdf",
                    "file_size": 2048
                }
            }"#,
        );

        let media = message.media().unwrap();
        assert_eq!(media.kind, MediaKind::Document);
        assert_eq!(media.file_id, "BQACAgIAAxkBAAIB");
        assert_eq!(media.file_name_or_default(), "report.pdf");
        assert_eq!(media.file_size, Some(2048));
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let message = parse_message(
            r#"{
                "message_id": 8,
                "chat": {"id": 42},
                "photo": [
                    {"file_id": "small", "file_unique_id": "s", "width": 90, "height": 60, "file_size": 1000},
                    {"file_id": "large", "file_unique_id": "l", "width": 1280, "height": 853, "file_size": 90000}
                ]
            }"#,
        );

        let media = message.media().unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.file_id, "large");
        assert_eq!(media.file_name_or_default(), "photo_large.jpg");
    }

    #[test]
    fn test_text_message_has_no_media() {
        let message = parse_message(r#"{"message_id": 9, "chat": {"id": 42}, "text": "hello"}"#);
        assert!(message.media().is_none());
    }

    #[test]
    fn test_error_envelope() {
        let response: ApiResponse<TgFile> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: invalid file_id"}"#,
        )
        .unwrap();
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(400));
    }
}
