//! HTML pages for `/api/view`

use streamgate_core::FileRecord;

const VIDEO_PLAYER_TEMPLATE: &str = include_str!("../templates/video_player.html");
const AUDIO_PLAYER_TEMPLATE: &str = include_str!("../templates/audio_player.html");
const DOWNLOAD_PAGE_TEMPLATE: &str = include_str!("../templates/download_page.html");

/// Page layout chosen from the file's media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Video,
    Audio,
    Download,
}

impl ViewKind {
    pub fn for_record(record: &FileRecord) -> Self {
        match record.mime_type().type_().as_str() {
            "video" => ViewKind::Video,
            "audio" => ViewKind::Audio,
            _ => ViewKind::Download,
        }
    }

    fn template(self) -> &'static str {
        match self {
            ViewKind::Video => VIDEO_PLAYER_TEMPLATE,
            ViewKind::Audio => AUDIO_PLAYER_TEMPLATE,
            ViewKind::Download => DOWNLOAD_PAGE_TEMPLATE,
        }
    }
}

/// Renders the viewer page for `record`.
///
/// Links are relative so the page works behind any public host name.
/// Display names are already restricted to HTML-safe characters.
pub fn view_page(record: &FileRecord) -> String {
    let encoded_id = urlencoding::encode(record.id().as_str());
    let stream_url = format!("/api/stream/{encoded_id}");
    let download_url = format!("/api/download/{encoded_id}");

    ViewKind::for_record(record)
        .template()
        .replace("{{ file_name }}", record.display_name())
        .replace("{{ stream_url }}", &stream_url)
        .replace("{{ download_url }}", &download_url)
        .replace("{{ mime_type }}", record.mime_type().as_ref())
        .replace("{{ size }}", &human_size(record.size_bytes()))
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use streamgate_core::BackendLocator;

    use super::*;

    fn record(id: &str, name: &str) -> FileRecord {
        FileRecord::new(id, name, 5 * 1024 * 1024, BackendLocator::from("loc"))
    }

    #[test]
    fn test_view_kind_by_extension() {
        assert_eq!(ViewKind::for_record(&record("a", "movie.mp4")), ViewKind::Video);
        assert_eq!(ViewKind::for_record(&record("a", "song.mp3")), ViewKind::Audio);
        assert_eq!(ViewKind::for_record(&record("a", "notes.pdf")), ViewKind::Download);
        assert_eq!(ViewKind::for_record(&record("a", "noext")), ViewKind::Download);
    }

    #[test]
    fn test_video_page() {
        let html = view_page(&record("id 1", "movie.mp4"));
        assert!(html.contains("<video"));
        assert!(html.contains(r#"src="/api/stream/id%201""#));
        assert!(html.contains(r#"href="/api/download/id%201""#));
        assert!(html.contains(r#"type="video/mp4""#));
        assert!(html.contains("5.00 MB"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_download_page() {
        let html = view_page(&record("x", "archive.zip"));
        assert!(!html.contains("<video"));
        assert!(!html.contains("<audio"));
        assert!(html.contains("stream anyway"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
