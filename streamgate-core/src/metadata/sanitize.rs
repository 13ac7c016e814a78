//! Display name sanitization

/// Name used when sanitization leaves nothing behind.
const FALLBACK_NAME: &str = "file";

/// Reduces a user-supplied file name to a header- and HTML-safe display name.
///
/// ASCII alphanumerics, space, `.`, `_` and `-` are kept; every other
/// character becomes `_`. Surrounding whitespace is trimmed. The result is
/// used verbatim in `Content-Disposition` and the player page, so only ASCII
/// is kept even though non-ASCII letters are alphanumeric.
pub fn sanitize_display_name(file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_safe_characters() {
        assert_eq!(
            sanitize_display_name("holiday_video-2024 final.mkv"),
            "holiday_video-2024 final.mkv"
        );
    }

    #[test]
    fn test_replaces_unsafe_characters() {
        assert_eq!(sanitize_display_name("a\"b<c>.txt"), "a_b_c_.txt");
        assert_eq!(sanitize_display_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_display_name("café.mp3"), "caf_.mp3");
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(sanitize_display_name("  spaced.pdf  "), "spaced.pdf");
    }

    #[test]
    fn test_empty_name_falls_back() {
        assert_eq!(sanitize_display_name(""), "file");
        assert_eq!(sanitize_display_name("   "), "file");
    }
}
