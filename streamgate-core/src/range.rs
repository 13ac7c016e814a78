//! HTTP Range request resolution
//!
//! Resolves a raw `Range` header against a known object size into a concrete
//! inclusive byte window. Only the single-range `bytes=<start>-[<end>]` form
//! is understood; everything else is reported as malformed and left to the
//! caller's policy.

use std::fmt;

/// Inclusive byte window `start..=end` within an object.
///
/// Always non-empty: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    start: u64,
    end: u64,
}

impl ByteWindow {
    /// Creates a window, returning `None` if `start > end`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Window covering a whole object, `None` for an empty object.
    pub fn full(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered, `end - start + 1`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for a `Content-Range` header of a 206 response.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

impl fmt::Display for ByteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Outcome of resolving a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// No range requested (or empty object): serve everything with 200
    Full,
    /// Valid single range: serve the window with 206
    Partial(ByteWindow),
    /// Header present but not a single `bytes=a-[b]` range
    Malformed,
    /// Range starts at or beyond the end of the object: 416
    Unsatisfiable,
}

/// Resolves a `Range` header value against an object of `size` bytes.
///
/// The requested end is clamped to the last byte of the object. Empty
/// objects always resolve to [`RangeResolution::Full`], whatever the header.
///
/// # Examples
/// ```
/// use streamgate_core::range::{ByteWindow, RangeResolution, resolve_range};
///
/// let resolution = resolve_range(Some("bytes=100-199"), 1000);
/// assert_eq!(resolution, RangeResolution::Partial(ByteWindow::new(100, 199).unwrap()));
///
/// assert_eq!(resolve_range(None, 1000), RangeResolution::Full);
/// assert_eq!(resolve_range(Some("bytes=1000-"), 1000), RangeResolution::Unsatisfiable);
/// ```
pub fn resolve_range(header: Option<&str>, size: u64) -> RangeResolution {
    let Some(header) = header else {
        return RangeResolution::Full;
    };
    if size == 0 {
        return RangeResolution::Full;
    }
    let Some((start, end)) = parse_single_range(header) else {
        return RangeResolution::Malformed;
    };

    if start >= size {
        return RangeResolution::Unsatisfiable;
    }

    let last_byte = size - 1;
    let end = end.map_or(last_byte, |end| end.min(last_byte));

    match ByteWindow::new(start, end) {
        Some(window) => RangeResolution::Partial(window),
        None => RangeResolution::Malformed,
    }
}

/// Parses `bytes=<start>-[<end>]` into `(start, Option<end>)`.
fn parse_single_range(header: &str) -> Option<(u64, Option<u64>)> {
    let ranges = header.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;

    let start = parse_offset(start)?;
    let end = if end.is_empty() {
        None
    } else {
        Some(parse_offset(end)?)
    };

    Some((start, end))
}

/// Parses a non-empty run of ASCII digits. Rejects signs, spaces and commas.
fn parse_offset(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn window(start: u64, end: u64) -> RangeResolution {
        RangeResolution::Partial(ByteWindow::new(start, end).unwrap())
    }

    #[test]
    fn test_absent_header_is_full() {
        assert_eq!(resolve_range(None, 1000), RangeResolution::Full);
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(resolve_range(Some("bytes=100-199"), 1000), window(100, 199));
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(resolve_range(Some("bytes=500-"), 1000), window(500, 999));
        assert_eq!(resolve_range(Some("bytes=0-"), 1000), window(0, 999));
    }

    #[test]
    fn test_end_clamped_to_object() {
        assert_eq!(resolve_range(Some("bytes=100-99999"), 500), window(100, 499));
    }

    #[test]
    fn test_single_byte_ranges() {
        assert_eq!(resolve_range(Some("bytes=0-0"), 1), window(0, 0));
        assert_eq!(resolve_range(Some("bytes=999-999"), 1000), window(999, 999));
    }

    #[test]
    fn test_start_at_or_past_end_is_unsatisfiable() {
        assert_eq!(
            resolve_range(Some("bytes=1000-"), 1000),
            RangeResolution::Unsatisfiable
        );
        assert_eq!(
            resolve_range(Some("bytes=1500-2000"), 1000),
            RangeResolution::Unsatisfiable
        );
    }

    #[test]
    fn test_malformed_headers() {
        for header in [
            "invalid",
            "bytes=",
            "bytes=-500",
            "bytes=abc-def",
            "bytes=10",
            "bytes=+1-5",
            "bytes= 1-5",
            "items=0-10",
            "bytes=0-10,20-30",
            "bytes=200-100",
            "bytes=99999999999999999999999-",
        ] {
            assert_eq!(
                resolve_range(Some(header), 1000),
                RangeResolution::Malformed,
                "header {header:?}"
            );
        }
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        assert_eq!(resolve_range(Some("  bytes=5-9 "), 100), window(5, 9));
    }

    #[test]
    fn test_empty_object_always_full() {
        assert_eq!(resolve_range(None, 0), RangeResolution::Full);
        assert_eq!(resolve_range(Some("bytes=0-"), 0), RangeResolution::Full);
        assert_eq!(resolve_range(Some("garbage"), 0), RangeResolution::Full);
    }

    #[test]
    fn test_window_helpers() {
        let w = ByteWindow::new(10, 19).unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w.content_range(100), "bytes 10-19/100");
        assert_eq!(w.to_string(), "10-19");
        assert!(ByteWindow::new(5, 4).is_none());

        assert_eq!(ByteWindow::full(0), None);
        assert_eq!(ByteWindow::full(8), ByteWindow::new(0, 7));
    }

    proptest! {
        #[test]
        fn prop_partial_windows_stay_in_bounds(
            size in 1u64..1_000_000,
            start in 0u64..1_200_000,
            end in proptest::option::of(0u64..1_200_000),
        ) {
            let header = match end {
                Some(end) => format!("bytes={start}-{end}"),
                None => format!("bytes={start}-"),
            };
            match resolve_range(Some(&header), size) {
                RangeResolution::Partial(w) => {
                    prop_assert!(w.start() <= w.end());
                    prop_assert!(w.end() < size);
                    prop_assert_eq!(w.start(), start);
                    prop_assert_eq!(w.len(), w.end() - w.start() + 1);
                }
                RangeResolution::Unsatisfiable => prop_assert!(start >= size),
                RangeResolution::Malformed => {
                    prop_assert!(matches!(end, Some(e) if e < start));
                }
                RangeResolution::Full => prop_assert!(false, "range header never yields Full"),
            }
        }
    }
}
