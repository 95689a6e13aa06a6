//! Bare-filename derivation for downloads reissued to the browser.
//!
//! The browser's download API rejects anything that looks like a path, so
//! every name handed back is reduced to a single safe segment.

use std::path::{Component, Path};

use url::Url;

/// Picks the filename for a reissued download.
///
/// Prefers the name the browser already reported for the cancelled item and
/// falls back to the last path segment of `url`. Returns `None` when neither
/// yields a usable name; the browser then picks one itself.
#[must_use]
pub fn reissue_filename(reported: Option<&str>, url: &str) -> Option<String> {
    reported
        .map(basename)
        .and_then(sanitize_filename)
        .or_else(|| filename_from_url(url))
}

/// Last path segment of `url`, percent-decoded and sanitized.
///
/// Unparseable URLs and URLs without a path segment give `None`.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    sanitize_filename(basename(&decoded))
}

/// Strips any directory part, for both separator styles.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Windows device names, refused as a file stem whatever the extension.
const RESERVED_STEMS: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Replaces characters browsers refuse in filenames.
///
/// Returns `None` for names that are empty or consist only of dots and
/// separators once cleaned. Device names such as `CON` or `nul.txt` get a
/// leading underscore.
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '_') {
        return None;
    }
    if !is_safe_filename_segment(sanitized) {
        return None;
    }
    if is_reserved_name(sanitized) {
        return Some(format!("_{sanitized}"));
    }
    Some(sanitized.to_string())
}

fn is_reserved_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    RESERVED_STEMS
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}

fn is_safe_filename_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
