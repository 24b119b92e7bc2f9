//! Deterministic archive filenames

/// Longest sanitized title kept in a filename, in characters
pub const MAX_TITLE_CHARS: usize = 80;

/// Longest sanitized title kept in a filename, in UTF-8 bytes
///
/// Leaves room within [`MAX_FILENAME_BYTES`] for the date prefix, the
/// extension and a `_{doc_id}` collision suffix.
pub const MAX_TITLE_BYTES: usize = 180;

/// NAME_MAX of ext4, APFS and NTFS
pub const MAX_FILENAME_BYTES: usize = 255;

const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Makes a title safe to use as a filename on every common filesystem
///
/// Removes path separators, reserved punctuation and control characters,
/// collapses whitespace, trims leading and trailing dots and spaces, and
/// truncates to [`MAX_TITLE_CHARS`] and [`MAX_TITLE_BYTES`], whichever is
/// shorter. An empty result becomes `untitled`.
pub fn sanitize_title(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');
    let truncated: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    let truncated = truncate_bytes(&truncated, MAX_TITLE_BYTES)
        .trim_end_matches(|c: char| c == '.' || c == ' ');

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

/// `{publish_date|unknown}_{sanitized-title}.{ext}`
pub fn archive_filename(publish_date: Option<&str>, title: &str, ext: &str) -> String {
    format!(
        "{}_{}.{}",
        publish_date.unwrap_or("unknown"),
        sanitize_title(title),
        ext
    )
}

/// Inserts `_{doc_id}` before the extension of `filename`
///
/// The stem is shortened when needed so the result stays within
/// [`MAX_FILENAME_BYTES`].
pub fn disambiguate(filename: &str, doc_id: &str) -> String {
    let (stem, ext) = match filename.rfind('.') {
        Some(idx) => filename.split_at(idx),
        None => (filename, ""),
    };
    let suffix = format!("_{}", doc_id);
    let suffix = truncate_bytes(&suffix, MAX_FILENAME_BYTES.saturating_sub(ext.len() + 1));
    let stem_budget = MAX_FILENAME_BYTES.saturating_sub(suffix.len() + ext.len());
    format!("{}{}{}", truncate_bytes(stem, stem_budget), suffix, ext)
}

/// Longest prefix of `s` of at most `max` bytes that ends on a char boundary
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
