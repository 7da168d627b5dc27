//! Text processing and message formatting helpers.
//!
//! Replies are sent with Telegram's `MarkdownV2` parse mode, so every
//! reserved character of that dialect is escaped before a reply leaves the
//! bot. Patterns are compiled lazily through `lazy_regex!`, which also
//! validates them at compile time.

// lazy_regex! relies on once_cell statics internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::time::Duration;

/// Characters with syntactic meaning in `MarkdownV2`
static RE_MARKDOWN_V2_RESERVED: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"([_*\[\]()~`>#+\-=|{}.!\\])");

/// Characters not allowed in generated file names
static RE_UNSAFE_FILENAME: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"[^\w\-_.]");

/// Reply used when the model produced nothing
pub const NO_RESPONSE_FALLBACK: &str = "No response generated.";

/// Appended after a truncated reply. Contains no reserved characters.
pub const TRUNCATION_MARKER: &str = "\n\n… truncated";

const ESCAPE_MARKER: char = '\\';
const FILENAME_MAX_LEN: usize = 255;

/// Escapes every `MarkdownV2` reserved character with a backslash.
///
/// # Examples
///
/// ```
/// use gemini_relay::utils::escape_markdown_v2;
/// assert_eq!(escape_markdown_v2("1+1=2."), r"1\+1\=2\.");
/// ```
#[must_use]
pub fn escape_markdown_v2(text: &str) -> String {
    RE_MARKDOWN_V2_RESERVED
        .replace_all(text, r"\$1")
        .into_owned()
}

/// Escapes and, when needed, truncates text so it fits in one message.
///
/// Escaping happens first, so lengths are measured on the escaped text.
/// When the escaped text is longer than `max_length` characters the cut is
/// placed after the last `.` or newline inside the first
/// `max_length - 100` characters, provided that point lies past 70% of
/// `max_length`. Otherwise the text is hard-cut at `max_length - 15`.
/// [`TRUNCATION_MARKER`] is appended in both cases and the result never
/// exceeds `max_length` characters.
///
/// # Examples
///
/// ```
/// use gemini_relay::utils::format_message;
/// assert_eq!(format_message("", 4096), "No response generated.");
/// assert_eq!(format_message("Hi!", 4096), r"Hi\!");
/// ```
#[must_use]
pub fn format_message(text: &str, max_length: usize) -> String {
    if text.is_empty() {
        return NO_RESPONSE_FALLBACK.to_string();
    }

    let escaped = escape_markdown_v2(text);
    let chars: Vec<char> = escaped.chars().collect();
    if chars.len() <= max_length {
        return escaped;
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_length < marker_len {
        return chars[..pair_safe_cut(&chars, max_length)].iter().collect();
    }

    let window_end = max_length.saturating_sub(100).min(chars.len());
    let boundary = chars[..window_end]
        .iter()
        .rposition(|&c| c == '.' || c == '\n');

    // Same as `idx > 0.7 * max_length` without floating point
    let cut = match boundary {
        Some(idx) if idx * 10 > max_length * 7 => idx + 1,
        _ => pair_safe_cut(&chars, max_length.saturating_sub(15)),
    };

    let mut result: String = chars[..cut].iter().collect();
    result.push_str(TRUNCATION_MARKER);
    result
}

/// Moves `cut` back by one if it would separate an escape marker from the
/// character it escapes.
///
/// In escaped text every run of backslashes starts on a token boundary and
/// consists of `\\` pairs, optionally followed by one marker for the next
/// character. An odd run length before the cut means a dangling marker.
fn pair_safe_cut(chars: &[char], cut: usize) -> usize {
    let cut = cut.min(chars.len());
    let trailing = chars[..cut]
        .iter()
        .rev()
        .take_while(|&&c| c == ESCAPE_MARKER)
        .count();
    if trailing % 2 == 1 {
        cut - 1
    } else {
        cut
    }
}

/// Truncates `text` to `max_length` characters, ending with `suffix`.
///
/// # Examples
///
/// ```
/// use gemini_relay::utils::truncate_text;
/// assert_eq!(truncate_text("Hello, world", 8, "..."), "Hello...");
/// assert_eq!(truncate_text("short", 8, "..."), "short");
/// ```
#[must_use]
pub fn truncate_text(text: &str, max_length: usize, suffix: &str) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let keep = max_length.saturating_sub(suffix.chars().count());
    let mut result: String = text.chars().take(keep).collect();
    result.push_str(suffix);
    result
}

/// Compact uptime such as `1d 2h 3m`, omitting zero parts (`0m` when empty).
#[must_use]
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (minutes, "m")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();

    if parts.is_empty() {
        "0m".to_string()
    } else {
        parts.join(" ")
    }
}

/// Fixed-width uptime `{d}d {h}h {m}m` used by status reports.
#[must_use]
pub fn format_duration_dhm(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}d {}h {}m",
        secs / 86_400,
        (secs % 86_400) / 3600,
        (secs % 3600) / 60
    )
}

/// Converts bytes to megabytes rounded to two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size_mb(size_bytes: u64) -> f64 {
    let mb = size_bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

/// Text progress bar such as `██████░░░░ 60%`.
#[must_use]
pub fn progress_bar(current: u64, total: u64, width: usize) -> String {
    if total == 0 {
        return "█".repeat(width);
    }

    let current = current.min(total);
    let width_u64 = u64::try_from(width).unwrap_or(u64::MAX);
    let filled = usize::try_from(width_u64.saturating_mul(current) / total).unwrap_or(width);
    let percentage = 100 * current / total;

    format!(
        "{}{} {percentage}%",
        "█".repeat(filled),
        "░".repeat(width.saturating_sub(filled))
    )
}

/// Replaces characters that are unsafe in file names and caps the length,
/// keeping the extension.
///
/// # Examples
///
/// ```
/// use gemini_relay::utils::sanitize_filename;
/// assert_eq!(sanitize_filename("a cat/dog?.jpg"), "a_cat_dog_.jpg");
/// ```
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized = RE_UNSAFE_FILENAME.replace_all(filename, "_").into_owned();
    if sanitized.chars().count() <= FILENAME_MAX_LEN {
        return sanitized;
    }

    let (name, ext) = sanitized
        .rsplit_once('.')
        .map_or((sanitized.as_str(), ""), |(n, e)| (n, e));
    let mut result: String = name.chars().take(FILENAME_MAX_LEN - 5).collect();
    if !ext.is_empty() {
        result.push('.');
        result.push_str(ext);
    }
    result
}

/// Case-insensitive MIME type check against an allow-list.
#[must_use]
pub fn validate_image_type(mime_type: &str, allowed_types: &[&str]) -> bool {
    allowed_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
}
