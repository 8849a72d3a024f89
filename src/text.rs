//! Small text helpers shared by adapters and the orchestrator.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\x{4e00}-\x{9fa5}_-]+").expect("slug regex"));
static RE_FILE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("file id regex"));
static RE_DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("date regex"));

/// Collapse whitespace runs into one space and trim.
pub fn collapse_ws(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

/// Lowercase, replace runs of unsupported chars with `-`, trim dashes, cap at 80 chars.
pub fn slugify(s: &str) -> String {
    let lower = s.to_lowercase();
    let dashed = RE_SLUG.replace_all(&lower, "-");
    dashed.trim_matches('-').chars().take(80).collect()
}

/// Icon id as a single file-name segment: runs outside `[A-Za-z0-9_-]`
/// become `-`, edge dashes are trimmed. May return "".
pub fn file_id(s: &str) -> String {
    RE_FILE_ID
        .replace_all(s.trim(), "-")
        .trim_matches('-')
        .to_string()
}

/// Strip surrounding straight/curly quotes from a title.
pub fn clean_title(s: &str) -> String {
    const QUOTES: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];
    collapse_ws(s)
        .trim_start_matches(QUOTES)
        .trim_end_matches(QUOTES)
        .trim()
        .to_string()
}

/// Format a timestamp as `YYYY-MM-DD`; unparseable input is returned trimmed.
pub fn format_date(s: &str) -> String {
    let t = s.trim();
    if t.is_empty() {
        return String::new();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return dt.with_timezone(&Utc).format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S") {
        return dt.format("%Y-%m-%d").to_string();
    }
    if let Some(c) = RE_DATE_PREFIX.captures(t) {
        return c[1].to_string();
    }
    t.to_string()
}

/// Protocol-relative URLs (`//host/x`) become `https://host/x`.
pub fn https_url(s: &str) -> String {
    let t = s.trim();
    match t.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => t.to_string(),
    }
}

/// Resolve `input` against `origin`; empty or unparseable input yields "".
pub fn to_abs(origin: &str, input: &str) -> String {
    let x = input.trim();
    if x.is_empty() {
        return String::new();
    }
    Url::parse(&format!("{}/", origin.trim_end_matches('/')))
        .and_then(|base| base.join(x))
        .map(|u| u.to_string())
        .unwrap_or_default()
}

/// Scheme + host (+ port) of a URL, e.g. `https://example.com`.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
