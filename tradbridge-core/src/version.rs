//! Version string helpers shared by extraction and the version checker.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FIRST_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());
static TRAILING_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(v?[^\]]+)\]\s*$").unwrap());
static F95_THREAD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/threads/(?:[^/]*\.)?(\d+)").unwrap());

/// Strip backticks and collapse whitespace so versions compare reliably.
pub fn normalize_version(version: &str) -> String {
    let stripped = version.trim().replace('`', "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// First `[...]` token of a thread name: `"Jeu [v0.3] [Ren'Py]"` gives `"v0.3"`.
pub fn first_bracket_token(thread_name: &str) -> Option<String> {
    FIRST_BRACKET
        .captures(thread_name)
        .map(|caps| caps[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trailing `[...]` token of a thread name: `"Growing Problems [v0.12]"` gives `"v0.12"`.
pub fn trailing_bracket_version(thread_name: &str) -> Option<String> {
    TRAILING_BRACKET
        .captures(thread_name.trim())
        .map(|caps| caps[1].trim().to_string())
}

/// Replace the trailing bracketed version of a thread name.
///
/// Names without a trailing bracket are returned unchanged.
pub fn thread_title_with_version(thread_name: &str, new_version: &str) -> String {
    let trimmed = thread_name.trim();
    if new_version.trim().is_empty() || !TRAILING_BRACKET.is_match(trimmed) {
        return trimmed.to_string();
    }
    let replacement = format!("[{}]", new_version.trim());
    TRAILING_BRACKET
        .replace(trimmed, regex::NoExpand(&replacement))
        .trim()
        .to_string()
}

/// Numeric F95Zone thread id from a thread URL.
///
/// `https://f95zone.to/threads/game-name.285451/` gives `"285451"`.
pub fn f95_thread_id(url: &str) -> Option<String> {
    F95_THREAD_ID
        .captures(url)
        .map(|caps| caps[1].to_string())
}

pub fn is_f95_link(url: &str) -> bool {
    url.to_lowercase().contains("f95zone.to")
}
