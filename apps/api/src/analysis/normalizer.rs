//! Whitespace and control-character cleanup for extracted or hand-entered text.

use std::sync::LazyLock;

use regex::Regex;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex"));
static SPACE_AROUND_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ?\n ?").expect("static regex"));
static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Normalizes text for storage and comparison.
///
/// - line endings become `\n`
/// - control characters other than `\n` and `\t` are removed
/// - runs of horizontal whitespace become one space, none left at line edges
/// - 3+ consecutive newlines become 2
/// - leading and trailing whitespace is stripped
///
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let printable: String = unified
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    let collapsed = HORIZONTAL_WS.replace_all(&printable, " ");
    let tight = SPACE_AROUND_NEWLINE.replace_all(&collapsed, "\n");
    let paragraphs = EXCESS_NEWLINES.replace_all(&tight, "\n\n");

    paragraphs.trim().to_string()
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
