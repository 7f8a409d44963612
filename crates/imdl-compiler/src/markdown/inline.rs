//! Emphasis, headings, blockquotes and horizontal rules.

use std::sync::LazyLock;

use regex::{Captures, Regex};

const OPAQUE_OPEN: char = '\u{E004}';
const OPAQUE_CLOSE: char = '\u{E005}';

// Placeholders, tags with their attributes, and `](target)` link targets.
static OPAQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{[^{}\n]*\}\}\}|\{\{[^{}\n]*\}\}|</?[A-Za-z@][^<>\n]*>|\]\([^()]*\)").unwrap()
});
static OPAQUE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x{E004}([0-9]+)\x{E005}").unwrap());

// Content may not start or end with a blank and never crosses a line, so a
// `* item` list marker is not read as emphasis.
static STRONG_EM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*\*([^*\s](?:[^*\n]*[^*\s])?)\*\*\*").unwrap());
static STRONG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\s](?:[^*\n]*[^*\s])?)\*\*").unwrap());
static EM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*").unwrap());
static UNDERLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_\s](?:[^_\n]*[^_\s])?)__").unwrap());
static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~([^~\s](?:[^~\n]*[^~\s])?)~~").unwrap());

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(#{1,6})[ \t]+(.+?)[ \t]*$").unwrap());
static BLOCKQUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>[ \t]*(.+)$").unwrap());
static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$").unwrap());

/// Bold, italic, underline and strikethrough. Longest markers go first.
///
/// Markers inside placeholders, tags and link targets are left alone.
pub(crate) fn emphasis(text: &str) -> String {
    let mut opaque = Vec::new();
    let text = text.replace([OPAQUE_OPEN, OPAQUE_CLOSE], "");
    let text = OPAQUE_RE.replace_all(&text, |caps: &Captures<'_>| {
        opaque.push(caps[0].to_owned());
        format!("{OPAQUE_OPEN}{}{OPAQUE_CLOSE}", opaque.len() - 1)
    });

    let text = STRONG_EM_RE.replace_all(&text, "<strong><em>$1</em></strong>");
    let text = STRONG_RE.replace_all(&text, "<strong>$1</strong>");
    let text = EM_RE.replace_all(&text, "<em>$1</em>");
    let text = UNDERLINE_RE.replace_all(&text, "<u>$1</u>");
    let text = STRIKE_RE.replace_all(&text, "<s>$1</s>");

    OPAQUE_TOKEN_RE
        .replace_all(&text, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| opaque.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

/// ATX headings, `#` through `######`.
pub(crate) fn headings(text: &str) -> String {
    HEADING_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let level = caps[1].len();
            format!("<h{level}>{}</h{level}>", &caps[2])
        })
        .into_owned()
}

pub(crate) fn blockquotes(text: &str) -> String {
    BLOCKQUOTE_RE
        .replace_all(text, "<blockquote>$1</blockquote>")
        .into_owned()
}

/// Lines of three or more `-`, `*` or `_`.
pub(crate) fn rules(text: &str) -> String {
    RULE_RE.replace_all(text, "<hr>").into_owned()
}
