//! Links and autolinks.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::escape::escape_html;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]\n]*)\]\(([^()\s]*)\)(?:\{([^{}\n]*)\})?").unwrap());
// Markup in link text that survives escaping.
static TEXT_MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{[^{}\n]*\}\}\}|\{\{[^{}\n]*\}\}|</?[A-Za-z@][^<>\n]*>").unwrap());
static AUTOLINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w\-.]+(?:[\w.,@?^=%&:/~+#\-]*[\w@?^=%&/~+#\-])?").unwrap()
});

/// `[text](href){target}`. An image-style `![...]` left by the media stage
/// is not a link.
pub(crate) fn links(text: &str) -> String {
    LINK_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let start = caps.get(0).map_or(0, |m| m.start());
            if text[..start].ends_with('!') {
                return caps[0].to_owned();
            }
            let href = caps[2].replace('"', "&quot;");
            let target = caps
                .get(3)
                .map(|m| format!(" target=\"{}\"", expand_target(m.as_str().trim())))
                .unwrap_or_default();
            format!("<a href=\"{href}\"{target}>{}</a>", escape_text(&caps[1]))
        })
        .into_owned()
}

/// Escape link text, keeping tags from earlier stages and placeholders.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for markup in TEXT_MARKUP_RE.find_iter(text) {
        out.push_str(&escape_html(&text[last..markup.start()]));
        out.push_str(markup.as_str());
        last = markup.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

fn expand_target(target: &str) -> &str {
    match target {
        "" | "_b" => "_blank",
        "_s" => "_self",
        "_p" => "_parent",
        "_t" => "_top",
        other => other,
    }
}

/// Bare `http(s)://` URLs. URLs already inside an attribute, tag body or
/// word are skipped.
pub(crate) fn autolinks(text: &str) -> String {
    AUTOLINK_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let url = &caps[0];
            let start = caps.get(0).map_or(0, |m| m.start());
            let skip = text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| matches!(c, '"' | '\'' | '`' | '=' | '>') || c.is_alphanumeric() || c == '_');
            if skip {
                url.to_owned()
            } else {
                format!("<a href=\"{url}\">{}</a>", escape_html(url))
            }
        })
        .into_owned()
}
