//! Paragraph wrapping and attribute lines.

use std::sync::LazyLock;

use regex::Regex;

static STARTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[\w*_~]|<(?:strong|em|u|s)>|<a |\x{E002})").unwrap());

/// Inner text of a line consisting solely of `{...}` without nested braces.
pub(crate) fn attribute_line(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix('{')?.strip_suffix('}')?;
    if inner.contains(['{', '}']) {
        return None;
    }
    Some(inner.trim())
}

/// Running count of open `<p>` and `<li>` elements after `line`.
fn open_blocks(depth: usize, line: &str) -> usize {
    let opens = ["<p>", "<p ", "<li>", "<li "]
        .iter()
        .map(|tag| line.matches(tag).count())
        .sum::<usize>();
    let closes = ["</p>", "</li>"].iter().map(|tag| line.matches(tag).count()).sum::<usize>();
    (depth + opens).saturating_sub(closes)
}

/// Wrap runs of text lines in `<p>`, taking attributes from an attribute
/// line directly above the run. Lines inside an open `<p>` or `<li>` are
/// left alone.
pub(crate) fn paragraphs(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut depth = 0;
    let mut i = 0;

    while i < lines.len() {
        if depth > 0 || !STARTER_RE.is_match(lines[i]) {
            depth = open_blocks(depth, lines[i]);
            out.push(lines[i].to_owned());
            i += 1;
            continue;
        }

        let start = i;
        while i < lines.len() && STARTER_RE.is_match(lines[i]) {
            i += 1;
        }

        let attrs = start
            .checked_sub(1)
            .and_then(|prev| attribute_line(lines[prev]))
            .filter(|a| !a.is_empty())
            .map(|a| format!(" {a}"));
        if attrs.is_some() {
            out.pop();
        }
        let body = lines[start..i].join("\n");
        depth = open_blocks(0, &body);
        out.push(format!("<p{}>{body}</p>", attrs.unwrap_or_default()));
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_attribute_line() {
        assert_eq!(attribute_line("  {class=\"x\"} "), Some("class=\"x\""));
        assert_eq!(attribute_line("{}"), Some(""));
        assert_eq!(attribute_line("{{name}}"), None);
        assert_eq!(attribute_line("text {a}"), None);
    }

    #[test]
    fn test_wraps_text_run() {
        assert_eq!(paragraphs("Hello\nworld\n\nBye"), "<p>Hello\nworld</p>\n\n<p>Bye</p>");
    }

    #[test]
    fn test_emphasis_and_links_start_paragraphs() {
        assert_eq!(
            paragraphs("<strong>Hi</strong> there\n<a href=\"/\">home</a>"),
            "<p><strong>Hi</strong> there\n<a href=\"/\">home</a></p>"
        );
    }

    #[test]
    fn test_html_lines_not_wrapped() {
        let text = "<div>\n<h1>T</h1>\n{{name}}\n</div>";

        assert_eq!(paragraphs(text), text);
    }

    #[test]
    fn test_attribute_line_applies() {
        assert_eq!(paragraphs("{class=\"lead\"}\nIntro"), "<p class=\"lead\">Intro</p>");
    }

    #[test]
    fn test_list_item_continuation_not_wrapped() {
        let text = "<ul><li>a\nmore</li></ul>";

        assert_eq!(paragraphs(text), text);
    }

    #[test]
    fn test_paragraphs_idempotent() {
        let once = paragraphs("One\ntwo\n\n*three*");

        assert_eq!(paragraphs(&once), once);
    }
}
