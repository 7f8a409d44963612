//! Ordered and unordered lists.
//!
//! Consecutive lines with the same indent and marker family form one list.
//! Lines indented deeper than the marker belong to the current item; they are
//! dedented and compiled again, which is how nesting is resolved. A blank line
//! ends the list.

use std::sync::LazyLock;

use regex::Regex;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)(?:([-*+])|([0-9]+)\.)[ \t]+(.*)$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Bullet(char),
    Ordered,
}

#[derive(Debug)]
struct Marker<'a> {
    indent: usize,
    family: Family,
    number: Option<u64>,
    content: &'a str,
}

fn parse_marker(line: &str) -> Option<Marker<'_>> {
    let caps = MARKER_RE.captures(line)?;
    let indent = caps.get(1).map_or(0, |m| m.len());
    let content = caps.get(4).map_or("", |m| m.as_str());
    if let Some(bullet) = caps.get(2) {
        let symbol = bullet.as_str().chars().next()?;
        return Some(Marker {
            indent,
            family: Family::Bullet(symbol),
            number: None,
            content,
        });
    }
    Some(Marker {
        indent,
        family: Family::Ordered,
        number: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        content,
    })
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Compile every list in `text`.
pub(crate) fn lists(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        match parse_marker(lines[i]) {
            Some(first) => {
                let (html, next) = build_list(&lines, i, &first);
                out.push(html);
                i = next;
            }
            None => {
                out.push(lines[i].to_owned());
                i += 1;
            }
        }
    }

    out.join("\n")
}

/// Build the list starting at `lines[start]`. Returns the HTML and the index
/// of the first line after the list.
fn build_list(lines: &[&str], start: usize, first: &Marker<'_>) -> (String, usize) {
    let mut items = Vec::new();
    let mut numbers = Vec::new();
    let mut i = start;

    while let Some(marker) = lines.get(i).and_then(|line| parse_marker(line)) {
        if marker.indent != first.indent || marker.family != first.family {
            break;
        }
        i += 1;

        let body_start = i;
        while i < lines.len() && !lines[i].trim().is_empty() && indent_of(lines[i]) > first.indent {
            i += 1;
        }

        items.push(render_item(marker.content, &lines[body_start..i]));
        numbers.extend(marker.number);
    }

    let html = match first.family {
        Family::Bullet(_) => format!("<ul>{}</ul>", items.concat()),
        Family::Ordered => {
            let reversed = matches!(numbers.as_slice(), [a, b, ..] if b < a);
            let open = if reversed { "<ol reversed>" } else { "<ol>" };
            format!("{open}{}</ol>", items.concat())
        }
    };
    (html, i)
}

fn render_item(content: &str, body: &[&str]) -> String {
    if body.is_empty() {
        return format!("<li>{content}</li>");
    }
    let cut = body.iter().map(|line| indent_of(line)).min().unwrap_or(0);
    let dedented: Vec<&str> = body.iter().map(|line| &line[cut..]).collect();
    let nested = lists(&dedented.join("\n"));
    if nested.starts_with('<') {
        format!("<li>{content}{nested}</li>")
    } else {
        format!("<li>{content}\n{nested}</li>")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_nested_unordered() {
        assert_eq!(lists("- a\n- b\n  - c"), "<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul>");
    }

    #[test]
    fn test_ordered() {
        assert_eq!(lists("1. one\n2. two"), "<ol><li>one</li><li>two</li></ol>");
    }

    #[test]
    fn test_ordered_descending_is_reversed() {
        assert_eq!(
            lists("3. three\n2. two\n1. one"),
            "<ol reversed><li>three</li><li>two</li><li>one</li></ol>"
        );
    }

    #[test]
    fn test_marker_change_starts_new_list() {
        assert_eq!(lists("- a\n* b"), "<ul><li>a</li></ul>\n<ul><li>b</li></ul>");
    }

    #[test]
    fn test_blank_line_ends_list() {
        assert_eq!(
            lists("before\n- a\n\n- b\nafter"),
            "before\n<ul><li>a</li></ul>\n\n<ul><li>b</li></ul>\nafter"
        );
    }

    #[test]
    fn test_deeply_nested_mixed() {
        assert_eq!(
            lists("1. top\n   - mid\n     1. deep\n2. next"),
            "<ol><li>top<ul><li>mid<ol><li>deep</li></ol></li></ul></li><li>next</li></ol>"
        );
    }

    #[test]
    fn test_item_continuation_text() {
        assert_eq!(lists("- a\n  more"), "<ul><li>a\nmore</li></ul>");
    }

    #[test]
    fn test_marker_needs_blank() {
        let text = "-a\n1.b";

        assert_eq!(lists(text), text);
    }

    #[test]
    fn test_lists_idempotent() {
        let once = lists("- a\n- b\n  - c\n1. x");

        assert_eq!(lists(&once), once);
    }
}
