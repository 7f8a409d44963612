//! HTML escaping used for code bodies and substituted values.

/// Entities [`escape_html`] leaves intact instead of double-escaping.
const KNOWN_ENTITIES: [&str; 7] = ["amp;", "gt;", "lt;", "sol;", "bsol;", "lbrace;", "rbrace;"];

/// Escape text for safe inclusion in rendered HTML.
///
/// Escapes `<`, `>`, `{` and `}`, and every `&` that does not already start
/// one of a small set of entities. Braces are escaped so that the result can
/// never be read as a placeholder by a later substitution pass.
///
/// ```
/// use imdl_compiler::escape_html;
///
/// assert_eq!(escape_html("a < b && {{x}}"), "a &lt; b &amp;&amp; &lbrace;&lbrace;x&rbrace;&rbrace;");
/// assert_eq!(escape_html("&lt;kept&gt;"), "&lt;kept&gt;");
/// ```
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, ch) in text.char_indices() {
        match ch {
            '&' => {
                let rest = &text[i + 1..];
                if KNOWN_ENTITIES.iter().any(|e| rest.starts_with(e)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '{' => out.push_str("&lbrace;"),
            '}' => out.push_str("&rbrace;"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_html`].
#[must_use]
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&lbrace;", "{")
        .replace("&rbrace;", "}")
        .replace("&amp;", "&")
}

/// Escape a value for a double- or single-quoted attribute.
#[must_use]
pub fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;").replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_specials() {
        assert_eq!(escape_html("<b>{x}</b>"), "&lt;b&gt;&lbrace;x&rbrace;&lt;/b&gt;");
    }

    #[test]
    fn test_escape_lone_ampersand() {
        assert_eq!(escape_html("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(escape_html("&"), "&amp;");
    }

    #[test]
    fn test_escape_keeps_known_entities() {
        assert_eq!(escape_html("&amp; &sol; &bsol;"), "&amp; &sol; &bsol;");
    }

    #[test]
    fn test_escape_other_entities_escaped() {
        assert_eq!(escape_html("&copy;"), "&amp;copy;");
    }

    #[test]
    fn test_escape_is_idempotent() {
        let once = escape_html("if a < b && c > {d} { &x }");

        assert_eq!(escape_html(&once), once);
    }

    #[test]
    fn test_escape_leaves_quotes() {
        assert_eq!(escape_html(r#"say "hi" 'there'"#), r#"say "hi" 'there'"#);
    }

    #[test]
    fn test_unescape_round_trip() {
        let text = "a < b && {c} > d";

        assert_eq!(unescape_html(&escape_html(text)), text);
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"it's "x""#), "it&#39;s &quot;x&quot;");
    }
}
