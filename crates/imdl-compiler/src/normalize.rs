//! Shorthand entity expansion and comment stripping.
//!
//! Authors write `&<`, `&$e`, `&!=` and friends instead of named entities.
//! Codes are matched case-insensitively and may end with an optional `;`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)&;|&(\+-|\?=|\^/|!=|<=|>=|#[scropid]|\$[cpeyruw]|#pi|[<>&\\/"'`?=$#*]);?"#)
        .unwrap()
});

static HTML_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^[ \t]*/\*.*?^[ \t]*\*/").unwrap());
static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*//.*$").unwrap());

/// Run both normalizer passes: line endings, entities, then comments.
#[must_use]
pub fn normalize(source: &str) -> String {
    let source = source.replace("\r\n", "\n");
    strip_comments(&expand_entities(&source))
}

/// Replace shorthand escape codes with HTML entities.
///
/// Numeric entities (`&#38;`, `&#x26;`) and named entities are left alone, so
/// running this twice changes nothing the second time.
#[must_use]
pub fn expand_entities(source: &str) -> String {
    ESCAPE_RE
        .replace_all(source, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let Some(code) = caps.get(1) else {
                return "&amp;".to_owned();
            };
            if code.as_str() == "#" && starts_numeric_entity(&source[code.end()..]) {
                return whole.to_owned();
            }
            entity_for(&code.as_str().to_lowercase()).to_owned()
        })
        .into_owned()
}

/// Whether the text after `&#` continues a numeric character reference.
fn starts_numeric_entity(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('x' | 'X') => chars.next().is_some_and(|c| c.is_ascii_hexdigit()),
        _ => false,
    }
}

/// Entity for a lowercased escape code.
///
/// `#d` and `$c` are accepted by the scanner but have no entry, so they
/// resolve to nothing.
fn entity_for(code: &str) -> &'static str {
    match code {
        "<" => "&lt;",
        ">" => "&gt;",
        "&" => "&amp;",
        "*" => "&ast;",
        "\\" => "&bsol;",
        "/" => "&sol;",
        "\"" => "&quot;",
        "'" => "&apos;",
        "`" => "&grave;",
        "?" => "&quest;",
        "=" => "&equals;",
        "#s" => "&sect;",
        "#c" => "&copy;",
        "#r" => "&reg;",
        "#o" => "&deg;",
        "#p" => "&para;",
        "#i" => "&infin;",
        "+-" => "&plusmn;",
        "?=" => "&asymp;",
        "^/" => "&radic;",
        "!=" => "&ne;",
        "<=" => "&le;",
        ">=" => "&ge;",
        "$" => "&cent;",
        "$p" => "&pound;",
        "$e" => "&euro;",
        "$y" => "&yen;",
        "$r" => "&#8377;",
        "$u" => "&#20803;",
        "$w" => "&#8361;",
        "#" => "&#960;",
        _ => "",
    }
}

/// Remove `<!-- -->`, line-leading `/* */` and line-leading `//` comments.
#[must_use]
pub fn strip_comments(source: &str) -> String {
    let out = HTML_COMMENT_RE.replace_all(source, "");
    let out = BLOCK_COMMENT_RE.replace_all(&out, "");
    LINE_COMMENT_RE.replace_all(&out, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_codes() {
        assert_eq!(expand_entities("&< &> &&"), "&lt; &gt; &amp;");
        assert_eq!(expand_entities(r#"&" &' &\ &/"#), "&quot; &apos; &bsol; &sol;");
    }

    #[test]
    fn test_trailing_semicolon_consumed() {
        assert_eq!(expand_entities("a&<;b"), "a&lt;b");
    }

    #[test]
    fn test_bare_ampersand_semicolon() {
        assert_eq!(expand_entities("&;"), "&amp;");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(expand_entities("&#c 2024 &#r &#s &#o"), "&copy; 2024 &reg; &sect; &deg;");
        assert_eq!(expand_entities("&+- &?= &^/ &!= &<= &>="), "&plusmn; &asymp; &radic; &ne; &le; &ge;");
    }

    #[test]
    fn test_currency() {
        assert_eq!(expand_entities("&$ &$p &$e &$y"), "&cent; &pound; &euro; &yen;");
        assert_eq!(expand_entities("&$r &$u &$w"), "&#8377; &#20803; &#8361;");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(expand_entities("&#C &$E"), "&copy; &euro;");
    }

    #[test]
    fn test_codes_without_entry_are_dropped() {
        assert_eq!(expand_entities("[&#d] [&$c]"), "[] []");
    }

    #[test]
    fn test_pi_reads_as_pilcrow() {
        assert_eq!(expand_entities("&#pi"), "&para;i");
        assert_eq!(expand_entities("&# "), "&#960; ");
    }

    #[test]
    fn test_unrelated_ampersands_untouched() {
        assert_eq!(expand_entities("Tom & Jerry, a&b"), "Tom & Jerry, a&b");
    }

    #[test]
    fn test_idempotent() {
        let once = expand_entities("&< &#c &$e &#960; &#x3C0; &amp; &; &&");

        assert_eq!(once, "&lt; &copy; &euro; &#960; &#x3C0; &amp; &amp; &amp;");
        assert_eq!(expand_entities(&once), once);
    }

    #[test]
    fn test_strip_html_comment_multiline() {
        assert_eq!(strip_comments("a<!-- x\ny -->b"), "ab");
    }

    #[test]
    fn test_strip_block_comment() {
        let source = "keep\n  /* gone\n  still gone\n  */\nkeep too";

        assert_eq!(strip_comments(source), "keep\n\nkeep too");
    }

    #[test]
    fn test_block_comment_needs_line_start() {
        let source = "a /* not\n*/ b";

        assert_eq!(strip_comments(source), source);
    }

    #[test]
    fn test_strip_line_comment() {
        assert_eq!(strip_comments("a\n  // note\nb"), "a\n\nb");
    }

    #[test]
    fn test_url_is_not_a_comment() {
        let source = "see https://example.com";

        assert_eq!(strip_comments(source), source);
    }

    #[test]
    fn test_normalize_crlf() {
        assert_eq!(normalize("a\r\n// x\r\nb &<"), "a\n\nb &lt;");
    }
}
