//! Markdown-like shorthand compiled to HTML.
//!
//! A fixed sequence of string rewrites. Each stage sees the full output of
//! the one before it:
//!
//! 1. form macros
//! 2. emphasis
//! 3. headings
//! 4. blockquotes and horizontal rules
//! 5. code (rendered and shielded before stage 1, restored at the end)
//! 6. media embeds
//! 7. links and autolinks
//! 8. lists
//! 9. tables
//! 10. paragraphs
//!
//! Running the transform over its own output changes nothing.

mod code;
mod form;
mod inline;
mod link;
mod list;
mod media;
mod paragraph;
mod table;

use std::collections::BTreeSet;

/// Client-side support file required by the compiled output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Include {
    /// Swaps a multi-source iframe to its next source when loading fails.
    IframeFallback,
}

impl Include {
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::IframeFallback => "iframe_fallback.js",
        }
    }

    /// Bundled script source.
    #[must_use]
    pub fn source(self) -> &'static str {
        match self {
            Self::IframeFallback => include_str!("../../assets/iframe_fallback.js"),
        }
    }
}

/// Output of [`transform`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transformed {
    pub html: String,
    pub includes: BTreeSet<Include>,
}

/// Run every stage over `input`.
#[must_use]
pub fn transform(input: &str) -> Transformed {
    let mut includes = BTreeSet::new();
    let (text, shield) = code::protect(input);

    let text = form::forms(&text);
    let text = inline::emphasis(&text);
    let text = inline::headings(&text);
    let text = inline::blockquotes(&text);
    let text = inline::rules(&text);
    let text = media::embeds(&text, &mut includes);
    let text = link::links(&text);
    let text = link::autolinks(&text);
    let text = list::lists(&text);
    let text = table::tables(&text);
    let text = paragraph::paragraphs(&text);

    Transformed {
        html: shield.restore(&text),
        includes,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn html(input: &str) -> String {
        transform(input).html
    }

    #[test]
    fn test_heading_with_placeholder() {
        assert_eq!(html("# Hello {{name}}"), "<h1>Hello {{name}}</h1>");
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(html("- a\n- b\n  - c"), "<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul>");
    }

    #[test]
    fn test_list_items_with_emphasis() {
        assert_eq!(
            html("* **bold** item\n* *it*"),
            "<ul><li><strong>bold</strong> item</li><li><em>it</em></li></ul>"
        );
    }

    #[test]
    fn test_code_is_not_rewritten() {
        assert_eq!(
            html("Use `**x**` and\n```\n# not a heading\n- nor a list\n```"),
            "<p>Use <code>**x**</code> and</p>\n\
             <pre class=\"highlight\"><code># not a heading\n- nor a list\n</code></pre>"
        );
    }

    #[test]
    fn test_placeholder_in_code_is_escaped() {
        assert_eq!(html("`{{secret}}`"), "<p><code>&lbrace;&lbrace;secret&rbrace;&rbrace;</code></p>");
    }

    #[test]
    fn test_placeholder_names_survive_emphasis() {
        assert_eq!(
            html("Hi {{first__name__x}}, see [__docs__](/a__b__c)"),
            "<p>Hi {{first__name__x}}, see <a href=\"/a__b__c\"><u>docs</u></a></p>"
        );
    }

    #[test]
    fn test_paragraph_with_link() {
        assert_eq!(
            html("Read [the guide](/guide){_b} first."),
            "<p>Read <a href=\"/guide\" target=\"_blank\">the guide</a> first.</p>"
        );
    }

    #[test]
    fn test_frame_registers_include() {
        let out = transform("![embed](/a.html\n/b.html)");

        assert!(out.includes.contains(&Include::IframeFallback));
        assert!(out.html.starts_with("<iframe src=\"/a.html\" srcFallback=\"0\""));
    }

    #[test]
    fn test_document_is_idempotent() {
        let source = "\
{class=\"lead\"}
Welcome to **the** _site_ ~~old~~ __new__ page.

## Section

> quoted line

---

- one
- two
  1. inner
  2. inner two

| h1 | h2 |
|----|----|
| a  | b  |

![img](/a.png\n/a.webp){alt=\"x\"}
![iframe](/x\n/y)

See https://example.com and [docs](/docs){_s}.

<form action=\"/f\">
[text name {Your name}]
[select pick {a, b*}]
[submit go]
</form>

```sh
echo \"{{not}}\" && ls
```
Inline `code` too.";

        let once = html(source);
        let twice = html(&once);

        assert_eq!(twice, once);
    }
}
