//! Code blocks and inline code.
//!
//! Code is rendered up front and swapped for sentinel tokens so that no later
//! stage rewrites its content. Existing `<pre>` and `<code>` elements are
//! shielded verbatim, which keeps a second pass over compiled output stable.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::escape::escape_html;

const BLOCK_OPEN: char = '\u{E000}';
const BLOCK_CLOSE: char = '\u{E001}';
const INLINE_OPEN: char = '\u{E002}';
const INLINE_CLOSE: char = '\u{E003}';

static PRE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<pre\b[^>]*>.*?</pre>").unwrap());
static FENCE_LANG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([\w$-]+)[ \t]*\n(.*?)```").unwrap());
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").unwrap());
static CODE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<code\b[^>]*>.*?</code>").unwrap());
static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x{E000}([0-9]+)\x{E001}|\x{E002}([0-9]+)\x{E003}").unwrap()
});

/// Rendered code spans, indexed by the number inside each sentinel.
#[derive(Debug, Default)]
pub(crate) struct Shield {
    spans: Vec<String>,
}

impl Shield {
    fn block(&mut self, html: String) -> String {
        self.spans.push(html);
        format!("{BLOCK_OPEN}{}{BLOCK_CLOSE}", self.spans.len() - 1)
    }

    fn inline(&mut self, html: String) -> String {
        self.spans.push(html);
        format!("{INLINE_OPEN}{}{INLINE_CLOSE}", self.spans.len() - 1)
    }

    /// Put every shielded span back in place.
    pub(crate) fn restore(&self, text: &str) -> String {
        SENTINEL_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let index = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|m| m.as_str().parse::<usize>().ok());
                match index.and_then(|i| self.spans.get(i)) {
                    Some(span) => self.restore(span),
                    None => String::new(),
                }
            })
            .into_owned()
    }
}

/// Render fenced and inline code, and shield it together with any existing
/// `<pre>`/`<code>` elements.
pub(crate) fn protect(input: &str) -> (String, Shield) {
    let mut shield = Shield::default();
    let text = input.replace(|c: char| matches!(c, BLOCK_OPEN..=INLINE_CLOSE), "");

    let text = PRE_RE.replace_all(&text, |caps: &Captures<'_>| shield.block(caps[0].to_owned()));
    let text = FENCE_LANG_RE.replace_all(&text, |caps: &Captures<'_>| {
        shield.block(format!(
            "<pre class=\"highlight\"><code lang=\"{}\">{}</code></pre>",
            &caps[1],
            escape_html(&caps[2])
        ))
    });
    let text = FENCE_RE.replace_all(&text, |caps: &Captures<'_>| {
        let body = caps[1].strip_prefix('\n').unwrap_or(&caps[1]);
        shield.block(format!("<pre class=\"highlight\"><code>{}</code></pre>", escape_html(body)))
    });
    let text = CODE_TAG_RE.replace_all(&text, |caps: &Captures<'_>| shield.inline(caps[0].to_owned()));
    let text = INLINE_RE
        .replace_all(&text, |caps: &Captures<'_>| {
            shield.inline(format!("<code>{}</code>", escape_html(&caps[1])))
        })
        .into_owned();

    (text, shield)
}
