//! Tag extraction.
//!
//! Pulls `<script>`, `<style>`, `<link>` and `<meta>` elements (plus the
//! `<js>` and `<css>` shorthands) out of the source, stores each one in the
//! [`TagTable`] and leaves a `<@kind:N>` placeholder behind.

use std::fmt;
use std::io;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::artifact::{TagKind, TagTable};

static OPEN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(script|style|link|meta|js|css)").unwrap());

/// Rewrite hook for one tag kind.
///
/// Receives the tag content and its parsed attributes. For `script` and
/// `style` the content is the inner text; for `link` and `meta` it is the
/// whole tag. Returning `None` leaves the content unchanged.
pub type TagHook = Arc<dyn Fn(&str, &Attributes) -> Option<String> + Send + Sync>;

/// Optional per-kind rewrite hooks applied before a tag is stored.
#[derive(Clone, Default)]
pub struct TagHooks {
    pub script: Option<TagHook>,
    pub style: Option<TagHook>,
    pub link: Option<TagHook>,
    pub meta: Option<TagHook>,
}

impl TagHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook for `kind`.
    #[must_use]
    pub fn with<F>(mut self, kind: TagKind, hook: F) -> Self
    where
        F: Fn(&str, &Attributes) -> Option<String> + Send + Sync + 'static,
    {
        let hook: TagHook = Arc::new(hook);
        match kind {
            TagKind::Script => self.script = Some(hook),
            TagKind::Style => self.style = Some(hook),
            TagKind::Link => self.link = Some(hook),
            TagKind::Meta => self.meta = Some(hook),
        }
        self
    }

    /// Hook registered for `kind`, if any.
    #[must_use]
    pub fn get(&self, kind: TagKind) -> Option<&TagHook> {
        match kind {
            TagKind::Script => self.script.as_ref(),
            TagKind::Style => self.style.as_ref(),
            TagKind::Link => self.link.as_ref(),
            TagKind::Meta => self.meta.as_ref(),
        }
    }

    fn apply(&self, kind: TagKind, content: String, attrs: &Attributes) -> String {
        match self.get(kind) {
            Some(hook) => hook(&content, attrs).unwrap_or(content),
            None => content,
        }
    }
}

impl fmt::Debug for TagHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagHooks")
            .field("script", &self.script.is_some())
            .field("style", &self.style.is_some())
            .field("link", &self.link.is_some())
            .field("meta", &self.meta.is_some())
            .finish()
    }
}

/// Attributes of an open tag, in source order.
///
/// Quoted values are stored without their quotes; backslash escapes are kept
/// as written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, Option<String>)>);

impl Attributes {
    /// Parse the text between the tag name and the closing `>`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let bytes = raw.as_bytes();
        let mut attrs = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i].is_ascii_whitespace() || bytes[i] == b'/' {
                i += 1;
                continue;
            }
            let name_start = i;
            while i < bytes.len() && !matches!(bytes[i], b'=' | b'/' | b'>') && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let name = raw[name_start..i].to_owned();
            if i >= bytes.len() || bytes[i] != b'=' {
                attrs.push((name, None));
                continue;
            }
            i += 1;
            let value = match bytes.get(i) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let value_start = i + 1;
                    let value_end = closing_quote(bytes, value_start, quote).unwrap_or(bytes.len());
                    i = (value_end + 1).min(bytes.len());
                    &raw[value_start..value_end]
                }
                _ => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    &raw[value_start..i]
                }
            };
            attrs.push((name, Some(value.to_owned())));
        }

        Self(attrs)
    }

    /// Value of the first attribute named `name` (case-insensitive).
    ///
    /// A bare attribute yields `Some("")`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Attributes {
    /// Renders each attribute with a leading space, double-quoting values
    /// unless they contain a double quote.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            match value {
                None => write!(f, " {name}")?,
                Some(v) if v.contains('"') => write!(f, " {name}='{v}'")?,
                Some(v) => write!(f, " {name}=\"{v}\"")?,
            }
        }
        Ok(())
    }
}

/// Index of the quote closing a value that starts at `start`.
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Position of the `>` closing an open tag whose attributes start at `start`.
fn open_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Some(i),
            quote @ (b'"' | b'\'') if i > 0 && bytes[i - 1] == b'=' => {
                i = closing_quote(bytes, i + 1, quote)? + 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Find `</name ... >` at or after `from`. Returns (start of closing tag, end after `>`).
fn find_close(lower: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{name}");
    let mut search = from;
    loop {
        let start = search + lower[search..].find(&needle)?;
        let after = start + needle.len();
        let rest = &lower[after..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('>') {
            let gt = after + (rest.len() - trimmed.len());
            return Some((start, gt + 1));
        }
        search = after;
    }
}

/// Extract tags from `source` into `table`, returning the skeleton.
pub(crate) fn extract(source: &str, hooks: &TagHooks, table: &mut TagTable) -> io::Result<String> {
    let bytes = source.as_bytes();
    let lower = source.to_ascii_lowercase();
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(caps) = OPEN_TAG_RE.captures_at(source, pos) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        pos = whole.end();

        let boundary = bytes.get(whole.end()).copied();
        if !matches!(boundary, Some(b'>' | b'/')) && !boundary.is_some_and(|b| b.is_ascii_whitespace()) {
            continue;
        }
        let Some(gt) = open_tag_end(bytes, whole.end()) else {
            continue;
        };

        let raw_attrs = &source[whole.end()..gt];
        let attrs = Attributes::parse(raw_attrs);
        let content_start = gt + 1;
        let tag = name.as_str().to_ascii_lowercase();

        let extracted = match tag.as_str() {
            "link" | "meta" => {
                let kind = if tag == "link" { TagKind::Link } else { TagKind::Meta };
                let element = hooks.apply(kind, format!("<{tag}{raw_attrs}>"), &attrs);
                Some((kind, element, content_start))
            }
            "js" if attrs.contains("src") => {
                let element = format!("<script{raw_attrs}>{}</script>", hooks.apply(TagKind::Script, String::new(), &attrs));
                Some((TagKind::Script, element, skip_close(&lower, content_start, "js")))
            }
            "css" if attrs.contains("href") || attrs.contains("src") => {
                let element = hooks.apply(TagKind::Link, stylesheet_link(&attrs), &attrs);
                Some((TagKind::Link, element, skip_close(&lower, content_start, "css")))
            }
            _ => find_close(&lower, content_start, &tag).map(|(close_start, end)| {
                let (kind, element_name) = match tag.as_str() {
                    "script" | "js" => (TagKind::Script, "script"),
                    _ => (TagKind::Style, "style"),
                };
                let content = hooks.apply(kind, source[content_start..close_start].to_owned(), &attrs);
                (kind, format!("<{element_name}{raw_attrs}>{content}</{element_name}>"), end)
            }),
        };

        let Some((kind, element, end)) = extracted else {
            continue;
        };

        let index = table.push(kind, &element)?;
        out.push_str(&source[copied..whole.start()]);
        out.push_str(&kind.placeholder(index));
        copied = end;
        pos = end;
    }

    out.push_str(&source[copied..]);
    Ok(out)
}

/// Skip a `</name>` directly at `at`, returning the position after it.
fn skip_close(lower: &str, at: usize, name: &str) -> usize {
    let close = format!("</{name}>");
    if lower[at..].starts_with(&close) { at + close.len() } else { at }
}

fn stylesheet_link(attrs: &Attributes) -> String {
    let renamed = Attributes(
        attrs
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("rel"))
            .filter(|(name, _)| !(name.eq_ignore_ascii_case("src") && attrs.contains("href")))
            .map(|(name, value)| {
                let name = if name.eq_ignore_ascii_case("src") { "href" } else { name };
                (name.to_owned(), value.map(str::to_owned))
            })
            .collect(),
    );
    format!("<link rel=\"stylesheet\"{renamed}>")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(source: &str) -> (String, TagTable) {
        run_with(source, &TagHooks::new())
    }

    fn run_with(source: &str, hooks: &TagHooks) -> (String, TagTable) {
        let mut table = TagTable::new();
        let skeleton = extract(source, hooks, &mut table).unwrap();
        (skeleton, table)
    }

    fn entry(table: &TagTable, kind: TagKind, n: usize) -> String {
        table.get(kind, n).unwrap().decompress().unwrap()
    }

    #[test]
    fn test_extract_script() {
        let (skeleton, table) = run("<p>a</p><script>alert(1)</script><p>b</p>");

        assert_eq!(skeleton, "<p>a</p><@script:1><p>b</p>");
        assert_eq!(entry(&table, TagKind::Script, 1), "<script>alert(1)</script>");
    }

    #[test]
    fn test_extract_keeps_source_order() {
        let (skeleton, table) = run("<script>a()</script>\n<style>p{}</style>\n<SCRIPT type=\"module\">b()</Script>");

        assert_eq!(skeleton, "<@script:1>\n<@style:1>\n<@script:2>");
        assert_eq!(entry(&table, TagKind::Script, 2), "<script type=\"module\">b()</script>");
        assert_eq!(entry(&table, TagKind::Style, 1), "<style>p{}</style>");
    }

    #[test]
    fn test_extract_empty_script() {
        let (skeleton, table) = run(r#"<script src="/app.js"></script>"#);

        assert_eq!(skeleton, "<@script:1>");
        assert_eq!(entry(&table, TagKind::Script, 1), r#"<script src="/app.js"></script>"#);
    }

    #[test]
    fn test_extract_link_and_meta() {
        let (skeleton, table) = run("<meta charset=\"utf-8\">\n<link rel=\"icon\" href=\"/f.ico\" />");

        assert_eq!(skeleton, "<@meta:1>\n<@link:1>");
        assert_eq!(entry(&table, TagKind::Meta, 1), "<meta charset=\"utf-8\">");
        assert_eq!(entry(&table, TagKind::Link, 1), "<link rel=\"icon\" href=\"/f.ico\" />");
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let (skeleton, table) = run(r#"<meta content="a > b \" c">x"#);

        assert_eq!(skeleton, "<@meta:1>x");
        assert_eq!(entry(&table, TagKind::Meta, 1), r#"<meta content="a > b \" c">"#);
    }

    #[test]
    fn test_similar_names_are_not_tags() {
        let source = "<scripture>x</scripture><metadata><linker>";

        let (skeleton, table) = run(source);

        assert_eq!(skeleton, source);
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_unclosed_script_left_alone() {
        let source = "<script>never closed";

        let (skeleton, table) = run(source);

        assert_eq!(skeleton, source);
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_js_shorthand() {
        let (skeleton, table) = run("<js src=\"/a.js\"></js>|<js>run()</js>");

        assert_eq!(skeleton, "<@script:1>|<@script:2>");
        assert_eq!(entry(&table, TagKind::Script, 1), "<script src=\"/a.js\"></script>");
        assert_eq!(entry(&table, TagKind::Script, 2), "<script>run()</script>");
    }

    #[test]
    fn test_css_shorthand() {
        let (skeleton, table) = run("<css src=\"/a.css\">|<css href='/b.css'></css>|<css>p{}</css>");

        assert_eq!(skeleton, "<@link:1>|<@link:2>|<@style:1>");
        assert_eq!(entry(&table, TagKind::Link, 1), "<link rel=\"stylesheet\" href=\"/a.css\">");
        assert_eq!(entry(&table, TagKind::Link, 2), "<link rel=\"stylesheet\" href=\"/b.css\">");
        assert_eq!(entry(&table, TagKind::Style, 1), "<style>p{}</style>");
    }

    #[test]
    fn test_script_hook_rewrites_content() {
        let hooks = TagHooks::new().with(TagKind::Script, |content, attrs| {
            (attrs.get("type") == Some("text/x")).then(|| content.to_uppercase())
        });

        let (_, table) = run_with(
            "<script type=\"text/x\">abc</script><script>def</script>",
            &hooks,
        );

        assert_eq!(entry(&table, TagKind::Script, 1), "<script type=\"text/x\">ABC</script>");
        assert_eq!(entry(&table, TagKind::Script, 2), "<script>def</script>");
    }

    #[test]
    fn test_meta_hook_receives_whole_tag() {
        let hooks = TagHooks::new().with(TagKind::Meta, |tag, _| Some(tag.replace("utf-8", "UTF-8")));

        let (_, table) = run_with("<meta charset=utf-8>", &hooks);

        assert_eq!(entry(&table, TagKind::Meta, 1), "<meta charset=UTF-8>");
    }

    #[test]
    fn test_attributes_parse() {
        let attrs = Attributes::parse(r#" src="/a.js" defer data-x='y \' z' nomodule=1"#);

        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.get("SRC"), Some("/a.js"));
        assert_eq!(attrs.get("defer"), Some(""));
        assert_eq!(attrs.get("data-x"), Some(r"y \' z"));
        assert_eq!(attrs.get("nomodule"), Some("1"));
        assert_eq!(attrs.get("missing"), None);
    }

    #[test]
    fn test_attributes_display() {
        let attrs = Attributes::parse(r#" a="1" b c='say "hi"'"#);

        assert_eq!(attrs.to_string(), r#" a="1" b c='say "hi"'"#);
    }
}
