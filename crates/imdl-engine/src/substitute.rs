//! Placeholder substitution.
//!
//! Runs in two sweeps over a decompressed skeleton:
//!
//! 1. [`values`]: `{{name}}`, `{{{name}}}`, `{{attr="name"}}` and
//!    `{{#include}}` against the render context.
//! 2. [`reinsert_tags`]: `{{-kind}}` wildcards, then `<@kind:N>` tokens,
//!    against the artifact's tag table.
//!
//! Sweep 2 only scans template text. Values substituted by sweep 1 are kept
//! apart, so they can never claim an extracted tag.

use std::collections::HashSet;
use std::io;
use std::sync::LazyLock;

use imdl_compiler::{TagKind, TagTable, escape_attr, escape_html};
use regex::{Captures, Regex};

use crate::context::{Nonce, RenderContext};

static VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{(.*?)\}\}\}|\{\{(.*?)\}\}").unwrap());

static WILDCARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\{?-(script|style|link|meta)\}\}\}?").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<@(script|style|link|meta):([0-9]+)>").unwrap());

/// Output of the value sweep: template text interleaved with substituted
/// values.
#[derive(Debug, Default)]
pub(crate) struct Substituted {
    parts: Vec<Part>,
}

#[derive(Debug)]
enum Part {
    Template(String),
    Value(String),
}

impl Substituted {
    fn push_template(&mut self, text: &str) {
        if let Some(Part::Template(last)) = self.parts.last_mut() {
            last.push_str(text);
        } else if !text.is_empty() {
            self.parts.push(Part::Template(text.to_owned()));
        }
    }

    fn push_value(&mut self, value: String) {
        self.parts.push(Part::Value(value));
    }

    /// Join all parts back into one string.
    pub(crate) fn into_string(self) -> String {
        self.parts
            .into_iter()
            .map(|part| match part {
                Part::Template(text) | Part::Value(text) => text,
            })
            .collect()
    }
}

impl From<&str> for Substituted {
    fn from(text: &str) -> Self {
        let mut substituted = Self::default();
        substituted.push_template(text);
        substituted
    }
}

/// Resolve value, attribute and include placeholders.
///
/// `include` renders the template at a relative path; `None` leaves the
/// placeholder in place, as does a name missing from `ctx`.
pub(crate) fn values(
    skeleton: &str,
    ctx: &RenderContext,
    include: &dyn Fn(&str) -> Option<String>,
) -> Substituted {
    let mut out = Substituted::default();
    let mut last = 0;
    for caps in VALUE_RE.captures_iter(skeleton) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_template(&skeleton[last..whole.start()]);
        let (expr, escaped) = match (caps.get(1), caps.get(2)) {
            (Some(raw), _) => (raw.as_str(), false),
            (None, Some(esc)) => (esc.as_str(), true),
            (None, None) => ("", true),
        };
        match resolve(expr.trim(), escaped, ctx, include) {
            Some(value) => out.push_value(value),
            None => out.push_template(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_template(&skeleton[last..]);
    out
}

fn resolve(
    expr: &str,
    escaped: bool,
    ctx: &RenderContext,
    include: &dyn Fn(&str) -> Option<String>,
) -> Option<String> {
    let escape = |text: String| if escaped { escape_html(&text) } else { text };

    if expr.is_empty() || expr.starts_with('-') {
        return None;
    }
    if let Some(path) = expr.strip_prefix('#') {
        return include(path.trim()).map(escape);
    }
    if let Some((attr, name, quote)) = attribute_assignment(expr) {
        let value = escape(ctx.resolve(name)?);
        return Some(format!("{attr}={quote}{}{quote}", escape_attr(&value)));
    }
    ctx.resolve(expr).map(escape)
}

/// Split `attr="name"`, `attr='name'` or `attr=name`.
fn attribute_assignment(expr: &str) -> Option<(&str, &str, char)> {
    let (attr, rest) = expr.split_once('=')?;
    let attr = attr.trim();
    if attr.is_empty()
        || !attr
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '-'))
    {
        return None;
    }

    let rest = rest.trim();
    let (name, quote) = match rest.chars().next()? {
        quote @ ('"' | '\'') => (rest.strip_prefix(quote)?.strip_suffix(quote)?, quote),
        _ => (rest, '"'),
    };
    let name = name.trim();
    (!name.is_empty()).then_some((attr, name, quote))
}

/// Reinsert extracted tags into the template parts of `html`.
///
/// Each `{{-kind}}` emits every tag of that kind and marks the kind spent.
/// `<@kind:N>` emits tag N once. Spent kinds, reused indices and indices
/// out of range resolve to nothing.
pub(crate) fn reinsert_tags(html: Substituted, tags: &TagTable, nonce: Option<&Nonce>) -> io::Result<String> {
    let mut spent = [false; 4];
    let mut used: HashSet<(TagKind, usize)> = HashSet::new();
    let mut parts = html.parts;

    for part in &mut parts {
        if let Part::Template(text) = part {
            *text = wildcards(text, tags, nonce, &mut spent)?;
        }
    }
    for part in &mut parts {
        if let Part::Template(text) = part {
            *text = positional(text, tags, nonce, &spent, &mut used)?;
        }
    }

    Ok(Substituted { parts }.into_string())
}

fn wildcards(text: &str, tags: &TagTable, nonce: Option<&Nonce>, spent: &mut [bool; 4]) -> io::Result<String> {
    try_replace_all(&WILDCARD_RE, text, |caps| {
        let Ok(kind) = caps[1].parse::<TagKind>() else {
            return Ok(String::new());
        };
        if std::mem::replace(&mut spent[kind.index()], true) {
            return Ok(String::new());
        }
        let all = tags
            .entries(kind)
            .iter()
            .map(|bytes| bytes.decompress().map(|tag| with_nonce(&tag, kind, nonce)))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(all.join("\n"))
    })
}

fn positional(
    text: &str,
    tags: &TagTable,
    nonce: Option<&Nonce>,
    spent: &[bool; 4],
    used: &mut HashSet<(TagKind, usize)>,
) -> io::Result<String> {
    try_replace_all(&TAG_RE, text, |caps| {
        let (Ok(kind), Ok(index)) = (caps[1].parse::<TagKind>(), caps[2].parse::<usize>()) else {
            return Ok(String::new());
        };
        if spent[kind.index()] || !used.insert((kind, index)) {
            return Ok(String::new());
        }
        match tags.get(kind, index) {
            Some(bytes) => Ok(with_nonce(&bytes.decompress()?, kind, nonce)),
            None => Ok(String::new()),
        }
    })
}

fn try_replace_all<F>(re: &Regex, text: &str, mut replace: F) -> io::Result<String>
where
    F: FnMut(&Captures) -> io::Result<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replace(&caps)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn with_nonce(tag: &str, kind: TagKind, nonce: Option<&Nonce>) -> String {
    match nonce.and_then(|n| n.for_kind(kind)) {
        Some(value) => insert_nonce(tag, value),
        None => tag.to_owned(),
    }
}

/// Add `nonce="..."` to the opening tag of `tag`.
fn insert_nonce(tag: &str, nonce: &str) -> String {
    let Some(end) = open_tag_end(tag) else {
        return tag.to_owned();
    };
    let head = tag[..end].trim_end();
    if head.to_ascii_lowercase().contains(" nonce=") {
        return tag.to_owned();
    }
    let (head, slash) = match head.strip_suffix('/') {
        Some(head) => (head.trim_end(), " /"),
        None => (head, ""),
    };
    format!("{head} nonce=\"{}\"{slash}{}", escape_attr(nonce), &tag[end..])
}

/// Byte offset of the `>` closing the first tag, skipping quoted values.
fn open_tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in tag.char_indices().skip(1) {
        match (quote, c) {
            _ if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}
