//! Media embed shorthand: `![type](src1\nsrc2){attrs}`.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Include;

static MEDIA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\[\]\n]*)\]\(([^()]*)\)(?:\{([^{}\n]*)\})?").unwrap());
static EXTENSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.(\w+)(?:[?#].*)?$").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Image,
    Video,
    Audio,
    Frame,
}

impl Family {
    fn classify(kind: &str) -> Option<Self> {
        match kind {
            "img" | "image" | "png" | "jpg" | "jpeg" | "svg" | "gif" | "ico" | "webp" => Some(Self::Image),
            "vid" | "video" | "mp4" | "wav" => Some(Self::Video),
            "audio" | "sound" | "mp3" | "ogg" => Some(Self::Audio),
            "iframe" | "embed" | "pdf" => Some(Self::Frame),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Image => "img",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Frame => "iframe",
        }
    }

    fn mime_prefix(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Frame => "application",
        }
    }

    /// MIME type for `src`, inferred from its extension or the declared kind.
    fn mime(self, src: &str, kind: &str) -> Option<String> {
        let ext = EXTENSION_RE
            .captures(src)
            .map_or_else(|| kind.to_owned(), |caps| caps[1].to_ascii_lowercase());
        let subtype = match (self, ext.as_str()) {
            (_, "img" | "image" | "vid" | "video" | "audio" | "sound") => return None,
            (Self::Image, "jpg") => "jpeg",
            (Self::Image, "svg") => "svg+xml",
            (Self::Image, "ico") => "x-icon",
            (Self::Audio, "mp3") => "mpeg",
            (_, other) => other,
        };
        Some(format!("{}/{subtype}", self.mime_prefix()))
    }
}

/// Expand embed shorthand. Multi-source frames register the fallback script.
pub(crate) fn embeds(text: &str, includes: &mut BTreeSet<Include>) -> String {
    MEDIA_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let kind = caps[1].trim().to_ascii_lowercase();
            let sources: Vec<String> = caps[2]
                .split('\n')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.replace('"', "&quot;"))
                .collect();
            let (Some(family), false) = (Family::classify(&kind), sources.is_empty()) else {
                return caps[0].to_owned();
            };
            let attrs = caps
                .get(3)
                .map(|m| m.as_str().trim())
                .filter(|a| !a.is_empty())
                .map(|a| format!(" {a}"))
                .unwrap_or_default();
            render(family, &kind, &sources, &attrs, includes)
        })
        .into_owned()
}

fn render(family: Family, kind: &str, sources: &[String], attrs: &str, includes: &mut BTreeSet<Include>) -> String {
    let tag = family.tag();
    if let [src] = sources {
        return match family {
            Family::Image => format!("<img src=\"{src}\"{attrs}>"),
            _ => format!("<{tag} src=\"{src}\"{attrs}></{tag}>"),
        };
    }

    match family {
        Family::Image => {
            let mut out = String::from("<picture>");
            for src in sources {
                let _ = write!(out, "<source srcset=\"{src}\"{}>", type_attr(family, src, kind));
            }
            if let Some(last) = sources.last() {
                let _ = write!(out, "<img src=\"{last}\"{attrs}>");
            }
            out.push_str("</picture>");
            out
        }
        Family::Video | Family::Audio => {
            let mut out = format!("<{tag}{attrs}>");
            for src in sources {
                let _ = write!(out, "<source src=\"{src}\"{}>", type_attr(family, src, kind));
            }
            let _ = write!(out, "</{tag}>");
            out
        }
        Family::Frame => {
            includes.insert(Include::IframeFallback);
            let fallbacks = serde_json::Value::from(sources[1..].to_vec())
                .to_string()
                .replace('\'', "&#39;");
            format!(
                "<iframe src=\"{}\" srcFallback=\"0\" srcFallbackList='{fallbacks}'{attrs}></iframe>",
                sources[0]
            )
        }
    }
}

fn type_attr(family: Family, src: &str, kind: &str) -> String {
    family
        .mime(src, kind)
        .map(|mime| format!(" type=\"{mime}\""))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(text: &str) -> (String, BTreeSet<Include>) {
        let mut includes = BTreeSet::new();
        let html = embeds(text, &mut includes);
        (html, includes)
    }

    #[test]
    fn test_single_image() {
        let (html, includes) = run("![img](/a.png){alt=\"A\"}");

        assert_eq!(html, "<img src=\"/a.png\" alt=\"A\">");
        assert!(includes.is_empty());
    }

    #[test]
    fn test_picture_sources() {
        let (html, _) = run("![image](/a.webp\n/a.jpg)");

        assert_eq!(
            html,
            "<picture><source srcset=\"/a.webp\" type=\"image/webp\">\
             <source srcset=\"/a.jpg\" type=\"image/jpeg\">\
             <img src=\"/a.jpg\"></picture>"
        );
    }

    #[test]
    fn test_video_sources_without_direct_src() {
        let (html, _) = run("![video](/v.webm\n/v.mp4){controls}");

        assert_eq!(
            html,
            "<video controls><source src=\"/v.webm\" type=\"video/webm\">\
             <source src=\"/v.mp4\" type=\"video/mp4\"></video>"
        );
    }

    #[test]
    fn test_single_audio() {
        let (html, _) = run("![mp3](/s.mp3)");

        assert_eq!(html, "<audio src=\"/s.mp3\"></audio>");
    }

    #[test]
    fn test_audio_mime() {
        let (html, _) = run("![audio](/s.mp3\n/s.ogg)");

        assert_eq!(
            html,
            "<audio><source src=\"/s.mp3\" type=\"audio/mpeg\"><source src=\"/s.ogg\" type=\"audio/ogg\"></audio>"
        );
    }

    #[test]
    fn test_frame_fallback_list() {
        let (html, includes) = run("![iframe](https://a.example\nhttps://b.example\nhttps://c.example)");

        assert_eq!(
            html,
            "<iframe src=\"https://a.example\" srcFallback=\"0\" \
             srcFallbackList='[\"https://b.example\",\"https://c.example\"]'></iframe>"
        );
        assert!(includes.contains(&Include::IframeFallback));
    }

    #[test]
    fn test_single_frame_needs_no_script() {
        let (html, includes) = run("![pdf](/doc.pdf)");

        assert_eq!(html, "<iframe src=\"/doc.pdf\"></iframe>");
        assert!(includes.is_empty());
    }

    #[test]
    fn test_unknown_family_untouched() {
        let text = "![chart](/c.xyz)";

        assert_eq!(run(text).0, text);
    }

    #[test]
    fn test_quotes_escaped_in_sources() {
        let (html, _) = run("![img](/a\"b.png)");

        assert_eq!(html, "<img src=\"/a&quot;b.png\">");
    }
}
