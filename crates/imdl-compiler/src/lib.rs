//! IMDL to HTML compiler.
//!
//! Compilation runs three steps over the template source:
//!
//! 1. [`normalize`]: expand shorthand entities and strip comments
//! 2. tag extraction: move `<script>`, `<style>`, `<link>` and `<meta>`
//!    elements into a [`TagTable`], leaving `<@kind:N>` placeholders
//! 3. [`transform`]: compile the markdown-like shorthand
//!
//! The result is a [`CompiledArtifact`]: the compressed HTML skeleton with
//! render-time placeholders (`{{name}}`, `{{-script}}`, `<@script:1>`) still
//! in place, plus the tag table.
//!
//! # Example
//!
//! ```
//! use imdl_compiler::{CompileOptions, TagKind, compile};
//!
//! let artifact = compile("# Hello {{name}}\n<script>go()</script>", &CompileOptions::default()).unwrap();
//!
//! assert_eq!(artifact.skeleton().unwrap(), "<h1>Hello {{name}}</h1>\n<@script:1>");
//! assert_eq!(artifact.tags.count(TagKind::Script), 1);
//! ```

mod artifact;
mod escape;
mod extract;
mod markdown;
mod normalize;

use std::io;

pub use artifact::{CompiledArtifact, CompressedBytes, TagKind, TagTable, UnknownTagKind};
pub use escape::{escape_attr, escape_html, unescape_html};
pub use extract::{Attributes, TagHook, TagHooks};
pub use markdown::{Include, Transformed, transform};
pub use normalize::{expand_entities, normalize, strip_comments};

/// Options for [`compile`].
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Per-kind rewrite hooks applied to extracted tags.
    pub hooks: TagHooks,
    /// Base URL serving bundled scripts. When unset, scripts are inlined.
    pub assets_url: Option<String>,
}

/// Compilation error.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("failed to compress compiled output: {0}")]
    Compress(#[from] io::Error),
}

/// Compile template source into an artifact.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompiledArtifact, CompileError> {
    let normalized = normalize(source);
    let mut tags = TagTable::new();
    let skeleton = extract::extract(&normalized, &options.hooks, &mut tags)?;
    let Transformed { mut html, includes } = transform(&skeleton);

    for include in includes {
        let element = include_element(include, options.assets_url.as_deref());
        let index = tags.push(TagKind::Script, &element)?;
        insert_placeholder(&mut html, &TagKind::Script.placeholder(index));
    }

    tracing::debug!(
        bytes = html.len(),
        scripts = tags.count(TagKind::Script),
        styles = tags.count(TagKind::Style),
        links = tags.count(TagKind::Link),
        metas = tags.count(TagKind::Meta),
        "Compiled template"
    );

    Ok(CompiledArtifact {
        html: CompressedBytes::compress(&html)?,
        tags,
    })
}

fn include_element(include: Include, assets_url: Option<&str>) -> String {
    match assets_url {
        Some(url) => format!(
            "<script src=\"{}/{}\"></script>",
            url.trim_end_matches('/'),
            include.file_name()
        ),
        None => format!("<script>{}</script>", include.source()),
    }
}

/// Insert before a trailing `</html>`, or append.
fn insert_placeholder(html: &mut String, placeholder: &str) {
    if html.trim_end().ends_with("</html>")
        && let Some(at) = html.rfind("</html>")
    {
        html.insert_str(at, &format!("{placeholder}\n"));
        return;
    }
    if !html.is_empty() && !html.ends_with('\n') {
        html.push('\n');
    }
    html.push_str(placeholder);
}
