//! Source rewrite hooks run around compilation and rendering.

use std::fmt;
use std::sync::Arc;

use crate::context::RenderContext;

/// Rewrites template text. Returning `None` leaves the text unchanged.
pub type SourceHook = Arc<dyn Fn(&str, &RenderContext) -> Option<String> + Send + Sync>;

/// Optional hooks applied by the engine.
///
/// - `before_compile` sees raw source on a cache miss, with the context of
///   the render that triggered compilation.
/// - `before_render` sees the decompressed skeleton on every render.
/// - `after_render` sees the final HTML, after layout wrapping.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_compile: Option<SourceHook>,
    pub before_render: Option<SourceHook>,
    pub after_render: Option<SourceHook>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_before_compile<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &RenderContext) -> Option<String> + Send + Sync + 'static,
    {
        self.before_compile = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_before_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &RenderContext) -> Option<String> + Send + Sync + 'static,
    {
        self.before_render = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_after_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &RenderContext) -> Option<String> + Send + Sync + 'static,
    {
        self.after_render = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_compile", &self.before_compile.is_some())
            .field("before_render", &self.before_render.is_some())
            .field("after_render", &self.after_render.is_some())
            .finish()
    }
}

/// Run `hook` over `text`, if set.
pub(crate) fn apply(hook: Option<&SourceHook>, text: String, ctx: &RenderContext) -> String {
    match hook {
        Some(hook) => hook(&text, ctx).unwrap_or(text),
        None => text,
    }
}
