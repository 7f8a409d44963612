//! Compile and render orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use imdl_cache::{Lookup, SweeperHandle, TemplateCache, spawn_sweeper};
use imdl_compiler::{CompileOptions, CompiledArtifact};
use imdl_storage::{Storage, logical_id};
use serde_json::Value;

use crate::context::{ContextValue, Nonce, RenderContext};
use crate::error::RenderError;
use crate::hooks::{self, Hooks};
use crate::substitute;
use crate::watch::{self, TemplateWatcher};

/// Maximum nesting of `{{#include}}` placeholders.
const MAX_INCLUDE_DEPTH: usize = 32;

const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Configuration for [`Engine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Template root, stripped from paths passed to the engine.
    pub root: PathBuf,
    /// Template file extension without the dot.
    pub extension: String,
    /// Logical id of the layout template.
    pub layout: Option<String>,
    /// Sliding cache TTL. `None` never expires.
    pub ttl: Option<Duration>,
    /// Sweep interval. `None` disables the background sweeper.
    pub sweep_interval: Option<Duration>,
    /// `false` starts in development mode (cache bypassed).
    pub cache_enabled: bool,
    /// Nonce for reinserted tags, unless the context sets one.
    pub nonce: Option<Nonce>,
    /// Never wrap output in the layout.
    pub no_layout: bool,
    /// Compiler options, including per-kind tag hooks.
    pub compile: CompileOptions,
    pub hooks: Hooks,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            extension: "imdl".to_owned(),
            layout: None,
            ttl: Some(DEFAULT_TTL),
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            cache_enabled: true,
            nonce: None,
            no_layout: false,
            compile: CompileOptions::default(),
            hooks: Hooks::default(),
        }
    }
}

/// Template engine.
///
/// Owns the compiled template cache and reads sources through a [`Storage`]
/// backend. Safe to share across threads: every render decompresses its own
/// copy of the artifact, so renders never observe each other's state.
///
/// # Example
///
/// ```ignore
/// let engine = Engine::new(Arc::new(FsStorage::new("views", "imdl")), EngineConfig::default());
/// let html = engine.render("index", &RenderContext::new().with("name", "World"))?;
/// ```
pub struct Engine {
    storage: Arc<dyn Storage>,
    cache: Arc<TemplateCache<CompiledArtifact>>,
    config: EngineConfig,
    _sweeper: Option<SweeperHandle>,
}

impl Engine {
    /// Create an engine. Starts the cache sweeper when both a TTL and a sweep
    /// interval are configured.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        let cache = Arc::new(TemplateCache::new(config.ttl));
        cache.set_enabled(config.cache_enabled);

        let sweeper = match (config.ttl, config.sweep_interval) {
            (Some(_), Some(interval)) => Some(spawn_sweeper(&cache, interval)),
            _ => None,
        };

        Self {
            storage,
            cache,
            config,
            _sweeper: sweeper,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The compiled template cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<TemplateCache<CompiledArtifact>> {
        &self.cache
    }

    /// Logical id of `path`: root, leading separators and extension stripped.
    #[must_use]
    pub fn template_id(&self, path: &str) -> String {
        logical_id(path, &self.config.root, &self.config.extension)
    }

    /// Compile `path`, or return the cached artifact.
    ///
    /// A failed read is cached as known absent, so later calls return
    /// [`RenderError::NotFound`] without touching storage until the entry
    /// is invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotFound`] if the template is missing and
    /// [`RenderError::Read`] if reading it fails otherwise.
    pub fn compile(&self, path: &str, ctx: &RenderContext) -> Result<Arc<CompiledArtifact>, RenderError> {
        self.compile_id(&self.template_id(path), ctx)
    }

    /// Render `path`, wrapped in the layout unless suppressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the template or its layout cannot be compiled.
    pub fn render(&self, path: &str, ctx: &RenderContext) -> Result<String, RenderError> {
        self.render_id(&self.template_id(path), ctx, false, 0)
    }

    /// Render `path` and hand the result to `callback`.
    pub fn render_into<F>(&self, path: &str, ctx: &RenderContext, callback: F)
    where
        F: FnOnce(Result<String, RenderError>),
    {
        callback(self.render(path, ctx));
    }

    /// Render `path`, logging failures instead of returning them.
    #[must_use]
    pub fn render_opt(&self, path: &str, ctx: &RenderContext) -> Option<String> {
        match self.render(path, ctx) {
            Ok(html) => Some(html),
            Err(err) => {
                tracing::warn!(path, error = %err, "Render failed");
                None
            }
        }
    }

    /// Render `path`, optionally skipping the layout. Failures give `None`.
    #[must_use]
    pub fn get(&self, path: &str, ctx: &RenderContext, skip_layout: bool) -> Option<String> {
        self.render_id(&self.template_id(path), ctx, skip_layout, 0)
            .inspect_err(|err| tracing::debug!(path, error = %err, "Template unavailable"))
            .ok()
    }

    /// Drop the cache entry for `path`. Returns whether one existed.
    pub fn invalidate(&self, path: &str) -> bool {
        self.cache.invalidate(&self.template_id(path))
    }

    /// Drop every cache entry.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    /// In development mode the cache is bypassed, so every render re-reads
    /// and recompiles its templates.
    pub fn set_development(&self, development: bool) {
        self.cache.set_enabled(!development);
        tracing::info!(development, "Cache mode changed");
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        !self.cache.is_enabled()
    }

    /// Invalidate cache entries as the storage reports template changes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Watch`] if the storage cannot start watching.
    pub fn watch(&self) -> Result<TemplateWatcher, RenderError> {
        watch::spawn(self.storage.as_ref(), &self.cache).map_err(RenderError::Watch)
    }

    fn compile_id(&self, id: &str, ctx: &RenderContext) -> Result<Arc<CompiledArtifact>, RenderError> {
        match self.cache.get(id) {
            Lookup::Hit(artifact) => return Ok(artifact),
            Lookup::Absent => return Err(RenderError::NotFound { id: id.to_owned() }),
            Lookup::Miss => {}
        }

        let source = match self.storage.read(id) {
            Ok(source) => source,
            Err(err) => {
                self.cache.insert_absent(id);
                return Err(if err.is_not_found() {
                    RenderError::NotFound { id: id.to_owned() }
                } else {
                    RenderError::Read {
                        id: id.to_owned(),
                        source: err,
                    }
                });
            }
        };

        let source = hooks::apply(self.config.hooks.before_compile.as_ref(), source, ctx);
        let artifact = imdl_compiler::compile(&source, &self.config.compile)?;
        tracing::debug!(id, "Template compiled");

        Ok(self.cache.insert(id, artifact))
    }

    fn render_id(
        &self,
        id: &str,
        ctx: &RenderContext,
        skip_layout: bool,
        depth: usize,
    ) -> Result<String, RenderError> {
        let artifact = self.compile_id(id, ctx)?;
        let skeleton = artifact.html.decompress().map_err(|source| RenderError::Corrupt {
            id: id.to_owned(),
            source,
        })?;
        let skeleton = hooks::apply(self.config.hooks.before_render.as_ref(), skeleton, ctx);

        let include = |path: &str| self.render_include(path, ctx, depth);
        let html = substitute::values(&skeleton, ctx, &include);

        let nonce = ctx.nonce().or(self.config.nonce.as_ref());
        let mut html = substitute::reinsert_tags(html, &artifact.tags, nonce).map_err(|source| {
            RenderError::Corrupt {
                id: id.to_owned(),
                source,
            }
        })?;

        if !skip_layout
            && !ctx.no_layout()
            && !self.config.no_layout
            && let Some(layout) = &self.config.layout
        {
            html = self.render_layout(layout, html, ctx, depth)?;
        }

        Ok(hooks::apply(self.config.hooks.after_render.as_ref(), html, ctx))
    }

    fn render_layout(
        &self,
        layout: &str,
        body: String,
        ctx: &RenderContext,
        depth: usize,
    ) -> Result<String, RenderError> {
        let mut layout_ctx = ctx.clone();
        if !layout_ctx.contains("body") {
            layout_ctx.set("body", ContextValue::Literal(Value::String(body)));
        }
        self.render_id(&self.template_id(layout), &layout_ctx, true, depth)
    }

    fn render_include(&self, path: &str, ctx: &RenderContext, depth: usize) -> Option<String> {
        if depth >= MAX_INCLUDE_DEPTH {
            tracing::warn!(path, depth, "Include depth exceeded, leaving placeholder");
            return None;
        }
        match self.render_id(&self.template_id(path), ctx, true, depth + 1) {
            Ok(html) => Some(html),
            Err(err) => {
                tracing::warn!(path, error = %err, "Include failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
