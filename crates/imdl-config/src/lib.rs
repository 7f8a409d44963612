//! Configuration for the IMDL engine.
//!
//! Parses `imdl.toml` with serde and searches the current directory and its
//! parents when no file is given explicitly. [`CliSettings`] override file
//! values after loading.
//!
//! ```toml
//! [templates]
//! dir = "views"
//! extension = "imdl"
//! layout = "layout"
//!
//! [cache]
//! enabled = true
//! ttl = "2h"
//! sweep_interval = "10m"
//!
//! [render]
//! nonce = "abc123"
//! ```

mod duration;
mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use duration::Lifetime;
use duration::DurationValue;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "imdl.toml";

const DEFAULT_DIR: &str = "views";
const DEFAULT_EXTENSION: &str = "imdl";
const DEFAULT_TTL: Lifetime = Lifetime::Finite(Duration::from_secs(2 * 60 * 60));
const DEFAULT_SWEEP_INTERVAL: Lifetime = Lifetime::Finite(Duration::from_secs(10 * 60));

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override template root directory.
    pub template_dir: Option<PathBuf>,
    /// Override layout template.
    pub layout: Option<String>,
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override cache TTL.
    pub cache_ttl: Option<Lifetime>,
    /// Skip layout wrapping.
    pub no_layout: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    templates: TemplatesConfigRaw,
    cache: CacheConfigRaw,
    /// Render-time options.
    pub render: RenderConfig,

    /// Resolved template configuration (set after loading).
    #[serde(skip)]
    pub templates_resolved: TemplatesConfig,
    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplatesConfigRaw {
    dir: Option<String>,
    extension: Option<String>,
    #[serde(alias = "template", alias = "temp")]
    layout: Option<String>,
    assets_url: Option<String>,
}

/// Where templates live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatesConfig {
    /// Template root directory.
    pub dir: PathBuf,
    /// File extension without the dot.
    pub extension: String,
    /// Logical id of the layout template, if any.
    pub layout: Option<String>,
    /// Base URL serving the bundled client scripts. Inlined when unset.
    pub assets_url: Option<String>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DIR),
            extension: DEFAULT_EXTENSION.to_owned(),
            layout: None,
            assets_url: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    ttl: Option<DurationValue>,
    sweep_interval: Option<DurationValue>,
}

/// Compiled template cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// `false` bypasses the cache entirely (development mode).
    pub enabled: bool,
    /// Sliding time-to-live of an entry.
    pub ttl: Lifetime,
    /// How often expired entries are swept. `Forever` disables the sweeper.
    pub sweep_interval: Lifetime,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Render-time options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Nonce added to reinserted tags.
    pub nonce: Option<NonceConfig>,
    /// Never wrap output in the layout.
    pub no_layout: bool,
}

/// Nonce as written in TOML.
///
/// A single string applies to `<script>` tags only; a table sets a nonce per
/// tag kind (`script`, `style`, `link`, `meta`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NonceConfig {
    /// Nonce for scripts.
    Single(String),
    /// Nonce per tag kind.
    PerKind(BTreeMap<String, String>),
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Malformed duration where one is required.
    #[error("Invalid duration: {0:?}")]
    Duration(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path.
        field: String,
        /// Error message.
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `imdl.toml` in the current directory and its parents, falling back
    /// to defaults relative to the current directory.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(dir) = &settings.template_dir {
            self.templates_resolved.dir.clone_from(dir);
        }
        if let Some(layout) = &settings.layout {
            self.templates_resolved.layout = Some(layout.clone());
        }
        if let Some(enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = enabled;
        }
        if let Some(ttl) = settings.cache_ttl {
            self.cache_resolved.ttl = ttl;
        }
        if let Some(no_layout) = settings.no_layout {
            self.render.no_layout = no_layout;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Default config with the template root relative to `base`.
    fn default_with_base(base: &Path) -> Self {
        Self {
            templates: TemplatesConfigRaw::default(),
            cache: CacheConfigRaw::default(),
            render: RenderConfig::default(),
            templates_resolved: TemplatesConfig {
                dir: base.join(DEFAULT_DIR),
                ..TemplatesConfig::default()
            },
            cache_resolved: CacheConfig::default(),
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir)?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Resolve raw values: expand and anchor paths, parse durations.
    fn resolve(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let dir = match self.templates.dir.as_deref() {
            Some(dir) => expand::expand_path(dir, "templates.dir")?,
            None => DEFAULT_DIR.to_owned(),
        };

        self.templates_resolved = TemplatesConfig {
            dir: config_dir.join(dir),
            extension: self
                .templates
                .extension
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned()),
            layout: self.templates.layout.clone(),
            assets_url: self.templates.assets_url.clone(),
        };

        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            ttl: self
                .cache
                .ttl
                .as_ref()
                .map_or(DEFAULT_TTL, |v| v.resolve(DEFAULT_TTL)),
            sweep_interval: self
                .cache
                .sweep_interval
                .as_ref()
                .map_or(DEFAULT_SWEEP_INTERVAL, |v| v.resolve(DEFAULT_SWEEP_INTERVAL)),
        };

        Ok(())
    }

    /// Validate resolved values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.templates_resolved.extension;
        if ext.is_empty() {
            return Err(ConfigError::Validation(
                "templates.extension cannot be empty".to_owned(),
            ));
        }
        if ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "templates.extension must be a bare extension, got {ext:?}"
            )));
        }
        if let Some(layout) = &self.templates_resolved.layout
            && layout.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "templates.layout cannot be empty".to_owned(),
            ));
        }
        if self.cache_resolved.sweep_interval == Lifetime::Finite(Duration::ZERO) {
            return Err(ConfigError::Validation(
                "cache.sweep_interval cannot be 0".to_owned(),
            ));
        }
        Ok(())
    }
}
