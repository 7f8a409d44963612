//! CLI command implementations.

pub(crate) mod compile;
pub(crate) mod render;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use imdl_compiler::{CompileOptions, TagKind};
use imdl_config::{CliSettings, Config, Lifetime, NonceConfig};
use imdl_engine::{Engine, EngineConfig, Nonce};
use imdl_storage::{FsStorage, Storage};

use crate::error::CliError;

pub(crate) use compile::CompileArgs;
pub(crate) use render::RenderArgs;

/// Flags shared by every command.
#[derive(Args)]
pub(crate) struct CommonArgs {
    /// Path to configuration file (default: auto-discover imdl.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template directory (overrides config).
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Layout template (overrides config).
    #[arg(short, long)]
    layout: Option<String>,

    /// Bypass the compiled template cache.
    #[arg(long)]
    no_cache: bool,

    /// Cache TTL, e.g. "30m" or -1 for never (overrides config).
    #[arg(long, allow_hyphen_values = true)]
    cache_ttl: Option<Lifetime>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Load configuration with these flags applied.
    pub(crate) fn load_config(&self, no_layout: bool) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            template_dir: self.dir.clone(),
            layout: self.layout.clone(),
            cache_enabled: self.no_cache.then_some(false),
            cache_ttl: self.cache_ttl,
            no_layout: no_layout.then_some(true),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Create an engine reading templates from the configured directory.
pub(crate) fn build_engine(config: &Config) -> Result<Engine, CliError> {
    let templates = &config.templates_resolved;
    tracing::debug!(
        dir = %templates.dir.display(),
        extension = %templates.extension,
        config = ?config.config_path,
        "Loading templates"
    );
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(templates.dir.clone(), templates.extension.clone()));
    Ok(Engine::new(storage, engine_config(config)?))
}

fn engine_config(config: &Config) -> Result<EngineConfig, CliError> {
    let templates = &config.templates_resolved;
    let cache = &config.cache_resolved;

    Ok(EngineConfig {
        root: templates.dir.clone(),
        extension: templates.extension.clone(),
        layout: templates.layout.clone(),
        ttl: cache.ttl.as_duration(),
        sweep_interval: cache.sweep_interval.as_duration(),
        cache_enabled: cache.enabled,
        nonce: config.render.nonce.as_ref().map(nonce).transpose()?,
        no_layout: config.render.no_layout,
        compile: CompileOptions {
            assets_url: templates.assets_url.clone(),
            ..CompileOptions::default()
        },
        ..EngineConfig::default()
    })
}

fn nonce(config: &NonceConfig) -> Result<Nonce, CliError> {
    match config {
        NonceConfig::Single(value) => Ok(Nonce::Single(value.clone())),
        NonceConfig::PerKind(map) => {
            let map = map
                .iter()
                .map(|(kind, value)| Ok::<_, CliError>((kind.parse::<TagKind>()?, value.clone())))
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            Ok(Nonce::PerKind(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_single_nonce() {
        let nonce = nonce(&NonceConfig::Single("abc".to_owned())).unwrap();

        assert_eq!(nonce, Nonce::Single("abc".to_owned()));
    }

    #[test]
    fn test_per_kind_nonce() {
        let config = NonceConfig::PerKind(BTreeMap::from([
            ("script".to_owned(), "a".to_owned()),
            ("Style".to_owned(), "b".to_owned()),
        ]));

        let nonce = nonce(&config).unwrap();

        assert_eq!(
            nonce,
            Nonce::PerKind(BTreeMap::from([
                (TagKind::Script, "a".to_owned()),
                (TagKind::Style, "b".to_owned()),
            ]))
        );
    }

    #[test]
    fn test_unknown_nonce_kind() {
        let config = NonceConfig::PerKind(BTreeMap::from([("img".to_owned(), "a".to_owned())]));

        assert!(matches!(nonce(&config), Err(CliError::TagKind(_))));
    }

    #[test]
    fn test_engine_config_from_defaults() {
        let config = Config::default();

        let engine = engine_config(&config).unwrap();

        assert_eq!(engine.extension, "imdl");
        assert_eq!(engine.ttl, Some(Duration::from_secs(2 * 60 * 60)));
        assert_eq!(engine.sweep_interval, Some(Duration::from_secs(10 * 60)));
        assert!(engine.cache_enabled);
        assert!(engine.nonce.is_none());
    }
}
