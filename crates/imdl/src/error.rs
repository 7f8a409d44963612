//! CLI error types.

use imdl_compiler::UnknownTagKind;
use imdl_config::ConfigError;
use imdl_engine::RenderError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid context JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid nonce table: {0}")]
    TagKind(#[from] UnknownTagKind),

    #[error("{0}")]
    Validation(String),
}
