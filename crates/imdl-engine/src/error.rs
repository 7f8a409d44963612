//! Render error types.

use std::io;

use imdl_compiler::CompileError;
use imdl_storage::StorageError;

/// Error returned by [`Engine`](crate::Engine) compile and render calls.
///
/// Unresolved placeholders and values that fail to parse as JSON are not
/// errors: both leave text in the output.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Template does not exist, or is cached as known absent.
    #[error("Template not found: {id}")]
    NotFound {
        /// Logical id of the template.
        id: String,
    },
    /// Reading the template source failed for a reason other than absence.
    #[error("Failed to read template {id}: {source}")]
    Read {
        /// Logical id of the template.
        id: String,
        #[source]
        source: StorageError,
    },
    /// Cached artifact failed to decompress.
    #[error("Compiled template {id} is corrupt: {source}")]
    Corrupt {
        /// Logical id of the template.
        id: String,
        #[source]
        source: io::Error,
    },
    /// Compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Change watching could not be started.
    #[error("Failed to watch templates: {0}")]
    Watch(#[source] StorageError),
}

impl RenderError {
    /// Whether the template is missing or known absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
