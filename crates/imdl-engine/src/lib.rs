//! IMDL template engine.
//!
//! Ties the compiler, the compiled template cache and a [`Storage`] backend
//! together. [`Engine::render`] compiles a template on first use (or serves
//! the cached artifact), then substitutes placeholders against a
//! [`RenderContext`]:
//!
//! - `{{name}}` / `{{{name}}}`: escaped / raw value
//! - `{{attr="name"}}`: `attr="value"` with the value quote-escaped
//! - `{{#path}}` / `{{{#path}}}`: another template, rendered without layout
//! - `{{-script}}`, `<@script:1>`: extracted tags put back
//!
//! Unresolved placeholders stay in the output untouched.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use imdl_engine::{Engine, EngineConfig, RenderContext};
//! use imdl_storage::MockStorage;
//!
//! let storage = Arc::new(MockStorage::new().with_template("hello", "# Hello {{name}}"));
//! let engine = Engine::new(storage, EngineConfig::default());
//!
//! let html = engine.render("hello", &RenderContext::new().with("name", "World")).unwrap();
//! assert_eq!(html, "<h1>Hello World</h1>");
//! ```
//!
//! [`Storage`]: imdl_storage::Storage

mod context;
mod engine;
mod error;
mod hooks;
mod substitute;
mod watch;

pub use context::{ContextValue, LazyValue, Nonce, RenderContext};
pub use engine::{Engine, EngineConfig};
pub use error::RenderError;
pub use hooks::{Hooks, SourceHook};
pub use watch::TemplateWatcher;
