//! Template source storage for the IMDL engine.
//!
//! The compiler never touches the filesystem directly. It asks a [`Storage`]
//! backend for the source text of a template by its *logical id* (the path
//! relative to the template root, without extension) and optionally subscribes
//! to change notifications keyed by the same id.
//!
//! - [`Storage`] trait with `read()`, `exists()` and `watch()`
//! - [`FsStorage`] reading `{root}/{id}.{extension}` with notify-based watching
//! - [`MockStorage`] for tests (behind the `mock` feature flag)
//! - [`logical_id`] shared by lookups and change events
//!
//! # Example
//!
//! ```ignore
//! use imdl_storage::{FsStorage, Storage};
//!
//! let storage = FsStorage::new("views".into(), "imdl");
//! let source = storage.read("blog/post")?; // views/blog/post.imdl
//! ```

mod debouncer;
mod event;
mod fs;
mod id;
#[cfg(feature = "mock")]
mod mock;
mod storage;

pub use event::{StorageEvent, StorageEventKind, StorageEventReceiver, WatchHandle};
pub use fs::FsStorage;
pub use id::logical_id;
#[cfg(feature = "mock")]
pub use mock::MockStorage;
pub use storage::{Storage, StorageError, StorageErrorKind};
