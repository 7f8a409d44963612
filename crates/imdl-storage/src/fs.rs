//! Filesystem storage.
//!
//! [`FsStorage`] maps logical ids to `{root}/{id}.{ext}` and, when asked,
//! watches the root for template changes.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use glob::Pattern;
use notify::{RecursiveMode, Watcher};

use crate::debouncer::EventDebouncer;
use crate::event::{StorageEventKind, StorageEventReceiver, WatchHandle};
use crate::id::logical_id;
use crate::storage::{Storage, StorageError, StorageErrorKind};

const BACKEND: &str = "Fs";

/// Quiet period before a burst of raw notifications is reported.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// How often the drain thread checks the debouncer and the shutdown signal.
const POLL: Duration = Duration::from_millis(50);

/// Templates stored as files under a root directory.
///
/// # Example
///
/// ```ignore
/// use imdl_storage::{FsStorage, Storage};
///
/// let storage = FsStorage::new("views", "imdl");
/// let source = storage.read("blog/post")?; // views/blog/post.imdl
/// ```
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
    extension: String,
}

impl FsStorage {
    /// Create storage rooted at `root` reading `*.{extension}` files.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Template root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Template file extension, without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolve a logical id to a file path under the root.
    ///
    /// Ids that climb out of the root (`..`) are rejected.
    pub fn template_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        let id = logical_id(id, &self.root, &self.extension);
        let relative = Path::new(&id);

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.is_empty() || escapes {
            return Err(StorageError::new(StorageErrorKind::InvalidPath)
                .with_path(relative)
                .with_backend(BACKEND));
        }

        Ok(self.root.join(format!("{id}.{}", self.extension)))
    }

    fn watch_pattern(&self) -> Result<Pattern, StorageError> {
        Pattern::new(&format!("**/*.{}", self.extension)).map_err(|e| {
            StorageError::new(StorageErrorKind::InvalidPath)
                .with_backend(BACKEND)
                .with_source(e)
        })
    }
}

impl Storage for FsStorage {
    fn read(&self, id: &str) -> Result<String, StorageError> {
        let path = self.template_path(id)?;
        fs::read_to_string(&path).map_err(|e| StorageError::io(e, path).with_backend(BACKEND))
    }

    fn exists(&self, id: &str) -> bool {
        self.template_path(id).is_ok_and(|path| path.is_file())
    }

    fn watch(&self) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let debouncer = Arc::new(EventDebouncer::new(DEBOUNCE));
        let pattern = self.watch_pattern()?;
        // notify reports absolute paths.
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let extension = self.extension.clone();

        let recorder = Arc::clone(&debouncer);
        let watch_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else {
                return;
            };
            let kind = match event.kind {
                notify::EventKind::Create(_) => StorageEventKind::Created,
                notify::EventKind::Modify(_) => StorageEventKind::Modified,
                notify::EventKind::Remove(_) => StorageEventKind::Removed,
                _ => return,
            };

            for path in event.paths {
                let Ok(relative) = path.strip_prefix(&watch_root) else {
                    continue;
                };
                if !pattern.matches_path(relative) {
                    continue;
                }
                let id = logical_id(&relative.to_string_lossy(), Path::new(""), &extension);
                recorder.record(id, kind);
            }
        })
        .map_err(|e| {
            StorageError::new(StorageErrorKind::Other)
                .with_backend(BACKEND)
                .with_source(e)
        })?;

        watcher.watch(&root, RecursiveMode::Recursive).map_err(|e| {
            StorageError::new(StorageErrorKind::Other)
                .with_path(&root)
                .with_backend(BACKEND)
                .with_source(e)
        })?;

        tracing::info!(root = %root.display(), "Watching templates");

        std::thread::spawn(move || {
            // Dropping the watcher stops notify's own thread.
            let _watcher = watcher;

            loop {
                match shutdown_rx.recv_timeout(POLL) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                for event in debouncer.drain_ready() {
                    tracing::debug!(id = %event.id, kind = ?event.kind, "Template changed");
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((StorageEventReceiver::new(event_rx), WatchHandle::new(shutdown_tx)))
    }
}
