//! In-memory storage for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, mpsc};

use crate::event::{StorageEvent, StorageEventKind, StorageEventReceiver, WatchHandle};
use crate::storage::{Storage, StorageError, StorageErrorKind};

const BACKEND: &str = "Mock";

/// Mock storage keyed directly by logical id.
///
/// Counts every `read` call so tests can assert that cached lookups never
/// touch storage.
///
/// # Example
///
/// ```ignore
/// use imdl_storage::{MockStorage, Storage};
///
/// let storage = MockStorage::new().with_template("index", "# Home");
/// assert_eq!(storage.read("index")?, "# Home");
/// ```
#[derive(Debug, Default)]
pub struct MockStorage {
    templates: RwLock<HashMap<String, String>>,
    failing: RwLock<HashSet<String>>,
    reads: AtomicUsize,
    event_sender: RwLock<Option<mpsc::Sender<StorageEvent>>>,
}

impl MockStorage {
    /// Create an empty mock storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template.
    #[must_use]
    pub fn with_template(self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(id, source);
        self
    }

    /// Make reads of `id` fail with a non-"not found" error.
    #[must_use]
    pub fn with_read_failure(self, id: impl Into<String>) -> Self {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into());
        self
    }

    /// Add or replace a template after construction.
    pub fn insert(&self, id: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), source.into());
    }

    /// Delete a template without emitting an event.
    pub fn remove(&self, id: &str) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Number of `read` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Send an event to the current watcher, if any.
    pub fn emit(&self, event: StorageEvent) {
        if let Some(sender) = self
            .event_sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = sender.send(event);
        }
    }

    pub fn emit_created(&self, id: impl Into<String>) {
        self.emit(StorageEvent::new(id, StorageEventKind::Created));
    }

    pub fn emit_modified(&self, id: impl Into<String>) {
        self.emit(StorageEvent::new(id, StorageEventKind::Modified));
    }

    pub fn emit_removed(&self, id: impl Into<String>) {
        self.emit(StorageEvent::new(id, StorageEventKind::Removed));
    }
}

impl Storage for MockStorage {
    fn read(&self, id: &str) -> Result<String, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
        {
            return Err(StorageError::new(StorageErrorKind::PermissionDenied)
                .with_path(id)
                .with_backend(BACKEND));
        }

        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id).with_backend(BACKEND))
    }

    fn exists(&self, id: &str) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    fn watch(&self) -> Result<(StorageEventReceiver, WatchHandle), StorageError> {
        let (tx, rx) = mpsc::channel();
        *self
            .event_sender
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);

        Ok((StorageEventReceiver::new(rx), WatchHandle::no_op()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_storage_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockStorage>();
    }

    #[test]
    fn test_read_template() {
        let storage = MockStorage::new().with_template("index", "# Home");

        assert_eq!(storage.read("index").unwrap(), "# Home");
        assert!(storage.exists("index"));
    }

    #[test]
    fn test_read_missing() {
        let storage = MockStorage::new();

        let err = storage.read("index").unwrap_err();

        assert!(err.is_not_found());
        assert!(!storage.exists("index"));
    }

    #[test]
    fn test_read_failure() {
        let storage = MockStorage::new()
            .with_template("locked", "x")
            .with_read_failure("locked");

        let err = storage.read("locked").unwrap_err();

        assert_eq!(err.kind(), StorageErrorKind::PermissionDenied);
    }

    #[test]
    fn test_read_count() {
        let storage = MockStorage::new().with_template("a", "");
        let _ = storage.read("a");
        let _ = storage.read("missing");

        assert_eq!(storage.read_count(), 2);
    }

    #[test]
    fn test_insert_and_remove() {
        let storage = MockStorage::new();
        storage.insert("page", "v1");
        storage.insert("page", "v2");
        assert_eq!(storage.read("page").unwrap(), "v2");

        storage.remove("page");
        assert!(!storage.exists("page"));
    }

    #[test]
    fn test_emit_without_watch_is_ignored() {
        let storage = MockStorage::new();

        storage.emit_modified("index");
    }

    #[test]
    fn test_watch_receives_emitted_events() {
        let storage = MockStorage::new();
        let (rx, _handle) = storage.watch().unwrap();

        storage.emit_created("a");
        storage.emit_modified("b");
        storage.emit_removed("c");

        assert_eq!(rx.try_recv(), Some(StorageEvent::new("a", StorageEventKind::Created)));
        assert_eq!(rx.try_recv(), Some(StorageEvent::new("b", StorageEventKind::Modified)));
        assert_eq!(rx.try_recv(), Some(StorageEvent::new("c", StorageEventKind::Removed)));
        assert_eq!(rx.try_recv(), None);
    }
}
