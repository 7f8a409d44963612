//! Change notification types returned by [`Storage::watch`](crate::Storage::watch).

use std::sync::mpsc;
use std::time::Duration;

/// Kind of template change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageEventKind {
    /// Template was created.
    Created,
    /// Template was modified.
    Modified,
    /// Template was removed.
    Removed,
}

/// A template change, keyed by logical id (e.g. `"blog/post"`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Logical id of the changed template.
    pub id: String,
    /// Kind of change.
    pub kind: StorageEventKind,
}

impl StorageEvent {
    /// Create an event for `id`.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: StorageEventKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Receiving end of a watch subscription.
///
/// Thin wrapper over [`mpsc::Receiver`]; iteration ends when the backend's
/// watcher shuts down.
pub struct StorageEventReceiver {
    rx: mpsc::Receiver<StorageEvent>,
}

impl StorageEventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<StorageEvent>) -> Self {
        Self { rx }
    }

    /// Receiver that never yields, for backends without change notification.
    pub(crate) fn no_op() -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { rx }
    }

    /// Block until the next event. `None` once the watcher is gone.
    #[must_use]
    pub fn recv(&self) -> Option<StorageEvent> {
        self.rx.recv().ok()
    }

    /// Wait at most `timeout` for the next event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StorageEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Non-blocking poll.
    #[must_use]
    pub fn try_recv(&self) -> Option<StorageEvent> {
        self.rx.try_recv().ok()
    }

    /// Blocking iterator over events.
    pub fn iter(&self) -> impl Iterator<Item = StorageEvent> + '_ {
        self.rx.iter()
    }
}

/// Keeps a watch subscription alive.
///
/// Dropping the handle (or calling [`stop`](Self::stop)) drops the shutdown
/// sender, which the backend's watcher thread observes as a disconnect.
pub struct WatchHandle {
    shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }

    pub(crate) fn no_op() -> Self {
        Self { shutdown: None }
    }

    /// Whether this handle controls a running watcher.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Stop watching immediately.
    pub fn stop(mut self) {
        self.shutdown.take();
    }
}
