//! Cache invalidation driven by storage change events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use imdl_cache::TemplateCache;
use imdl_storage::{Storage, StorageError, StorageEventReceiver, WatchHandle};

/// Keeps template watching alive. Dropping it stops invalidation.
///
/// The background thread exits once the storage watcher disconnects or the
/// next event arrives after the guard is gone.
pub struct TemplateWatcher {
    stopped: Arc<AtomicBool>,
    _handle: WatchHandle,
}

impl TemplateWatcher {
    /// Stop invalidating cache entries.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TemplateWatcher {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for TemplateWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateWatcher")
            .field("stopped", &self.stopped.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Invalidate entries of `cache` for every event `storage` reports.
pub(crate) fn spawn<T>(
    storage: &dyn Storage,
    cache: &Arc<TemplateCache<T>>,
) -> Result<TemplateWatcher, StorageError>
where
    T: Send + Sync + 'static,
{
    let (events, handle) = storage.watch()?;
    let stopped = Arc::new(AtomicBool::new(false));
    let cache = Arc::downgrade(cache);
    let flag = Arc::clone(&stopped);

    tracing::info!("Watching templates for changes");
    std::thread::spawn(move || invalidate_loop(&events, &cache, &flag));

    Ok(TemplateWatcher {
        stopped,
        _handle: handle,
    })
}

fn invalidate_loop<T>(events: &StorageEventReceiver, cache: &Weak<TemplateCache<T>>, stopped: &AtomicBool) {
    for event in events.iter() {
        if stopped.load(Ordering::Acquire) {
            break;
        }
        let Some(cache) = cache.upgrade() else {
            break;
        };
        let removed = cache.invalidate(&event.id);
        tracing::debug!(id = %event.id, kind = ?event.kind, removed, "Template changed");
    }
    tracing::debug!("Template watcher stopped");
}
