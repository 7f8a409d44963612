//! Coalesces bursts of change notifications into one event per template.
//!
//! Editors commonly emit several raw events per save (truncate, write,
//! rename). The watcher records each of them here and only drains an id once
//! it has been quiet for the debounce window.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::event::{StorageEvent, StorageEventKind};

struct Pending {
    kind: StorageEventKind,
    deadline: Instant,
}

/// Thread-safe debouncer keyed by logical id.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<String, Pending>>,
    window: Duration,
}

impl EventDebouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a raw event, merging it with any pending one for the same id.
    pub(crate) fn record(&self, id: String, kind: StorageEventKind) {
        use std::collections::hash_map::Entry;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.window;

        match pending.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(Pending { kind, deadline });
            }
            Entry::Occupied(mut entry) => match coalesce(entry.get().kind, kind) {
                Some(merged) => {
                    let slot = entry.get_mut();
                    slot.kind = merged;
                    slot.deadline = deadline;
                }
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Remove and return every event whose window has elapsed.
    pub(crate) fn drain_ready(&self) -> Vec<StorageEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready = Vec::new();
        pending.retain(|id, event| {
            if event.deadline <= now {
                ready.push(StorageEvent::new(id.clone(), event.kind));
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| a.id.cmp(&b.id));
        ready
    }
}

/// Merge a new event into a pending one. `None` drops both.
#[allow(clippy::match_same_arms)]
fn coalesce(existing: StorageEventKind, new: StorageEventKind) -> Option<StorageEventKind> {
    use StorageEventKind::{Created, Modified, Removed};

    match (existing, new) {
        (Created, Created | Modified) => Some(Created),
        // Never observed by anyone.
        (Created, Removed) => None,
        (Modified, Created) => Some(Created),
        (Modified, Modified) => Some(Modified),
        (Modified, Removed) => Some(Removed),
        // Replaced in place, e.g. by an atomic rename.
        (Removed, Created) => Some(Modified),
        (Removed, Modified | Removed) => Some(Removed),
    }
}
