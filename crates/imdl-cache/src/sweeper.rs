//! Background expiry thread.

use std::sync::{Arc, Weak, mpsc};
use std::time::Duration;

use crate::TemplateCache;

/// Stops the sweeper thread when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Sweep `cache` every `interval` on a background thread.
///
/// The thread only holds a weak reference, so it also exits once the cache
/// itself is dropped.
pub fn spawn_sweeper<T>(cache: &Arc<TemplateCache<T>>, interval: Duration) -> SweeperHandle
where
    T: Send + Sync + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let cache: Weak<TemplateCache<T>> = Arc::downgrade(cache);

    tracing::info!(interval_ms = interval.as_millis(), "Starting cache sweeper");

    let thread = std::thread::spawn(move || {
        loop {
            match shutdown_rx.recv_timeout(interval) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
            let Some(cache) = cache.upgrade() else {
                break;
            };
            cache.sweep();
        }
        tracing::debug!("Cache sweeper stopped");
    });

    SweeperHandle {
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    }
}
