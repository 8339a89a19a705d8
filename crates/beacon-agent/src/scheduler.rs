//! The upload scheduler — a single background task owning the flush loop.
//!
//! Triggers: the ingestion path signals when the queue reaches the upload
//! threshold, a periodic timer fires every upload period, and re-enabling
//! from offline signals explicitly. All of them funnel through one
//! `Notify`, whose single stored permit is exactly the required
//! coalescing: triggers arriving while a flush is in flight collapse into
//! one pending re-check that runs right after it completes.
//!
//! Offline and degraded (auth-rejected) flags gate the loop: triggers are
//! swallowed, events keep queueing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::uploader::{FlushOutcome, Uploader};

/// Handle to the background flush loop.
pub struct Scheduler {
    trigger: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawn the flush loop. Must be called inside a tokio runtime.
    ///
    /// `offline` gates all triggers; `degraded` is set by the loop itself
    /// when the collector rejects credentials, and gates it the same way.
    pub fn start(
        uploader: Arc<Uploader>,
        period: Duration,
        offline: Arc<AtomicBool>,
        degraded: Arc<AtomicBool>,
    ) -> Self {
        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let loop_trigger = Arc::clone(&trigger);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = loop_trigger.notified() => {}
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("scheduler stopping");
                            return;
                        }
                        continue;
                    }
                }

                if offline.load(Ordering::Relaxed) || degraded.load(Ordering::Relaxed) {
                    continue;
                }

                match uploader.flush().await {
                    Ok(FlushOutcome::AuthRejected) => {
                        warn!("collector rejected credentials, scheduled uploads suspended");
                        degraded.store(true, Ordering::Relaxed);
                    }
                    Ok(outcome) => debug!(?outcome, "scheduled flush finished"),
                    Err(e) => warn!(error = %e, "scheduled flush failed"),
                }
            }
        });

        Self {
            trigger,
            shutdown_tx,
            handle: parking_lot::Mutex::new(Some(handle)),
        }
    }

    /// Request a flush. Coalesces with any pending trigger.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop the loop, letting an in-flight flush finish first.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "scheduler task panicked");
                }
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // An un-shutdown agent must not leak its loop.
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}
