//! The batch uploader — one flush cycle from queue to collector.
//!
//! A flush reads the oldest page (bounded by the max batch size),
//! transmits it, and on acceptance deletes exactly that page — the delete
//! range is the id captured at peek time, so events appended during
//! transmission survive. Full pages keep draining within the same cycle.
//!
//! Failure handling per category:
//! - retriable → queue untouched, exponential backoff, bounded attempts
//!   per cycle; events are never dropped because retries ran out;
//! - payload rejected → that page alone is deleted (poison-pill defense)
//!   and the loss is reported;
//! - auth rejected → nothing deleted, surfaced so the agent can degrade.
//!
//! A lost acknowledgment can cause a retransmit; delivery is at-least-once
//! and the server dedups on `insert_id`.

use std::sync::Arc;

use beacon_core::retry::RetryPolicy;
use beacon_store::connection::ConnectionPool;
use beacon_store::queue::EventQueue;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::payload;
use crate::transport::{Transport, TransportResult};

/// Outcome of one flush cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Queue was empty; nothing to do.
    Empty,
    /// One or more pages were accepted.
    Flushed {
        /// Events uploaded and removed from the queue.
        uploaded: usize,
    },
    /// Transient failures exhausted the retry budget; queue left intact.
    RetriesExhausted {
        /// Events uploaded before retries ran out.
        uploaded: usize,
    },
    /// The collector rejected a page as malformed; it was discarded.
    PageDropped {
        /// Events lost with the discarded page.
        dropped: usize,
    },
    /// Credentials or quota rejected; queue left intact.
    AuthRejected,
}

/// Pulls pages from the durable queue and pushes them through a transport.
pub struct Uploader {
    pool: ConnectionPool,
    transport: Arc<dyn Transport>,
    api_key: String,
    max_batch_size: usize,
    policy: RetryPolicy,
    // Serializes flush cycles: the scheduler task and explicit flush()
    // callers both run through here, so at most one flush is in flight.
    flush_lock: Mutex<()>,
}

impl Uploader {
    /// Create an uploader over the given pool and transport.
    pub fn new(
        pool: ConnectionPool,
        transport: Arc<dyn Transport>,
        api_key: String,
        max_batch_size: usize,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            transport,
            api_key,
            max_batch_size,
            policy,
            flush_lock: Mutex::new(()),
        }
    }

    /// Run one flush cycle to completion.
    ///
    /// Concurrent callers queue behind the in-flight cycle rather than
    /// starting a second one.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let _guard = self.flush_lock.lock().await;

        let mut uploaded = 0usize;
        let mut attempt = 0u32;
        loop {
            let page = {
                let conn = self.pool.get().map_err(beacon_store::StoreError::from)?;
                EventQueue::peek_page(&conn, self.max_batch_size)?
            };
            if page.is_empty() {
                return Ok(if uploaded == 0 {
                    FlushOutcome::Empty
                } else {
                    FlushOutcome::Flushed { uploaded }
                });
            }
            // Bound the delete range to this exact page, not a re-queried
            // count: appends racing the transmit must survive.
            let last_id = page.last().map(|(id, _)| *id).unwrap_or_default();
            let page_len = page.len();
            let body = payload::build_batch(&self.api_key, &page);

            match self.transport.send(body).await {
                TransportResult::Accepted => {
                    let conn = self.pool.get().map_err(beacon_store::StoreError::from)?;
                    let _ = EventQueue::delete_up_to(&conn, last_id)?;
                    uploaded += page_len;
                    attempt = 0;
                    debug!(uploaded = page_len, "batch accepted");
                    if page_len < self.max_batch_size {
                        return Ok(FlushOutcome::Flushed { uploaded });
                    }
                    // Full page: more may remain, keep draining.
                }
                TransportResult::Retriable { retry_after } => {
                    attempt += 1;
                    match self.policy.backoff(attempt) {
                        Some(delay) => {
                            let delay = retry_after.unwrap_or(delay);
                            debug!(attempt, delay_ms = delay.as_millis() as u64, "transient upload failure, backing off");
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            warn!(attempts = attempt, "upload retries exhausted, leaving queue intact");
                            return Ok(FlushOutcome::RetriesExhausted { uploaded });
                        }
                    }
                }
                TransportResult::PayloadRejected => {
                    let conn = self.pool.get().map_err(beacon_store::StoreError::from)?;
                    let _ = EventQueue::delete_up_to(&conn, last_id)?;
                    warn!(dropped = page_len, "collector rejected page, events discarded");
                    return Ok(FlushOutcome::PageDropped { dropped: page_len });
                }
                TransportResult::AuthRejected => {
                    warn!("collector rejected credentials, queue left intact");
                    return Ok(FlushOutcome::AuthRejected);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_core::event::Event;
    use beacon_store::connection::{self, ConnectionConfig};
    use beacon_store::migrations::run_migrations;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::Value;
    use std::time::Duration;

    /// Transport that replays a scripted sequence of results, then accepts.
    struct Scripted {
        script: SyncMutex<Vec<TransportResult>>,
        sent: SyncMutex<Vec<Value>>,
    }

    impl Scripted {
        fn new(script: Vec<TransportResult>) -> Arc<Self> {
            Arc::new(Self {
                script: SyncMutex::new(script),
                sent: SyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, body: Value) -> TransportResult {
            self.sent.lock().push(body);
            let mut script = self.script.lock();
            if script.is_empty() {
                TransportResult::Accepted
            } else {
                script.remove(0)
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(2),
            max_attempts: 3,
        }
    }

    fn setup(n_events: usize) -> ConnectionPool {
        let pool = connection::new_in_memory(&ConnectionConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        for i in 0..n_events {
            EventQueue::append(&conn, &Event::new(format!("e{i}"), i as i64)).unwrap();
        }
        pool
    }

    fn count(pool: &ConnectionPool) -> usize {
        EventQueue::count(&pool.get().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn empty_queue_is_noop_success() {
        let pool = setup(0);
        let transport = Scripted::new(vec![]);
        let uploader = Uploader::new(pool, transport.clone(), "k".into(), 10, fast_policy());
        assert_eq!(uploader.flush().await.unwrap(), FlushOutcome::Empty);
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn accepted_deletes_exactly_the_page() {
        let pool = setup(5);
        let transport = Scripted::new(vec![]);
        let uploader =
            Uploader::new(pool.clone(), transport, "k".into(), 10, fast_policy());
        assert_eq!(
            uploader.flush().await.unwrap(),
            FlushOutcome::Flushed { uploaded: 5 }
        );
        assert_eq!(count(&pool), 0);
    }

    #[tokio::test]
    async fn full_pages_drain_in_one_cycle() {
        let pool = setup(7);
        let transport = Scripted::new(vec![]);
        let uploader =
            Uploader::new(pool.clone(), transport.clone(), "k".into(), 3, fast_policy());
        assert_eq!(
            uploader.flush().await.unwrap(),
            FlushOutcome::Flushed { uploaded: 7 }
        );
        // 3 + 3 + 1 across three requests.
        assert_eq!(transport.sent.lock().len(), 3);
        assert_eq!(count(&pool), 0);
    }

    #[tokio::test]
    async fn retriable_leaves_queue_untouched() {
        let pool = setup(4);
        let transport = Scripted::new(vec![
            TransportResult::Retriable { retry_after: None },
            TransportResult::Retriable { retry_after: None },
            TransportResult::Retriable { retry_after: None },
        ]);
        let uploader =
            Uploader::new(pool.clone(), transport, "k".into(), 10, fast_policy());
        assert_eq!(
            uploader.flush().await.unwrap(),
            FlushOutcome::RetriesExhausted { uploaded: 0 }
        );
        assert_eq!(count(&pool), 4);
    }

    #[tokio::test]
    async fn retriable_then_accepted_loses_nothing() {
        let pool = setup(4);
        let transport = Scripted::new(vec![TransportResult::Retriable { retry_after: None }]);
        let uploader =
            Uploader::new(pool.clone(), transport.clone(), "k".into(), 10, fast_policy());
        assert_eq!(
            uploader.flush().await.unwrap(),
            FlushOutcome::Flushed { uploaded: 4 }
        );
        assert_eq!(count(&pool), 0);
        // Same page was sent twice (at-least-once).
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["events"], sent[1]["events"]);
    }

    #[tokio::test]
    async fn payload_rejection_drops_exactly_the_page() {
        let pool = setup(5);
        let transport = Scripted::new(vec![TransportResult::PayloadRejected]);
        let uploader =
            Uploader::new(pool.clone(), transport, "k".into(), 3, fast_policy());
        assert_eq!(
            uploader.flush().await.unwrap(),
            FlushOutcome::PageDropped { dropped: 3 }
        );
        // Count reduced by exactly the page size.
        assert_eq!(count(&pool), 2);
    }

    #[tokio::test]
    async fn auth_rejection_preserves_queue() {
        let pool = setup(2);
        let transport = Scripted::new(vec![TransportResult::AuthRejected]);
        let uploader =
            Uploader::new(pool.clone(), transport, "k".into(), 10, fast_policy());
        assert_eq!(uploader.flush().await.unwrap(), FlushOutcome::AuthRejected);
        assert_eq!(count(&pool), 2);
    }

    #[tokio::test]
    async fn events_appended_during_transmit_survive_the_delete() {
        let pool = setup(2);

        /// Appends a late event while "transmitting", then accepts.
        struct AppendDuringSend {
            pool: ConnectionPool,
        }

        #[async_trait]
        impl Transport for AppendDuringSend {
            async fn send(&self, _body: Value) -> TransportResult {
                let conn = self.pool.get().unwrap();
                EventQueue::append(&conn, &Event::new("late", 999)).unwrap();
                TransportResult::Accepted
            }
        }

        let uploader = Uploader::new(
            pool.clone(),
            Arc::new(AppendDuringSend { pool: pool.clone() }),
            "k".into(),
            2,
            fast_policy(),
        );
        // First page (2 events) is full, so the cycle drains: the late
        // event goes out in a second request rather than being deleted
        // alongside the first page.
        assert_eq!(
            uploader.flush().await.unwrap(),
            FlushOutcome::Flushed { uploaded: 3 }
        );
    }
}
