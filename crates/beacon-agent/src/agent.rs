//! The agent facade — ingestion, identity, and lifecycle.
//!
//! One [`Agent`] owns its queue, session state, and sequence counter; no
//! other component mutates them. Ingestion runs on the caller's thread
//! under the state lock (storage I/O only, never network) and signals the
//! background scheduler when the queue reaches the upload threshold.
//!
//! Ingestion methods return `()`: validation and capacity failures are
//! absorbed and logged, never thrown. Only `new`, `flush`, and `shutdown`
//! are fallible.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use beacon_core::config::Config;
use beacon_core::constants::{EVENT_REMOVE_BATCH_SIZE, OUT_OF_SESSION, REVENUE_EVENT};
use beacon_core::event::{self, Event};
use beacon_core::identify::Identify;
use beacon_core::retry::RetryPolicy;
use beacon_core::revenue::Revenue;
use beacon_core::sanitize;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use beacon_store::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use beacon_store::metadata::{MetadataStore, keys};
use beacon_store::migrations::run_migrations;
use beacon_store::queue::EventQueue;

use crate::errors::{AgentError, Result};
use crate::scheduler::Scheduler;
use crate::session::SessionTracker;
use crate::transport::{HttpTransport, Transport};
use crate::uploader::{FlushOutcome, Uploader};

/// Bounded time for the final flush during shutdown.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Optional fields for one `log_event` call.
#[derive(Clone, Debug, Default)]
pub struct EventParams {
    /// Event properties.
    pub event_properties: Map<String, Value>,
    /// User property snapshot values.
    pub user_properties: Map<String, Value>,
    /// Group type → group name(s); values must be strings or string arrays.
    pub groups: Map<String, Value>,
    /// Group-level properties.
    pub group_properties: Map<String, Value>,
    /// Caller-supplied timestamp (ms since epoch UTC); defaults to now.
    pub timestamp: Option<i64>,
    /// Exclude this event from session assignment (`session_id = -1`).
    pub out_of_session: bool,
}

/// Mutable agent state behind one lock: the single point of synchronized
/// access required for session fields, the sequence counter, and identity.
struct AgentState {
    session: SessionTracker,
    sequence_number: i64,
    user_id: Option<String>,
    device_id: String,
}

/// A telemetry agent instance.
pub struct Agent {
    config: Config,
    pool: ConnectionPool,
    state: Mutex<AgentState>,
    opt_out: AtomicBool,
    offline: Arc<AtomicBool>,
    degraded: Arc<AtomicBool>,
    uploader: Arc<Uploader>,
    scheduler: Scheduler,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent backed by a database file, uploading over HTTP.
    ///
    /// Must be called inside a tokio runtime (the scheduler task is
    /// spawned here).
    pub fn new(config: Config, db_path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::new_file(db_path, &ConnectionConfig::default())?;
        let transport = Arc::new(HttpTransport::new(config.server_url.clone())?);
        Self::with_transport(config, pool, transport)
    }

    /// Create an agent over an existing pool and transport.
    ///
    /// This is the seam tests use to substitute in-memory storage and a
    /// scripted or wiremock-backed transport.
    pub fn with_transport(
        config: Config,
        pool: ConnectionPool,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let config = config.validated();
        let now = event::current_time_millis();

        let (state, opt_out) = {
            let conn = pool.get().map_err(beacon_store::StoreError::from)?;
            run_migrations(&conn)?;
            Self::reconstitute(&conn, &config, now)?
        };

        let offline = Arc::new(AtomicBool::new(config.offline));
        let degraded = Arc::new(AtomicBool::new(false));
        let uploader = Arc::new(Uploader::new(
            pool.clone(),
            transport,
            config.api_key.clone(),
            config.event_upload_max_batch_size,
            RetryPolicy::capped_at(config.event_upload_period),
        ));
        let scheduler = Scheduler::start(
            Arc::clone(&uploader),
            config.event_upload_period,
            Arc::clone(&offline),
            Arc::clone(&degraded),
        );

        info!(
            instance = %config.instance_name,
            device_id = %state.device_id,
            "agent initialized"
        );

        Ok(Self {
            config,
            pool,
            state: Mutex::new(state),
            opt_out: AtomicBool::new(opt_out),
            offline,
            degraded,
            uploader,
            scheduler,
        })
    }

    /// Rebuild in-memory state from the metadata store at startup.
    fn reconstitute(
        conn: &PooledConnection,
        config: &Config,
        now: i64,
    ) -> Result<(AgentState, bool)> {
        // Config-supplied device id wins and is persisted; otherwise use
        // the stored one; otherwise generate and persist.
        let device_id = match &config.device_id {
            Some(id) if !id.trim().is_empty() => {
                MetadataStore::put(conn, keys::DEVICE_ID, id)?;
                id.clone()
            }
            _ => match MetadataStore::get(conn, keys::DEVICE_ID)? {
                Some(id) => id,
                None => {
                    let id = Uuid::now_v7().to_string();
                    MetadataStore::put(conn, keys::DEVICE_ID, &id)?;
                    id
                }
            },
        };

        let user_id = MetadataStore::get(conn, keys::USER_ID)?;
        let sequence_number = MetadataStore::get_long(conn, keys::SEQUENCE_NUMBER)?.unwrap_or(0);

        let opt_out = if config.opt_out {
            MetadataStore::put_long(conn, keys::OPT_OUT, 1)?;
            true
        } else {
            MetadataStore::get_long(conn, keys::OPT_OUT)? == Some(1)
        };

        let session = SessionTracker::restore(
            config.min_time_between_sessions_millis,
            MetadataStore::get_long(conn, keys::PREVIOUS_SESSION_ID)?,
            MetadataStore::get_long(conn, keys::LAST_EVENT_TIME)?,
            now,
        );

        Ok((
            AgentState {
                session,
                sequence_number,
                user_id,
                device_id,
            },
            opt_out,
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────

    /// Track an event.
    pub fn log_event(&self, event_type: &str, params: EventParams) {
        if self.opt_out.load(Ordering::Relaxed) {
            return;
        }
        if !sanitize::valid_event_type(event_type) {
            warn!("empty event type, event dropped");
            return;
        }
        let timestamp = params.timestamp.unwrap_or_else(event::current_time_millis);
        let mut event = Event::new(event_type, timestamp);
        event.event_properties = sanitize::sanitize_properties(params.event_properties);
        event.user_properties = sanitize::sanitize_properties(params.user_properties);
        event.groups = sanitize::validate_groups(params.groups);
        event.group_properties = sanitize::sanitize_properties(params.group_properties);
        self.enqueue(event, params.out_of_session);
    }

    /// Apply an ordered set of user-property operations.
    ///
    /// The op list is merged into one canonical mutation document and
    /// emitted as a single identify event; an identify whose merged
    /// document is empty is suppressed entirely.
    pub fn identify(&self, identify: Identify, out_of_session: bool) {
        if self.opt_out.load(Ordering::Relaxed) {
            return;
        }
        let Some(doc) = identify.merge() else {
            debug!("identify merged to nothing, suppressed");
            return;
        };
        let event = Event::identify(event::current_time_millis(), doc);
        self.enqueue(event, out_of_session);
    }

    /// Set multiple user properties at once (an identify of `$set` ops).
    pub fn set_user_properties(&self, properties: Map<String, Value>) {
        let mut identify = Identify::new();
        for (key, value) in properties {
            identify = identify.set(key, value);
        }
        self.identify(identify, false);
    }

    /// Remove every user property.
    pub fn clear_user_properties(&self) {
        self.identify(Identify::new().clear_all(), false);
    }

    /// Track a revenue record.
    ///
    /// A record without a price is invalid and is rejected here, before it
    /// ever reaches the queue.
    pub fn log_revenue(&self, revenue: Revenue) {
        if self.opt_out.load(Ordering::Relaxed) {
            return;
        }
        let Some(properties) = revenue.into_event_properties() else {
            warn!("revenue record missing price, dropped");
            return;
        };
        self.log_event(
            REVENUE_EVENT,
            EventParams {
                event_properties: properties,
                ..EventParams::default()
            },
        );
    }

    /// Stamp session, identity, and sequence number, then append durably.
    ///
    /// Everything under the state lock: session advance, sequence
    /// assignment, the append itself, and metadata persistence — so no two
    /// threads can assign the same sequence number or interleave marker
    /// events with a foreign session's events.
    fn enqueue(&self, mut event: Event, out_of_session: bool) {
        let queued = {
            let mut state = self.state.lock();
            let conn = match self.pool.get() {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "no database connection, event dropped");
                    return;
                }
            };

            let mut batch: Vec<Event> = Vec::with_capacity(3);
            if out_of_session {
                event.session_id = OUT_OF_SESSION;
            } else {
                let advance = state.session.advance(event.timestamp);
                if self.config.tracking_session_events {
                    if let Some(closed) = advance.closed {
                        let mut end = Event::session_end(closed.last_event_time);
                        end.session_id = closed.session_id;
                        batch.push(end);
                    }
                    if advance.started_new {
                        let mut start = Event::session_start(advance.session_id);
                        start.session_id = advance.session_id;
                        batch.push(start);
                    }
                }
                event.session_id = advance.session_id;
            }
            batch.push(event);

            for mut event in batch {
                state.sequence_number += 1;
                event.sequence_number = state.sequence_number;
                event.user_id = state.user_id.clone();
                event.device_id = state.device_id.clone();
                if let Err(e) = EventQueue::append(&conn, &event) {
                    warn!(error = %e, event_type = %event.event_type, "append failed, event dropped");
                }
            }

            // Persist counters and session state so a restart continues
            // where this process left off.
            let persisted = MetadataStore::put_long(
                &conn,
                keys::SEQUENCE_NUMBER,
                state.sequence_number,
            )
            .and_then(|()| {
                MetadataStore::put_long(
                    &conn,
                    keys::PREVIOUS_SESSION_ID,
                    state.session.session_id(),
                )
            })
            .and_then(|()| {
                MetadataStore::put_long(
                    &conn,
                    keys::LAST_EVENT_TIME,
                    state.session.last_event_time(),
                )
            });
            if let Err(e) = persisted {
                warn!(error = %e, "failed to persist agent state");
            }

            if let Err(e) = EventQueue::trim_to_capacity(
                &conn,
                self.config.event_max_count,
                EVENT_REMOVE_BATCH_SIZE,
            ) {
                warn!(error = %e, "capacity trim failed");
            }

            EventQueue::count(&conn).unwrap_or(0)
        };

        if queued >= self.config.event_upload_threshold {
            self.scheduler.trigger();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Identity and mode toggles
    // ─────────────────────────────────────────────────────────────────────

    /// Set or clear the user id for subsequent events.
    pub fn set_user_id(&self, user_id: Option<String>) {
        let mut state = self.state.lock();
        match self.pool.get() {
            Ok(conn) => {
                let result = match &user_id {
                    Some(id) => MetadataStore::put(&conn, keys::USER_ID, id),
                    None => MetadataStore::delete(&conn, keys::USER_ID),
                };
                if let Err(e) = result {
                    warn!(error = %e, "failed to persist user id");
                }
            }
            Err(e) => warn!(error = %e, "failed to persist user id"),
        }
        state.user_id = user_id;
    }

    /// Override the device id for subsequent events. Empty ids are ignored.
    pub fn set_device_id(&self, device_id: String) {
        if device_id.trim().is_empty() {
            warn!("empty device id ignored");
            return;
        }
        let mut state = self.state.lock();
        if let Ok(conn) = self.pool.get() {
            if let Err(e) = MetadataStore::put(&conn, keys::DEVICE_ID, &device_id) {
                warn!(error = %e, "failed to persist device id");
            }
        }
        state.device_id = device_id;
    }

    /// Current device id.
    pub fn device_id(&self) -> String {
        self.state.lock().device_id.clone()
    }

    /// Current user id, if set.
    pub fn user_id(&self) -> Option<String> {
        self.state.lock().user_id.clone()
    }

    /// Toggle offline mode. Leaving offline mode triggers an immediate
    /// flush attempt if anything is queued.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
        if !offline && self.queued_count().unwrap_or(0) > 0 {
            self.scheduler.trigger();
        }
    }

    /// Toggle opt-out. While opted out, ingestion and flushing are both
    /// suppressed entirely; the flag is persisted.
    pub fn set_opt_out(&self, opt_out: bool) {
        self.opt_out.store(opt_out, Ordering::Relaxed);
        if let Ok(conn) = self.pool.get() {
            if let Err(e) = MetadataStore::put_long(&conn, keys::OPT_OUT, i64::from(opt_out)) {
                warn!(error = %e, "failed to persist opt-out");
            }
        }
    }

    /// Whether scheduled uploads were suspended by an auth rejection.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Number of events currently queued.
    pub fn queued_count(&self) -> Result<usize> {
        let conn = self.pool.get().map_err(beacon_store::StoreError::from)?;
        Ok(EventQueue::count(&conn)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Delivery
    // ─────────────────────────────────────────────────────────────────────

    /// Flush queued events now, waiting for the cycle to finish.
    ///
    /// A no-op returning [`FlushOutcome::Empty`] while offline, opted out,
    /// or degraded.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        if self.opt_out.load(Ordering::Relaxed)
            || self.offline.load(Ordering::Relaxed)
            || self.degraded.load(Ordering::Relaxed)
        {
            return Ok(FlushOutcome::Empty);
        }
        let outcome = self.uploader.flush().await?;
        if outcome == FlushOutcome::AuthRejected {
            self.degraded.store(true, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    /// Stop the scheduler and attempt one final bounded flush.
    ///
    /// The in-flight scheduled flush (if any) completes first; no new
    /// scheduled flushes start afterwards.
    pub async fn shutdown(&self) -> Result<FlushOutcome> {
        self.scheduler.shutdown().await;
        if self.opt_out.load(Ordering::Relaxed)
            || self.offline.load(Ordering::Relaxed)
            || self.degraded.load(Ordering::Relaxed)
        {
            return Ok(FlushOutcome::Empty);
        }
        match tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, self.uploader.flush()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::ShutdownTimeout),
        }
    }

    /// This agent's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
