//! Session assignment — a two-state machine over `{NoSession, Active}`.
//!
//! A session is identified by the timestamp of its first event. An incoming
//! in-session event continues the current session when it arrives within
//! the configured idle gap of the last one; otherwise the old session is
//! closed and a new one starts at the event's timestamp. Out-of-session
//! events bypass the machine entirely.
//!
//! Session continuity is best-effort, never safety-critical: corrupt
//! persisted state (negative timestamps) resets to `NoSession` with a
//! warning instead of propagating an error.

use beacon_core::constants::OUT_OF_SESSION;
use tracing::warn;

/// What the tracker decided for one incoming event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionAdvance {
    /// Session id to stamp on the event.
    pub session_id: i64,
    /// A new session started with this event.
    pub started_new: bool,
    /// The session that was closed by this event, if any.
    pub closed: Option<ClosedSession>,
}

/// A session implicitly ended by inactivity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosedSession {
    /// Id of the closed session.
    pub session_id: i64,
    /// Timestamp of its last event — the session-end marker's timestamp.
    pub last_event_time: i64,
}

/// Current session id and last-event timestamp.
#[derive(Clone, Copy, Debug)]
pub struct SessionTracker {
    session_id: i64,
    last_event_time: i64,
    min_gap_millis: i64,
}

impl SessionTracker {
    /// Tracker with no active session.
    pub fn new(min_gap_millis: i64) -> Self {
        Self {
            session_id: OUT_OF_SESSION,
            last_event_time: 0,
            min_gap_millis,
        }
    }

    /// Reconstitute from persisted state at startup.
    ///
    /// Resumes the previous session when the process restarts inside the
    /// idle window; otherwise (or on garbled state) starts clean.
    pub fn restore(
        min_gap_millis: i64,
        previous_session_id: Option<i64>,
        last_event_time: Option<i64>,
        now: i64,
    ) -> Self {
        let mut tracker = Self::new(min_gap_millis);
        match (previous_session_id, last_event_time) {
            (Some(id), Some(last)) if id > 0 && last > 0 && now - last < min_gap_millis => {
                tracker.session_id = id;
                tracker.last_event_time = last;
            }
            (Some(id), Some(last)) if id < OUT_OF_SESSION || last < 0 => {
                warn!(
                    session_id = id,
                    last_event_time = last,
                    "corrupt persisted session state, resetting"
                );
            }
            _ => {}
        }
        tracker
    }

    /// Advance the machine for an in-session event at `timestamp`.
    pub fn advance(&mut self, timestamp: i64) -> SessionAdvance {
        if timestamp < 0 || self.last_event_time > timestamp + self.min_gap_millis {
            // Clock went backwards past the idle window or the caller sent
            // garbage; reset rather than carry corrupt state forward.
            warn!(
                timestamp,
                last_event_time = self.last_event_time,
                "session state out of range, resetting"
            );
            self.session_id = OUT_OF_SESSION;
            self.last_event_time = 0;
        }
        let timestamp = timestamp.max(0);

        if self.session_id == OUT_OF_SESSION {
            self.session_id = timestamp;
            self.last_event_time = timestamp;
            return SessionAdvance {
                session_id: timestamp,
                started_new: true,
                closed: None,
            };
        }

        if timestamp - self.last_event_time < self.min_gap_millis {
            self.last_event_time = timestamp;
            return SessionAdvance {
                session_id: self.session_id,
                started_new: false,
                closed: None,
            };
        }

        let closed = ClosedSession {
            session_id: self.session_id,
            last_event_time: self.last_event_time,
        };
        self.session_id = timestamp;
        self.last_event_time = timestamp;
        SessionAdvance {
            session_id: timestamp,
            started_new: true,
            closed: Some(closed),
        }
    }

    /// Current session id (`-1` when none is active).
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Timestamp of the last in-session event.
    pub fn last_event_time(&self) -> i64 {
        self.last_event_time
    }
}
