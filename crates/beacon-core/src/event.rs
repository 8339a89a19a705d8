//! The [`Event`] struct — the core persisted and uploaded record.
//!
//! Events are stored as a flat struct with base fields at the top level and
//! property maps as [`serde_json::Map`]. The serde representation is the
//! wire document shape (snake_case keys), so one serialization serves both
//! the local queue and the upload payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::{
    self, IDENTIFY_EVENT, LIBRARY_NAME, LIBRARY_VERSION, SESSION_END_EVENT, SESSION_START_EVENT,
};

/// One discrete tracked occurrence.
///
/// Immutable once persisted: the queue stores events verbatim and the
/// uploader never rewrites them. Identity fields (`user_id`, `device_id`)
/// are copied from agent state at ingestion time and are not updated
/// retroactively.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type. Non-empty except for internal markers.
    pub event_type: String,
    /// Milliseconds since epoch UTC.
    pub timestamp: i64,
    /// Session this event belongs to, or `-1` for out-of-session events.
    pub session_id: i64,
    /// Caller-supplied event properties.
    #[serde(default)]
    pub event_properties: Map<String, Value>,
    /// User property mutations (identify events) or snapshot values.
    #[serde(default)]
    pub user_properties: Map<String, Value>,
    /// Group type → group name(s).
    #[serde(default)]
    pub groups: Map<String, Value>,
    /// Group-level properties.
    #[serde(default)]
    pub group_properties: Map<String, Value>,
    /// User identifier at ingestion time, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Device identifier at ingestion time.
    pub device_id: String,
    /// Per-agent monotonic ordering key, assigned at ingestion.
    pub sequence_number: i64,
    /// Unique id for server-side dedup (UUID v7).
    pub insert_id: String,
    /// Client library name/version.
    pub library: Library,
}

/// The `library` wire field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Library name.
    pub name: String,
    /// Library version.
    pub version: String,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            name: LIBRARY_NAME.to_string(),
            version: LIBRARY_VERSION.to_string(),
        }
    }
}

impl Event {
    /// Create an event with a fresh `insert_id` and empty property maps.
    ///
    /// `session_id` and `sequence_number` are placeholders until the agent
    /// stamps them under its state lock.
    pub fn new(event_type: impl Into<String>, timestamp: i64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            session_id: constants::OUT_OF_SESSION,
            event_properties: Map::new(),
            user_properties: Map::new(),
            groups: Map::new(),
            group_properties: Map::new(),
            user_id: None,
            device_id: String::new(),
            sequence_number: 0,
            insert_id: Uuid::now_v7().to_string(),
            library: Library::default(),
        }
    }

    /// Create an identify event carrying a merged op document.
    pub fn identify(timestamp: i64, user_properties: Map<String, Value>) -> Self {
        Self {
            user_properties,
            ..Self::new(IDENTIFY_EVENT, timestamp)
        }
    }

    /// Create a synthetic session-start marker.
    pub fn session_start(timestamp: i64) -> Self {
        Self::new(SESSION_START_EVENT, timestamp)
    }

    /// Create a synthetic session-end marker.
    ///
    /// `timestamp` is the last event time of the session being closed, so
    /// the marker sorts with the session it ends.
    pub fn session_end(timestamp: i64) -> Self {
        Self::new(SESSION_END_EVENT, timestamp)
    }

    /// Whether this is an internal marker exempt from the non-empty
    /// event-type rule (`$identify`, `session_start`, `session_end`).
    pub fn is_internal(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            IDENTIFY_EVENT | SESSION_START_EVENT | SESSION_END_EVENT
        )
    }
}

/// Current wall-clock time in milliseconds since epoch UTC.
pub fn current_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
