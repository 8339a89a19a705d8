//! Wire payload construction.
//!
//! A batch is `{api_key, upload_time, events: [...]}` where each event is
//! the [`Event`](beacon_core::event::Event) wire document: `event_type`,
//! `timestamp`, `session_id`, the four property maps, `device_id`,
//! `user_id`, `insert_id`, `sequence_number`, and `library`.

use beacon_core::event::{self, Event};
use serde_json::{Value, json};

/// Serialize a peeked page into the upload body.
///
/// Event order in the payload is the queue order of the page.
pub fn build_batch(api_key: &str, page: &[(i64, Event)]) -> Value {
    let events: Vec<Value> = page
        .iter()
        .map(|(_, event)| serde_json::to_value(event).unwrap_or(Value::Null))
        .collect();
    json!({
        "api_key": api_key,
        "upload_time": event::current_time_millis(),
        "events": events,
    })
}
