//! # beacon-store
//!
//! SQLite persistence for the Beacon telemetry agent.
//!
//! Two tables carry all durable state:
//!
//! - `events` — the FIFO upload queue. `rowid` (`eventId`) is the physical
//!   ordering key; rows are appended by producers and deleted in ranges by
//!   the uploader. See [`queue::EventQueue`].
//! - `metadata` / `metadata_long` — small typed key/value stores holding
//!   identity and session state that must survive process restart
//!   (`device_id`, `user_id`, `sequence_number`, `previous_session_id`,
//!   `last_event_time`, `opt_out`). See [`metadata::MetadataStore`].
//!
//! Repositories are stateless structs whose methods take `&Connection`;
//! the pool in [`connection`] hands out connections, and callers compose
//! repository calls inside transactions where atomicity matters.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod metadata;
pub mod migrations;
pub mod queue;

pub use errors::{Result, StoreError};
