//! # beacon-agent
//!
//! The Beacon telemetry agent: accepts discrete event records, assigns them
//! to logical sessions, queues them durably, and uploads them to a remote
//! collector in batches.
//!
//! - **Facade**: [`agent::Agent`] — `log_event`, `identify`, `log_revenue`,
//!   identity setters, `flush`, `shutdown`
//! - **Sessions**: [`session::SessionTracker`] — idle-gap session assignment
//! - **Delivery**: [`uploader::Uploader`] over a [`transport::Transport`]
//!   (HTTP via `reqwest`, mockable in tests)
//! - **Scheduling**: [`scheduler`] — count/period/explicit triggers with
//!   at-most-one flush in flight
//! - **Registry**: [`registry`] — process-wide named instances
//!
//! Ingestion is synchronous and never touches the network; the upload path
//! runs on a background tokio task. An [`agent::Agent`] must therefore be
//! created inside a tokio runtime.

#![deny(unsafe_code)]

pub mod agent;
pub mod errors;
pub mod payload;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod uploader;

pub use agent::{Agent, EventParams};
pub use beacon_core::config::Config;
pub use beacon_core::identify::Identify;
pub use beacon_core::revenue::Revenue;
pub use errors::{AgentError, Result};
pub use uploader::FlushOutcome;
