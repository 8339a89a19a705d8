//! # beacon-core
//!
//! Foundation types and pure logic for the Beacon telemetry agent.
//!
//! This crate provides the shared vocabulary that the storage and agent
//! crates depend on:
//!
//! - **Events**: [`event::Event`] — the persisted, uploaded record
//! - **Config**: [`config::Config`] with upload/session thresholds
//! - **Sanitization**: [`sanitize`] — property normalization and group validation
//! - **Identify**: [`identify::Identify`] builder and the op merge engine
//! - **Revenue**: [`revenue::Revenue`] builder with required-price validation
//! - **Retry**: [`retry::RetryPolicy`] backoff calculation for upload failures
//! - **Errors**: [`errors::CoreError`] hierarchy via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `beacon-store` and `beacon-agent`.

#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod event;
pub mod identify;
pub mod logging;
pub mod retry;
pub mod revenue;
pub mod sanitize;
