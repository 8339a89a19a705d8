//! Per-instance agent configuration.
//!
//! Each [`Config`] belongs to one agent instance; there is no global
//! file-backed settings layer. Defaults come from [`crate::constants`] and
//! nonsensical values are clamped back to them at construction with a
//! warning rather than rejected, so a bad config can never disable tracking.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants;

/// Configuration for one agent instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector endpoint events are POSTed to.
    pub server_url: String,
    /// API key identifying the application.
    pub api_key: String,
    /// Instance name (registry key). Empty means the default instance.
    pub instance_name: String,
    /// Device identifier supplied by the platform layer. When `None`, a
    /// generated id is created on first run and persisted.
    pub device_id: Option<String>,
    /// Queue depth at which a flush is forced.
    pub event_upload_threshold: usize,
    /// Maximum events per upload request.
    pub event_upload_max_batch_size: usize,
    /// Maximum events retained locally.
    pub event_max_count: usize,
    /// Interval between periodic flush attempts.
    pub event_upload_period: Duration,
    /// Idle gap after which a new session starts.
    pub min_time_between_sessions_millis: i64,
    /// Emit synthetic `session_start` / `session_end` marker events.
    pub tracking_session_events: bool,
    /// When true, all upload triggers are disabled; events still queue.
    pub offline: bool,
    /// When true, ingestion and flushing are both suppressed entirely.
    pub opt_out: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: String::new(),
            instance_name: String::new(),
            device_id: None,
            event_upload_threshold: constants::EVENT_UPLOAD_THRESHOLD,
            event_upload_max_batch_size: constants::EVENT_UPLOAD_MAX_BATCH_SIZE,
            event_max_count: constants::EVENT_MAX_COUNT,
            event_upload_period: Duration::from_secs(constants::EVENT_UPLOAD_PERIOD_SECONDS),
            min_time_between_sessions_millis: constants::MIN_TIME_BETWEEN_SESSIONS_MILLIS,
            tracking_session_events: false,
            offline: false,
            opt_out: false,
        }
    }
}

impl Config {
    /// Create a config with the given endpoint and API key, defaults elsewhere.
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Clamp zero or inverted thresholds back to their defaults.
    ///
    /// Called once when an agent is built. Returns `self` so it can be
    /// chained onto construction.
    pub fn validated(mut self) -> Self {
        if self.event_upload_threshold == 0 {
            warn!("event_upload_threshold of 0 clamped to default");
            self.event_upload_threshold = constants::EVENT_UPLOAD_THRESHOLD;
        }
        if self.event_upload_max_batch_size == 0 {
            warn!("event_upload_max_batch_size of 0 clamped to default");
            self.event_upload_max_batch_size = constants::EVENT_UPLOAD_MAX_BATCH_SIZE;
        }
        if self.event_max_count < self.event_upload_max_batch_size {
            warn!(
                event_max_count = self.event_max_count,
                "event_max_count below max batch size, clamped to default"
            );
            self.event_max_count = constants::EVENT_MAX_COUNT;
        }
        if self.event_upload_period.is_zero() {
            warn!("event_upload_period of 0 clamped to default");
            self.event_upload_period =
                Duration::from_secs(constants::EVENT_UPLOAD_PERIOD_SECONDS);
        }
        if self.min_time_between_sessions_millis <= 0 {
            warn!("min_time_between_sessions_millis must be positive, clamped to default");
            self.min_time_between_sessions_millis = constants::MIN_TIME_BETWEEN_SESSIONS_MILLIS;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.event_upload_threshold, 30);
        assert_eq!(cfg.event_upload_max_batch_size, 100);
        assert_eq!(cfg.event_max_count, 1000);
        assert_eq!(cfg.event_upload_period, Duration::from_secs(30));
        assert_eq!(cfg.min_time_between_sessions_millis, 15 * 60 * 1000);
        assert!(!cfg.tracking_session_events);
        assert!(!cfg.offline);
        assert!(!cfg.opt_out);
    }

    #[test]
    fn validated_clamps_zeroes() {
        let cfg = Config {
            event_upload_threshold: 0,
            event_upload_max_batch_size: 0,
            event_upload_period: Duration::ZERO,
            min_time_between_sessions_millis: -5,
            ..Config::default()
        }
        .validated();

        assert_eq!(cfg.event_upload_threshold, 30);
        assert_eq!(cfg.event_upload_max_batch_size, 100);
        assert_eq!(cfg.event_upload_period, Duration::from_secs(30));
        assert_eq!(cfg.min_time_between_sessions_millis, 15 * 60 * 1000);
    }

    #[test]
    fn validated_clamps_max_count_below_batch_size() {
        let cfg = Config {
            event_max_count: 10,
            ..Config::default()
        }
        .validated();
        assert_eq!(cfg.event_max_count, 1000);
    }
}
