//! Process-wide named instance registry.
//!
//! Applications that report to multiple collectors (or with multiple API
//! keys) hold one agent per name. Instances are created once and shared;
//! initializing an existing name returns the existing instance unchanged
//! rather than rebuilding it with the new config.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use beacon_core::config::Config;
use beacon_core::constants::DEFAULT_INSTANCE;
use tracing::debug;

use crate::agent::Agent;
use crate::errors::{AgentError, Result};

static INSTANCES: OnceLock<RwLock<HashMap<String, Arc<Agent>>>> = OnceLock::new();

fn instances() -> &'static RwLock<HashMap<String, Arc<Agent>>> {
    INSTANCES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Normalize an instance name: empty means the default instance.
fn normalize(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_INSTANCE
    } else {
        trimmed
    }
}

/// Create (or fetch) the agent registered under `config.instance_name`.
///
/// The first call for a name builds the agent; later calls return the
/// existing instance and ignore the new config. Must be called inside a
/// tokio runtime.
pub fn initialize(config: Config, db_path: impl AsRef<Path>) -> Result<Arc<Agent>> {
    let key = normalize(&config.instance_name).to_string();

    // Fast path under the read lock.
    if let Some(agent) = instances()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key)
    {
        debug!(instance = %key, "instance already initialized, reusing");
        return Ok(Arc::clone(agent));
    }

    let mut map = instances()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    // Re-check: another thread may have won the race for the write lock.
    if let Some(agent) = map.get(&key) {
        return Ok(Arc::clone(agent));
    }
    let agent = Arc::new(Agent::new(config, db_path)?);
    let _ = map.insert(key, Arc::clone(&agent));
    Ok(agent)
}

/// Fetch the default instance.
pub fn get() -> Result<Arc<Agent>> {
    get_named(DEFAULT_INSTANCE)
}

/// Fetch a previously initialized instance by name.
pub fn get_named(name: &str) -> Result<Arc<Agent>> {
    let key = normalize(name);
    instances()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(key)
        .map(Arc::clone)
        .ok_or_else(|| AgentError::NotInitialized(key.to_string()))
}

/// Shut down and deregister every instance.
///
/// Each agent gets its bounded final flush; errors from individual
/// shutdowns do not stop the rest.
pub async fn shutdown_all() {
    let drained: Vec<(String, Arc<Agent>)> = instances()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .drain()
        .collect();
    for (name, agent) in drained {
        if let Err(e) = agent.shutdown().await {
            tracing::warn!(instance = %name, error = %e, "shutdown flush failed");
        }
    }
}
