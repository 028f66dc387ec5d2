//! sync-daemon — a minimal host process driving the reconciliation engine
//! on a fixed interval.
//!
//! The engine itself owns no persisted state (mapping rows and the
//! `lastSyncAt` checkpoint belong to the host); this binary is that host,
//! keeping both in a small JSON file under `~/.sync-engine/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_core::config::EngineConfig;
use sync_core::logging::{init_logging, TracingEventLog};
use sync_core::mapping::{InMemoryMappingStore, MappingStore};
use sync_core::types::Mapping;
use sync_engine::{Outcome, ReconciliationEngine};
use tracing::{error, info};

const POLL_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Default, Serialize, Deserialize)]
struct HostState {
    last_sync_at: Option<DateTime<Utc>>,
    mappings: Vec<Mapping>,
}

impl HostState {
    fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let text = serde_json::to_string_pretty(self).context("failed to serialize host state")?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn state_path() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".sync-engine").join("state.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("sync-daemon", "info");

    let config = EngineConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });

    let path = state_path();
    let state = HostState::load(&path);
    info!(mappings = state.mappings.len(), last_sync_at = ?state.last_sync_at, "loaded host state");

    let mapping_store = Arc::new(InMemoryMappingStore::seeded(state.mappings));
    let event_log = Arc::new(TracingEventLog);
    let engine = ReconciliationEngine::from_config(config, event_log, mapping_store.clone())
        .context("failed to construct reconciliation engine")?;

    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut last_sync_at = state.last_sync_at;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                info!(?last_sync_at, %now, "starting reconciliation run");

                match engine.execute(last_sync_at, now).await {
                    Outcome::Success => {
                        last_sync_at = Some(now);
                        let snapshot = HostState { last_sync_at, mappings: mapping_store.all() };
                        if let Err(e) = snapshot.save(&path) {
                            error!(error = %e, "failed to persist host state");
                        }
                        info!("reconciliation run succeeded");
                    }
                    Outcome::Error => {
                        error!("reconciliation run failed, lastSyncAt not advanced");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
        }
    }

    Ok(())
}
