//! The plugin surface the host process drives: `setup`, `execute`, `dispose`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sync_core::config::{CustomOptions, EngineConfig};
use sync_core::logging::EventLog;
use sync_core::mapping::MappingStore;

use crate::engine::{Outcome, ReconciliationEngine};

/// Everything the host passes into `setup`.
#[allow(clippy::too_many_arguments)]
pub struct SetupParams {
    pub trace_logging: bool,
    pub data_sync_system_id: i64,
    pub hub_base_url: String,
    pub hub_web_base_url: String,
    pub hub_user: String,
    pub hub_pass: String,
    pub tracker_base_url: String,
    pub tracker_user: String,
    pub tracker_pass: String,
    pub accept_self_signed: bool,
    pub offset_hours: i32,
    pub auto_map_users: bool,
    pub custom01: String,
    pub custom02: String,
    pub custom03: String,
    pub custom04: String,
    pub custom05: String,
}

/// A plugin instance, constructed once by `setup` and torn down by
/// `dispose`. Holds the clients and resolver `execute` drives.
pub struct EngineHost {
    engine: Option<ReconciliationEngine>,
}

impl EngineHost {
    pub fn new() -> Self {
        Self { engine: None }
    }

    /// Initialize the engine from host-supplied setup fields. Never fails
    /// on malformed custom options — `CustomOptions::from_raw` falls back
    /// to safe defaults instead.
    pub fn setup(
        &mut self,
        params: SetupParams,
        event_log: Arc<dyn EventLog>,
        mapping_store: Arc<dyn MappingStore>,
    ) -> sync_core::Result<()> {
        let config = EngineConfig {
            hub_base_url: params.hub_base_url,
            hub_web_base_url: params.hub_web_base_url,
            hub_user: params.hub_user,
            hub_pass: params.hub_pass,
            tracker_base_url: params.tracker_base_url,
            tracker_user: params.tracker_user,
            tracker_pass: params.tracker_pass,
            use_default_credentials: false,
            accept_self_signed: params.accept_self_signed,
            trace_logging: params.trace_logging,
            data_sync_system_id: params.data_sync_system_id,
            local_zone_offset_hours: params.offset_hours,
            auto_map_users: params.auto_map_users,
            push_by_time_window: false,
            persist_auto_created_release_mappings: true,
            custom: CustomOptions::from_raw(&params.custom01, &params.custom02, &params.custom03, &params.custom04, &params.custom05),
        };

        self.engine = Some(ReconciliationEngine::from_config(config, event_log, mapping_store)?);
        Ok(())
    }

    /// Run one reconciliation cycle. `last_sync_at` is owned by the host;
    /// `None` means "no prior successful sync".
    pub async fn execute(&self, last_sync_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Outcome {
        match &self.engine {
            Some(engine) => engine.execute(last_sync_at, now).await,
            None => Outcome::Error,
        }
    }

    /// Release the engine's clients. A fresh `setup` call is required
    /// before the next `execute`.
    pub fn dispose(&mut self) {
        self.engine = None;
    }
}

impl Default for EngineHost {
    fn default() -> Self {
        Self::new()
    }
}
