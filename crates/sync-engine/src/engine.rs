//! The reconciliation state machine: authenticate, probe, then drive the
//! push and pull phases for each configured project pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sync_core::config::EngineConfig;
use sync_core::logging::{emit, EventLog, LogLevel};
use sync_core::mapping::MappingResolver;
use sync_core::types::{effective_last_sync, MappingScope, ProjectPair};
use sync_hub::HubClient;
use sync_tracker::TrackerClient;

use crate::{pull, push};

/// The result of one `execute()` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

pub struct ReconciliationEngine {
    hub: Arc<HubClient>,
    tracker: Arc<TrackerClient>,
    resolver: Arc<MappingResolver>,
    config: EngineConfig,
    event_log: Arc<dyn EventLog>,
}

impl ReconciliationEngine {
    pub fn new(
        hub: Arc<HubClient>,
        tracker: Arc<TrackerClient>,
        resolver: Arc<MappingResolver>,
        config: EngineConfig,
        event_log: Arc<dyn EventLog>,
    ) -> Self {
        Self { hub, tracker, resolver, config, event_log }
    }

    /// Build the clients and resolver from a fully-populated config,
    /// seeding the mapping store from whatever rows it already holds.
    pub fn from_config(
        config: EngineConfig,
        event_log: Arc<dyn EventLog>,
        mapping_store: Arc<dyn sync_core::mapping::MappingStore>,
    ) -> sync_core::Result<Self> {
        let web_base_url = if config.hub_web_base_url.is_empty() { config.hub_base_url.clone() } else { config.hub_web_base_url.clone() };
        let hub = Arc::new(HubClient::new(&config.hub_base_url, &web_base_url, &config.hub_user, &config.hub_pass));
        let tracker = Arc::new(TrackerClient::new(&config.tracker_base_url, &config.tracker_user, &config.tracker_pass, config.accept_self_signed)?);
        let resolver = Arc::new(MappingResolver::new(mapping_store, config.auto_map_users).with_user_lookup(hub.clone()));
        Ok(Self::new(hub, tracker, resolver, config, event_log))
    }

    fn log_error(&self, message: &str) {
        emit(self.event_log.as_ref(), LogLevel::Error, message);
    }

    fn log_trace(&self, message: &str) {
        if self.config.trace_logging {
            emit(self.event_log.as_ref(), LogLevel::Trace, message);
        }
    }

    fn project_pairs(&self) -> Vec<ProjectPair> {
        self.resolver
            .list_by_scope(MappingScope::Project)
            .into_iter()
            .map(|m| ProjectPair { hub_project_id: m.internal_id, tracker_project_key: m.external_key })
            .collect()
    }

    pub async fn execute(&self, last_sync_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Outcome {
        let last_sync_at = effective_last_sync(last_sync_at);

        if let Err(e) = self.hub.authenticate().await {
            self.log_error(&format!("hub authentication failed: {e}"));
            return Outcome::Error;
        }
        if let Err(e) = self.tracker.get_permissions().await {
            self.log_error(&format!("tracker connectivity probe failed: {e}"));
            return Outcome::Error;
        }
        self.log_trace("authenticated against hub and tracker");

        let known_tracker_projects = match sync_tracker::list_projects(&self.tracker).await {
            Ok(projects) => projects.into_iter().map(|p| p.key).collect::<Vec<_>>(),
            Err(e) => {
                self.log_error(&format!("failed to list tracker projects: {e}"));
                Vec::new()
            }
        };

        for pair in self.project_pairs() {
            if let Err(e) = self.hub.connect_project(pair.hub_project_id).await {
                self.log_error(&format!("failed to connect hub project {}: {e}", pair.hub_project_id));
                continue;
            }

            let catalog = match self.hub.fetch_catalog(pair.hub_project_id).await {
                Ok(catalog) => catalog,
                Err(e) => {
                    self.log_error(&format!("failed to fetch catalog for hub project {}: {e}", pair.hub_project_id));
                    continue;
                }
            };
            let metadata = match sync_tracker::get_create_metadata(&self.tracker, Some(&pair.tracker_project_key)).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    self.log_error(&format!("failed to fetch create-metadata for {}: {e}", pair.tracker_project_key));
                    continue;
                }
            };

            let push_outcome = push::run(
                &self.hub,
                &self.tracker,
                &self.resolver,
                &self.config,
                &catalog,
                &metadata,
                pair.hub_project_id,
                &pair.tracker_project_key,
                &known_tracker_projects,
                &self.event_log,
            )
            .await;
            self.log_trace(&format!("push phase created {} issues for project {}", push_outcome.created, pair.tracker_project_key));

            if let Err(e) = self.hub.authenticate().await {
                self.log_error(&format!("reauthentication before pull phase failed: {e}"));
                return Outcome::Error;
            }

            let pull_outcome = pull::run(
                &self.hub,
                &self.tracker,
                &self.resolver,
                &self.config,
                &catalog,
                &metadata,
                pair.hub_project_id,
                &pair.tracker_project_key,
                last_sync_at,
                now,
                &self.event_log,
            )
            .await;
            self.log_trace(&format!("pull phase processed {} issues for project {}", pull_outcome.processed, pair.tracker_project_key));

            if let Err(e) = self.hub.authenticate().await {
                self.log_error(&format!("reauthentication after pull phase failed: {e}"));
                return Outcome::Error;
            }

            self.resolver.flush();
        }

        Outcome::Success
    }
}
