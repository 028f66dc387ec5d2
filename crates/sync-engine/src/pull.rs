//! Pull phase: Tracker issues updated since the last sync checkpoint flow
//! back into Hub incidents and requirements.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sync_core::config::EngineConfig;
use sync_core::enums::HubProjectCatalog;
use sync_core::logging::{emit, EventLog, LogLevel};
use sync_core::mapping::MappingResolver;
use sync_core::metadata::CreateMetadata;
use sync_core::types::{
    ArtifactKind, Mapping, MappingScope, ReleaseVersion, TrackerIssue, DEFAULT_REQUIREMENT_STATUS_ID,
    DEFAULT_REQUIREMENT_TYPE_ID,
};
use sync_hub::HubClient;
use sync_tracker::TrackerClient;
use sync_transform::{mirror_severity, plan_release_for_version, tracker_issue_to_hub_incident, tracker_issue_to_hub_requirement, IncidentDefaults};

const SEARCH_PAGE_SIZE: u32 = 100;

pub struct PullOutcome {
    pub processed: u32,
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    hub: &HubClient,
    tracker: &TrackerClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    catalog: &HubProjectCatalog,
    metadata: &CreateMetadata,
    hub_project_id: i64,
    tracker_project_key: &str,
    last_sync_at: DateTime<Utc>,
    now: DateTime<Utc>,
    event_log: &Arc<dyn EventLog>,
) -> PullOutcome {
    let jql = build_jql(tracker_project_key, last_sync_at, config.local_zone_offset_hours);
    let keys = match collect_keys(tracker, &jql).await {
        Ok(keys) => keys,
        Err(e) => {
            emit(event_log.as_ref(), LogLevel::Error, &format!("pull phase: search failed: {e}"));
            return PullOutcome { processed: 0 };
        }
    };

    let mut processed = 0;
    for key in keys {
        let issue = match sync_tracker::get_issue_by_key(tracker, &key, metadata).await {
            Ok(issue) => issue,
            Err(e) => {
                emit(event_log.as_ref(), LogLevel::Error, &format!("pull phase: fetch {key} failed: {e}"));
                continue;
            }
        };

        let result = if config.custom.requirement_issue_types.contains(&issue.issue_type.id) {
            pull_requirement(hub, resolver, config, catalog, hub_project_id, &issue, now, event_log).await
        } else {
            pull_incident(hub, tracker, resolver, config, catalog, hub_project_id, &issue, now, event_log).await
        };

        match result {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(e) => emit(event_log.as_ref(), LogLevel::Error, &format!("pull phase: {key} failed: {e}")),
        }
    }

    PullOutcome { processed }
}

fn build_jql(project_key: &str, last_sync_at: DateTime<Utc>, offset_hours: i32) -> String {
    let local = last_sync_at - Duration::hours(offset_hours as i64);
    let formatted = local.format("%Y/%m/%d %H:%M").to_string();
    format!("project = {project_key} AND updated >= '{formatted}' order by updated asc")
}

async fn collect_keys(tracker: &TrackerClient, jql: &str) -> sync_tracker::Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut start_at = 0;
    loop {
        let page = sync_tracker::search(tracker, jql, start_at, SEARCH_PAGE_SIZE).await?;
        let page_len = page.len() as u32;
        keys.extend(page);
        if page_len < SEARCH_PAGE_SIZE {
            break;
        }
        start_at += SEARCH_PAGE_SIZE;
    }
    Ok(keys)
}

/// Resolve (and auto-create, when missing) the Hub release mapped to a
/// Tracker version, returning its internal id.
async fn resolve_or_create_release(
    hub: &HubClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    hub_project_id: i64,
    version: &ReleaseVersion,
    now: DateTime<Utc>,
    event_log: &Arc<dyn EventLog>,
) -> Option<i64> {
    let external_key = version.external_key.as_deref()?;
    if let Some(existing) = resolver.find_by_external_key(MappingScope::Artifact(ArtifactKind::Release), Some(hub_project_id), external_key, true) {
        return Some(existing.internal_id);
    }

    let (version_number, start_date, end_date) = plan_release_for_version(version, now);
    let provisioned = ReleaseVersion { version_number, start_date: Some(start_date), end_date: Some(end_date), ..version.clone() };
    match hub.create_release(hub_project_id, &provisioned).await {
        Ok(new_id) => {
            if config.persist_auto_created_release_mappings {
                resolver.add_mappings(vec![Mapping::primary(
                    MappingScope::Artifact(ArtifactKind::Release),
                    Some(hub_project_id),
                    new_id,
                    external_key,
                )]);
            }
            Some(new_id)
        }
        Err(e) => {
            emit(event_log.as_ref(), LogLevel::Error, &format!("pull phase: release auto-creation failed for {external_key}: {e}"));
            None
        }
    }
}

async fn resolve_defaults(
    hub: &HubClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    hub_project_id: i64,
    issue: &TrackerIssue,
    now: DateTime<Utc>,
    event_log: &Arc<dyn EventLog>,
) -> IncidentDefaults {
    let opener_id = resolver.find_user_by_external_key(&issue.reporter).await.unwrap_or(0);
    let owner_id = match &issue.assignee {
        Some(login) => resolver.find_user_by_external_key(login).await,
        None => None,
    };
    let detected_release_id = match issue.versions.first() {
        Some(v) => resolve_or_create_release(hub, resolver, config, hub_project_id, v, now, event_log).await,
        None => None,
    };
    let resolved_release_id = match issue.fix_versions.first() {
        Some(v) => resolve_or_create_release(hub, resolver, config, hub_project_id, v, now, event_log).await,
        None => None,
    };
    IncidentDefaults { opener_id, owner_id, detected_release_id, resolved_release_id }
}

async fn reupload_attachments(hub: &HubClient, artifact_id: i64, issue: &TrackerIssue, event_log: &Arc<dyn EventLog>) {
    for attachment in &issue.attachments {
        if let Err(e) = hub.add_document(artifact_id, attachment).await {
            emit(event_log.as_ref(), LogLevel::Error, &format!("pull phase: attachment transfer failed for artifact {artifact_id}: {e}"));
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn pull_incident(
    hub: &HubClient,
    tracker: &TrackerClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    catalog: &HubProjectCatalog,
    hub_project_id: i64,
    issue: &TrackerIssue,
    now: DateTime<Utc>,
    event_log: &Arc<dyn EventLog>,
) -> sync_core::Result<bool> {
    let existing = resolver.find_by_external_key(MappingScope::Artifact(ArtifactKind::Incident), Some(hub_project_id), &issue.key, true);
    if existing.is_none() && config.custom.only_create_new_items_in_tracker {
        return Ok(false);
    }

    let defaults = resolve_defaults(hub, resolver, config, hub_project_id, issue, now, event_log).await;
    let mut incident = tracker_issue_to_hub_incident(issue, catalog, hub_project_id, defaults, &[]);

    if let Some(severity_field_id) = config.custom.severity_custom_field_id {
        if let Some(severity_id) = mirror_severity(issue, severity_field_id, catalog) {
            incident.severity_id = Some(severity_id);
        }
    }

    let incident_id = match &existing {
        Some(mapping) => {
            incident.id = Some(mapping.internal_id);
            hub.update_incident(&incident).await.map_err(sync_core::SyncError::from)?;
            mapping.internal_id
        }
        None => {
            let new_id = hub.create_incident(&incident).await.map_err(sync_core::SyncError::from)?;
            resolver.add_mappings(vec![Mapping::primary(
                MappingScope::Artifact(ArtifactKind::Incident),
                Some(hub_project_id),
                new_id,
                &issue.key,
            )]);
            let hub_url = hub.resolve_url(&format!("~/defects.do?id={new_id}"));
            if let Err(e) = sync_tracker::add_web_link(tracker, &issue.key, &hub_url, "Hub incident").await {
                emit(event_log.as_ref(), LogLevel::Error, &format!("pull phase: web link failed for incident {new_id}: {e}"));
            }
            new_id
        }
    };

    reupload_attachments(hub, incident_id, issue, event_log).await;
    Ok(true)
}

/// Emit a Warning-level log entry for each enum value `tracker_issue_to_hub_requirement`
/// is about to default, since the artifact transform itself stays pure and does no logging.
fn warn_on_requirement_defaults(issue: &TrackerIssue, catalog: &HubProjectCatalog, event_log: &Arc<dyn EventLog>) {
    if catalog.requirement_status.to_hub(&issue.status.name).is_none() {
        emit(
            event_log.as_ref(),
            LogLevel::Warning,
            &format!(
                "pull phase: no requirement-status mapping for tracker status '{}' on {}, defaulting to {DEFAULT_REQUIREMENT_STATUS_ID}",
                issue.status.name, issue.key
            ),
        );
    }
    if catalog.requirement_type.to_hub(&issue.issue_type.name).is_none() {
        emit(
            event_log.as_ref(),
            LogLevel::Warning,
            &format!(
                "pull phase: no requirement-type mapping for tracker type '{}' on {}, defaulting to {DEFAULT_REQUIREMENT_TYPE_ID}",
                issue.issue_type.name, issue.key
            ),
        );
    }
}

#[allow(clippy::too_many_arguments)]
async fn pull_requirement(
    hub: &HubClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    catalog: &HubProjectCatalog,
    hub_project_id: i64,
    issue: &TrackerIssue,
    now: DateTime<Utc>,
    event_log: &Arc<dyn EventLog>,
) -> sync_core::Result<bool> {
    let existing = resolver.find_by_external_key(MappingScope::Artifact(ArtifactKind::Requirement), Some(hub_project_id), &issue.key, true);
    if existing.is_none() && config.custom.only_create_new_items_in_tracker {
        return Ok(false);
    }

    warn_on_requirement_defaults(issue, catalog, event_log);

    let defaults = resolve_defaults(hub, resolver, config, hub_project_id, issue, now, event_log).await;
    let mut requirement = tracker_issue_to_hub_requirement(issue, catalog, hub_project_id, defaults, &[]);

    let requirement_id = match &existing {
        Some(mapping) => {
            requirement.id = Some(mapping.internal_id);
            hub.update_requirement(&requirement).await.map_err(sync_core::SyncError::from)?;
            mapping.internal_id
        }
        None => {
            let new_id = hub.create_requirement(&requirement).await.map_err(sync_core::SyncError::from)?;
            resolver.add_mappings(vec![Mapping::primary(
                MappingScope::Artifact(ArtifactKind::Requirement),
                Some(hub_project_id),
                new_id,
                &issue.key,
            )]);
            new_id
        }
    };

    reupload_attachments(hub, requirement_id, issue, event_log).await;
    Ok(true)
}
