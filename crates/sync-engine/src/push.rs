//! Push phase: Hub incidents newly eligible for sync become Tracker issues.

use std::sync::Arc;

use sync_core::config::EngineConfig;
use sync_core::enums::HubProjectCatalog;
use sync_core::logging::{emit, EventLog, LogLevel};
use sync_core::mapping::MappingResolver;
use sync_core::metadata::CreateMetadata;
use sync_core::types::{
    ArtifactKind, AssociationKind, Attachment, CustomPropertyTarget, HubIncident, IncidentAssociation, Mapping,
    MappingScope, SentinelField, TypedValue,
};
use sync_hub::HubClient;
use sync_tracker::TrackerClient;
use sync_transform::{hub_incident_to_tracker_fields, shape_create_payload, PushContext};

const PAGE_SIZE: u32 = 15;

pub struct PushOutcome {
    pub created: u32,
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
    default_tracker_project_key: &str,
    known_tracker_projects: &[String],
    event_log: &Arc<dyn EventLog>,
) -> PushOutcome {
    let mut created = 0;
    let mut offset = 0;

    loop {
        let page = match hub.get_incidents_page(offset, PAGE_SIZE).await {
            Ok(page) => page,
            Err(e) => {
                emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: failed to page incidents: {e}"));
                break;
            }
        };
        let page_len = page.len() as u32;

        for incident in &page {
            if !is_opted_in(incident, catalog) {
                continue;
            }
            match push_one(
                hub, tracker, resolver, config, catalog, metadata, hub_project_id, incident,
                default_tracker_project_key, known_tracker_projects, event_log,
            )
            .await
            {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => {
                    emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: incident {:?} failed: {e}", incident.id));
                }
            }
        }

        if page_len < PAGE_SIZE {
            break;
        }
        offset += PAGE_SIZE;
    }

    PushOutcome { created }
}

fn is_opted_in(incident: &HubIncident, catalog: &HubProjectCatalog) -> bool {
    let Some(flag) = &catalog.sync_flag else { return true };
    match incident.custom_properties.get(&flag.slot) {
        Some(TypedValue::List(value)) => value == &flag.yes_option,
        _ => false,
    }
}

fn tracker_project_key(incident: &HubIncident, catalog: &HubProjectCatalog, default_key: &str) -> String {
    let Some(slot) = catalog.project_key_override_slot else { return default_key.to_string() };
    match incident.custom_properties.get(&slot) {
        Some(TypedValue::Text(key)) if !key.trim().is_empty() => key.trim().to_uppercase(),
        _ => default_key.to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn push_one(
    hub: &HubClient,
    tracker: &TrackerClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    catalog: &HubProjectCatalog,
    metadata: &CreateMetadata,
    hub_project_id: i64,
    incident: &HubIncident,
    default_tracker_project_key: &str,
    known_tracker_projects: &[String],
    event_log: &Arc<dyn EventLog>,
) -> sync_core::Result<bool> {
    let Some(incident_id) = incident.id else {
        return Ok(false);
    };

    let project_key = tracker_project_key(incident, catalog, default_tracker_project_key);
    if !known_tracker_projects.iter().any(|p| p == &project_key) {
        emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: unknown tracker project {project_key}, skipping incident {incident_id}"));
        return Ok(false);
    }

    if resolver
        .find_by_internal_id(MappingScope::Artifact(ArtifactKind::Incident), Some(hub_project_id), incident_id)
        .is_some()
    {
        return Ok(false);
    }

    let reporter_login = resolver.find_user_by_internal_id(incident.opener_id).await.unwrap_or_default();
    let assignee_login = match incident.owner_id {
        Some(owner_id) => resolver.find_user_by_internal_id(owner_id).await,
        None => None,
    };
    let tracker_issue_type_id = catalog.incident_type.to_tracker(incident.type_id).and_then(|s| s.parse().ok()).unwrap_or(0);

    let detected_version_key = match incident.detected_release_id {
        Some(release_id) => {
            resolve_or_create_tracker_version(hub, tracker, resolver, config, hub_project_id, release_id, &project_key, event_log).await
        }
        None => None,
    };
    let resolved_version_key = match incident.resolved_release_id {
        Some(release_id) => {
            resolve_or_create_tracker_version(hub, tracker, resolver, config, hub_project_id, release_id, &project_key, event_log).await
        }
        None => None,
    };

    let ctx = PushContext {
        reporter_login,
        assignee_login,
        tracker_issue_type_id,
        use_security_level: config.custom.use_security_level,
        detected_version_key,
        resolved_version_key,
    };
    let raw_fields = hub_incident_to_tracker_fields(incident, catalog, &project_key, &ctx);
    let shaped = shape_create_payload(metadata, &project_key, tracker_issue_type_id, raw_fields)?;

    let key = sync_tracker::create_issue(tracker, shaped).await.map_err(|e| sync_core::SyncError::ValidationFault {
        summary: format!("create issue failed for incident {incident_id}"),
        messages: vec![("createIssue".to_string(), e.to_string())],
    })?;

    resolver.add_mappings(vec![Mapping::primary(
        MappingScope::Artifact(ArtifactKind::Incident),
        Some(hub_project_id),
        incident_id,
        &key,
    )]);

    let hub_url = hub.resolve_url(&format!("~/defects.do?id={incident_id}"));
    if let Err(e) = sync_tracker::add_web_link(tracker, &key, &hub_url, "Hub incident").await {
        emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: web link failed for {key}: {e}"));
    }

    let tracker_url = format!("{}/browse/{key}", tracker.base_url());
    if let Err(e) = hub.add_document(incident_id, &Attachment::Url { url: tracker_url, label: key.clone() }).await {
        emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: hub document link failed for incident {incident_id}: {e}"));
    }

    for attachment in &incident.attachments {
        let result = match attachment {
            Attachment::File { filename, bytes } => sync_tracker::add_attachment(tracker, &key, filename, bytes.clone()).await,
            Attachment::Url { url, label } => sync_tracker::add_web_link(tracker, &key, url, label).await,
        };
        if let Err(e) = result {
            emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: attachment transfer failed for {key}: {e}"));
        }
    }

    link_associations(hub, tracker, resolver, config, hub_project_id, incident_id, &key, event_log).await;

    if let Some(jira_key_entry) = catalog
        .custom_properties
        .iter()
        .find(|e| matches!(e.target, CustomPropertyTarget::Sentinel(SentinelField::JiraIssueKey)))
    {
        let mut updated = incident.clone();
        updated.id = Some(incident_id);
        updated.custom_properties.insert(jira_key_entry.slot, TypedValue::Text(key.clone()));
        if let Err(e) = hub.update_incident(&updated).await {
            emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: writing back tracker key failed for incident {incident_id}: {e}"));
        }
    }

    Ok(true)
}

/// Resolve the Tracker version mirroring a Hub release, provisioning one
/// via `createVersion` when no mapping exists yet. Symmetric to the pull
/// path's `resolve_or_create_release`.
#[allow(clippy::too_many_arguments)]
async fn resolve_or_create_tracker_version(
    hub: &HubClient,
    tracker: &TrackerClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    hub_project_id: i64,
    release_id: i64,
    project_key: &str,
    event_log: &Arc<dyn EventLog>,
) -> Option<String> {
    if let Some(existing) = resolver.find_by_internal_id(MappingScope::Artifact(ArtifactKind::Release), Some(hub_project_id), release_id) {
        return Some(existing.external_key);
    }

    let release = match hub.get_release(release_id).await {
        Ok(release) => release,
        Err(e) => {
            emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: failed to fetch hub release {release_id}: {e}"));
            return None;
        }
    };

    match sync_tracker::create_version(tracker, project_key, &release).await {
        Ok(new_key) => {
            if config.persist_auto_created_release_mappings {
                resolver.add_mappings(vec![Mapping::primary(
                    MappingScope::Artifact(ArtifactKind::Release),
                    Some(hub_project_id),
                    release_id,
                    &new_key,
                )]);
            }
            Some(new_key)
        }
        Err(e) => {
            emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: failed to create tracker version for release {release_id}: {e}"));
            None
        }
    }
}

/// Mirror intra-Hub associations onto the newly created Tracker issue:
/// incident-incident associations become issue-links of the configured
/// link type, incident-requirement and incident-test-run associations
/// become web-links pointing back to the related Hub artifact.
async fn link_associations(
    hub: &HubClient,
    tracker: &TrackerClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    hub_project_id: i64,
    incident_id: i64,
    key: &str,
    event_log: &Arc<dyn EventLog>,
) {
    let associations = match hub.get_incident_associations(incident_id).await {
        Ok(associations) => associations,
        Err(e) => {
            emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: failed to fetch associations for incident {incident_id}: {e}"));
            return;
        }
    };

    for association in &associations {
        let result = match association.kind {
            AssociationKind::Incident => link_incident_association(tracker, resolver, config, hub_project_id, key, association).await,
            AssociationKind::Requirement => {
                let hub_url = hub.resolve_url(&format!("~/requirements.do?id={}", association.target_id));
                sync_tracker::add_web_link(tracker, key, &hub_url, "Hub requirement").await
            }
            AssociationKind::TestRun => {
                let hub_url = hub.resolve_url(&format!("~/testruns.do?id={}", association.target_id));
                sync_tracker::add_web_link(tracker, key, &hub_url, "Hub test run").await
            }
        };
        if let Err(e) = result {
            emit(event_log.as_ref(), LogLevel::Error, &format!("push phase: association link failed for {key}: {e}"));
        }
    }
}

async fn link_incident_association(
    tracker: &TrackerClient,
    resolver: &MappingResolver,
    config: &EngineConfig,
    hub_project_id: i64,
    key: &str,
    association: &IncidentAssociation,
) -> sync_tracker::Result<()> {
    let Some(target_mapping) =
        resolver.find_by_internal_id(MappingScope::Artifact(ArtifactKind::Incident), Some(hub_project_id), association.target_id)
    else {
        return Ok(());
    };
    sync_tracker::add_issue_link(tracker, &config.custom.link_type_name, key, &target_mapping.external_key, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::types::CustomProperties;

    fn incident_with(custom_properties: CustomProperties) -> HubIncident {
        HubIncident {
            id: Some(42),
            project_id: 7,
            name: "Crash on login".into(),
            description_html: String::new(),
            status_id: 1,
            type_id: 2,
            priority_id: None,
            severity_id: None,
            opener_id: 5,
            owner_id: None,
            creation_date: chrono::Utc::now(),
            start_date: None,
            closed_date: None,
            detected_release_id: None,
            resolved_release_id: None,
            component_ids: vec![],
            custom_properties,
            comments: vec![],
            attachments: vec![],
        }
    }

    #[test]
    fn no_sync_flag_catalog_opts_everything_in() {
        let incident = incident_with(CustomProperties::new());
        let catalog = HubProjectCatalog::default();
        assert!(is_opted_in(&incident, &catalog));
    }

    #[test]
    fn sync_flag_n_is_never_opted_in() {
        let mut props = CustomProperties::new();
        props.insert(2, TypedValue::List("N".to_string()));
        let incident = incident_with(props);
        let mut catalog = HubProjectCatalog::default();
        catalog.sync_flag = Some(sync_core::types::SyncFlagOptions { slot: 2, yes_option: "Y".into(), no_option: "N".into() });
        assert!(!is_opted_in(&incident, &catalog));
    }

    #[test]
    fn sync_flag_y_is_opted_in() {
        let mut props = CustomProperties::new();
        props.insert(2, TypedValue::List("Y".to_string()));
        let incident = incident_with(props);
        let mut catalog = HubProjectCatalog::default();
        catalog.sync_flag = Some(sync_core::types::SyncFlagOptions { slot: 2, yes_option: "Y".into(), no_option: "N".into() });
        assert!(is_opted_in(&incident, &catalog));
    }

    #[test]
    fn project_key_override_falls_back_to_default_when_slot_blank() {
        let incident = incident_with(CustomProperties::new());
        let mut catalog = HubProjectCatalog::default();
        catalog.project_key_override_slot = Some(3);
        assert_eq!(tracker_project_key(&incident, &catalog, "DEMO"), "DEMO");
    }

    #[test]
    fn project_key_override_uppercases_the_configured_slot_value() {
        let mut props = CustomProperties::new();
        props.insert(3, TypedValue::Text("other".into()));
        let incident = incident_with(props);
        let mut catalog = HubProjectCatalog::default();
        catalog.project_key_override_slot = Some(3);
        assert_eq!(tracker_project_key(&incident, &catalog, "DEMO"), "OTHER");
    }
}
