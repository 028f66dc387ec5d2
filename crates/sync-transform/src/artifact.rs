//! Translates between Hub incidents/requirements and Tracker issues: status,
//! type, priority/severity mapping, components, comments, and release
//! auto-provisioning. Custom-field values are delegated to [`crate::value`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use sync_core::types::{
    dedupe_comments, Comment, CustomProperties, HubIncident, HubRequirement, ReleaseVersion, SlotKind, TrackerIssue,
    TypedValue, DEFAULT_REQUIREMENT_STATUS_ID, DEFAULT_REQUIREMENT_TYPE_ID,
};
use sync_core::enums::HubProjectCatalog;

use crate::value::{pull_custom_value, push_custom_value, PushTarget};

const NEW_ARTIFACT_NAME_STUB: &str = "Untitled Tracker issue";
const NEW_ARTIFACT_DESCRIPTION_STUB: &str = "(no description provided)";

fn html_encode(plain: &str) -> String {
    plain
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\n', "<br/>")
}

/// Pre-resolved identifiers the Mapping Resolver had to fetch with async
/// I/O before the pure transform below can run.
pub struct IncidentDefaults {
    pub opener_id: i64,
    pub owner_id: Option<i64>,
    pub detected_release_id: Option<i64>,
    pub resolved_release_id: Option<i64>,
}

/// Decide what Hub release/version needs auto-creating for a Tracker
/// version that has no mapping yet. Returns `None` when `version` is
/// already mapped by the caller (this function does not consult mappings;
/// callers check the mapping store first and only invoke this on a miss).
pub fn plan_release_for_version(version: &ReleaseVersion, now: DateTime<Utc>) -> (String, DateTime<Utc>, DateTime<Utc>) {
    let truncated = ReleaseVersion::truncated_version_number(&version.name);
    match version.end_date {
        Some(release_date) => (truncated, release_date - Duration::days(1), release_date),
        None => (truncated, now, now + Duration::days(5)),
    }
}

/// Build a Hub incident from a Tracker issue, applying enum mappings from
/// `catalog` and delegating custom-field slots to the Value Transformer.
pub fn tracker_issue_to_hub_incident(
    issue: &TrackerIssue,
    catalog: &HubProjectCatalog,
    project_id: i64,
    defaults: IncidentDefaults,
    existing_comments: &[Comment],
) -> HubIncident {
    let status_id = catalog.incident_status.to_hub(&issue.status.name).unwrap_or(1);
    let type_id = catalog.incident_type.to_hub(&issue.issue_type.name).unwrap_or(1);
    let severity_id = catalog
        .severity
        .to_hub(issue.priority.as_ref().map(|p| p.name.as_str()).unwrap_or(""));

    let name = if issue.summary.trim().is_empty() {
        NEW_ARTIFACT_NAME_STUB.to_string()
    } else {
        issue.summary.clone()
    };
    let description_html = if issue.description.trim().is_empty() {
        NEW_ARTIFACT_DESCRIPTION_STUB.to_string()
    } else {
        html_encode(&issue.description)
    };

    let fresh_comments = dedupe_comments(existing_comments, &issue.comments);
    let mut comments: Vec<Comment> = existing_comments.to_vec();
    comments.extend(fresh_comments.into_iter().cloned());

    HubIncident {
        id: None,
        project_id,
        name,
        description_html,
        status_id,
        type_id,
        priority_id: None,
        severity_id,
        opener_id: defaults.opener_id,
        owner_id: defaults.owner_id,
        creation_date: issue.created,
        start_date: None,
        closed_date: issue.resolution_date,
        detected_release_id: defaults.detected_release_id,
        resolved_release_id: defaults.resolved_release_id,
        component_ids: vec![],
        custom_properties: pull_custom_properties(issue, catalog),
        comments,
        attachments: vec![],
    }
}

/// Build a Hub requirement from a Tracker issue, falling back to the
/// default status/type when no enum mapping exists.
pub fn tracker_issue_to_hub_requirement(
    issue: &TrackerIssue,
    catalog: &HubProjectCatalog,
    project_id: i64,
    defaults: IncidentDefaults,
    existing_comments: &[Comment],
) -> HubRequirement {
    let status_id = catalog
        .requirement_status
        .to_hub(&issue.status.name)
        .unwrap_or(DEFAULT_REQUIREMENT_STATUS_ID);
    let requirement_type_id = catalog
        .requirement_type
        .to_hub(&issue.issue_type.name)
        .unwrap_or(DEFAULT_REQUIREMENT_TYPE_ID);

    let name = if issue.summary.trim().is_empty() {
        NEW_ARTIFACT_NAME_STUB.to_string()
    } else {
        issue.summary.clone()
    };
    let description_html = if issue.description.trim().is_empty() {
        NEW_ARTIFACT_DESCRIPTION_STUB.to_string()
    } else {
        html_encode(&issue.description)
    };

    let fresh_comments = dedupe_comments(existing_comments, &issue.comments);
    let mut comments: Vec<Comment> = existing_comments.to_vec();
    comments.extend(fresh_comments.into_iter().cloned());

    HubRequirement {
        id: None,
        project_id,
        name,
        description_html,
        status_id,
        requirement_type_id,
        importance_id: None,
        author_id: defaults.opener_id,
        owner_id: defaults.owner_id,
        creation_date: issue.created,
        due_date: issue.due_date,
        resolved_date: issue.resolution_date,
        detected_release_id: defaults.detected_release_id,
        resolved_release_id: defaults.resolved_release_id,
        component_ids: vec![],
        custom_properties: pull_custom_properties(issue, catalog),
        comments,
        attachments: vec![],
    }
}

fn pull_custom_properties(issue: &TrackerIssue, catalog: &HubProjectCatalog) -> CustomProperties {
    let mut out = CustomProperties::new();
    for entry in &catalog.custom_properties {
        if matches!(entry.kind, SlotKind::User) {
            continue;
        }
        if let Some(value) = pull_custom_value(entry, issue) {
            out.insert(entry.slot, value);
        }
    }
    out
}

/// Mirror a Tracker custom field's value into the Hub's native `severityId`,
/// per the `severityCustomFieldId` option.
pub fn mirror_severity(issue: &TrackerIssue, severity_custom_field_id: i64, catalog: &HubProjectCatalog) -> Option<i64> {
    let value = issue.custom_fields.get(&severity_custom_field_id)?;
    let TypedValue::List(name) = value else { return None };
    catalog.severity.to_hub(name)
}

/// Pre-resolved data the engine gathers before building the create-issue
/// payload for a pushed Hub incident.
pub struct PushContext {
    pub reporter_login: String,
    pub assignee_login: Option<String>,
    pub tracker_issue_type_id: i64,
    /// Mirrors `CustomOptions::use_security_level` (custom02): gates whether
    /// a `SecurityLevel` slot is pushed onto the Tracker `security` field.
    pub use_security_level: bool,
    /// Tracker version key resolved (or provisioned) for `incident.detected_release_id`.
    pub detected_version_key: Option<String>,
    /// Tracker version key resolved (or provisioned) for `incident.resolved_release_id`.
    pub resolved_version_key: Option<String>,
}

/// Build the raw `fields` object for `createIssue`, ready to be shaped by
/// [`crate::validate::shape_create_payload`].
pub fn hub_incident_to_tracker_fields(
    incident: &HubIncident,
    catalog: &HubProjectCatalog,
    project_key: &str,
    ctx: &PushContext,
) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    fields.insert("project".to_string(), serde_json::json!({ "key": project_key }));
    fields.insert("issuetype".to_string(), serde_json::json!({ "id": ctx.tracker_issue_type_id.to_string() }));
    fields.insert("summary".to_string(), serde_json::json!(incident.name));
    fields.insert("description".to_string(), serde_json::json!(strip_html(&incident.description_html)));
    fields.insert("reporter".to_string(), serde_json::json!({ "name": ctx.reporter_login }));
    if let Some(assignee) = &ctx.assignee_login {
        fields.insert("assignee".to_string(), serde_json::json!({ "name": assignee }));
    }
    if let Some(tracker_status) = catalog.incident_status.to_tracker(incident.status_id) {
        fields.insert("status".to_string(), serde_json::json!({ "name": tracker_status }));
    }
    if let Some(priority) = incident.priority_id.and_then(|id| catalog.priority.to_tracker(id)) {
        fields.insert("priority".to_string(), serde_json::json!({ "name": priority }));
    }
    if let Some(key) = &ctx.detected_version_key {
        fields.insert("versions".to_string(), serde_json::json!([{ "id": key }]));
    }
    if let Some(key) = &ctx.resolved_version_key {
        fields.insert("fixVersions".to_string(), serde_json::json!([{ "id": key }]));
    }

    let mut components: Vec<String> = Vec::new();
    let mut custom_fields = serde_json::Map::new();
    for entry in &catalog.custom_properties {
        let Some(value) = incident.custom_properties.get(&entry.slot) else { continue };
        match push_custom_value(entry, value) {
            Some(PushTarget::Components(names)) => components.extend(names),
            Some(PushTarget::CustomField(id, value)) => {
                custom_fields.insert(format!("customfield_{id}"), value);
            }
            Some(PushTarget::Resolution(id)) => {
                fields.insert("resolution".to_string(), serde_json::json!({ "id": id }));
            }
            Some(PushTarget::SecurityLevel(id)) => {
                if ctx.use_security_level {
                    fields.insert("security".to_string(), serde_json::json!({ "id": id.to_string() }));
                }
            }
            None => {}
        }
    }
    if !components.is_empty() {
        let values: Vec<serde_json::Value> = components.into_iter().map(|name| serde_json::json!({ "name": name })).collect();
        fields.insert("components".to_string(), serde_json::Value::Array(values));
    }
    for (key, value) in custom_fields {
        fields.insert(key, value);
    }

    serde_json::Value::Object(fields)
}

fn strip_html(html: &str) -> String {
    html.replace("<br/>", "\n")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}
