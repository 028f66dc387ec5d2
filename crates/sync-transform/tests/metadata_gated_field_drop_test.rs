//! A Hub custom property wired to a Tracker field the current project's
//! create-metadata doesn't declare must be dropped silently rather than
//! sent and rejected by the Tracker.

use std::collections::BTreeMap;

use sync_core::enums::{EnumMapping, HubProjectCatalog};
use sync_core::metadata::{CreateMetadata, FieldMeta, IssueTypeMeta};
use sync_core::types::{CustomPropertyCatalogEntry, CustomPropertyTarget, CustomProperties, HubIncident, ScalarHint, SlotKind, TypedValue};
use sync_transform::{hub_incident_to_tracker_fields, shape_create_payload, PushContext};

fn metadata_without_customfield_20099() -> CreateMetadata {
    let mut fields = BTreeMap::new();
    for key in ["project", "summary", "reporter"] {
        fields.insert(key.to_string(), FieldMeta { key: key.to_string(), required: key != "reporter", allowed_values: vec![] });
    }
    let mut issue_types = BTreeMap::new();
    issue_types.insert(10001, IssueTypeMeta { id: 10001, name: "Bug".into(), fields });
    let mut projects = BTreeMap::new();
    projects.insert("DEMO".to_string(), issue_types);
    CreateMetadata { projects }
}

#[test]
fn undeclared_custom_field_is_omitted_from_the_create_payload() {
    let catalog = HubProjectCatalog {
        custom_properties: vec![CustomPropertyCatalogEntry {
            slot: 9,
            kind: SlotKind::Scalar,
            target: CustomPropertyTarget::TrackerField(20099),
            option_map: EnumMapping::default(),
            scalar_hint: ScalarHint::Text,
        }],
        ..Default::default()
    };

    let mut custom_properties = CustomProperties::new();
    custom_properties.insert(9, TypedValue::Text("triage notes".into()));

    let incident = HubIncident {
        id: Some(99),
        project_id: 7,
        name: "Slow checkout".into(),
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
    };

    let ctx = PushContext { reporter_login: "alice".into(), assignee_login: None, tracker_issue_type_id: 10001, use_security_level: false, detected_version_key: None, resolved_version_key: None };
    let raw_fields = hub_incident_to_tracker_fields(&incident, &catalog, "DEMO", &ctx);
    assert!(raw_fields.as_object().unwrap().contains_key("customfield_20099"));

    let shaped = shape_create_payload(&metadata_without_customfield_20099(), "DEMO", 10001, raw_fields).unwrap();
    assert!(!shaped.as_object().unwrap().contains_key("customfield_20099"));
}
