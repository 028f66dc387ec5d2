//! End-to-end coverage for pushing a newly opted-in Hub incident through to
//! a shaped Tracker create-issue payload, plus the mapping/document
//! bookkeeping that accompanies it. No network client is involved — the
//! catalog and metadata below stand in for what the Hub/Tracker clients
//! would have fetched.

use std::collections::BTreeMap;
use std::sync::Arc;

use sync_core::enums::{EnumMapping, HubProjectCatalog};
use sync_core::mapping::{InMemoryMappingStore, MappingResolver, MappingStore};
use sync_core::metadata::{CreateMetadata, FieldMeta, IssueTypeMeta};
use sync_core::types::{ArtifactKind, Attachment, CustomProperties, HubIncident, Mapping, MappingScope};
use sync_transform::{hub_incident_to_tracker_fields, shape_create_payload, PushContext};

fn bug_metadata() -> CreateMetadata {
    let mut fields = BTreeMap::new();
    for (key, required) in [("project", true), ("summary", true), ("reporter", false), ("status", false)] {
        fields.insert(key.to_string(), FieldMeta { key: key.to_string(), required, allowed_values: vec![] });
    }
    let mut issue_types = BTreeMap::new();
    issue_types.insert(10001, IssueTypeMeta { id: 10001, name: "Bug".into(), fields });
    let mut projects = BTreeMap::new();
    projects.insert("DEMO".to_string(), issue_types);
    CreateMetadata { projects }
}

fn incident_42() -> HubIncident {
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
        custom_properties: CustomProperties::new(),
        comments: vec![],
        attachments: vec![],
    }
}

fn catalog_with_status_and_type_mappings() -> HubProjectCatalog {
    HubProjectCatalog {
        incident_status: EnumMapping::from_pairs([(1, "10000".to_string())]),
        incident_type: EnumMapping::from_pairs([(2, "10001".to_string())]),
        ..Default::default()
    }
}

#[test]
fn create_payload_has_exactly_the_declared_fields() {
    let catalog = catalog_with_status_and_type_mappings();
    let incident = incident_42();
    let tracker_issue_type_id = catalog.incident_type.to_tracker(incident.type_id).and_then(|s| s.parse().ok()).unwrap();
    let ctx = PushContext { reporter_login: "alice".into(), assignee_login: None, tracker_issue_type_id, use_security_level: false, detected_version_key: None, resolved_version_key: None };

    let raw_fields = hub_incident_to_tracker_fields(&incident, &catalog, "DEMO", &ctx);
    let shaped = shape_create_payload(&bug_metadata(), "DEMO", tracker_issue_type_id, raw_fields).unwrap();
    let obj = shaped.as_object().unwrap();

    assert_eq!(obj["project"], serde_json::json!({ "key": "DEMO" }));
    assert_eq!(obj["summary"], serde_json::json!("Crash on login"));
    assert_eq!(obj["issuetype"], serde_json::json!({ "id": "10001" }));
    assert_eq!(obj["reporter"], serde_json::json!({ "name": "alice" }));

    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort();
    let expected = ["issuetype", "project", "reporter", "status", "summary"];
    assert_eq!(keys, expected.iter().collect::<Vec<_>>());
}

#[test]
fn new_incident_mapping_is_buffered_and_findable_before_flush() {
    let store = Arc::new(InMemoryMappingStore::new());
    let resolver = MappingResolver::new(store.clone(), false);

    resolver.add_mappings(vec![Mapping::primary(MappingScope::Artifact(ArtifactKind::Incident), Some(7), 42, "DEMO-1")]);

    let found = resolver
        .find_by_internal_id(MappingScope::Artifact(ArtifactKind::Incident), Some(7), 42)
        .expect("buffered mapping must be visible before flush");
    assert_eq!(found.external_key, "DEMO-1");
    assert!(store.all().is_empty(), "buffered mapping must not reach the store early");

    resolver.flush();
    assert_eq!(store.all().len(), 1);
}

#[test]
fn hub_document_points_at_the_tracker_browse_url() {
    let tracker_base = "https://tracker.example.com";
    let key = "DEMO-1";
    let link = Attachment::Url { url: format!("{tracker_base}/browse/{key}"), label: key.to_string() };
    match link {
        Attachment::Url { url, label } => {
            assert_eq!(url, "https://tracker.example.com/browse/DEMO-1");
            assert_eq!(label, "DEMO-1");
        }
        _ => panic!("expected a url attachment"),
    }
}
