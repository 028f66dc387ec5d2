//! Metadata-driven shaping of a `createIssue` payload against the
//! Tracker's discovered create-metadata, before it is sent over the wire.

use serde_json::Value;
use sync_core::metadata::{CreateMetadata, CUSTOM_FIELD_PREFIX};
use sync_core::{Result, SyncError};

/// Shape `fields` into a payload the Tracker will accept for creating an
/// issue of `issue_type_id` in `project_key`.
///
/// If the metadata carries no node for this `(project_key, issue_type_id)`
/// pair, the payload is returned unchanged — there is nothing to validate
/// against.
pub fn shape_create_payload(
    metadata: &CreateMetadata,
    project_key: &str,
    issue_type_id: i64,
    mut fields: Value,
) -> Result<Value> {
    let Some(issue_type) = metadata.issue_type(project_key, issue_type_id) else {
        return Ok(fields);
    };

    let Value::Object(ref mut map) = fields else {
        return Ok(fields);
    };

    for (field_key, field_meta) in &issue_type.fields {
        if field_meta.required && !field_meta.is_custom() && !map.contains_key(field_key) {
            return Err(SyncError::ValidationFault {
                summary: format!("missing required field for {project_key}/{issue_type_id}"),
                messages: vec![(field_key.clone(), "required field missing".to_string())],
            });
        }
    }

    map.retain(|key, _| key == "issuetype" || issue_type.fields.contains_key(key));

    for (field_key, value) in map.iter_mut() {
        if !field_key.starts_with(CUSTOM_FIELD_PREFIX) {
            continue;
        }
        let Some(field_meta) = issue_type.fields.get(field_key) else { continue };
        resolve_option_values(value, &field_meta.allowed_values);
    }

    Ok(fields)
}

fn resolve_option_values(value: &mut Value, allowed_values: &[sync_core::types::IdName]) {
    match value {
        Value::Object(obj) if obj.contains_key("id") => {
            if !option_id_allowed(obj, allowed_values) {
                *value = Value::Null;
            }
        }
        Value::Array(items) => {
            items.retain_mut(|item| match item {
                Value::Object(obj) => option_id_allowed(obj, allowed_values),
                _ => true,
            });
        }
        _ => {}
    }
}

fn option_id_allowed(obj: &serde_json::Map<String, Value>, allowed_values: &[sync_core::types::IdName]) -> bool {
    let Some(id) = obj.get("id").and_then(Value::as_str).and_then(|s| s.parse::<i64>().ok()) else {
        return true;
    };
    allowed_values.iter().any(|v| v.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use sync_core::metadata::{FieldMeta, IssueTypeMeta};
    use sync_core::types::IdName;

    fn metadata_with_bug_type() -> CreateMetadata {
        let mut fields = BTreeMap::new();
        fields.insert(
            "summary".to_string(),
            FieldMeta { key: "summary".into(), required: true, allowed_values: vec![] },
        );
        fields.insert(
            "customfield_10010".to_string(),
            FieldMeta {
                key: "customfield_10010".into(),
                required: false,
                allowed_values: vec![IdName { id: 1, name: "High".into() }],
            },
        );
        let mut issue_types = BTreeMap::new();
        issue_types.insert(1, IssueTypeMeta { id: 1, name: "Bug".into(), fields });
        let mut projects = BTreeMap::new();
        projects.insert("DEMO".to_string(), issue_types);
        CreateMetadata { projects }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let metadata = metadata_with_bug_type();
        let fields = serde_json::json!({ "issuetype": { "id": "1" } });
        let err = shape_create_payload(&metadata, "DEMO", 1, fields).unwrap_err();
        matches!(err, SyncError::ValidationFault { .. });
    }

    #[test]
    fn drops_fields_absent_from_metadata_but_keeps_issuetype() {
        let metadata = metadata_with_bug_type();
        let fields = serde_json::json!({
            "issuetype": { "id": "1" },
            "summary": "test",
            "customfield_99999": "stray",
        });
        let shaped = shape_create_payload(&metadata, "DEMO", 1, fields).unwrap();
        let obj = shaped.as_object().unwrap();
        assert!(obj.contains_key("issuetype"));
        assert!(obj.contains_key("summary"));
        assert!(!obj.contains_key("customfield_99999"));
    }

    #[test]
    fn unknown_metadata_node_passes_payload_through() {
        let metadata = CreateMetadata::default();
        let fields = serde_json::json!({ "anything": "goes" });
        let shaped = shape_create_payload(&metadata, "UNKNOWN", 99, fields.clone()).unwrap();
        assert_eq!(shaped, fields);
    }

    #[test]
    fn mismatched_option_id_is_silently_dropped() {
        let metadata = metadata_with_bug_type();
        let fields = serde_json::json!({
            "issuetype": { "id": "1" },
            "summary": "test",
            "customfield_10010": { "id": "999" },
        });
        let shaped = shape_create_payload(&metadata, "DEMO", 1, fields).unwrap();
        assert_eq!(shaped["customfield_10010"], Value::Null);
    }
}
