//! Inbound custom-field reconstruction from the raw JSON returned when an
//! issue is fetched.
//!
//! Classification is driven purely by the JSON value's shape, not by the
//! metadata's declared field type — the metadata is only consulted to turn
//! option ids back into display names.

use std::collections::BTreeMap;

use serde_json::Value;
use sync_core::metadata::{CreateMetadata, CUSTOM_FIELD_PREFIX};
use sync_core::types::TypedValue;

/// Reconstruct every `customfield_*` property on `fields` into a
/// `TypedValue`, keyed by the numeric custom-field id. Null, missing, or
/// unrecognized shapes are omitted (not stored as an empty list).
pub fn reconstruct_custom_fields(
    metadata: &CreateMetadata,
    project_key: &str,
    issue_type_id: i64,
    fields: &serde_json::Map<String, Value>,
) -> BTreeMap<i64, TypedValue> {
    let mut out = BTreeMap::new();

    for (key, value) in fields {
        let Some(suffix) = key.strip_prefix(CUSTOM_FIELD_PREFIX) else {
            continue;
        };
        let Ok(field_id) = suffix.parse::<i64>() else {
            continue;
        };

        if let Some(typed) = classify(metadata, project_key, issue_type_id, key, value) {
            out.insert(field_id, typed);
        } else if !value.is_null() {
            tracing::warn!(field = %key, "unrecognized custom-field value shape, leaving absent");
        }
    }

    out
}

fn classify(
    metadata: &CreateMetadata,
    project_key: &str,
    issue_type_id: i64,
    field_key: &str,
    value: &Value,
) -> Option<TypedValue> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                let id = item.get("id")?.as_str()?.parse::<i64>().ok()?;
                let name = metadata
                    .option_name_by_id(project_key, issue_type_id, field_key, id)
                    .unwrap_or_else(|| id.to_string());
                names.push(name);
            }
            Some(TypedValue::MultiList(names))
        }
        Value::Object(obj) => {
            if let Some(id_val) = obj.get("id") {
                let id = id_val.as_str()?.parse::<i64>().ok()?;
                let name = metadata
                    .option_name_by_id(project_key, issue_type_id, field_key, id)
                    .unwrap_or_else(|| id.to_string());
                Some(TypedValue::List(name))
            } else if let Some(name) = obj.get("name").and_then(Value::as_str) {
                Some(TypedValue::User(name.to_string()))
            } else {
                None
            }
        }
        Value::Bool(b) => Some(TypedValue::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(TypedValue::Integer(i))
            } else {
                n.as_f64().map(TypedValue::Decimal)
            }
        }
        Value::String(s) => match chrono::DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(TypedValue::Date(dt.with_timezone(&chrono::Utc))),
            Err(_) => Some(TypedValue::Text(s.clone())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sync_core::metadata::{FieldMeta, IssueTypeMeta};
    use sync_core::types::IdName;

    fn metadata_with_options() -> CreateMetadata {
        let mut meta = CreateMetadata::default();
        let mut fields = BTreeMap::new();
        fields.insert(
            "customfield_10010".to_string(),
            FieldMeta {
                key: "customfield_10010".into(),
                required: false,
                allowed_values: vec![
                    IdName { id: 1, name: "Red".into() },
                    IdName { id: 2, name: "Blue".into() },
                ],
            },
        );
        let mut by_type = BTreeMap::new();
        by_type.insert(
            10001,
            IssueTypeMeta {
                id: 10001,
                name: "Bug".into(),
                fields,
            },
        );
        meta.projects.insert("DEMO".into(), by_type);
        meta
    }

    #[test]
    fn reconstructs_single_select_by_id() {
        let meta = metadata_with_options();
        let raw = serde_json::json!({
            "customfield_10010": { "id": "2", "value": "Blue" }
        });
        let fields = raw.as_object().unwrap();
        let out = reconstruct_custom_fields(&meta, "DEMO", 10001, fields);
        assert_eq!(out.get(&10010), Some(&TypedValue::List("Blue".to_string())));
    }

    #[test]
    fn reconstructs_multi_select_names() {
        let meta = metadata_with_options();
        let raw = json!({
            "customfield_10010": [{ "id": "1" }, { "id": "2" }]
        });
        let out = reconstruct_custom_fields(&meta, "DEMO", 10001, raw.as_object().unwrap());
        assert_eq!(
            out.get(&10010),
            Some(&TypedValue::MultiList(vec!["Red".into(), "Blue".into()]))
        );
    }

    #[test]
    fn reconstructs_user_object() {
        let meta = CreateMetadata::default();
        let raw = json!({ "customfield_10020": { "name": "alice" } });
        let out = reconstruct_custom_fields(&meta, "DEMO", 1, raw.as_object().unwrap());
        assert_eq!(out.get(&10020), Some(&TypedValue::User("alice".into())));
    }

    #[test]
    fn reconstructs_scalars() {
        let meta = CreateMetadata::default();
        let raw = json!({
            "customfield_1": true,
            "customfield_2": 42,
            "customfield_3": 3.5,
            "customfield_4": "plain text",
            "customfield_5": "2024-07-15T00:00:00Z",
        });
        let out = reconstruct_custom_fields(&meta, "DEMO", 1, raw.as_object().unwrap());
        assert_eq!(out.get(&1), Some(&TypedValue::Boolean(true)));
        assert_eq!(out.get(&2), Some(&TypedValue::Integer(42)));
        assert_eq!(out.get(&3), Some(&TypedValue::Decimal(3.5)));
        assert_eq!(out.get(&4), Some(&TypedValue::Text("plain text".into())));
        assert!(matches!(out.get(&5), Some(TypedValue::Date(_))));
    }

    #[test]
    fn null_value_is_absent_not_empty() {
        let meta = CreateMetadata::default();
        let raw = json!({ "customfield_9": null });
        let out = reconstruct_custom_fields(&meta, "DEMO", 1, raw.as_object().unwrap());
        assert!(!out.contains_key(&9));
    }
}
