//! Per-field coercion between Hub typed values and Tracker JSON values.
//!
//! Dispatch is driven by the catalog entry's `kind`/`target`, never by
//! guessing from the value itself — the custom-property catalog is the
//! single source of truth for which branch applies.

use sync_core::types::{CustomPropertyCatalogEntry, CustomPropertyTarget, ScalarHint, SentinelField, SlotKind, TrackerIssue, TypedValue};

/// Inbound (Tracker → Hub) per-field coercion.
///
/// `environment`/`tracker_key` are passed separately since they come from
/// dedicated `TrackerIssue` fields rather than `custom_fields`.
pub fn pull_custom_value(entry: &CustomPropertyCatalogEntry, issue: &TrackerIssue) -> Option<TypedValue> {
    match (&entry.kind, &entry.target) {
        (SlotKind::SingleList, CustomPropertyTarget::Sentinel(SentinelField::Resolution)) => {
            let resolution = issue.resolution.as_ref()?;
            let hub_option = entry.option_map.to_hub(&resolution.id.to_string())?;
            Some(TypedValue::List(hub_option.to_string()))
        }
        (SlotKind::SingleList, CustomPropertyTarget::Sentinel(SentinelField::SecurityLevel)) => None,
        (SlotKind::SingleList, CustomPropertyTarget::TrackerField(field_id)) => {
            let value = issue.custom_fields.get(field_id)?;
            let TypedValue::List(name) = value else { return None };
            let hub_option = entry.option_map.to_hub(name)?;
            Some(TypedValue::List(hub_option.to_string()))
        }
        (SlotKind::MultiList, CustomPropertyTarget::Sentinel(SentinelField::Component)) => {
            let mapped: Vec<String> = issue
                .components
                .iter()
                .filter_map(|name| entry.option_map.to_hub(name).map(|id| id.to_string()))
                .collect();
            Some(TypedValue::MultiList(mapped))
        }
        (SlotKind::MultiList, CustomPropertyTarget::TrackerField(field_id)) => {
            let value = issue.custom_fields.get(field_id)?;
            let TypedValue::MultiList(names) = value else { return None };
            let mapped: Vec<String> = names
                .iter()
                .filter_map(|name| entry.option_map.to_hub(name).map(|id| id.to_string()))
                .collect();
            Some(TypedValue::MultiList(mapped))
        }
        (SlotKind::User, _) => {
            // The caller resolves the login through the mapping resolver's
            // `autoMapUsers` bypass; this branch never runs without it.
            None
        }
        (SlotKind::Scalar, CustomPropertyTarget::Sentinel(SentinelField::Environment)) => {
            issue.environment.clone().map(TypedValue::Text)
        }
        (SlotKind::Scalar, CustomPropertyTarget::Sentinel(SentinelField::JiraIssueKey)) => {
            Some(TypedValue::Text(issue.key.clone()))
        }
        (SlotKind::Scalar, CustomPropertyTarget::TrackerField(field_id)) => {
            let value = issue.custom_fields.get(field_id)?;
            coerce_scalar(value, entry.scalar_hint)
        }
        _ => {
            tracing::warn!(slot = entry.slot, "unrecognized custom-property pull branch, leaving absent");
            None
        }
    }
}

fn coerce_scalar(value: &TypedValue, hint: ScalarHint) -> Option<TypedValue> {
    match value {
        TypedValue::Boolean(_) | TypedValue::Date(_) | TypedValue::Decimal(_) | TypedValue::Integer(_) => {
            Some(value.clone())
        }
        TypedValue::Text(text) => match hint {
            ScalarHint::Boolean => text.trim().parse::<bool>().ok().map(TypedValue::Boolean),
            ScalarHint::Integer => text.trim().parse::<i64>().ok().map(TypedValue::Integer),
            ScalarHint::Decimal => text.trim().parse::<f64>().ok().map(TypedValue::Decimal),
            ScalarHint::Date => chrono::DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|dt| TypedValue::Date(dt.with_timezone(&chrono::Utc))),
            ScalarHint::Text => Some(TypedValue::Text(text.clone())),
        },
        other => Some(TypedValue::Text(format!("{other:?}"))),
    }
}

/// Outbound (Hub → Tracker) per-field contribution. Returns `None` when the
/// slot contributes nothing (e.g. no mapping found for an option value).
pub enum PushTarget {
    /// Set the Tracker issue's top-level `Components` array.
    Components(Vec<String>),
    /// Set a value inside the Tracker `customfield_<id>` map.
    CustomField(i64, serde_json::Value),
    /// Set the Tracker `resolution` field.
    Resolution(String),
    /// Set the Tracker `security` field.
    SecurityLevel(i64),
}

pub fn push_custom_value(entry: &CustomPropertyCatalogEntry, value: &TypedValue) -> Option<PushTarget> {
    match (&entry.kind, &entry.target, value) {
        (SlotKind::SingleList, CustomPropertyTarget::Sentinel(SentinelField::Component), TypedValue::List(hub_id)) => {
            let name = entry.option_map.to_tracker(hub_id.parse().ok()?)?;
            Some(PushTarget::Components(vec![name.to_string()]))
        }
        (SlotKind::SingleList, CustomPropertyTarget::Sentinel(SentinelField::Resolution), TypedValue::List(hub_id)) => {
            let tracker_id = entry.option_map.to_tracker(hub_id.parse().ok()?)?;
            Some(PushTarget::Resolution(tracker_id.to_string()))
        }
        (SlotKind::SingleList, CustomPropertyTarget::Sentinel(SentinelField::SecurityLevel), TypedValue::List(hub_id)) => {
            hub_id.parse::<i64>().ok().map(PushTarget::SecurityLevel)
        }
        (SlotKind::SingleList, CustomPropertyTarget::TrackerField(field_id), TypedValue::List(hub_id)) => {
            let option_id = entry.option_map.to_tracker(hub_id.parse().ok()?)?;
            Some(PushTarget::CustomField(*field_id, serde_json::json!({ "id": option_id })))
        }
        (SlotKind::MultiList, CustomPropertyTarget::Sentinel(SentinelField::Component), TypedValue::MultiList(hub_ids)) => {
            let names: Vec<String> = hub_ids
                .iter()
                .filter_map(|id| id.parse().ok())
                .filter_map(|id| entry.option_map.to_tracker(id))
                .map(str::to_string)
                .collect();
            Some(PushTarget::Components(names))
        }
        (SlotKind::MultiList, CustomPropertyTarget::TrackerField(field_id), TypedValue::MultiList(hub_ids)) => {
            let options: Vec<serde_json::Value> = hub_ids
                .iter()
                .filter_map(|id| id.parse().ok())
                .filter_map(|id| entry.option_map.to_tracker(id))
                .map(|option_id| serde_json::json!({ "id": option_id }))
                .collect();
            Some(PushTarget::CustomField(*field_id, serde_json::Value::Array(options)))
        }
        (SlotKind::User, CustomPropertyTarget::TrackerField(field_id), TypedValue::User(login)) => {
            Some(PushTarget::CustomField(*field_id, serde_json::json!({ "name": login })))
        }
        (SlotKind::Scalar, CustomPropertyTarget::TrackerField(field_id), other) => {
            serde_json::to_value(other).ok().map(|v| PushTarget::CustomField(*field_id, v))
        }
        _ => None,
    }
}
