//! Bidirectional enum-value mappings (status, type, severity, requirement
//! type) between Hub numeric ids and Tracker option values, plus the
//! Hub's per-project catalog of custom-property wiring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CustomPropertyCatalogEntry, SyncFlagOptions};

/// A two-way lookup table between a Hub id and its Tracker-side value
/// (an option name for select fields, a numeric id-as-string for others).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumMapping {
    by_hub_id: BTreeMap<i64, String>,
    by_tracker_value: BTreeMap<String, i64>,
}

impl EnumMapping {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, String)>) -> Self {
        let mut by_hub_id = BTreeMap::new();
        let mut by_tracker_value = BTreeMap::new();
        for (hub_id, tracker_value) in pairs {
            by_tracker_value.insert(tracker_value.clone(), hub_id);
            by_hub_id.insert(hub_id, tracker_value);
        }
        Self { by_hub_id, by_tracker_value }
    }

    pub fn to_tracker(&self, hub_id: i64) -> Option<&str> {
        self.by_hub_id.get(&hub_id).map(String::as_str)
    }

    pub fn to_hub(&self, tracker_value: &str) -> Option<i64> {
        self.by_tracker_value.get(tracker_value).copied()
    }
}

/// Everything the Value/Artifact Transformers need about one Hub project's
/// enum wiring, fetched fresh at the start of each project pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubProjectCatalog {
    pub incident_status: EnumMapping,
    pub incident_type: EnumMapping,
    pub requirement_status: EnumMapping,
    pub requirement_type: EnumMapping,
    pub severity: EnumMapping,
    pub priority: EnumMapping,
    pub custom_properties: Vec<CustomPropertyCatalogEntry>,
    pub sync_flag: Option<SyncFlagOptions>,
    /// Text-typed slot holding a per-incident Tracker project key override,
    /// consulted by the push phase before falling back to the project pair.
    pub project_key_override_slot: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_mapping_round_trips_in_both_directions() {
        let map = EnumMapping::from_pairs([(1, "New".to_string()), (2, "Done".to_string())]);
        assert_eq!(map.to_tracker(1), Some("New"));
        assert_eq!(map.to_hub("Done"), Some(2));
        assert_eq!(map.to_hub("Unknown"), None);
    }
}
