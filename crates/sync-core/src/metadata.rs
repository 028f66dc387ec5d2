//! The Tracker's create-metadata model: the declaration
//! of which fields and options are valid for creating an issue of a given
//! type in a given project. Shared between `sync-tracker` (which fetches
//! and parses it) and `sync-transform` (which validates/shapes payloads
//! against it), so it lives in `sync-core` to avoid a dependency cycle.

use crate::types::IdName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The prefix that marks a Tracker field as a custom field.
pub const CUSTOM_FIELD_PREFIX: &str = "customfield_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub key: String,
    pub required: bool,
    pub allowed_values: Vec<IdName>,
}

impl FieldMeta {
    pub fn is_custom(&self) -> bool {
        self.key.starts_with(CUSTOM_FIELD_PREFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTypeMeta {
    pub id: i64,
    pub name: String,
    pub fields: BTreeMap<String, FieldMeta>,
}

/// `(projectKey, issueTypeId) -> field catalog`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMetadata {
    pub projects: BTreeMap<String, BTreeMap<i64, IssueTypeMeta>>,
}

impl CreateMetadata {
    pub fn issue_type(&self, project_key: &str, issue_type_id: i64) -> Option<&IssueTypeMeta> {
        self.projects.get(project_key)?.get(&issue_type_id)
    }

    /// Look up an option's id by its display name, for a given field on a
    /// given issue type.
    pub fn option_id_by_name(
        &self,
        project_key: &str,
        issue_type_id: i64,
        field_key: &str,
        name: &str,
    ) -> Option<i64> {
        self.issue_type(project_key, issue_type_id)?
            .fields
            .get(field_key)?
            .allowed_values
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.id)
    }

    /// Look up an option's display name by its id — the inverse of
    /// `option_id_by_name`, used when reconstructing inbound values.
    pub fn option_name_by_id(
        &self,
        project_key: &str,
        issue_type_id: i64,
        field_key: &str,
        id: i64,
    ) -> Option<String> {
        self.issue_type(project_key, issue_type_id)?
            .fields
            .get(field_key)?
            .allowed_values
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.name.clone())
    }
}
