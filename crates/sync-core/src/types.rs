//! The shared data model: mappings, artifacts, issues, typed
//! values, releases, and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Which kind of Hub artifact a mapping's `internal_id` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Incident,
    Requirement,
    Release,
}

/// The scope a [`Mapping`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingScope {
    Project,
    User,
    Artifact(ArtifactKind),
    CustomProperty,
    CustomPropertyValue,
}

/// A persisted link between a Hub-side internal id and a Tracker-side
/// external key, within a scope and optionally a project.
///
/// Invariants:
/// - `(scope, hub_project_id, internal_id)` uniquely identifies a primary entry.
/// - Multiple non-primary entries may share an `internal_id` (alias keys).
/// - Lookup by `external_key` returns the first match in iteration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub scope: MappingScope,
    pub hub_project_id: Option<i64>,
    pub internal_id: i64,
    pub external_key: String,
    pub primary: bool,
}

impl Mapping {
    pub fn primary(
        scope: MappingScope,
        hub_project_id: Option<i64>,
        internal_id: i64,
        external_key: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            hub_project_id,
            internal_id,
            external_key: external_key.into(),
            primary: true,
        }
    }
}

// ---------------------------------------------------------------------------
// TypedValue
// ---------------------------------------------------------------------------

/// A tagged union over every custom-property value shape the two systems
/// can produce. Exactly one branch is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    List(String),
    MultiList(Vec<String>),
    User(String),
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment on either side. De-duplication is defined solely on `body`
/// — `dedup_key` is the only thing callers should compare on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub author_login: String,
    pub body: String,
    pub created: DateTime<Utc>,
}

impl Comment {
    pub fn dedup_key(&self) -> &str {
        &self.body
    }
}

/// Returns the subset of `incoming` whose `dedup_key()` is not already
/// present among `existing`, preserving `incoming`'s order.
pub fn dedupe_comments<'a>(existing: &[Comment], incoming: &'a [Comment]) -> Vec<&'a Comment> {
    let existing_bodies: std::collections::HashSet<&str> =
        existing.iter().map(Comment::dedup_key).collect();
    incoming
        .iter()
        .filter(|c| !existing_bodies.contains(c.dedup_key()))
        .collect()
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

/// What kind of artifact the other end of an [`IncidentAssociation`] points
/// at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    Incident,
    Requirement,
    TestRun,
}

/// One intra-Hub association edge fetched for a pushed incident: the id of
/// the related artifact and what kind of artifact it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentAssociation {
    pub target_id: i64,
    pub kind: AssociationKind,
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Attachment {
    File { filename: String, bytes: Vec<u8> },
    Url { url: String, label: String },
}

// ---------------------------------------------------------------------------
// Release / Version
// ---------------------------------------------------------------------------

/// A release on the Hub, or its mirror version on the Tracker. Exactly one
/// of `hub_id` / `external_key` is populated depending on which side
/// produced this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseVersion {
    pub hub_id: Option<i64>,
    pub external_key: Option<String>,
    pub name: String,
    /// Truncated to at most 10 characters before being written to the Hub.
    pub version_number: String,
    pub active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub released: Option<bool>,
    pub archived: Option<bool>,
}

impl ReleaseVersion {
    /// Truncate `version_number` to the Hub's 10-character limit.
    pub fn truncated_version_number(raw: &str) -> String {
        raw.chars().take(10).collect()
    }
}

// ---------------------------------------------------------------------------
// Hub artifacts
// ---------------------------------------------------------------------------

pub type CustomProperties = BTreeMap<u8, TypedValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubIncident {
    pub id: Option<i64>,
    pub project_id: i64,
    pub name: String,
    pub description_html: String,
    pub status_id: i64,
    pub type_id: i64,
    pub priority_id: Option<i64>,
    pub severity_id: Option<i64>,
    pub opener_id: i64,
    pub owner_id: Option<i64>,
    pub creation_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub closed_date: Option<DateTime<Utc>>,
    pub detected_release_id: Option<i64>,
    pub resolved_release_id: Option<i64>,
    pub component_ids: Vec<i64>,
    pub custom_properties: CustomProperties,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubRequirement {
    pub id: Option<i64>,
    pub project_id: i64,
    pub name: String,
    pub description_html: String,
    pub status_id: i64,
    pub requirement_type_id: i64,
    pub importance_id: Option<i64>,
    pub author_id: i64,
    pub owner_id: Option<i64>,
    pub creation_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub resolved_date: Option<DateTime<Utc>>,
    pub detected_release_id: Option<i64>,
    pub resolved_release_id: Option<i64>,
    pub component_ids: Vec<i64>,
    pub custom_properties: CustomProperties,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

/// Status default used when no status mapping exists for an inbound
/// requirement.
pub const DEFAULT_REQUIREMENT_STATUS_ID: i64 = 1;
/// Type default used when no type mapping exists ("User Story" id=4).
pub const DEFAULT_REQUIREMENT_TYPE_ID: i64 = 4;

// ---------------------------------------------------------------------------
// Tracker issue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerIssue {
    pub key: String,
    pub project_key: String,
    pub issue_type: IdName,
    pub status: IdName,
    pub priority: Option<IdName>,
    pub resolution: Option<IdName>,
    pub reporter: String,
    pub assignee: Option<String>,
    pub summary: String,
    pub description: String,
    pub environment: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub resolution_date: Option<DateTime<Utc>>,
    pub versions: Vec<ReleaseVersion>,
    pub fix_versions: Vec<ReleaseVersion>,
    pub components: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub comments: Vec<Comment>,
    pub custom_fields: BTreeMap<i64, TypedValue>,
    pub security_level_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Custom-property catalog
// ---------------------------------------------------------------------------

/// A reserved external-key string that selects a special transformer branch
/// instead of addressing a Tracker custom-field id directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentinelField {
    Environment,
    Component,
    Resolution,
    SecurityLevel,
    JiraIssueKey,
}

impl SentinelField {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Environment" => Some(Self::Environment),
            "Component" => Some(Self::Component),
            "Resolution" => Some(Self::Resolution),
            "SecurityLevel" => Some(Self::SecurityLevel),
            "JiraIssueKey" => Some(Self::JiraIssueKey),
            _ => None,
        }
    }
}

/// What a Hub custom-property slot is wired to on the Tracker side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CustomPropertyTarget {
    Sentinel(SentinelField),
    TrackerField(i64),
}

/// The runtime shape of a Hub custom-property slot, which governs which
/// Value Transformer branch applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    SingleList,
    MultiList,
    User,
    Scalar,
}

/// The declared primitive type of a scalar Hub slot, consulted when an
/// inbound Tracker value arrives as free text and must be coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarHint {
    Boolean,
    Integer,
    Decimal,
    Date,
    Text,
}

/// One row of the Hub's custom-property catalog, fetched fresh every cycle.
///
/// `option_map` translates this slot's list option names against the
/// Tracker's option values/names for select-typed (single-list,
/// multi-list) slots; it is empty for scalar and user slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPropertyCatalogEntry {
    pub slot: u8,
    pub kind: SlotKind,
    pub target: CustomPropertyTarget,
    pub option_map: crate::enums::EnumMapping,
    /// Only meaningful when `kind == Scalar`.
    pub scalar_hint: ScalarHint,
}

/// The "sync flag" gate: a list-typed custom property whose configured
/// option names are interpreted positionally as Y (first) / N (second).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFlagOptions {
    pub slot: u8,
    pub yes_option: String,
    pub no_option: String,
}

// ---------------------------------------------------------------------------
// ProjectPair
// ---------------------------------------------------------------------------

/// `{hubProjectId, trackerProjectKey}` — stable identity, created
/// administratively. The engine discovers these by scanning
/// `MappingScope::Project` entries in the mapping store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPair {
    pub hub_project_id: i64,
    pub tracker_project_key: String,
}

// ---------------------------------------------------------------------------
// LastSyncAt
// ---------------------------------------------------------------------------

/// When the host supplies no `lastSyncAt`, the engine treats the horizon as
/// 1950-01-01.
pub fn sync_horizon_default() -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(1950, 1, 1, 0, 0, 0).unwrap()
}

pub fn effective_last_sync(last_sync_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    last_sync_at.unwrap_or_else(sync_horizon_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_version_number_to_ten_chars() {
        assert_eq!(
            ReleaseVersion::truncated_version_number("2024.07-release-candidate"),
            "2024.07-re"
        );
        assert_eq!(ReleaseVersion::truncated_version_number("2024.07"), "2024.07");
    }

    #[test]
    fn dedupe_comments_filters_by_body_only() {
        let existing = vec![Comment {
            author_login: "alice".into(),
            body: "fixed".into(),
            created: Utc::now(),
        }];
        let incoming = vec![
            Comment {
                author_login: "bob".into(),
                body: "fixed".into(),
                created: Utc::now(),
            },
            Comment {
                author_login: "carol".into(),
                body: "verified".into(),
                created: Utc::now(),
            },
        ];
        let fresh = dedupe_comments(&existing, &incoming);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].body, "verified");
    }

    #[test]
    fn effective_last_sync_falls_back_to_1950() {
        let dt = effective_last_sync(None);
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1950-01-01");
    }

    #[test]
    fn sentinel_field_recognizes_reserved_keys_only() {
        assert_eq!(SentinelField::from_key("JiraIssueKey"), Some(SentinelField::JiraIssueKey));
        assert_eq!(SentinelField::from_key("customfield_20099"), None);
    }

    #[test]
    fn mapping_scope_roundtrips_through_json() {
        let m = Mapping::primary(
            MappingScope::Artifact(ArtifactKind::Incident),
            Some(7),
            42,
            "DEMO-1",
        );
        let json = serde_json::to_string(&m).unwrap();
        let back: Mapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back.internal_id, 42);
        assert!(back.primary);
    }
}
