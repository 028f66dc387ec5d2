//! Engine configuration: the host-supplied setup fields plus the named
//! `custom01..custom05` options and the toggles that govern push/pull
//! behavior.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recognized `custom01..custom05` host options, parsed into
/// their typed meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomOptions {
    /// custom01: Tracker custom-field id mirrored into Hub `severityId`.
    #[serde(default)]
    pub severity_custom_field_id: Option<i64>,
    /// custom02: enable Tracker security-level propagation.
    #[serde(default)]
    pub use_security_level: bool,
    /// custom03: restrict new artifacts to the Hub→Tracker flow only.
    #[serde(default)]
    pub only_create_new_items_in_tracker: bool,
    /// custom04: Tracker issue-type ids that map to Hub requirements.
    #[serde(default)]
    pub requirement_issue_types: Vec<i64>,
    /// custom05: issue-link type name for incident-to-incident associations.
    #[serde(default = "default_link_type_name")]
    pub link_type_name: String,
}

fn default_link_type_name() -> String {
    "Relates".to_string()
}

impl Default for CustomOptions {
    fn default() -> Self {
        Self {
            severity_custom_field_id: None,
            use_security_level: false,
            only_create_new_items_in_tracker: false,
            requirement_issue_types: Vec::new(),
            link_type_name: default_link_type_name(),
        }
    }
}

impl CustomOptions {
    /// Parse from the raw `custom01..custom05` strings the host passes to
    /// `setup()`. Unparseable/empty values fall back to the
    /// field's default rather than failing setup.
    pub fn from_raw(custom01: &str, custom02: &str, custom03: &str, custom04: &str, custom05: &str) -> Self {
        Self {
            severity_custom_field_id: custom01.trim().parse().ok().filter(|_| !custom01.trim().is_empty()),
            use_security_level: custom02.trim().eq_ignore_ascii_case("true"),
            only_create_new_items_in_tracker: custom03.trim().eq_ignore_ascii_case("true"),
            requirement_issue_types: custom04
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect(),
            link_type_name: if custom05.trim().is_empty() {
                default_link_type_name()
            } else {
                custom05.trim().to_string()
            },
        }
    }
}

/// Top-level engine configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub hub_base_url: String,
    /// Base URL for human-facing Hub links (`resolve_url`'s `~` substitution).
    /// Falls back to `hub_base_url` when left blank.
    #[serde(default)]
    pub hub_web_base_url: String,
    pub hub_user: String,
    pub hub_pass: String,
    pub tracker_base_url: String,
    pub tracker_user: String,
    pub tracker_pass: String,
    #[serde(default)]
    pub use_default_credentials: bool,
    #[serde(default)]
    pub accept_self_signed: bool,
    #[serde(default)]
    pub trace_logging: bool,
    #[serde(default)]
    pub data_sync_system_id: i64,
    /// Hours to subtract from UTC to approximate the Tracker user's
    /// timezone when formatting JQL.
    #[serde(default)]
    pub local_zone_offset_hours: i32,
    #[serde(default)]
    pub auto_map_users: bool,
    /// When `true`, the push phase filters Hub incidents by `lastSyncAt`
    /// instead of paging through every incident sorted by name.
    #[serde(default)]
    pub push_by_time_window: bool,
    /// When `false`, mappings for auto-created releases are not written
    /// back to the mapping store.
    #[serde(default = "default_true")]
    pub persist_auto_created_release_mappings: bool,
    #[serde(default)]
    pub custom: CustomOptions,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hub_base_url: String::new(),
            hub_web_base_url: String::new(),
            hub_user: String::new(),
            hub_pass: String::new(),
            tracker_base_url: String::new(),
            tracker_user: String::new(),
            tracker_pass: String::new(),
            use_default_credentials: false,
            accept_self_signed: false,
            trace_logging: false,
            data_sync_system_id: 0,
            local_zone_offset_hours: 0,
            auto_map_users: false,
            push_by_time_window: false,
            persist_auto_created_release_mappings: true,
            custom: CustomOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `~/.sync-engine/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: EngineConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sync-engine")
            .join("config.toml")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_safe_defaults() {
        let cfg = EngineConfig::default();
        assert!(!cfg.auto_map_users);
        assert!(!cfg.push_by_time_window);
        assert!(cfg.persist_auto_created_release_mappings);
    }

    #[test]
    fn custom_options_parse_from_raw_strings() {
        let opts = CustomOptions::from_raw("20099", "TRUE", "true", "7, 9 ,11", "");
        assert_eq!(opts.severity_custom_field_id, Some(20099));
        assert!(opts.use_security_level);
        assert!(opts.only_create_new_items_in_tracker);
        assert_eq!(opts.requirement_issue_types, vec![7, 9, 11]);
        assert_eq!(opts.link_type_name, "Relates");
    }

    #[test]
    fn custom_options_empty_severity_disables() {
        let opts = CustomOptions::from_raw("", "false", "false", "", "Duplicate");
        assert!(opts.severity_custom_field_id.is_none());
        assert_eq!(opts.link_type_name, "Duplicate");
    }

    #[test]
    fn roundtrip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = EngineConfig {
            hub_base_url: "https://hub.example.com".into(),
            ..Default::default()
        };
        std::fs::write(&path, cfg.to_toml().unwrap()).unwrap();
        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded.hub_base_url, "https://hub.example.com");
    }
}
