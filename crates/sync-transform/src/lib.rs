//! Value Transformer, dynamic-field validator, and Artifact Transformer:
//! the translation layer between Hub custom properties and Tracker custom
//! fields, and between Hub incidents/requirements and Tracker issues.

pub mod artifact;
pub mod validate;
pub mod value;

pub use artifact::{
    hub_incident_to_tracker_fields, mirror_severity, plan_release_for_version, tracker_issue_to_hub_incident,
    tracker_issue_to_hub_requirement, IncidentDefaults, PushContext,
};
pub use validate::shape_create_payload;
pub use value::{pull_custom_value, push_custom_value, PushTarget};
