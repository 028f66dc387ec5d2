//! REST client for the external issue tracker: connectivity probing,
//! metadata discovery, search, and issue/version/attachment operations.

pub mod client;
pub mod issues;
pub mod reconstruct;

pub use client::{negotiated_tls_version, Result, TlsVersion, TrackerClient, TrackerError};
pub use issues::{
    add_attachment, add_issue_link, add_web_link, create_issue, create_version,
    get_create_metadata, get_issue_by_key, list_components, list_projects, list_versions,
    search, TrackerProject,
};
pub use reconstruct::reconstruct_custom_fields;
