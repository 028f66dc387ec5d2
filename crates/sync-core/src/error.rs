use thiserror::Error;

/// Top-level error taxonomy for the reconciliation engine.
///
/// Each variant corresponds to one row of the error taxonomy table; the
/// engine matches on these to decide whether to abort the run, skip a
/// project pair, or skip a single artifact and continue.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("hub authentication failed: {0}")]
    AuthFailure(String),

    #[error("tracker connectivity probe failed: {0}")]
    ConnectivityFailure(String),

    #[error("failed to connect hub project {hub_project_id}: {reason}")]
    ProjectConnectFailure { hub_project_id: i64, reason: String },

    #[error("mapping missing for scope={scope:?} key={key}")]
    MappingMissing { scope: String, key: String },

    #[error("validation fault: {summary} ({messages:?})")]
    ValidationFault {
        summary: String,
        messages: Vec<(String, String)>,
    },

    #[error("attachment transfer failed: {0}")]
    AttachmentTransferFailure(String),

    #[error("link creation failed: {0}")]
    LinkCreationFailure(String),

    #[error("unknown custom field shape: {0}")]
    UnknownFieldShape(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
