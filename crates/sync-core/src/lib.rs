//! Shared data model, mapping store, configuration, and logging for the
//! Hub/Tracker reconciliation engine.

pub mod config;
pub mod enums;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod metadata;
pub mod types;

pub use error::{Result, SyncError};
