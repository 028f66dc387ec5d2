//! RPC client for the Hub project-tracking service: authentication,
//! project connection, enum/custom-property catalog discovery, and
//! incident/requirement/release CRUD.

pub mod client;

pub use client::{HubClient, HubError, Result};
