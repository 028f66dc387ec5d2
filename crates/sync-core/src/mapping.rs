//! Mapping Store Access and the Mapping Resolver.
//!
//! `MappingStore` is the persistence seam, owned by the Hub side;
//! `MappingResolver` is the sole lookup chokepoint the rest of the engine
//! talks to, including the `autoMapUsers` bypass.

use crate::error::Result;
use crate::types::{Mapping, MappingScope};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Persistence seam for mapping rows. A reimplementation plugs in whatever
/// backs the Hub's mapping tables; this crate ships an in-memory store for
/// tests and the demo binary.
pub trait MappingStore: Send + Sync {
    fn all(&self) -> Vec<Mapping>;
    fn append(&self, mappings: &[Mapping]);
}

#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    rows: Mutex<Vec<Mapping>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(initial: Vec<Mapping>) -> Self {
        Self {
            rows: Mutex::new(initial),
        }
    }
}

impl MappingStore for InMemoryMappingStore {
    fn all(&self) -> Vec<Mapping> {
        self.rows.lock().expect("mapping store lock poisoned").clone()
    }

    fn append(&self, mappings: &[Mapping]) {
        self.rows
            .lock()
            .expect("mapping store lock poisoned")
            .extend_from_slice(mappings);
    }
}

/// Hub-side user lookup, used only when `autoMapUsers` is enabled. Kept as
/// a trait so `sync-core` has no dependency on `sync-hub`.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_user_by_internal_id(&self, internal_id: i64) -> Result<Option<String>>;
    async fn find_user_by_login(&self, login: &str) -> Result<Option<i64>>;
}

/// The translation layer between internal numeric identifiers and external
/// keys. Buffers new mappings in-memory and flushes them to the
/// store at well-defined checkpoints.
pub struct MappingResolver {
    store: Arc<dyn MappingStore>,
    auto_map_users: bool,
    user_lookup: Option<Arc<dyn UserLookup>>,
    buffer: Mutex<Vec<Mapping>>,
}

impl MappingResolver {
    pub fn new(store: Arc<dyn MappingStore>, auto_map_users: bool) -> Self {
        Self {
            store,
            auto_map_users,
            user_lookup: None,
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn with_user_lookup(mut self, lookup: Arc<dyn UserLookup>) -> Self {
        self.user_lookup = Some(lookup);
        self
    }

    /// All known mappings: store rows followed by buffered-but-unflushed
    /// rows, in that order — this is the "iteration order" lookups scan.
    fn combined(&self) -> Vec<Mapping> {
        let mut rows = self.store.all();
        rows.extend(self.buffer.lock().expect("buffer lock poisoned").iter().cloned());
        rows
    }

    pub fn find_by_internal_id(
        &self,
        scope: MappingScope,
        hub_project_id: Option<i64>,
        internal_id: i64,
    ) -> Option<Mapping> {
        self.combined().into_iter().find(|m| {
            m.scope == scope && m.hub_project_id == hub_project_id && m.internal_id == internal_id
        })
    }

    pub fn find_by_external_key(
        &self,
        scope: MappingScope,
        hub_project_id: Option<i64>,
        external_key: &str,
        only_primary: bool,
    ) -> Option<Mapping> {
        self.combined().into_iter().find(|m| {
            m.scope == scope
                && m.hub_project_id == hub_project_id
                && m.external_key == external_key
                && (!only_primary || m.primary)
        })
    }

    /// Mappings with the given scope (used by the engine to discover
    /// `ProjectPair`s from `MappingScope::Project` entries).
    pub fn list_by_scope(&self, scope: MappingScope) -> Vec<Mapping> {
        self.combined().into_iter().filter(|m| m.scope == scope).collect()
    }

    /// Resolve a user by Hub id, bypassing the store via `UserLookup` when
    /// `autoMapUsers` is configured.
    pub async fn find_user_by_internal_id(&self, internal_id: i64) -> Option<String> {
        if self.auto_map_users {
            if let Some(lookup) = &self.user_lookup {
                return lookup.find_user_by_internal_id(internal_id).await.ok().flatten();
            }
        }
        self.find_by_internal_id(MappingScope::User, None, internal_id)
            .map(|m| m.external_key)
    }

    pub async fn find_user_by_external_key(&self, external_key: &str) -> Option<i64> {
        if self.auto_map_users {
            if let Some(lookup) = &self.user_lookup {
                return lookup.find_user_by_login(external_key).await.ok().flatten();
            }
        }
        self.find_by_external_key(MappingScope::User, None, external_key, false)
            .map(|m| m.internal_id)
    }

    /// Buffer new mappings for the next flush.
    pub fn add_mappings(&self, mappings: Vec<Mapping>) {
        self.buffer.lock().expect("buffer lock poisoned").extend(mappings);
    }

    /// Flush buffered mappings to the store.
    pub fn flush(&self) {
        let mut buf = self.buffer.lock().expect("buffer lock poisoned");
        if buf.is_empty() {
            return;
        }
        self.store.append(&buf);
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;

    struct NoopLookup;
    #[async_trait]
    impl UserLookup for NoopLookup {
        async fn find_user_by_internal_id(&self, _id: i64) -> Result<Option<String>> {
            Ok(Some("auto-mapped".to_string()))
        }
        async fn find_user_by_login(&self, _login: &str) -> Result<Option<i64>> {
            Ok(Some(999))
        }
    }

    #[test]
    fn find_by_internal_id_sees_buffered_before_flush() {
        let store = Arc::new(InMemoryMappingStore::new());
        let resolver = MappingResolver::new(store, false);

        assert!(resolver
            .find_by_internal_id(MappingScope::Artifact(ArtifactKind::Incident), Some(7), 42)
            .is_none());

        resolver.add_mappings(vec![Mapping::primary(
            MappingScope::Artifact(ArtifactKind::Incident),
            Some(7),
            42,
            "DEMO-1",
        )]);

        let found = resolver
            .find_by_internal_id(MappingScope::Artifact(ArtifactKind::Incident), Some(7), 42)
            .unwrap();
        assert_eq!(found.external_key, "DEMO-1");
    }

    #[test]
    fn flush_is_idempotent_on_empty_buffer() {
        let store = Arc::new(InMemoryMappingStore::new());
        let resolver = MappingResolver::new(store.clone(), false);
        resolver.flush();
        assert!(store.all().is_empty());
    }

    #[test]
    fn primary_filter_excludes_alias_entries() {
        let store = Arc::new(InMemoryMappingStore::seeded(vec![
            Mapping {
                scope: MappingScope::User,
                hub_project_id: None,
                internal_id: 1,
                external_key: "alice-alias".into(),
                primary: false,
            },
            Mapping::primary(MappingScope::User, None, 1, "alice"),
        ]));
        let resolver = MappingResolver::new(store, false);

        let by_alias = resolver.find_by_external_key(MappingScope::User, None, "alice-alias", true);
        assert!(by_alias.is_none());

        let by_primary = resolver.find_by_external_key(MappingScope::User, None, "alice", true);
        assert_eq!(by_primary.unwrap().internal_id, 1);
    }

    #[tokio::test]
    async fn auto_map_users_bypasses_store() {
        let store = Arc::new(InMemoryMappingStore::new());
        let resolver = MappingResolver::new(store, true).with_user_lookup(Arc::new(NoopLookup));

        assert_eq!(
            resolver.find_user_by_internal_id(5).await,
            Some("auto-mapped".to_string())
        );
        assert_eq!(resolver.find_user_by_external_key("alice").await, Some(999));
    }
}
