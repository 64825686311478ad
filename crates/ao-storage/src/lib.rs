use anyhow::{Context, Result};
use rocksdb::{DB, Options};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// String-keyed persistent store shared by the session and customization
/// layers. Calls are synchronous; a write is visible to the next read.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Namespaced key families. Each concern owns exactly one family and the
/// prefixes never overlap with the fixed keys.
pub mod keys {
    pub const CHAIN_SELECTION: &str = "chainName";
    pub const BACKGROUND_IMAGE: &str = "backgroundImage";

    const OWNER_LIMIT_PREFIX: &str = "nftLimit_";
    const OWNER_OVERLAY_PREFIX: &str = "tokenOverlay_";
    const LEGACY_SNAPSHOT_PREFIX: &str = "modifiedTokens_";

    pub fn owner_limit(owner: &str) -> String {
        format!("{OWNER_LIMIT_PREFIX}{owner}")
    }

    pub fn owner_overlay(owner: &str) -> String {
        format!("{OWNER_OVERLAY_PREFIX}{owner}")
    }

    /// Full token snapshots written by older clients. Read-only.
    pub fn legacy_snapshot(owner: &str) -> String {
        format!("{LEGACY_SNAPSHOT_PREFIX}{owner}")
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(key);
        Ok(())
    }
}

pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    pub fn open_default(path: &str) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)
            .with_context(|| format!("failed to open key-value store at {path}"))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .with_context(|| format!("failed to read key {key}"))?;
        match value {
            Some(raw) => Ok(Some(
                String::from_utf8(raw).with_context(|| format!("value for {key} is not utf-8"))?,
            )),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .put(key.as_bytes(), value.as_bytes())
            .with_context(|| format!("failed to write key {key}"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .delete(key.as_bytes())
            .with_context(|| format!("failed to remove key {key}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_write_is_visible_to_next_read() -> Result<()> {
        let store = InMemoryStore::new();
        store.set(keys::CHAIN_SELECTION, "stargaze")?;
        assert_eq!(store.get(keys::CHAIN_SELECTION)?.as_deref(), Some("stargaze"));

        store.set(keys::CHAIN_SELECTION, "osmosis")?;
        assert_eq!(store.get(keys::CHAIN_SELECTION)?.as_deref(), Some("osmosis"));

        store.remove(keys::CHAIN_SELECTION)?;
        assert_eq!(store.get(keys::CHAIN_SELECTION)?, None);
        store.remove(keys::CHAIN_SELECTION)?;
        Ok(())
    }

    #[test]
    fn key_families_are_disjoint() {
        let owner = "stars1owner";
        let family = [
            keys::CHAIN_SELECTION.to_owned(),
            keys::BACKGROUND_IMAGE.to_owned(),
            keys::owner_limit(owner),
            keys::owner_overlay(owner),
            keys::legacy_snapshot(owner),
        ];

        for (i, a) in family.iter().enumerate() {
            for b in family.iter().skip(i + 1) {
                assert_ne!(a, b);
                assert!(!a.starts_with(b.as_str()) && !b.starts_with(a.as_str()));
            }
        }
    }

    #[test]
    fn rocksdb_survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().to_string_lossy().into_owned();

        {
            let store = RocksDbStore::open_default(&path)?;
            store.set(&keys::owner_limit("stars1a"), "120")?;
            store.set(keys::BACKGROUND_IMAGE, "https://example.org/bg.png")?;
            store.remove(keys::BACKGROUND_IMAGE)?;
        }

        let reopened = RocksDbStore::open_default(&path)?;
        assert_eq!(reopened.get(&keys::owner_limit("stars1a"))?.as_deref(), Some("120"));
        assert_eq!(reopened.get(keys::BACKGROUND_IMAGE)?, None);
        Ok(())
    }
}
