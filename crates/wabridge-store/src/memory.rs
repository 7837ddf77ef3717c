//! In-memory session store.
//!
//! Useful for development and single-process experiments.
//! Data is lost on restart.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use wabridge_core::traits::{SessionStore, StoreError};

/// Session store held entirely in memory.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the namespace holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .get(key)
            .cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_and_clear() {
        let store = MemoryStore::new();
        let blob: Vec<u8> = (0..=255).collect();
        store.write("creds", &blob).await.unwrap();
        assert_eq!(store.read("creds").await.unwrap(), Some(blob));
        store.clear().await.unwrap();
        assert!(store.is_empty());
    }
}
