//! In-memory credential storage for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::CredentialStore;
use crate::error::Result;

/// In-memory credential storage, primarily for testing.
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.values.read().await.contains_key(key))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::new();

        assert!(store.get("folio.session_token").await.unwrap().is_none());
        assert!(!store.contains("folio.session_token").await.unwrap());

        store.set("folio.session_token", "abc").await.unwrap();
        assert!(store.contains("folio.session_token").await.unwrap());
        assert_eq!(
            store.get("folio.session_token").await.unwrap().as_deref(),
            Some("abc")
        );

        store.remove("folio.session_token").await.unwrap();
        assert!(!store.contains("folio.session_token").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_ok() {
        let store = MemoryCredentialStore::new();
        store.remove("never.set").await.unwrap();
    }
}
