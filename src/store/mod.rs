//! Credential store backends for persisting the session token.
//!
//! Provides the [`CredentialStore`] trait and implementations:
//! - [`FileCredentialStore`] - JSON file with 0600 permissions
//! - [`MemoryCredentialStore`] - In-memory (testing)
//!
//! The store is the single source of truth for "do we have a token"; it
//! survives process restarts and holds only two keys, the session token and
//! the onboarding-completed flag.

mod file;
mod memory;

use async_trait::async_trait;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::config::{ONBOARDING_COMPLETE_KEY, SESSION_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::models::SessionToken;

/// Trait for persistent key-value credential storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any existing value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Removing an absent key is not
    /// an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Check whether `key` has a stored value.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
    async fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Blanket impl for `Box<T>`.
#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
    async fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Load the persisted session token, if any.
///
/// A value that fails to parse is treated the same as an absent token so a
/// corrupted store entry cannot wedge startup.
pub async fn load_session_token(store: &dyn CredentialStore) -> Result<Option<SessionToken>> {
    match store.get(SESSION_TOKEN_KEY).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!("Discarding unparseable stored token: {}", e);
                store.remove(SESSION_TOKEN_KEY).await?;
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Persist the session token.
pub async fn save_session_token(store: &dyn CredentialStore, token: &SessionToken) -> Result<()> {
    let raw = serde_json::to_string(token).map_err(|e| Error::StorageSerialization(e.to_string()))?;
    store.set(SESSION_TOKEN_KEY, &raw).await
}

/// Remove the session token and the onboarding flag.
pub async fn clear_session(store: &dyn CredentialStore) -> Result<()> {
    store.remove(SESSION_TOKEN_KEY).await?;
    store.remove(ONBOARDING_COMPLETE_KEY).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_token_helpers() {
        let store = MemoryCredentialStore::new();
        assert!(load_session_token(&store).await.unwrap().is_none());

        let token = SessionToken::new("t1").with_refresh_token("r1");
        save_session_token(&store, &token).await.unwrap();
        assert_eq!(load_session_token(&store).await.unwrap(), Some(token));

        clear_session(&store).await.unwrap();
        assert!(load_session_token(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_token_is_discarded() {
        let store = MemoryCredentialStore::new();
        store.set(SESSION_TOKEN_KEY, "not json").await.unwrap();

        assert!(load_session_token(&store).await.unwrap().is_none());
        // The bad value was purged, not left to fail again.
        assert!(!store.contains(SESSION_TOKEN_KEY).await.unwrap());
    }
}
