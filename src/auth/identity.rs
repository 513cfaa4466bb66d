use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::store::local::{load_json, save_json, LocalStorage, StorageError, IDENTITY_STORAGE_KEY};

/// Client-supplied logical user id, conventionally an email.
///
/// Nothing verifies it. It only namespaces remote records, so anyone who
/// types the same string sees the same data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SoftIdentity(String);

impl SoftIdentity {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoftIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub uid: String,
    pub email: String,
}

impl From<&SoftIdentity> for CurrentUser {
    fn from(identity: &SoftIdentity) -> Self {
        Self {
            uid: identity.0.clone(),
            email: identity.0.clone(),
        }
    }
}

/// In-memory identity mirrored to persistent local storage.
pub struct IdentityStore {
    storage: Arc<dyn LocalStorage>,
    current: RwLock<Option<SoftIdentity>>,
}

impl IdentityStore {
    /// Starts empty; call [`IdentityStore::restore`] to pick up a saved identity.
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<SoftIdentity> {
        self.current.read().await.clone()
    }

    pub async fn restore(&self) -> Option<SoftIdentity> {
        let saved: Option<String> = load_json(self.storage.as_ref(), IDENTITY_STORAGE_KEY);
        let identity = saved.as_deref().and_then(SoftIdentity::parse);
        *self.current.write().await = identity.clone();
        identity
    }

    pub async fn set(&self, identity: SoftIdentity) -> Result<(), StorageError> {
        save_json(self.storage.as_ref(), IDENTITY_STORAGE_KEY, &identity)?;
        *self.current.write().await = Some(identity);
        Ok(())
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
        if let Err(e) = self.storage.remove(IDENTITY_STORAGE_KEY) {
            tracing::warn!(error = %e, "Failed to remove stored identity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::local::MemoryStorage;

    #[test]
    fn test_parse_trims_and_rejects_blank() {
        assert_eq!(SoftIdentity::parse("  a@b.com ").unwrap().as_str(), "a@b.com");
        assert!(SoftIdentity::parse("   ").is_none());
        assert!(SoftIdentity::parse("").is_none());
    }

    #[tokio::test]
    async fn test_set_persists_across_instances() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let store = IdentityStore::new(storage.clone());
        store.set(SoftIdentity::parse("a@b.com").unwrap()).await.unwrap();

        let reopened = IdentityStore::new(storage);
        assert!(reopened.get().await.is_none());
        assert_eq!(reopened.restore().await.unwrap().as_str(), "a@b.com");
        assert_eq!(reopened.get().await.unwrap().as_str(), "a@b.com");
    }

    #[tokio::test]
    async fn test_clear_without_identity_is_fine() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let store = IdentityStore::new(storage.clone());
        store.clear().await;
        assert!(store.get().await.is_none());
        assert!(IdentityStore::new(storage).restore().await.is_none());
    }

    #[test]
    fn test_current_user_uses_identity_as_uid() {
        let user = CurrentUser::from(&SoftIdentity::parse("me@x.io").unwrap());
        assert_eq!(user.uid, "me@x.io");
        assert_eq!(user.email, "me@x.io");
    }
}
