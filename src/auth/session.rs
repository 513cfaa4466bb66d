use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::identity::{CurrentUser, IdentityStore, SoftIdentity};
use crate::store::local::StorageError;
use crate::store::records::RecordStore;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("连接云端失败，请检查网络")]
    ConnectionFailed(#[source] Box<SessionError>),

    #[error("Identity must be a non-empty string")]
    InvalidIdentity,

    #[error("Failed to persist identity: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub anonymous: bool,
    pub expires_at: i64,
}

/// Connection-level session with the remote backend. It is anonymous and
/// says nothing about who the user is.
#[async_trait]
pub trait BackendSession: Send + Sync {
    async fn login_state(&self) -> Option<SessionInfo>;
    async fn sign_in_anonymously(&self) -> Result<SessionInfo, SessionError>;
}

pub async fn ensure_session(backend: &dyn BackendSession) -> Result<SessionInfo, SessionError> {
    match backend.login_state().await {
        Some(info) => Ok(info),
        None => backend.sign_in_anonymously().await,
    }
}

/// Soft login/logout on top of an anonymous backend session.
pub struct SessionManager {
    backend: Arc<dyn BackendSession>,
    identity: Arc<IdentityStore>,
    records: Arc<RecordStore>,
    cloud_enabled: bool,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn BackendSession>,
        identity: Arc<IdentityStore>,
        records: Arc<RecordStore>,
        cloud_enabled: bool,
    ) -> Self {
        Self {
            backend,
            identity,
            records,
            cloud_enabled,
        }
    }

    /// Start the backend session, then pick up any saved identity.
    /// Without a cloud backend there is nothing to restore into.
    pub async fn init_auth(&self) -> Option<CurrentUser> {
        if !self.cloud_enabled {
            return None;
        }

        if let Err(e) = ensure_session(self.backend.as_ref()).await {
            tracing::error!(error = %e, "Anonymous login failed");
        }

        let restored = self.identity.restore().await;
        if let Some(identity) = &restored {
            tracing::info!(identity = %identity, "Restored soft identity");
        }
        restored.as_ref().map(CurrentUser::from)
    }

    /// No password check happens here. Local records are wiped first so
    /// nothing from a previous identity leaks into the new one.
    pub async fn login(&self, email: &str) -> Result<CurrentUser, SessionError> {
        let identity = SoftIdentity::parse(email).ok_or(SessionError::InvalidIdentity)?;

        self.records.clear_local_data().await;

        if self.cloud_enabled {
            if let Err(e) = ensure_session(self.backend.as_ref()).await {
                tracing::error!(error = %e, "Soft login failed");
                return Err(SessionError::ConnectionFailed(Box::new(e)));
            }
        }

        self.identity.set(identity.clone()).await?;
        tracing::info!(identity = %identity, "Soft login");
        Ok(CurrentUser::from(&identity))
    }

    /// Drops the identity and local records. The backend session stays up.
    pub async fn logout(&self) {
        self.identity.clear().await;
        self.records.clear_local_data().await;
        tracing::info!("Soft logout");
    }

    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.identity.get().await.as_ref().map(CurrentUser::from)
    }

    pub async fn backend_state(&self) -> Option<SessionInfo> {
        self.backend.login_state().await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::FlakyBackend;
    use super::*;
    use crate::store::clock::ManualClock;
    use crate::store::local::{LocalStorage, MemoryStorage};
    use crate::store::records::RecordStore;

    fn manager(backend: Arc<FlakyBackend>, cloud: bool) -> (SessionManager, Arc<RecordStore>, Arc<dyn LocalStorage>) {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let identity = Arc::new(IdentityStore::new(storage.clone()));
        let records = Arc::new(RecordStore::builder(storage.clone(), identity.clone(), backend.clone())
            .clock(Arc::new(ManualClock::at(1_000)))
            .build());
        (SessionManager::new(backend, identity, records.clone(), cloud), records, storage)
    }

    #[tokio::test]
    async fn test_login_clears_records_and_stores_identity() {
        let backend = Arc::new(FlakyBackend::default());
        let (manager, records, _) = manager(backend.clone(), true);
        records.add(60, "before".into(), None).await;

        let user = manager.login("me@example.com").await.unwrap();
        assert_eq!(user.uid, "me@example.com");
        assert!(records.records().await.is_empty());
        assert_eq!(manager.current_user().await, Some(user));
        assert_eq!(backend.sign_ins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_reuses_live_session() {
        let backend = Arc::new(FlakyBackend::default());
        let (manager, _, _) = manager(backend.clone(), true);
        manager.login("a@b.c").await.unwrap();
        manager.login("a@b.c").await.unwrap();
        assert_eq!(backend.sign_ins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_fails_when_session_cannot_start() {
        let backend = Arc::new(FlakyBackend::failing());
        let (manager, _, _) = manager(backend, true);
        let err = manager.login("me@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "连接云端失败，请检查网络");
        assert!(manager.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_blank_identity() {
        let (manager, _, _) = manager(Arc::new(FlakyBackend::default()), true);
        assert!(matches!(manager.login("  ").await, Err(SessionError::InvalidIdentity)));
    }

    #[tokio::test]
    async fn test_logout_clears_identity_and_records() {
        let (manager, records, storage) = manager(Arc::new(FlakyBackend::default()), true);
        manager.login("me@example.com").await.unwrap();
        records.add(40, "after login".into(), None).await;

        manager.logout().await;
        assert!(manager.current_user().await.is_none());
        assert!(records.records().await.is_empty());
        assert!(storage.get(crate::store::local::IDENTITY_STORAGE_KEY).unwrap().is_none());

        // Logging out twice is well-defined
        manager.logout().await;
    }

    #[tokio::test]
    async fn test_init_auth_restores_saved_identity() {
        let backend = Arc::new(FlakyBackend::default());
        let (first, _, storage) = manager(backend.clone(), true);
        first.login("saved@example.com").await.unwrap();

        let identity = Arc::new(IdentityStore::new(storage.clone()));
        let records = Arc::new(RecordStore::builder(storage, identity.clone(), backend.clone()).build());
        let second = SessionManager::new(backend, identity, records, true);
        let user = second.init_auth().await.unwrap();
        assert_eq!(user.email, "saved@example.com");
    }

    #[tokio::test]
    async fn test_init_auth_survives_session_failure() {
        let backend = Arc::new(FlakyBackend::failing());
        let (manager, _, _) = manager(backend, true);
        assert!(manager.init_auth().await.is_none());
    }

    #[tokio::test]
    async fn test_cloud_disabled_skips_backend() {
        let backend = Arc::new(FlakyBackend::failing());
        let (manager, _, _) = manager(backend.clone(), false);
        assert!(manager.init_auth().await.is_none());
        manager.login("offline@example.com").await.unwrap();
        assert_eq!(backend.sign_ins.load(Ordering::SeqCst), 0);
    }
}
