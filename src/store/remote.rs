use async_trait::async_trait;

use crate::models::record::{MoodRecord, RecordPatch, RemoteRecord};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Remote collection unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RemoteError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::Unavailable(e.to_string())
            }
            other => Self::Database(other),
        }
    }
}

/// Remote document collection holding every identity's records.
/// Every call is scoped to a `user_id`.
#[async_trait]
pub trait RecordCollection: Send + Sync {
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<MoodRecord>, RemoteError>;
    async fn insert(&self, doc: RemoteRecord) -> Result<(), RemoteError>;
    async fn update(&self, id: &str, user_id: &str, patch: &RecordPatch) -> Result<(), RemoteError>;
    async fn remove(&self, id: &str, user_id: &str) -> Result<(), RemoteError>;

    async fn ping(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryCollection;


#[cfg(test)]
mod memory {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{RecordCollection, RemoteError};
    use crate::models::record::{MoodRecord, RecordPatch, RemoteRecord};

    /// In-process collection with switchable failures.
    #[derive(Debug, Default)]
    pub struct MemoryCollection {
        docs: Mutex<BTreeMap<(String, String), RemoteRecord>>,
        fail_writes: AtomicBool,
        fail_fetch: AtomicBool,
        writes: AtomicUsize,
    }

    impl MemoryCollection {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn fail_fetch(&self, fail: bool) {
            self.fail_fetch.store(fail, Ordering::SeqCst);
        }

        /// Number of write calls attempted, failed or not.
        pub fn write_attempts(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn docs_for(&self, user_id: &str) -> Vec<RemoteRecord> {
            self.docs
                .lock()
                .unwrap()
                .values()
                .filter(|d| d.user_id == user_id)
                .cloned()
                .collect()
        }

        pub fn seed(&self, doc: RemoteRecord) {
            self.docs
                .lock()
                .unwrap()
                .insert((doc.user_id.clone(), doc.record.id.clone()), doc);
        }

        fn write_guard(&self) -> Result<(), RemoteError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable("injected write failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RecordCollection for MemoryCollection {
        async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<MoodRecord>, RemoteError> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable("injected fetch failure".into()));
            }
            Ok(self.docs_for(user_id).into_iter().map(|d| d.record).collect())
        }

        async fn insert(&self, doc: RemoteRecord) -> Result<(), RemoteError> {
            self.write_guard()?;
            self.docs
                .lock()
                .unwrap()
                .entry((doc.user_id.clone(), doc.record.id.clone()))
                .or_insert(doc);
            Ok(())
        }

        async fn update(&self, id: &str, user_id: &str, patch: &RecordPatch) -> Result<(), RemoteError> {
            self.write_guard()?;
            if let Some(doc) = self
                .docs
                .lock()
                .unwrap()
                .get_mut(&(user_id.to_string(), id.to_string()))
            {
                patch.apply(&mut doc.record);
            }
            Ok(())
        }

        async fn remove(&self, id: &str, user_id: &str) -> Result<(), RemoteError> {
            self.write_guard()?;
            self.docs
                .lock()
                .unwrap()
                .remove(&(user_id.to_string(), id.to_string()));
            Ok(())
        }
    }
}
