//! # Record store
//!
//! Single source of truth for the journal's mood records. Every mutation is
//! two-phase:
//!
//! 1. Apply to the in-memory state and flush it to local storage. This
//!    always succeeds and is never rolled back.
//! 2. Mirror the change to the remote collection, scoped to the current soft
//!    identity. Failures are logged and dropped; the next
//!    [`RecordStore::sync_from_cloud`] is the only reconciliation point.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::identity::IdentityStore;
use crate::auth::session::{ensure_session, BackendSession};
use crate::models::mood_state::{MoodState, MoodStateView};
use crate::models::record::{clamp_score, MoodRecord, RecordPatch, RecordType, RemoteRecord};
use crate::services::weeks::local_date;
use crate::store::clock::{Clock, SystemClock};
use crate::store::local::{load_json, save_json, LocalStorage, MOOD_STORAGE_KEY};
use crate::store::remote::{RecordCollection, RemoteError};

/// Trashed records older than this are purged by [`RecordStore::cleanup_trash`].
pub const TRASH_RETENTION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const BASELINE_NOTE: &str = "晨间打卡";

/// Result of the best-effort remote phase of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Mirrored,
    /// No remote configured or no identity set.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Skipped,
    Failed {
        reason: String,
    },
    Merged {
        fetched: usize,
        pushed: usize,
        #[serde(rename = "pushFailures")]
        push_failures: usize,
        total: usize,
    },
}

/// Days left before a trashed record is purged, rounded up. Zero for
/// active records and anything already past retention.
pub fn days_remaining(record: &MoodRecord, now: i64) -> i64 {
    let Some(deleted_at) = record.deleted_at else {
        return 0;
    };
    let remaining = TRASH_RETENTION_MS - (now - deleted_at);
    if remaining <= 0 {
        0
    } else {
        (remaining + DAY_MS - 1) / DAY_MS
    }
}

pub struct RecordStoreBuilder {
    storage: Arc<dyn LocalStorage>,
    identity: Arc<IdentityStore>,
    session: Arc<dyn BackendSession>,
    remote: Option<Arc<dyn RecordCollection>>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl RecordStoreBuilder {
    pub fn remote(mut self, remote: Arc<dyn RecordCollection>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Hydrates the store from local storage.
    pub fn build(self) -> RecordStore {
        let state: MoodState = load_json(self.storage.as_ref(), MOOD_STORAGE_KEY);
        tracing::debug!(records = state.records.len(), "Record store hydrated");
        RecordStore {
            state: Mutex::new(state),
            storage: self.storage,
            identity: self.identity,
            session: self.session,
            remote: self.remote,
            clock: self.clock,
            offset: self.offset,
        }
    }
}

pub struct RecordStore {
    state: Mutex<MoodState>,
    storage: Arc<dyn LocalStorage>,
    identity: Arc<IdentityStore>,
    session: Arc<dyn BackendSession>,
    remote: Option<Arc<dyn RecordCollection>>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl RecordStore {
    pub fn builder(
        storage: Arc<dyn LocalStorage>,
        identity: Arc<IdentityStore>,
        session: Arc<dyn BackendSession>,
    ) -> RecordStoreBuilder {
        RecordStoreBuilder {
            storage,
            identity,
            session,
            remote: None,
            clock: Arc::new(SystemClock),
            offset: Utc.fix(),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn today(&self) -> NaiveDate {
        local_date(self.now(), self.offset).unwrap_or_else(|| Utc::now().date_naive())
    }

    fn flush(&self, state: &MoodState) {
        if let Err(e) = save_json(self.storage.as_ref(), MOOD_STORAGE_KEY, state) {
            tracing::error!(error = %e, "Failed to flush mood state to local storage");
        }
    }

    fn create_time(&self) -> String {
        self.offset
            .timestamp_millis_opt(self.now())
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }

    /// Remote handle and identity, or `None` when either is missing.
    async fn remote_scope(&self) -> Option<(Arc<dyn RecordCollection>, String)> {
        let remote = self.remote.clone()?;
        let identity = self.identity.get().await?;
        Some((remote, identity.as_str().to_string()))
    }

    fn settle(op: &'static str, id: &str, result: Result<(), RemoteError>) -> RemoteOutcome {
        match result {
            Ok(()) => RemoteOutcome::Mirrored,
            Err(e) => {
                tracing::warn!(op = op, record_id = %id, error = %e, "Remote mirror failed; keeping local state");
                RemoteOutcome::Failed
            }
        }
    }

    async fn mirror_patch(&self, op: &'static str, id: &str, patch: RecordPatch) -> RemoteOutcome {
        let Some((remote, user_id)) = self.remote_scope().await else {
            return RemoteOutcome::Skipped;
        };
        let result = remote.update(id, &user_id, &patch).await;
        Self::settle(op, id, result)
    }

    async fn mirror_patches(&self, op: &'static str, patches: Vec<(String, RecordPatch)>) -> Vec<RemoteOutcome> {
        let Some((remote, user_id)) = self.remote_scope().await else {
            return vec![RemoteOutcome::Skipped; patches.len()];
        };
        join_all(patches.iter().map(|(id, patch)| {
            let remote = remote.clone();
            let user_id = user_id.as_str();
            async move { Self::settle(op, id, remote.update(id, user_id, patch).await) }
        }))
        .await
    }

    async fn mirror_removals(&self, op: &'static str, ids: Vec<String>) -> Vec<RemoteOutcome> {
        let Some((remote, user_id)) = self.remote_scope().await else {
            return vec![RemoteOutcome::Skipped; ids.len()];
        };
        join_all(ids.iter().map(|id| {
            let remote = remote.clone();
            let user_id = user_id.as_str();
            async move { Self::settle(op, id, remote.remove(id, user_id).await) }
        }))
        .await
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub async fn records(&self) -> Vec<MoodRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn active_records(&self) -> Vec<MoodRecord> {
        let state = self.state.lock().await;
        state.records.iter().filter(|r| !r.is_deleted()).cloned().collect()
    }

    /// Trashed records, most recently deleted first.
    pub async fn trashed_records(&self) -> Vec<MoodRecord> {
        let mut trashed: Vec<MoodRecord> = {
            let state = self.state.lock().await;
            state.records.iter().filter(|r| r.is_deleted()).cloned().collect()
        };
        trashed.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        trashed
    }

    pub async fn get(&self, id: &str) -> Option<MoodRecord> {
        let state = self.state.lock().await;
        state.records.iter().find(|r| r.id == id).cloned()
    }

    pub async fn view(&self) -> MoodStateView {
        let today = self.today();
        self.state.lock().await.view(today)
    }

    // ── Record mutations ─────────────────────────────────────────────────

    pub async fn add(&self, score: i64, note: String, kind: Option<RecordType>) -> MoodRecord {
        let record = MoodRecord::new(Uuid::new_v4().to_string(), self.now(), score, note, kind);
        {
            let mut state = self.state.lock().await;
            state.records.push(record.clone());
            state.current_score = record.score;
            self.flush(&state);
        }

        let outcome = match self.remote_scope().await {
            Some((remote, user_id)) => {
                let doc = RemoteRecord {
                    record: record.clone(),
                    user_id,
                    create_time: self.create_time(),
                };
                Self::settle("add", &record.id, remote.insert(doc).await)
            }
            None => RemoteOutcome::Skipped,
        };
        tracing::debug!(record_id = %record.id, score = record.score, ?outcome, "Record added");
        record
    }

    /// Edits note (and score when given). `None` if the id is unknown.
    pub async fn update(&self, id: &str, note: String, score: Option<i64>) -> Option<MoodRecord> {
        let patch = RecordPatch::edit(note, score.map(clamp_score));
        let updated = {
            let mut state = self.state.lock().await;
            let record = state.records.iter_mut().find(|r| r.id == id)?;
            patch.apply(record);
            let updated = record.clone();
            self.flush(&state);
            updated
        };

        let outcome = self.mirror_patch("update", id, patch).await;
        tracing::debug!(record_id = %id, ?outcome, "Record updated");
        Some(updated)
    }

    /// Moves a record to the trash. Already-trashed records keep their
    /// original deletion time. Returns whether the id exists.
    pub async fn soft_delete(&self, id: &str) -> bool {
        let ids = [id.to_string()];
        let existing = self.get(id).await.is_some();
        self.soft_delete_many(&ids).await;
        existing
    }

    /// Trashes every matching active record; unknown ids are ignored.
    /// Returns how many records were newly trashed.
    pub async fn soft_delete_many(&self, ids: &[String]) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let now = self.now();
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let trashed: Vec<String> = {
            let mut state = self.state.lock().await;
            let mut trashed = Vec::new();
            for record in state.records.iter_mut() {
                if wanted.contains(record.id.as_str()) && !record.is_deleted() {
                    record.deleted_at = Some(now);
                    trashed.push(record.id.clone());
                }
            }
            if !trashed.is_empty() {
                self.flush(&state);
            }
            trashed
        };

        if trashed.is_empty() {
            return 0;
        }

        let patches = trashed
            .iter()
            .map(|id| (id.clone(), RecordPatch::trash(now)))
            .collect();
        let outcomes = self.mirror_patches("soft_delete", patches).await;
        let failed = outcomes.iter().filter(|o| **o == RemoteOutcome::Failed).count();
        tracing::debug!(trashed = trashed.len(), remote_failures = failed, "Records moved to trash");
        trashed.len()
    }

    /// Clears the deletion mark. Returns whether a trashed record was restored.
    pub async fn restore(&self, id: &str) -> bool {
        {
            let mut state = self.state.lock().await;
            let Some(record) = state.records.iter_mut().find(|r| r.id == id && r.is_deleted()) else {
                return false;
            };
            record.deleted_at = None;
            self.flush(&state);
        }

        let outcome = self.mirror_patch("restore", id, RecordPatch::restore()).await;
        tracing::debug!(record_id = %id, ?outcome, "Record restored");
        true
    }

    /// Removes a record for good, locally and remotely.
    pub async fn permanent_delete(&self, id: &str) -> bool {
        {
            let mut state = self.state.lock().await;
            let before = state.records.len();
            state.records.retain(|r| r.id != id);
            if state.records.len() == before {
                return false;
            }
            self.flush(&state);
        }

        let outcome = self.mirror_removals("permanent_delete", vec![id.to_string()]).await;
        tracing::debug!(record_id = %id, ?outcome, "Record permanently deleted");
        true
    }

    /// Purges trashed records older than [`TRASH_RETENTION_MS`]. Returns the
    /// number purged.
    pub async fn cleanup_trash(&self) -> usize {
        let now = self.now();
        let expired: Vec<String> = {
            let mut state = self.state.lock().await;
            let expired: Vec<String> = state
                .records
                .iter()
                .filter(|r| matches!(r.deleted_at, Some(at) if now - at > TRASH_RETENTION_MS))
                .map(|r| r.id.clone())
                .collect();
            if expired.is_empty() {
                return 0;
            }
            let doomed: HashSet<&str> = expired.iter().map(String::as_str).collect();
            state.records.retain(|r| !doomed.contains(r.id.as_str()));
            self.flush(&state);
            expired
        };

        let count = expired.len();
        self.mirror_removals("cleanup_trash", expired).await;
        tracing::info!(purged = count, "Trash cleanup purged expired records");
        count
    }

    /// Empties the local record list only; remote data stays put.
    pub async fn clear_local_data(&self) {
        let mut state = self.state.lock().await;
        state.records.clear();
        self.flush(&state);
    }

    // ── Score & baseline ─────────────────────────────────────────────────

    pub async fn set_current_score(&self, score: i64) -> u8 {
        let mut state = self.state.lock().await;
        state.current_score = clamp_score(score);
        self.flush(&state);
        state.current_score
    }

    /// Morning check-in: records today's baseline and logs it as a record.
    pub async fn set_today_baseline(&self, score: i64) -> MoodRecord {
        let today = self.today();
        {
            let mut state = self.state.lock().await;
            state.today_baseline = Some(clamp_score(score));
            state.last_visit_date = Some(today);
            state.current_score = clamp_score(score);
            self.flush(&state);
        }
        self.add(score, BASELINE_NOTE.to_string(), None).await
    }

    pub async fn reset_daily(&self) {
        let mut state = self.state.lock().await;
        state.today_baseline = None;
        state.last_visit_date = None;
        self.flush(&state);
    }

    // ── Cloud sync ───────────────────────────────────────────────────────

    /// Pull remote records for the identity, push local-only ones back, and
    /// replace the local list with the merge (remote wins on id collision).
    ///
    /// Pushed records are trusted from the local copy; they are not
    /// re-fetched to confirm the write landed.
    pub async fn sync_from_cloud(&self) -> SyncOutcome {
        let Some((remote, user_id)) = self.remote_scope().await else {
            return SyncOutcome::Skipped;
        };

        if let Err(e) = ensure_session(self.session.as_ref()).await {
            tracing::warn!(error = %e, "Sync aborted: no backend session");
            return SyncOutcome::Failed {
                reason: e.to_string(),
            };
        }

        let remote_records = match remote.fetch_for_user(&user_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Sync aborted: remote fetch failed");
                return SyncOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        let fetched = remote_records.len();

        let (to_push, total) = {
            let mut state = self.state.lock().await;

            // Identity may have changed while the fetch was in flight
            let still_current = self
                .identity
                .get()
                .await
                .map_or(false, |id| id.as_str() == user_id);
            if !still_current {
                tracing::info!("Identity changed during sync; discarding fetched records");
                return SyncOutcome::Skipped;
            }

            let remote_ids: HashSet<&str> = remote_records.iter().map(|r| r.id.as_str()).collect();
            let to_push: Vec<MoodRecord> = state
                .records
                .iter()
                .filter(|r| !remote_ids.contains(r.id.as_str()))
                .cloned()
                .collect();

            let mut merged: HashMap<String, MoodRecord> = HashMap::new();
            for record in state.records.drain(..) {
                merged.insert(record.id.clone(), record);
            }
            for record in remote_records {
                merged.insert(record.id.clone(), record);
            }

            let mut records: Vec<MoodRecord> = merged.into_values().collect();
            records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
            state.records = records;
            self.flush(&state);
            (to_push, state.records.len())
        };

        let create_time = self.create_time();
        let outcomes = join_all(to_push.iter().map(|record| {
            let remote = remote.clone();
            let doc = RemoteRecord {
                record: record.clone(),
                user_id: user_id.clone(),
                create_time: create_time.clone(),
            };
            async move { Self::settle("sync_push", &record.id, remote.insert(doc).await) }
        }))
        .await;
        let push_failures = outcomes.iter().filter(|o| **o == RemoteOutcome::Failed).count();

        tracing::info!(
            fetched = fetched,
            pushed = to_push.len(),
            push_failures = push_failures,
            total = total,
            "Cloud sync merged"
        );

        SyncOutcome::Merged {
            fetched,
            pushed: to_push.len(),
            push_failures,
            total,
        }
    }
}

// ── Trash Sweep Worker ───────────────────────────────────────────────────────

pub fn spawn_trash_cleanup_worker(records: Arc<RecordStore>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = records.cleanup_trash().await;
            if purged > 0 {
                tracing::info!(purged = purged, "Trash sweep: purged expired records");
            }
        }
    });
}
