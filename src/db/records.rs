use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::models::record::{MoodRecord, RecordPatch, RecordType, RemoteRecord};
use crate::store::remote::{RecordCollection, RemoteError};

#[derive(Debug, FromRow)]
struct MoodRecordRow {
    id: String,
    recorded_at: i64,
    score: i16,
    note: String,
    record_type: Option<String>,
    deleted_at: Option<i64>,
}

impl From<MoodRecordRow> for MoodRecord {
    fn from(row: MoodRecordRow) -> Self {
        let mut record = MoodRecord::new(
            row.id,
            row.recorded_at,
            row.score.into(),
            row.note,
            row.record_type.as_deref().and_then(RecordType::parse),
        );
        record.deleted_at = row.deleted_at;
        record
    }
}

/// `mood_records` table as the remote document collection.
#[derive(Clone)]
pub struct PgRecordCollection {
    db: PgPool,
}

impl PgRecordCollection {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordCollection for PgRecordCollection {
    async fn fetch_for_user(&self, user_id: &str) -> Result<Vec<MoodRecord>, RemoteError> {
        let rows = sqlx::query_as::<_, MoodRecordRow>(
            r#"
            SELECT id, recorded_at, score, note, record_type, deleted_at
            FROM mood_records
            WHERE user_id = $1
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(MoodRecord::from).collect())
    }

    async fn insert(&self, doc: RemoteRecord) -> Result<(), RemoteError> {
        let record = &doc.record;
        sqlx::query(
            r#"
            INSERT INTO mood_records
                (id, user_id, recorded_at, score, note, record_type, deleted_at, create_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&doc.user_id)
        .bind(record.timestamp)
        .bind(i16::from(record.score))
        .bind(&record.note)
        .bind(record.record_type.map(|t| t.as_str()))
        .bind(record.deleted_at)
        .bind(&doc.create_time)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update(&self, id: &str, user_id: &str, patch: &RecordPatch) -> Result<(), RemoteError> {
        sqlx::query(
            r#"
            UPDATE mood_records SET
                note = COALESCE($3, note),
                score = COALESCE($4, score),
                deleted_at = CASE WHEN $5 THEN $6 ELSE deleted_at END
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&patch.note)
        .bind(patch.score.map(i16::from))
        .bind(patch.deleted_at.is_some())
        .bind(patch.deleted_at.flatten())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: &str, user_id: &str) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM mood_records WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }
}
