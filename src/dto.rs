//! # Request/Response DTOs
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body or query params
//! - `*Response` → serialized to client JSON
//! - Validation is expressed via `validator` derive macros

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::identity::CurrentUser;
use crate::auth::session::SessionInfo;
use crate::error::{AppError, AppResult};
use crate::models::record::{deserialize_optional_score, deserialize_score, MoodRecord, RecordType};
use crate::models::settings::AudioMode;
use crate::services::classifier::{classify_record, Classification};
use crate::services::stats::{SortType, TimeRange};
use crate::services::weeks::{QuarterInfo, WeekInfo};
use crate::store::records::{days_remaining, SyncOutcome};

// ============================================================================
// Common
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Optional `start`/`end` epoch-ms window plus a sort order.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<i64>,
    pub end: Option<i64>,
    #[serde(default)]
    pub sort: SortType,
}

impl RangeQuery {
    /// Both bounds or neither.
    pub fn range(&self) -> AppResult<Option<TimeRange>> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start <= end => Ok(Some(TimeRange { start, end })),
            (Some(_), Some(_)) => Err(AppError::Validation("start must not be after end".into())),
            _ => Err(AppError::Validation("start and end must be given together".into())),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// POST /api/records
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecordRequest {
    /// Clamped into 0-100
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Note must be under 5000 characters"))]
    pub note: String,

    #[serde(rename = "type", default)]
    pub record_type: Option<RecordType>,
}

/// PUT /api/records/:id
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRecordRequest {
    #[validate(length(max = 5000, message = "Note must be under 5000 characters"))]
    pub note: String,

    #[serde(default, deserialize_with = "deserialize_optional_score")]
    pub score: Option<u8>,
}

/// POST /api/records/batch-delete
#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<String>,
}

/// A record with its presentation attached.
#[derive(Debug, Serialize)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: MoodRecord,
    pub classification: Classification,
}

impl From<MoodRecord> for RecordView {
    fn from(record: MoodRecord) -> Self {
        let classification = classify_record(&record);
        Self {
            record,
            classification,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    #[serde(flatten)]
    pub record: MoodRecord,
    pub days_remaining: i64,
}

impl TrashEntry {
    pub fn new(record: MoodRecord, now: i64) -> Self {
        let days_remaining = days_remaining(&record, now);
        Self {
            record,
            days_remaining,
        }
    }
}

// ============================================================================
// Mood state
// ============================================================================

/// PUT /api/mood-state/current-score, POST /api/mood-state/baseline
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeksResponse {
    pub year: i32,
    pub quarters: Vec<QuarterInfo>,
    /// Week holding "now", when it falls inside `year`'s layout.
    pub current_week: Option<WeekInfo>,
}

/// One week's active records plus its cached report, if any.
#[derive(Debug, Serialize)]
pub struct WeekDetailResponse {
    pub week: WeekInfo,
    pub records: Vec<RecordView>,
    pub report: Option<String>,
}

// ============================================================================
// Reports & settings
// ============================================================================

/// PUT /api/reports/:year/:week
#[derive(Debug, Deserialize, Validate)]
pub struct SaveReportRequest {
    #[validate(length(min = 1, message = "Report content must not be empty"))]
    pub content: String,
}

/// PUT /api/settings/audio-mode
#[derive(Debug, Deserialize)]
pub struct AudioModeRequest {
    pub mode: AudioMode,
}

// ============================================================================
// Session
// ============================================================================

/// POST /api/session/login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254, message = "Email must be 1-254 characters"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: CurrentUser,
    pub sync: SyncOutcome,
}

/// GET /api/session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Option<CurrentUser>,
    pub backend: Option<SessionInfo>,
    pub cloud_enabled: bool,
}
