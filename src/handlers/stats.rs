use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::dto::{RangeQuery, RecordView, WeekDetailResponse, WeeksResponse};
use crate::error::{AppError, AppResult};
use crate::models::record::RecordType;
use crate::services::classifier::{classify, Classification};
use crate::services::stats::{
    daily_summaries, mood_distribution, records_in_range, DailySummary, DistributionEntry, TimeRange,
};
use crate::services::weeks::{quarter_weeks, week_containing};
use crate::AppState;

fn check_year(year: i32) -> AppResult<()> {
    if !(1..=9999).contains(&year) {
        return Err(AppError::Validation("Year must be between 1 and 9999".into()));
    }
    Ok(())
}

pub async fn get_weeks(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> AppResult<Json<WeeksResponse>> {
    check_year(year)?;
    Ok(Json(WeeksResponse {
        year,
        quarters: quarter_weeks(year),
        current_week: week_containing(year, state.records.now(), state.records.offset()),
    }))
}

/// Everything the weekly report screen needs for one week.
pub async fn get_week(
    State(state): State<AppState>,
    Path((year, week)): Path<(i32, u32)>,
) -> AppResult<Json<WeekDetailResponse>> {
    check_year(year)?;
    let info = quarter_weeks(year)
        .into_iter()
        .flat_map(|q| q.weeks)
        .find(|w| w.week_number == week)
        .ok_or_else(|| AppError::NotFound("No such week".into()))?;
    let (start, end) = info
        .bounds_millis(state.records.offset())
        .ok_or_else(|| AppError::Validation("Week is out of range".into()))?;

    let range = TimeRange { start, end };
    let mut records: Vec<_> = state
        .records
        .active_records()
        .await
        .into_iter()
        .filter(|r| range.contains(r.timestamp))
        .collect();
    records.sort_by_key(|r| r.timestamp);

    Ok(Json(WeekDetailResponse {
        week: info,
        records: records.into_iter().map(RecordView::from).collect(),
        report: state.reports.get(year, week).await,
    }))
}

pub async fn distribution(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<DistributionEntry>>> {
    let range = query.range()?;
    let records = state.records.records().await;
    Ok(Json(mood_distribution(&records, range)))
}

/// Active records in a window (default: the past week), sorted.
pub async fn records(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<RecordView>>> {
    let range = query.range()?;
    let records = state.records.records().await;
    let selected = records_in_range(
        &records,
        range,
        query.sort,
        state.records.now(),
        state.records.offset(),
    );
    Ok(Json(selected.into_iter().map(RecordView::from).collect()))
}

pub async fn calendar(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<DailySummary>>> {
    let range = query.range()?;
    let mut records = state.records.records().await;
    if let Some(range) = range {
        records.retain(|r| range.contains(r.timestamp));
    }
    Ok(Json(daily_summaries(&records, state.records.offset())))
}

#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    #[serde(rename = "type", default)]
    pub record_type: RecordType,
}

pub async fn classify_score(
    Path(score): Path<i64>,
    Query(query): Query<ClassifyQuery>,
) -> Json<Classification> {
    Json(classify(score, query.record_type))
}
