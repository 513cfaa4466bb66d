use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::dto::SaveReportRequest;
use crate::error::{AppError, AppResult};
use crate::store::reports::ReportEntry;
use crate::AppState;

pub async fn list_reports(State(state): State<AppState>) -> Json<Vec<ReportEntry>> {
    Json(state.reports.list().await)
}

pub async fn get_report(
    State(state): State<AppState>,
    Path((year, week)): Path<(i32, u32)>,
) -> AppResult<Json<ReportEntry>> {
    let content = state
        .reports
        .get(year, week)
        .await
        .ok_or_else(|| AppError::NotFound("No report for that week".into()))?;
    Ok(Json(ReportEntry { year, week, content }))
}

pub async fn save_report(
    State(state): State<AppState>,
    Path((year, week)): Path<(i32, u32)>,
    Json(req): Json<SaveReportRequest>,
) -> AppResult<Json<ReportEntry>> {
    req.validate()?;
    state.reports.save(year, week, req.content.clone()).await?;
    tracing::info!(year = year, week = week, "Weekly report saved");
    Ok(Json(ReportEntry {
        year,
        week,
        content: req.content,
    }))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path((year, week)): Path<(i32, u32)>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.reports.delete(year, week).await? {
        return Err(AppError::NotFound("No report for that week".into()));
    }
    Ok(Json(serde_json::json!({ "deleted": true, "year": year, "week": week })))
}
