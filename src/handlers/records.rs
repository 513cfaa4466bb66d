use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::dto::{
    BatchDeleteRequest, CountResponse, CreateRecordRequest, DeleteResponse, RecordView, TrashEntry,
    UpdateRecordRequest,
};
use crate::error::{AppError, AppResult};
use crate::store::records::SyncOutcome;
use crate::AppState;

/// Active records, oldest first.
pub async fn list_records(State(state): State<AppState>) -> Json<Vec<RecordView>> {
    let records = state.records.active_records().await;
    Json(records.into_iter().map(RecordView::from).collect())
}

pub async fn create_record(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> AppResult<Json<RecordView>> {
    req.validate()?;
    let record = state.records.add(req.score.into(), req.note, req.record_type).await;
    Ok(Json(RecordView::from(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecordRequest>,
) -> AppResult<Json<RecordView>> {
    req.validate()?;
    let record = state
        .records
        .update(&id, req.note, req.score.map(i64::from))
        .await
        .ok_or_else(|| AppError::NotFound("Record not found".into()))?;
    Ok(Json(RecordView::from(record)))
}

/// Moves a record to the trash.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    if !state.records.soft_delete(&id).await {
        return Err(AppError::NotFound("Record not found".into()));
    }
    Ok(Json(DeleteResponse { deleted: true, id }))
}

pub async fn batch_delete(
    State(state): State<AppState>,
    Json(req): Json<BatchDeleteRequest>,
) -> Json<CountResponse> {
    let count = state.records.soft_delete_many(&req.ids).await;
    Json(CountResponse { count })
}

pub async fn restore_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<RecordView>> {
    if !state.records.restore(&id).await {
        return Err(AppError::NotFound("No trashed record with that id".into()));
    }
    let record = state
        .records
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound("Record not found".into()))?;
    Ok(Json(RecordView::from(record)))
}

pub async fn permanent_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    if !state.records.permanent_delete(&id).await {
        return Err(AppError::NotFound("Record not found".into()));
    }
    Ok(Json(DeleteResponse { deleted: true, id }))
}

/// Trashed records, most recently deleted first.
pub async fn list_trash(State(state): State<AppState>) -> Json<Vec<TrashEntry>> {
    let now = state.records.now();
    let trashed = state.records.trashed_records().await;
    Json(trashed.into_iter().map(|r| TrashEntry::new(r, now)).collect())
}

pub async fn cleanup_trash(State(state): State<AppState>) -> Json<CountResponse> {
    let count = state.records.cleanup_trash().await;
    Json(CountResponse { count })
}

pub async fn sync(State(state): State<AppState>) -> Json<SyncOutcome> {
    Json(state.records.sync_from_cloud().await)
}
