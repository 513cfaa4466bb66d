use axum::{extract::State, http::StatusCode, Json};

use crate::dto::{RecordView, ScoreRequest};
use crate::models::mood_state::MoodStateView;
use crate::AppState;

pub async fn get_mood_state(State(state): State<AppState>) -> Json<MoodStateView> {
    Json(state.records.view().await)
}

pub async fn set_current_score(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Json<MoodStateView> {
    state.records.set_current_score(req.score.into()).await;
    Json(state.records.view().await)
}

/// Morning check-in. Also logs the baseline as a record.
pub async fn set_baseline(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Json<RecordView> {
    let record = state.records.set_today_baseline(req.score.into()).await;
    Json(RecordView::from(record))
}

pub async fn reset_daily(State(state): State<AppState>) -> StatusCode {
    state.records.reset_daily().await;
    StatusCode::NO_CONTENT
}
