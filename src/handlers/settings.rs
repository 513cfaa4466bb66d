use axum::{extract::State, Json};

use crate::dto::AudioModeRequest;
use crate::error::AppResult;
use crate::models::settings::Settings;
use crate::AppState;

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.get().await)
}

pub async fn set_audio_mode(
    State(state): State<AppState>,
    Json(req): Json<AudioModeRequest>,
) -> AppResult<Json<Settings>> {
    Ok(Json(state.settings.set_audio_mode(req.mode).await?))
}

pub async fn toggle_audio(State(state): State<AppState>) -> AppResult<Json<Settings>> {
    Ok(Json(state.settings.toggle_audio().await?))
}
