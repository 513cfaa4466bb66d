use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::dto::{LoginRequest, LoginResponse, SessionResponse};
use crate::error::AppResult;
use crate::AppState;

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: state.session.current_user().await,
        backend: state.session.backend_state().await,
        cloud_enabled: state.config.cloud_enabled(),
    })
}

/// Soft login, then pull whatever the cloud holds for that identity.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    req.validate()?;
    let user = state.session.login(&req.email).await?;
    let sync = state.records.sync_from_cloud().await;
    Ok(Json(LoginResponse { user, sync }))
}

pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.session.logout().await;
    StatusCode::NO_CONTENT
}
