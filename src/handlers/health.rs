use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "mood-journal-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Local storage is always there; the remote collection is only checked
/// when cloud sync is configured.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(remote) = &state.remote else {
        return (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { "database": "disabled" },
            })),
        );
    };

    match remote.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": { "database": "ok" },
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "checks": { "database": "failed" },
                })),
            )
        }
    }
}
