use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;

use crate::services::analysis::{AnalysisEnvelope, AnalysisError};
use crate::AppState;

/// Raw body so a malformed payload still gets the relay's own envelope.
pub async fn analyze_mood(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisEnvelope>, AnalysisError> {
    let raw: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let report = state.analysis.analyze(raw).await?;
    Ok(Json(AnalysisEnvelope::from(report)))
}
