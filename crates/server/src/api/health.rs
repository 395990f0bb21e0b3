use axum::Json;
use axum::extract::State;

use super::AppState;
use super::schemas::MessageResponse;
use crate::error::ApiError;

/// `GET /health` -- probe every backend instance; healthy only when all
/// answer.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Backend health check",
    responses(
        (status = 200, description = "All backend instances healthy", body = MessageResponse),
        (status = 503, description = "At least one backend instance is unhealthy", body = MessageResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    state.orchestrator.health().await?;
    Ok(Json(MessageResponse::ok()))
}
