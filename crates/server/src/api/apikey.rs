use axum::Json;
use axum::extract::State;
use tracing::debug;

use super::schemas::{ApiKeyResponse, MessageResponse};
use super::{AppState, token_subject};
use crate::auth::CallerToken;
use crate::error::ApiError;

/// `GET /apikey` -- return the caller's API key, issuing one on first use.
#[utoipa::path(
    get,
    path = "/apikey",
    tag = "API keys",
    summary = "Get or create the caller's API key",
    responses(
        (status = 200, description = "The caller's key", body = ApiKeyResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn get_api_key(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let subject = token_subject(&token)?;
    debug!(user = %subject, "api key requested");

    let record = state
        .orchestrator
        .ensure_user(subject.compact(), &token.groups)
        .await?;

    Ok(Json(ApiKeyResponse {
        api_key: record.auth_key,
    }))
}

/// `DELETE /apikey` -- revoke the caller's key everywhere. Succeeds even if
/// no key exists, so a retried revocation is not an error.
#[utoipa::path(
    delete,
    path = "/apikey",
    tag = "API keys",
    summary = "Revoke the caller's API key",
    responses(
        (status = 200, description = "Key revoked (or never existed)", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = token_subject(&token)?;
    debug!(user = %subject, "api key revocation requested");

    let snapshot = state.orchestrator.read_user(subject.compact()).await?;
    if snapshot.has_any() {
        state.orchestrator.remove_user(&snapshot).await?;
    }

    Ok(Json(MessageResponse::ok()))
}
