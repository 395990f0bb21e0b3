use axum::Json;
use axum::extract::State;
use tracing::debug;

use super::schemas::{MessageResponse, RouteEntry, RoutesResponse};
use super::{AppState, token_subject};
use crate::auth::CallerToken;
use crate::error::ApiError;

/// `GET /routes` -- the key-authenticated routes visible to the caller,
/// each with the rate limits in force for them.
#[utoipa::path(
    get,
    path = "/routes",
    tag = "Routes",
    summary = "List authenticated routes with effective limits",
    responses(
        (status = 200, description = "Deduplicated routes across the fleet", body = RoutesResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 503, description = "Every gateway instance failed", body = MessageResponse)
    )
)]
pub async fn get_routes(
    State(state): State<AppState>,
    CallerToken(token): CallerToken,
) -> Result<Json<RoutesResponse>, ApiError> {
    let subject = token_subject(&token)?;
    debug!(user = %subject, "routes requested");

    let routes = state
        .orchestrator
        .routes_for_user(subject.compact())
        .await?;

    Ok(Json(RoutesResponse {
        routes: routes.into_iter().map(RouteEntry::from).collect(),
    }))
}
