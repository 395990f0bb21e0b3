//! Operator endpoints. All require the `ADMIN` group.

use axum::Json;
use axum::extract::{Path, State};
use keyplane_core::Subject;
use keyplane_orchestrator::GroupChange;
use tracing::info;

use super::AppState;
use super::schemas::{GroupRequest, MessageResponse};
use crate::auth::AdminToken;
use crate::error::ApiError;

/// A path parameter that is not a UUID can never name a user, so it gets
/// the same 404 an unknown UUID would.
fn parse_subject(raw: &str) -> Result<Subject, ApiError> {
    Subject::parse(raw).map_err(|_| ApiError::NotFound(format!("User '{raw}' not found")))
}

/// `DELETE /admin/users/{user_uuid}` -- delete the user everywhere.
#[utoipa::path(
    delete,
    path = "/admin/users/{user_uuid}",
    tag = "Admin",
    summary = "Delete a user and their key material",
    params(("user_uuid" = String, Path, description = "UUID of the user")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse),
        (status = 404, description = "Unknown user", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminToken(admin): AdminToken,
    Path(user_uuid): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = parse_subject(&user_uuid)?;
    info!(admin = %admin.sub, user = %subject, "admin requested user deletion");

    state.orchestrator.delete_user(&subject).await?;
    Ok(Json(MessageResponse::ok()))
}

/// `DELETE /admin/users/{user_uuid}/apikey` -- revoke a user's key without
/// touching their account.
#[utoipa::path(
    delete,
    path = "/admin/users/{user_uuid}/apikey",
    tag = "Admin",
    summary = "Revoke a user's API key",
    params(("user_uuid" = String, Path, description = "UUID of the user")),
    responses(
        (status = 200, description = "Key revoked (or never existed)", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse),
        (status = 404, description = "Invalid user id", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn delete_user_api_key(
    State(state): State<AppState>,
    AdminToken(admin): AdminToken,
    Path(user_uuid): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = parse_subject(&user_uuid)?;
    info!(admin = %admin.sub, user = %subject, "admin requested key revocation");

    let snapshot = state.orchestrator.read_user(subject.compact()).await?;
    if snapshot.has_any() {
        state.orchestrator.remove_user(&snapshot).await?;
    }

    Ok(Json(MessageResponse::ok()))
}

/// `PUT /admin/users/{user_uuid}/disable` -- disable the account and revoke
/// its key.
#[utoipa::path(
    put,
    path = "/admin/users/{user_uuid}/disable",
    tag = "Admin",
    summary = "Disable a user",
    params(("user_uuid" = String, Path, description = "UUID of the user")),
    responses(
        (status = 200, description = "User disabled", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse),
        (status = 404, description = "Unknown user", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn disable_user(
    State(state): State<AppState>,
    AdminToken(admin): AdminToken,
    Path(user_uuid): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = parse_subject(&user_uuid)?;
    info!(admin = %admin.sub, user = %subject, "admin requested disabling the user");

    state.orchestrator.disable_user(&subject).await?;
    Ok(Json(MessageResponse::ok()))
}

/// `PUT /admin/users/{user_uuid}/enable` -- re-enable a disabled account.
#[utoipa::path(
    put,
    path = "/admin/users/{user_uuid}/enable",
    tag = "Admin",
    summary = "Enable a user",
    params(("user_uuid" = String, Path, description = "UUID of the user")),
    responses(
        (status = 200, description = "User enabled", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse),
        (status = 404, description = "Unknown user", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn enable_user(
    State(state): State<AppState>,
    AdminToken(admin): AdminToken,
    Path(user_uuid): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = parse_subject(&user_uuid)?;
    info!(admin = %admin.sub, user = %subject, "admin requested enabling the user");

    state.orchestrator.enable_user(&subject).await?;
    Ok(Json(MessageResponse::ok()))
}

/// `PUT /admin/users/{user_uuid}/update-group` -- add the user to a group.
#[utoipa::path(
    put,
    path = "/admin/users/{user_uuid}/update-group",
    tag = "Admin",
    summary = "Add a user to a group",
    params(("user_uuid" = String, Path, description = "UUID of the user")),
    request_body = GroupRequest,
    responses(
        (status = 200, description = "Membership updated", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse),
        (status = 404, description = "Unknown user or group", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn update_group(
    State(state): State<AppState>,
    AdminToken(admin): AdminToken,
    Path(user_uuid): Path<String>,
    Json(request): Json<GroupRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = parse_subject(&user_uuid)?;
    info!(
        admin = %admin.sub,
        user = %subject,
        group = %request.group_name,
        "admin requested group promotion"
    );

    state
        .orchestrator
        .modify_user_group(&subject, &request.group_name, GroupChange::Add)
        .await?;
    Ok(Json(MessageResponse::ok()))
}

/// `PUT /admin/users/{user_uuid}/remove-group` -- remove the user from a
/// group.
#[utoipa::path(
    put,
    path = "/admin/users/{user_uuid}/remove-group",
    tag = "Admin",
    summary = "Remove a user from a group",
    params(("user_uuid" = String, Path, description = "UUID of the user")),
    request_body = GroupRequest,
    responses(
        (status = 200, description = "Membership updated", body = MessageResponse),
        (status = 403, description = "Caller is not an admin", body = MessageResponse),
        (status = 404, description = "Unknown user or group", body = MessageResponse),
        (status = 503, description = "A backend failed", body = MessageResponse)
    )
)]
pub async fn remove_group(
    State(state): State<AppState>,
    AdminToken(admin): AdminToken,
    Path(user_uuid): Path<String>,
    Json(request): Json<GroupRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let subject = parse_subject(&user_uuid)?;
    info!(
        admin = %admin.sub,
        user = %subject,
        group = %request.group_name,
        "admin requested group demotion"
    );

    state
        .orchestrator
        .modify_user_group(&subject, &request.group_name, GroupChange::Remove)
        .await?;
    Ok(Json(MessageResponse::ok()))
}
