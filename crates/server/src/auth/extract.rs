use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use keyplane_core::AccessToken;
use tracing::debug;

use super::AuthError;
use crate::api::AppState;
use crate::error::ApiError;

/// Extractor for endpoints open to any valid portal user.
///
/// Pulls the bearer token from the `Authorization` header, runs it through
/// the state's validator, and rejects tokens whose groups are all unknown.
pub struct CallerToken(pub AccessToken);

/// Extractor for operator endpoints; additionally requires `ADMIN`.
pub struct AdminToken(pub AccessToken);

async fn authenticate(parts: &Parts, state: &AppState) -> Result<AccessToken, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Err(AuthError::NotAuthenticated);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::NotAuthenticated)?;

    // Browsers hand the portal a literal "undefined" before login.
    if token.is_empty() || token == "undefined" {
        return Err(AuthError::TokenNotProvided);
    }

    let access = state.validator.validate(token).await?;

    if !access.has_known_group() {
        debug!(user = %access.sub, "token carries no known group");
        return Err(AuthError::InvalidGroups);
    }

    Ok(access)
}

impl FromRequestParts<AppState> for CallerToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let access = authenticate(parts, state).await?;
        Ok(Self(access))
    }
}

impl FromRequestParts<AppState> for AdminToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let access = authenticate(parts, state).await?;
        if !access.is_admin() {
            debug!(user = %access.sub, "non-admin called an admin endpoint");
            return Err(AuthError::InvalidGroups.into());
        }
        Ok(Self(access))
    }
}
