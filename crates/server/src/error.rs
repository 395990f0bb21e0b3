use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keyplane_orchestrator::{AdminError, BackendError};
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;

/// Errors surfaced by the HTTP layer, each with a stable JSON message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or group-membership failure (401/403).
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// A caller error: unknown user or group (404).
    #[error("{0}")]
    NotFound(String),

    /// A backend failed; the caller sees the stable per-backend message
    /// while the detail goes to the log (503).
    #[error("{}", .0.service_message())]
    Backend(BackendError),
}

impl From<BackendError> for ApiError {
    fn from(error: BackendError) -> Self {
        Self::Backend(error)
    }
}

impl From<AdminError> for ApiError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::UserNotFound(_) | AdminError::GroupNotFound(_) => {
                Self::NotFound(error.to_string())
            }
            AdminError::Backend(backend) => Self::Backend(backend),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Auth(auth) => auth.status(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(backend) => {
                error!(error = %backend, "backend failure");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let body = serde_json::json!({ "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyplane_keycloak::KeycloakError;

    #[test]
    fn backend_errors_use_the_stable_message() {
        let error: ApiError = BackendError::Identity(KeycloakError::Token("boom".into())).into();
        assert_eq!(error.to_string(), "Keycloak service error");
    }

    #[test]
    fn admin_not_found_maps_to_404_message() {
        let error: ApiError = AdminError::GroupNotFound("WIZARDS".into()).into();
        assert_eq!(error.to_string(), "Group 'WIZARDS' not found");
        assert!(matches!(error, ApiError::NotFound(_)));
    }
}
