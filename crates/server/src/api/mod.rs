pub mod admin;
pub mod apikey;
pub mod health;
pub mod openapi;
pub mod routes;
pub mod schemas;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, put};
use keyplane_core::{AccessToken, Subject};
use keyplane_orchestrator::Orchestrator;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthError, TokenValidator};
use crate::error::ApiError;

use self::openapi::ApiDoc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub validator: Arc<dyn TokenValidator>,
}

/// Parse the verified token's subject into the UUID forms the backends
/// speak. A verified token with an unparseable subject is a validation
/// failure, not a caller error.
pub(crate) fn token_subject(token: &AccessToken) -> Result<Subject, ApiError> {
    Subject::parse(&token.sub).map_err(|_| AuthError::TokenValidationFailed.into())
}

/// Build the CORS layer from the configured origins; a `"*"` entry means
/// any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Build the axum router with all routes, the Swagger UI and middleware.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route(
            "/apikey",
            get(apikey::get_api_key).delete(apikey::delete_api_key),
        )
        .route("/routes", get(routes::get_routes))
        .route("/health", get(health::health))
        .route("/admin/users/{user_uuid}", delete(admin::delete_user))
        .route(
            "/admin/users/{user_uuid}/apikey",
            delete(admin::delete_user_api_key),
        )
        .route("/admin/users/{user_uuid}/disable", put(admin::disable_user))
        .route("/admin/users/{user_uuid}/enable", put(admin::enable_user))
        .route(
            "/admin/users/{user_uuid}/update-group",
            put(admin::update_group),
        )
        .route(
            "/admin/users/{user_uuid}/remove-group",
            put(admin::remove_group),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
