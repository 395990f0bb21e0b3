use utoipa::OpenApi;

use super::schemas::{ApiKeyResponse, GroupRequest, MessageResponse, RouteEntry, RoutesResponse};

/// OpenAPI document served at `/api-doc/openapi.json` and rendered by the
/// Swagger UI.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Keyplane",
        description = "Control plane issuing and distributing API keys across an APISIX fleet"
    ),
    paths(
        super::apikey::get_api_key,
        super::apikey::delete_api_key,
        super::routes::get_routes,
        super::health::health,
        super::admin::delete_user,
        super::admin::delete_user_api_key,
        super::admin::disable_user,
        super::admin::enable_user,
        super::admin::update_group,
        super::admin::remove_group,
    ),
    components(schemas(
        ApiKeyResponse,
        MessageResponse,
        RouteEntry,
        RoutesResponse,
        GroupRequest
    ))
)]
pub struct ApiDoc;
