//! Request and response bodies of the public API.

use keyplane_orchestrator::RouteWithLimits;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of a successful `GET /apikey`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResponse {
    /// The caller's API key, lowercase hex.
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// Generic `{"message": ...}` body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            message: "OK".to_owned(),
        }
    }
}

/// One advertised route with its effective limits for the caller.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RouteEntry {
    pub url: String,
    /// Human-readable rendering, e.g. `"Quota: 100 req/1h (Group limit)"`.
    pub limits: String,
}

impl From<RouteWithLimits> for RouteEntry {
    fn from(route: RouteWithLimits) -> Self {
        Self {
            url: route.url,
            limits: route.limits,
        }
    }
}

/// Body of a successful `GET /routes`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoutesResponse {
    pub routes: Vec<RouteEntry>,
}

/// Body of the group-modification admin endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GroupRequest {
    #[serde(rename = "groupName")]
    pub group_name: String,
}
