//! Gateway routes and the rate-limit plugin shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A gateway route as read from the admin API. Only `uri` and the plugin
/// table matter to this service; upstream configuration is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub uri: String,
    #[serde(default)]
    pub plugins: RoutePlugins,
}

impl Route {
    /// Whether the route enforces key authentication. Routes without it are
    /// never advertised to users.
    pub fn requires_key_auth(&self) -> bool {
        self.plugins.key_auth.is_some()
    }
}

/// Plugin table of a route. The route-level key-auth shape differs from the
/// consumer one (header/query names, `hide_credentials`), so it is kept
/// opaque; presence is all the projection needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePlugins {
    #[serde(rename = "key-auth", default, skip_serializing_if = "Option::is_none")]
    pub key_auth: Option<serde_json::Value>,
    #[serde(rename = "limit-req", default, skip_serializing_if = "Option::is_none")]
    pub limit_req: Option<LimitReq>,
    #[serde(
        rename = "limit-count",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub limit_count: Option<LimitCount>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The leaky-bucket rate plugin: sustained `rate` requests per second with a
/// `burst` allowance on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitReq {
    pub rate: u64,
    #[serde(default)]
    pub burst: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The fixed-window quota plugin: `count` requests per `time_window`
/// seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCount {
    pub count: u64,
    pub time_window: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
