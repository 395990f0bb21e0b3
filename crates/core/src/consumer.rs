//! Gateway-side records: consumers and consumer groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::route::{LimitCount, LimitReq};

/// A per-gateway-instance record binding a username to a key-auth
/// indirection into the secret store.
///
/// `group_id` is present only when the user belongs to the privileged
/// `EUMETNET_USER` group; the default group is expressed by its absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    /// Name of the gateway instance this consumer was read from.
    #[serde(skip)]
    pub instance_name: String,
    /// The owner's compact UUID.
    pub username: String,
    pub plugins: ConsumerPlugins,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Plugin table of a consumer. `key-auth` is always present; the limit
/// plugins appear only on consumers with individually negotiated limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerPlugins {
    #[serde(rename = "key-auth")]
    pub key_auth: KeyAuth,
    #[serde(rename = "limit-req", default, skip_serializing_if = "Option::is_none")]
    pub limit_req: Option<LimitReq>,
    #[serde(
        rename = "limit-count",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub limit_count: Option<LimitCount>,
    /// Plugins this service does not interpret, preserved verbatim so an
    /// upsert never strips operator-managed configuration.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The key-auth plugin of a consumer. `key` is an indirection reference the
/// gateway resolves against the secret store at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAuth {
    pub key: String,
}

impl Consumer {
    /// Build the canonical consumer for `username`, pointing its key-auth
    /// plugin at `<key_path><username>/<key_name>`.
    pub fn with_key_reference(
        username: &str,
        key_path: &str,
        key_name: &str,
        group_id: Option<String>,
    ) -> Self {
        Self {
            instance_name: String::new(),
            username: username.to_owned(),
            plugins: ConsumerPlugins {
                key_auth: KeyAuth {
                    key: format!("{key_path}{username}/{key_name}"),
                },
                limit_req: None,
                limit_count: None,
                extra: BTreeMap::new(),
            },
            group_id,
        }
    }
}

/// A per-gateway-instance policy bundle consumers reference by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub id: String,
    #[serde(default)]
    pub plugins: GroupPlugins,
}

/// Plugin table of a consumer group; only the limit plugins matter here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPlugins {
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
