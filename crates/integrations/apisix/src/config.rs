use serde::Deserialize;

/// Connection settings for one APISIX instance.
#[derive(Clone, Deserialize)]
pub struct ApisixInstance {
    /// Instance label used in fan-out outcomes and logs.
    pub name: String,
    /// Base URL of the admin API.
    pub admin_url: String,
    /// Public base URL of the data plane, used to render route URLs.
    pub gateway_url: String,
    /// Admin API key sent as `X-API-KEY`.
    pub admin_api_key: String,
}

impl std::fmt::Debug for ApisixInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApisixInstance")
            .field("name", &self.name)
            .field("admin_url", &self.admin_url)
            .field("gateway_url", &self.gateway_url)
            .field("admin_api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_admin_key() {
        let instance = ApisixInstance {
            name: "gw-1".into(),
            admin_url: "http://localhost:9180".into(),
            gateway_url: "http://localhost:9080".into(),
            admin_api_key: "super-secret-admin-key".into(),
        };
        let debug = format!("{instance:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-admin-key"));
    }
}
