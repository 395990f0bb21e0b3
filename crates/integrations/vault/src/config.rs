use serde::Deserialize;

/// Connection settings for one Vault instance.
#[derive(Clone, Deserialize)]
pub struct VaultInstance {
    /// Instance label used in fan-out outcomes and logs.
    pub name: String,
    /// Base URL of the instance.
    pub url: String,
    /// Token sent as `X-Vault-Token`.
    pub token: String,
}

impl std::fmt::Debug for VaultInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultInstance")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
