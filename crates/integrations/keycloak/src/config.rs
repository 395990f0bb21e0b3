use serde::Deserialize;

/// Connection settings for the identity provider.
#[derive(Clone, Deserialize)]
pub struct KeycloakSettings {
    /// Base URL of the Keycloak server.
    pub url: String,
    /// Realm holding the portal users.
    pub realm: String,
    /// Service-account client id for the client-credentials grant.
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for KeycloakSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakSettings")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
