use keyplane_apisix::ApisixError;
use keyplane_keycloak::KeycloakError;
use keyplane_vault::VaultError;
use thiserror::Error;

/// A failure of one of the three backends, tagged by kind.
///
/// The kind decides which compensation applies and which stable message the
/// HTTP layer serves. Within a fan-out, the first faulting operation in
/// declared instance order determines the error surfaced to the caller.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("gateway error: {0}")]
    Gateway(#[from] ApisixError),

    #[error("secret store error: {0}")]
    Secret(#[from] VaultError),

    #[error("identity provider error: {0}")]
    Identity(#[from] KeycloakError),
}

impl BackendError {
    /// The stable English message served to clients with a 503. Detail stays
    /// in the logs.
    pub fn service_message(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "APISIX service error",
            Self::Secret(_) => "Vault service error",
            Self::Identity(_) => "Keycloak service error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_messages_are_stable() {
        let gateway: BackendError = ApisixError::Api {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "boom".into(),
        }
        .into();
        assert_eq!(gateway.service_message(), "APISIX service error");

        let secret: BackendError = VaultError::Api {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "sealed".into(),
        }
        .into();
        assert_eq!(secret.service_message(), "Vault service error");

        let identity: BackendError = KeycloakError::Token("expired".into()).into();
        assert_eq!(identity.service_message(), "Keycloak service error");
    }
}
