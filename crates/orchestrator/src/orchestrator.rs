use keyplane_apisix::ApisixClient;
use keyplane_keycloak::KeycloakClient;
use keyplane_vault::VaultClient;

/// The multi-backend orchestrator: one APISIX client per gateway instance,
/// one Vault client per secret-store instance, and the identity provider.
///
/// Instance order in the two client vectors is the declared configuration
/// order; fan-out outcomes, canonical-record tie-breaks and first-error
/// selection all follow it.
pub struct Orchestrator {
    pub(crate) apisix: Vec<ApisixClient>,
    pub(crate) vault: Vec<VaultClient>,
    pub(crate) keycloak: KeycloakClient,
    pub(crate) secret_phrase: String,
}

impl Orchestrator {
    pub fn new(
        apisix: Vec<ApisixClient>,
        vault: Vec<VaultClient>,
        keycloak: KeycloakClient,
        secret_phrase: impl Into<String>,
    ) -> Self {
        Self {
            apisix,
            vault,
            keycloak,
            secret_phrase: secret_phrase.into(),
        }
    }

    /// Names of the configured gateway instances, in declared order.
    pub fn gateway_instances(&self) -> impl Iterator<Item = &str> {
        self.apisix.iter().map(ApisixClient::name)
    }

    /// Names of the configured secret-store instances, in declared order.
    pub fn secret_instances(&self) -> impl Iterator<Item = &str> {
        self.vault.iter().map(VaultClient::name)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("apisix", &self.apisix.len())
            .field("vault", &self.vault.len())
            .finish_non_exhaustive()
    }
}
