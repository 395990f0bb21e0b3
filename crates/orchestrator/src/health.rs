//! Combined backend health probe.

use tracing::{debug, instrument};

use crate::error::BackendError;
use crate::fanout::fan_out;
use crate::orchestrator::Orchestrator;

impl Orchestrator {
    /// Probe every secret-store and gateway instance concurrently.
    ///
    /// Vault exposes a real health endpoint; for APISIX the route listing
    /// doubles as the probe, exercising the admin API end to end. The
    /// identity provider has no cheap unauthenticated probe and is
    /// exercised lazily by the operations that need it.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), BackendError> {
        let (vault_outcomes, apisix_outcomes) = tokio::join!(
            fan_out(&self.vault, None, |c| c.health()),
            fan_out(&self.apisix, None, |c| async move {
                c.list_key_auth_routes().await.map(|_| ())
            }),
        );

        for outcome in vault_outcomes.into_iter().chain(apisix_outcomes) {
            outcome.result?;
        }

        debug!("all backend instances healthy");
        Ok(())
    }
}
