//! Compensation expressed as data.
//!
//! Every forward write that succeeds records the action that would reverse
//! it. When a fan-out partially fails, the recorded actions run concurrently;
//! their own failures are logged and swallowed, because compensation is
//! best-effort and the next successful call converges the fleet anyway.

use keyplane_core::{Consumer, KeyRecord};
use tracing::warn;

use crate::fanout::fan_out_replay;
use crate::orchestrator::Orchestrator;

/// One recorded inverse of a successful write. The payload is the record as
/// observed when the forward write happened, so a replay restores exactly
/// the prior state.
#[derive(Debug, Clone)]
pub enum Undo {
    /// Reverse a secret-store put.
    DeleteSecret(KeyRecord),
    /// Reverse a secret-store delete by re-putting the removed record.
    RestoreSecret(KeyRecord),
    /// Reverse a consumer upsert that created the consumer.
    DeleteConsumer(Consumer),
    /// Reverse a consumer delete (or an overwriting upsert) by re-upserting
    /// the prior consumer.
    RestoreConsumer(Consumer),
}

impl Orchestrator {
    /// Run the recorded undo actions concurrently, logging failures at WARN.
    ///
    /// Never fails: the caller-visible error must remain the one from the
    /// forward pass regardless of how compensation fares.
    pub(crate) async fn run_undos(&self, undos: Vec<Undo>) {
        if undos.is_empty() {
            return;
        }

        let mut delete_secrets = Vec::new();
        let mut restore_secrets = Vec::new();
        let mut delete_consumers = Vec::new();
        let mut restore_consumers = Vec::new();
        for undo in undos {
            match undo {
                Undo::DeleteSecret(record) => {
                    delete_secrets.push((record.instance_name.clone(), record));
                }
                Undo::RestoreSecret(record) => {
                    restore_secrets.push((record.instance_name.clone(), record));
                }
                Undo::DeleteConsumer(consumer) => {
                    delete_consumers.push((consumer.instance_name.clone(), consumer));
                }
                Undo::RestoreConsumer(consumer) => {
                    restore_consumers.push((consumer.instance_name.clone(), consumer));
                }
            }
        }

        let (deleted, restored, removed, reinstated) = tokio::join!(
            fan_out_replay(&self.vault, delete_secrets, |c, record| async move {
                c.delete_user(&record).await
            }),
            fan_out_replay(&self.vault, restore_secrets, |c, record| async move {
                c.put_user(&record).await
            }),
            fan_out_replay(&self.apisix, delete_consumers, |c, consumer| async move {
                c.delete_consumer(&consumer).await
            }),
            fan_out_replay(&self.apisix, restore_consumers, |c, consumer| async move {
                c.upsert_consumer(&consumer).await
            }),
        );

        for outcome in deleted.iter().chain(&restored) {
            if let Err(error) = &outcome.result {
                warn!(instance = %outcome.instance, %error, "secret-store rollback step failed");
            }
        }
        for outcome in removed.iter().chain(&reinstated) {
            if let Err(error) = &outcome.result {
                warn!(instance = %outcome.instance, %error, "gateway rollback step failed");
            }
        }
    }
}
