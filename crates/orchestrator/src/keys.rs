//! Key lifecycle: create or delete a user's key material across every
//! secret-store and gateway instance, with compensating rollback on partial
//! failure.

use chrono::Utc;
use keyplane_core::{Consumer, KeyRecord, desired_group_id};
use tracing::{debug, instrument, warn};

use crate::error::BackendError;
use crate::fanout::{collect, fan_out, fan_out_replay};
use crate::orchestrator::Orchestrator;
use crate::undo::Undo;

/// The user's state across both backends, read in one combined fan-out.
/// Vectors are aligned with declared instance order; `None` marks absence.
#[derive(Debug)]
pub struct UserSnapshot {
    pub secrets: Vec<Option<KeyRecord>>,
    pub consumers: Vec<Option<Consumer>>,
}

impl UserSnapshot {
    /// Whether any instance of either backend holds state for the user.
    pub fn has_any(&self) -> bool {
        self.secrets.iter().any(Option::is_some) || self.consumers.iter().any(Option::is_some)
    }

    /// The cluster-wide truth for the key record: the first instance's copy
    /// in declared order. All instances hold the same `auth_key`, so any
    /// copy would do; picking the first makes the tie-break deterministic.
    pub fn canonical_record(&self) -> Option<KeyRecord> {
        self.secrets
            .iter()
            .flatten()
            .next()
            .map(KeyRecord::canonical)
    }
}

impl Orchestrator {
    /// Read the user's state from every instance of both backends in
    /// parallel. Absence is structural; any transport or API failure
    /// surfaces as the first error in declared order, secret store first.
    #[instrument(skip(self))]
    pub async fn read_user(&self, compact_id: &str) -> Result<UserSnapshot, BackendError> {
        let (secret_outcomes, consumer_outcomes) = tokio::join!(
            fan_out(&self.vault, None, |c| c.get_user(compact_id)),
            fan_out(&self.apisix, None, |c| c.get_consumer(compact_id)),
        );

        Ok(UserSnapshot {
            secrets: collect(secret_outcomes)?,
            consumers: collect(consumer_outcomes)?,
        })
    }

    /// Ensure the user holds a key on every instance of both backends, and
    /// that every consumer's `group_id` matches the caller's memberships.
    /// Returns the canonical record; two successful calls return the same
    /// key.
    ///
    /// On partial write failure the successful writes are rolled back and
    /// the first error is surfaced; no instance keeps the half-created user.
    #[instrument(skip(self, groups))]
    pub async fn ensure_user(
        &self,
        compact_id: &str,
        groups: &[String],
    ) -> Result<KeyRecord, BackendError> {
        let snapshot = self.read_user(compact_id).await?;
        self.ensure_user_from(compact_id, groups, &snapshot).await
    }

    /// Create-combined over an already-read snapshot.
    pub(crate) async fn ensure_user_from(
        &self,
        compact_id: &str,
        groups: &[String],
        snapshot: &UserSnapshot,
    ) -> Result<KeyRecord, BackendError> {
        // Reuse the existing key when any instance still has it, so healing
        // a diverged cluster never rotates the user's key.
        let record = snapshot
            .canonical_record()
            .unwrap_or_else(|| KeyRecord::derive(compact_id, &self.secret_phrase, Utc::now()));
        let group_id = desired_group_id(groups);

        let missing_secrets: Vec<String> = self
            .vault
            .iter()
            .zip(&snapshot.secrets)
            .filter(|(_, existing)| existing.is_none())
            .map(|(client, _)| client.name().to_owned())
            .collect();

        let stale_consumers: Vec<String> = self
            .apisix
            .iter()
            .zip(&snapshot.consumers)
            .filter(|(_, existing)| {
                existing
                    .as_ref()
                    .is_none_or(|consumer| consumer.group_id != group_id)
            })
            .map(|(client, _)| client.name().to_owned())
            .collect();

        if missing_secrets.is_empty() && stale_consumers.is_empty() {
            debug!(user = compact_id, "user already present on every instance");
            return Ok(record);
        }

        debug!(
            user = compact_id,
            secret_instances = ?missing_secrets,
            gateway_instances = ?stale_consumers,
            "creating or updating user across instances"
        );

        let (secret_outcomes, consumer_outcomes) = tokio::join!(
            fan_out(&self.vault, Some(&missing_secrets), |c| c.put_user(&record)),
            fan_out(&self.apisix, Some(&stale_consumers), |c| {
                let group_id = group_id.clone();
                async move {
                    let consumer = c.consumer_for(compact_id, group_id);
                    c.upsert_consumer(&consumer).await
                }
            }),
        );

        let mut undos = Vec::new();
        let mut first_error = None;
        for outcome in secret_outcomes {
            match outcome.result {
                Ok(stored) => undos.push(Undo::DeleteSecret(stored)),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        for outcome in consumer_outcomes {
            match outcome.result {
                Ok(stored) => undos.push(Undo::DeleteConsumer(stored)),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            warn!(user = compact_id, %error, "partial create failure, rolling back");
            self.run_undos(undos).await;
            return Err(error);
        }

        Ok(record)
    }

    /// Delete the user's key material from every instance that holds it.
    ///
    /// On success, returns the undo actions that would restore the removed
    /// state; the admin orchestrator replays them when a later step of its
    /// sequence fails. On partial failure the successful deletions are
    /// restored and the first error is surfaced.
    #[instrument(skip(self, snapshot))]
    pub async fn remove_user(&self, snapshot: &UserSnapshot) -> Result<Vec<Undo>, BackendError> {
        let secret_args: Vec<(String, KeyRecord)> = snapshot
            .secrets
            .iter()
            .flatten()
            .map(|record| (record.instance_name.clone(), record.clone()))
            .collect();
        let consumer_args: Vec<(String, Consumer)> = snapshot
            .consumers
            .iter()
            .flatten()
            .map(|consumer| (consumer.instance_name.clone(), consumer.clone()))
            .collect();

        debug!(
            secret_instances = secret_args.len(),
            gateway_instances = consumer_args.len(),
            "deleting user across instances"
        );

        let (secret_outcomes, consumer_outcomes) = tokio::join!(
            fan_out_replay(&self.vault, secret_args, |c, record| async move {
                c.delete_user(&record).await
            }),
            fan_out_replay(&self.apisix, consumer_args, |c, consumer| async move {
                c.delete_consumer(&consumer).await
            }),
        );

        let mut restores = Vec::new();
        let mut first_error = None;
        for outcome in secret_outcomes {
            match outcome.result {
                Ok(removed) => restores.push(Undo::RestoreSecret(removed)),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        for outcome in consumer_outcomes {
            match outcome.result {
                Ok(removed) => restores.push(Undo::RestoreConsumer(removed)),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            warn!(%error, "partial delete failure, restoring deleted records");
            self.run_undos(restores).await;
            return Err(error);
        }

        Ok(restores)
    }
}
