//! Admin orchestration: sequencing identity-provider changes around key
//! lifecycle changes, with reversal when a later step fails.

use keyplane_apisix::ApisixError;
use keyplane_core::{Consumer, EUMETNET_USER_GROUP, Subject};
use keyplane_keycloak::KeycloakError;
use keyplane_vault::VaultError;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::BackendError;
use crate::fanout::{collect, fan_out, fan_out_replay};
use crate::orchestrator::Orchestrator;
use crate::undo::Undo;

/// Failures of admin operations. The caller-error variants surface as 404s;
/// backend failures keep their 503 semantics.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Group '{0}' not found")]
    GroupNotFound(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<KeycloakError> for AdminError {
    fn from(error: KeycloakError) -> Self {
        Self::Backend(error.into())
    }
}

impl From<ApisixError> for AdminError {
    fn from(error: ApisixError) -> Self {
        Self::Backend(error.into())
    }
}

impl From<VaultError> for AdminError {
    fn from(error: VaultError) -> Self {
        Self::Backend(error.into())
    }
}

/// Direction of a group membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupChange {
    Add,
    Remove,
}

/// Final identity-provider step of a user retirement.
#[derive(Debug, Clone, Copy)]
enum RetireAction {
    Delete,
    Disable,
}

impl Orchestrator {
    /// Delete a user everywhere: key material from both backends, then the
    /// identity-provider account. If the account deletion fails, the key
    /// state removed in the first step is restored.
    #[instrument(skip(self), fields(user = %subject))]
    pub async fn delete_user(&self, subject: &Subject) -> Result<(), AdminError> {
        self.retire_user(subject, RetireAction::Delete).await
    }

    /// Disable a user: remove key material, then mark the account disabled.
    /// Same compensation as deletion.
    #[instrument(skip(self), fields(user = %subject))]
    pub async fn disable_user(&self, subject: &Subject) -> Result<(), AdminError> {
        self.retire_user(subject, RetireAction::Disable).await
    }

    /// Re-enable a disabled user. The user gets a key again on their next
    /// `/apikey` call; nothing is written to the key backends here.
    #[instrument(skip(self), fields(user = %subject))]
    pub async fn enable_user(&self, subject: &Subject) -> Result<(), AdminError> {
        let uuid = subject.uuid().to_string();
        let Some(mut user) = self.keycloak.get_user(&uuid).await? else {
            return Err(AdminError::UserNotFound(uuid));
        };

        user.enabled = Some(true);
        self.keycloak.update_user(&uuid, &user).await?;
        info!(user = %subject, "user enabled");
        Ok(())
    }

    async fn retire_user(&self, subject: &Subject, action: RetireAction) -> Result<(), AdminError> {
        let uuid = subject.uuid().to_string();
        let Some(user) = self.keycloak.get_user(&uuid).await? else {
            return Err(AdminError::UserNotFound(uuid));
        };

        let snapshot = self
            .read_user(subject.compact())
            .await
            .map_err(AdminError::Backend)?;

        let restores = if snapshot.has_any() {
            debug!(user = %subject, "user holds key state, deleting it first");
            self.remove_user(&snapshot)
                .await
                .map_err(AdminError::Backend)?
        } else {
            Vec::new()
        };

        let result = match action {
            RetireAction::Delete => self.keycloak.delete_user(&uuid).await,
            RetireAction::Disable => {
                let mut disabled = user;
                disabled.enabled = Some(false);
                self.keycloak.update_user(&uuid, &disabled).await
            }
        };

        if let Err(error) = result {
            warn!(user = %subject, %error, "identity provider step failed, restoring key state");
            self.run_undos(restores).await;
            return Err(error.into());
        }

        info!(user = %subject, ?action, "user retired");
        Ok(())
    }

    /// Add the user to or remove them from a named identity-provider group,
    /// projecting `EUMETNET_USER` membership onto every gateway consumer.
    ///
    /// When the gateway projection partially fails, the membership change is
    /// reversed and the touched consumers are compensated: deleted where
    /// none existed before, restored to the prior record where one did.
    #[instrument(skip(self), fields(user = %subject))]
    pub async fn modify_user_group(
        &self,
        subject: &Subject,
        group_name: &str,
        change: GroupChange,
    ) -> Result<(), AdminError> {
        let groups = self.keycloak.list_groups().await?;
        let Some(group) = groups.into_iter().find(|g| g.name == group_name) else {
            return Err(AdminError::GroupNotFound(group_name.to_owned()));
        };

        let uuid = subject.uuid().to_string();
        if self.keycloak.get_user(&uuid).await?.is_none() {
            return Err(AdminError::UserNotFound(uuid));
        }

        match change {
            GroupChange::Add => self.keycloak.add_user_to_group(&uuid, &group.id).await?,
            GroupChange::Remove => {
                self.keycloak
                    .remove_user_from_group(&uuid, &group.id)
                    .await?;
            }
        }
        info!(user = %subject, group = %group.name, ?change, "membership updated");

        // Memberships other than EUMETNET_USER have no gateway counterpart.
        if group.name != EUMETNET_USER_GROUP {
            return Ok(());
        }

        let project = self.project_membership(subject, change).await;
        if let Err(error) = project {
            warn!(user = %subject, %error, "gateway projection failed, reversing membership");
            let reversal = match change {
                GroupChange::Add => self.keycloak.remove_user_from_group(&uuid, &group.id).await,
                GroupChange::Remove => self.keycloak.add_user_to_group(&uuid, &group.id).await,
            };
            if let Err(reversal_error) = reversal {
                warn!(user = %subject, error = %reversal_error, "membership reversal failed");
            }
            return Err(AdminError::Backend(error));
        }

        Ok(())
    }

    /// Re-upsert every gateway consumer with the `group_id` implied by the
    /// new membership. Rolls its own writes back on partial failure before
    /// reporting, so the caller only has the membership itself to reverse.
    async fn project_membership(
        &self,
        subject: &Subject,
        change: GroupChange,
    ) -> Result<(), BackendError> {
        let compact_id = subject.compact();
        let consumers = collect(fan_out(&self.apisix, None, |c| c.get_consumer(compact_id)).await)?;

        if !consumers.iter().any(Option::is_some) {
            debug!(user = %subject, "user has no consumers, nothing to project");
            return Ok(());
        }

        let group_id = match change {
            GroupChange::Add => Some(EUMETNET_USER_GROUP.to_owned()),
            GroupChange::Remove => None,
        };

        let args: Vec<(String, Option<Consumer>)> = self
            .apisix
            .iter()
            .zip(consumers)
            .map(|(client, prior)| (client.name().to_owned(), prior))
            .collect();

        let outcomes = fan_out_replay(&self.apisix, args, |c, prior| {
            let group_id = group_id.clone();
            async move {
                let desired = match &prior {
                    Some(existing) => {
                        let mut updated = existing.clone();
                        updated.group_id = group_id;
                        updated
                    }
                    None => c.consumer_for(compact_id, group_id),
                };
                c.upsert_consumer(&desired).await.map(|stored| (stored, prior))
            }
        })
        .await;

        let mut undos = Vec::new();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome.result {
                Ok((stored, prior)) => undos.push(match prior {
                    Some(previous) => Undo::RestoreConsumer(previous),
                    None => Undo::DeleteConsumer(stored),
                }),
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            warn!(user = %subject, %error, "partial projection failure, rolling back consumers");
            self.run_undos(undos).await;
            return Err(error);
        }

        Ok(())
    }
}
