//! Concurrent fan-out of one operation across the instances of a backend.

use futures::future::join_all;
use tracing::warn;

use crate::error::BackendError;

/// Implemented by per-instance backend clients so the runner can select and
/// attribute them by name.
pub trait BackendInstance {
    fn instance_name(&self) -> &str;
}

impl BackendInstance for keyplane_apisix::ApisixClient {
    fn instance_name(&self) -> &str {
        self.name()
    }
}

impl BackendInstance for keyplane_vault::VaultClient {
    fn instance_name(&self) -> &str {
        self.name()
    }
}

/// The result of one per-instance operation, tagged with the instance it ran
/// against. Outcomes come back in declared instance order.
#[derive(Debug)]
pub struct InstanceOutcome<T> {
    pub instance: String,
    pub result: Result<T, BackendError>,
}

/// Run `op` concurrently on every client (or only those named in `only`),
/// capturing every outcome. A failing instance never short-circuits the
/// others, and a slow instance cannot starve them: all futures progress
/// together and the runner returns once the last one settles.
pub async fn fan_out<'a, C, T, E, F, Fut>(
    clients: &'a [C],
    only: Option<&[String]>,
    op: F,
) -> Vec<InstanceOutcome<T>>
where
    C: BackendInstance,
    E: Into<BackendError>,
    F: Fn(&'a C) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
{
    let futures: Vec<_> = clients
        .iter()
        .filter(|client| {
            only.is_none_or(|names| names.iter().any(|n| n == client.instance_name()))
        })
        .map(|client| {
            let instance = client.instance_name().to_owned();
            let fut = op(client);
            async move {
                InstanceOutcome {
                    instance,
                    result: fut.await.map_err(Into::into),
                }
            }
        })
        .collect();

    join_all(futures).await
}

/// Run `op(client, arg)` for exactly the `(instance_name, arg)` pairs given,
/// concurrently. Used by compensation to replay the writes that previously
/// succeeded, each with the payload observed at the time. Pairs naming an
/// instance no longer in the fleet are skipped; that can only happen when
/// configuration changed between the forward pass and the rollback.
pub async fn fan_out_replay<'a, C, A, T, E, F, Fut>(
    clients: &'a [C],
    args: Vec<(String, A)>,
    op: F,
) -> Vec<InstanceOutcome<T>>
where
    C: BackendInstance,
    E: Into<BackendError>,
    F: Fn(&'a C, A) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
{
    let futures: Vec<_> = args
        .into_iter()
        .filter_map(|(instance, arg)| {
            let Some(client) = clients.iter().find(|c| c.instance_name() == instance) else {
                warn!(%instance, "instance named in replay is not in the fleet, skipping");
                return None;
            };
            let fut = op(client, arg);
            Some(async move {
                InstanceOutcome {
                    instance,
                    result: fut.await.map_err(Into::into),
                }
            })
        })
        .collect();

    join_all(futures).await
}

/// Collapse outcomes into their values in instance order, surfacing the
/// first error. Used on read paths where partial results are useless.
pub fn collect<T>(outcomes: Vec<InstanceOutcome<T>>) -> Result<Vec<T>, BackendError> {
    outcomes
        .into_iter()
        .map(|outcome| outcome.result)
        .collect()
}
