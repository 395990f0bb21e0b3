//! Projection of effective per-route rate limits for one caller.
//!
//! For each of `limit-req` and `limit-count` independently, the most
//! specific configuration wins: Consumer, then the consumer's group, then
//! the route itself.

use std::collections::HashSet;

use futures::future::join_all;
use keyplane_apisix::ApisixClient;
use keyplane_core::{Consumer, LimitCount, LimitReq};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::BackendError;
use crate::fanout::fan_out;
use crate::orchestrator::Orchestrator;

/// One advertised route with its rendered effective limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteWithLimits {
    pub url: String,
    pub limits: String,
}

/// Where an effective limit value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitSource {
    Consumer,
    Group,
    Route,
}

impl std::fmt::Display for LimitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Consumer => "Consumer",
            Self::Group => "Group",
            Self::Route => "Route",
        })
    }
}

/// Pick the effective value of one limit plugin under the precedence rule.
fn effective<'a, T>(
    consumer: Option<&'a T>,
    group: Option<&'a T>,
    route: Option<&'a T>,
) -> Option<(LimitSource, &'a T)> {
    consumer
        .map(|value| (LimitSource::Consumer, value))
        .or_else(|| group.map(|value| (LimitSource::Group, value)))
        .or_else(|| route.map(|value| (LimitSource::Route, value)))
}

/// Render a quota window using the largest exact unit dividing it.
fn window(seconds: u64) -> String {
    for (unit, label) in [(86_400, "d"), (3_600, "h"), (60, "m")] {
        if seconds > 0 && seconds % unit == 0 {
            return format!("{}{label}", seconds / unit);
        }
    }
    format!("{seconds}s")
}

/// Tag describing which levels the effective limits came from.
fn source_tag(count: Option<LimitSource>, req: Option<LimitSource>) -> Option<String> {
    match (count, req) {
        (None, None) => None,
        (Some(c), Some(r)) if c != r => Some(format!("{c} quota, {r} rate")),
        (Some(source), _) | (None, Some(source)) => Some(format!("{source} limit")),
    }
}

/// Render the human-readable limits string for one route.
fn render_limits(
    count: Option<(LimitSource, &LimitCount)>,
    req: Option<(LimitSource, &LimitReq)>,
) -> String {
    let Some(tag) = source_tag(count.map(|(s, _)| s), req.map(|(s, _)| s)) else {
        return "No limits".to_owned();
    };

    let mut parts = Vec::new();
    if let Some((_, limit)) = count {
        parts.push(format!("Quota: {} req/{}", limit.count, window(limit.time_window)));
    }
    if let Some((_, limit)) = req {
        parts.push(format!("Rate: {} req/s", limit.rate));
        parts.push(format!("Burst: {} req", limit.burst));
    }

    format!("{} ({tag})", parts.join(" | "))
}

/// Project one gateway instance's key-auth routes for the given consumer.
async fn project_instance(
    client: &ApisixClient,
    consumer: Option<Consumer>,
) -> Result<Vec<RouteWithLimits>, BackendError> {
    let routes = client.list_key_auth_routes().await?;

    let group = match consumer.as_ref().and_then(|c| c.group_id.as_deref()) {
        Some(group_id) => client.get_consumer_group(group_id).await?,
        None => None,
    };

    let projected = routes
        .iter()
        .map(|route| {
            let count = effective(
                consumer.as_ref().and_then(|c| c.plugins.limit_count.as_ref()),
                group.as_ref().and_then(|g| g.plugins.limit_count.as_ref()),
                route.plugins.limit_count.as_ref(),
            );
            let req = effective(
                consumer.as_ref().and_then(|c| c.plugins.limit_req.as_ref()),
                group.as_ref().and_then(|g| g.plugins.limit_req.as_ref()),
                route.plugins.limit_req.as_ref(),
            );

            RouteWithLimits {
                url: format!("{}{}", client.gateway_url(), route.uri),
                limits: render_limits(count, req),
            }
        })
        .collect();

    Ok(projected)
}

impl Orchestrator {
    /// The key-auth routes visible to the user, with effective limits,
    /// deduplicated by URL across the fleet (first instance wins).
    ///
    /// Routes are shared across instances by design, so individual instance
    /// failures are ignored as long as at least one instance answers; only
    /// a fleet-wide failure surfaces, carrying the first instance's error.
    #[instrument(skip(self))]
    pub async fn routes_for_user(
        &self,
        compact_id: &str,
    ) -> Result<Vec<RouteWithLimits>, BackendError> {
        // A failed consumer lookup degrades that instance to the anonymous
        // view rather than failing the request.
        let consumers: Vec<Option<Consumer>> =
            fan_out(&self.apisix, None, |c| c.get_consumer(compact_id))
                .await
                .into_iter()
                .map(|outcome| outcome.result.ok().flatten())
                .collect();

        let projections = join_all(
            self.apisix
                .iter()
                .zip(consumers)
                .map(|(client, consumer)| project_instance(client, consumer)),
        )
        .await;

        if projections.iter().all(Result::is_err) {
            if let Some(Err(error)) = projections.into_iter().next() {
                return Err(error);
            }
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut routes = Vec::new();
        for projection in projections.into_iter().flatten() {
            for route in projection {
                if seen.insert(route.url.clone()) {
                    routes.push(route);
                }
            }
        }

        debug!(count = routes.len(), "projected unique routes");
        Ok(routes)
    }
}
