//! Typed client for one APISIX admin API instance.
//!
//! The control plane runs a fleet of independent gateway instances; each
//! [`ApisixClient`] talks to exactly one of them. Fan-out across the fleet
//! lives in the orchestrator, not here.

mod client;
mod config;
mod error;

pub use client::ApisixClient;
pub use config::ApisixInstance;
pub use error::ApisixError;
