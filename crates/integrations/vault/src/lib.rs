//! Typed client for one Vault KV-v1 instance.
//!
//! The secret store is replicated across independent instances; each
//! [`VaultClient`] owns exactly one. The orchestrator is responsible for
//! keeping the cluster's copies of a record identical.

mod client;
mod config;
mod error;

pub use client::VaultClient;
pub use config::VaultInstance;
pub use error::VaultError;
