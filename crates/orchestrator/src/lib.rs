//! Multi-backend transactional orchestration.
//!
//! This crate owns the only writers in the system: the key lifecycle
//! orchestrator (create/delete a user's key material across every secret
//! store and gateway instance) and the admin orchestrator (sequencing
//! identity-provider changes around key-lifecycle changes). Writes fan out
//! concurrently, every per-instance outcome is captured, and a partial
//! failure triggers best-effort compensation built from the undo actions
//! recorded during forward execution.
//!
//! There is no cross-request coordination: two concurrent operations on the
//! same user are racy by contract, and convergence is restored by the next
//! successful call.

mod admin;
mod error;
mod fanout;
mod health;
mod keys;
mod orchestrator;
mod routes;
mod undo;

pub use admin::{AdminError, GroupChange};
pub use error::BackendError;
pub use fanout::{BackendInstance, InstanceOutcome, collect, fan_out, fan_out_replay};
pub use keys::UserSnapshot;
pub use orchestrator::Orchestrator;
pub use routes::RouteWithLimits;
pub use undo::Undo;
