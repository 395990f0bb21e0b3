//! Keycloak admin client.
//!
//! Unlike the gateway fleet and the secret-store cluster, the identity
//! provider is a single logical backend. All admin calls authenticate with a
//! service-account token obtained through the client-credentials grant and
//! cached for slightly less than its lifetime.

mod client;
mod config;
mod error;
mod models;

pub use client::KeycloakClient;
pub use config::KeycloakSettings;
pub use error::KeycloakError;
pub use models::{KcGroup, KcUser};
