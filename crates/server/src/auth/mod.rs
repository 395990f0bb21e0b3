//! Bearer-token validation and the extractors enforcing it.
//!
//! Token validation is behind [`TokenValidator`] so the HTTP surface can be
//! tested without a live identity provider; the production implementation
//! verifies RS256 signatures against the realm's published JWKS.

mod extract;
mod jwks;

pub use extract::{AdminToken, CallerToken};
pub use jwks::JwksValidator;

use async_trait::async_trait;
use axum::http::StatusCode;
use keyplane_core::AccessToken;
use thiserror::Error;

/// Authentication failures, each carrying its caller-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// An Authorization header was presented without a usable token.
    #[error("Token has not been provided")]
    TokenNotProvided,

    #[error("Token signature has expired")]
    TokenExpired,

    #[error("Token validation failed")]
    TokenValidationFailed,

    /// The token verified but its groups don't grant access.
    #[error("User does not belong to valid group(s)")]
    InvalidGroups,
}

impl AuthError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidGroups => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Validates a raw bearer token into verified [`AccessToken`] claims.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<AccessToken, AuthError>;
}
