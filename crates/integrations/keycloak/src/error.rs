use thiserror::Error;

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum KeycloakError {
    /// An HTTP-level transport error (connect, timeout, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keycloak answered with a non-success status.
    #[error("Keycloak returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The service-account token could not be obtained or refreshed.
    #[error("service token error: {0}")]
    Token(String),

    /// A response was missing data the contract requires (e.g. the
    /// `Location` header of a created user).
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
