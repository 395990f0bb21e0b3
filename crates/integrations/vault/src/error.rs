use thiserror::Error;

/// Errors from one Vault instance.
#[derive(Debug, Error)]
pub enum VaultError {
    /// An HTTP-level transport error (connect, timeout, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Vault answered with a non-success status.
    #[error("Vault returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}
