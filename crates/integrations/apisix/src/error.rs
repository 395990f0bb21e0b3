use thiserror::Error;

/// Errors from one APISIX admin-API instance.
#[derive(Debug, Error)]
pub enum ApisixError {
    /// An HTTP-level transport error (connect, timeout, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The admin API answered with a non-success status.
    #[error("APISIX admin API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The client could not be constructed from its settings.
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_renders_status_and_body() {
        let err = ApisixError::Api {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "upstream down".into(),
        };
        assert_eq!(
            err.to_string(),
            "APISIX admin API returned 503 Service Unavailable: upstream down"
        );
    }
}
