use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use keyplane_core::AccessToken;
use keyplane_keycloak::KeycloakSettings;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{AuthError, TokenValidator};

/// One key of the realm's JWKS document; only RSA signing keys are kept.
#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// Validates RS256 bearer tokens against the realm's JWKS endpoint.
///
/// Decoding keys are cached by `kid`; an unknown `kid` triggers one refetch,
/// which also picks up rotated keys.
pub struct JwksValidator {
    http: reqwest::Client,
    jwks_url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl JwksValidator {
    pub fn new(http: reqwest::Client, keycloak: &KeycloakSettings) -> Self {
        let jwks_url = format!(
            "{}/realms/{}/protocol/openid-connect/certs",
            keycloak.url, keycloak.realm
        );
        Self {
            http,
            jwks_url,
            keys: RwLock::new(HashMap::new()),
        }
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        debug!(kid, "signing key not cached, fetching JWKS");
        let document: JwksDocument = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "JWKS fetch failed");
                AuthError::TokenValidationFailed
            })?
            .json()
            .await
            .map_err(|error| {
                warn!(%error, "JWKS parse failed");
                AuthError::TokenValidationFailed
            })?;

        let mut keys = self.keys.write().await;
        for jwk in document.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(error) => warn!(kid = %jwk.kid, %error, "unusable JWKS key"),
            }
        }

        keys.get(kid).cloned().ok_or(AuthError::TokenValidationFailed)
    }
}

#[async_trait]
impl TokenValidator for JwksValidator {
    async fn validate(&self, token: &str) -> Result<AccessToken, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::TokenValidationFailed)?;
        let kid = header.kid.ok_or(AuthError::TokenValidationFailed)?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["account"]);

        match decode::<AccessToken>(token, &key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(error) => match error.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::TokenExpired),
                _ => {
                    debug!(%error, "token validation failed");
                    Err(AuthError::TokenValidationFailed)
                }
            },
        }
    }
}
