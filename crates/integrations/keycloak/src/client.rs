use std::time::Duration;

use moka::future::Cache;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::config::KeycloakSettings;
use crate::error::KeycloakError;
use crate::models::{KcGroup, KcUser, TokenResponse};

/// Keycloak issues service-account tokens with a five-minute lifetime;
/// refresh ten seconds early to absorb clock skew.
const TOKEN_TTL: Duration = Duration::from_secs(5 * 60 - 10);

/// Admin client for the identity provider.
///
/// Holds the process-wide service-account token cache: a single value with a
/// TTL, refreshed on expiry, with concurrent refreshes coalesced into one
/// token-endpoint call.
#[derive(Clone)]
pub struct KeycloakClient {
    http: Client,
    settings: KeycloakSettings,
    token_cache: Cache<(), String>,
}

impl std::fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl KeycloakClient {
    pub fn new(http: Client, settings: KeycloakSettings) -> Self {
        let token_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(TOKEN_TTL)
            .build();
        Self {
            http,
            settings,
            token_cache,
        }
    }

    fn admin_url(&self, endpoint: &str) -> String {
        format!(
            "{}/admin/realms/{}/{endpoint}",
            self.settings.url, self.settings.realm
        )
    }

    /// Fetch the service-account token through the client-credentials grant.
    async fn fetch_token(&self) -> Result<String, KeycloakError> {
        debug!(client_id = %self.settings.client_id, "requesting service-account token");

        let token_url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.settings.url, self.settings.realm
        );
        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(token_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// The cached service-account token, refreshing if expired.
    async fn service_token(&self) -> Result<String, KeycloakError> {
        self.token_cache
            .try_get_with((), self.fetch_token())
            .await
            .map_err(|e| KeycloakError::Token(e.to_string()))
    }

    /// Fetch a user by UUID. Absence (404) is structural, not an error.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_uuid: &str) -> Result<Option<KcUser>, KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .get(self.admin_url(&format!("users/{user_uuid}")))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        Ok(Some(response.json().await?))
    }

    /// Create a user, returning the UUID Keycloak assigned. The UUID only
    /// appears in the `Location` response header.
    #[instrument(skip(self, user))]
    pub async fn create_user(&self, user: &KcUser) -> Result<String, KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .post(self.admin_url("users"))
            .bearer_auth(token)
            .json(user)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                KeycloakError::UnexpectedResponse(
                    "user creation response carried no Location header".into(),
                )
            })?;

        location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .map(str::to_owned)
            .ok_or_else(|| {
                KeycloakError::UnexpectedResponse(format!("unparseable Location '{location}'"))
            })
    }

    /// Replace a user's representation.
    #[instrument(skip(self, user))]
    pub async fn update_user(&self, user_uuid: &str, user: &KcUser) -> Result<(), KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .put(self.admin_url(&format!("users/{user_uuid}")))
            .bearer_auth(token)
            .json(user)
            .send()
            .await?;

        check_status(response).await
    }

    /// Delete a user.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_uuid: &str) -> Result<(), KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .delete(self.admin_url(&format!("users/{user_uuid}")))
            .bearer_auth(token)
            .send()
            .await?;

        check_status(response).await
    }

    /// List the realm's groups.
    #[instrument(skip(self))]
    pub async fn list_groups(&self) -> Result<Vec<KcGroup>, KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .get(self.admin_url("groups"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        Ok(response.json().await?)
    }

    /// Add a user to a group (idempotent on the Keycloak side).
    #[instrument(skip(self))]
    pub async fn add_user_to_group(
        &self,
        user_uuid: &str,
        group_id: &str,
    ) -> Result<(), KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .put(self.admin_url(&format!("users/{user_uuid}/groups/{group_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        check_status(response).await
    }

    /// Remove a user from a group.
    #[instrument(skip(self))]
    pub async fn remove_user_from_group(
        &self,
        user_uuid: &str,
        group_id: &str,
    ) -> Result<(), KeycloakError> {
        let token = self.service_token().await?;
        let response = self
            .http
            .delete(self.admin_url(&format!("users/{user_uuid}/groups/{group_id}")))
            .bearer_auth(token)
            .send()
            .await?;

        check_status(response).await
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> KeycloakError {
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        warn!(%status, "Keycloak server error");
    }
    KeycloakError::Api { status, body }
}

async fn check_status(response: reqwest::Response) -> Result<(), KeycloakError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(api_error(status, response).await)
    }
}
