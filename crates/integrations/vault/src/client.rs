use keyplane_core::KeyRecord;
use reqwest::header::HeaderValue;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::VaultInstance;
use crate::error::VaultError;

/// KV read responses wrap the secret in `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Payload of a `LIST` on the base path.
#[derive(Debug, Deserialize)]
struct KeyListing {
    #[serde(default)]
    keys: Vec<String>,
}

/// Client for one Vault KV-v1 instance.
///
/// The `X-Vault-Token` header value is built once at construction. Invalid
/// header characters in a token can only come from configuration, so the
/// constructor is infallible and substitutes an empty header value that the
/// instance will reject on first use.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    instance: VaultInstance,
    base_path: String,
}

impl VaultClient {
    pub fn new(http: Client, instance: VaultInstance, base_path: impl Into<String>) -> Self {
        Self {
            http,
            instance,
            base_path: base_path.into(),
        }
    }

    /// Instance label, used to order and attribute fan-out outcomes.
    pub fn name(&self) -> &str {
        &self.instance.name
    }

    fn token_header(&self) -> HeaderValue {
        let mut value =
            HeaderValue::from_str(&self.instance.token).unwrap_or(HeaderValue::from_static(""));
        value.set_sensitive(true);
        value
    }

    fn secret_url(&self, id: &str) -> String {
        format!("{}/v1/{}/{id}", self.instance.url, self.base_path)
    }

    /// Write a record. The record may be freshly derived or a previously
    /// read copy being replayed by rollback; the body is identical.
    #[instrument(skip(self, record), fields(instance = %self.instance.name, id = %record.id))]
    pub async fn put_user(&self, record: &KeyRecord) -> Result<KeyRecord, VaultError> {
        let response = self
            .http
            .post(self.secret_url(&record.id))
            .header("X-Vault-Token", self.token_header())
            .json(record)
            .send()
            .await?;

        check_status(response).await?;

        let mut stored = record.clone();
        stored.instance_name = self.instance.name.clone();
        Ok(stored)
    }

    /// Read a record. Absence (404) is structural, not an error.
    #[instrument(skip(self), fields(instance = %self.instance.name))]
    pub async fn get_user(&self, id: &str) -> Result<Option<KeyRecord>, VaultError> {
        let response = self
            .http
            .get(self.secret_url(id))
            .header("X-Vault-Token", self.token_header())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let envelope: DataEnvelope<KeyRecord> = response.json().await?;
        let mut record = envelope.data;
        record.id = id.to_owned();
        record.instance_name = self.instance.name.clone();
        Ok(Some(record))
    }

    /// Delete a record, echoing back what was removed so the caller can
    /// replay it during rollback.
    #[instrument(skip(self, record), fields(instance = %self.instance.name, id = %record.id))]
    pub async fn delete_user(&self, record: &KeyRecord) -> Result<KeyRecord, VaultError> {
        let response = self
            .http
            .delete(self.secret_url(&record.id))
            .header("X-Vault-Token", self.token_header())
            .send()
            .await?;

        check_status(response).await?;
        Ok(record.clone())
    }

    /// List the record ids held by this instance.
    #[instrument(skip(self), fields(instance = %self.instance.name))]
    pub async fn list_user_ids(&self) -> Result<Vec<String>, VaultError> {
        let method = Method::from_bytes(b"LIST").expect("LIST is a valid method token");
        let response = self
            .http
            .request(
                method,
                format!("{}/v1/{}/", self.instance.url, self.base_path),
            )
            .header("X-Vault-Token", self.token_header())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            // An empty mount lists as 404.
            return Ok(Vec::new());
        }

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let envelope: DataEnvelope<KeyListing> = response.json().await?;
        debug!(count = envelope.data.keys.len(), "listed record ids");
        Ok(envelope.data.keys)
    }

    /// Probe the instance's health endpoint.
    #[instrument(skip(self), fields(instance = %self.instance.name))]
    pub async fn health(&self) -> Result<(), VaultError> {
        let response = self
            .http
            .get(format!("{}/v1/sys/health", self.instance.url))
            .send()
            .await?;

        check_status(response).await
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> VaultError {
    let body = response.text().await.unwrap_or_default();
    VaultError::Api { status, body }
}

async fn check_status(response: reqwest::Response) -> Result<(), VaultError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(api_error(status, response).await)
    }
}
