use keyplane_core::{Consumer, ConsumerGroup, Route};
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ApisixInstance;
use crate::error::ApisixError;

/// Admin API responses wrap the payload in `{"value": ...}`.
#[derive(Debug, Deserialize)]
struct ValueEnvelope<T> {
    value: T,
}

/// Listing responses wrap items in `{"list": [{"value": ...}, ...]}`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ListEnvelope<T> {
    #[serde(default)]
    list: Vec<ValueEnvelope<T>>,
}

/// Client for one APISIX admin API instance.
///
/// The `X-API-KEY` header value is built once at construction and reused for
/// every request.
#[derive(Debug, Clone)]
pub struct ApisixClient {
    http: Client,
    instance: ApisixInstance,
    key_path: String,
    key_name: String,
    admin_key: HeaderValue,
}

impl ApisixClient {
    /// Create a client for `instance`. `key_path` and `key_name` are the
    /// fleet-wide settings of the key-auth indirection reference.
    pub fn new(
        http: Client,
        instance: ApisixInstance,
        key_path: impl Into<String>,
        key_name: impl Into<String>,
    ) -> Result<Self, ApisixError> {
        let mut admin_key = HeaderValue::from_str(&instance.admin_api_key).map_err(|_| {
            ApisixError::Configuration(format!(
                "admin API key of instance '{}' is not a valid header value",
                instance.name
            ))
        })?;
        admin_key.set_sensitive(true);

        Ok(Self {
            http,
            instance,
            key_path: key_path.into(),
            key_name: key_name.into(),
            admin_key,
        })
    }

    /// Instance label, used to order and attribute fan-out outcomes.
    pub fn name(&self) -> &str {
        &self.instance.name
    }

    /// Public data-plane base URL of this instance.
    pub fn gateway_url(&self) -> &str {
        &self.instance.gateway_url
    }

    /// Build the canonical consumer payload for `username` on this instance.
    pub fn consumer_for(&self, username: &str, group_id: Option<String>) -> Consumer {
        let mut consumer =
            Consumer::with_key_reference(username, &self.key_path, &self.key_name, group_id);
        consumer.instance_name = self.instance.name.clone();
        consumer
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/apisix/admin/{endpoint}", self.instance.admin_url)
    }

    /// Fetch a consumer. Absence (404) is structural, not an error.
    #[instrument(skip(self), fields(instance = %self.instance.name))]
    pub async fn get_consumer(&self, username: &str) -> Result<Option<Consumer>, ApisixError> {
        let response = self
            .http
            .get(self.url(&format!("consumers/{username}")))
            .header("X-API-KEY", self.admin_key.clone())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: ValueEnvelope<Consumer> = decode(response).await?;
        let mut consumer = envelope.value;
        consumer.instance_name = self.instance.name.clone();
        Ok(Some(consumer))
    }

    /// Create or replace a consumer, returning the stored representation.
    #[instrument(skip(self, consumer), fields(instance = %self.instance.name, username = %consumer.username))]
    pub async fn upsert_consumer(&self, consumer: &Consumer) -> Result<Consumer, ApisixError> {
        debug!(group_id = ?consumer.group_id, "upserting consumer");

        let response = self
            .http
            .put(self.url("consumers"))
            .header("X-API-KEY", self.admin_key.clone())
            .json(consumer)
            .send()
            .await?;

        let envelope: ValueEnvelope<Consumer> = decode(response).await?;
        let mut stored = envelope.value;
        stored.instance_name = self.instance.name.clone();
        Ok(stored)
    }

    /// Delete a consumer, echoing back the record that was removed so the
    /// caller can replay it during rollback. Deleting an absent consumer is
    /// an error: the caller observed it, so a racing delete is reported.
    #[instrument(skip(self, consumer), fields(instance = %self.instance.name, username = %consumer.username))]
    pub async fn delete_consumer(&self, consumer: &Consumer) -> Result<Consumer, ApisixError> {
        let response = self
            .http
            .delete(self.url(&format!("consumers/{}", consumer.username)))
            .header("X-API-KEY", self.admin_key.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        Ok(consumer.clone())
    }

    /// Fetch a consumer group. Absence (404) is structural.
    #[instrument(skip(self), fields(instance = %self.instance.name))]
    pub async fn get_consumer_group(&self, id: &str) -> Result<Option<ConsumerGroup>, ApisixError> {
        let response = self
            .http
            .get(self.url(&format!("consumer_groups/{id}")))
            .header("X-API-KEY", self.admin_key.clone())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: ValueEnvelope<ConsumerGroup> = decode(response).await?;
        Ok(Some(envelope.value))
    }

    /// List routes, filtered to those enforcing key authentication. Routes
    /// without key-auth are never advertised to users.
    #[instrument(skip(self), fields(instance = %self.instance.name))]
    pub async fn list_key_auth_routes(&self) -> Result<Vec<Route>, ApisixError> {
        let response = self
            .http
            .get(self.url("routes"))
            .header("X-API-KEY", self.admin_key.clone())
            .send()
            .await?;

        let envelope: ListEnvelope<Route> = decode(response).await?;
        let routes: Vec<Route> = envelope
            .list
            .into_iter()
            .map(|item| item.value)
            .filter(Route::requires_key_auth)
            .collect();

        debug!(count = routes.len(), "listed key-auth routes");
        Ok(routes)
    }
}

/// Turn a non-success response into an [`ApisixError::Api`], draining the
/// body for the message.
async fn api_error(status: StatusCode, response: reqwest::Response) -> ApisixError {
    let body = response.text().await.unwrap_or_default();
    ApisixError::Api { status, body }
}

/// Check the status and decode the JSON payload of a response.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApisixError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal mock HTTP server built on tokio that returns one canned
    /// response and hands back the raw request it served.
    struct MockAdminServer {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockAdminServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            let base_url = format!("http://127.0.0.1:{port}");
            Self { listener, base_url }
        }

        /// Accept one connection, respond with the given status and JSON
        /// body, and return the raw request (headers and body).
        async fn respond_once(self, status_code: u16, body: &str) -> String {
            let (mut stream, _) = self.listener.accept().await.unwrap();

            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            // Read until the headers and the announced body length arrive;
            // reqwest may write them in separate chunks.
            let mut raw = Vec::new();
            let mut buf = vec![0u8; 8192];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status_code} X\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            String::from_utf8_lossy(&raw).into_owned()
        }
    }

    /// Whether `raw` holds a full request: complete headers plus any body
    /// announced via `Content-Length`.
    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text
            .lines()
            .find_map(|line| line.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(str::to_owned))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn test_client(base_url: &str) -> ApisixClient {
        let instance = ApisixInstance {
            name: "gw-1".into(),
            admin_url: base_url.to_owned(),
            gateway_url: "http://gw-1.example.com".into(),
            admin_api_key: "test-admin-key".into(),
        };
        ApisixClient::new(Client::new(), instance, "$secret://vault/dev/", "auth_key").unwrap()
    }

    #[test]
    fn rejects_unprintable_admin_key() {
        let instance = ApisixInstance {
            name: "gw-1".into(),
            admin_url: "http://localhost:1".into(),
            gateway_url: "http://localhost:1".into(),
            admin_api_key: "bad\nkey".into(),
        };
        let err = ApisixClient::new(Client::new(), instance, "p/", "auth_key").unwrap_err();
        assert!(matches!(err, ApisixError::Configuration(_)));
    }

    #[tokio::test]
    async fn get_consumer_parses_envelope_and_injects_instance() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);

        let body = r#"{"key":"/apisix/consumers/abc","value":{"username":"abc","plugins":{"key-auth":{"key":"$secret://vault/dev/abc/auth_key"}}}}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let consumer = client.get_consumer("abc").await.unwrap().unwrap();
        let request = handle.await.unwrap();

        assert_eq!(consumer.username, "abc");
        assert_eq!(consumer.instance_name, "gw-1");
        assert!(request.starts_with("GET /apisix/admin/consumers/abc"));
        assert!(request.to_ascii_lowercase().contains("x-api-key: test-admin-key"));
    }

    #[tokio::test]
    async fn get_consumer_absent_is_none() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);

        let handle = tokio::spawn(async move {
            server
                .respond_once(404, r#"{"message":"Key not found"}"#)
                .await
        });

        let consumer = client.get_consumer("nobody").await.unwrap();
        handle.await.unwrap();
        assert!(consumer.is_none());
    }

    #[tokio::test]
    async fn get_consumer_server_error_is_api_error() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);

        let handle =
            tokio::spawn(async move { server.respond_once(500, r#"{"error":"boom"}"#).await });

        let err = client.get_consumer("abc").await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(
            err,
            ApisixError::Api {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn upsert_serializes_group_id_only_when_present() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);
        let consumer = client.consumer_for("abc", Some("EUMETNET_USER".into()));

        let body = r#"{"value":{"username":"abc","plugins":{"key-auth":{"key":"$secret://vault/dev/abc/auth_key"}},"group_id":"EUMETNET_USER"}}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let stored = client.upsert_consumer(&consumer).await.unwrap();
        let request = handle.await.unwrap();

        assert_eq!(stored.group_id.as_deref(), Some("EUMETNET_USER"));
        assert!(request.starts_with("PUT /apisix/admin/consumers"));
        assert!(request.contains(r#""group_id":"EUMETNET_USER""#));

        // And the default-group payload must not mention the field at all.
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);
        let consumer = client.consumer_for("abc", None);
        let body = r#"{"value":{"username":"abc","plugins":{"key-auth":{"key":"$secret://vault/dev/abc/auth_key"}}}}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let stored = client.upsert_consumer(&consumer).await.unwrap();
        let request = handle.await.unwrap();
        assert!(stored.group_id.is_none());
        assert!(!request.contains("group_id"));
    }

    #[tokio::test]
    async fn delete_consumer_echoes_deleted_record() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);
        let consumer = client.consumer_for("abc", None);

        let handle = tokio::spawn(async move {
            server
                .respond_once(200, r#"{"deleted":"1","key":"/apisix/consumers/abc"}"#)
                .await
        });

        let deleted = client.delete_consumer(&consumer).await.unwrap();
        let request = handle.await.unwrap();
        assert_eq!(deleted, consumer);
        assert!(request.starts_with("DELETE /apisix/admin/consumers/abc"));
    }

    #[tokio::test]
    async fn delete_absent_consumer_is_an_error() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);
        let consumer = client.consumer_for("abc", None);

        let handle = tokio::spawn(async move {
            server
                .respond_once(404, r#"{"message":"Key not found"}"#)
                .await
        });

        let err = client.delete_consumer(&consumer).await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(
            err,
            ApisixError::Api {
                status: StatusCode::NOT_FOUND,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn consumer_group_absent_is_none() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);

        let handle = tokio::spawn(async move {
            server
                .respond_once(404, r#"{"message":"Key not found"}"#)
                .await
        });

        let group = client.get_consumer_group("EUMETNET_USER").await.unwrap();
        handle.await.unwrap();
        assert!(group.is_none());
    }

    #[tokio::test]
    async fn routes_filtered_to_key_auth() {
        let server = MockAdminServer::start().await;
        let client = test_client(&server.base_url);

        let body = r#"{"total":2,"list":[
            {"value":{"uri":"/protected","plugins":{"key-auth":{"header":"apikey"}}}},
            {"value":{"uri":"/open","plugins":{"proxy-rewrite":{"uri":"/"}}}}
        ]}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let routes = client.list_key_auth_routes().await.unwrap();
        handle.await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].uri, "/protected");
    }
}
