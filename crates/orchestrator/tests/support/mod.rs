//! Stateful fake backends for orchestrator tests.
//!
//! Each fake is a small axum app over shared in-memory state with
//! injectable failures, speaking just enough of the real wire format for
//! the clients to be exercised end to end.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post, put};
use serde_json::{Value, json};

use keyplane_apisix::{ApisixClient, ApisixInstance};
use keyplane_keycloak::{KeycloakClient, KeycloakSettings};
use keyplane_orchestrator::Orchestrator;
use keyplane_vault::{VaultClient, VaultInstance};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const KEY_PATH: &str = "$secret://vault/dev/";
pub const SECRET_PHRASE: &str = "s";
pub const GATEWAY_URL: &str = "http://gw.test";

// -- Fake APISIX ----------------------------------------------------------

#[derive(Default)]
pub struct ApisixState {
    pub consumers: Mutex<HashMap<String, Value>>,
    pub consumer_groups: Mutex<HashMap<String, Value>>,
    pub routes: Mutex<Vec<Value>>,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_routes: AtomicBool,
}

pub struct FakeApisix {
    pub state: Arc<ApisixState>,
    pub admin_url: String,
}

fn unauthorized_without_admin_key(headers: &HeaderMap) -> Option<Response> {
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    (provided != Some(ADMIN_KEY)).then(|| {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"message": "missing or wrong admin key"})),
        )
            .into_response()
    })
}

fn injected_failure() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        axum::Json(json!({"error": "injected failure"})),
    )
        .into_response()
}

async fn apisix_get_consumer(
    State(state): State<Arc<ApisixState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Response {
    if let Some(denied) = unauthorized_without_admin_key(&headers) {
        return denied;
    }
    if state.fail_get.load(Ordering::Relaxed) {
        return injected_failure();
    }
    match state.consumers.lock().unwrap().get(&username) {
        Some(value) => (
            StatusCode::OK,
            axum::Json(json!({
                "key": format!("/apisix/consumers/{username}"),
                "value": value,
            })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"message": "Key not found"})),
        )
            .into_response(),
    }
}

async fn apisix_put_consumer(
    State(state): State<Arc<ApisixState>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    if let Some(denied) = unauthorized_without_admin_key(&headers) {
        return denied;
    }
    if state.fail_put.load(Ordering::Relaxed) {
        return injected_failure();
    }
    let Some(username) = body.get("username").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"message": "missing username"})),
        )
            .into_response();
    };
    state
        .consumers
        .lock()
        .unwrap()
        .insert(username.to_owned(), body.clone());
    (
        StatusCode::OK,
        axum::Json(json!({
            "key": format!("/apisix/consumers/{username}"),
            "value": body,
        })),
    )
        .into_response()
}

async fn apisix_delete_consumer(
    State(state): State<Arc<ApisixState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Response {
    if let Some(denied) = unauthorized_without_admin_key(&headers) {
        return denied;
    }
    if state.fail_delete.load(Ordering::Relaxed) {
        return injected_failure();
    }
    match state.consumers.lock().unwrap().remove(&username) {
        Some(_) => (StatusCode::OK, axum::Json(json!({"deleted": "1"}))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"message": "Key not found"})),
        )
            .into_response(),
    }
}

async fn apisix_get_consumer_group(
    State(state): State<Arc<ApisixState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(denied) = unauthorized_without_admin_key(&headers) {
        return denied;
    }
    match state.consumer_groups.lock().unwrap().get(&id) {
        Some(value) => (StatusCode::OK, axum::Json(json!({"value": value}))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"message": "Key not found"})),
        )
            .into_response(),
    }
}

async fn apisix_get_routes(
    State(state): State<Arc<ApisixState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(denied) = unauthorized_without_admin_key(&headers) {
        return denied;
    }
    if state.fail_routes.load(Ordering::Relaxed) {
        return injected_failure();
    }
    let routes = state.routes.lock().unwrap();
    let list: Vec<Value> = routes.iter().map(|r| json!({"value": r})).collect();
    (
        StatusCode::OK,
        axum::Json(json!({"total": list.len(), "list": list})),
    )
        .into_response()
}

impl FakeApisix {
    pub async fn spawn() -> Self {
        let state = Arc::new(ApisixState::default());
        let app = Router::new()
            .route(
                "/apisix/admin/consumers",
                put(apisix_put_consumer),
            )
            .route(
                "/apisix/admin/consumers/{username}",
                get(apisix_get_consumer).delete(apisix_delete_consumer),
            )
            .route(
                "/apisix/admin/consumer_groups/{id}",
                get(apisix_get_consumer_group),
            )
            .route("/apisix/admin/routes", get(apisix_get_routes))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            admin_url: format!("http://{addr}"),
        }
    }

    pub fn seed_consumer(&self, username: &str, group_id: Option<&str>) {
        let mut consumer = json!({
            "username": username,
            "plugins": {"key-auth": {"key": format!("{KEY_PATH}{username}/auth_key")}},
        });
        if let Some(gid) = group_id {
            consumer["group_id"] = json!(gid);
        }
        self.state
            .consumers
            .lock()
            .unwrap()
            .insert(username.to_owned(), consumer);
    }

    pub fn seed_route(&self, uri: &str, plugins: Value) {
        self.state
            .routes
            .lock()
            .unwrap()
            .push(json!({"uri": uri, "plugins": plugins}));
    }

    pub fn seed_group(&self, id: &str, plugins: Value) {
        self.state
            .consumer_groups
            .lock()
            .unwrap()
            .insert(id.to_owned(), json!({"id": id, "plugins": plugins}));
    }

    pub fn consumer(&self, username: &str) -> Option<Value> {
        self.state.consumers.lock().unwrap().get(username).cloned()
    }
}

// -- Fake Vault -----------------------------------------------------------

#[derive(Default)]
pub struct VaultState {
    pub secrets: Mutex<HashMap<String, Value>>,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_health: AtomicBool,
}

pub struct FakeVault {
    pub state: Arc<VaultState>,
    pub url: String,
}

async fn vault_get(State(state): State<Arc<VaultState>>, Path(id): Path<String>) -> Response {
    if state.fail_get.load(Ordering::Relaxed) {
        return injected_failure();
    }
    match state.secrets.lock().unwrap().get(&id) {
        Some(value) => (StatusCode::OK, axum::Json(json!({"data": value}))).into_response(),
        None => (StatusCode::NOT_FOUND, axum::Json(json!({"errors": []}))).into_response(),
    }
}

async fn vault_put(
    State(state): State<Arc<VaultState>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    if state.fail_put.load(Ordering::Relaxed) {
        return injected_failure();
    }
    state.secrets.lock().unwrap().insert(id, body);
    StatusCode::NO_CONTENT.into_response()
}

async fn vault_delete(State(state): State<Arc<VaultState>>, Path(id): Path<String>) -> Response {
    if state.fail_delete.load(Ordering::Relaxed) {
        return injected_failure();
    }
    state.secrets.lock().unwrap().remove(&id);
    StatusCode::NO_CONTENT.into_response()
}

async fn vault_list(State(state): State<Arc<VaultState>>, method: Method) -> Response {
    if method.as_str() != "LIST" {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let keys: Vec<String> = state.secrets.lock().unwrap().keys().cloned().collect();
    (StatusCode::OK, axum::Json(json!({"data": {"keys": keys}}))).into_response()
}

async fn vault_health(State(state): State<Arc<VaultState>>) -> Response {
    if state.fail_health.load(Ordering::Relaxed) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({"sealed": true})),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        axum::Json(json!({"initialized": true, "sealed": false})),
    )
        .into_response()
}

impl FakeVault {
    pub async fn spawn() -> Self {
        let state = Arc::new(VaultState::default());
        let app = Router::new()
            .route(
                "/v1/apikeys/{id}",
                get(vault_get).post(vault_put).delete(vault_delete),
            )
            .route("/v1/apikeys/", any(vault_list))
            .route("/v1/sys/health", get(vault_health))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            url: format!("http://{addr}"),
        }
    }

    pub fn seed_record(&self, id: &str, auth_key: &str, date: &str) {
        self.state
            .secrets
            .lock()
            .unwrap()
            .insert(id.to_owned(), json!({"auth_key": auth_key, "date": date}));
    }

    pub fn record(&self, id: &str) -> Option<Value> {
        self.state.secrets.lock().unwrap().get(id).cloned()
    }
}

// -- Fake Keycloak --------------------------------------------------------

#[derive(Default)]
pub struct KeycloakState {
    pub users: Mutex<HashMap<String, Value>>,
    /// Group name by id, seeded by tests.
    pub groups: Mutex<Vec<Value>>,
    /// user uuid -> group ids the user is a member of.
    pub memberships: Mutex<HashMap<String, HashSet<String>>>,
    pub fail_delete_user: AtomicBool,
    pub fail_update_user: AtomicBool,
    pub fail_membership: AtomicBool,
}

pub struct FakeKeycloak {
    pub state: Arc<KeycloakState>,
    pub url: String,
}

async fn kc_token() -> Response {
    (
        StatusCode::OK,
        axum::Json(json!({
            "access_token": "service-token",
            "expires_in": 300,
            "token_type": "Bearer",
        })),
    )
        .into_response()
}

async fn kc_get_or_update_user(
    State(state): State<Arc<KeycloakState>>,
    Path(uuid): Path<String>,
    method: Method,
    body: Option<axum::Json<Value>>,
) -> Response {
    if method == Method::GET {
        match state.users.lock().unwrap().get(&uuid) {
            Some(user) => (StatusCode::OK, axum::Json(user.clone())).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                axum::Json(json!({"error": "User not found"})),
            )
                .into_response(),
        }
    } else if method == Method::PUT {
        if state.fail_update_user.load(Ordering::Relaxed) {
            return injected_failure();
        }
        let Some(axum::Json(user)) = body else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        let mut users = state.users.lock().unwrap();
        if !users.contains_key(&uuid) {
            return (
                StatusCode::NOT_FOUND,
                axum::Json(json!({"error": "User not found"})),
            )
                .into_response();
        }
        users.insert(uuid, user);
        StatusCode::NO_CONTENT.into_response()
    } else if method == Method::DELETE {
        if state.fail_delete_user.load(Ordering::Relaxed) {
            return injected_failure();
        }
        match state.users.lock().unwrap().remove(&uuid) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => (
                StatusCode::NOT_FOUND,
                axum::Json(json!({"error": "User not found"})),
            )
                .into_response(),
        }
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

async fn kc_list_groups(State(state): State<Arc<KeycloakState>>) -> Response {
    let groups = state.groups.lock().unwrap().clone();
    (StatusCode::OK, axum::Json(Value::Array(groups))).into_response()
}

async fn kc_membership(
    State(state): State<Arc<KeycloakState>>,
    Path((uuid, group_id)): Path<(String, String)>,
    method: Method,
) -> Response {
    if state.fail_membership.load(Ordering::Relaxed) {
        return injected_failure();
    }
    let mut memberships = state.memberships.lock().unwrap();
    let entry = memberships.entry(uuid).or_default();
    if method == Method::PUT {
        entry.insert(group_id);
        StatusCode::NO_CONTENT.into_response()
    } else if method == Method::DELETE {
        entry.remove(&group_id);
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

impl FakeKeycloak {
    pub async fn spawn() -> Self {
        let state = Arc::new(KeycloakState::default());
        let app = Router::new()
            .route("/realms/test/protocol/openid-connect/token", post(kc_token))
            .route("/admin/realms/test/users/{uuid}", any(kc_get_or_update_user))
            .route("/admin/realms/test/groups", get(kc_list_groups))
            .route(
                "/admin/realms/test/users/{uuid}/groups/{group_id}",
                any(kc_membership),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            url: format!("http://{addr}"),
        }
    }

    pub fn seed_user(&self, uuid: &str, enabled: bool) {
        self.state.users.lock().unwrap().insert(
            uuid.to_owned(),
            json!({"id": uuid, "username": "jane", "enabled": enabled}),
        );
    }

    pub fn seed_group(&self, id: &str, name: &str) {
        self.state
            .groups
            .lock()
            .unwrap()
            .push(json!({"id": id, "name": name, "path": format!("/{name}")}));
    }

    pub fn user(&self, uuid: &str) -> Option<Value> {
        self.state.users.lock().unwrap().get(uuid).cloned()
    }

    pub fn member_of(&self, uuid: &str, group_id: &str) -> bool {
        self.state
            .memberships
            .lock()
            .unwrap()
            .get(uuid)
            .is_some_and(|groups| groups.contains(group_id))
    }
}

// -- Test bed -------------------------------------------------------------

pub struct TestBed {
    pub orchestrator: Orchestrator,
    pub apisix: Vec<FakeApisix>,
    pub vault: Vec<FakeVault>,
    pub keycloak: FakeKeycloak,
}

/// Spin up `gateways` fake APISIX instances, `stores` fake Vault instances
/// and one fake Keycloak, and wire an orchestrator to all of them.
pub async fn testbed(gateways: usize, stores: usize) -> TestBed {
    let http = reqwest::Client::new();

    let mut apisix = Vec::new();
    let mut apisix_clients = Vec::new();
    for i in 1..=gateways {
        let fake = FakeApisix::spawn().await;
        let instance = ApisixInstance {
            name: format!("gw-{i}"),
            admin_url: fake.admin_url.clone(),
            gateway_url: GATEWAY_URL.to_owned(),
            admin_api_key: ADMIN_KEY.to_owned(),
        };
        apisix_clients
            .push(ApisixClient::new(http.clone(), instance, KEY_PATH, "auth_key").unwrap());
        apisix.push(fake);
    }

    let mut vault = Vec::new();
    let mut vault_clients = Vec::new();
    for i in 1..=stores {
        let fake = FakeVault::spawn().await;
        let instance = VaultInstance {
            name: format!("vault-{i}"),
            url: fake.url.clone(),
            token: "vault-token".to_owned(),
        };
        vault_clients.push(VaultClient::new(http.clone(), instance, "apikeys"));
        vault.push(fake);
    }

    let keycloak = FakeKeycloak::spawn().await;
    let keycloak_client = KeycloakClient::new(
        http,
        KeycloakSettings {
            url: keycloak.url.clone(),
            realm: "test".to_owned(),
            client_id: "keyplane".to_owned(),
            client_secret: "secret".to_owned(),
        },
    );

    TestBed {
        orchestrator: Orchestrator::new(
            apisix_clients,
            vault_clients,
            keycloak_client,
            SECRET_PHRASE,
        ),
        apisix,
        vault,
        keycloak,
    }
}
