//! YAML configuration, loaded at startup from `CONFIG_FILE` with an
//! optional `SECRETS_FILE` merged on top so credentials can live in a
//! separately mounted file.

use std::path::Path;

use keyplane_apisix::ApisixInstance;
use keyplane_core::AUTH_KEY_FIELD;
use keyplane_keycloak::KeycloakSettings;
use keyplane_vault::VaultInstance;
use serde::Deserialize;
use serde_yaml_ng::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration of the service.
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub apisix: ApisixSettings,
    pub vault: VaultSettings,
    pub keycloak: KeycloakSettings,
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default log filter; the `RUST_LOG` environment variable wins.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// CORS origins the portal front end may call from. A `"*"` entry
    /// allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8082
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_owned()]
}

/// Gateway fleet configuration.
#[derive(Debug, Deserialize)]
pub struct ApisixSettings {
    /// Prefix of the key-auth indirection reference
    /// (e.g. `$secret://vault/dev/`).
    pub key_path: String,
    /// Field name of the key inside the secret-store record. Must agree
    /// with [`AUTH_KEY_FIELD`]; validated at startup.
    #[serde(default = "default_key_name")]
    pub key_name: String,
    pub instances: Vec<ApisixInstance>,
}

fn default_key_name() -> String {
    AUTH_KEY_FIELD.to_owned()
}

/// Secret-store cluster configuration.
#[derive(Deserialize)]
pub struct VaultSettings {
    /// KV mount path holding one record per user.
    pub base_path: String,
    /// Phrase mixed into the deterministic key derivation.
    pub secret_phrase: String,
    pub instances: Vec<VaultInstance>,
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("base_path", &self.base_path)
            .field("secret_phrase", &"[REDACTED]")
            .field("instances", &self.instances)
            .finish()
    }
}

impl Settings {
    /// Load settings from the paths in `CONFIG_FILE` / `SECRETS_FILE`.
    pub fn load() -> Result<Self, ConfigError> {
        let config = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_owned());
        let secrets = std::env::var("SECRETS_FILE").ok();
        Self::load_from(Path::new(&config), secrets.as_deref().map(Path::new))
    }

    /// Load settings from an explicit config file, merging an optional
    /// secrets file on top (its scalar values win).
    pub fn load_from(config: &Path, secrets: Option<&Path>) -> Result<Self, ConfigError> {
        let mut value: Value = serde_yaml_ng::from_str(&std::fs::read_to_string(config)?)?;

        if let Some(secrets) = secrets {
            let overlay: Value = serde_yaml_ng::from_str(&std::fs::read_to_string(secrets)?)?;
            merge(&mut value, overlay);
        }

        let settings: Self = serde_yaml_ng::from_value(value)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Startup validation: every backend needs at least one instance, and
    /// the configured key name must agree with the constant that also names
    /// the secret-store record field and the indirection suffix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apisix.instances.is_empty() {
            return Err(ConfigError::Invalid(
                "apisix.instances must list at least one gateway instance".into(),
            ));
        }
        if self.vault.instances.is_empty() {
            return Err(ConfigError::Invalid(
                "vault.instances must list at least one secret-store instance".into(),
            ));
        }
        if self.apisix.key_name != AUTH_KEY_FIELD {
            return Err(ConfigError::Invalid(format!(
                "apisix.key_name is '{}' but the secret-store record field is '{AUTH_KEY_FIELD}'; \
                 the gateway would resolve keys against a field that is never written",
                self.apisix.key_name
            )));
        }
        Ok(())
    }
}

/// Recursively merge `overlay` into `base`: mappings merge key-wise,
/// everything else is replaced.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge(base_value, overlay_value);
                    continue;
                }
                base_map.insert(key, overlay_value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
