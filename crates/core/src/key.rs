use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Field name binding three boundaries: the secret-store record field, the
/// suffix of the gateway key-auth indirection reference, and the
/// `apisix.key_name` configuration default. Server startup asserts the
/// configured value agrees with this constant.
pub const AUTH_KEY_FIELD: &str = "auth_key";

/// Format of [`KeyRecord::date`].
pub const RECORD_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One user's API-key material as held by a single secret-store instance.
///
/// Every instance of the cluster must hold identical `auth_key` and `date`
/// for a given `id`; `instance_name` is a local label injected when a record
/// is read back and is never written to the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Record id: the owner's compact UUID.
    #[serde(skip)]
    pub id: String,
    /// Lowercase-hex SHA-256 API key.
    pub auth_key: String,
    /// Creation timestamp in [`RECORD_DATE_FORMAT`].
    pub date: String,
    /// Name of the secret-store instance the record was read from.
    #[serde(skip)]
    pub instance_name: String,
}

impl KeyRecord {
    /// Derive a fresh record for `compact_id` dated `now`.
    pub fn derive(compact_id: &str, secret_phrase: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: compact_id.to_owned(),
            auth_key: derive_auth_key(now.date_naive(), compact_id, secret_phrase),
            date: record_date(now),
            instance_name: String::new(),
        }
    }

    /// The canonical (instance-free) rendering of this record, used when one
    /// instance's copy is promoted to the cluster-wide truth.
    pub fn canonical(&self) -> Self {
        Self {
            instance_name: String::new(),
            ..self.clone()
        }
    }
}

/// Deterministic API key: `sha256(YYYYMMDD ++ compact_id ++ secret_phrase)`,
/// lowercase hex.
pub fn derive_auth_key(date: NaiveDate, compact_id: &str, secret_phrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.format("%Y%m%d").to_string().as_bytes());
    hasher.update(compact_id.as_bytes());
    hasher.update(secret_phrase.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a record timestamp in the stored format.
pub fn record_date(now: DateTime<Utc>) -> String {
    now.format(RECORD_DATE_FORMAT).to_string()
}
