use serde::Deserialize;

use crate::groups::{ADMIN_GROUP, KNOWN_GROUPS};

/// The claims this service reads from a verified bearer token.
///
/// Token signature and lifetime checks happen in the validator; by the time
/// an `AccessToken` exists, only group membership remains to be enforced.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    /// Subject: the user's UUID at the identity provider.
    pub sub: String,
    pub preferred_username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl AccessToken {
    /// Whether the token carries at least one group this service knows.
    /// Tokens without any are rejected with a 403 by the surface layer.
    pub fn has_known_group(&self) -> bool {
        self.groups
            .iter()
            .any(|g| KNOWN_GROUPS.contains(&g.as_str()))
    }

    pub fn is_admin(&self) -> bool {
        self.groups.iter().any(|g| g == ADMIN_GROUP)
    }
}
