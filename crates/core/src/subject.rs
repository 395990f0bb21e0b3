use uuid::Uuid;

/// A caller identity as the control plane sees it.
///
/// The identity provider speaks hyphenated UUIDs, while the gateway's
/// username grammar (`^[a-zA-Z0-9_]+$`) rejects dashes. Both renderings are
/// kept so the right one reaches the right backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    uuid: Uuid,
    compact: String,
}

impl Subject {
    /// Build a subject from an already-parsed UUID.
    pub fn new(uuid: Uuid) -> Self {
        let compact = uuid.simple().to_string();
        Self { uuid, compact }
    }

    /// Parse a subject from its string form (hyphenated or compact).
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self::new)
    }

    /// The hyphenated UUID, as used by the identity provider.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The compact (dash-free) form, used as the gateway consumer username
    /// and the secret-store record id.
    pub fn compact(&self) -> &str {
        &self.compact
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uuid)
    }
}
