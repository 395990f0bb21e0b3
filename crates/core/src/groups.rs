//! Group names shared between the identity provider and the gateway.

/// Default group every portal user belongs to.
pub const USER_GROUP: &str = "USER";

/// Privileged group with a gateway-side consumer-group counterpart of the
/// same name carrying relaxed rate limits.
pub const EUMETNET_USER_GROUP: &str = "EUMETNET_USER";

/// Operator group; exists only in the identity provider.
pub const ADMIN_GROUP: &str = "ADMIN";

/// Every group the access token may carry.
pub const KNOWN_GROUPS: [&str; 3] = [USER_GROUP, EUMETNET_USER_GROUP, ADMIN_GROUP];

/// The gateway `group_id` a consumer should carry for the given identity
/// provider group memberships.
///
/// Only `EUMETNET_USER` projects onto the gateway; every other membership is
/// identity-provider-only and the field stays absent.
pub fn desired_group_id<S: AsRef<str>>(groups: &[S]) -> Option<String> {
    groups
        .iter()
        .any(|g| g.as_ref() == EUMETNET_USER_GROUP)
        .then(|| EUMETNET_USER_GROUP.to_owned())
}
