//! OAuth scope naming an identity provider.

use std::fmt;

/// Prefix shared by every identity provider scope.
const SCOPE_PREFIX: &str = "rsts:sts:primaryproviderid:";

/// Provider id used for certificate authentication.
pub const CERTIFICATE_PROVIDER_ID: &str = "certificate";

/// Provider id of the appliance's built-in user database.
pub const LOCAL_PROVIDER_ID: &str = "local";

/// The `scope` parameter sent to the token endpoint.
///
/// # Example
///
/// ```
/// use safeguard_core::ProviderScope;
///
/// assert_eq!(
///     ProviderScope::certificate().as_str(),
///     "rsts:sts:primaryproviderid:certificate"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderScope(String);

impl ProviderScope {
    /// Scope for a provider id as returned by the appliance.
    pub fn for_provider_id(id: &str) -> Self {
        Self(format!("{}{}", SCOPE_PREFIX, id))
    }

    /// Default scope for certificate authentication.
    pub fn certificate() -> Self {
        Self::for_provider_id(CERTIFICATE_PROVIDER_ID)
    }

    /// Default scope for username and password authentication.
    pub fn local() -> Self {
        Self::for_provider_id(LOCAL_PROVIDER_ID)
    }

    /// Returns the scope string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
