//! Composite (tenant, user) key addressing one credential.

// self
use crate::{
	_prelude::*,
	auth::{TenantId, UserId},
};

/// Immutable key for a stored credential.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
	/// Tenant that owns the credential.
	pub tenant: TenantId,
	/// User the credential was issued for.
	pub user: UserId,
}
impl CredentialKey {
	/// Creates a key for the provided tenant and user.
	pub fn new(tenant: TenantId, user: UserId) -> Self {
		Self { tenant, user }
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.tenant, self.user)
	}
}
