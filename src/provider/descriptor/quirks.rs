// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, ScopeValidationError},
};

/// Scope requested from providers that model offline access as a scope.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// How a provider is asked to issue a refresh token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineAccess {
	/// Appends `access_type=offline` to the authorization URL.
	#[default]
	AccessTypeParam,
	/// Adds the `offline_access` scope to the request.
	Scope,
	/// The provider issues refresh tokens without being asked.
	Implicit,
}

/// Provider-specific quirks that influence how authorization URLs and token calls look.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Indicates whether PKCE must be supplied even for confidential clients.
	pub pkce_required: bool,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
	/// Marker used to request a refresh token.
	pub offline_access: OfflineAccess,
	/// Sends `prompt=consent` so the provider re-issues a refresh token on every authorization.
	pub force_consent: bool,
}
impl ProviderQuirks {
	/// Extra query parameters appended to the authorization URL.
	pub fn authorize_params(&self) -> Vec<(&'static str, &'static str)> {
		let mut params = Vec::new();

		if matches!(self.offline_access, OfflineAccess::AccessTypeParam) {
			params.push(("access_type", "offline"));
		}
		if self.force_consent {
			params.push(("prompt", "consent"));
		}

		params
	}

	/// Scopes to request for `configured`, including the offline-access scope when needed.
	pub fn requested_scope(&self, configured: &ScopeSet) -> Result<ScopeSet, ScopeValidationError> {
		match self.offline_access {
			OfflineAccess::Scope => configured.with(OFFLINE_ACCESS_SCOPE),
			_ => Ok(configured.clone()),
		}
	}
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self {
			pkce_required: false,
			scope_delimiter: ' ',
			offline_access: OfflineAccess::default(),
			force_consent: false,
		}
	}
}
