//! Tenant-scoped static API keys and the pluggable policy that admits them.
//!
//! Keys are validated once, when they are stored, and are otherwise opaque. They never expire;
//! storing a new key for a tenant overwrites the previous one.

// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenSecret},
};

/// Minimum key length accepted by [`MinLengthPolicy::default`].
pub const DEFAULT_MIN_KEY_LEN: usize = 15;

/// Reasons an API key is refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ApiKeyError {
	/// No key material was supplied.
	#[error("API key cannot be empty.")]
	Empty,
	/// The key is shorter than the policy allows.
	#[error("API key must be at least {min} characters long.")]
	TooShort {
		/// Minimum accepted length.
		min: usize,
	},
	/// Keys are opaque tokens; whitespace is almost always a copy/paste artifact.
	#[error("API key contains whitespace.")]
	ContainsWhitespace,
}

/// Format/strength check applied before a key is persisted.
pub trait ApiKeyPolicy
where
	Self: Send + Sync,
{
	/// Returns `Ok(())` when the key may be stored.
	fn validate(&self, key: &TokenSecret) -> Result<(), ApiKeyError>;
}

/// Accepts keys of at least `min_len` characters without whitespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinLengthPolicy {
	/// Minimum character count.
	pub min_len: usize,
}
impl MinLengthPolicy {
	/// Creates a policy with a custom minimum length.
	pub fn new(min_len: usize) -> Self {
		Self { min_len }
	}
}
impl Default for MinLengthPolicy {
	fn default() -> Self {
		Self::new(DEFAULT_MIN_KEY_LEN)
	}
}
impl ApiKeyPolicy for MinLengthPolicy {
	fn validate(&self, key: &TokenSecret) -> Result<(), ApiKeyError> {
		if key.expose().is_empty() {
			return Err(ApiKeyError::Empty);
		}
		if key.expose().chars().any(char::is_whitespace) {
			return Err(ApiKeyError::ContainsWhitespace);
		}
		if key.char_len() < self.min_len {
			return Err(ApiKeyError::TooShort { min: self.min_len });
		}

		Ok(())
	}
}

/// Static secret stored for a tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgApiKey {
	/// Owning tenant.
	pub tenant_id: TenantId,
	/// Key material; callers must avoid logging it.
	pub key: TokenSecret,
	/// Instant the key was (last) stored.
	#[serde(with = "time::serde::rfc3339")]
	pub stored_at: OffsetDateTime,
}
impl OrgApiKey {
	/// Wraps key material for `tenant_id`.
	pub fn new(tenant_id: TenantId, key: impl Into<String>, stored_at: OffsetDateTime) -> Self {
		Self { tenant_id, key: TokenSecret::new(key), stored_at }
	}
}
impl Debug for OrgApiKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OrgApiKey")
			.field("tenant_id", &self.tenant_id)
			.field("key", &"<redacted>")
			.field("stored_at", &self.stored_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_policy_requires_fifteen_characters() {
		let policy = MinLengthPolicy::default();

		assert_eq!(
			policy.validate(&TokenSecret::new("short-key")),
			Err(ApiKeyError::TooShort { min: DEFAULT_MIN_KEY_LEN })
		);
		assert!(policy.validate(&TokenSecret::new("exactly-15-char")).is_ok());
		assert_eq!(policy.validate(&TokenSecret::new("")), Err(ApiKeyError::Empty));
		assert_eq!(
			policy.validate(&TokenSecret::new("has whitespace inside")),
			Err(ApiKeyError::ContainsWhitespace)
		);
	}

	#[test]
	fn length_counts_characters_not_bytes() {
		let policy = MinLengthPolicy::new(4);

		assert!(policy.validate(&TokenSecret::new("ключ")).is_ok());
		assert!(policy.validate(&TokenSecret::new("clé")).is_err());
	}

	#[test]
	fn debug_redacts_key_material() {
		let key = OrgApiKey::new(
			TenantId::new("orgA").expect("Tenant fixture should be valid."),
			"sk_live_0123456789",
			OffsetDateTime::UNIX_EPOCH,
		);

		assert!(!format!("{key:?}").contains("sk_live"));
	}
}
