//! Stored credential records, their lifecycle status, and the shared expiry predicate.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, ScopeSet, TenantId, TokenSecret, UserId},
};

/// Lifecycle status persisted alongside a credential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
	/// Tokens were issued and have not been invalidated by the provider.
	#[default]
	Authorized,
	/// The provider rejected the refresh token; kept for audit until explicitly removed.
	Revoked,
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// The expiry is not after the write instant.
	#[error("Expiry must be later than the instant the credential is written.")]
	ExpiryNotInFuture,
}

/// Tokens held for one (tenant, user) pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Owning tenant.
	pub tenant_id: TenantId,
	/// User the tokens were issued for.
	pub user_id: UserId,
	/// Scopes granted by the provider.
	#[serde(default)]
	pub scope: ScopeSet,
	/// Short-lived access token.
	pub access_token: TokenSecret,
	/// Long-lived refresh token, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the record was last written.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Instant after which `access_token` must not be used.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Lifecycle status.
	pub status: CredentialStatus,
	/// Instant the provider invalidated the credential.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub revoked_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Returns a builder for the provided tenant/user pair.
	pub fn builder(tenant_id: TenantId, user_id: UserId) -> CredentialBuilder {
		CredentialBuilder::new(tenant_id, user_id)
	}

	/// Key addressing this credential in a store.
	pub fn key(&self) -> CredentialKey {
		CredentialKey::new(self.tenant_id.clone(), self.user_id.clone())
	}

	/// See [`is_expired`].
	pub fn is_expired_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		is_expired(self, now, buffer)
	}

	/// Returns `true` once the provider has invalidated the credential.
	pub fn is_revoked(&self) -> bool {
		matches!(self.status, CredentialStatus::Revoked)
	}

	/// Marks the record as revoked by the provider.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.status = CredentialStatus::Revoked;
		self.revoked_at = Some(instant);
	}

	/// Builds the record that replaces `self` after a successful refresh.
	///
	/// The key, scope, and status carry over; the refresh token only changes when the provider
	/// rotated it.
	pub fn refreshed(
		&self,
		access_token: TokenSecret,
		rotated_refresh: Option<TokenSecret>,
		expires_at: OffsetDateTime,
		issued_at: OffsetDateTime,
	) -> Result<Self, CredentialBuilderError> {
		let mut builder = Self::builder(self.tenant_id.clone(), self.user_id.clone())
			.scope(self.scope.clone())
			.access_token(access_token.expose())
			.issued_at(issued_at)
			.expires_at(expires_at);

		if let Some(refresh) = rotated_refresh.or_else(|| self.refresh_token.clone()) {
			builder = builder.refresh_token(refresh.expose());
		}

		let mut next = builder.build()?;

		next.status = self.status;
		next.revoked_at = self.revoked_at;

		Ok(next)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("tenant_id", &self.tenant_id)
			.field("user_id", &self.user_id)
			.field("scope", &self.scope)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("status", &self.status)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// The only expiry check used by the crate: a credential counts as expired once `now` is within
/// `buffer` of `expires_at`.
pub fn is_expired(credential: &Credential, now: OffsetDateTime, buffer: Duration) -> bool {
	now >= credential.expires_at - buffer
}

/// Builder for [`Credential`].
#[derive(Clone, Debug)]
pub struct CredentialBuilder {
	tenant_id: TenantId,
	user_id: UserId,
	scope: ScopeSet,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	fn new(tenant_id: TenantId, user_id: UserId) -> Self {
		Self {
			tenant_id,
			user_id,
			scope: ScopeSet::default(),
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the write instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the write instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`Credential`] with status `Authorized`.
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(CredentialBuilderError::MissingExpiry),
		};

		if expires_at <= issued_at {
			return Err(CredentialBuilderError::ExpiryNotInFuture);
		}

		Ok(Credential {
			tenant_id: self.tenant_id,
			user_id: self.user_id,
			scope: self.scope,
			access_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
			status: CredentialStatus::Authorized,
			revoked_at: None,
		})
	}
}
