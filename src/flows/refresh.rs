//! Handing out valid access tokens, refreshing them under a per-key singleflight guard.
//!
//! The fast path never touches the provider: a stored token that is not within
//! `refresh_buffer` of its expiry is returned as-is. Otherwise the caller takes the key's
//! guard, re-reads the store (another caller may have refreshed meanwhile), and only then
//! redeems the refresh token. `invalid_grant` revokes the credential; transient failures
//! leave it untouched.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKey, TenantId, TokenSecret, UserId, is_expired},
	error::NotAuthorizedReason,
	flows::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::RefreshError,
};

/// Access token handed to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	/// Bearer token value.
	pub access_token: TokenSecret,
	/// Instant after which the token must not be used.
	pub expires_at: OffsetDateTime,
}
impl From<&Credential> for AccessToken {
	fn from(credential: &Credential) -> Self {
		Self { access_token: credential.access_token.clone(), expires_at: credential.expires_at }
	}
}

impl TokenManager {
	/// Returns an access token for (tenant, user) that is valid for at least `refresh_buffer`,
	/// refreshing it first when necessary.
	///
	/// An `invalid_grant` answer marks the credential revoked and fails with
	/// [`NotAuthorizedReason::Revoked`]. Persisting the revoked status is best effort: when the
	/// store rejects that write, the record stays `Authorized` and the next call asks the provider
	/// again, which answers `invalid_grant` once more.
	pub async fn valid_access_token(&self, tenant: &TenantId, user: &UserId) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::AccessToken;

		let span = FlowSpan::new(KIND, "valid_access_token");

		span.record_key(tenant, user);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let current = self.usable_credential(tenant, user).await?;

				if !is_expired(&current, self.clock.now(), self.config.refresh_buffer) {
					return Ok(AccessToken::from(&current));
				}

				self.refresh_locked(tenant, user).await
			})
			.await;

		obs::record_result(KIND, result)
	}

	async fn usable_credential(&self, tenant: &TenantId, user: &UserId) -> Result<Credential> {
		let credential = self
			.store
			.get(tenant, user)
			.await?
			.ok_or(Error::NotAuthorized { reason: NotAuthorizedReason::NoCredential })?;

		if credential.is_revoked() {
			return Err(Error::NotAuthorized { reason: NotAuthorizedReason::Revoked });
		}

		Ok(credential)
	}

	async fn refresh_locked(&self, tenant: &TenantId, user: &UserId) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_locked");

		span.record_key(tenant, user);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async move {
				let key = CredentialKey::new(tenant.clone(), user.clone());
				let guard = self.key_guards.guard(&key);
				let _singleflight = guard.lock().await;
				let current = self.usable_credential(tenant, user).await?;

				if !is_expired(&current, self.clock.now(), self.config.refresh_buffer) {
					self.refresh_metrics.record_cache_hit();

					return Ok(AccessToken::from(&current));
				}

				let refresh_token = current
					.refresh_token
					.clone()
					.ok_or(Error::NotAuthorized { reason: NotAuthorizedReason::MissingRefreshToken })?;

				match self.provider.refresh(&refresh_token).await {
					Ok(grant) => {
						let mut next = current
							.refreshed(
								grant.access_token,
								grant.refresh_token,
								grant.expires_at,
								self.clock.now(),
							)
							.map_err(|e| Error::TemporarilyUnavailable {
								message: e.to_string(),
								retry_after: None,
							})?;

						if let Some(scope) = grant.scope {
							next.scope = scope;
						}

						self.store.put(next.clone()).await?;
						self.refresh_metrics.record_success();

						tracing::info!(
							tenant = %tenant,
							user = %user,
							expires_at = %next.expires_at,
							"Access token refreshed."
						);

						Ok(AccessToken::from(&next))
					},
					Err(RefreshError::InvalidGrant { reason }) => {
						let mut revoked = current;

						revoked.revoke(self.clock.now());

						tracing::warn!(tenant = %tenant, user = %user, %reason, "Credential revoked by provider.");

						if let Err(e) = self.store.put(revoked).await {
							tracing::warn!(
								tenant = %tenant,
								user = %user,
								error = %e,
								"Failed to persist revoked status."
							);
						}

						Err(Error::NotAuthorized { reason: NotAuthorizedReason::Revoked })
					},
					Err(RefreshError::Transient { message, retry_after }) => {
						tracing::warn!(
							tenant = %tenant,
							user = %user,
							%message,
							"Refresh failed transiently; credential left unchanged."
						);

						Err(Error::TemporarilyUnavailable { message, retry_after })
					},
				}
			})
			.await;

		if result.is_err() {
			self.refresh_metrics.record_failure();
		}

		obs::record_result(KIND, result)
	}
}
