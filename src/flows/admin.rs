//! Tenant administration: organization API keys and credential housekeeping.

// self
use crate::{
	_prelude::*,
	api_key::OrgApiKey,
	auth::{Credential, CredentialKey, TenantId, TokenSecret, UserId},
	flows::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenManager {
	/// Validates `key` against the manager's policy and stores it for `tenant`, replacing any
	/// previous key.
	pub async fn store_org_api_key(&self, tenant: &TenantId, key: &str) -> Result<()> {
		const KIND: FlowKind = FlowKind::ApiKey;

		let span = FlowSpan::new(KIND, "store_org_api_key");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let secret = TokenSecret::new(key);

				self.key_policy.validate(&secret)?;
				self.store
					.put_api_key(OrgApiKey {
						tenant_id: tenant.clone(),
						key: secret,
						stored_at: self.clock.now(),
					})
					.await?;

				tracing::info!(tenant = %tenant, "Organization API key stored.");

				Ok(())
			})
			.await;

		obs::record_result(KIND, result)
	}

	/// Returns the tenant's API key or [`Error::SetupIncomplete`] when none was stored.
	pub async fn org_api_key(&self, tenant: &TenantId) -> Result<OrgApiKey> {
		self.store
			.get_api_key(tenant)
			.await?
			.ok_or_else(|| Error::SetupIncomplete { tenant: tenant.to_string() })
	}

	/// Lists every credential stored for `tenant`, including revoked ones.
	pub async fn list_credentials(&self, tenant: &TenantId) -> Result<Vec<Credential>> {
		Ok(self.store.list(tenant).await?)
	}

	/// Deletes the credential for the pair. The next token request reports
	/// [`NoCredential`](crate::error::NotAuthorizedReason::NoCredential).
	pub async fn remove_credential(
		&self,
		tenant: &TenantId,
		user: &UserId,
	) -> Result<Option<Credential>> {
		let guard = self.key_guards.guard(&CredentialKey::new(tenant.clone(), user.clone()));
		let _write = guard.lock().await;
		let removed = self.store.remove(tenant, user).await?;

		if removed.is_some() {
			tracing::info!(tenant = %tenant, user = %user, "Credential removed.");
		}

		Ok(removed)
	}
}
