//! Starting and completing the three-legged authorization.

// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKey, ScopeSet, TenantId, UserId},
	error::ConfigError,
	flows::{
		TokenManager,
		pending::{PendingAuthorization, PkcePair},
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{ExchangeError, ProviderDescriptor},
};

/// Everything the caller needs to send a user to the provider's consent screen.
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Tenant the authorization is for.
	pub tenant: TenantId,
	/// User the authorization is for.
	pub user: UserId,
	/// Opaque value the provider echoes back on the redirect.
	pub state: String,
	/// Fully-formed HTTPS authorize URL.
	pub authorize_url: Url,
	/// Instant after which the redirect is no longer accepted.
	pub expires_at: OffsetDateTime,
}

impl TokenManager {
	/// Builds an authorization URL for (tenant, user) and records the pending authorization.
	///
	/// Every call issues an independent state; earlier ones remain valid until they expire.
	pub async fn start_authorization(
		&self,
		tenant: &TenantId,
		user: &UserId,
	) -> Result<AuthorizationSession> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "start_authorization");

		span.record_key(tenant, user);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let now = self.clock.now();
				let scope = self
					.descriptor
					.quirks
					.requested_scope(&self.config.scope)
					.map_err(ConfigError::from)?;
				let state = self.codec.encode(tenant, user);
				let pkce = self.descriptor.requires_pkce().then(PkcePair::generate);
				let authorize_url = build_authorize_url(
					&self.descriptor,
					&self.config.client_id,
					&self.config.redirect_uri,
					&scope,
					&state,
					pkce.as_ref(),
				);

				self.pending.insert(
					state.clone(),
					PendingAuthorization {
						tenant: tenant.clone(),
						user: user.clone(),
						scope,
						created_at: now,
						pkce_verifier: pkce.map(|pair| pair.verifier),
					},
					now,
					self.config.pending_ttl,
				);

				tracing::info!(tenant = %tenant, user = %user, "Authorization started.");

				Ok(AuthorizationSession {
					tenant: tenant.clone(),
					user: user.clone(),
					state,
					authorize_url,
					expires_at: now + self.config.pending_ttl,
				})
			})
			.await;

		obs::record_result(KIND, result)
	}

	/// Exchanges `code` for tokens and stores them for the pair bound into `state`.
	///
	/// The pending authorization is consumed before anything else can fail, so a `state` is
	/// accepted at most once.
	pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<CredentialKey> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let claims = self.codec.decode(state)?;

				span.record_key(&claims.tenant, &claims.user);

				let pending = self
					.pending
					.take(state)
					.ok_or_else(|| Error::invalid_state("state is unknown or was already used"))?;

				if pending.is_expired_at(self.clock.now(), self.config.pending_ttl) {
					return Err(Error::invalid_state("authorization has expired"));
				}
				if code.trim().is_empty() {
					return Err(Error::bad_request("authorization code is empty"));
				}

				let grant = self
					.provider
					.exchange_code(code, pending.pkce_verifier.as_deref())
					.await
					.inspect_err(|e| {
						tracing::warn!(
							tenant = %claims.tenant,
							user = %claims.user,
							error = %e,
							"Authorization code exchange failed."
						)
					})?;
				let mut builder = Credential::builder(pending.tenant, pending.user)
					.scope(grant.scope.unwrap_or(pending.scope))
					.access_token(grant.access_token.expose())
					.issued_at(self.clock.now())
					.expires_at(grant.expires_at);

				if let Some(refresh) = grant.refresh_token {
					builder = builder.refresh_token(refresh.expose());
				}

				let credential = builder
					.build()
					.map_err(|e| ExchangeError::InvalidCode { reason: e.to_string() })?;
				let key = credential.key();
				let guard = self.key_guards.guard(&key);
				let _write = guard.lock().await;

				self.store.put(credential).await?;

				tracing::info!(tenant = %key.tenant, user = %key.user, "Authorization completed.");

				Ok(key)
			})
			.await;

		obs::record_result(KIND, result)
	}

	/// Discards the pending authorization for `state` after the provider redirected back with
	/// `error=...`, returning the pair it belonged to.
	pub fn cancel_authorization(&self, state: &str) -> Result<CredentialKey> {
		let claims = self.codec.decode(state)?;

		self.pending
			.take(state)
			.ok_or_else(|| Error::invalid_state("state is unknown or was already used"))?;

		tracing::info!(tenant = %claims.tenant, user = %claims.user, "Authorization cancelled.");

		Ok(CredentialKey::new(claims.tenant, claims.user))
	}
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	scope: &ScopeSet,
	state: &str,
	pkce: Option<&PkcePair>,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if let Some(scope_value) = scope.join(descriptor.quirks.scope_delimiter) {
		pairs.append_pair("scope", &scope_value);
	}

	pairs.append_pair("state", state);

	if let Some(pkce) = pkce {
		pairs.append_pair("code_challenge", &pkce.challenge);
		pairs.append_pair("code_challenge_method", PkcePair::METHOD);
	}
	for (name, value) in descriptor.quirks.authorize_params() {
		pairs.append_pair(name, value);
	}

	drop(pairs);

	url
}
