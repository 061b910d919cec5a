//! In-flight authorizations keyed by their `state` value, plus PKCE material.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TenantId, UserId},
};

const PKCE_VERIFIER_LEN: usize = 64;

/// Single-use record created by `start_authorization`.
#[derive(Clone)]
pub(crate) struct PendingAuthorization {
	pub(crate) tenant: TenantId,
	pub(crate) user: UserId,
	pub(crate) scope: ScopeSet,
	pub(crate) created_at: OffsetDateTime,
	pub(crate) pkce_verifier: Option<String>,
}
impl PendingAuthorization {
	pub(crate) fn is_expired_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.created_at >= ttl
	}
}
impl Debug for PendingAuthorization {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingAuthorization")
			.field("tenant", &self.tenant)
			.field("user", &self.user)
			.field("created_at", &self.created_at)
			.field("pkce", &self.pkce_verifier.is_some())
			.finish()
	}
}

/// Pending authorizations shared by clones of one manager.
#[derive(Clone, Debug, Default)]
pub(crate) struct PendingRegistry(Arc<Mutex<HashMap<String, PendingAuthorization>>>);
impl PendingRegistry {
	/// Records `entry` under `state`, dropping entries that outlived `ttl`.
	pub(crate) fn insert(
		&self,
		state: String,
		entry: PendingAuthorization,
		now: OffsetDateTime,
		ttl: Duration,
	) {
		let mut pending = self.0.lock();

		pending.retain(|_, existing| !existing.is_expired_at(now, ttl));
		pending.insert(state, entry);
	}

	/// Removes and returns the entry for `state`; a second call for the same state sees `None`.
	pub(crate) fn take(&self, state: &str) -> Option<PendingAuthorization> {
		self.0.lock().remove(state)
	}

	pub(crate) fn len(&self) -> usize {
		self.0.lock().len()
	}
}

/// RFC 7636 verifier and its S256 challenge.
pub(crate) struct PkcePair {
	pub(crate) verifier: String,
	pub(crate) challenge: String,
}
impl PkcePair {
	pub(crate) const METHOD: &'static str = "S256";

	pub(crate) fn generate() -> Self {
		let verifier: String =
			rand::rng().sample_iter(Alphanumeric).take(PKCE_VERIFIER_LEN).map(char::from).collect();
		let challenge = pkce_challenge(&verifier);

		Self { verifier, challenge }
	}
}

fn pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
