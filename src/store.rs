//! Storage contracts and built-in store implementations for credentials and tenant API keys.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	api_key::OrgApiKey,
	auth::{Credential, TenantId, UserId},
};

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable mapping from (tenant, user) to [`Credential`].
///
/// `put` must either fully replace the record or fail leaving the prior record intact.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the credential for the pair, if present.
	fn get<'a>(
		&'a self,
		tenant: &'a TenantId,
		user: &'a UserId,
	) -> StoreFuture<'a, Option<Credential>>;

	/// Inserts or overwrites the credential addressed by its own key.
	fn put(&self, credential: Credential) -> StoreFuture<'_, ()>;

	/// Returns every credential owned by `tenant`, in no particular order.
	fn list<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<Credential>>;

	/// Deletes the credential for the pair and returns what was removed.
	fn remove<'a>(
		&'a self,
		tenant: &'a TenantId,
		user: &'a UserId,
	) -> StoreFuture<'a, Option<Credential>>;
}

/// Per-tenant storage for static API keys.
pub trait ApiKeyStore
where
	Self: Send + Sync,
{
	/// Creates or overwrites the tenant's key.
	fn put_api_key(&self, key: OrgApiKey) -> StoreFuture<'_, ()>;

	/// Fetches the tenant's key, if one was stored.
	fn get_api_key<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<OrgApiKey>>;
}

/// Everything the token manager needs from a backend.
pub trait LifecycleStore: CredentialStore + ApiKeyStore {}
impl<T> LifecycleStore for T where T: CredentialStore + ApiKeyStore {}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A document could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Everything stored for one tenant; the unit of locking and of atomic persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDocument {
	/// Credentials keyed by user.
	#[serde(default)]
	pub credentials: BTreeMap<UserId, Credential>,
	/// Static API key, once configured.
	#[serde(default)]
	pub org_api_key: Option<OrgApiKey>,
}
impl TenantDocument {
	fn is_empty(&self) -> bool {
		self.credentials.is_empty() && self.org_api_key.is_none()
	}
}
