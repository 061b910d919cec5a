//! Thread-safe in-memory store for local development and tests.

// self
use crate::{
	_prelude::*,
	api_key::OrgApiKey,
	auth::{Credential, TenantId, UserId},
	store::{ApiKeyStore, CredentialStore, StoreFuture, TenantDocument},
};

type TenantSlot = Arc<RwLock<TenantDocument>>;

/// Keeps one lock-guarded [`TenantDocument`] per tenant, so traffic for different tenants never
/// contends on the same document lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<TenantId, TenantSlot>>>);
impl MemoryStore {
	fn slot(&self, tenant: &TenantId) -> Option<TenantSlot> {
		self.0.read().get(tenant).cloned()
	}

	fn slot_or_insert(&self, tenant: &TenantId) -> TenantSlot {
		if let Some(slot) = self.slot(tenant) {
			return slot;
		}

		self.0.write().entry(tenant.clone()).or_default().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get<'a>(
		&'a self,
		tenant: &'a TenantId,
		user: &'a UserId,
	) -> StoreFuture<'a, Option<Credential>> {
		Box::pin(async move {
			Ok(self.slot(tenant).and_then(|slot| slot.read().credentials.get(user).cloned()))
		})
	}

	fn put(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let slot = self.slot_or_insert(&credential.tenant_id);

			slot.write().credentials.insert(credential.user_id.clone(), credential);

			Ok(())
		})
	}

	fn list<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<Credential>> {
		Box::pin(async move {
			Ok(self
				.slot(tenant)
				.map(|slot| slot.read().credentials.values().cloned().collect())
				.unwrap_or_default())
		})
	}

	fn remove<'a>(
		&'a self,
		tenant: &'a TenantId,
		user: &'a UserId,
	) -> StoreFuture<'a, Option<Credential>> {
		Box::pin(async move { Ok(self.slot(tenant).and_then(|slot| slot.write().credentials.remove(user))) })
	}
}
impl ApiKeyStore for MemoryStore {
	fn put_api_key(&self, key: OrgApiKey) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let slot = self.slot_or_insert(&key.tenant_id);

			slot.write().org_api_key = Some(key);

			Ok(())
		})
	}

	fn get_api_key<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<OrgApiKey>> {
		Box::pin(async move { Ok(self.slot(tenant).and_then(|slot| slot.read().org_api_key.clone())) })
	}
}
