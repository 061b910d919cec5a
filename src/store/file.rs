//! Directory-backed store writing one JSON document per tenant.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind as IoErrorKind, Write},
	path::{Path, PathBuf},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	api_key::OrgApiKey,
	auth::{Credential, TenantId, UserId},
	store::{ApiKeyStore, CredentialStore, StoreError, StoreFuture, TenantDocument},
};

const DOCUMENT_EXTENSION: &str = "json";

type TenantSlot = Arc<Mutex<TenantDocument>>;

/// Persists each tenant to `<dir>/<base64url(tenant)>.json`.
///
/// Every mutation clones the cached document, writes the clone through a temporary file that is
/// fsynced and renamed over the target, and only then swaps it into the cache. A failed write
/// leaves both the file and the cache at the previous version.
#[derive(Clone, Debug)]
pub struct FileStore {
	dir: PathBuf,
	tenants: Arc<RwLock<HashMap<TenantId, TenantSlot>>>,
}
impl FileStore {
	/// Opens (or creates) a store rooted at `dir`, eagerly loading existing tenant documents.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let dir = dir.into();

		fs::create_dir_all(&dir).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", dir.display()),
		})?;

		let tenants = Self::load_all(&dir)?;

		Ok(Self { dir, tenants: Arc::new(RwLock::new(tenants)) })
	}

	/// Directory holding the tenant documents.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn load_all(dir: &Path) -> Result<HashMap<TenantId, TenantSlot>, StoreError> {
		let entries = fs::read_dir(dir).map_err(|e| StoreError::Backend {
			message: format!("Failed to list {}: {e}", dir.display()),
		})?;
		let mut tenants = HashMap::new();

		for entry in entries {
			let path = entry
				.map_err(|e| StoreError::Backend {
					message: format!("Failed to list {}: {e}", dir.display()),
				})?
				.path();

			if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
				continue;
			}

			let Some(tenant) = path.file_stem().and_then(|stem| stem.to_str()).and_then(decode_tenant)
			else {
				tracing::warn!(path = %path.display(), "Skipping file with an undecodable tenant name.");

				continue;
			};
			let document = Self::load_document(&path)?;

			tenants.insert(tenant, Arc::new(Mutex::new(document)));
		}

		Ok(tenants)
	}

	fn load_document(path: &Path) -> Result<TenantDocument, StoreError> {
		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(TenantDocument::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn document_path(&self, tenant: &TenantId) -> PathBuf {
		self.dir.join(format!("{}.{DOCUMENT_EXTENSION}", URL_SAFE_NO_PAD.encode(tenant.as_bytes())))
	}

	fn slot(&self, tenant: &TenantId) -> Option<TenantSlot> {
		self.tenants.read().get(tenant).cloned()
	}

	fn slot_or_insert(&self, tenant: &TenantId) -> TenantSlot {
		if let Some(slot) = self.slot(tenant) {
			return slot;
		}

		self.tenants.write().entry(tenant.clone()).or_default().clone()
	}

	/// Applies `mutate` to a copy of the tenant document, persists it, then publishes it.
	fn mutate<T>(
		&self,
		tenant: &TenantId,
		mutate: impl FnOnce(&mut TenantDocument) -> T,
	) -> Result<T, StoreError> {
		let slot = self.slot_or_insert(tenant);
		let mut guard = slot.lock();
		let mut next = guard.clone();
		let output = mutate(&mut next);

		if next != *guard {
			self.persist(tenant, &next)?;

			*guard = next;
		}

		Ok(output)
	}

	fn persist(&self, tenant: &TenantId, document: &TenantDocument) -> Result<(), StoreError> {
		let path = self.document_path(tenant);

		if document.is_empty() {
			return match fs::remove_file(&path) {
				Ok(()) => Ok(()),
				Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to remove {}: {e}", path.display()),
				}),
			};
		}

		let serialized =
			serde_json::to_vec_pretty(document).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize tenant document: {e}"),
			})?;
		let mut tmp_path = path.clone();

		tmp_path.set_extension("json.tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get<'a>(
		&'a self,
		tenant: &'a TenantId,
		user: &'a UserId,
	) -> StoreFuture<'a, Option<Credential>> {
		Box::pin(async move {
			Ok(self.slot(tenant).and_then(|slot| slot.lock().credentials.get(user).cloned()))
		})
	}

	fn put(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let tenant = credential.tenant_id.clone();

			self.mutate(&tenant, |document| {
				document.credentials.insert(credential.user_id.clone(), credential);
			})
		})
	}

	fn list<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Vec<Credential>> {
		Box::pin(async move {
			Ok(self
				.slot(tenant)
				.map(|slot| slot.lock().credentials.values().cloned().collect())
				.unwrap_or_default())
		})
	}

	fn remove<'a>(
		&'a self,
		tenant: &'a TenantId,
		user: &'a UserId,
	) -> StoreFuture<'a, Option<Credential>> {
		Box::pin(async move {
			if self.slot(tenant).is_none() {
				return Ok(None);
			}

			self.mutate(tenant, |document| document.credentials.remove(user))
		})
	}
}
impl ApiKeyStore for FileStore {
	fn put_api_key(&self, key: OrgApiKey) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let tenant = key.tenant_id.clone();

			self.mutate(&tenant, |document| document.org_api_key = Some(key))
		})
	}

	fn get_api_key<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<OrgApiKey>> {
		Box::pin(async move { Ok(self.slot(tenant).and_then(|slot| slot.lock().org_api_key.clone())) })
	}
}

fn decode_tenant(stem: &str) -> Option<TenantId> {
	let bytes = URL_SAFE_NO_PAD.decode(stem).ok()?;

	TenantId::new(String::from_utf8(bytes).ok()?).ok()
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros;
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_dir(label: &str) -> PathBuf {
		env::temp_dir().join(format!(
			"oauth2_lifecycle_file_store_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}

	fn credential(tenant: &str, user: &str, access: &str) -> Credential {
		Credential::builder(
			TenantId::new(tenant).expect("Tenant fixture should be valid."),
			UserId::new(user).expect("User fixture should be valid."),
		)
		.access_token(access)
		.refresh_token("refresh")
		.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
		.expires_in(Duration::hours(1))
		.build()
		.expect("Credential fixture should build.")
	}

	#[test]
	fn documents_survive_reopen() {
		let dir = temp_dir("reopen");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let store = FileStore::open(&dir).expect("Failed to open file store directory.");
		let first = credential("org.A/1", "u_1", "access-1");
		let tenant = first.tenant_id.clone();

		rt.block_on(store.put(first.clone())).expect("Failed to save credential.");
		rt.block_on(store.put(credential("org.A/1", "u_2", "access-2")))
			.expect("Failed to save second credential.");
		rt.block_on(store.put_api_key(OrgApiKey::new(
			tenant.clone(),
			"sk_live_0123456789",
			macros::datetime!(2025-01-01 00:00 UTC),
		)))
		.expect("Failed to save API key.");
		drop(store);

		let reopened = FileStore::open(&dir).expect("Failed to reopen file store directory.");
		let fetched = rt
			.block_on(reopened.get(&first.tenant_id, &first.user_id))
			.expect("Failed to fetch credential.")
			.expect("File store lost the credential after reopen.");

		assert_eq!(fetched, first);
		assert_eq!(rt.block_on(reopened.list(&tenant)).expect("Failed to list.").len(), 2);
		assert_eq!(
			rt.block_on(reopened.get_api_key(&tenant))
				.expect("Failed to fetch API key.")
				.map(|key| key.key.expose().to_owned()),
			Some("sk_live_0123456789".to_owned())
		);
		assert!(reopened.document_path(&tenant).exists());
		assert!(!reopened.document_path(&tenant).with_extension("json.tmp").exists());

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}

	#[test]
	fn removing_the_last_entry_deletes_the_document() {
		let dir = temp_dir("remove");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let store = FileStore::open(&dir).expect("Failed to open file store directory.");
		let record = credential("orgA", "u1", "access");
		let path = store.document_path(&record.tenant_id);

		rt.block_on(store.put(record.clone())).expect("Failed to save credential.");

		assert!(path.exists());

		let removed = rt
			.block_on(store.remove(&record.tenant_id, &record.user_id))
			.expect("Failed to remove credential.");

		assert_eq!(removed, Some(record.clone()));
		assert!(!path.exists());
		assert_eq!(
			rt.block_on(store.remove(&record.tenant_id, &record.user_id))
				.expect("Second removal should succeed."),
			None
		);

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}

	#[test]
	fn failed_write_keeps_previous_version() {
		let dir = temp_dir("failed_write");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let store = FileStore::open(&dir).expect("Failed to open file store directory.");
		let original = credential("orgA", "u1", "access-1");

		rt.block_on(store.put(original.clone())).expect("Failed to save credential.");
		fs::remove_dir_all(&dir).expect("Failed to remove store directory to force a write error.");

		let err = rt
			.block_on(store.put(credential("orgA", "u1", "access-2")))
			.expect_err("Writing into a missing directory should fail.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert_eq!(
			rt.block_on(store.get(&original.tenant_id, &original.user_id))
				.expect("Cached read should succeed."),
			Some(original)
		);
	}

	#[test]
	fn open_rejects_corrupt_documents() {
		let dir = temp_dir("corrupt");

		fs::create_dir_all(&dir).expect("Failed to create store directory.");
		fs::write(dir.join(format!("{}.json", URL_SAFE_NO_PAD.encode("orgA"))), b"{not json")
			.expect("Failed to write corrupt document.");

		let err = FileStore::open(&dir).expect_err("Corrupt documents should fail to load.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}
}
