//! Shared helpers for manager operations.

// self
use crate::{_prelude::*, auth::CredentialKey};

/// Per-key async guards created on demand.
#[derive(Clone, Debug, Default)]
pub(crate) struct KeyGuards(Arc<Mutex<HashMap<CredentialKey, Arc<AsyncMutex<()>>>>>);
impl KeyGuards {
	/// Returns (and creates on demand) the guard serializing writes for `key`.
	pub(crate) fn guard(&self, key: &CredentialKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.0.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
