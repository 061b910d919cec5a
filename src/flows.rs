//! Token lifecycle manager: authorization, transparent refresh, and tenant administration.
//!
//! Per (tenant, user) the manager drives
//! `NoCredential -> Authorizing -> Authorized -> (Refreshing) -> Authorized | NeedsReauth`.
//! Writes for one key are serialized by an async guard held across the read-check-refresh-write
//! sequence, so concurrent callers share a single refresh.

pub mod admin;
pub mod authorize;
pub mod refresh;

mod common;
mod pending;

pub use authorize::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	api_key::{ApiKeyPolicy, MinLengthPolicy},
	clock::{Clock, SystemClock},
	config::ManagerConfig,
	error::ConfigError,
	flows::{common::KeyGuards, pending::PendingRegistry},
	http::TokenHttpClient,
	oauth::OAuth2ProviderClient,
	provider::{DefaultProviderStrategy, ProviderClient, ProviderDescriptor},
	state::StateCodec,
	store::LifecycleStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Coordinates the authorization-code lifecycle against a single provider descriptor.
///
/// The manager owns its store handle, provider client, clock, and the in-memory pending
/// authorizations; cloning shares all of them.
#[derive(Clone)]
pub struct TokenManager {
	config: ManagerConfig,
	descriptor: ProviderDescriptor,
	provider: Arc<dyn ProviderClient>,
	store: Arc<dyn LifecycleStore>,
	clock: Arc<dyn Clock>,
	codec: StateCodec,
	key_policy: Arc<dyn ApiKeyPolicy>,
	pending: PendingRegistry,
	key_guards: KeyGuards,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl TokenManager {
	/// Creates a manager from explicit collaborators, using the system clock and a
	/// [`MinLengthPolicy`] built from `config.api_key_min_len`.
	pub fn new<S>(
		config: ManagerConfig,
		descriptor: ProviderDescriptor,
		provider: Arc<dyn ProviderClient>,
		store: Arc<S>,
	) -> Self
	where
		S: 'static + LifecycleStore,
	{
		let key_policy = Arc::new(MinLengthPolicy::new(config.api_key_min_len));

		Self {
			config,
			descriptor,
			provider,
			store,
			clock: Arc::new(SystemClock),
			codec: StateCodec,
			key_policy,
			pending: PendingRegistry::default(),
			key_guards: KeyGuards::default(),
			refresh_metrics: Default::default(),
		}
	}

	/// Replaces the clock used for expiry checks and pending-authorization lifetimes.
	///
	/// A provider passed to [`TokenManager::new`] keeps its own clock; build it from the same
	/// clock, or use [`TokenManager::with_http_client`], which shares one clock between both.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Replaces the policy applied to organization API keys.
	pub fn with_key_policy(mut self, policy: Arc<dyn ApiKeyPolicy>) -> Self {
		self.key_policy = policy;

		self
	}

	/// Configuration the manager was built with.
	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	/// Provider descriptor the manager was built with.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Shared counters for refresh outcomes.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}
}
impl TokenManager {
	/// Builds a manager whose provider client speaks through `http_client` with the default
	/// provider strategy. The provider and the manager read time from the same `clock`.
	pub fn with_http_client<S, C>(
		config: ManagerConfig,
		descriptor: ProviderDescriptor,
		store: Arc<S>,
		http_client: C,
		clock: Arc<dyn Clock>,
	) -> Result<Self>
	where
		S: 'static + LifecycleStore,
		C: TokenHttpClient,
	{
		config.validate()?;
		descriptor.validate().map_err(ConfigError::from)?;

		let provider = OAuth2ProviderClient::<C>::new(
			&descriptor,
			&config,
			http_client,
			Arc::new(DefaultProviderStrategy),
			clock.clone(),
		)?;

		Ok(Self::new(config, descriptor, Arc::new(provider), store).with_clock(clock))
	}

	/// Same as [`TokenManager::with_http_client`] over the crate's reqwest transport, bounded by
	/// `config.request_timeout`.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest<S>(
		config: ManagerConfig,
		descriptor: ProviderDescriptor,
		store: Arc<S>,
		clock: Arc<dyn Clock>,
	) -> Result<Self>
	where
		S: 'static + LifecycleStore,
	{
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout.unsigned_abs())?;

		Self::with_http_client(config, descriptor, store, http_client, clock)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_id", &self.config.client_id)
			.field("descriptor", &self.descriptor.id)
			.field("pending", &self.pending.len())
			.finish_non_exhaustive()
	}
}
