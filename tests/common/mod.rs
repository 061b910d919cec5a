//! Fixtures shared by the integration tests.

#![allow(dead_code, unused_imports)]

pub use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

pub use httpmock::prelude::*;
pub use parking_lot::Mutex;
pub use time::{Duration, OffsetDateTime, macros};

// self
use oauth2_lifecycle::{
	auth::{Credential, ProviderId, ScopeSet, TenantId, UserId},
	clock::ManualClock,
	config::ManagerConfig,
	flows::TokenManager,
	http::ReqwestHttpClient,
	provider::{ClientAuthMethod, ProviderDescriptor},
	reqwest::{Client as ReqwestClient, redirect::Policy},
	store::{CredentialStore, MemoryStore},
	url::Url,
};

pub const TEST_CLIENT_ID: &str = "client-it";
pub const TEST_CLIENT_SECRET: &str = "secret-it";
pub const REDIRECT_URI: &str = "https://app.example.com/oauth/callback";
pub const NOW: OffsetDateTime = macros::datetime!(2025-06-01 12:00 UTC);

/// Reqwest client that trusts the self-signed certificates served by `httpmock`.
pub fn test_reqwest_http_client(timeout: std::time::Duration) -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(Policy::none())
		.timeout(timeout)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn test_config() -> ManagerConfig {
	ManagerConfig::new(
		TEST_CLIENT_ID,
		Url::parse(REDIRECT_URI).expect("Redirect URI fixture should parse successfully."),
		ScopeSet::new(["openid", "profile"]).expect("Scope fixture should be valid."),
	)
	.with_client_secret(TEST_CLIENT_SECRET)
}

pub fn build_descriptor(server: &MockServer, method: ClientAuthMethod) -> ProviderDescriptor {
	let provider_id =
		ProviderId::new("mock-provider").expect("Provider identifier should be valid.");

	ProviderDescriptor::builder(provider_id)
		.authorization_endpoint(
			Url::parse(&server.url("/authorize"))
				.expect("Mock authorization endpoint should parse successfully."),
		)
		.token_endpoint(
			Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
		)
		.preferred_client_auth_method(method)
		.build()
		.expect("Provider descriptor should build successfully.")
}

/// Manager over an in-memory store and the reqwest transport, driven by `clock`.
pub fn build_test_manager(
	config: ManagerConfig,
	descriptor: ProviderDescriptor,
	clock: Arc<ManualClock>,
) -> (TokenManager, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::default());
	let http_client = test_reqwest_http_client(config.request_timeout.unsigned_abs());
	let manager =
		TokenManager::with_http_client(config, descriptor, store.clone(), http_client, clock)
			.expect("Token manager should build from the test fixtures.");

	(manager, store)
}

pub fn tenant(value: &str) -> TenantId {
	TenantId::new(value).expect("Tenant fixture should be valid.")
}

pub fn user(value: &str) -> UserId {
	UserId::new(value).expect("User fixture should be valid.")
}

/// Stores a credential issued at [`NOW`] that expires `expires_in` later.
pub async fn seed_credential(
	store: &MemoryStore,
	tenant: &TenantId,
	user: &UserId,
	refresh: Option<&str>,
	expires_in: Duration,
) -> Credential {
	let mut builder = Credential::builder(tenant.clone(), user.clone())
		.scope(ScopeSet::new(["openid"]).expect("Scope fixture should be valid."))
		.access_token("access-seeded")
		.issued_at(NOW)
		.expires_in(expires_in);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	let credential = builder.build().expect("Credential fixture should build.");

	store.put(credential.clone()).await.expect("Seeding the store should succeed.");

	credential
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> String {
	match refresh {
		Some(refresh) => format!(
			r#"{{"access_token":"{access}","refresh_token":"{refresh}","token_type":"bearer","expires_in":{expires_in}}}"#
		),
		None => format!(
			r#"{{"access_token":"{access}","token_type":"bearer","expires_in":{expires_in}}}"#
		),
	}
}
