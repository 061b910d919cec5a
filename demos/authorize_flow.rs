//! Builds a token manager over a directory-backed store, starts an authorization for one user,
//! and shows how the boundary reports a user that has not finished authorizing yet.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use oauth2_lifecycle::{
	api::{self, AccessTokenRequest, ErrorResponse, StoreOrgApiKeyRequest},
	auth::{ProviderId, ScopeSet, TenantId, UserId},
	clock::SystemClock,
	config::ManagerConfig,
	flows::TokenManager,
	provider::{OfflineAccess, ProviderDescriptor, ProviderQuirks},
	store::FileStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store = Arc::new(FileStore::open(env::temp_dir().join("oauth2_lifecycle_demo"))?);
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-provider")?)
		.authorization_endpoint(Url::parse("https://provider.example.com/authorize")?)
		.token_endpoint(Url::parse("https://provider.example.com/token")?)
		.quirks(ProviderQuirks {
			offline_access: OfflineAccess::AccessTypeParam,
			force_consent: true,
			..Default::default()
		})
		.build()?;
	let config = ManagerConfig::new(
		"demo-client",
		Url::parse("https://app.example.com/oauth/callback")?,
		ScopeSet::new(["openid", "profile"])?,
	)
	.with_client_secret("demo-secret");
	let manager =
		TokenManager::with_reqwest(config, descriptor, store.clone(), Arc::new(SystemClock))?;
	let tenant = TenantId::new("orgA")?;
	let user = UserId::new("u1")?;

	api::store_org_api_key(
		&manager,
		StoreOrgApiKeyRequest {
			tenant_id: Some(tenant.to_string()),
			api_key: Some("sk_demo_0123456789abcdef".into()),
		},
	)
	.await?;

	let session = manager.start_authorization(&tenant, &user).await?;

	println!("Send the user to {}.", session.authorize_url);
	println!("The redirect must arrive before {}.", session.expires_at);

	let request =
		AccessTokenRequest { tenant_id: Some(tenant.to_string()), user_id: Some(user.to_string()) };

	match api::access_token(&manager, request).await {
		Ok(token) => println!("Access token expires at {}.", token.expires_at),
		Err(e) => {
			let response = ErrorResponse::from(&e);

			println!(
				"HTTP {} {}: {}",
				response.http_status(),
				response.kind,
				response.remediation.as_deref().unwrap_or(&response.message)
			);
		},
	}

	println!("Tenant documents live under {}.", store.dir().display());

	Ok(())
}
