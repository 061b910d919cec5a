#![cfg(feature = "reqwest")]

mod common;

// self
use common::*;
use oauth2_lifecycle::{
	api::{
		self, AccessTokenRequest, CompleteAuthorizationRequest, ErrorResponse,
		OrgApiKeyLookupRequest, StartAuthorizationRequest, StoreOrgApiKeyRequest,
	},
	clock::ManualClock,
	error::{Error, ErrorKind},
	provider::{ClientAuthMethod, ExchangeError},
	state::StateCodec,
};

#[tokio::test]
async fn start_and_complete_round_trip_through_the_boundary() {
	let server = MockServer::start_async().await;
	let (manager, _store) = build_test_manager(
		test_config(),
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		Arc::new(ManualClock::at(NOW)),
	);
	let started = api::start_authorization(
		&manager,
		StartAuthorizationRequest { tenant_id: Some("orgA".into()), user_id: Some("u1".into()) },
	)
	.await
	.expect("Start should succeed.");

	assert_eq!(started.expires_in_seconds, 600);

	let state = started
		.authorization_url
		.query_pairs()
		.find(|(key, _)| key == "state")
		.map(|(_, value)| value.into_owned())
		.expect("The authorization URL should carry a state.");
	let claims = StateCodec.decode(&state).expect("The issued state should decode.");

	assert_eq!(claims.tenant.as_ref(), "orgA");
	assert_eq!(claims.user.as_ref(), "u1");

	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-api", Some("refresh-api"), 3600));
		})
		.await;
	let completed = api::complete_authorization(
		&manager,
		CompleteAuthorizationRequest {
			code: Some("code-api".into()),
			state: Some(state),
			..Default::default()
		},
	)
	.await
	.expect("Completion should succeed.");

	assert_eq!(completed.tenant_id, "orgA");
	assert_eq!(completed.user_id, "u1");

	let token = api::access_token(
		&manager,
		AccessTokenRequest { tenant_id: Some("orgA".into()), user_id: Some("u1".into()) },
	)
	.await
	.expect("The stored token should be handed out.");
	let json = serde_json::to_value(&token).expect("Token response should serialize.");

	assert_eq!(json["access_token"], "access-api");
	assert_eq!(json["expires_at"], "2025-06-01T12:55:00Z");
}

#[tokio::test]
async fn provider_denial_consumes_the_pending_authorization() {
	let server = MockServer::start_async().await;
	let (manager, _store) = build_test_manager(
		test_config(),
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		Arc::new(ManualClock::at(NOW)),
	);
	let session = manager
		.start_authorization(&tenant("orgA"), &user("u1"))
		.await
		.expect("Starting the authorization should succeed.");
	let err = api::complete_authorization(
		&manager,
		CompleteAuthorizationRequest {
			state: Some(session.state.clone()),
			error: Some("access_denied".into()),
			error_description: Some("User declined.".into()),
			..Default::default()
		},
	)
	.await
	.expect_err("A denied redirect must fail.");

	assert!(
		matches!(&err, Error::ExchangeFailed(ExchangeError::Denied { error, .. }) if error == "access_denied"),
		"Unexpected error: {err:?}."
	);

	let err = manager
		.complete_authorization("late-code", &session.state)
		.await
		.expect_err("The state must be consumed by the denial.");

	assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
	let server = MockServer::start_async().await;
	let (manager, _store) = build_test_manager(
		test_config(),
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		Arc::new(ManualClock::at(NOW)),
	);
	let err = api::start_authorization(
		&manager,
		StartAuthorizationRequest { tenant_id: Some("orgA".into()), user_id: None },
	)
	.await
	.expect_err("A missing user must be rejected.");
	let response = ErrorResponse::from(&err);

	assert_eq!(response.kind, ErrorKind::BadRequest);
	assert_eq!(response.http_status(), 400);
	assert!(response.message.contains("user_id"));

	let err = api::complete_authorization(
		&manager,
		CompleteAuthorizationRequest { code: Some("code".into()), ..Default::default() },
	)
	.await
	.expect_err("A missing state must be rejected.");

	assert_eq!(err.kind(), ErrorKind::BadRequest);

	let err = api::access_token(
		&manager,
		AccessTokenRequest { tenant_id: Some("bad\nid".into()), user_id: Some("u1".into()) },
	)
	.await
	.expect_err("Identifiers with control characters must be rejected.");

	assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn unknown_pairs_map_to_not_authorized_responses() {
	let server = MockServer::start_async().await;
	let (manager, _store) = build_test_manager(
		test_config(),
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		Arc::new(ManualClock::at(NOW)),
	);
	let err = api::access_token(
		&manager,
		AccessTokenRequest { tenant_id: Some("orgA".into()), user_id: Some("ghost".into()) },
	)
	.await
	.expect_err("Unknown pairs must fail.");
	let response = ErrorResponse::from(err);

	assert_eq!(response.kind, ErrorKind::NotAuthorized);
	assert_eq!(response.http_status(), 401);
	assert_eq!(response.remediation.as_deref(), Some("Call start-authorization again."));
}

#[tokio::test]
async fn org_api_keys_are_validated_stored_and_reported() {
	let server = MockServer::start_async().await;
	let (manager, _store) = build_test_manager(
		test_config(),
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		Arc::new(ManualClock::at(NOW)),
	);
	let lookup = || OrgApiKeyLookupRequest { tenant_id: Some("orgA".into()) };
	let err = api::org_api_key_status(&manager, lookup())
		.await
		.expect_err("Tenants without a key must report incomplete setup.");

	assert_eq!(ErrorResponse::from(&err).http_status(), 404);
	assert_eq!(err.kind(), ErrorKind::SetupIncomplete);

	let err = api::store_org_api_key(
		&manager,
		StoreOrgApiKeyRequest { tenant_id: Some("orgA".into()), api_key: Some("short".into()) },
	)
	.await
	.expect_err("Short keys must be rejected.");

	assert_eq!(err.kind(), ErrorKind::InvalidKey);

	let err = api::store_org_api_key(
		&manager,
		StoreOrgApiKeyRequest { tenant_id: Some("orgA".into()), api_key: None },
	)
	.await
	.expect_err("Missing keys must be rejected.");

	assert_eq!(err.kind(), ErrorKind::InvalidKey);

	let stored = api::store_org_api_key(
		&manager,
		StoreOrgApiKeyRequest {
			tenant_id: Some("orgA".into()),
			api_key: Some("sk_live_0123456789abcdef".into()),
		},
	)
	.await
	.expect("A valid key should be stored.");

	assert_eq!(stored.message, "API key stored successfully.");

	let status =
		api::org_api_key_status(&manager, lookup()).await.expect("The key should be reported.");

	assert!(status.configured);
	assert_eq!(status.stored_at, NOW);
	assert_eq!(
		manager
			.org_api_key(&tenant("orgA"))
			.await
			.expect("The key should be readable.")
			.key
			.expose(),
		"sk_live_0123456789abcdef"
	);
}
