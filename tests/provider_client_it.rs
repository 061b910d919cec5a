#![cfg(feature = "reqwest")]

mod common;

// self
use common::*;
use oauth2_lifecycle::{
	auth::TokenSecret,
	clock::{Clock, ManualClock},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		OAuth2ProviderClient,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, ExchangeError, ProviderClient, RefreshError,
	},
};

fn build_client(
	server: &MockServer,
	method: ClientAuthMethod,
	timeout: std::time::Duration,
) -> OAuth2ProviderClient<ReqwestHttpClient> {
	let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW));

	OAuth2ProviderClient::new(
		&build_descriptor(server, method),
		&test_config(),
		test_reqwest_http_client(timeout),
		Arc::new(DefaultProviderStrategy),
		clock,
	)
	.expect("Provider client should build from the mock descriptor.")
}

fn default_client(server: &MockServer) -> OAuth2ProviderClient<ReqwestHttpClient> {
	build_client(server, ClientAuthMethod::ClientSecretPost, std::time::Duration::from_secs(5))
}

#[tokio::test]
async fn exchange_code_applies_expiry_margin() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "code-123")
				.form_urlencoded_tuple("client_id", TEST_CLIENT_ID)
				.form_urlencoded_tuple("client_secret", TEST_CLIENT_SECRET)
				.form_urlencoded_tuple("redirect_uri", REDIRECT_URI);
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"access-1","refresh_token":"refresh-1","token_type":"bearer","expires_in":3600,"scope":"openid profile"}"#,
			);
		})
		.await;
	let grant =
		client.exchange_code("code-123", None).await.expect("Code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(grant.access_token.expose(), "access-1");
	assert_eq!(grant.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
	assert_eq!(grant.expires_at, NOW + Duration::seconds(3300));
	assert!(grant.scope.is_some_and(|scope| scope.contains("openid") && scope.contains("profile")));
}

#[tokio::test]
async fn basic_auth_moves_secret_into_header() {
	let server = MockServer::start_async().await;
	let client = build_client(
		&server,
		ClientAuthMethod::ClientSecretBasic,
		std::time::Duration::from_secs(5),
	);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header_exists("authorization");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"access-basic","token_type":"bearer","expires_in":120}"#,
			);
		})
		.await;
	let grant =
		client.exchange_code("code-basic", None).await.expect("Code exchange should succeed.");

	mock.assert_async().await;

	// Short lifetimes keep half of `expires_in` in reserve.
	assert_eq!(grant.expires_at, NOW + Duration::seconds(60));
	assert!(grant.refresh_token.is_none());
}

#[tokio::test]
async fn public_clients_send_pkce_verifier() {
	let server = MockServer::start_async().await;
	let client =
		build_client(&server, ClientAuthMethod::NoneWithPkce, std::time::Duration::from_secs(5));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("code_verifier", "verifier-abc")
				.form_urlencoded_tuple("client_id", TEST_CLIENT_ID);
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"access-pkce","token_type":"bearer","expires_in":3600}"#,
			);
		})
		.await;

	client
		.exchange_code("code-pkce", Some("verifier-abc"))
		.await
		.expect("PKCE code exchange should succeed.");

	mock.assert_async().await;
}

#[tokio::test]
async fn rejected_code_is_not_transient() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"code already used"}"#);
		})
		.await;
	let err = client
		.exchange_code("used-code", None)
		.await
		.expect_err("A rejected code must fail the exchange.");

	mock.assert_async().await;

	assert!(
		matches!(&err, ExchangeError::InvalidCode { reason } if reason.contains("code already used")),
		"Unexpected exchange error: {err:?}."
	);
}

#[tokio::test]
async fn exchange_timeout_is_transient() {
	let server = MockServer::start_async().await;
	let client = build_client(
		&server,
		ClientAuthMethod::ClientSecretPost,
		std::time::Duration::from_millis(200),
	);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_secs(2))
				.body(r#"{"access_token":"late","token_type":"bearer","expires_in":3600}"#);
		})
		.await;
	let err = client
		.exchange_code("slow-code", None)
		.await
		.expect_err("A timed-out exchange must not succeed.");

	assert!(matches!(err, ExchangeError::Transient { .. }), "Unexpected exchange error: {err:?}.");
}

#[tokio::test]
async fn refresh_invalid_grant_is_terminal() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-dead");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant"}"#);
		})
		.await;
	let err = client
		.refresh(&TokenSecret::new("refresh-dead"))
		.await
		.expect_err("A revoked refresh token must fail.");

	mock.assert_async().await;

	assert!(matches!(err, RefreshError::InvalidGrant { .. }), "Unexpected refresh error: {err:?}.");
}

#[tokio::test]
async fn refresh_invalid_client_is_transient() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_client"}"#);
		})
		.await;
	let err = client
		.refresh(&TokenSecret::new("refresh-ok"))
		.await
		.expect_err("Client misconfiguration must fail the refresh.");

	assert!(matches!(err, RefreshError::Transient { .. }), "Unexpected refresh error: {err:?}.");
}

#[tokio::test]
async fn refresh_server_errors_carry_retry_after() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).header("retry-after", "7").body("upstream unavailable");
		})
		.await;
	let err = client
		.refresh(&TokenSecret::new("refresh-ok"))
		.await
		.expect_err("A 503 must fail the refresh.");

	mock.assert_async().await;

	match err {
		RefreshError::Transient { retry_after, .. } =>
			assert_eq!(retry_after, Some(Duration::seconds(7))),
		other => panic!("Expected a transient refresh error, got {other:?}."),
	}
}

#[tokio::test]
async fn refresh_malformed_success_body_is_transient() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"no-expiry","token_type":"bearer"}"#);
		})
		.await;
	let err = client
		.refresh(&TokenSecret::new("refresh-ok"))
		.await
		.expect_err("A token response without expires_in must be rejected.");

	assert!(
		matches!(&err, RefreshError::Transient { message, .. } if message.contains("expires_in")),
		"Unexpected refresh error: {err:?}."
	);
}

#[tokio::test]
async fn unbounded_lifetimes_are_rejected_instead_of_overflowing() {
	let server = MockServer::start_async().await;
	let client = default_client(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-forever", Some("refresh-forever"), 1_000_000_000_000));
		})
		.await;
	let err = client
		.exchange_code("code-forever", None)
		.await
		.expect_err("An expiry past the representable range must fail the exchange.");

	assert!(
		matches!(&err, ExchangeError::InvalidCode { reason } if reason.contains("expires_in")),
		"Unexpected exchange error: {err:?}."
	);

	let err = client
		.refresh(&TokenSecret::new("refresh-ok"))
		.await
		.expect_err("An expiry past the representable range must fail the refresh.");

	assert!(
		matches!(&err, RefreshError::Transient { message, .. } if message.contains("expires_in")),
		"Unexpected refresh error: {err:?}."
	);
}

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Default)]
struct ThrottlingHttpClient {
	seen: Arc<Mutex<Vec<usize>>>,
}
impl TokenHttpClient for ThrottlingHttpClient {
	type Handle = ThrottlingHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ThrottlingHandle { slot, seen: self.seen.clone() }
	}
}

struct ThrottlingHandle {
	slot: ResponseMetadataSlot,
	seen: Arc<Mutex<Vec<usize>>>,
}
impl<'a> AsyncHttpClient<'a> for ThrottlingHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			assert!(
				self.slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);

			self.seen.lock().push(request.body().len());
			self.slot.store(ResponseMetadata {
				status: Some(429),
				retry_after: Some(Duration::seconds(30)),
			});

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[tokio::test]
async fn custom_transports_report_metadata() {
	let server = MockServer::start_async().await;
	let http_client = ThrottlingHttpClient::default();
	let seen = http_client.seen.clone();
	let clock: Arc<dyn Clock> = Arc::new(ManualClock::at(NOW));
	let client = OAuth2ProviderClient::<ThrottlingHttpClient>::new(
		&build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		&test_config(),
		http_client,
		Arc::new(DefaultProviderStrategy),
		clock,
	)
	.expect("Provider client should build with a custom transport.");
	let err = client
		.refresh(&TokenSecret::new("refresh-throttled"))
		.await
		.expect_err("A throttled transport must fail the refresh.");

	match err {
		RefreshError::Transient { message, retry_after } => {
			assert!(message.contains("Transport throttled"));
			assert_eq!(retry_after, Some(Duration::seconds(30)));
		},
		other => panic!("Expected a transient refresh error, got {other:?}."),
	}

	assert_eq!(seen.lock().len(), 1);
}
