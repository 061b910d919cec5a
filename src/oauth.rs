//! [`ProviderClient`] implementation built on the `oauth2` crate's `BasicClient`.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	clock::Clock,
	config::ManagerConfig,
	error::ConfigError,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, ExchangeError, GrantType, ProviderClient, ProviderDescriptor,
		ProviderErrorContext, ProviderErrorKind, ProviderFuture, ProviderStrategy, RefreshError,
		TokenGrant, grant_expiry,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token-endpoint client for one provider descriptor and one OAuth application.
pub struct OAuth2ProviderClient<C>
where
	C: TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	strategy: Arc<dyn ProviderStrategy>,
	clock: Arc<dyn Clock>,
	expiry_margin: Duration,
}
impl<C> OAuth2ProviderClient<C>
where
	C: TokenHttpClient,
{
	/// Configures the client from a descriptor and the application's credentials.
	///
	/// Public clients ([`ClientAuthMethod::NoneWithPkce`]) never send the configured secret.
	pub fn new(
		descriptor: &ProviderDescriptor,
		config: &ManagerConfig,
		http_client: impl Into<Arc<C>>,
		strategy: Arc<dyn ProviderStrategy>,
		clock: Arc<dyn Clock>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(config.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		match (descriptor.preferred_client_auth_method, config.client_secret.as_ref()) {
			(ClientAuthMethod::NoneWithPkce, _) | (_, None) => {},
			(method, Some(secret)) => {
				oauth_client =
					oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));

				if matches!(method, ClientAuthMethod::ClientSecretPost) {
					oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
				}
			},
		}

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			strategy,
			clock,
			expiry_margin: config.expiry_margin,
		})
	}

	fn extra_params(&self, grant: GrantType) -> BTreeMap<String, String> {
		let mut form = BTreeMap::new();

		self.strategy.augment_token_request(grant, &mut form);

		form
	}

	fn grant_from(&self, response: &BasicTokenResponse) -> Result<TokenGrant, String> {
		let expires_in = response
			.expires_in()
			.ok_or_else(|| "token response is missing expires_in".to_owned())?;
		let expires_in = Duration::try_from(expires_in)
			.map_err(|_| "token response expires_in is out of range".to_owned())?;
		let expires_at = grant_expiry(self.clock.now(), expires_in, self.expiry_margin)
			.ok_or_else(|| "token response expires_in is not a usable lifetime".to_owned())?;
		let scope = response
			.scopes()
			.map(|scopes| ScopeSet::new(scopes.iter().map(|scope| scope.as_str())))
			.transpose()
			.map_err(|e| format!("token response scope is invalid: {e}"))?;

		if response.access_token().secret().is_empty() {
			return Err("token response carries an empty access_token".into());
		}

		Ok(TokenGrant {
			access_token: TokenSecret::new(response.access_token().secret().to_owned()),
			refresh_token: response
				.refresh_token()
				.map(|token| TokenSecret::new(token.secret().to_owned())),
			expires_at,
			scope,
		})
	}

	fn classify(
		&self,
		grant: GrantType,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> Failure {
		let status = meta.as_ref().and_then(|meta| meta.status);
		let retry_after = meta.as_ref().and_then(|meta| meta.retry_after);
		let (ctx, message) = match err {
			RequestTokenError::ServerResponse(response) =>
				server_response_context(grant, status, &response),
			RequestTokenError::Request(error) => (
				ProviderErrorContext::network_failure(grant),
				format!("transport failure: {}", transport_message(&error)),
			),
			RequestTokenError::Parse(error, body) => {
				let mut ctx = ProviderErrorContext::new(grant)
					.with_body_preview(String::from_utf8_lossy(&body).into_owned());

				if let Some(status) = status {
					ctx = ctx.with_http_status(status);
				}

				(ctx, format!("token endpoint returned an unreadable response: {error}"))
			},
			RequestTokenError::Other(message) => {
				let mut ctx = ProviderErrorContext::new(grant);

				if let Some(status) = status {
					ctx = ctx.with_http_status(status);
				}

				(ctx, format!("token endpoint returned an unexpected response: {message}"))
			},
		};
		let kind = self.strategy.classify_token_error(&ctx);

		tracing::warn!(
			grant = %grant,
			status = ?status,
			kind = ?kind,
			network = ctx.network_error,
			"Token endpoint request failed."
		);

		Failure { kind, network: ctx.network_error, message, retry_after }
	}
}
impl<C> ProviderClient for OAuth2ProviderClient<C>
where
	C: TokenHttpClient,
{
	fn exchange_code<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: Option<&'a str>,
	) -> ProviderFuture<'a, TokenGrant, ExchangeError> {
		Box::pin(async move {
			let meta = ResponseMetadataSlot::default();
			let handle = self.http_client.with_metadata(meta.clone());
			let mut request =
				self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

			if let Some(verifier) = pkce_verifier {
				request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
			}
			for (name, value) in self.extra_params(GrantType::AuthorizationCode) {
				request = request.add_extra_param(name, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				let failure = self.classify(GrantType::AuthorizationCode, meta.take(), err);

				if failure.network {
					ExchangeError::Transient {
						message: failure.message,
						retry_after: failure.retry_after,
					}
				} else {
					ExchangeError::InvalidCode { reason: failure.message }
				}
			})?;

			self.grant_from(&response).map_err(|reason| ExchangeError::InvalidCode { reason })
		})
	}

	fn refresh<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> ProviderFuture<'a, TokenGrant, RefreshError> {
		Box::pin(async move {
			let meta = ResponseMetadataSlot::default();
			let handle = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&secret);

			for (name, value) in self.extra_params(GrantType::RefreshToken) {
				request = request.add_extra_param(name, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				let failure = self.classify(GrantType::RefreshToken, meta.take(), err);

				match failure.kind {
					ProviderErrorKind::InvalidGrant | ProviderErrorKind::InsufficientScope =>
						RefreshError::InvalidGrant { reason: failure.message },
					ProviderErrorKind::InvalidClient | ProviderErrorKind::Transient =>
						RefreshError::Transient {
							message: failure.message,
							retry_after: failure.retry_after,
						},
				}
			})?;

			self.grant_from(&response)
				.map_err(|message| RefreshError::Transient { message, retry_after: None })
		})
	}
}
impl<C> Debug for OAuth2ProviderClient<C>
where
	C: TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2ProviderClient")
			.field("client_id", &self.oauth_client.client_id().as_str())
			.field("token_url", &self.oauth_client.token_uri().as_str())
			.field("expiry_margin", &self.expiry_margin)
			.finish_non_exhaustive()
	}
}

struct Failure {
	kind: ProviderErrorKind,
	network: bool,
	message: String,
	retry_after: Option<Duration>,
}

fn server_response_context(
	grant: GrantType,
	status: Option<u16>,
	response: &BasicErrorResponse,
) -> (ProviderErrorContext, String) {
	let mut ctx =
		ProviderErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_owned());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = status {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) =>
			format!("provider returned {}: {description}", response.error().as_ref()),
		None => format!("provider returned {}", response.error().as_ref()),
	};

	(ctx, message)
}

fn transport_message<E>(err: &HttpClientError<E>) -> String
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => error_chain(inner.as_ref()),
		HttpClientError::Http(inner) => error_chain(inner),
		HttpClientError::Io(inner) => error_chain(inner),
		HttpClientError::Other(message) => message.clone(),
		_ => "unknown HTTP client error".into(),
	}
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
	let mut message = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());

		source = cause.source();
	}

	message
}
