//! Request/response shapes for an HTTP or RPC front end, plus handlers that drive a
//! [`TokenManager`] with them.
//!
//! Every request field is optional on the wire so a missing value surfaces as a classified
//! [`Error::BadRequest`] rather than a deserialization failure. Failures render as
//! [`ErrorResponse`], whose [`ErrorResponse::http_status`] tells the transport which status to use.

// self
use crate::{
	_prelude::*,
	api_key::ApiKeyError,
	auth::{TenantId, UserId},
	error::ErrorKind,
	flows::TokenManager,
	provider::ExchangeError,
};

/// Body of a start-authorization call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAuthorizationRequest {
	/// Tenant to authorize.
	#[serde(default)]
	pub tenant_id: Option<String>,
	/// User to authorize.
	#[serde(default)]
	pub user_id: Option<String>,
}

/// Reply to [`StartAuthorizationRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationStarted {
	/// URL the user's browser must visit.
	pub authorization_url: Url,
	/// Seconds until the authorization can no longer be completed.
	pub expires_in_seconds: i64,
}

/// Query parameters of the provider redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteAuthorizationRequest {
	/// Authorization code issued by the provider.
	#[serde(default)]
	pub code: Option<String>,
	/// State value echoed by the provider.
	#[serde(default)]
	pub state: Option<String>,
	/// OAuth error code when the user or provider refused.
	#[serde(default)]
	pub error: Option<String>,
	/// Human-readable companion to `error`.
	#[serde(default)]
	pub error_description: Option<String>,
}

/// Reply to [`CompleteAuthorizationRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCompleted {
	/// Tenant the credential was stored for.
	pub tenant_id: String,
	/// User the credential was stored for.
	pub user_id: String,
}

/// Body of a get-valid-access-token call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
	/// Tenant owning the credential.
	#[serde(default)]
	pub tenant_id: Option<String>,
	/// User owning the credential.
	#[serde(default)]
	pub user_id: Option<String>,
}

/// Reply to [`AccessTokenRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
	/// Bearer token value.
	pub access_token: String,
	/// Expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}

/// Body of a store-org-API-key call.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOrgApiKeyRequest {
	/// Tenant the key belongs to.
	#[serde(default)]
	pub tenant_id: Option<String>,
	/// Key material.
	#[serde(default)]
	pub api_key: Option<String>,
}
impl Debug for StoreOrgApiKeyRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StoreOrgApiKeyRequest")
			.field("tenant_id", &self.tenant_id)
			.field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Reply to [`StoreOrgApiKeyRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyStored {
	/// Confirmation text.
	pub message: String,
}

/// Body of an org-API-key lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgApiKeyLookupRequest {
	/// Tenant to look up.
	#[serde(default)]
	pub tenant_id: Option<String>,
}

/// Reply to [`OrgApiKeyLookupRequest`]; never carries the key itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgApiKeyStatus {
	/// Tenant that was looked up.
	pub tenant_id: String,
	/// Whether a key is stored.
	pub configured: bool,
	/// Instant the key was stored.
	#[serde(with = "time::serde::rfc3339")]
	pub stored_at: OffsetDateTime,
}

/// Uniform failure body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable classification label.
	pub kind: ErrorKind,
	/// Human-readable summary; internal failures are not detailed.
	pub message: String,
	/// What the caller should do next.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub remediation: Option<String>,
}
impl ErrorResponse {
	/// Suggested HTTP status code.
	pub fn http_status(&self) -> u16 {
		self.kind.http_status()
	}
}
impl From<&Error> for ErrorResponse {
	fn from(error: &Error) -> Self {
		let kind = error.kind();
		let message = match error {
			Error::ExchangeFailed(inner) => inner.to_string(),
			Error::Storage(_) | Error::Config(_) => "Internal error.".into(),
			_ => error.to_string(),
		};

		Self { kind, message, remediation: kind.remediation().map(Into::into) }
	}
}
impl From<Error> for ErrorResponse {
	fn from(error: Error) -> Self {
		Self::from(&error)
	}
}

/// Handles [`StartAuthorizationRequest`].
pub async fn start_authorization(
	manager: &TokenManager,
	request: StartAuthorizationRequest,
) -> Result<AuthorizationStarted> {
	let tenant = TenantId::new(required("tenant_id", request.tenant_id)?)?;
	let user = UserId::new(required("user_id", request.user_id)?)?;
	let session = manager.start_authorization(&tenant, &user).await?;

	Ok(AuthorizationStarted {
		authorization_url: session.authorize_url,
		expires_in_seconds: manager.config().pending_ttl.whole_seconds(),
	})
}

/// Handles [`CompleteAuthorizationRequest`].
///
/// A redirect carrying `error` discards the pending authorization and fails with
/// [`ExchangeError::Denied`].
pub async fn complete_authorization(
	manager: &TokenManager,
	request: CompleteAuthorizationRequest,
) -> Result<AuthorizationCompleted> {
	if let Some(error) = request.error {
		if let Some(state) = request.state.as_deref()
			&& let Err(e) = manager.cancel_authorization(state)
		{
			tracing::debug!(error = %e, "Denied redirect did not match a pending authorization.");
		}

		return Err(ExchangeError::Denied { error, description: request.error_description }.into());
	}

	let code = required("code", request.code)?;
	let state = required("state", request.state)?;
	let key = manager.complete_authorization(&code, &state).await?;

	Ok(AuthorizationCompleted { tenant_id: key.tenant.into(), user_id: key.user.into() })
}

/// Handles [`AccessTokenRequest`].
pub async fn access_token(
	manager: &TokenManager,
	request: AccessTokenRequest,
) -> Result<AccessTokenResponse> {
	let tenant = TenantId::new(required("tenant_id", request.tenant_id)?)?;
	let user = UserId::new(required("user_id", request.user_id)?)?;
	let token = manager.valid_access_token(&tenant, &user).await?;

	Ok(AccessTokenResponse {
		access_token: token.access_token.expose().to_owned(),
		expires_at: token.expires_at,
	})
}

/// Handles [`StoreOrgApiKeyRequest`]. A missing key is reported as [`ApiKeyError::Empty`].
pub async fn store_org_api_key(
	manager: &TokenManager,
	request: StoreOrgApiKeyRequest,
) -> Result<ApiKeyStored> {
	let tenant = TenantId::new(required("tenant_id", request.tenant_id)?)?;
	let key = request.api_key.ok_or(ApiKeyError::Empty)?;

	manager.store_org_api_key(&tenant, &key).await?;

	Ok(ApiKeyStored { message: "API key stored successfully.".into() })
}

/// Handles [`OrgApiKeyLookupRequest`]; fails with [`Error::SetupIncomplete`] when no key exists.
pub async fn org_api_key_status(
	manager: &TokenManager,
	request: OrgApiKeyLookupRequest,
) -> Result<OrgApiKeyStatus> {
	let tenant = TenantId::new(required("tenant_id", request.tenant_id)?)?;
	let key = manager.org_api_key(&tenant).await?;

	Ok(OrgApiKeyStatus { tenant_id: tenant.into(), configured: true, stored_at: key.stored_at })
}

fn required(field: &'static str, value: Option<String>) -> Result<String> {
	match value {
		Some(value) if !value.trim().is_empty() => Ok(value),
		_ => Err(Error::bad_request(format!("`{field}` is required"))),
	}
}
