//! Provider strategy hooks that customize token requests and classify their failures.
//!
//! Implementations work on crate-owned data only, so a strategy never depends on the HTTP
//! client that carried the request.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// `augment_token_request` has a default no-op implementation; most providers only need the
/// default classification in [`DefaultProviderStrategy`].
pub trait ProviderStrategy
where
	Self: Send + Sync,
{
	/// Maps a failed token request onto the canonical error categories.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Gives providers a chance to add custom form parameters (audience, resource, ...) before
	/// the request is dispatched.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant itself (bad code, dead refresh token).
	InvalidGrant,
	/// Client authentication failed; a local misconfiguration rather than a user problem.
	InvalidClient,
	/// The requested scopes are no longer granted.
	InsufficientScope,
	/// Failure is temporary and may be retried.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for payloads that did not parse.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level failures, timeouts included.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview, truncated to a bounded number of characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy that applies RFC 6749 error codes first, then body hints, then status.
///
/// Network failures are always transient. Without a recognizable error code, only `401` is
/// treated as a client problem; every other unstructured failure is transient so that an
/// unreadable provider response never revokes a user's credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf: String = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(ProviderErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(ProviderErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(ProviderErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(401) => ProviderErrorKind::InvalidClient,
		_ => ProviderErrorKind::Transient,
	}
}
