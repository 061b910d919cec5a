//! Contract for the two outbound token-endpoint calls and their classified outcomes.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Boxed future returned by [`ProviderClient`] calls.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + 'a + Send>>;

/// Default amount subtracted from the provider's `expires_in`.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(300);

/// Token endpoint operations the manager depends on.
///
/// Implementations convert every transport and provider fault into [`ExchangeError`] or
/// [`RefreshError`]; no raw transport error crosses this boundary.
pub trait ProviderClient
where
	Self: Send + Sync,
{
	/// Trades an authorization code (and PKCE verifier, when one was issued) for tokens.
	fn exchange_code<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: Option<&'a str>,
	) -> ProviderFuture<'a, TokenGrant, ExchangeError>;

	/// Redeems a refresh token for a new access token.
	fn refresh<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> ProviderFuture<'a, TokenGrant, RefreshError>;
}

/// Tokens returned by a successful exchange or refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued (or rotated) one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry with the safety margin already applied.
	pub expires_at: OffsetDateTime,
	/// Scopes the provider reports as granted, when it reports them.
	pub scope: Option<ScopeSet>,
}

/// Failure while exchanging an authorization code.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ExchangeError {
	/// The provider rejected the code or answered with something that is not a token response.
	#[error("Authorization code was rejected: {reason}.")]
	InvalidCode {
		/// Provider or parser detail.
		reason: String,
	},
	/// The user or provider refused consent; the redirect carried `error=...`.
	#[error("Authorization was denied by the provider: {error}.")]
	Denied {
		/// OAuth `error` value from the redirect.
		error: String,
		/// OAuth `error_description` value, when present.
		description: Option<String>,
	},
	/// The provider could not be reached or failed temporarily.
	#[error("Token endpoint is temporarily unavailable: {message}.")]
	Transient {
		/// Summary of the failure.
		message: String,
		/// Retry-After hint, if the provider sent one.
		retry_after: Option<Duration>,
	},
}

/// Failure while redeeming a refresh token.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// The provider says the refresh token is no longer valid; re-authorization is required.
	#[error("Refresh token is no longer valid: {reason}.")]
	InvalidGrant {
		/// Provider detail.
		reason: String,
	},
	/// Retryable failure; the stored credential stays as it was.
	#[error("Token endpoint is temporarily unavailable: {message}.")]
	Transient {
		/// Summary of the failure.
		message: String,
		/// Retry-After hint, if the provider sent one.
		retry_after: Option<Duration>,
	},
}

/// Converts a relative `expires_in` into an absolute expiry, keeping `margin` in reserve.
///
/// Short lifetimes clamp the margin to half of `expires_in` so the result stays strictly after
/// `now`. Returns `None` for non-positive lifetimes and for lifetimes whose expiry falls outside
/// the representable date range.
pub fn grant_expiry(
	now: OffsetDateTime,
	expires_in: Duration,
	margin: Duration,
) -> Option<OffsetDateTime> {
	if !expires_in.is_positive() {
		return None;
	}

	let margin = match margin.checked_mul(2) {
		Some(double) if expires_in <= double => expires_in / 2,
		_ => margin.max(Duration::ZERO),
	};
	let expires_at = now.checked_add(expires_in)?.checked_sub(margin)?;

	(expires_at > now).then_some(expires_at)
}
