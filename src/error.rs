//! Crate-level error taxonomy shared by the manager, stores, and provider clients.
//!
//! Every failure a consumer can observe is one of the classified [`Error`] variants; provider and
//! transport faults are converted at the provider-client boundary so none of them leak through
//! unclassified. [`ErrorKind`] gives the transport layer a stable label and remediation hint.

// self
use crate::{
	_prelude::*,
	api_key::ApiKeyError,
	auth::{IdentifierError, ScopeValidationError},
	provider::{ExchangeError, ProviderDescriptorError},
	state::DecodeError,
	store::StoreError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller-supplied input is missing or malformed.
	#[error("Bad request: {reason}.")]
	BadRequest {
		/// What was wrong with the input.
		reason: String,
	},
	/// The `state` value is malformed, unknown, already used, or expired.
	#[error("Authorization state is invalid: {reason}.")]
	InvalidState {
		/// Why the state was rejected.
		reason: String,
	},
	/// The provider refused to exchange the authorization code.
	#[error("Authorization code exchange failed.")]
	ExchangeFailed(#[from] ExchangeError),
	/// No usable credential exists for the tenant/user pair.
	#[error("No usable credential: {reason}.")]
	NotAuthorized {
		/// Internal classification kept for audit.
		reason: NotAuthorizedReason,
	},
	/// The provider could not be reached or answered with a retryable failure.
	#[error("Provider is temporarily unavailable: {message}.")]
	TemporarilyUnavailable {
		/// Summary of the upstream failure.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The organization API key failed validation.
	#[error(transparent)]
	InvalidKey(#[from] ApiKeyError),
	/// The tenant has not stored an organization API key yet.
	#[error("No API key has been stored for tenant {tenant}.")]
	SetupIncomplete {
		/// Tenant that has no key.
		tenant: String,
	},
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns the classified kind for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::BadRequest { .. } => ErrorKind::BadRequest,
			Self::InvalidState { .. } => ErrorKind::InvalidState,
			Self::ExchangeFailed(_) => ErrorKind::ExchangeFailed,
			Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
			Self::TemporarilyUnavailable { .. } => ErrorKind::TemporarilyUnavailable,
			Self::InvalidKey(_) => ErrorKind::InvalidKey,
			Self::SetupIncomplete { .. } => ErrorKind::SetupIncomplete,
			Self::Storage(_) | Self::Config(_) => ErrorKind::Internal,
		}
	}

	pub(crate) fn bad_request(reason: impl Into<String>) -> Self {
		Self::BadRequest { reason: reason.into() }
	}

	pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
		Self::InvalidState { reason: reason.into() }
	}
}
impl From<IdentifierError> for Error {
	fn from(e: IdentifierError) -> Self {
		Self::bad_request(e.to_string().trim_end_matches('.'))
	}
}
impl From<DecodeError> for Error {
	fn from(e: DecodeError) -> Self {
		Self::invalid_state(e.to_string().trim_end_matches('.'))
	}
}

/// Why a caller could not be handed an access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotAuthorizedReason {
	/// No credential was ever stored for the pair.
	NoCredential,
	/// The provider invalidated the refresh token.
	Revoked,
	/// The access token expired and no refresh token is available.
	MissingRefreshToken,
}
impl Display for NotAuthorizedReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::NoCredential => "no credential has been authorized",
			Self::Revoked => "the credential was revoked by the provider",
			Self::MissingRefreshToken => "the access token expired and cannot be refreshed",
		})
	}
}

/// Stable failure classification surfaced to transports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// See [`Error::BadRequest`].
	BadRequest,
	/// See [`Error::InvalidState`].
	InvalidState,
	/// See [`Error::ExchangeFailed`].
	ExchangeFailed,
	/// See [`Error::NotAuthorized`].
	NotAuthorized,
	/// See [`Error::TemporarilyUnavailable`].
	TemporarilyUnavailable,
	/// See [`Error::InvalidKey`].
	InvalidKey,
	/// See [`Error::SetupIncomplete`].
	SetupIncomplete,
	/// Storage or configuration failure.
	Internal,
}
impl ErrorKind {
	/// Returns a stable label suitable for response bodies and log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BadRequest => "bad_request",
			Self::InvalidState => "invalid_state",
			Self::ExchangeFailed => "exchange_failed",
			Self::NotAuthorized => "not_authorized",
			Self::TemporarilyUnavailable => "temporarily_unavailable",
			Self::InvalidKey => "invalid_key",
			Self::SetupIncomplete => "setup_incomplete",
			Self::Internal => "internal",
		}
	}

	/// Returns the action a caller should take, when one exists.
	pub const fn remediation(self) -> Option<&'static str> {
		match self {
			Self::BadRequest => Some("Fix the request parameters and try again."),
			Self::InvalidState | Self::ExchangeFailed | Self::NotAuthorized =>
				Some("Call start-authorization again."),
			Self::TemporarilyUnavailable =>
				Some("Retry get-valid-access-token later; re-authorization is not required."),
			Self::InvalidKey => Some("Provide a valid API key."),
			Self::SetupIncomplete => Some("Store an API key for this organization first."),
			Self::Internal => None,
		}
	}

	/// Suggested HTTP status for transports that speak HTTP.
	pub const fn http_status(self) -> u16 {
		match self {
			Self::BadRequest => 400,
			Self::InvalidState | Self::ExchangeFailed | Self::NotAuthorized | Self::InvalidKey =>
				401,
			Self::SetupIncomplete => 404,
			Self::TemporarilyUnavailable => 503,
			Self::Internal => 500,
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Configured scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
	/// A configuration value is outside its accepted range.
	#[error("Configuration field `{field}` {reason}.")]
	InvalidSetting {
		/// Field name as it appears in the configuration document.
		field: &'static str,
		/// Constraint that was violated.
		reason: &'static str,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration is invalid at `{path}`: {message}.")]
	Parse {
		/// Path to the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { path: e.path().to_string(), message: e.inner().to_string() }
	}
}
