//! Manager configuration: OAuth application identity plus lifecycle timings.

// self
use crate::{
	_prelude::*,
	api_key::DEFAULT_MIN_KEY_LEN,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
	provider::DEFAULT_EXPIRY_MARGIN,
};

/// Default lead time before expiry at which access tokens are refreshed.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::seconds(60);
/// Default lifetime of a pending authorization.
pub const DEFAULT_PENDING_TTL: Duration = Duration::minutes(10);
/// Default bound on a single token-endpoint request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

/// Settings shared by the manager and its provider client.
///
/// Durations are (de)serialized as whole seconds under `*_secs` keys:
///
/// ```json
/// {
///   "client_id": "my-app",
///   "client_secret": "s3cr3t",
///   "redirect_uri": "https://app.example.com/oauth/callback",
///   "scope": ["openid", "profile"],
///   "refresh_buffer_secs": 60
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; absent for public clients.
	#[serde(default)]
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
	/// Scopes requested during authorization.
	#[serde(default)]
	pub scope: ScopeSet,
	/// Tokens closer than this to expiry are refreshed before being handed out.
	#[serde(rename = "refresh_buffer_secs", with = "seconds", default = "default_refresh_buffer")]
	pub refresh_buffer: Duration,
	/// Subtracted from the provider's `expires_in` when computing `expires_at`.
	#[serde(rename = "expiry_margin_secs", with = "seconds", default = "default_expiry_margin")]
	pub expiry_margin: Duration,
	/// How long a started authorization may be completed.
	#[serde(rename = "pending_ttl_secs", with = "seconds", default = "default_pending_ttl")]
	pub pending_ttl: Duration,
	/// Bound on every token-endpoint request.
	#[serde(rename = "request_timeout_secs", with = "seconds", default = "default_request_timeout")]
	pub request_timeout: Duration,
	/// Minimum accepted length for organization API keys.
	#[serde(default = "default_api_key_min_len")]
	pub api_key_min_len: usize,
}
impl ManagerConfig {
	/// Creates a configuration with default timings.
	pub fn new(client_id: impl Into<String>, redirect_uri: Url, scope: ScopeSet) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			redirect_uri,
			scope,
			refresh_buffer: DEFAULT_REFRESH_BUFFER,
			expiry_margin: DEFAULT_EXPIRY_MARGIN,
			pending_ttl: DEFAULT_PENDING_TTL,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			api_key_min_len: DEFAULT_MIN_KEY_LEN,
		}
	}

	/// Parses and validates a JSON document; errors name the offending field.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(deserializer)?;

		config.validate()?;

		Ok(config)
	}

	/// Sets the client secret used for confidential clients.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the refresh lead time.
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer;

		self
	}

	/// Overrides the expiry safety margin.
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = margin;

		self
	}

	/// Overrides the pending authorization lifetime.
	pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
		self.pending_ttl = ttl;

		self
	}

	/// Overrides the request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the minimum API key length.
	pub fn with_api_key_min_len(mut self, min_len: usize) -> Self {
		self.api_key_min_len = min_len;

		self
	}

	/// Checks the invariants serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::InvalidSetting {
				field: "client_id",
				reason: "must not be empty",
			});
		}
		if self.refresh_buffer.is_negative() {
			return Err(ConfigError::InvalidSetting {
				field: "refresh_buffer_secs",
				reason: "must not be negative",
			});
		}
		if self.expiry_margin.is_negative() {
			return Err(ConfigError::InvalidSetting {
				field: "expiry_margin_secs",
				reason: "must not be negative",
			});
		}
		if !self.pending_ttl.is_positive() {
			return Err(ConfigError::InvalidSetting {
				field: "pending_ttl_secs",
				reason: "must be positive",
			});
		}
		if !self.request_timeout.is_positive() {
			return Err(ConfigError::InvalidSetting {
				field: "request_timeout_secs",
				reason: "must be positive",
			});
		}

		Ok(())
	}
}

fn default_refresh_buffer() -> Duration {
	DEFAULT_REFRESH_BUFFER
}

fn default_expiry_margin() -> Duration {
	DEFAULT_EXPIRY_MARGIN
}

fn default_pending_ttl() -> Duration {
	DEFAULT_PENDING_TTL
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_api_key_min_len() -> usize {
	DEFAULT_MIN_KEY_LEN
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u32::deserialize(deserializer).map(|secs| Duration::seconds(secs.into()))
	}
}
