//! Observability helpers shared by every manager operation.
//!
//! Each operation runs inside an `oauth2_lifecycle.flow` span carrying the `flow` and `stage`
//! fields, plus `tenant`/`user` once they are known. With the `metrics` feature enabled, the
//! `oauth2_lifecycle_flow_total` counter is incremented for every attempt/success/failure,
//! labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Manager operations observed by spans and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Building an authorization URL.
	Authorize,
	/// Completing an authorization from the provider redirect.
	Callback,
	/// Handing out a valid access token.
	AccessToken,
	/// Redeeming a refresh token.
	Refresh,
	/// Storing or reading organization API keys.
	ApiKey,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorize => "authorize",
			FlowKind::Callback => "callback",
			FlowKind::AccessToken => "access_token",
			FlowKind::Refresh => "refresh",
			FlowKind::ApiKey => "api_key",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a manager operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
