//! Redirect `state` codec binding (tenant, user) to a random nonce.
//!
//! Layout: `base64url(tenant) "." base64url(user) "." nonce`. The URL-safe base64 alphabet never
//! produces `.` and the nonce is alphanumeric, so splitting on `.` is unambiguous no matter what
//! characters the identifiers contain, and the whole value survives a query string unescaped.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{TenantId, UserId},
};

/// Length of the random nonce appended to every state value.
pub const NONCE_LEN: usize = 32;

const SEPARATOR: char = '.';

/// Failure to parse a `state` value.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DecodeError {
	/// The value is not something [`StateCodec::encode`] could have produced.
	#[error("Malformed state: {reason}.")]
	Malformed {
		/// Which structural check failed.
		reason: &'static str,
	},
}

/// Identity recovered from a `state` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateClaims {
	/// Tenant that started the authorization.
	pub tenant: TenantId,
	/// User that started the authorization.
	pub user: UserId,
	/// Random nonce making the value unguessable.
	pub nonce: String,
}

/// Encodes and decodes redirect `state` values.
#[derive(Clone, Copy, Debug, Default)]
pub struct StateCodec;
impl StateCodec {
	/// Builds a fresh state value with a cryptographically random nonce.
	pub fn encode(&self, tenant: &TenantId, user: &UserId) -> String {
		let nonce: String =
			rand::rng().sample_iter(Alphanumeric).take(NONCE_LEN).map(char::from).collect();

		self.encode_with_nonce(tenant, user, &nonce)
	}

	fn encode_with_nonce(&self, tenant: &TenantId, user: &UserId, nonce: &str) -> String {
		let mut state = URL_SAFE_NO_PAD.encode(tenant.as_bytes());

		state.push(SEPARATOR);
		state.push_str(&URL_SAFE_NO_PAD.encode(user.as_bytes()));
		state.push(SEPARATOR);
		state.push_str(nonce);

		state
	}

	/// Recovers the identity bound into `state`; the exact inverse of [`encode`](Self::encode).
	pub fn decode(&self, state: &str) -> Result<StateClaims, DecodeError> {
		let mut parts = state.split(SEPARATOR);
		let (Some(tenant), Some(user), Some(nonce), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(DecodeError::Malformed { reason: "expected three segments" });
		};

		if nonce.len() != NONCE_LEN || !nonce.bytes().all(|b| b.is_ascii_alphanumeric()) {
			return Err(DecodeError::Malformed { reason: "nonce is not valid" });
		}

		let tenant = TenantId::new(decode_segment(tenant)?)
			.map_err(|_| DecodeError::Malformed { reason: "tenant segment is not a valid id" })?;
		let user = UserId::new(decode_segment(user)?)
			.map_err(|_| DecodeError::Malformed { reason: "user segment is not a valid id" })?;

		Ok(StateClaims { tenant, user, nonce: nonce.to_owned() })
	}
}

fn decode_segment(segment: &str) -> Result<String, DecodeError> {
	let bytes = URL_SAFE_NO_PAD
		.decode(segment)
		.map_err(|_| DecodeError::Malformed { reason: "segment is not base64url" })?;

	String::from_utf8(bytes).map_err(|_| DecodeError::Malformed { reason: "segment is not UTF-8" })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ids(tenant: &str, user: &str) -> (TenantId, UserId) {
		(
			TenantId::new(tenant).expect("Tenant fixture should be valid."),
			UserId::new(user).expect("User fixture should be valid."),
		)
	}

	#[test]
	fn round_trips_ids_containing_separators() {
		let codec = StateCodec;

		for (tenant, user) in [
			("orgA", "u1"),
			("org_A", "user_1_2"),
			("org.A", "u.s.e.r"),
			("b3JnQQ", "dTE.dTE"),
			("org/A:1", "üser@example.com"),
		] {
			let (tenant, user) = ids(tenant, user);
			let state = codec.encode(&tenant, &user);
			let claims = codec.decode(&state).expect("Encoded state should decode.");

			assert_eq!(claims.tenant, tenant);
			assert_eq!(claims.user, user);
			assert_eq!(claims.nonce.len(), NONCE_LEN);
			assert_eq!(state.matches(SEPARATOR).count(), 2);
		}
	}

	#[test]
	fn nonces_differ_between_calls() {
		let (tenant, user) = ids("orgA", "u1");
		let codec = StateCodec;

		assert_ne!(codec.encode(&tenant, &user), codec.encode(&tenant, &user));
	}

	#[test]
	fn encoding_is_deterministic_for_a_fixed_nonce() {
		let (tenant, user) = ids("orgA", "u1");
		let nonce = "a".repeat(NONCE_LEN);

		assert_eq!(StateCodec.encode_with_nonce(&tenant, &user, &nonce), format!("b3JnQQ.dTE.{nonce}"));
	}

	#[test]
	fn rejects_structural_damage() {
		let codec = StateCodec;
		let nonce = "N".repeat(NONCE_LEN);

		for state in [
			String::new(),
			"orgA_u1_nonce".to_owned(),
			format!("b3JnQQ.dTE"),
			format!("b3JnQQ.dTE.{nonce}.extra"),
			format!("b3JnQQ.dTE.short"),
			format!("b3JnQQ.dTE.{}", "!".repeat(NONCE_LEN)),
			format!("b3Jn*Q.dTE.{nonce}"),
			format!(".dTE.{nonce}"),
			format!("{}.dTE.{nonce}", URL_SAFE_NO_PAD.encode([0xff, 0xfe])),
			format!("{}.dTE.{nonce}", URL_SAFE_NO_PAD.encode("with space")),
		] {
			assert!(
				matches!(codec.decode(&state), Err(DecodeError::Malformed { .. })),
				"State `{state}` should be rejected."
			);
		}
	}
}
