//! Credential records and the secrets they carry.

pub mod credential;
pub mod key;
pub mod secret;
