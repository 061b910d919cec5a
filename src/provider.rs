//! Provider-facing descriptors (data), strategies (behavior), and the token-endpoint contract.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering HTTPS-only
//! endpoints, client authentication preferences, and provider quirks (PKCE requirement,
//! offline-access marker, scope delimiter). `strategy` classifies provider error payloads, and
//! `client` defines [`ProviderClient`], the two outbound calls the manager depends on.

pub mod client;
pub mod descriptor;
pub mod strategy;

pub use client::*;
pub use descriptor::*;
pub use strategy::*;
