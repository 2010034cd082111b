//! Payment gateway protocol: parameter signing and redirect construction.
//!
//! The gateway speaks a signed redirect/callback protocol: outbound requests
//! are a sorted, percent-encoded query string plus an HMAC-SHA-512 signature
//! over the canonical form of the same parameters; inbound callbacks carry
//! the same signature and must be verified before any order state is trusted.

pub mod adapter;
pub mod signature;

pub use adapter::GatewayAdapter;
