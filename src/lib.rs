//! Rate-limited TLS endpoint probing.
//!
//! Untrusted input goes through [`input::parse_server_name`], the resolved
//! address is checked against [`engine::rate::RateLimiter`], and only then does
//! [`probe::TlsProber`] dial the host with full certificate verification.
//! [`engine::Engine`] composes the three for a stream of inputs.

#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod error;
pub mod input;
pub mod model;
pub mod output;
pub mod probe;
pub mod util;

pub use error::ProbeError;
