use thiserror::Error;

/// Failures surfaced by the normalize, rate-check and probe operations.
///
/// Rate limiting is deliberately absent: an exceeded cooldown is a boolean
/// outcome of [`crate::engine::rate::RateLimiter::check`], not an error.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The raw input could not be turned into a host.
    #[error("could not parse server name {input:?}: {reason}")]
    Parse { input: String, reason: String },

    /// DNS lookup failed or returned no addresses.
    #[error("could not resolve {host}: {reason}")]
    Resolution { host: String, reason: String },

    /// TCP connection to the target failed.
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS negotiation failed for a reason other than certificate trust.
    #[error("TLS handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    /// The peer's certificate chain or name could not be verified.
    #[error("certificate verification for {addr} failed: {reason}")]
    Verification { addr: String, reason: String },

    /// The trust anchor set could not be built.
    #[error("invalid trust anchors: {0}")]
    TrustStore(String),
}

impl ProbeError {
    /// Short stage label used in diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            ProbeError::Parse { .. } => "parse",
            ProbeError::Resolution { .. } => "resolve",
            ProbeError::Dial { .. } => "dial",
            ProbeError::Handshake { .. } => "handshake",
            ProbeError::Verification { .. } => "verify",
            ProbeError::TrustStore(_) => "trust-store",
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, ProbeError::Verification { .. })
    }
}

impl From<openssl::error::ErrorStack> for ProbeError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        ProbeError::TrustStore(err.to_string())
    }
}
