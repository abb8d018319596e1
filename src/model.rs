use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_SCHEME: &str = "https";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: Option<String>,
    pub input: Option<String>,
    pub concurrency: usize,
    pub min_interval: Duration,
    pub retention: Option<Duration>,
    pub ca_file: Option<PathBuf>,
    pub default_port: u16,
    pub overall_timeout: Duration,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Jsonl,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Negotiated state of one verified TLS handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsState {
    pub version: String,
    pub cipher: String,
    /// Peer chain as sent by the server, leaf first.
    pub chain: Vec<PeerCertificate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PeerCertificate {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    pub sha256: String,
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl TlsState {
    pub fn leaf(&self) -> Option<&PeerCertificate> {
        self.chain.first()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub status: Status,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Diagnostics {
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    RateLimited,
    Error,
}

impl ProbeOutcome {
    pub fn failed(input: String, host: Option<String>, stage: &str, message: String) -> Self {
        ProbeOutcome {
            input,
            host,
            status: Status::Error,
            elapsed_ms: 0,
            tls: None,
            diagnostics: Some(Diagnostics {
                stage: stage.into(),
                message,
            }),
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self.status {
            Status::Ok => "ok",
            Status::RateLimited => "rate limited",
            Status::Error => "error",
        }
    }
}
