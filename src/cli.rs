use crate::model::{OutputFormat, DEFAULT_PORT};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(author, version, about = "Rate-limited TLS endpoint prober", long_about = None)]
pub struct Cli {
    /// Host, host:port or URL to probe
    #[arg(short = 'H', long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// File containing inputs (one per line)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<String>,

    /// Minimum seconds between connections to the same IP address
    #[arg(long = "min-interval", default_value_t = 10)]
    pub min_interval_secs: u64,

    /// Forget addresses idle for this many seconds (default: never)
    #[arg(long = "retention", value_name = "SECS")]
    pub retention_secs: Option<u64>,

    /// PEM bundle of trusted roots (default: system roots)
    #[arg(long = "ca-file", value_name = "FILE")]
    pub ca_file: Option<PathBuf>,

    /// Port used when the host carries none
    #[arg(long = "default-port", default_value_t = DEFAULT_PORT)]
    pub default_port: u16,

    /// Concurrency limit
    #[arg(long = "concurrency", default_value_t = 16)]
    pub concurrency: usize,

    /// Overall timeout per input in milliseconds
    #[arg(long = "overall-timeout", default_value_t = 10_000)]
    pub overall_timeout_ms: u64,

    /// Output format
    #[arg(long = "output", default_value_t = OutputFormat::Jsonl)]
    pub output: OutputFormat,

    /// Human-readable output instead of JSONL
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pub pretty: bool,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<crate::model::Config> {
        if self.host.is_none() && self.input.is_none() {
            anyhow::bail!("either --host or --input is required");
        }

        if self.host.is_some() && self.input.is_some() {
            anyhow::bail!("--host and --input are mutually exclusive");
        }

        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }

        if self.default_port == 0 {
            anyhow::bail!("default port must be greater than zero");
        }

        Ok(crate::model::Config {
            host: self.host,
            input: self.input,
            concurrency: self.concurrency,
            min_interval: Duration::from_secs(self.min_interval_secs),
            retention: self.retention_secs.map(Duration::from_secs),
            ca_file: self.ca_file,
            default_port: self.default_port,
            overall_timeout: Duration::from_millis(self.overall_timeout_ms),
            output: crate::model::OutputConfig {
                format: if self.pretty {
                    OutputFormat::Pretty
                } else {
                    self.output
                },
            },
        })
    }
}
