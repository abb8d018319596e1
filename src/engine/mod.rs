pub mod rate;

use crate::input::parse_server_name;
use crate::model::{Config, ProbeOutcome, Status};
use crate::output::OutputSink;
use crate::probe::{TlsProber, TrustAnchors};
use crate::util::now_millis;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rate::RateLimiter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Counts of outcomes emitted by one [`Engine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub rate_limited: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::RateLimited => self.rate_limited += 1,
            Status::Error => self.failed += 1,
        }
    }
}

pub struct Engine {
    cfg: Config,
    sink: OutputSink,
    limiter: RateLimiter,
    prober: Arc<TlsProber>,
    sem: Arc<Semaphore>,
}

impl Engine {
    pub fn new(cfg: Config, anchors: &TrustAnchors, sink: OutputSink) -> anyhow::Result<Self> {
        let mut limiter = RateLimiter::new(cfg.min_interval);
        if let Some(retention) = cfg.retention {
            limiter = limiter.with_retention(retention);
        }
        let prober = TlsProber::new(anchors)?.with_default_port(cfg.default_port);
        Ok(Self::with_parts(cfg, sink, limiter, prober))
    }

    /// Builds an engine around an existing limiter, e.g. one shared with
    /// other callers in the same process.
    pub fn with_parts(
        cfg: Config,
        sink: OutputSink,
        limiter: RateLimiter,
        prober: TlsProber,
    ) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(cfg.concurrency.max(1))),
            prober: Arc::new(prober),
            limiter,
            cfg,
            sink,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&mut self) -> anyhow::Result<RunSummary> {
        let mut stream = crate::input::stream_inputs(&self.cfg).await?;
        let mut tasks = FuturesUnordered::new();

        while let Some(input) = stream.next().await {
            let permit = self.sem.clone().acquire_owned().await?;
            let limiter = self.limiter.clone();
            let prober = self.prober.clone();
            let sink = self.sink.clone();
            let deadline = self.cfg.overall_timeout;
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let pipeline = process_input(input.clone(), &limiter, &prober);
                let outcome = match timeout(deadline, pipeline).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        ProbeOutcome::failed(input, None, "timeout", "overall timeout".into())
                    }
                };
                let status = outcome.status;
                if let Err(err) = sink.emit(outcome).await {
                    warn!(error = %err, "failed to emit outcome");
                }
                status
            }));
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.next().await {
            summary.record(joined?);
        }
        Ok(summary)
    }
}

/// Runs normalize, rate-check and probe for one raw input, in that order.
///
/// The probe is only attempted once the cooldown for the resolved address has
/// passed; every failure short-circuits with its stage recorded.
pub async fn process_input(
    input: String,
    limiter: &RateLimiter,
    prober: &TlsProber,
) -> ProbeOutcome {
    let start = now_millis();

    let host = match parse_server_name(&input) {
        Ok(host) => host,
        Err(err) => return ProbeOutcome::failed(input, None, err.stage(), err.to_string()),
    };

    let mut outcome = match limiter.check(&host).await {
        Ok(true) => ProbeOutcome {
            input,
            host: Some(host),
            status: Status::RateLimited,
            elapsed_ms: 0,
            tls: None,
            diagnostics: None,
        },
        Ok(false) => match prober.probe(&host).await {
            Ok(state) => ProbeOutcome {
                input,
                host: Some(host),
                status: Status::Ok,
                elapsed_ms: 0,
                tls: Some(state),
                diagnostics: None,
            },
            Err(err) => ProbeOutcome::failed(input, Some(host), err.stage(), err.to_string()),
        },
        Err(err) => ProbeOutcome::failed(input, Some(host), err.stage(), err.to_string()),
    };

    outcome.elapsed_ms = now_millis() - start;
    debug!(
        input = %outcome.input,
        status = outcome.status_text(),
        ms = outcome.elapsed_ms,
        "processed input"
    );
    outcome
}
