use crate::model::{OutputConfig, OutputFormat, ProbeOutcome};
use std::io::{BufWriter, Write};
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct OutputSink {
    inner: std::sync::Arc<OutputInner>,
}

struct OutputInner {
    tx: tokio::sync::Mutex<Option<mpsc::Sender<ProbeOutcome>>>,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl OutputSink {
    /// Spawns the writer thread that renders outcomes to stdout.
    pub fn new(cfg: OutputConfig) -> anyhow::Result<Self> {
        Ok(Self::with_writer(cfg, std::io::stdout()))
    }

    pub fn with_writer<W>(cfg: OutputConfig, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1024);
        let handle = tokio::task::spawn_blocking(move || run_writer(cfg, writer, rx));

        Self {
            inner: std::sync::Arc::new(OutputInner {
                tx: tokio::sync::Mutex::new(Some(tx)),
                handle: tokio::sync::Mutex::new(Some(handle)),
            }),
        }
    }

    pub async fn emit(&self, outcome: ProbeOutcome) -> anyhow::Result<()> {
        let guard = self.inner.tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(outcome)
                .await
                .map_err(|err| anyhow::anyhow!("output worker not available: {err}"))?
        } else {
            anyhow::bail!("output worker not available; dropping probe outcome");
        }
        Ok(())
    }

    /// Closes the channel and waits for buffered outcomes to be written.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.inner.tx.lock().await.take();

        if let Some(handle) = self.inner.handle.lock().await.take() {
            handle
                .await
                .map_err(|err| anyhow::anyhow!("failed to join output worker: {err}"))?;
        }

        Ok(())
    }
}

fn run_writer<W: Write>(cfg: OutputConfig, writer: W, mut rx: mpsc::Receiver<ProbeOutcome>) {
    let mut writer = BufWriter::new(writer);

    while let Some(outcome) = rx.blocking_recv() {
        if let Err(err) = write_outcome(&cfg, &mut writer, &outcome) {
            tracing::error!(error = %err, "failed to write probe outcome");
        }
    }

    let _ = writer.flush();
}

fn write_outcome<W: Write>(
    cfg: &OutputConfig,
    writer: &mut W,
    outcome: &ProbeOutcome,
) -> anyhow::Result<()> {
    match cfg.format {
        OutputFormat::Jsonl => {
            let line = serde_json::to_string(outcome)?;
            writeln!(writer, "{line}")?;
        }
        OutputFormat::Pretty => {
            writeln!(
                writer,
                "{} -> {} ({} ms)",
                outcome.input,
                outcome.status_text(),
                outcome.elapsed_ms
            )?;
            if let Some(host) = &outcome.host {
                writeln!(writer, "  host: {host}")?;
            }
            if let Some(tls) = &outcome.tls {
                writeln!(writer, "  tls: {} {}", tls.version, tls.cipher)?;
                for (depth, cert) in tls.chain.iter().enumerate() {
                    writeln!(writer, "  cert[{depth}]: {}", cert.subject)?;
                    writeln!(writer, "    issuer: {}", cert.issuer)?;
                    writeln!(writer, "    valid: {} .. {}", cert.not_before, cert.not_after)?;
                    writeln!(writer, "    sha256: {}", cert.sha256)?;
                }
            }
            if let Some(diag) = &outcome.diagnostics {
                writeln!(writer, "  diagnostics: [{}] {}", diag.stage, diag.message)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
