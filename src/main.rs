use anyhow::Context;
use clap::Parser;
use tls_prober::cli::Cli;
use tls_prober::engine::Engine;
use tls_prober::output::OutputSink;
use tls_prober::probe::TrustAnchors;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = cli.into_config()?;

    let anchors = match &cfg.ca_file {
        Some(path) => TrustAnchors::from_pem_file(path)
            .with_context(|| format!("failed to load trust anchors from {}", path.display()))?,
        None => TrustAnchors::system(),
    };

    let sink = OutputSink::new(cfg.output.clone())?;
    let mut engine = Engine::new(cfg, &anchors, sink.clone())?;
    let summary = engine.run().await?;
    sink.shutdown().await?;

    tracing::info!(
        ok = summary.ok,
        rate_limited = summary.rate_limited,
        failed = summary.failed,
        "probe run finished"
    );
    Ok(())
}
