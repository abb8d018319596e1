use crate::error::ProbeError;
use crate::model::DEFAULT_SCHEME;
use anyhow::Context;
use regex::Regex;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

fn scheme_re() -> &'static Regex {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("static regex"))
}

/// Reduces free-form user input to a bare `host[:port]`.
///
/// Inputs without a `scheme://` prefix get `https://` prepended so that
/// `example.com` parses as an authority instead of a path. Anything after the
/// authority (path, query, fragment) and any userinfo is dropped. The
/// authority is returned as written: the host keeps its case and an explicit
/// port is kept even when it is the scheme's default.
pub fn parse_server_name(input: &str) -> Result<String, ProbeError> {
    let trimmed = input.trim();
    let candidate = if scheme_re().is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}://{trimmed}")
    };

    tracing::debug!(input = %trimmed, url = %candidate, "parsing server name");

    let url = Url::parse(&candidate).map_err(|err| ProbeError::Parse {
        input: input.to_string(),
        reason: err.to_string(),
    })?;

    let authority = match url.host_str() {
        Some(h) if !h.is_empty() => raw_authority(&candidate),
        _ => "",
    };
    if authority.is_empty() {
        return Err(ProbeError::Parse {
            input: input.to_string(),
            reason: "empty host".into(),
        });
    }

    Ok(authority.to_string())
}

/// The `host[:port]` text between `://` and the first `/`, `?` or `#`,
/// without userinfo.
fn raw_authority(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host)
}

/// Streams raw inputs from `--host` and/or an input file.
///
/// The input file is opened before the stream is returned, so a missing or
/// unreadable file fails the run instead of yielding nothing.
pub async fn stream_inputs(
    cfg: &crate::model::Config,
) -> anyhow::Result<ReceiverStream<String>> {
    let (tx, rx) = mpsc::channel(256);

    if let Some(host) = cfg.host.clone() {
        let tx = tx.clone();
        tokio::spawn(async move {
            tx.send(host).await.ok();
        });
    }

    if let Some(path) = cfg.input.as_deref() {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("cannot open input {}", path))?;
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(err) = read_file(file, tx).await {
                tracing::error!(error = %err, "failed to read input file");
            }
        });
    }

    drop(tx);
    Ok(ReceiverStream::new(rx))
}

async fn read_file(file: tokio::fs::File, tx: mpsc::Sender<String>) -> anyhow::Result<()> {
    let mut reader = BufReader::new(file).lines();
    while let Some(line) = reader.next_line().await? {
        if let Some(entry) = input_line(&line) {
            if tx.send(entry.to_string()).await.is_err() {
                break;
            }
        }
    }
    Ok(())
}

fn input_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(trimmed)
}
