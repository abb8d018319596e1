use super::TrustAnchors;
use crate::error::ProbeError;
use crate::model::{PeerCertificate, TlsState, DEFAULT_PORT};
use crate::util::{hex::to_hex, split_host_port, with_default_port};
use openssl::hash::MessageDigest;
use openssl::ssl::{SslConnector, SslMethod, SslRef, SslVerifyMode};
use openssl::x509::{X509NameRef, X509Ref, X509VerifyResult};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::{debug, instrument};

/// Dials TLS endpoints and reports the verified connection state.
///
/// Peer verification is always on: the chain must lead to one of the
/// [`TrustAnchors`] given at construction and the certificate must match the
/// host name (or IP) being probed.
pub struct TlsProber {
    connector: SslConnector,
    default_port: u16,
}

impl TlsProber {
    pub fn new(anchors: &TrustAnchors) -> Result<Self, ProbeError> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        builder.set_verify(SslVerifyMode::PEER);
        builder.set_cert_store(anchors.build_store()?);
        Ok(Self {
            connector: builder.build(),
            default_port: DEFAULT_PORT,
        })
    }

    /// Port appended to hosts that do not carry one.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Connects to `host`, completes a verified handshake and returns the
    /// negotiated state. The connection is closed before returning.
    #[instrument(skip(self), fields(default_port = self.default_port))]
    pub async fn probe(&self, host: &str) -> Result<TlsState, ProbeError> {
        let addr = with_default_port(host, self.default_port);
        debug!(target = %addr, "connecting");

        let tcp = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| ProbeError::Dial {
                addr: addr.clone(),
                source,
            })?;

        let (name, _) = split_host_port(&addr);
        let ssl = self
            .connector
            .configure()
            .and_then(|cfg| cfg.into_ssl(name))
            .map_err(|err| ProbeError::Handshake {
                addr: addr.clone(),
                reason: err.to_string(),
            })?;

        let mut stream = SslStream::new(ssl, tcp).map_err(|err| ProbeError::Handshake {
            addr: addr.clone(),
            reason: err.to_string(),
        })?;

        if let Err(err) = Pin::new(&mut stream).connect().await {
            return Err(classify_failure(&addr, stream.ssl(), &err));
        }

        let state = capture_state(stream.ssl());
        debug!(
            target = %addr,
            version = %state.version,
            cipher = %state.cipher,
            "handshake complete"
        );

        if let Err(err) = stream.shutdown().await {
            debug!(target = %addr, error = %err, "TLS shutdown failed");
        }

        Ok(state)
    }
}

fn classify_failure(addr: &str, ssl: &SslRef, err: &openssl::ssl::Error) -> ProbeError {
    let verify = ssl.verify_result();
    if verify != X509VerifyResult::OK {
        return ProbeError::Verification {
            addr: addr.to_string(),
            reason: verify.error_string().to_string(),
        };
    }

    ProbeError::Handshake {
        addr: addr.to_string(),
        reason: err.to_string(),
    }
}

fn capture_state(ssl: &SslRef) -> TlsState {
    let chain = match ssl.peer_cert_chain() {
        Some(stack) => stack.iter().map(describe_certificate).collect(),
        None => ssl
            .peer_certificate()
            .map(|cert| vec![describe_certificate(&cert)])
            .unwrap_or_default(),
    };

    TlsState {
        version: ssl.version_str().to_string(),
        cipher: ssl
            .current_cipher()
            .map(|cipher| cipher.name().to_string())
            .unwrap_or_default(),
        chain,
    }
}

fn describe_certificate(cert: &X509Ref) -> PeerCertificate {
    PeerCertificate {
        subject: format_x509_name(cert.subject_name()),
        issuer: format_x509_name(cert.issuer_name()),
        serial: cert
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str())
            .map(|hex| hex.to_string())
            .unwrap_or_default(),
        not_before: cert.not_before().to_string(),
        not_after: cert.not_after().to_string(),
        sha256: cert
            .digest(MessageDigest::sha256())
            .map(|digest| to_hex(&digest, ":"))
            .unwrap_or_default(),
        der: cert.to_der().unwrap_or_default(),
    }
}

fn format_x509_name(name: &X509NameRef) -> String {
    let mut parts = Vec::new();
    for entry in name.entries() {
        let key = entry.object().nid().short_name().unwrap_or("UNKNOWN");
        let value = entry
            .data()
            .as_utf8()
            .map(|val| val.to_string())
            .unwrap_or_default();
        if !value.is_empty() {
            parts.push(format!("{key}={value}"));
        }
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::x509::X509NameBuilder;

    #[test]
    fn formats_distinguished_names() {
        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_text("C", "US").unwrap();
        builder.append_entry_by_text("O", "Example Org").unwrap();
        builder.append_entry_by_text("CN", "example.com").unwrap();
        let name = builder.build();

        assert_eq!(
            format_x509_name(&name),
            "C=US, O=Example Org, CN=example.com"
        );
    }

    #[test]
    fn default_port_can_be_overridden() {
        let prober = TlsProber::new(&TrustAnchors::empty()).unwrap();
        assert_eq!(prober.default_port(), 443);
        assert_eq!(prober.with_default_port(8443).default_port(), 8443);
    }

    #[tokio::test]
    async fn refused_connection_is_a_dial_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = TlsProber::new(&TrustAnchors::empty()).unwrap();
        let err = prober.probe(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Dial { .. }), "{err}");
    }
}
