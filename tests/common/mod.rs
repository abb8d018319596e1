#![allow(dead_code)]

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{Ssl, SslAcceptor, SslMethod};
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509NameRef, X509};
use std::io::Write;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_openssl::SslStream;

pub struct Issued {
    pub cert: X509,
    pub key: PKey<Private>,
}

fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(cn: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("O", "tls-prober tests").unwrap();
    builder.append_entry_by_text("CN", cn).unwrap();
    builder.build()
}

fn serial(n: u32) -> Asn1Integer {
    BigNum::from_u32(n).unwrap().to_asn1_integer().unwrap()
}

fn validity(builder: &mut X509Builder) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    builder
        .set_not_before(&Asn1Time::from_unix(now - 3600).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(now + 30 * 86400).unwrap())
        .unwrap();
}

pub fn ca(cn: &str) -> Issued {
    let key = ec_key();
    let subject = name(cn);
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial(1)).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    validity(&mut builder);
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    Issued {
        cert: builder.build(),
        key,
    }
}

/// Server certificate signed by `issuer`, valid for the given DNS names and
/// IP addresses.
pub fn leaf(issuer: &Issued, dns: &[&str], ips: &[&str]) -> Issued {
    let key = ec_key();
    let cert = server_cert(
        &key,
        issuer.cert.subject_name(),
        &issuer.key,
        Some(&issuer.cert),
        dns,
        ips,
    );
    Issued { cert, key }
}

/// Server certificate that is its own issuer.
pub fn self_signed(dns: &[&str], ips: &[&str]) -> Issued {
    let key = ec_key();
    let subject = name(dns.first().copied().unwrap_or("server"));
    let cert = server_cert(&key, &subject, &key, None, dns, ips);
    Issued { cert, key }
}

fn server_cert(
    key: &PKey<Private>,
    issuer_name: &X509NameRef,
    signer: &PKey<Private>,
    issuer_cert: Option<&X509>,
    dns: &[&str],
    ips: &[&str],
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial(2)).unwrap();
    builder
        .set_subject_name(&name(dns.first().copied().unwrap_or("server")))
        .unwrap();
    builder.set_issuer_name(issuer_name).unwrap();
    builder.set_pubkey(key).unwrap();
    validity(&mut builder);
    builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder
        .append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
        .unwrap();

    let mut san = SubjectAlternativeName::new();
    for dns_name in dns {
        san.dns(dns_name);
    }
    for ip in ips {
        san.ip(ip);
    }
    let san = san
        .build(&builder.x509v3_context(issuer_cert.map(|c| &**c), None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Accepts TLS connections on an ephemeral loopback port until the test
/// runtime shuts down.
pub async fn spawn_tls_server(server: &Issued, chain: &[X509]) -> SocketAddr {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
    acceptor.set_private_key(&server.key).unwrap();
    acceptor.set_certificate(&server.cert).unwrap();
    for extra in chain {
        acceptor.add_extra_chain_cert(extra.clone()).unwrap();
    }
    acceptor.check_private_key().unwrap();
    let acceptor = Arc::new(acceptor.build());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let ssl = Ssl::new(acceptor.context()).unwrap();
                let mut stream = SslStream::new(ssl, socket).unwrap();
                if Pin::new(&mut stream).accept().await.is_ok() {
                    let mut buf = [0u8; 64];
                    let _ = stream.read(&mut buf).await;
                }
            });
        }
    });

    addr
}

/// Plain TCP server that answers every connection with an HTTP error.
pub async fn spawn_plaintext_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket
                    .write_all(b"HTTP/1.0 400 Bad Request\r\n\r\n")
                    .await;
            });
        }
    });

    addr
}

#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
