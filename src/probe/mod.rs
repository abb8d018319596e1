mod tls;
mod trust;

pub use tls::TlsProber;
pub use trust::TrustAnchors;
