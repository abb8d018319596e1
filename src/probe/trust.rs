use crate::error::ProbeError;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::X509;
use std::collections::HashSet;
use std::path::Path;

/// Root certificates a [`super::TlsProber`] validates peers against.
///
/// Built once by the caller and handed to the prober; never mutated after.
#[derive(Clone, Debug, Default)]
pub struct TrustAnchors {
    roots: Vec<X509>,
    system_defaults: bool,
}

impl TrustAnchors {
    /// An empty set. Every peer fails verification until roots are added.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The platform's default OpenSSL verify locations.
    pub fn system() -> Self {
        Self {
            roots: Vec::new(),
            system_defaults: true,
        }
    }

    /// Parses every certificate in a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ProbeError> {
        let roots = X509::stack_from_pem(pem)?;
        if roots.is_empty() {
            return Err(ProbeError::TrustStore(
                "no certificates found in PEM bundle".into(),
            ));
        }
        Ok(Self {
            roots,
            system_defaults: false,
        })
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|err| {
            ProbeError::TrustStore(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    pub fn with_root(mut self, cert: X509) -> Self {
        self.roots.push(cert);
        self
    }

    /// Number of roots added from PEM or [`TrustAnchors::with_root`]. System
    /// locations are loaded by OpenSSL at store build time and never counted
    /// here, see [`TrustAnchors::is_empty`].
    pub fn explicit_roots(&self) -> usize {
        self.roots.len()
    }

    /// True when no peer can verify: no explicit roots and no system
    /// locations.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && !self.system_defaults
    }

    pub(crate) fn build_store(&self) -> Result<X509Store, ProbeError> {
        let mut builder = X509StoreBuilder::new()?;
        if self.system_defaults {
            builder.set_default_paths()?;
        }

        // Older OpenSSL rejects a certificate that is already in the store.
        let mut seen = HashSet::new();
        for root in &self.roots {
            if seen.insert(root.to_der()?) {
                builder.add_cert(root.clone())?;
            }
        }
        Ok(builder.build())
    }
}
