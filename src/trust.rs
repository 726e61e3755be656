//! Trust anchor handling.
//!
//! [`TrustRoots`] holds the set of CA certificates a connection validates
//! its peer against.  Anchors are parsed eagerly so malformed trust material
//! fails at setup rather than mid-handshake.
//!
//! Two sourcing modes:
//!
//! - explicit only: exactly the supplied PEM anchors are trusted
//! - augmented: the supplied anchors are added on top of the bundled
//!   public root set (`webpki-roots`)
//!
//! Augmentation is always an explicit choice.  Supplying a private CA never
//! silently replaces the public roots, and opting out of the public roots
//! never happens by accident.

use std::fs;
use std::path::Path;

use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use tracing::debug;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// TrustRoots
// ─────────────────────────────────────────────────────────────────────────────

/// A validated set of trust anchors plus the system-root augmentation flag.
#[derive(Debug, Clone, Default)]
pub struct TrustRoots {
    anchors: Vec<CertificateDer<'static>>,
    augment_system_roots: bool,
}

impl TrustRoots {
    /// Trust only the bundled public root set, with no explicit anchors.
    #[must_use]
    pub fn system() -> Self {
        Self {
            anchors: Vec::new(),
            augment_system_roots: true,
        }
    }

    /// Parse explicit anchors from PEM bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the bytes contain no parseable certificate.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let anchors: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &pem[..])
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("Failed to parse trust anchors: {e}")))?;

        if anchors.is_empty() {
            return Err(Error::Config(
                "No certificates found in trust anchor material".to_string(),
            ));
        }

        Ok(Self {
            anchors,
            augment_system_roots: false,
        })
    }

    /// Parse explicit anchors from a PEM file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or contains no
    /// parseable certificate.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = fs::read(path)
            .map_err(|e| Error::Config(format!("Cannot read '{}': {e}", path.display())))?;
        Self::from_pem(&pem).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{msg} (from '{}')", path.display())),
            other => other,
        })
    }

    /// Set whether the bundled public root set is added to the explicit
    /// anchors.
    #[must_use]
    pub fn with_system_roots(mut self, augment: bool) -> Self {
        self.augment_system_roots = augment;
        self
    }

    /// Number of explicit anchors (system roots not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Returns `true` when no explicit anchor is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Build the `RootCertStore` this trust configuration describes.
    ///
    /// # Errors
    ///
    /// Returns an error if an anchor is rejected by the store (e.g. not a CA
    /// certificate usable as a trust anchor).
    pub fn to_root_store(&self) -> Result<RootCertStore> {
        let mut store = RootCertStore::empty();

        if self.augment_system_roots {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        for anchor in &self.anchors {
            store.add(anchor.clone())?;
        }

        debug!(
            explicit = self.anchors.len(),
            augment_system_roots = self.augment_system_roots,
            total = store.len(),
            "trust root store built"
        );

        Ok(store)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
