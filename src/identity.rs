//! Peer identity extraction.
//!
//! Parses an X.509 DER-encoded certificate and extracts the fields worth
//! reporting about a peer: Common Name and SAN DNS names.  The extracted
//! identity rides along on a [`crate::policy::VerificationOutcome`] purely
//! for diagnostics and audit logging; authorization never branches on it.

use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Peer identity
// ─────────────────────────────────────────────────────────────────────────────

/// Identity fields extracted from a presented certificate.
///
/// All fields are optional because not every certificate uses every field.
/// The `display_name` is computed once for use in logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Certificate Common Name (CN).
    pub common_name: Option<String>,

    /// Subject Alternative Name DNS entries.
    pub san_dns_names: Vec<String>,

    /// Pre-computed human-readable label for logs.
    pub display_name: String,
}

impl PeerIdentity {
    /// Parse a DER-encoded certificate and extract its identity fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the certificate cannot be parsed.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Config(format!("Failed to parse peer certificate: {e}")))?;

        let common_name = extract_cn(&cert);
        let san_dns_names = extract_san_dns(&cert);
        let display_name = build_display_name(common_name.as_ref(), &san_dns_names);

        Ok(Self {
            common_name,
            san_dns_names,
            display_name,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extract the CN attribute from the subject DN.
fn extract_cn(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
}

/// Extract SAN DNS entries from the certificate extensions.
fn extract_san_dns(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut dns_names = Vec::new();

    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                dns_names.push((*dns).to_owned());
            }
        }
    }

    dns_names
}

/// Prefers the CN, then the first DNS SAN, then `"<unknown>"`.
fn build_display_name(cn: Option<&String>, san_dns: &[String]) -> String {
    cn.map(String::as_str)
        .or_else(|| san_dns.first().map(String::as_str))
        .unwrap_or("<unknown>")
        .to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
