//! TLS settings types.
//!
//! Defines the YAML-deserialisable configuration for both sides of a
//! mutual-TLS connection: server identity material, trust anchors, and the
//! two policy switches (`request_client_cert`, `reject_unauthorized`).
//!
//! There is deliberately no process-wide default here.  Every connection
//! attempt is built from an explicit settings value; replacing a global
//! agent-style singleton is exactly the leakage this crate avoids.
//!
//! # Example YAML
//!
//! ```yaml
//! server:
//!   cert: "/etc/mtls-guard/tls/server.crt"
//!   key:  "/etc/mtls-guard/tls/server.key"
//!   ca_cert: "/etc/mtls-guard/tls/ca.crt"
//!   request_client_cert: true
//!   reject_unauthorized: true
//! client:
//!   cert: "/etc/mtls-guard/tls/client.crt"
//!   key:  "/etc/mtls-guard/tls/client.key"
//!   ca_cert: "/etc/mtls-guard/tls/ca.crt"
//!   augment_system_roots: true
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level settings
// ─────────────────────────────────────────────────────────────────────────────

/// Combined server- and client-side TLS settings.
///
/// Most deployments only fill in one of the two halves.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsSettings {
    /// Settings for hosting a TLS listener.
    pub server: ServerTlsSettings,

    /// Settings for outbound TLS connections.
    pub client: ClientTlsSettings,
}

impl TlsSettings {
    /// Parse settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the YAML is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Invalid TLS settings: {e}")))
    }

    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read '{}': {e}", path.display())))?;
        Self::from_yaml(&raw)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server side
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the server side of a TLS connection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerTlsSettings {
    /// Path to the PEM-encoded server certificate file.
    pub cert: String,

    /// Path to the PEM-encoded server private key file.
    pub key: String,

    /// Path to the PEM-encoded CA bundle used to verify client certificates.
    ///
    /// Required when `request_client_cert` is `true`; ignored otherwise.
    pub ca_cert: Option<String>,

    /// Ask connecting clients for a certificate.
    ///
    /// When `false` (default) the listener never requests a certificate, so
    /// every connection evaluates as unauthorized without being a failure.
    pub request_client_cert: bool,

    /// Sever connections whose certificate is absent or fails validation.
    ///
    /// When `false`, invalid or missing client certificates still complete
    /// the handshake and are reported as unauthorized; the application layer
    /// decides what to restrict.
    #[serde(default = "default_reject_unauthorized")]
    pub reject_unauthorized: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client side
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the client side of a TLS connection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientTlsSettings {
    /// Path to the PEM-encoded client certificate, for mutual TLS.
    ///
    /// Must be set together with `key` or not at all.
    pub cert: Option<String>,

    /// Path to the PEM-encoded client private key.
    pub key: Option<String>,

    /// Path to a PEM-encoded CA bundle of explicit trust anchors for
    /// validating the server certificate.
    pub ca_cert: Option<String>,

    /// Extend the explicit trust anchors with the bundled system root set.
    ///
    /// When `true` (default), a configured `ca_cert` is added to the public
    /// roots rather than replacing them.  Set to `false` to trust only the
    /// explicitly supplied anchors.
    #[serde(default = "default_augment_system_roots")]
    pub augment_system_roots: bool,

    /// Treat a server certificate that fails validation as fatal for the
    /// connection.
    ///
    /// When `false` the handshake completes regardless and the verification
    /// result is only reported in the authorization decision.
    #[serde(default = "default_reject_unauthorized")]
    pub reject_unauthorized: bool,
}

fn default_reject_unauthorized() -> bool {
    true
}

fn default_augment_system_roots() -> bool {
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
