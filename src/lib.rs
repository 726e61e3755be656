//! mtls-guard
//!
//! Mutual-TLS authorization decisions: maps the certificate-verification
//! outcome of a completed handshake attempt, plus an explicit per-connection
//! policy, to a connection-level authorization decision.
//!
//! # What this crate decides
//!
//! - **authorized**: did the peer certificate pass full validation
//!   (chain, and identity match on the client side)?
//! - **encrypted**: is the transport TLS at all, independent of authorization?
//! - **terminate**: must the connection be closed before any application
//!   data is exchanged?
//!
//! The handshake itself, certificate parsing, and signature verification all
//! belong to rustls/webpki.  This crate supplies the policy layer on top: the
//! outcome-recording verifiers in [`transport`] feed a
//! [`policy::VerificationOutcome`] to [`policy::AuthzPolicy`], which always
//! returns a decision and never throws, because "unauthorized" is an
//! expected outcome rather than an exceptional one.
//!
//! # Typical flow
//!
//! ```no_run
//! use mtls_guard::{AuthzPolicy, ServerTlsSettings, build_server_config};
//!
//! # fn main() -> mtls_guard::Result<()> {
//! let settings = ServerTlsSettings {
//!     cert: "/tls/server.crt".into(),
//!     key: "/tls/server.key".into(),
//!     ca_cert: Some("/tls/ca.crt".into()),
//!     request_client_cert: true,
//!     reject_unauthorized: true,
//! };
//! let policy = AuthzPolicy::server(&settings)?;
//! let (tls_config, handle) = build_server_config(&settings, &policy)?;
//! // ... drive the handshake with tls_config, then:
//! let decision = policy.evaluate_server(&handle.take());
//! # Ok(()) }
//! ```
//!
//! Configuration is an explicit value per connection attempt.  There is no
//! process-wide mutable default to swap out, so nothing leaks between
//! connections or tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod identity;
pub mod material;
pub mod policy;
pub mod transport;
pub mod trust;

pub use config::{ClientTlsSettings, ServerTlsSettings, TlsSettings};
pub use error::{Error, Result};
pub use identity::PeerIdentity;
pub use material::{CaParams, CertGenerator, GeneratedCert, LeafCertParams};
pub use policy::{AuthzDecision, AuthzPolicy, DenialReason, VerificationOutcome};
pub use transport::{OutcomeHandle, build_client_config, build_server_config};
pub use trust::TrustRoots;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
