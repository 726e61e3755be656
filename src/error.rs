//! Error types for mtls-guard

use thiserror::Error;

/// Result type alias for mtls-guard
pub type Result<T> = std::result::Result<T, Error>;

/// mtls-guard errors
///
/// Only setup-time failures are representable: malformed trust material,
/// unreadable key/cert files, mismatched cert/key pairs.  Policy evaluation
/// never fails; "unauthorized" is an expected outcome, not an error, and is
/// always returned as a decision value.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing/malformed trust or key material)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error surfaced directly by the rustls config builder
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}
