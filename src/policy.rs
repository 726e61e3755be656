//! Connection authorization policy.
//!
//! Maps the verification outcome of a completed TLS handshake attempt, plus
//! the configured policy switches, to a per-connection authorization
//! decision.  Build once per connection attempt with [`AuthzPolicy::server`]
//! or [`AuthzPolicy::client`], then call the matching `evaluate_*` once the
//! transport reports its [`VerificationOutcome`].
//!
//! # Evaluation rules (server side)
//!
//! 1. Certificate never requested → unauthorized, keep the connection.
//! 2. Requested but not presented → unauthorized; terminate iff rejecting.
//! 3. Presented → authorized iff the chain validated; terminate iff rejecting
//!    and not authorized.
//!
//! The client side mirrors this and additionally requires the peer identity
//! to match the expected hostname.  A hostname mismatch terminates the
//! connection even in tolerant mode: a channel to the wrong identity is
//! useless to the caller no matter how permissive the chain policy is.
//! Whether that asymmetry is desirable is an open question inherited from
//! the reference behavior; see DESIGN.md.
//!
//! Evaluation is a pure function of `(outcome, policy)`.  It performs no I/O,
//! touches no shared state, and is safe to call from any number of
//! handshake-completion callbacks concurrently.

use std::fmt;

use tracing::debug;

use crate::config::{ClientTlsSettings, ServerTlsSettings};
use crate::identity::PeerIdentity;
use crate::trust::TrustRoots;
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Verification outcome
// ─────────────────────────────────────────────────────────────────────────────

/// What the transport layer observed about the peer certificate during one
/// handshake attempt.
///
/// Produced by the transport collaborator (see [`crate::transport`]), consumed
/// exactly once per connection, then discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// The peer sent a certificate at all.
    pub peer_presented_certificate: bool,

    /// The presented chain validated against the configured trust anchors.
    pub certificate_chain_valid: bool,

    /// The presented certificate matches the expected peer identity.
    ///
    /// Only meaningful on the client side; server-side evaluation ignores it.
    pub hostname_matches: bool,

    /// Identity fields extracted from the presented certificate, for
    /// diagnostics and audit logging.  Never consulted by the decision logic.
    pub peer: Option<PeerIdentity>,
}

impl VerificationOutcome {
    /// The peer presented a certificate that passed chain and identity checks.
    #[must_use]
    pub fn verified() -> Self {
        Self {
            peer_presented_certificate: true,
            certificate_chain_valid: true,
            hostname_matches: true,
            peer: None,
        }
    }

    /// The peer presented nothing.
    #[must_use]
    pub fn no_peer_certificate() -> Self {
        Self::default()
    }

    /// The peer presented a certificate whose chain did not validate.
    #[must_use]
    pub fn invalid_chain() -> Self {
        Self {
            peer_presented_certificate: true,
            certificate_chain_valid: false,
            hostname_matches: false,
            peer: None,
        }
    }

    /// The chain validated but the certificate is for a different identity.
    #[must_use]
    pub fn hostname_mismatch() -> Self {
        Self {
            peer_presented_certificate: true,
            certificate_chain_valid: true,
            hostname_matches: false,
            peer: None,
        }
    }

    /// Attach the extracted peer identity.
    #[must_use]
    pub fn with_peer(mut self, peer: Option<PeerIdentity>) -> Self {
        self.peer = peer;
        self
    }

    /// Display label of the peer for logs.
    #[must_use]
    pub fn peer_display(&self) -> &str {
        self.peer
            .as_ref()
            .map_or("<no certificate>", |p| p.display_name.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Denial reason
// ─────────────────────────────────────────────────────────────────────────────

/// Why a connection evaluated as unauthorized.
///
/// Carried alongside the boolean so callers and tests can assert on the
/// specific cause.  A chain failure and an identity mismatch both yield
/// `authorized = false`; the reason code is what tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The server never asked for a certificate, so none was expected.
    CertificateNotRequested,
    /// A certificate was required but the peer sent none.
    CertificateNotPresented,
    /// The presented chain did not validate against the trust anchors.
    ChainInvalid,
    /// The chain validated but the certificate names a different identity.
    HostnameMismatch,
}

impl DenialReason {
    /// Stable machine-readable code for this reason.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::CertificateNotRequested => "certificate-not-requested",
            Self::CertificateNotPresented => "no-certificate-presented",
            Self::ChainInvalid => "chain-invalid",
            Self::HostnameMismatch => "hostname-mismatch",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// Per-connection authorization decision.
///
/// Derived and ephemeral: computed once from `(outcome, policy)` after the
/// handshake attempt completes, consumed by the caller, then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthzDecision {
    /// The peer certificate passed full validation for this side.
    pub authorized: bool,

    /// The transport is TLS.  Independent of `authorized`.
    pub encrypted: bool,

    /// The connection must be closed before any application data is
    /// exchanged.
    pub terminate: bool,

    /// Cause of the denial when `authorized` is `false`.
    pub denial: Option<DenialReason>,
}

impl AuthzDecision {
    /// Decision for a connection that never spoke TLS.
    ///
    /// Unauthorized and unencrypted, but not terminated: plaintext transports
    /// are outside this policy's remit and proceed untouched.
    #[must_use]
    pub fn plaintext() -> Self {
        Self {
            authorized: false,
            encrypted: false,
            terminate: false,
            denial: Some(DenialReason::CertificateNotPresented),
        }
    }

    fn granted() -> Self {
        Self {
            authorized: true,
            encrypted: true,
            terminate: false,
            denial: None,
        }
    }

    fn denied(reason: DenialReason, terminate: bool) -> Self {
        Self {
            authorized: false,
            encrypted: true,
            terminate,
            denial: Some(reason),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Compiled authorization policy for one side of a connection.
///
/// Construction validates the trust material, so malformed anchors fail at
/// setup rather than at evaluation time.  Evaluation always returns a
/// decision.
#[derive(Debug, Clone)]
pub struct AuthzPolicy {
    require_peer_certificate: bool,
    reject_on_invalid: bool,
    trust_roots: TrustRoots,
}

impl AuthzPolicy {
    /// Build a policy directly from its parts.
    ///
    /// Useful when trust anchors were already parsed elsewhere.
    #[must_use]
    pub fn new(require_peer_certificate: bool, reject_on_invalid: bool, trust_roots: TrustRoots) -> Self {
        Self {
            require_peer_certificate,
            reject_on_invalid,
            trust_roots,
        }
    }

    /// Build the server-side policy from settings, loading and validating the
    /// configured CA bundle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a client certificate is requested without
    /// a CA bundle, or when the bundle is unreadable or unparseable.
    pub fn server(settings: &ServerTlsSettings) -> Result<Self> {
        let trust_roots = if settings.request_client_cert {
            let ca = settings.ca_cert.as_deref().ok_or_else(|| {
                Error::Config(
                    "request_client_cert requires a ca_cert to validate against".to_string(),
                )
            })?;
            TrustRoots::from_pem_file(ca)?
        } else {
            TrustRoots::default()
        };

        Ok(Self {
            require_peer_certificate: settings.request_client_cert,
            reject_on_invalid: settings.reject_unauthorized,
            trust_roots,
        })
    }

    /// Build the client-side policy from settings.
    ///
    /// A client always requires the server to present a certificate; the
    /// configurable parts are the trust anchors and the rejection mode.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the CA bundle is unreadable or
    /// unparseable.
    pub fn client(settings: &ClientTlsSettings) -> Result<Self> {
        let trust_roots = match settings.ca_cert.as_deref() {
            Some(ca) => {
                TrustRoots::from_pem_file(ca)?.with_system_roots(settings.augment_system_roots)
            }
            None => TrustRoots::system(),
        };

        Ok(Self {
            require_peer_certificate: true,
            reject_on_invalid: settings.reject_unauthorized,
            trust_roots,
        })
    }

    /// Whether this side asks its peer for a certificate.
    #[must_use]
    pub fn require_peer_certificate(&self) -> bool {
        self.require_peer_certificate
    }

    /// Whether invalid or absent peer certificates sever the connection.
    #[must_use]
    pub fn reject_on_invalid(&self) -> bool {
        self.reject_on_invalid
    }

    /// The trust anchors this policy validates against.
    #[must_use]
    pub fn trust_roots(&self) -> &TrustRoots {
        &self.trust_roots
    }

    /// Evaluate a server-side handshake outcome.
    #[must_use]
    pub fn evaluate_server(&self, outcome: &VerificationOutcome) -> AuthzDecision {
        let decision = if !self.require_peer_certificate {
            // Never asked, so absence is expected rather than a failure.
            AuthzDecision::denied(DenialReason::CertificateNotRequested, false)
        } else if !outcome.peer_presented_certificate {
            AuthzDecision::denied(DenialReason::CertificateNotPresented, self.reject_on_invalid)
        } else if outcome.certificate_chain_valid {
            AuthzDecision::granted()
        } else {
            AuthzDecision::denied(DenialReason::ChainInvalid, self.reject_on_invalid)
        };

        debug!(
            peer = outcome.peer_display(),
            authorized = decision.authorized,
            terminate = decision.terminate,
            denial = decision.denial.map(DenialReason::code),
            "server-side authorization evaluated"
        );
        decision
    }

    /// Evaluate a client-side handshake outcome.
    ///
    /// Mirrors the server side but also requires the server certificate to
    /// match the expected hostname.
    #[must_use]
    pub fn evaluate_client(&self, outcome: &VerificationOutcome) -> AuthzDecision {
        let decision = if !outcome.peer_presented_certificate {
            AuthzDecision::denied(DenialReason::CertificateNotPresented, self.reject_on_invalid)
        } else if !outcome.certificate_chain_valid {
            AuthzDecision::denied(DenialReason::ChainInvalid, self.reject_on_invalid)
        } else if !outcome.hostname_matches {
            // A validated chain for the wrong identity still terminates, even
            // in tolerant mode.
            AuthzDecision::denied(DenialReason::HostnameMismatch, true)
        } else {
            AuthzDecision::granted()
        };

        debug!(
            peer = outcome.peer_display(),
            authorized = decision.authorized,
            terminate = decision.terminate,
            denial = decision.denial.map(DenialReason::code),
            "client-side authorization evaluated"
        );
        decision
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
