//! Transport adapter: rustls config building and outcome recording.
//!
//! The policy layer consumes a [`VerificationOutcome`]; this module is where
//! that outcome comes from.  Each builder wires an outcome-recording verifier
//! into a rustls config and hands back the [`OutcomeHandle`] the caller
//! drains once the handshake attempt completes:
//!
//! ```text
//! build_server_config(settings, policy) → (Arc<ServerConfig>, OutcomeHandle)
//!   → acceptor drives the handshake
//!   → handle.take() → VerificationOutcome
//!   → policy.evaluate_server(&outcome) → AuthzDecision
//! ```
//!
//! One `(config, handle)` pair serves exactly one connection attempt.  There
//! is no process-wide client config to swap out; callers that want different
//! trust for the next connection build a new pair.
//!
//! In rejecting mode the recording verifiers propagate verification failures
//! and rustls severs the handshake itself.  In tolerant mode they record the
//! failure and let the handshake complete so the policy layer can report the
//! connection as unauthorized without killing it.

use std::sync::Arc;

use parking_lot::Mutex;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::WebPkiClientVerifier;
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, DistinguishedName, ServerConfig,
    SignatureScheme,
};
use tracing::debug;

use crate::config::{ClientTlsSettings, ServerTlsSettings};
use crate::identity::PeerIdentity;
use crate::material::{load_certs, load_private_key};
use crate::policy::{AuthzPolicy, VerificationOutcome};
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Outcome handle
// ─────────────────────────────────────────────────────────────────────────────

/// Clonable slot connecting one handshake attempt to its caller.
///
/// The verifier records into it during the handshake; the caller drains it
/// afterwards.  When verification never ran (the peer sent no certificate),
/// [`OutcomeHandle::take`] yields
/// [`VerificationOutcome::no_peer_certificate`].
#[derive(Debug, Clone, Default)]
pub struct OutcomeHandle {
    slot: Arc<Mutex<Option<VerificationOutcome>>>,
}

impl OutcomeHandle {
    fn record(&self, outcome: VerificationOutcome) {
        *self.slot.lock() = Some(outcome);
    }

    /// Drain the recorded outcome for this connection attempt.
    #[must_use]
    pub fn take(&self) -> VerificationOutcome {
        self.slot
            .lock()
            .take()
            .unwrap_or_else(VerificationOutcome::no_peer_certificate)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client side: server certificate verifier
// ─────────────────────────────────────────────────────────────────────────────

/// Wraps the WebPKI server verifier, recording what it concluded.
///
/// Classifies a name-mismatch failure separately from chain failures so the
/// policy layer can report `hostname-mismatch` rather than a generic denial.
#[derive(Debug)]
struct RecordingServerCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
    tolerate_invalid: bool,
    outcome: OutcomeHandle,
}

impl ServerCertVerifier for RecordingServerCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let peer = PeerIdentity::from_der(end_entity).ok();

        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => {
                self.outcome
                    .record(VerificationOutcome::verified().with_peer(peer));
                Ok(verified)
            }
            Err(err) => {
                // webpki validates the chain before the name, so a
                // name-mismatch failure implies the chain itself was fine.
                let name_mismatch = matches!(
                    &err,
                    rustls::Error::InvalidCertificate(
                        CertificateError::NotValidForName
                            | CertificateError::NotValidForNameContext { .. }
                    )
                );
                let outcome = if name_mismatch {
                    VerificationOutcome::hostname_mismatch()
                } else {
                    VerificationOutcome::invalid_chain()
                };
                self.outcome.record(outcome.with_peer(peer));

                if self.tolerate_invalid {
                    debug!(error = %err, "server certificate invalid, tolerated");
                    Ok(ServerCertVerified::assertion())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server side: client certificate verifier
// ─────────────────────────────────────────────────────────────────────────────

/// Wraps the WebPKI client verifier, recording what it concluded.
///
/// `client_auth_mandatory` follows the rejection mode: a rejecting listener
/// aborts the handshake when no certificate arrives, a tolerant one lets it
/// complete and reports the absence through the outcome instead.
#[derive(Debug)]
struct RecordingClientCertVerifier {
    inner: Arc<dyn ClientCertVerifier>,
    mandatory: bool,
    outcome: OutcomeHandle,
}

impl ClientCertVerifier for RecordingClientCertVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        let peer = PeerIdentity::from_der(end_entity).ok();

        match self.inner.verify_client_cert(end_entity, intermediates, now) {
            Ok(verified) => {
                self.outcome
                    .record(VerificationOutcome::verified().with_peer(peer));
                Ok(verified)
            }
            Err(err) => {
                self.outcome
                    .record(VerificationOutcome::invalid_chain().with_peer(peer));

                if self.mandatory {
                    Err(err)
                } else {
                    debug!(error = %err, "client certificate invalid, tolerated");
                    Ok(ClientCertVerified::assertion())
                }
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }

    fn requires_raw_public_keys(&self) -> bool {
        self.inner.requires_raw_public_keys()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config builders
// ─────────────────────────────────────────────────────────────────────────────

/// Build a `rustls::ServerConfig` for one inbound connection attempt.
///
/// When the policy requests client certificates, the returned handle carries
/// the verification outcome after the handshake; otherwise it stays empty and
/// drains to "no certificate presented".
///
/// # Errors
///
/// Returns an error if identity material cannot be loaded, the trust store
/// cannot be built, or the cert/key pair is rejected by rustls.
pub fn build_server_config(
    settings: &ServerTlsSettings,
    policy: &AuthzPolicy,
) -> Result<(Arc<ServerConfig>, OutcomeHandle)> {
    let cert_chain = load_certs(&settings.cert)?;
    let key = load_private_key(&settings.key)?;

    if !policy.require_peer_certificate() {
        let cfg = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(cert_chain, key)?;
        return Ok((Arc::new(cfg), OutcomeHandle::default()));
    }

    let roots = Arc::new(policy.trust_roots().to_root_store()?);
    let inner = WebPkiClientVerifier::builder(roots)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build client verifier: {e}")))?;

    let handle = OutcomeHandle::default();
    let verifier = Arc::new(RecordingClientCertVerifier {
        inner,
        mandatory: policy.reject_on_invalid(),
        outcome: handle.clone(),
    });

    let cfg = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)?;

    debug!(
        cert = %settings.cert,
        reject_on_invalid = policy.reject_on_invalid(),
        "server TLS config built"
    );

    Ok((Arc::new(cfg), handle))
}

/// Build a `rustls::ClientConfig` for one outbound connection attempt.
///
/// The returned handle carries the server-certificate verification outcome
/// after the handshake.
///
/// # Errors
///
/// Returns an error if identity material is inconsistent or cannot be
/// loaded, or the trust store cannot be built.
pub fn build_client_config(
    settings: &ClientTlsSettings,
    policy: &AuthzPolicy,
) -> Result<(Arc<ClientConfig>, OutcomeHandle)> {
    let roots = Arc::new(policy.trust_roots().to_root_store()?);
    let inner = WebPkiServerVerifier::builder(roots)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build server verifier: {e}")))?;

    let handle = OutcomeHandle::default();
    let verifier = Arc::new(RecordingServerCertVerifier {
        inner,
        tolerate_invalid: !policy.reject_on_invalid(),
        outcome: handle.clone(),
    });

    let builder = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier);

    let cfg = match (settings.cert.as_deref(), settings.key.as_deref()) {
        (Some(cert), Some(key)) => {
            builder.with_client_auth_cert(load_certs(cert)?, load_private_key(key)?)?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(Error::Config(
                "client cert and key must be configured together".to_string(),
            ));
        }
    };

    debug!(
        has_client_cert = settings.cert.is_some(),
        reject_on_invalid = policy.reject_on_invalid(),
        "client TLS config built"
    );

    Ok((Arc::new(cfg), handle))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
