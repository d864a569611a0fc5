//! rustls server certificate verifier driven by the verification callback.
//!
//! `KeyserverCertVerifier` wraps what rustls presents in a
//! [`PresentedChain`], lets a [`VerifyCallback`] make the trust decision, and
//! then matches the requested hostname against the leaf certificate.
//!
//! Signature verification is delegated to the rustls ring crypto provider.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::server::ParsedCertificate;
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::info;

use crate::context::{SessionHandle, TransportHandle, TrustContext};
use crate::policy::TrustFlags;
use crate::tls::handshake::PresentedChain;
use crate::verify::VerifyCallback;

/// Get the ring provider's supported signature verification algorithms.
fn ring_signature_algorithms() -> &'static rustls::crypto::WebPkiSupportedAlgorithms {
    use std::sync::LazyLock;
    static ALGORITHMS: LazyLock<rustls::crypto::WebPkiSupportedAlgorithms> = LazyLock::new(|| {
        rustls::crypto::ring::default_provider().signature_verification_algorithms
    });
    &ALGORITHMS
}

/// Server certificate verifier for keyserver connections.
///
/// One verifier serves one caller context and one set of trust flags;
/// build a separate client config per distinct flag set.
pub struct KeyserverCertVerifier {
    callback: Arc<dyn VerifyCallback>,
    ctx: TrustContext,
    flags: TrustFlags,
    transport: TransportHandle,
    session: SessionHandle,
}

impl KeyserverCertVerifier {
    pub fn new(callback: Arc<dyn VerifyCallback>, ctx: TrustContext, flags: TrustFlags) -> Self {
        Self {
            callback,
            ctx,
            flags,
            transport: TransportHandle::default(),
            session: SessionHandle::default(),
        }
    }

    /// Tag callback invocations with the owning transport and session.
    pub fn with_handles(mut self, transport: TransportHandle, session: SessionHandle) -> Self {
        self.transport = transport;
        self.session = session;
        self
    }

    pub fn flags(&self) -> TrustFlags {
        self.flags
    }
}

impl std::fmt::Debug for KeyserverCertVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyserverCertVerifier")
            .field("ctx", &self.ctx)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl ServerCertVerifier for KeyserverCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let chain = PresentedChain::new(end_entity, intermediates, server_name);
        self.callback
            .verify(&self.ctx, self.transport, self.session, self.flags, &chain)?;

        let cert = ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_name(&cert, server_name)?;

        info!(server = ?server_name, ctx = %self.ctx, "peer certificate trusted");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, ring_signature_algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring_signature_algorithms().supported_schemes()
    }
}
