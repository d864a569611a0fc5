//! The peer certificate verification callback.
//!
//! Invoked by the TLS layer once the peer chain is known and before the
//! handshake completes. [`ChainVerifier`] stages the intermediates in the
//! certificate cache, derives a [`ValidationPolicy`] from hostname and caller
//! flags, and returns the validator's verdict on the leaf.
//!
//! Builds without TLS support use [`UnsupportedVerifier`] instead; the
//! [`PlatformVerifier`] alias names whichever one this build carries.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheInsert, CertCache};
use crate::cert::Certificate;
use crate::context::{SessionHandle, TransportHandle, TrustContext};
use crate::error::{Result, TrustError};
use crate::handshake::PeerHandshake;
use crate::policy::{TrustFlags, ValidationPolicy};
use crate::validator::ChainValidator;

/// Callback deciding whether a TLS peer is trusted.
pub trait VerifyCallback: Send + Sync {
    /// Return `Ok(())` to accept the peer of `handshake`.
    ///
    /// `transport` and `session` identify the owning connection and are not
    /// consumed.
    fn verify(
        &self,
        ctx: &TrustContext,
        transport: TransportHandle,
        session: SessionHandle,
        flags: TrustFlags,
        handshake: &dyn PeerHandshake,
    ) -> Result<()>;
}

/// Verification callback backed by a certificate cache and a chain validator.
pub struct ChainVerifier {
    cache: Arc<dyn CertCache>,
    validator: Arc<dyn ChainValidator>,
}

impl ChainVerifier {
    pub fn new(cache: Arc<dyn CertCache>, validator: Arc<dyn ChainValidator>) -> Self {
        Self { cache, validator }
    }

    /// Walk the peer chain. Intermediates are staged in the cache and
    /// released; the leaf is returned to the caller.
    fn collect_peer_chain(&self, handshake: &dyn PeerHandshake) -> Option<Certificate> {
        let mut host_cert = None;

        for index in 0.. {
            let Some(cert) = handshake.peer_cert(index) else {
                break;
            };

            if index == 0 {
                host_cert = Some(cert);
                continue;
            }

            // Best effort: a failed insert only means the validator may
            // not find this issuer later.
            match self.cache.insert(&cert) {
                Ok(CacheInsert::Inserted) => {
                    debug!(index, fingerprint = %cert.fingerprint_hex(), "staged intermediate");
                }
                Ok(CacheInsert::Duplicate) => {}
                Err(e) => {
                    warn!(
                        index,
                        fingerprint = %cert.fingerprint_hex(),
                        error = %e,
                        "failed to stage intermediate"
                    );
                }
            }
        }

        host_cert
    }
}

impl std::fmt::Debug for ChainVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainVerifier")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl VerifyCallback for ChainVerifier {
    fn verify(
        &self,
        ctx: &TrustContext,
        _transport: TransportHandle,
        _session: SessionHandle,
        flags: TrustFlags,
        handshake: &dyn PeerHandshake,
    ) -> Result<()> {
        handshake.check()?;

        let host_cert = self
            .collect_peer_chain(handshake)
            .ok_or(TrustError::MissingCertificate)?;

        let hostname = handshake.hostname();
        let policy = ValidationPolicy::for_handshake(hostname, flags);

        debug!(
            %ctx,
            hostname = hostname.unwrap_or("-"),
            ?policy,
            fingerprint = %host_cert.fingerprint_hex(),
            "validating peer certificate"
        );

        let result = self
            .validator
            .validate(ctx, &host_cert, None, policy, None);

        if let Err(e) = &result {
            debug!(%ctx, error = %e, "peer certificate rejected");
        }

        result
    }
}

/// Verification callback for builds without TLS support.
///
/// Always fails with [`TrustError::NotImplemented`] and never looks at the
/// handshake.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedVerifier;

impl VerifyCallback for UnsupportedVerifier {
    fn verify(
        &self,
        _ctx: &TrustContext,
        _transport: TransportHandle,
        _session: SessionHandle,
        _flags: TrustFlags,
        _handshake: &dyn PeerHandshake,
    ) -> Result<()> {
        Err(TrustError::NotImplemented)
    }
}

/// The verification callback this build provides.
#[cfg(feature = "tls")]
pub type PlatformVerifier = ChainVerifier;

/// The verification callback this build provides.
#[cfg(not(feature = "tls"))]
pub type PlatformVerifier = UnsupportedVerifier;

/// Construct the [`PlatformVerifier`] for this build.
#[cfg(feature = "tls")]
pub fn platform_verifier(
    cache: Arc<dyn CertCache>,
    validator: Arc<dyn ChainValidator>,
) -> PlatformVerifier {
    ChainVerifier::new(cache, validator)
}

/// Construct the [`PlatformVerifier`] for this build.
#[cfg(not(feature = "tls"))]
pub fn platform_verifier(
    _cache: Arc<dyn CertCache>,
    _validator: Arc<dyn ChainValidator>,
) -> PlatformVerifier {
    UnsupportedVerifier
}
