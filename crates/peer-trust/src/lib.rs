//! TLS peer-certificate trust decisions for keyserver connections.
//!
//! When a TLS handshake exposes the peer's certificate chain, the
//! verification callback:
//!
//! - stages the intermediates in a shared certificate cache
//! - derives a validation policy from the hostname and caller flags
//! - hands the leaf certificate to a chain validator and returns its verdict
//!
//! The `tls` feature (default) adds the rustls-backed pieces: anchor store,
//! webpki chain validator and a `ServerCertVerifier` adapter. Without it the
//! platform verifier is a stub that refuses every peer.

pub mod cache;
pub mod cert;
pub mod config;
pub mod context;
pub mod error;
pub mod handshake;
pub mod policy;
pub mod validator;
pub mod verify;

#[cfg(feature = "tls")]
pub mod anchors;
#[cfg(feature = "tls")]
pub mod tls;
#[cfg(feature = "tls")]
pub mod webpki;

pub use cache::{CertCache, MemoryCertCache};
pub use cert::Certificate;
pub use context::{SessionHandle, TransportHandle, TrustContext};
pub use error::{Result, TrustError};
pub use handshake::PeerHandshake;
pub use policy::{TrustFlags, ValidationPolicy, POOL_HOSTNAME};
pub use validator::{ChainValidator, ValidationDiagnostics};
pub use verify::{
    platform_verifier, ChainVerifier, PlatformVerifier, UnsupportedVerifier, VerifyCallback,
};
