//! rustls integration.
//!
//! Plugs the verification callback into a rustls client:
//!
//! - [`PresentedChain`]: the chain rustls hands a verifier, as a
//!   [`PeerHandshake`](crate::handshake::PeerHandshake)
//! - [`KeyserverCertVerifier`]: `ServerCertVerifier` that runs the callback,
//!   then matches the hostname
//! - [`build_client_tls_config`]: client config builder using that verifier

pub mod config;
pub mod handshake;
pub mod verifier;

pub use config::build_client_tls_config;
pub use handshake::PresentedChain;
pub use verifier::KeyserverCertVerifier;
