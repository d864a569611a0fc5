//! TLS client configuration for keyserver connections.

use std::sync::Arc;

use rustls::client::danger::ServerCertVerifier;

use crate::error::{Result, TrustError};
use crate::tls::verifier::KeyserverCertVerifier;

/// Build a `rustls::ClientConfig` whose server certificates are checked by
/// `verifier`.
///
/// Uses the ring provider with its safe default protocol versions and no
/// client authentication.
pub fn build_client_tls_config(
    verifier: Arc<KeyserverCertVerifier>,
) -> Result<rustls::ClientConfig> {
    let verifier: Arc<dyn ServerCertVerifier> = verifier;

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TrustError::Config(format!("TLS version config: {e}")))?
    .dangerous()
    .with_custom_certificate_verifier(verifier)
    .with_no_client_auth();

    Ok(config)
}
