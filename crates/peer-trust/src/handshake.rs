//! The view of a TLS handshake the verification callback needs.

use crate::cert::Certificate;
use crate::error::Result;

/// A handshake whose peer certificate chain is available.
///
/// Implemented by the TLS layer. `tls::PresentedChain` adapts what rustls
/// hands to a certificate verifier.
pub trait PeerHandshake {
    /// Confirm the handle refers to a usable handshake.
    ///
    /// Returns [`TrustError::InvalidHandshake`](crate::error::TrustError::InvalidHandshake)
    /// otherwise.
    fn check(&self) -> Result<()>;

    /// Certificate at `index` of the peer chain (0 is the leaf), or `None`
    /// past the end. Each call hands out a new reference.
    fn peer_cert(&self, index: usize) -> Option<Certificate>;

    /// Hostname the client asked for, if any.
    fn hostname(&self) -> Option<&str>;
}
