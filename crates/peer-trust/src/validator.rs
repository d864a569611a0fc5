//! The chain validator seam.
//!
//! The verification callback decides *which* policy applies; a
//! [`ChainValidator`] decides whether the leaf certificate satisfies it.
//! [`WebPkiChainValidator`](crate::webpki::WebPkiChainValidator) is the
//! rustls-backed implementation.

use crate::cert::Certificate;
use crate::context::TrustContext;
use crate::error::Result;
use crate::policy::ValidationPolicy;

/// Extra details a validator reports about a successful validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationDiagnostics {
    /// Leaf plus the intermediates supplied for path building.
    pub chain_length: usize,
    /// Earliest expiry among those certificates, seconds since Unix epoch.
    pub expires_at: Option<i64>,
}

/// Validates a leaf certificate under a [`ValidationPolicy`].
///
/// Implementations must be `Send + Sync` to allow sharing via
/// `Arc<dyn ChainValidator>` across concurrent handshakes.
pub trait ChainValidator: Send + Sync {
    /// Validate `leaf`.
    ///
    /// `extra_anchors` are trusted in addition to whatever the policy
    /// selects. `diagnostics`, when given, is filled in on success.
    fn validate(
        &self,
        ctx: &TrustContext,
        leaf: &Certificate,
        extra_anchors: Option<&[Certificate]>,
        policy: ValidationPolicy,
        diagnostics: Option<&mut ValidationDiagnostics>,
    ) -> Result<()>;
}
