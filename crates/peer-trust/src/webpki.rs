//! Chain validator built on rustls' webpki verifier.
//!
//! Path building uses the intermediates staged in the [`CertCache`]: starting
//! at the leaf's issuer, cached certificates are collected level by level
//! until a self-signed certificate or an unknown issuer ends the walk. A
//! candidate must carry the child's issuer name and, when both certificates
//! have one, a subject key identifier equal to the child's authority key
//! identifier. The cache returns the most recently staged candidates first,
//! so the intermediates the peer just presented lead the list.
//!
//! Signature verification is delegated to the rustls ring crypto provider.
//! Hostname matching is not part of chain validation; the TLS adapter does
//! it separately (see [`crate::tls::verifier`]).

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use rustls::client::danger::ServerCertVerifier;
use rustls::client::{VerifierBuilderError, WebPkiServerVerifier};
use rustls::crypto::CryptoProvider;
use rustls::CertificateError;
use rustls_pki_types::{CertificateDer, CertificateRevocationListDer, ServerName, UnixTime};
use tracing::debug;

use crate::anchors::{load_pem_crls, AnchorStore};
use crate::cache::{CachedCert, CertCache};
use crate::cert::{CertInfo, Certificate};
use crate::config::TrustConfig;
use crate::context::TrustContext;
use crate::error::{Result, TrustError};
use crate::policy::ValidationPolicy;
use crate::validator::{ChainValidator, ValidationDiagnostics};

/// Issuer levels walked above the leaf.
const MAX_PATH_DEPTH: usize = 6;

/// [`ChainValidator`] backed by webpki path validation.
pub struct WebPkiChainValidator {
    anchors: AnchorStore,
    cache: Arc<dyn CertCache>,
    crls: Vec<CertificateRevocationListDer<'static>>,
    allow_unknown_revocation: bool,
    provider: Arc<CryptoProvider>,
    fixed_time: Option<UnixTime>,
}

impl WebPkiChainValidator {
    /// Validator using `anchors`, looking up intermediates in `cache`.
    pub fn new(anchors: AnchorStore, cache: Arc<dyn CertCache>) -> Self {
        Self {
            anchors,
            cache,
            crls: Vec::new(),
            allow_unknown_revocation: true,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            fixed_time: None,
        }
    }

    /// Build a validator from configuration, loading anchors and CRLs.
    pub fn from_config(config: &TrustConfig, cache: Arc<dyn CertCache>) -> Result<Self> {
        let anchors = AnchorStore::from_config(&config.anchors)?;

        let mut crls = Vec::new();
        for path in &config.revocation.crls {
            crls.extend(load_pem_crls(path)?);
        }

        Ok(Self::new(anchors, cache).with_crls(crls, config.revocation.allow_unknown))
    }

    /// Check revocation against `crls` unless a policy skips it.
    pub fn with_crls(
        mut self,
        crls: impl IntoIterator<Item = CertificateRevocationListDer<'static>>,
        allow_unknown: bool,
    ) -> Self {
        self.crls.extend(crls);
        self.allow_unknown_revocation = allow_unknown;
        self
    }

    /// Validate as of `time` instead of the current clock.
    pub fn with_time(mut self, time: UnixTime) -> Self {
        self.fixed_time = Some(time);
        self
    }

    /// Collect cached issuers of `leaf`, one issuer level at a time.
    fn intermediates_for(&self, leaf: &CertInfo) -> Vec<CachedCert> {
        let mut found: Vec<CachedCert> = Vec::new();
        if leaf.is_self_signed() {
            return found;
        }

        let mut seen = HashSet::new();
        let mut level = vec![leaf.clone()];

        for _ in 0..MAX_PATH_DEPTH {
            let mut next = Vec::new();
            for child in &level {
                for cached in self.cache.find_by_subject(&child.issuer) {
                    if !child.may_be_issued_by(&cached.info) || !seen.insert(cached.fingerprint) {
                        continue;
                    }
                    if !cached.info.is_self_signed() {
                        next.push(cached.info.clone());
                    }
                    found.push(cached);
                }
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }

        found
    }

    fn crls_for(&self, policy: ValidationPolicy) -> &[CertificateRevocationListDer<'static>] {
        if policy.contains(ValidationPolicy::SKIP_REVOCATION) {
            &[]
        } else {
            &self.crls
        }
    }

    fn build_verifier(
        &self,
        policy: ValidationPolicy,
        extra_anchors: Option<&[Certificate]>,
    ) -> Result<Arc<WebPkiServerVerifier>> {
        let roots = self.anchors.root_store(policy, extra_anchors);
        if roots.is_empty() {
            return Err(TrustError::NoTrustAnchors);
        }

        let mut builder = WebPkiServerVerifier::builder_with_provider(
            Arc::new(roots),
            Arc::clone(&self.provider),
        );

        let crls = self.crls_for(policy);
        if !crls.is_empty() {
            builder = builder.with_crls(crls.iter().cloned());
            if self.allow_unknown_revocation {
                builder = builder.allow_unknown_revocation_status();
            }
        }

        builder.build().map_err(|e| match e {
            VerifierBuilderError::NoRootAnchors => TrustError::NoTrustAnchors,
            other => TrustError::Verification(format!("verifier setup: {other}")),
        })
    }
}

impl std::fmt::Debug for WebPkiChainValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebPkiChainValidator")
            .field("anchors", &self.anchors)
            .field("crls", &self.crls.len())
            .finish_non_exhaustive()
    }
}

/// Name handed to webpki; it never matches a keyserver certificate, and the
/// resulting name error is discarded.
fn placeholder_name() -> ServerName<'static> {
    ServerName::IpAddress(IpAddr::V4(Ipv4Addr::UNSPECIFIED).into())
}

impl ChainValidator for WebPkiChainValidator {
    fn validate(
        &self,
        ctx: &TrustContext,
        leaf: &Certificate,
        extra_anchors: Option<&[Certificate]>,
        policy: ValidationPolicy,
        diagnostics: Option<&mut ValidationDiagnostics>,
    ) -> Result<()> {
        let leaf_info = leaf.info()?;
        let intermediates = self.intermediates_for(&leaf_info);
        let intermediate_ders: Vec<CertificateDer<'static>> =
            intermediates.iter().map(|c| c.der.clone()).collect();

        debug!(
            %ctx,
            subject = %leaf_info.subject_display,
            intermediates = intermediates.len(),
            ?policy,
            "building certificate path"
        );

        let verifier = self.build_verifier(policy, extra_anchors)?;
        let now = self.fixed_time.unwrap_or_else(UnixTime::now);

        match verifier.verify_server_cert(
            leaf.der(),
            &intermediate_ders,
            &placeholder_name(),
            &[],
            now,
        ) {
            Ok(_) => {}
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => {
                // Path, validity and revocation all passed; webpki checks
                // the name last.
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(diagnostics) = diagnostics {
            diagnostics.chain_length = 1 + intermediates.len();
            diagnostics.expires_at = intermediates
                .iter()
                .map(|c| c.info.not_after)
                .chain(std::iter::once(leaf_info.not_after))
                .min();
        }

        Ok(())
    }
}
