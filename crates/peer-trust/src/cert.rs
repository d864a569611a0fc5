//! Reference-counted certificate handles.
//!
//! The TLS layer hands out one [`Certificate`] per enumerated chain element.
//! Cloning takes another reference and dropping releases it, so every exit
//! path of the verification callback releases exactly what it acquired.
//!
//! SHA-256 reference: `sha2` crate (RustCrypto, MIT/Apache-2.0)
//! X.509 parsing reference: `x509-parser` crate (rusticata, MIT/Apache-2.0)

use std::fmt;
use std::sync::Arc;

use data_encoding::HEXUPPER;
use rustls_pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::error::{Result, TrustError};

/// Opaque handle to a single DER-encoded certificate.
///
/// The handle is cheap to clone and safe to share across threads; the
/// underlying bytes are freed when the last reference is dropped.
#[derive(Clone)]
pub struct Certificate {
    inner: Arc<CertificateInner>,
}

struct CertificateInner {
    der: CertificateDer<'static>,
    fingerprint: [u8; 32],
}

impl Certificate {
    /// Wrap DER bytes in a new handle. The bytes are not parsed here.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        let der = CertificateDer::from(der.into());
        let fingerprint: [u8; 32] = Sha256::digest(der.as_ref()).into();
        Self {
            inner: Arc::new(CertificateInner { der, fingerprint }),
        }
    }

    /// Returns the DER-encoded certificate.
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.inner.der
    }

    /// SHA-256 over the DER encoding.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.inner.fingerprint
    }

    /// Upper-case hex rendering of [`fingerprint`](Self::fingerprint).
    pub fn fingerprint_hex(&self) -> String {
        HEXUPPER.encode(&self.inner.fingerprint)
    }

    /// Number of live references to this certificate.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Parse the fields needed for chain building.
    pub fn info(&self) -> Result<CertInfo> {
        CertInfo::parse(self.inner.der.as_ref())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("fingerprint", &self.fingerprint_hex())
            .field("len", &self.inner.der.len())
            .finish()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.inner.fingerprint == other.inner.fingerprint
    }
}

impl Eq for Certificate {}

impl From<CertificateDer<'_>> for Certificate {
    fn from(der: CertificateDer<'_>) -> Self {
        Self::from_der(der.as_ref().to_vec())
    }
}

/// Fields of a parsed certificate used for path building and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Raw DER of the subject distinguished name.
    pub subject: Vec<u8>,
    /// Raw DER of the issuer distinguished name.
    pub issuer: Vec<u8>,
    /// RFC 4514 rendering of the subject, for logs.
    pub subject_display: String,
    /// Expiry as seconds since Unix epoch.
    pub not_after: i64,
    /// Subject key identifier extension, if present.
    pub subject_key_id: Option<Vec<u8>>,
    /// Key identifier of the authority key identifier extension, if present.
    pub authority_key_id: Option<Vec<u8>>,
}

impl CertInfo {
    /// Parse a DER certificate.
    pub fn parse(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| TrustError::CertificateParse(format!("X.509 parse error: {e}")))?;

        let mut subject_key_id = None;
        let mut authority_key_id = None;
        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(kid) => {
                    subject_key_id = Some(kid.0.to_vec());
                }
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    authority_key_id = aki.key_identifier.as_ref().map(|kid| kid.0.to_vec());
                }
                _ => {}
            }
        }

        Ok(Self {
            subject: cert.subject().as_raw().to_vec(),
            issuer: cert.issuer().as_raw().to_vec(),
            subject_display: cert.subject().to_string(),
            not_after: cert.validity().not_after.timestamp(),
            subject_key_id,
            authority_key_id,
        })
    }

    /// Subject and issuer names are identical.
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// `candidate` could have issued this certificate: its subject is our
    /// issuer, and the key identifiers agree when both are present.
    pub fn may_be_issued_by(&self, candidate: &CertInfo) -> bool {
        if self.issuer != candidate.subject {
            return false;
        }
        match (&self.authority_key_id, &candidate.subject_key_id) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true,
        }
    }
}
