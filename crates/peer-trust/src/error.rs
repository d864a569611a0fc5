//! Error types for peer certificate trust decisions.
//!
//! Validation failures produced by a [`ChainValidator`](crate::validator::ChainValidator)
//! travel through the verification callback unchanged, so the same enum
//! covers engine errors, validator verdicts and configuration problems.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur within the `peer-trust` crate.
#[derive(Debug, Error)]
pub enum TrustError {
    // --- Verification callback ---
    #[error("peer presented no certificate")]
    MissingCertificate,

    #[error("TLS support is not available in this build")]
    NotImplemented,

    #[error("invalid TLS handshake handle: {0}")]
    InvalidHandshake(String),

    // --- Chain validation ---
    #[error("certificate has expired")]
    CertificateExpired,

    #[error("certificate is not yet valid")]
    CertificateNotYetValid,

    #[error("certificate has been revoked")]
    CertificateRevoked,

    #[error("certificate issuer is unknown")]
    UnknownIssuer,

    #[error("bad certificate signature")]
    BadSignature,

    #[error("revocation status is unknown")]
    RevocationStatusUnknown,

    #[error("no trust anchors available for the selected policy")]
    NoTrustAnchors,

    #[error("certificate verification failed: {0}")]
    Verification(String),

    // --- Parsing ---
    #[error("failed to parse certificate: {0}")]
    CertificateParse(String),

    // --- Cache ---
    #[error("certificate cache is full ({0} entries)")]
    CacheFull(usize),

    // --- Configuration ---
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`TrustError`].
pub type Result<T> = std::result::Result<T, TrustError>;

#[cfg(feature = "tls")]
impl From<rustls::Error> for TrustError {
    fn from(err: rustls::Error) -> Self {
        use rustls::CertificateError;

        match err {
            rustls::Error::InvalidCertificate(cert_err) => match cert_err {
                CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
                    Self::CertificateExpired
                }
                CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
                    Self::CertificateNotYetValid
                }
                CertificateError::Revoked => Self::CertificateRevoked,
                CertificateError::UnknownIssuer => Self::UnknownIssuer,
                CertificateError::BadSignature => Self::BadSignature,
                CertificateError::UnknownRevocationStatus => Self::RevocationStatusUnknown,
                other => Self::Verification(format!("{other:?}")),
            },
            other => Self::Verification(other.to_string()),
        }
    }
}

/// Maps a trust verdict onto the rustls error the handshake aborts with, so
/// the peer receives a matching TLS alert.
#[cfg(feature = "tls")]
impl From<TrustError> for rustls::Error {
    fn from(err: TrustError) -> Self {
        use rustls::CertificateError;

        let cert_err = match err {
            TrustError::CertificateExpired => CertificateError::Expired,
            TrustError::CertificateNotYetValid => CertificateError::NotValidYet,
            TrustError::CertificateRevoked => CertificateError::Revoked,
            TrustError::UnknownIssuer | TrustError::NoTrustAnchors => {
                CertificateError::UnknownIssuer
            }
            TrustError::BadSignature => CertificateError::BadSignature,
            TrustError::RevocationStatusUnknown => CertificateError::UnknownRevocationStatus,
            TrustError::MissingCertificate | TrustError::CertificateParse(_) => {
                CertificateError::BadEncoding
            }
            other => return rustls::Error::General(other.to_string()),
        };
        rustls::Error::InvalidCertificate(cert_err)
    }
}
