//! Trust anchor classes and their conversion to a rustls root store.
//!
//! Three classes of anchors exist, one per anchor directive of
//! [`ValidationPolicy`]:
//! - `pool`: the dedicated CA of the HKPS keyserver pool
//! - `default`: anchors configured for keyserver connections
//! - `system`: the operating system's CA bundle
//!
//! A policy without any anchor directive falls back to the system anchors.

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, CertificateRevocationListDer};
use tracing::{debug, warn};

use crate::cert::Certificate;
use crate::config::AnchorsConfig;
use crate::error::{Result, TrustError};
use crate::policy::ValidationPolicy;

/// The anchor certificates known to a validator.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
    pool: Vec<CertificateDer<'static>>,
    default: Vec<CertificateDer<'static>>,
    system: Vec<CertificateDer<'static>>,
}

impl AnchorStore {
    /// An anchor store with no anchors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every file named in `config`.
    ///
    /// A missing file is logged and skipped, so the store still loads on
    /// hosts that lack some anchor class. A policy that selects only that
    /// class then finds no anchors. Unreadable or malformed files are errors.
    pub fn from_config(config: &AnchorsConfig) -> Result<Self> {
        let mut store = Self::empty();

        load_class(&mut store.pool, &config.pool, "pool")?;
        load_class(&mut store.default, &config.default, "default")?;
        load_class(&mut store.system, &config.system, "system")?;

        debug!(
            pool = store.pool.len(),
            default = store.default.len(),
            system = store.system.len(),
            "trust anchors loaded"
        );

        Ok(store)
    }

    pub fn with_pool(mut self, certs: impl IntoIterator<Item = CertificateDer<'static>>) -> Self {
        self.pool.extend(certs);
        self
    }

    pub fn with_default(
        mut self,
        certs: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Self {
        self.default.extend(certs);
        self
    }

    pub fn with_system(mut self, certs: impl IntoIterator<Item = CertificateDer<'static>>) -> Self {
        self.system.extend(certs);
        self
    }

    /// Anchor certificates selected by `policy`, without duplicates removed.
    fn selected(&self, policy: ValidationPolicy) -> Vec<&CertificateDer<'static>> {
        let mut selected = Vec::new();

        if policy.contains(ValidationPolicy::TRUST_POOL) {
            selected.extend(&self.pool);
        }
        if policy.contains(ValidationPolicy::TRUST_DEFAULT) {
            selected.extend(&self.default);
        }
        if policy.contains(ValidationPolicy::TRUST_SYSTEM) || !policy.has_anchor_directive() {
            selected.extend(&self.system);
        }

        selected
    }

    /// Build the root store for `policy` plus any explicit extra anchors.
    ///
    /// Anchors that fail to parse are skipped with a warning.
    pub fn root_store(
        &self,
        policy: ValidationPolicy,
        extra: Option<&[Certificate]>,
    ) -> RootCertStore {
        let mut roots = RootCertStore::empty();

        let candidates = self
            .selected(policy)
            .into_iter()
            .cloned()
            .chain(extra.into_iter().flatten().map(|c| c.der().clone()));

        let (added, ignored) = roots.add_parsable_certificates(candidates);
        if ignored > 0 {
            warn!(added, ignored, "ignored unparsable trust anchors");
        }

        roots
    }
}

fn load_class(
    anchors: &mut Vec<CertificateDer<'static>>,
    paths: &[PathBuf],
    class: &str,
) -> Result<()> {
    for path in paths {
        match load_pem_certs(path) {
            Ok(certs) => anchors.extend(certs),
            Err(TrustError::Io { path, source }) if source.kind() == ErrorKind::NotFound => {
                warn!(class, path = %path.display(), "trust anchor file not found");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Read all PEM certificates from `path`.
pub fn load_pem_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path)?;
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| TrustError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Read all PEM certificate revocation lists from `path`.
pub fn load_pem_crls(path: &Path) -> Result<Vec<CertificateRevocationListDer<'static>>> {
    let mut reader = open(path)?;
    rustls_pemfile::crls(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| TrustError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TrustError::Io {
            path: path.to_path_buf(),
            source,
        })
}
