//! Certificate cache: staging area for intermediates seen during handshakes.
//!
//! The [`CertCache`] trait abstracts where staged certificates live so the
//! chain validator can find issuers later. [`MemoryCertCache`] provides a
//! bounded in-memory implementation that evicts the oldest entry when full,
//! so a fresh insert always succeeds.
//!
//! Inserts copy the DER bytes; the cache never holds a reference to the
//! caller's [`Certificate`] handle.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use data_encoding::HEXUPPER;
use rustls_pki_types::CertificateDer;
use tracing::debug;

use crate::cert::{CertInfo, Certificate};
use crate::error::{Result, TrustError};

/// Default upper bound on staged certificates.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Outcome of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheInsert {
    Inserted,
    /// The certificate was already cached. Not an error.
    Duplicate,
}

/// A certificate held by the cache.
#[derive(Debug, Clone)]
pub struct CachedCert {
    pub der: CertificateDer<'static>,
    pub fingerprint: [u8; 32],
    pub info: CertInfo,
}

/// Trait for staging and looking up certificates.
///
/// Implementations must be `Send + Sync`: concurrent handshakes stage
/// certificates through the same cache.
pub trait CertCache: Send + Sync {
    /// Store a copy of `cert`.
    fn insert(&self, cert: &Certificate) -> Result<CacheInsert>;

    /// All cached certificates whose raw subject DN equals `subject`, most
    /// recently staged first.
    fn find_by_subject(&self, subject: &[u8]) -> Vec<CachedCert>;

    /// Returns `true` if a certificate with this fingerprint is cached.
    fn contains(&self, fingerprint: &[u8; 32]) -> bool;

    /// Number of cached certificates.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct CacheState {
    by_fingerprint: HashMap<[u8; 32], CachedCert>,
    by_subject: HashMap<Vec<u8>, Vec<[u8; 32]>>,
    /// Insertion order, oldest at the front.
    order: VecDeque<[u8; 32]>,
}

impl CacheState {
    fn evict_oldest(&mut self) -> Option<CachedCert> {
        let fingerprint = self.order.pop_front()?;
        let evicted = self.by_fingerprint.remove(&fingerprint)?;
        if let Some(fps) = self.by_subject.get_mut(&evicted.info.subject) {
            fps.retain(|fp| *fp != fingerprint);
            if fps.is_empty() {
                self.by_subject.remove(&evicted.info.subject);
            }
        }
        Some(evicted)
    }
}

/// In-memory certificate cache backed by `RwLock<HashMap<..>>`.
///
/// Holds at most `capacity` certificates. Inserting into a full cache drops
/// the oldest staged certificate.
pub struct MemoryCertCache {
    state: RwLock<CacheState>,
    capacity: usize,
}

impl MemoryCertCache {
    /// Create an empty cache holding at most [`DEFAULT_CACHE_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every cached certificate.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.by_fingerprint.clear();
        state.by_subject.clear();
        state.order.clear();
    }
}

impl Default for MemoryCertCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CertCache for MemoryCertCache {
    fn insert(&self, cert: &Certificate) -> Result<CacheInsert> {
        let fingerprint = *cert.fingerprint();

        if self.contains(&fingerprint) {
            return Ok(CacheInsert::Duplicate);
        }

        // Parse outside the lock.
        let info = cert.info()?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Another handshake may have staged it since the read above.
        if state.by_fingerprint.contains_key(&fingerprint) {
            return Ok(CacheInsert::Duplicate);
        }
        if self.capacity == 0 {
            return Err(TrustError::CacheFull(0));
        }
        while state.by_fingerprint.len() >= self.capacity {
            match state.evict_oldest() {
                Some(evicted) => debug!(
                    fingerprint = %HEXUPPER.encode(&evicted.fingerprint),
                    subject = %evicted.info.subject_display,
                    "evicting cached certificate"
                ),
                None => break,
            }
        }

        debug!(
            fingerprint = %cert.fingerprint_hex(),
            subject = %info.subject_display,
            "caching certificate"
        );

        state
            .by_subject
            .entry(info.subject.clone())
            .or_default()
            .push(fingerprint);
        state.order.push_back(fingerprint);
        state.by_fingerprint.insert(
            fingerprint,
            CachedCert {
                der: cert.der().clone(),
                fingerprint,
                info,
            },
        );

        Ok(CacheInsert::Inserted)
    }

    fn find_by_subject(&self, subject: &[u8]) -> Vec<CachedCert> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_subject
            .get(subject)
            .into_iter()
            .flat_map(|fps| fps.iter().rev())
            .filter_map(|fp| state.by_fingerprint.get(fp).cloned())
            .collect()
    }

    fn contains(&self, fingerprint: &[u8; 32]) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_fingerprint
            .contains_key(fingerprint)
    }

    fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_fingerprint
            .len()
    }
}
