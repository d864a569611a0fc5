//! Integration tests: verification callback contract.
//!
//! Drives `ChainVerifier` with an instrumented handshake, a recording cache
//! and scripted validators, and checks:
//!
//! 1. Intermediates are staged, the leaf is validated exactly once.
//! 2. The policy follows hostname and caller flags.
//! 3. Every certificate reference is released on success and failure.
//! 4. The stub verifier never touches the handshake.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use peer_trust::cache::{CacheInsert, CachedCert};
use peer_trust::{
    CertCache, Certificate, ChainValidator, ChainVerifier, MemoryCertCache, PeerHandshake, Result,
    SessionHandle, TransportHandle, TrustContext, TrustError, TrustFlags, UnsupportedVerifier,
    ValidationDiagnostics, ValidationPolicy, VerifyCallback, POOL_HOSTNAME,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Handshake that counts how often it is consulted.
struct InstrumentedHandshake {
    certs: Vec<Certificate>,
    hostname: Option<String>,
    valid: bool,
    lookups: AtomicUsize,
    checks: AtomicUsize,
}

impl InstrumentedHandshake {
    fn new(len: u8, hostname: Option<&str>) -> Self {
        Self {
            certs: (0..len)
                .map(|i| Certificate::from_der(vec![0x30, 0x01, i]))
                .collect(),
            hostname: hostname.map(str::to_owned),
            valid: true,
            lookups: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
        }
    }

    fn assert_all_released(&self) {
        for (index, cert) in self.certs.iter().enumerate() {
            assert_eq!(cert.ref_count(), 1, "certificate {index} leaked");
        }
    }
}

impl PeerHandshake for InstrumentedHandshake {
    fn check(&self) -> Result<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.valid {
            Ok(())
        } else {
            Err(TrustError::InvalidHandshake("closed".to_owned()))
        }
    }

    fn peer_cert(&self, index: usize) -> Option<Certificate> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.certs.get(index).cloned()
    }

    fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

/// Cache that records inserts without parsing.
#[derive(Default)]
struct RecordingCache {
    inserts: Mutex<Vec<Certificate>>,
}

impl RecordingCache {
    fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }
}

impl CertCache for RecordingCache {
    fn insert(&self, cert: &Certificate) -> Result<CacheInsert> {
        // Store a detached copy so the caller's reference count is untouched.
        self.inserts
            .lock()
            .unwrap()
            .push(Certificate::from_der(cert.der().to_vec()));
        Ok(CacheInsert::Inserted)
    }

    fn find_by_subject(&self, _subject: &[u8]) -> Vec<CachedCert> {
        Vec::new()
    }

    fn contains(&self, fingerprint: &[u8; 32]) -> bool {
        self.inserts
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.fingerprint() == fingerprint)
    }

    fn len(&self) -> usize {
        self.insert_count()
    }
}

/// Cache whose inserts always fail.
struct FailingCache;

impl CertCache for FailingCache {
    fn insert(&self, _cert: &Certificate) -> Result<CacheInsert> {
        Err(TrustError::CacheFull(0))
    }

    fn find_by_subject(&self, _subject: &[u8]) -> Vec<CachedCert> {
        Vec::new()
    }

    fn contains(&self, _fingerprint: &[u8; 32]) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }
}

/// What a scripted validator answers.
#[derive(Clone, Copy)]
enum Verdict {
    Accept,
    Expired,
    Revoked,
}

struct ValidatorCall {
    leaf: Certificate,
    leaf_refs: usize,
    policy: ValidationPolicy,
    had_anchors: bool,
    had_diagnostics: bool,
}

struct ScriptedValidator {
    verdict: Verdict,
    calls: Mutex<Vec<ValidatorCall>>,
}

impl ScriptedValidator {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn single_call_policy(&self) -> ValidationPolicy {
        let calls = self.calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "validator must be invoked exactly once");
        calls[0].policy
    }
}

impl ChainValidator for ScriptedValidator {
    fn validate(
        &self,
        _ctx: &TrustContext,
        leaf: &Certificate,
        extra_anchors: Option<&[Certificate]>,
        policy: ValidationPolicy,
        diagnostics: Option<&mut ValidationDiagnostics>,
    ) -> Result<()> {
        // Record a detached copy so the leaf's count reflects the callback only.
        self.calls.lock().unwrap().push(ValidatorCall {
            leaf: Certificate::from_der(leaf.der().to_vec()),
            leaf_refs: leaf.ref_count(),
            policy,
            had_anchors: extra_anchors.is_some(),
            had_diagnostics: diagnostics.is_some(),
        });

        match self.verdict {
            Verdict::Accept => Ok(()),
            Verdict::Expired => Err(TrustError::CertificateExpired),
            Verdict::Revoked => Err(TrustError::CertificateRevoked),
        }
    }
}

fn run(
    verifier: &dyn VerifyCallback,
    flags: TrustFlags,
    handshake: &InstrumentedHandshake,
) -> Result<()> {
    verifier.verify(
        &TrustContext::with_label("integration"),
        TransportHandle(7),
        SessionHandle(9),
        flags,
        handshake,
    )
}

fn setup(verdict: Verdict) -> (Arc<RecordingCache>, Arc<ScriptedValidator>, ChainVerifier) {
    let cache = Arc::new(RecordingCache::default());
    let validator = Arc::new(ScriptedValidator::new(verdict));
    let verifier = ChainVerifier::new(cache.clone(), validator.clone());
    (cache, validator, verifier)
}

// ---------------------------------------------------------------------------
// Chain enumeration
// ---------------------------------------------------------------------------

#[test]
fn empty_chain_fails_without_side_effects() {
    let (cache, validator, verifier) = setup(Verdict::Accept);
    let handshake = InstrumentedHandshake::new(0, Some("keys.example.org"));

    let err = run(&verifier, TrustFlags::all(), &handshake).unwrap_err();

    assert!(matches!(err, TrustError::MissingCertificate));
    assert_eq!(cache.insert_count(), 0);
    assert!(validator.calls.lock().unwrap().is_empty());
}

#[test]
fn chain_of_n_stages_n_minus_one() {
    for n in 1..=5u8 {
        let (cache, validator, verifier) = setup(Verdict::Accept);
        let handshake = InstrumentedHandshake::new(n, None);

        run(&verifier, TrustFlags::TRUST_SYSTEM_STORE, &handshake).expect("accepted");

        assert_eq!(cache.insert_count(), usize::from(n) - 1);
        // n certificates plus the terminating lookup.
        assert_eq!(handshake.lookups.load(Ordering::SeqCst), usize::from(n) + 1);

        let inserted = cache.inserts.lock().unwrap();
        for (staged, presented) in inserted.iter().zip(&handshake.certs[1..]) {
            assert_eq!(staged, presented);
        }

        let calls = validator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].leaf, handshake.certs[0]);
        assert!(!calls[0].had_anchors);
        assert!(!calls[0].had_diagnostics);
    }
}

#[test]
fn cache_failures_are_ignored() {
    let validator = Arc::new(ScriptedValidator::new(Verdict::Accept));
    let verifier = ChainVerifier::new(Arc::new(FailingCache), validator.clone());
    let handshake = InstrumentedHandshake::new(3, None);

    run(&verifier, TrustFlags::empty(), &handshake).expect("staging is best effort");

    assert_eq!(validator.calls.lock().unwrap().len(), 1);
    handshake.assert_all_released();
}

#[test]
fn invalid_handshake_is_rejected_before_enumeration() {
    let (cache, validator, verifier) = setup(Verdict::Accept);
    let mut handshake = InstrumentedHandshake::new(2, None);
    handshake.valid = false;

    let err = run(&verifier, TrustFlags::empty(), &handshake).unwrap_err();

    assert!(matches!(err, TrustError::InvalidHandshake(_)));
    assert_eq!(handshake.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(cache.insert_count(), 0);
    assert!(validator.calls.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Policy selection
// ---------------------------------------------------------------------------

#[test]
fn pool_hostname_forces_pool_anchor() {
    let anchor_flags = [
        TrustFlags::empty(),
        TrustFlags::TRUST_DEFAULT_POOL,
        TrustFlags::TRUST_SYSTEM_STORE,
        TrustFlags::TRUST_DEFAULT_POOL | TrustFlags::TRUST_SYSTEM_STORE,
    ];

    for host in [POOL_HOSTNAME, "HKPS.POOL.sks-keyservers.net"] {
        for flags in anchor_flags {
            let (_cache, validator, verifier) = setup(Verdict::Accept);
            let handshake = InstrumentedHandshake::new(1, Some(host));

            run(&verifier, flags, &handshake).expect("accepted");

            assert_eq!(
                validator.single_call_policy(),
                ValidationPolicy::TLS | ValidationPolicy::TRUST_POOL
            );
        }
    }
}

#[test]
fn other_hostname_follows_flags() {
    let (_cache, validator, verifier) = setup(Verdict::Accept);
    let handshake = InstrumentedHandshake::new(1, Some("keys.openpgp.org"));

    run(&verifier, TrustFlags::TRUST_DEFAULT_POOL, &handshake).expect("accepted");

    let policy = validator.single_call_policy();
    assert!(policy.contains(ValidationPolicy::TLS | ValidationPolicy::TRUST_DEFAULT));
    assert!(!policy.contains(ValidationPolicy::TRUST_SYSTEM));
    assert!(!policy.contains(ValidationPolicy::TRUST_POOL));
}

#[test]
fn missing_hostname_follows_flags() {
    let (_cache, validator, verifier) = setup(Verdict::Accept);
    let handshake = InstrumentedHandshake::new(1, None);

    run(&verifier, TrustFlags::empty(), &handshake).expect("accepted");

    assert_eq!(validator.single_call_policy(), ValidationPolicy::TLS);
}

#[test]
fn no_revocation_check_applies_to_both_branches() {
    for host in [Some(POOL_HOSTNAME), Some("keys.openpgp.org"), None] {
        let (_cache, validator, verifier) = setup(Verdict::Accept);
        let handshake = InstrumentedHandshake::new(1, host);

        run(
            &verifier,
            TrustFlags::NO_REVOCATION_CHECK | TrustFlags::TRUST_SYSTEM_STORE,
            &handshake,
        )
        .expect("accepted");

        assert!(validator
            .single_call_policy()
            .contains(ValidationPolicy::SKIP_REVOCATION));
    }
}

// ---------------------------------------------------------------------------
// Reference accounting
// ---------------------------------------------------------------------------

#[test]
fn references_released_on_success() {
    let (_cache, validator, verifier) = setup(Verdict::Accept);
    let handshake = InstrumentedHandshake::new(4, Some("keys.openpgp.org"));

    run(&verifier, TrustFlags::TRUST_SYSTEM_STORE, &handshake).expect("accepted");

    // During validation the callback held exactly one extra leaf reference.
    assert_eq!(validator.calls.lock().unwrap()[0].leaf_refs, 2);
    handshake.assert_all_released();
}

#[test]
fn validator_errors_pass_through_and_release() {
    let (_cache, _validator, verifier) = setup(Verdict::Expired);
    let handshake = InstrumentedHandshake::new(3, None);
    let err = run(&verifier, TrustFlags::empty(), &handshake).unwrap_err();
    assert!(matches!(err, TrustError::CertificateExpired));
    handshake.assert_all_released();

    let (_cache, _validator, verifier) = setup(Verdict::Revoked);
    let handshake = InstrumentedHandshake::new(2, Some(POOL_HOSTNAME));
    let err = run(&verifier, TrustFlags::empty(), &handshake).unwrap_err();
    assert!(matches!(err, TrustError::CertificateRevoked));
    handshake.assert_all_released();
}

#[test]
fn references_released_for_single_certificate_chain() {
    let (_cache, _validator, verifier) = setup(Verdict::Expired);
    let handshake = InstrumentedHandshake::new(1, None);
    assert!(run(&verifier, TrustFlags::empty(), &handshake).is_err());
    handshake.assert_all_released();
}

// ---------------------------------------------------------------------------
// Stub configuration
// ---------------------------------------------------------------------------

#[test]
fn stub_never_touches_handshake() {
    let handshake = InstrumentedHandshake::new(3, Some(POOL_HOSTNAME));

    let err = run(&UnsupportedVerifier, TrustFlags::all(), &handshake).unwrap_err();

    assert!(matches!(err, TrustError::NotImplemented));
    assert_eq!(handshake.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(handshake.checks.load(Ordering::SeqCst), 0);
    handshake.assert_all_released();
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_handshakes_share_cache() {
    let root_key = rcgen::KeyPair::generate().expect("key");
    let mut params = rcgen::CertificateParams::new(vec![]).expect("params");
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "Shared Intermediate");
    let intermediate = params.self_signed(&root_key).expect("cert").der().to_vec();

    let cache = Arc::new(MemoryCertCache::new());
    let validator = Arc::new(ScriptedValidator::new(Verdict::Accept));
    let verifier = Arc::new(ChainVerifier::new(cache.clone(), validator.clone()));

    let workers: Vec<_> = (0..8u8)
        .map(|i| {
            let verifier = Arc::clone(&verifier);
            let intermediate = intermediate.clone();
            std::thread::spawn(move || {
                let handshake = InstrumentedHandshake {
                    certs: vec![
                        Certificate::from_der(vec![0x30, 0x02, i]),
                        Certificate::from_der(intermediate),
                    ],
                    hostname: None,
                    valid: true,
                    lookups: AtomicUsize::new(0),
                    checks: AtomicUsize::new(0),
                };
                run(verifier.as_ref(), TrustFlags::TRUST_SYSTEM_STORE, &handshake)
                    .expect("accepted");
                handshake.assert_all_released();
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(cache.len(), 1);
    assert_eq!(validator.calls.lock().unwrap().len(), 8);
}
