//! Caller trust flags and the validation policy derived from them.
//!
//! The policy is computed fresh for every handshake:
//! - `TLS` is always set.
//! - A handshake with the keyserver pool hostname trusts only the pool's
//!   dedicated anchor, whatever the caller asked for.
//! - Any other hostname takes its anchor directives from [`TrustFlags`].
//! - `NO_REVOCATION_CHECK` applies in both cases.

use bitflags::bitflags;

/// Hostname of the HKPS keyserver pool. Compared ASCII case-insensitively.
pub const POOL_HOSTNAME: &str = "hkps.pool.sks-keyservers.net";

bitflags! {
    /// Trust preferences supplied by the caller of a connection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TrustFlags: u32 {
        /// Trust the configured default (keyserver) anchors.
        const TRUST_DEFAULT_POOL = 1 << 0;
        /// Trust the system anchor store.
        const TRUST_SYSTEM_STORE = 1 << 1;
        /// Do not check revocation status.
        const NO_REVOCATION_CHECK = 1 << 2;
    }
}

bitflags! {
    /// Directives handed to the chain validator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValidationPolicy: u32 {
        /// Validate for use as a TLS server certificate.
        const TLS = 1 << 0;
        /// Trust the dedicated anchor of the keyserver pool.
        const TRUST_POOL = 1 << 1;
        /// Trust the configured default anchors.
        const TRUST_DEFAULT = 1 << 2;
        /// Trust the system anchor store.
        const TRUST_SYSTEM = 1 << 3;
        /// Skip revocation checks.
        const SKIP_REVOCATION = 1 << 4;
    }
}

/// Where the anchors for a decision come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSource {
    /// The hostname is the keyserver pool; caller flags are ignored.
    PoolOverride,
    /// Anchors follow the caller's flags.
    FromFlags(TrustFlags),
}

/// Returns true if `hostname` names the keyserver pool.
pub fn is_pool_hostname(hostname: &str) -> bool {
    hostname.eq_ignore_ascii_case(POOL_HOSTNAME)
}

impl AnchorSource {
    /// Decide the anchor source for a handshake.
    pub fn select(hostname: Option<&str>, flags: TrustFlags) -> Self {
        match hostname {
            Some(name) if is_pool_hostname(name) => Self::PoolOverride,
            _ => Self::FromFlags(flags),
        }
    }

    fn directives(self) -> ValidationPolicy {
        match self {
            Self::PoolOverride => ValidationPolicy::TRUST_POOL,
            Self::FromFlags(flags) => {
                let mut policy = ValidationPolicy::empty();
                if flags.contains(TrustFlags::TRUST_DEFAULT_POOL) {
                    policy |= ValidationPolicy::TRUST_DEFAULT;
                }
                if flags.contains(TrustFlags::TRUST_SYSTEM_STORE) {
                    policy |= ValidationPolicy::TRUST_SYSTEM;
                }
                policy
            }
        }
    }
}

impl ValidationPolicy {
    /// Compute the policy for a handshake with `hostname` under `flags`.
    pub fn for_handshake(hostname: Option<&str>, flags: TrustFlags) -> Self {
        let mut policy = Self::TLS | AnchorSource::select(hostname, flags).directives();

        if flags.contains(TrustFlags::NO_REVOCATION_CHECK) {
            policy |= Self::SKIP_REVOCATION;
        }

        policy
    }

    /// True if the policy names at least one anchor class.
    pub fn has_anchor_directive(self) -> bool {
        self.intersects(Self::TRUST_POOL | Self::TRUST_DEFAULT | Self::TRUST_SYSTEM)
    }
}
