//! Caller-scoped handles passed into the verification callback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Caller context that routes a trust decision to a validator.
///
/// Carries no state the callback mutates. The only constructor yields a
/// valid context, so there is nothing to check at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustContext {
    id: u64,
    label: Option<String>,
}

impl TrustContext {
    /// Create a context with a process-unique id.
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            label: None,
        }
    }

    /// Create a context tagged with a label for log output.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Default for TrustContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrustContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "ctx#{}({label})", self.id),
            None => write!(f, "ctx#{}", self.id),
        }
    }
}

/// Opaque handle of the transport that owns the handshake. Never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportHandle(pub u64);

/// Opaque handle of the session that owns the handshake. Never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionHandle(pub u64);
