// crates/dialog-state-core/src/runtime/expiry.rs
// ============================================================================
// Module: Session Expiry Policies
// Description: Built-in implementations of the expiry hook.
// Purpose: Provide the default "never expired" policy and an idle timeout.
// Dependencies: crate::{core, interfaces}
// ============================================================================

use std::time::Duration;

use crate::core::Session;
use crate::core::Timestamp;
use crate::interfaces::ExpiryPolicy;

/// Policy that never reports a session as expired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpires;

impl ExpiryPolicy for NeverExpires {
    fn is_expired(&self, _session: &Session, _now: Timestamp) -> bool {
        false
    }
}

/// Expires sessions that have not been written for longer than a timeout.
///
/// # Invariants
/// - A zero timeout never expires anything.
#[derive(Debug, Clone, Copy)]
pub struct IdleTimeoutExpiry {
    /// Maximum idle time since the last write.
    timeout: Duration,
}

impl IdleTimeoutExpiry {
    /// Creates an idle-timeout policy.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
        }
    }

    /// Returns the configured idle timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ExpiryPolicy for IdleTimeoutExpiry {
    fn is_expired(&self, session: &Session, now: Timestamp) -> bool {
        !self.timeout.is_zero() && now.duration_since(session.active_on) > self.timeout
    }
}
