// crates/campaign-lens-core/src/clock.rs
// ============================================================================
// Module: Clock
// Description: Wall-clock abstraction for credential expiry decisions.
// Purpose: Allow deterministic expiry tests without sleeping.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Expiry timestamps are absolute epoch milliseconds, matching the durable
//! credential file format. The [`Clock`] trait is injected into the
//! credential manager so tests can pin "now".

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Source of the current wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
    }
}
