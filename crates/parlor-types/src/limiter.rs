//! Token-bucket state and policy types for Parlor.
//!
//! Buckets refill lazily as a pure function of elapsed wall-clock time --
//! there is no background refill task. The persisted state is small enough
//! to round-trip through the session store on every admission check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Admission policy for one class of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
    /// Sustained refill rate, in tokens per minute.
    pub rate_per_minute: u32,
    /// Maximum tokens the bucket can hold (and its initial fill).
    pub burst: u32,
}

impl RatePolicy {
    /// Milliseconds between single-token refills.
    pub fn refill_interval_ms(&self) -> i64 {
        60_000 / i64::from(self.rate_per_minute.max(1))
    }
}

/// Persisted per-client token bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub tokens: i64,
    pub last_refill: DateTime<Utc>,
}

impl BucketState {
    /// A fresh bucket holding the policy's full burst.
    pub fn full(policy: &RatePolicy, now: DateTime<Utc>) -> Self {
        Self {
            tokens: i64::from(policy.burst),
            last_refill: now,
        }
    }

    /// Apply lazy refill for the wall-clock time elapsed since `last_refill`.
    ///
    /// Only whole refill intervals grant tokens; a partial interval leaves
    /// the bucket untouched, so a burst arriving within one interval can
    /// never be granted more than `burst` tokens in total.
    pub fn refilled(&self, policy: &RatePolicy, now: DateTime<Utc>) -> Self {
        let elapsed_ms = (now - self.last_refill).num_milliseconds();
        let whole_intervals = elapsed_ms / policy.refill_interval_ms();
        if whole_intervals <= 0 {
            return self.clone();
        }
        Self {
            tokens: (self.tokens + whole_intervals).min(i64::from(policy.burst)),
            last_refill: now,
        }
    }
}
