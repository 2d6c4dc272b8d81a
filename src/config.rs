// src/config.rs

//! Configuration types for the rate limiter

// dependencies
use crate::clock::duration_to_nanos;
use crate::errors::RateLimiterError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Key reserved for requests that arrive without an identifiable caller when
/// the policy is [`EmptyKeyPolicy::Anonymous`].
///
/// It is the empty string: caller-supplied keys are trimmed and must be
/// non-empty, so no real caller can resolve to this bucket.
pub const ANONYMOUS_KEY: &str = "";

/// What to do with an empty or missing rate-limit key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyKeyPolicy {
    /// Refuse the request with [`RateLimiterError::InvalidKey`].
    #[default]
    Reject,
    /// Account the request against the shared [`ANONYMOUS_KEY`] bucket,
    /// which no identified caller can share.
    Anonymous,
}

impl EmptyKeyPolicy {
    /// Resolve a raw key into the key that should be charged.
    pub fn resolve<'a>(&self, raw: Option<&'a str>) -> Result<&'a str, RateLimiterError> {
        match (raw.map(str::trim).filter(|k| !k.is_empty()), self) {
            (Some(key), _) => Ok(key),
            (None, EmptyKeyPolicy::Reject) => Err(RateLimiterError::InvalidKey),
            (None, EmptyKeyPolicy::Anonymous) => Ok(ANONYMOUS_KEY),
        }
    }
}

/// Configuration for rate limiter behavior.
///
/// Set once when the limiter is built; the limiter never changes it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub(crate) rate_per_second: f64,
    pub(crate) burst: u32,
    #[serde(default)]
    pub(crate) idle_eviction_after: Option<Duration>,
    #[serde(default)]
    pub(crate) max_keys: Option<usize>,
    #[serde(default)]
    pub(crate) empty_key_policy: EmptyKeyPolicy,
}

impl RateLimiterConfig {
    /// Create a new configuration with rate and burst settings
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        Self {
            rate_per_second,
            burst,
            idle_eviction_after: None,
            max_keys: None,
            empty_key_policy: EmptyKeyPolicy::default(),
        }
    }

    /// Builder-style: set rate per second
    pub fn rate(mut self, rate_per_second: f64) -> Self {
        self.rate_per_second = rate_per_second;
        self
    }

    /// Builder-style: set burst capacity
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Builder-style: let `sweep_idle` drop keys quiet for longer than `after`
    pub fn idle_eviction_after(mut self, after: Duration) -> Self {
        self.idle_eviction_after = Some(after);
        self
    }

    /// Builder-style: cap the number of tracked keys
    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Builder-style: choose how empty keys are handled
    pub fn empty_key_policy(mut self, policy: EmptyKeyPolicy) -> Self {
        self.empty_key_policy = policy;
        self
    }

    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    pub fn burst_capacity(&self) -> u32 {
        self.burst
    }

    pub fn idle_threshold(&self) -> Option<Duration> {
        self.idle_eviction_after
    }

    pub fn key_limit(&self) -> Option<usize> {
        self.max_keys
    }

    pub fn key_policy(&self) -> EmptyKeyPolicy {
        self.empty_key_policy
    }

    /// Virtual time charged per admitted request (`1 / rate`).
    pub fn emission_interval(&self) -> Duration {
        Duration::from_nanos(self.emission_interval_nanos())
    }

    /// How far the theoretical arrival time may run ahead of real time
    /// (`emission_interval * burst`).
    pub fn delay_tolerance(&self) -> Duration {
        Duration::from_nanos(self.delay_tolerance_nanos())
    }

    pub(crate) fn emission_interval_nanos(&self) -> u64 {
        // truncates, so the interval never exceeds the true period `1 / rate`;
        // float-to-int casts saturate, and validate() rules out the degenerate cases
        (NANOS_PER_SEC / self.rate_per_second) as u64
    }

    pub(crate) fn delay_tolerance_nanos(&self) -> u64 {
        self.emission_interval_nanos()
            .saturating_mul(u64::from(self.burst))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RateLimiterError> {
        if !self.rate_per_second.is_finite() || self.rate_per_second <= 0.0 {
            return Err(RateLimiterError::InvalidRate);
        }
        if self.emission_interval_nanos() == 0 {
            return Err(RateLimiterError::InvalidRate);
        }
        if self.burst == 0 {
            return Err(RateLimiterError::InvalidBurst);
        }
        if let Some(after) = self.idle_eviction_after {
            if duration_to_nanos(after) == 0 {
                return Err(RateLimiterError::InvalidIdleThreshold);
            }
        }
        if self.max_keys == Some(0) {
            return Err(RateLimiterError::InvalidMaxKeys);
        }
        Ok(())
    }
}
