// src/errors.rs

// error handling for the rate limiter type

/// Error type for rate limiter configuration and key resolution issues.
///
/// Admission decisions themselves never fail; a rejected request is a normal
/// [`RateLimitDecision`](crate::RateLimitDecision), not an error.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimiterError {
    /// Rate is zero, negative, not finite, or too high to express in nanoseconds.
    #[error("rate must be positive, finite and at most one request per nanosecond")]
    InvalidRate,
    /// Burst is zero.
    #[error("burst must be at least 1")]
    InvalidBurst,
    /// Idle eviction threshold is zero.
    #[error("idle eviction threshold must be non-zero")]
    InvalidIdleThreshold,
    /// Key cap is zero.
    #[error("max_keys must be at least 1")]
    InvalidMaxKeys,
    /// Empty or missing rate-limit key under the `Reject` policy.
    #[error("rate-limit key is empty or missing")]
    InvalidKey,
}

impl RateLimiterError {
    /// Whether the error comes from construction-time configuration.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, RateLimiterError::InvalidKey)
    }
}
