// src/lib.rs

//! # GCRA Rate Limiter
//!
//! A keyed, thread-safe rate limiter based on the Generic Cell Rate Algorithm
//! (GCRA). Each key costs one timestamp of state; decisions are O(1) and never
//! block waiting for capacity.
//!
//! ## Quick Example
//!
//! ```rust
//! use gcra_rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! // 1 request per second sustained, up to 5 at once
//! let config = RateLimiterConfig::new(1.0, 5);
//! let limiter = RateLimiter::new(config).unwrap();
//!
//! let decision = limiter.allow("203.0.113.7".to_string());
//! if decision.admitted {
//!     println!("200 OK");
//! } else {
//!     println!("429 Too Many Requests, Retry-After: {}", decision.retry_after_secs());
//! }
//! ```
//!
//! ## Deterministic time
//!
//! ```rust
//! use gcra_rate_limiter::{ManualClock, RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! let clock = ManualClock::default();
//! let limiter = RateLimiter::with_config(RateLimiterConfig::new(1.0, 5), clock.clone()).unwrap();
//!
//! for _ in 0..5 {
//!     assert!(limiter.allow("client").admitted);
//! }
//! let rejected = limiter.allow("client");
//! assert_eq!(rejected.retry_after, Duration::from_secs(1));
//!
//! clock.advance(Duration::from_secs(5));
//! assert!(limiter.allow("client").admitted);
//! ```
//!
//! ## Memory
//!
//! Keys are created lazily. Call [`RateLimiter::sweep_idle`] periodically to
//! drop quiet keys, and set [`RateLimiterConfig::max_keys`] to bound the key
//! space outright.

// private modules
mod clock;
mod config;
mod errors;
mod rate_limiter;
mod store;

// public API exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ANONYMOUS_KEY, EmptyKeyPolicy, RateLimiterConfig};
pub use errors::RateLimiterError;
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use store::KeyState;
