// src/rate_limiter.rs

// gcra-rate-limiter: A keyed rate limiter based on the Generic Cell Rate Algorithm (GCRA).

// dependencies
use crate::clock::{Clock, MonotonicClock, duration_to_nanos};
use crate::config::RateLimiterConfig;
use crate::errors::RateLimiterError;
use crate::store::{KeyState, KeyStore};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

/// The main RateLimiter model.
///
/// `K` identifies clients (an IP address, an API key, ...). `C` is the clock
/// type, defaulting to [`MonotonicClock`].
///
/// The limiter keeps a single timestamp per key, the theoretical arrival time
/// (TAT). A request arriving at `now` is admitted when
///
/// ```text
/// now >= tat + emission_interval - delay_tolerance
/// ```
///
/// and then moves the TAT to `max(tat, now) + emission_interval`. Rejected
/// requests leave the TAT alone, so they cost the caller nothing.
///
/// Share it between threads behind an `Arc`; all methods take `&self`.
pub struct RateLimiter<K, C = MonotonicClock>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    config: RateLimiterConfig,
    emission_interval_nanos: u64,
    delay_tolerance_nanos: u64,
    store: KeyStore<K>,
    clock: C,
}

impl<K, C> fmt::Debug for RateLimiter<K, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("keys", &self.store.len())
            .finish()
    }
}

impl<K> RateLimiter<K, MonotonicClock>
where
    K: Hash + Eq + Clone,
{
    /// Create a rate limiter driven by a fresh [`MonotonicClock`].
    pub fn new(config: RateLimiterConfig) -> Result<Self, RateLimiterError> {
        Self::with_config(config, MonotonicClock::new())
    }
}

// methods for the RateLimiter type
impl<K, C> RateLimiter<K, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    /// Create a new rate limiter from a config object and a clock.
    ///
    /// Fails if the configuration is invalid; a limiter is never built from a
    /// configuration it cannot honor.
    pub fn with_config(config: RateLimiterConfig, clock: C) -> Result<Self, RateLimiterError> {
        config.validate()?;

        let emission_interval_nanos = config.emission_interval_nanos();
        let delay_tolerance_nanos = config.delay_tolerance_nanos();

        tracing::info!(
            rate_per_second = config.rate_per_second,
            burst = config.burst,
            emission_interval_ns = emission_interval_nanos,
            max_keys = ?config.max_keys,
            idle_eviction_after = ?config.idle_eviction_after,
            "rate limiter configured"
        );

        Ok(Self {
            config,
            emission_interval_nanos,
            delay_tolerance_nanos,
            store: KeyStore::new(),
            clock,
        })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // accessor method to return the sustained rate in requests per second
    pub fn rate(&self) -> f64 {
        self.config.rate_per_second
    }

    // accessor method to return the burst capacity
    pub fn burst(&self) -> u32 {
        self.config.burst
    }

    pub fn emission_interval(&self) -> Duration {
        Duration::from_nanos(self.emission_interval_nanos)
    }

    pub fn delay_tolerance(&self) -> Duration {
        Duration::from_nanos(self.delay_tolerance_nanos)
    }

    /// Decide whether a request for `key` is admitted, reading `now` from the
    /// limiter's clock.
    pub fn allow(&self, key: K) -> RateLimitDecision {
        self.allow_at(key, self.clock.now())
    }

    /// Decide whether a request for `key` arriving at `now` (nanoseconds on the
    /// limiter's clock) is admitted.
    ///
    /// Never blocks waiting for capacity. Calls for the same key are
    /// serialized; calls for keys on different shards run in parallel.
    pub fn allow_at(&self, key: K, now: u64) -> RateLimitDecision {
        let keep = self.config.max_keys.map(|max| (max, key.clone()));

        let (decision, inserted) = self
            .store
            .with_state(key, now, |state| self.decide(state, now));

        if inserted {
            if let Some((max_keys, key)) = keep {
                self.enforce_key_limit(max_keys, &key, now);
            }
        }

        tracing::trace!(
            admitted = decision.admitted,
            retry_after_ns = duration_to_nanos(decision.retry_after),
            remaining = decision.remaining,
            "rate limit decision"
        );
        decision
    }

    // the GCRA conformance test and state update for one key
    fn decide(&self, state: &mut KeyState, now: u64) -> RateLimitDecision {
        state.last_seen = state.last_seen.max(now);

        let allow_at = self.allow_at_nanos(state.tat);
        if now >= allow_at {
            state.tat = state.tat.max(now).saturating_add(self.emission_interval_nanos);
            RateLimitDecision {
                admitted: true,
                retry_after: Duration::ZERO,
                remaining: self.remaining_capacity(now, state.tat),
                reset_after: Duration::from_nanos(state.tat.saturating_sub(now)),
            }
        } else {
            RateLimitDecision {
                admitted: false,
                retry_after: Duration::from_nanos(allow_at - now),
                remaining: 0,
                reset_after: Duration::from_nanos(state.tat.saturating_sub(now)),
            }
        }
    }

    // earliest instant at which a request against `tat` conforms
    fn allow_at_nanos(&self, tat: u64) -> u64 {
        tat.saturating_add(self.emission_interval_nanos)
            .saturating_sub(self.delay_tolerance_nanos)
    }

    // whole requests still admissible at `now` given the updated TAT
    fn remaining_capacity(&self, now: u64, tat: u64) -> u32 {
        let headroom = now
            .saturating_add(self.delay_tolerance_nanos)
            .saturating_sub(tat);
        let remaining = headroom / self.emission_interval_nanos;
        u32::try_from(remaining)
            .unwrap_or(u32::MAX)
            .min(self.config.burst)
    }

    fn enforce_key_limit(&self, max_keys: usize, keep: &K, now: u64) {
        let eviction = self.store.evict_excess(max_keys, keep, now);
        if eviction.removed > 0 {
            tracing::debug!(
                removed = eviction.removed,
                max_keys,
                "evicted least recently seen keys"
            );
        }
        if eviction.undrained > 0 {
            tracing::warn!(
                undrained = eviction.undrained,
                max_keys,
                "key limit forced eviction of keys that were still rate limited"
            );
        }
    }

    /// Drop keys that have been quiet for longer than the configured
    /// `idle_eviction_after`. Does nothing when no threshold is configured.
    ///
    /// Meant to be called periodically by the surrounding service. Returns the
    /// number of keys removed.
    pub fn sweep_idle(&self) -> usize {
        match self.config.idle_eviction_after {
            Some(threshold) => self.sweep_idle_older_than(threshold),
            None => 0,
        }
    }

    /// Drop keys that have been quiet for longer than `max_idle`.
    ///
    /// Only keys whose bucket has fully drained are removed, so a key that
    /// comes back after eviction gets exactly the decision it would have got
    /// had it been kept.
    pub fn sweep_idle_older_than(&self, max_idle: Duration) -> usize {
        let now = self.clock.now();
        let removed = self.store.sweep_idle(now, duration_to_nanos(max_idle));
        tracing::debug!(
            removed,
            remaining_keys = self.store.len(),
            "idle key sweep finished"
        );
        removed
    }

    /// Forget every key, as if the process had restarted.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.contains_key(key)
    }

    /// Snapshot of the state tracked for `key`, if any.
    pub fn key_state<Q>(&self, key: &Q) -> Option<KeyState>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get(key)
    }
}

impl<C> RateLimiter<String, C>
where
    C: Clock,
{
    /// Decide on a request whose key may be empty or missing, applying the
    /// configured [`EmptyKeyPolicy`](crate::EmptyKeyPolicy).
    ///
    /// This is the only decision path that can fail, and only with
    /// [`RateLimiterError::InvalidKey`].
    pub fn allow_key(&self, raw: Option<&str>) -> Result<RateLimitDecision, RateLimiterError> {
        let key = self.config.empty_key_policy.resolve(raw)?;
        Ok(self.allow(key.to_owned()))
    }
}

/// Result of a rate limiting decision with metadata for HTTP responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request should be allowed
    pub admitted: bool,
    /// How long until a retry would be admitted; zero when admitted
    pub retry_after: Duration,
    /// Further requests that would be admitted at the same instant
    pub remaining: u32,
    /// Time until the key is back to full burst capacity
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// `retry_after` in whole seconds, rounded up, for a `Retry-After` header.
    /// Always at least 1 for a rejection.
    pub fn retry_after_secs(&self) -> u64 {
        if self.admitted {
            return 0;
        }
        let secs = self.retry_after.as_secs() + u64::from(self.retry_after.subsec_nanos() > 0);
        secs.max(1)
    }
}
