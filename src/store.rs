// src/store.rs

//! Per-key GCRA state and the concurrent map that owns it.

// dependencies
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the limiter remembers about one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    /// Theoretical arrival time, nanoseconds on the limiter's clock.
    pub(crate) tat: u64,
    /// Time of the most recent decision; only consulted by eviction.
    pub(crate) last_seen: u64,
}

impl KeyState {
    pub(crate) fn new(now: u64) -> Self {
        Self {
            tat: now,
            last_seen: now,
        }
    }

    pub fn tat(&self) -> u64 {
        self.tat
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// A drained key has full burst capacity and is indistinguishable from a
    /// key that was never seen.
    pub fn is_drained(&self, now: u64) -> bool {
        self.tat <= now
    }
}

/// Outcome of a capacity eviction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Eviction {
    pub(crate) removed: usize,
    /// Removed keys whose bucket still held debt.
    pub(crate) undrained: usize,
}

/// Sharded key -> state map.
///
/// Every mutation of a key's state happens while the key's shard is
/// write-locked, so decisions for one key are linearized and eviction can't
/// interleave with a decision in flight.
#[derive(Debug)]
pub(crate) struct KeyStore<K>
where
    K: Hash + Eq,
{
    states: DashMap<K, KeyState>,
    evicting: AtomicBool,
}

impl<K> KeyStore<K>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            states: DashMap::new(),
            evicting: AtomicBool::new(false),
        }
    }

    /// Run `f` on the state for `key`, creating it at `now` if absent.
    /// The boolean is true when the key was newly inserted.
    pub(crate) fn with_state<R>(
        &self,
        key: K,
        now: u64,
        f: impl FnOnce(&mut KeyState) -> R,
    ) -> (R, bool) {
        match self.states.entry(key) {
            Entry::Occupied(mut occupied) => (f(occupied.get_mut()), false),
            Entry::Vacant(vacant) => {
                let mut state = KeyState::new(now);
                let result = f(&mut state);
                vacant.insert(state);
                (result, true)
            }
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<KeyState>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.states.get(key).map(|entry| *entry.value())
    }

    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.states.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn clear(&self) {
        self.states.clear();
    }

    /// Remove keys idle for longer than `max_idle` whose buckets have drained.
    pub(crate) fn sweep_idle(&self, now: u64, max_idle: u64) -> usize {
        let mut removed = 0;
        self.states.retain(|_, state| {
            let idle = now.saturating_sub(state.last_seen) > max_idle;
            let evict = idle && state.is_drained(now);
            if evict {
                removed += 1;
            }
            !evict
        });
        removed
    }

    /// Bring the map back under `max_keys` by dropping the least recently seen
    /// keys.
    ///
    /// Eviction runs in batches: once over the cap, the map is shrunk to
    /// `low_watermark(max_keys)` so the scan is paid once per ~10% of the cap rather
    /// than on every new key. Only one thread scans at a time; others skip and
    /// leave the overshoot to the running pass or the next insert.
    ///
    /// `keep` is never a candidate. A candidate is only removed if its
    /// `last_seen` is unchanged since the scan, so a key that took a decision
    /// in the meantime survives.
    pub(crate) fn evict_excess(&self, max_keys: usize, keep: &K, now: u64) -> Eviction {
        if self.states.len() <= max_keys {
            return Eviction::default();
        }
        let Some(_pass) = EvictionPass::begin(&self.evicting) else {
            return Eviction::default();
        };

        let len = self.states.len();
        let target = low_watermark(max_keys);
        if len <= max_keys {
            return Eviction::default();
        }
        let excess = len - target;

        let mut candidates: Vec<(K, u64)> = self
            .states
            .iter()
            .filter(|entry| entry.key() != keep)
            .map(|entry| (entry.key().clone(), entry.value().last_seen))
            .collect();
        if excess < candidates.len() {
            candidates.select_nth_unstable_by_key(excess, |(_, last_seen)| *last_seen);
            candidates.truncate(excess);
        }

        let mut eviction = Eviction::default();
        for (key, seen) in candidates {
            if let Some((_, state)) = self.states.remove_if(&key, |_, s| s.last_seen == seen) {
                eviction.removed += 1;
                if !state.is_drained(now) {
                    eviction.undrained += 1;
                }
            }
        }
        eviction
    }
}

/// Size the map is shrunk to once it exceeds `max_keys`.
pub(crate) fn low_watermark(max_keys: usize) -> usize {
    max_keys - max_keys / 10
}

// single-flight guard for capacity eviction
struct EvictionPass<'a>(&'a AtomicBool);

impl<'a> EvictionPass<'a> {
    fn begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for EvictionPass<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
