// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::EngineError;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    model: String,
    value: Value,
    created_at: Instant,
}

/// Bounded memoization of prediction results.
///
/// Entries are evicted by LRU pressure and never served past their TTL;
/// a version switch purges every entry for the affected model.
#[derive(Debug)]
pub struct InferenceCache {
    ttl: Duration,
    entries: Mutex<LruCache<u64, CacheEntry>>,
}

impl InferenceCache {
    pub fn new(config: CacheConfig) -> Result<Self, EngineError> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            EngineError::invalid_input("inference cache capacity must be >= 1")
        })?;
        if config.ttl.is_zero() {
            return Err(EngineError::invalid_input(
                "inference cache ttl must be > 0",
            ));
        }
        Ok(Self {
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Returns the cached value when present and fresh; expired entries are
    /// dropped on the way out.
    pub fn get(&self, fingerprint: u64) -> Option<Value> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(&fingerprint) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&fingerprint);
        }
        None
    }

    pub fn put(&self, fingerprint: u64, model: &str, value: Value) {
        self.entries.lock().put(
            fingerprint,
            CacheEntry {
                model: model.to_string(),
                value,
                created_at: Instant::now(),
            },
        );
    }

    /// Removes every entry belonging to `model`.
    pub fn purge_model(&self, model: &str) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<u64> = entries
            .iter()
            .filter(|(_, entry)| entry.model == model)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Deterministic FNV-1a fingerprint of a model name, version, and canonical
/// JSON input. serde_json keeps object keys sorted, so equal inputs always
/// produce equal fingerprints.
pub fn fingerprint(model: &str, version: &str, input: &Value) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    let mut absorb = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
    };
    absorb(model.as_bytes());
    absorb(&[0]);
    absorb(version.as_bytes());
    absorb(&[0]);
    absorb(input.to_string().as_bytes());
    hash
}

#[cfg(test)]
mod tests {
    use super::{fingerprint, CacheConfig, InferenceCache};
    use serde_json::json;
    use std::time::Duration;

    fn small_cache(capacity: usize, ttl_ms: u64) -> InferenceCache {
        InferenceCache::new(CacheConfig {
            capacity,
            ttl: Duration::from_millis(ttl_ms),
        })
        .unwrap()
    }

    #[test]
    fn equal_inputs_produce_equal_fingerprints() {
        let a = fingerprint("m", "1.0.0", &json!({"x": 1.0, "y": 2.0}));
        let b = fingerprint("m", "1.0.0", &json!({"y": 2.0, "x": 1.0}));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprints_separate_models_versions_and_inputs() {
        let base = fingerprint("m", "1.0.0", &json!({"x": 1.0}));
        assert_ne!(base, fingerprint("n", "1.0.0", &json!({"x": 1.0})));
        assert_ne!(base, fingerprint("m", "1.0.1", &json!({"x": 1.0})));
        assert_ne!(base, fingerprint("m", "1.0.0", &json!({"x": 2.0})));
    }

    #[test]
    fn get_returns_fresh_entries_only() {
        let cache = small_cache(8, 10_000);
        cache.put(1, "m", json!(42));
        assert_eq!(cache.get(1), Some(json!(42)));
        assert_eq!(cache.get(2), None);
    }

    #[test]
    fn expired_entries_are_never_returned() {
        let cache = small_cache(8, 1);
        cache.put(1, "m", json!(42));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn lru_pressure_evicts_oldest() {
        let cache = small_cache(2, 10_000);
        cache.put(1, "m", json!(1));
        cache.put(2, "m", json!(2));
        cache.put(3, "m", json!(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1), None);
        assert_eq!(cache.get(3), Some(json!(3)));
    }

    #[test]
    fn purge_model_removes_only_that_models_entries() {
        let cache = small_cache(8, 10_000);
        cache.put(1, "a", json!(1));
        cache.put(2, "b", json!(2));
        cache.put(3, "a", json!(3));
        assert_eq!(cache.purge_model("a"), 2);
        assert_eq!(cache.get(2), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(InferenceCache::new(CacheConfig {
            capacity: 0,
            ttl: Duration::from_secs(1),
        })
        .is_err());
    }
}
