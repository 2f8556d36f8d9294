//! Query result cache: deterministic fingerprints plus a capacity-bounded,
//! TTL-aware, LRU-evicting in-memory store.
//!
//! The cache is a plain `HashMap` with an explicit recency order, guarded by
//! one mutex. Lookups and writes are cheap; nothing here blocks beyond lock
//! acquisition.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Configuration for the query result cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub default_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_secs: 300,
        }
    }
}

/// Derive a deterministic cache key from a database name, query text and
/// bound parameters.
///
/// Whitespace runs in the query collapse to single spaces and the text is
/// lower-cased, so formatting differences share one entry. Lower-casing
/// covers string literals too, so queries differing only in literal case
/// collapse to the same key.
///
/// Parameters serialize with recursively sorted keys, so the same bindings
/// produce the same key regardless of insertion order. The digest is MD5;
/// nothing security-relevant hangs off these keys.
pub fn fingerprint(
    db_name: &str,
    query: &str,
    params: Option<&serde_json::Map<String, Value>>,
) -> String {
    let normalized = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let params_str = match params {
        Some(p) if !p.is_empty() => {
            let mut out = String::new();
            canonical_json(&Value::Object(p.clone()), &mut out);
            out
        }
        _ => String::new(),
    };

    let mut hasher = Md5::new();
    hasher.update(db_name.as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    hasher.update(b":");
    hasher.update(params_str.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compact JSON with object keys sorted at every nesting level.
fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                canonical_json(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    created_at: SystemTime,
    expires_at: SystemTime,
    hits: u64,
    last_hit_at: SystemTime,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Recency order: least-recently-used at the front, MRU at the back.
    /// A key appears here iff it has a live entry, exactly once.
    lru: Vec<String>,
}

impl CacheInner {
    fn remove_entry(&mut self, key: &str) {
        self.entries.remove(key);
        self.lru.retain(|k| k != key);
    }
}

/// Move `key` to the MRU position.
fn promote(lru: &mut Vec<String>, key: &str) {
    lru.retain(|k| k != key);
    lru.push(key.to_string());
}

/// Capacity-bounded, TTL-aware LRU cache for query result payloads.
pub struct ResultCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Cache state stays consistent even if a holder panicked mid-update:
        // every mutation completes or the entry is simply absent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a live entry. Expired entries are removed as a side effect
    /// and reported as a miss. A hit bumps the hit count and the recency
    /// position.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let now = SystemTime::now();

        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => now >= entry.expires_at,
        };

        if expired {
            inner.remove_entry(key);
            debug!(target: "cache", key, "Dropped expired entry on lookup");
            return None;
        }

        let CacheInner { entries, lru } = &mut *inner;
        let entry = entries.get_mut(key)?;
        entry.hits += 1;
        entry.last_hit_at = now;
        promote(lru, key);
        Some(entry.payload.clone())
    }

    /// Insert or refresh an entry. When the cache is full and `key` is new,
    /// the least-recently-used entry is evicted first, so the capacity bound
    /// holds when this returns. A non-positive TTL stores an entry that the
    /// next lookup treats as already expired.
    pub fn set(&self, key: String, payload: Value, ttl_secs: Option<i64>) {
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_entries {
            if let Some(oldest) = inner.lru.first().cloned() {
                inner.remove_entry(&oldest);
                debug!(target: "cache", key = %oldest, "Evicted least-recently-used entry");
            }
        }

        let now = SystemTime::now();
        let ttl = ttl_secs.unwrap_or(self.config.default_ttl_secs);
        let expires_at = if ttl > 0 {
            now + Duration::from_secs(ttl as u64)
        } else {
            now
        };

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                payload,
                created_at: now,
                expires_at,
                hits: 1,
                last_hit_at: now,
            },
        );
        promote(&mut inner.lru, &key);
    }

    /// Remove every expired entry, returning how many were dropped. Run on
    /// a fixed interval so cold entries do not linger until the next lookup.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = SystemTime::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| now >= e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            inner.remove_entry(key);
        }

        expired.len()
    }

    /// Read-only diagnostic snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();

        let approximate_size_bytes = inner
            .entries
            .values()
            .map(|e| e.payload.to_string().len())
            .sum();

        CacheStats {
            total_items: inner.entries.len(),
            hits_by_key: inner
                .entries
                .iter()
                .map(|(k, e)| (k.clone(), e.hits))
                .collect(),
            approximate_size_bytes,
            expirations: inner
                .entries
                .iter()
                .map(|(k, e)| (k.clone(), unix_secs(e.expires_at)))
                .collect(),
            created: inner
                .entries
                .iter()
                .map(|(k, e)| (k.clone(), unix_secs(e.created_at)))
                .collect(),
            last_hits: inner
                .entries
                .iter()
                .map(|(k, e)| (k.clone(), unix_secs(e.last_hit_at)))
                .collect(),
        }
    }

    /// Empty the cache, the recency order and the expiry index together.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.lru.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub hits_by_key: HashMap<String, u64>,
    pub approximate_size_bytes: usize,
    /// Unix timestamps at which each entry expires.
    pub expirations: HashMap<String, u64>,
    /// Unix timestamps at which each entry was stored.
    pub created: HashMap<String, u64>,
    /// Unix timestamps of each entry's most recent hit.
    pub last_hits: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_cache(max_entries: usize) -> ResultCache {
        ResultCache::new(CacheConfig {
            max_entries,
            default_ttl_secs: 300,
        })
    }

    fn params(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let p = params(&[("a", json!(1)), ("b", json!("x"))]);
        let k1 = fingerprint("db", "SELECT * FROM t", Some(&p));
        let k2 = fingerprint("db", "SELECT * FROM t", Some(&p));
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 32);
        assert!(k1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_whitespace_and_case_invariant() {
        let k1 = fingerprint("db", "SELECT  *\n\tFROM t", None);
        let k2 = fingerprint("db", "select * from t", None);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_fingerprint_param_order_invariant() {
        let p1 = params(&[("a", json!(1)), ("b", json!(2))]);
        let p2 = params(&[("b", json!(2)), ("a", json!(1))]);
        assert_eq!(
            fingerprint("db", "SELECT 1", Some(&p1)),
            fingerprint("db", "SELECT 1", Some(&p2))
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_inputs() {
        let base = fingerprint("db", "SELECT 1", None);
        assert_ne!(base, fingerprint("other", "SELECT 1", None));
        assert_ne!(base, fingerprint("db", "SELECT 2", None));
        let p = params(&[("a", json!(1))]);
        assert_ne!(base, fingerprint("db", "SELECT 1", Some(&p)));
    }

    #[test]
    fn test_empty_params_same_as_none() {
        let empty = params(&[]);
        assert_eq!(
            fingerprint("db", "SELECT 1", Some(&empty)),
            fingerprint("db", "SELECT 1", None)
        );
    }

    #[test]
    fn test_capacity_bound_and_lru_eviction() {
        let cache = small_cache(2);
        cache.set("a".into(), json!(1), None);
        cache.set("b".into(), json!(2), None);
        cache.set("c".into(), json!(3), None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest key must be evicted");
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = small_cache(2);
        cache.set("a".into(), json!(1), None);
        cache.set("b".into(), json!(2), None);

        // Touching `a` makes `b` the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.set("c".into(), json!(3), None);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_overwrite_existing_does_not_evict() {
        let cache = small_cache(2);
        cache.set("a".into(), json!(1), None);
        cache.set("b".into(), json!(2), None);
        cache.set("a".into(), json!(10), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(json!(10)));
        assert_eq!(cache.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let cache = small_cache(10);
        cache.set("k".into(), json!(1), Some(0));
        assert!(cache.get("k").is_none());
        // The lookup removed the entry as a side effect.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_negative_ttl_is_immediately_expired() {
        let cache = small_cache(10);
        cache.set("k".into(), json!(1), Some(-5));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_expiry_after_elapsed_ttl() {
        let cache = small_cache(10);
        cache.set("k".into(), json!(1), Some(1));
        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(1100));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cleanup_expired_counts_and_removes() {
        let cache = small_cache(10);
        cache.set("live".into(), json!(1), Some(300));
        cache.set("dead1".into(), json!(2), Some(0));
        cache.set("dead2".into(), json!(3), Some(-1));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("live").is_some());
        // Idempotent once clean.
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let cache = small_cache(10);
        cache.set("k".into(), json!([{"id": 1}]), None);
        cache.get("k");
        cache.get("k");

        let stats = cache.stats();
        assert_eq!(stats.total_items, 1);
        // One hit from set, two from get.
        assert_eq!(stats.hits_by_key["k"], 3);
        assert!(stats.approximate_size_bytes > 0);
        assert!(stats.expirations.contains_key("k"));
        assert!(stats.expirations["k"] > stats.created["k"]);
        assert!(stats.last_hits["k"] >= stats.created["k"]);
    }

    #[test]
    fn test_clear() {
        let cache = small_cache(10);
        cache.set("a".into(), json!(1), None);
        cache.set("b".into(), json!(2), None);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().total_items, 0);
    }

    #[test]
    fn test_eviction_fifo_among_untouched_keys() {
        let cache = small_cache(3);
        cache.set("a".into(), json!(1), None);
        cache.set("b".into(), json!(2), None);
        cache.set("c".into(), json!(3), None);

        // No gets in between: insertion order is eviction order.
        cache.set("d".into(), json!(4), None);
        assert!(cache.get("a").is_none());
        cache.set("e".into(), json!(5), None);
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }
}
