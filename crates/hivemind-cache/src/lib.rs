//! Content-addressed prompt cache for completion responses.
//!
//! TTL + insertion-order LRU, keyed by a hash of (instruction, input
//! prefix, system prompt). Conservative by design:
//!
//! - TTL-based expiry (default 1 hour), enforced lazily on read.
//! - Entry cap (default 500); the least-recently-inserted entry is
//!   evicted at capacity, and a hit re-inserts the entry at the freshest
//!   position.
//! - File-backed persistence across restarts; corrupt or missing files
//!   start the cache empty rather than failing.
//!
//! Grounded calls (web search) never touch the cache; the worker skips
//! it entirely for those tasks.

use chrono::{DateTime, Duration, Utc};
use hivemind_core::{CacheConfig, SwarmResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// A cached completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached response text.
    pub response: String,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served.
    pub expires_at: DateTime<Utc>,
    /// How many times the entry has been served.
    pub hit_count: u64,
    /// First characters of the instruction, for inspection tooling.
    pub instruction_preview: String,
    /// Insertion-order position; recomputed on load, never persisted.
    #[serde(skip)]
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Cache observability counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Current entry count.
    pub entries: usize,
    /// Configured entry cap.
    pub max_entries: usize,
    /// Lifetime hit count.
    pub hits: u64,
    /// Lifetime miss count (including expired-on-read).
    pub misses: u64,
    /// Lifetime eviction count (capacity pressure only, not expiry).
    pub evictions: u64,
    /// hits / (hits + misses), zero when nothing was looked up.
    pub hit_rate: f64,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order: sequence number → key, oldest first. Kept in a
    /// BTreeMap so eviction of the oldest and refresh-on-hit are both
    /// O(log n) without scanning.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    counters: Counters,
}

impl Inner {
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            counters: Counters::default(),
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.order.remove(&entry.seq);
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((&seq, _)) = self.order.iter().next() {
            if let Some(key) = self.order.remove(&seq) {
                self.entries.remove(&key);
                self.counters.evictions += 1;
            }
        }
    }

    fn bump(&mut self, key: &str) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.seq);
            entry.seq = seq;
            self.order.insert(seq, key.to_string());
        }
    }
}

/// TTL + insertion-order LRU cache for completion responses.
pub struct PromptCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
}

impl PromptCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::empty()),
        }
    }

    /// Create a cache, loading persisted entries when a persist path is
    /// configured. A missing or corrupt file starts the cache empty.
    pub fn open(config: CacheConfig) -> Self {
        let cache = Self::new(config);
        if let Some(path) = cache.config.persist_path.clone() {
            cache.load(&path);
        }
        cache
    }

    /// Derive the cache key for a prompt triple.
    ///
    /// Only the first `key_input_prefix_chars` characters of the input
    /// participate, bounding key-construction cost on large payloads.
    /// Two inputs differing only beyond that prefix alias to the same
    /// key, a deliberate precision/cost trade-off tunable via
    /// [`CacheConfig::key_input_prefix_chars`].
    pub fn key(&self, instruction: &str, input: &str, system_prompt: &str) -> String {
        let prefix: String = input
            .trim()
            .chars()
            .take(self.config.key_input_prefix_chars)
            .collect();
        let mut hasher = Sha256::new();
        hasher.update(instruction.trim().as_bytes());
        hasher.update([0x1f]);
        hasher.update(prefix.as_bytes());
        hasher.update([0x1f]);
        hasher.update(system_prompt.trim().as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..16].to_string()
    }

    /// Look up a cached response.
    ///
    /// Expired entries are removed and counted as misses. A hit bumps the
    /// entry to the freshest position and its hit count.
    pub fn get(&self, instruction: &str, input: &str, system_prompt: &str) -> Option<String> {
        let key = self.key(instruction, input, system_prompt);
        let now = Utc::now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(&key) {
            None => {
                inner.counters.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.remove(&key);
            inner.counters.misses += 1;
            return None;
        }

        inner.bump(&key);
        inner.counters.hits += 1;
        let entry = inner.entries.get_mut(&key)?;
        entry.hit_count += 1;
        debug!(key = %key, hits = entry.hit_count, "cache hit");
        Some(entry.response.clone())
    }

    /// Store a response. At capacity, the least-recently-inserted entry
    /// is evicted first.
    pub fn set(
        &self,
        instruction: &str,
        input: &str,
        system_prompt: &str,
        response: &str,
        ttl: Option<Duration>,
    ) {
        let key = self.key(instruction, input, system_prompt);
        let now = Utc::now();
        let ttl = ttl.unwrap_or_else(|| Duration::seconds(self.config.ttl_secs as i64));

        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.config.max_entries && !inner.entries.contains_key(&key) {
            inner.evict_oldest();
        }

        inner.remove(&key);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                created_at: now,
                expires_at: now + ttl,
                hit_count: 0,
                instruction_preview: instruction.chars().take(80).collect(),
                seq,
            },
        );
    }

    /// Remove all expired entries, returning how many were removed.
    pub fn prune(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = Inner::empty();
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the observability counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let looked_up = inner.counters.hits + inner.counters.misses;
        CacheStats {
            entries: inner.entries.len(),
            max_entries: self.config.max_entries,
            hits: inner.counters.hits,
            misses: inner.counters.misses,
            evictions: inner.counters.evictions,
            hit_rate: if looked_up == 0 {
                0.0
            } else {
                inner.counters.hits as f64 / looked_up as f64
            },
        }
    }

    /// Persist non-expired entries to the configured path, atomically
    /// (write to a temp file, then rename). A no-op when persistence is
    /// not configured.
    pub fn persist(&self) -> SwarmResult<usize> {
        let Some(path) = self.config.persist_path.clone() else {
            return Ok(0);
        };
        let now = Utc::now();
        let snapshot: HashMap<String, CacheEntry> = {
            let inner = self.inner.lock();
            inner
                .entries
                .iter()
                .filter(|(_, e)| !e.is_expired(now))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect()
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec(&snapshot)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        debug!(entries = snapshot.len(), path = %path.display(), "cache persisted");
        Ok(snapshot.len())
    }

    /// Load persisted entries, skipping expired ones and stopping at
    /// capacity. Failures are non-fatal: the cache starts empty.
    fn load(&self, path: &Path) {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let parsed: HashMap<String, CacheEntry> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt cache file");
                return;
            }
        };

        let now = Utc::now();
        // HashMap iteration order is arbitrary; re-establish insertion
        // order from creation timestamps so eviction stays oldest-first.
        let mut fresh: Vec<(String, CacheEntry)> = parsed
            .into_iter()
            .filter(|(_, e)| !e.is_expired(now))
            .collect();
        fresh.sort_by_key(|(_, e)| e.created_at);

        let mut inner = self.inner.lock();
        let mut loaded = 0;
        for (key, mut entry) in fresh {
            if inner.entries.len() >= self.config.max_entries {
                break;
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            entry.seq = seq;
            inner.order.insert(seq, key.clone());
            inner.entries.insert(key, entry);
            loaded += 1;
        }
        if loaded > 0 {
            info!(entries = loaded, path = %path.display(), "cache loaded from disk");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn small_cache(max_entries: usize) -> PromptCache {
        PromptCache::new(CacheConfig {
            max_entries,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn test_set_then_get_within_ttl() {
        let cache = small_cache(10);
        cache.set("summarize", "the data", "persona", "the summary", None);
        assert_eq!(
            cache.get("summarize", "the data", "persona").as_deref(),
            Some("the summary")
        );
    }

    #[test]
    fn test_get_after_ttl_is_miss_and_removes_entry() {
        let cache = small_cache(10);
        cache.set("k", "v", "p", "resp", Some(Duration::zero()));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get("k", "v", "p").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_and_never_grows_past_cap() {
        let cache = small_cache(3);
        cache.set("a", "", "", "ra", None);
        cache.set("b", "", "", "rb", None);
        cache.set("c", "", "", "rc", None);
        cache.set("d", "", "", "rd", None);

        assert_eq!(cache.len(), 3);
        assert!(cache.get("a", "", "").is_none(), "oldest entry evicted");
        assert_eq!(cache.get("d", "", "").as_deref(), Some("rd"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_hit_refreshes_insertion_position() {
        let cache = small_cache(3);
        cache.set("a", "", "", "ra", None);
        cache.set("b", "", "", "rb", None);
        cache.set("c", "", "", "rc", None);

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a", "", "").is_some());
        cache.set("d", "", "", "rd", None);

        assert!(cache.get("a", "", "").is_some());
        assert!(cache.get("b", "", "").is_none());
    }

    #[test]
    fn test_key_hashes_input_prefix_only() {
        let cache = PromptCache::new(CacheConfig {
            key_input_prefix_chars: 8,
            ..CacheConfig::default()
        });
        // Identical up to the prefix, different beyond it: same key.
        let k1 = cache.key("inst", "aaaaaaaa-tail-one", "p");
        let k2 = cache.key("inst", "aaaaaaaa-tail-two", "p");
        assert_eq!(k1, k2);

        // Different within the prefix: different key.
        let k3 = cache.key("inst", "bbbbbbbb-tail-one", "p");
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_key_is_16_hex_chars() {
        let cache = small_cache(10);
        let key = cache.key("i", "d", "p");
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let cache = small_cache(10);
        cache.set("live", "", "", "r", None);
        cache.set("dead", "", "", "r", Some(Duration::zero()));
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("live", "", "").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = small_cache(10);
        cache.set("a", "", "", "r", None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_hit_rate() {
        let cache = small_cache(10);
        cache.set("a", "", "", "r", None);
        cache.get("a", "", "");
        cache.get("missing", "", "");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overwrite_same_key_does_not_evict() {
        let cache = small_cache(2);
        cache.set("a", "", "", "r1", None);
        cache.set("b", "", "", "r2", None);
        cache.set("a", "", "", "r3", None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a", "", "").as_deref(), Some("r3"));
        assert_eq!(cache.stats().evictions, 0);
    }
}
