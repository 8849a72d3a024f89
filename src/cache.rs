// src/cache.rs
//! Time-bounded caches for search results and icon details.
//!
//! Expiry is lazy: `get` treats entries older than the TTL as absent and the
//! next `set` overwrites the slot. Nothing sweeps in the background.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::counter;
use tracing::debug;

use crate::models::{IconDetail, IconSummary};

pub const SEARCH_TTL: Duration = Duration::from_secs(2 * 60);
pub const DETAIL_TTL: Duration = Duration::from_secs(10 * 60);

/// Millisecond clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: u64,
}

/// Key/value table with a fixed TTL.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let map = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let hit = map
            .get(key)
            .filter(|e| now.saturating_sub(e.created_at) < self.ttl.as_millis() as u64)
            .map(|e| e.value.clone());
        if hit.is_some() {
            counter!("icon_cache_hits_total", "cache" => self.name).increment(1);
        } else {
            counter!("icon_cache_misses_total", "cache" => self.name).increment(1);
        }
        hit
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now_ms(),
        };
        let mut map = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        map.insert(key.into(), entry);
    }

    /// Discard the whole table.
    pub fn clear(&self) {
        let mut map = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        debug!(target: "cache", cache = self.name, dropped = map.len(), "cache cleared");
        map.clear();
    }

    /// Number of stored slots, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SearchCache = TtlCache<Arc<Vec<IconSummary>>>;
pub type DetailCache = TtlCache<Arc<IconDetail>>;

pub fn search_cache(clock: Arc<dyn Clock>) -> SearchCache {
    TtlCache::new("search", SEARCH_TTL, clock)
}

pub fn detail_cache(clock: Arc<dyn Clock>) -> DetailCache {
    TtlCache::new("detail", DETAIL_TTL, clock)
}

/// `s:<source>:<lowercased, whitespace-collapsed keyword>`
pub fn search_key(source_id: &str, keyword: &str) -> String {
    format!(
        "s:{source_id}:{}",
        crate::text::collapse_ws(keyword).to_lowercase()
    )
}

/// `d:<source>:<id>`, or the detail URL when the id is empty.
pub fn detail_key(source_id: &str, summary: &IconSummary) -> String {
    let id = summary.id.trim();
    let ident = if id.is_empty() {
        summary.detail_url.trim()
    } else {
        id
    };
    format!("d:{source_id}:{ident}")
}
