use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::normalize::PlaceRecord;

// Coordinates in units of 1e-5 degrees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_e5: i64,
    lon_e5: i64,
    radius_m: u32,
    categories: Vec<String>,
    with_email: bool,
}

impl CacheKey {
    pub fn new(
        lat: f64,
        lon: f64,
        radius_m: u32,
        categories: &[String],
        with_email: bool,
    ) -> Self {
        let mut categories = categories.to_vec();
        categories.sort();
        categories.dedup();
        Self {
            lat_e5: (lat * 100_000.0).round() as i64,
            lon_e5: (lon * 100_000.0).round() as i64,
            radius_m,
            categories,
            with_email,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub label: String,
    pub results: Vec<PlaceRecord>,
}

struct CacheEntry {
    label: String,
    results: Vec<PlaceRecord>,
    expires_at: Option<Instant>,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    clock: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_used);
        }
    }
}

#[derive(Default)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let expired = match state.entries.get(key) {
            None => {
                debug!("search cache miss");
                return None;
            }
            Some(entry) => entry.expires_at.is_some_and(|at| at <= now),
        };
        if expired {
            debug!("search cache entry expired");
            state.remove(key);
            return None;
        }

        let tick = state.next_tick();
        let CacheState {
            entries, recency, ..
        } = &mut *state;
        let entry = entries.get_mut(key)?;
        recency.remove(&entry.last_used);
        recency.insert(tick, key.clone());
        entry.last_used = tick;
        debug!(results = entry.results.len(), "search cache hit");
        Some(CachedResponse {
            label: entry.label.clone(),
            results: entry.results.clone(),
        })
    }

    pub fn put(
        &self,
        key: CacheKey,
        label: &str,
        results: &[PlaceRecord],
        ttl: Duration,
        max_entries: usize,
    ) {
        if ttl.is_zero() {
            return;
        }

        // None: the TTL is past what the clock can represent.
        let expires_at = Instant::now().checked_add(ttl);
        let mut state = self.state.lock();
        state.remove(&key);
        let tick = state.next_tick();
        state.recency.insert(tick, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                label: label.to_string(),
                results: results.to_vec(),
                expires_at,
                last_used: tick,
            },
        );

        while state.entries.len() > max_entries.max(1) {
            let Some((_, oldest)) = state.recency.pop_first() else {
                break;
            };
            debug!("evicting least recently used search");
            state.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn key(n: u32) -> CacheKey {
        CacheKey::new(38.5, -121.4, n, &["school".to_string()], false)
    }

    fn record(name: &str) -> PlaceRecord {
        PlaceRecord {
            external_id: format!("node/{name}"),
            category: "school".into(),
            name: Some(name.into()),
            phone: None,
            email: None,
            website: Some("school.example.org".into()),
            address: String::new(),
            lat: Some(38.5),
            lon: Some(-121.4),
            raw_tags: "{}".into(),
        }
    }

    #[test]
    fn key_ignores_category_order_and_coordinate_noise() {
        let a = CacheKey::new(
            38.581_234_1,
            -121.494_401_9,
            5_000,
            &["hotel".to_string(), "school".to_string()],
            false,
        );
        let b = CacheKey::new(
            38.581_233_7,
            -121.494_402_2,
            5_000,
            &["school".to_string(), "hotel".to_string(), "hotel".to_string()],
            false,
        );
        assert_eq!(a, b);
        assert_ne!(
            a,
            CacheKey::new(38.581_234_1, -121.494_401_9, 5_000, &["hotel".to_string(), "school".to_string()], true)
        );
        assert_ne!(a, CacheKey::new(38.582, -121.494_401_9, 5_000, &["hotel".to_string(), "school".to_string()], false));
    }

    #[test]
    fn returns_independent_copies() {
        let cache = ResponseCache::new();
        cache.put(key(1), "Sacramento", &[record("Oak")], TTL, 8);

        let mut first = cache.get(&key(1)).unwrap();
        first.results[0].email = Some("office@oak.org".into());

        let second = cache.get(&key(1)).unwrap();
        assert_eq!(second.label, "Sacramento");
        assert!(second.results[0].email.is_none());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = ResponseCache::new();
        cache.put(key(1), "x", &[record("Oak")], Duration::ZERO, 8);
        assert!(cache.is_empty());
        assert!(cache.get(&key(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_miss_and_are_removed() {
        let cache = ResponseCache::new();
        cache.put(key(1), "x", &[record("Oak")], Duration::from_secs(1), 8);
        assert!(cache.get(&key(1)).is_some());

        tokio::time::advance(Duration::from_millis(1_001)).await;

        assert!(cache.get(&key(1)).is_none());
        assert!(!cache.contains(&key(1)));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_never_expires() {
        let cache = ResponseCache::new();
        cache.put(key(1), "x", &[record("Oak")], Duration::from_secs(u64::MAX), 8);

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;

        assert_eq!(cache.get(&key(1)).map(|hit| hit.results.len()), Some(1));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ResponseCache::new();
        for n in 1..=3 {
            cache.put(key(n), "x", &[record("Oak")], TTL, 3);
        }
        cache.put(key(4), "x", &[], TTL, 3);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
        assert!(cache.contains(&key(4)));
    }

    #[test]
    fn reading_protects_an_entry_from_eviction() {
        let cache = ResponseCache::new();
        for n in 1..=3 {
            cache.put(key(n), "x", &[record("Oak")], TTL, 3);
        }
        assert!(cache.get(&key(1)).is_some());
        cache.put(key(4), "x", &[], TTL, 3);

        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn refresh_replaces_rather_than_merges() {
        let cache = ResponseCache::new();
        cache.put(key(1), "old", &[record("Oak"), record("Elm")], TTL, 3);
        cache.put(key(1), "new", &[record("Pine")], TTL, 3);

        let cached = cache.get(&key(1)).unwrap();
        assert_eq!(cached.label, "new");
        assert_eq!(cached.results.len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
