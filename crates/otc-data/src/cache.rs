//! 짧은 수명의 캔들 결과 캐시.
//!
//! 같은 (심볼, 간격, 개수) 요청이 TTL 안에 반복되면 소스를 다시 호출하지 않습니다.
//! 만료된 항목은 조회 시 제거되고, 저장 `SWEEP_INTERVAL`회마다 전체를 훑어 정리합니다.
//! 같은 키에 대한 저장은 마지막 쓰기가 이깁니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use otc_core::{Candle, CandleQuery, SharedClock};
use serde::Serialize;
use tracing::debug;

/// 이 횟수만큼 저장할 때마다 만료 항목을 일괄 제거합니다.
pub const SWEEP_INTERVAL: u64 = 64;

/// 캐시 항목.
#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at_ms: i64,
    candles: Vec<Candle>,
}

/// 캐시 통계.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

/// 결과 캐시.
pub struct ResultCache {
    entries: RwLock<HashMap<CandleQuery, CacheEntry>>,
    clock: SharedClock,
    ttl_ms: i64,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl ResultCache {
    pub fn new(clock: SharedClock, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl_ms: ttl.as_millis().min(i64::MAX as u128) as i64,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms as u64)
    }

    fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        now_ms - entry.fetched_at_ms < self.ttl_ms
    }

    /// 신선한 항목을 조회합니다.
    pub fn get(&self, query: &CandleQuery) -> Option<Vec<Candle>> {
        let now_ms = self.clock.now_millis();

        let stale = {
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match entries.get(query) {
                Some(entry) if self.is_fresh(entry, now_ms) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.candles.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if stale {
            let mut entries = match self.entries.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // 그 사이 새로 저장된 항목은 유지
            if entries
                .get(query)
                .is_some_and(|entry| !self.is_fresh(entry, now_ms))
            {
                entries.remove(query);
                debug!(query = %query, "Evicted stale cache entry");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// 결과를 저장합니다. 같은 키의 기존 항목은 교체됩니다.
    pub fn put(&self, query: CandleQuery, candles: Vec<Candle>) {
        let now_ms = self.clock.now_millis();
        let entry = CacheEntry {
            fetched_at_ms: now_ms,
            candles,
        };
        let stored = self.stores.fetch_add(1, Ordering::Relaxed) + 1;

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if stored % SWEEP_INTERVAL == 0 {
            let removed = Self::sweep(&mut entries, now_ms, self.ttl_ms);
            if removed > 0 {
                debug!(removed, remaining = entries.len(), "Swept expired cache entries");
            }
        }
        entries.insert(query, entry);
    }

    fn sweep(entries: &mut HashMap<CandleQuery, CacheEntry>, now_ms: i64, ttl_ms: i64) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| now_ms - entry.fetched_at_ms < ttl_ms);
        before - entries.len()
    }

    /// 만료된 항목을 모두 제거하고 제거한 개수를 반환합니다.
    pub fn purge_expired(&self) -> usize {
        let now_ms = self.clock.now_millis();
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::sweep(&mut entries, now_ms, self.ttl_ms)
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 캐시 통계.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            stores: self.stores.load(Ordering::Relaxed),
            entries: self.len(),
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_core::{Interval, ManualClock, SymbolPolicy};
    use std::sync::Arc;

    fn query(limit: usize) -> CandleQuery {
        let symbol = SymbolPolicy::pattern_only()
            .normalize_and_validate("EURUSD_OTC")
            .unwrap();
        CandleQuery::new(symbol, Interval::M1, limit)
    }

    fn candles() -> Vec<Candle> {
        vec![Candle::new(60, 1.0, 1.1, 0.9, 1.05, 0.0)]
    }

    #[test]
    fn test_hit_within_ttl() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock.clone()), Duration::from_secs(2));

        assert!(cache.get(&query(3)).is_none());
        cache.put(query(3), candles());

        clock.advance_millis(1_999);
        assert_eq!(cache.get(&query(3)), Some(candles()));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.stores), (1, 1, 1));
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock.clone()), Duration::from_secs(2));

        cache.put(query(3), candles());
        clock.advance_millis(2_000);

        assert!(cache.get(&query(3)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_limit_is_part_of_key() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock), Duration::from_secs(2));

        cache.put(query(3), candles());
        assert!(cache.get(&query(4)).is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock), Duration::from_secs(2));

        cache.put(query(3), candles());
        let newer = vec![Candle::new(120, 2.0, 2.0, 2.0, 2.0, 0.0)];
        cache.put(query(3), newer.clone());
        assert_eq!(cache.get(&query(3)), Some(newer));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock.clone()), Duration::from_secs(2));

        cache.put(query(1), candles());
        clock.advance_millis(1_500);
        cache.put(query(2), candles());
        clock.advance_millis(1_000);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_expired_keys_do_not_accumulate() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock.clone()), Duration::from_secs(2));

        for limit in 1..=300 {
            cache.put(query(limit), candles());
            clock.advance_millis(5_000);
        }

        assert!(cache.len() <= SWEEP_INTERVAL as usize, "len = {}", cache.len());
        assert_eq!(cache.stats().stores, 300);
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let clock = ManualClock::at_secs(1_700_000_000);
        let cache = ResultCache::new(Arc::new(clock), Duration::from_secs(2));

        for limit in 1..=SWEEP_INTERVAL as usize {
            cache.put(query(limit), candles());
        }

        assert_eq!(cache.len(), SWEEP_INTERVAL as usize);
        assert_eq!(cache.get(&query(1)), Some(candles()));
    }
}
