//! Report cache with in-flight coalescing
//!
//! Finished reports are kept for a TTL. Concurrent requests for the same key
//! share one computation: the first caller installs a shared future in the
//! in-flight map and every later caller awaits that same future, so all of
//! them see the same report or the same error.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::report::Report;
use crate::scoring::ReportKind;
use crate::token::TokenId;

/// Engine version folded into cache keys so upgrades never serve stale shapes
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for a finished report (seconds)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}
fn default_max_entries() -> usize {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

/// SHA-256 over report kind, engine version and token address, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(kind: ReportKind, token: &TokenId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(ENGINE_VERSION.as_bytes());
        hasher.update(b"|");
        hasher.update(token.as_str().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}

/// Entry in the report cache with TTL
#[derive(Clone)]
struct CachedReport {
    report: Arc<Report>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedReport {
    fn new(report: Arc<Report>, ttl: Duration) -> Self {
        Self {
            report,
            cached_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Cache statistics for monitoring
#[derive(Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Callers that joined a computation already in flight
    pub coalesced: AtomicU64,
    /// Pipeline executions started
    pub computations: AtomicU64,
}

impl CacheStats {
    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub computations: u64,
}

type SharedComputation = Shared<BoxFuture<'static, Result<Arc<Report>>>>;

struct CacheInner {
    config: CacheConfig,
    entries: DashMap<CacheKey, CachedReport>,
    in_flight: DashMap<CacheKey, SharedComputation>,
    stats: CacheStats,
}

impl CacheInner {
    fn fresh(&self, key: &CacheKey) -> Option<Arc<Report>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(Arc::clone(&entry.report));
            }
            // Entry expired, remove it
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    fn store(&self, key: CacheKey, report: Arc<Report>) {
        if self.entries.len() >= self.config.max_entries {
            self.entries.retain(|_, entry| !entry.is_expired());
        }
        if self.entries.len() >= self.config.max_entries {
            // Remove ~10% of entries
            let to_remove = (self.config.max_entries / 10).max(1);
            let keys: Vec<_> = self
                .entries
                .iter()
                .take(to_remove)
                .map(|r| r.key().clone())
                .collect();
            for key in keys {
                self.entries.remove(&key);
            }
        }

        let ttl = Duration::from_secs(self.config.ttl_secs);
        self.entries.insert(key, CachedReport::new(report, ttl));
    }
}

/// Shared handle; clones see the same entries and in-flight computations
#[derive(Clone)]
pub struct ReportCache {
    inner: Arc<CacheInner>,
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ReportCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::with_capacity(config.max_entries),
                in_flight: DashMap::new(),
                stats: CacheStats::default(),
                config,
            }),
        }
    }

    /// Fresh cached report, if any
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Report>> {
        self.inner.fresh(key)
    }

    /// Return the cached report, join an in-flight computation, or start one.
    ///
    /// `force_refresh` skips the stored report but still joins a computation
    /// that is already running. Failures reach every waiter and are never
    /// cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        force_refresh: bool,
        compute: F,
    ) -> Result<Arc<Report>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Report>> + Send + 'static,
    {
        let stats = &self.inner.stats;

        if !force_refresh {
            if let Some(report) = self.inner.fresh(&key) {
                CacheStats::record(&stats.hits);
                debug!(key = %key, "Report cache hit");
                return Ok(report);
            }
        }

        let computation = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(running) => {
                CacheStats::record(&stats.coalesced);
                debug!(key = %key, "Joining in-flight computation");
                running.get().clone()
            }
            Entry::Vacant(slot) => {
                // A computation may have finished between the lookup and here
                if !force_refresh {
                    if let Some(report) = self.inner.fresh(&key) {
                        CacheStats::record(&stats.hits);
                        return Ok(report);
                    }
                }

                CacheStats::record(&stats.misses);
                CacheStats::record(&stats.computations);

                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let pending = compute();
                let computation = async move {
                    let outcome = pending.await.map(Arc::new);
                    match &outcome {
                        Ok(report) => inner.store(task_key.clone(), Arc::clone(report)),
                        Err(e) => warn!(key = %task_key, error = %e, "Computation failed, not cached"),
                    }
                    inner.in_flight.remove(&task_key);
                    outcome
                }
                .boxed()
                .shared();

                slot.insert(computation.clone());
                computation
            }
        };

        computation.await
    }

    /// Drop a cached report
    pub fn invalidate(&self, key: &CacheKey) {
        self.inner.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::report::RiskLevel;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    const TOKEN: &str = "So11111111111111111111111111111111111111112";

    fn key() -> CacheKey {
        CacheKey::new(ReportKind::Composite, &TokenId::parse(TOKEN).unwrap())
    }

    fn report(score: u8) -> Report {
        Report {
            kind: ReportKind::Composite,
            token_address: TOKEN.to_string(),
            token_symbol: "SOL".to_string(),
            token_name: "Wrapped SOL".to_string(),
            composite_score: score,
            risk_level: RiskLevel::from_score(score),
            recommendation: String::new(),
            categories: BTreeMap::new(),
            red_flags: vec![],
            green_flags: vec![],
            analyzed_at: Utc::now(),
            analysis_time_ms: 0,
        }
    }

    #[test]
    fn test_key_is_stable_hex() {
        let token = TokenId::parse(TOKEN).unwrap();
        let a = CacheKey::new(ReportKind::Composite, &token);
        let b = CacheKey::new(ReportKind::Composite, &token);
        let c = CacheKey::new(ReportKind::Security, &token);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_eq!(a.as_str(), a.as_str().to_lowercase());

        let digest = Sha256::digest(format!("composite|{}|{}", ENGINE_VERSION, TOKEN));
        let expected: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
        assert_eq!(a.as_str(), expected);
    }

    #[tokio::test]
    async fn test_concurrent_calls_coalesce() {
        let cache = ReportCache::default();
        let runs = Arc::new(AtomicUsize::new(0));

        let calls = (0..16).map(|_| {
            let cache = cache.clone();
            let runs = Arc::clone(&runs);
            async move {
                cache
                    .get_or_compute(key(), false, move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(report(90))
                    })
                    .await
            }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
        assert_eq!(cache.stats().snapshot().computations, 1);
        assert_eq!(cache.stats().snapshot().coalesced, 15);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_report_served_until_refresh() {
        let cache = ReportCache::default();

        let first = cache
            .get_or_compute(key(), false, || async { Ok(report(90)) })
            .await
            .unwrap();
        let second = cache
            .get_or_compute(key(), false, || async { Ok(report(10)) })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().snapshot().hits, 1);

        let refreshed = cache
            .get_or_compute(key(), true, || async { Ok(report(10)) })
            .await
            .unwrap();
        assert_eq!(refreshed.composite_score, 10);
        // The refresh replaced the stored report
        assert_eq!(cache.get(&key()).unwrap().composite_score, 10);
    }

    #[tokio::test]
    async fn test_expired_entry_recomputed() {
        let cache = ReportCache::new(CacheConfig {
            ttl_secs: 0,
            max_entries: 10,
        });

        cache
            .get_or_compute(key(), false, || async { Ok(report(90)) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let again = cache
            .get_or_compute(key(), false, || async { Ok(report(70)) })
            .await
            .unwrap();
        assert_eq!(again.composite_score, 70);
        assert_eq!(cache.stats().snapshot().computations, 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_and_is_not_cached() {
        let cache = ReportCache::default();

        let calls = (0..4).map(|_| {
            let cache = cache.clone();
            async move {
                cache
                    .get_or_compute(key(), false, || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(Error::Internal("boom".to_string()))
                    })
                    .await
            }
        });
        let results = futures::future::join_all(calls).await;

        for result in results {
            assert_eq!(result.unwrap_err(), Error::Internal("boom".to_string()));
        }
        assert!(cache.is_empty());
        assert_eq!(cache.stats().snapshot().computations, 1);

        let recovered = cache
            .get_or_compute(key(), false, || async { Ok(report(85)) })
            .await
            .unwrap();
        assert_eq!(recovered.composite_score, 85);
    }

    #[tokio::test]
    async fn test_eviction_keeps_size_bounded() {
        let cache = ReportCache::new(CacheConfig {
            ttl_secs: 300,
            max_entries: 4,
        });
        let tokens = [
            "So11111111111111111111111111111111111111112",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        ];

        for kind in [ReportKind::Composite, ReportKind::Security] {
            for token in tokens {
                let key = CacheKey::new(kind, &TokenId::parse(token).unwrap());
                cache
                    .get_or_compute(key, false, || async { Ok(report(50)) })
                    .await
                    .unwrap();
            }
        }
        assert_eq!(cache.len(), 4);
    }
}
