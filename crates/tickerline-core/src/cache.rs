//! In-memory memoization of cascade results.

use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;

use crate::{CascadeResult, Endpoint, Symbol};

/// Default freshness window for every endpoint.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
/// Default freshness window for quotes.
pub const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Defines how a single request interacts with the result cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present;
    /// otherwise, run the cascade and write the result to the cache. (Default)
    #[default]
    Use,
    /// Always run the cascade, ignoring any cached entry,
    /// and write the new result to the cache.
    Refresh,
    /// Always run the cascade and do not read from or write to the cache.
    Bypass,
}

impl CacheMode {
    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Refresh)
    }
}

/// Cache sizing and freshness settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub quote_ttl: Duration,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            quote_ttl: DEFAULT_QUOTE_TTL,
            max_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Settings that never retain anything.
    pub const fn disabled() -> Self {
        Self {
            ttl: Duration::ZERO,
            quote_ttl: Duration::ZERO,
            max_capacity: 0,
        }
    }

    pub const fn is_disabled(&self) -> bool {
        self.max_capacity == 0 || (self.ttl.is_zero() && self.quote_ttl.is_zero())
    }

    const fn ttl_for(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Quote => self.quote_ttl,
            _ => self.ttl,
        }
    }
}

type CacheKey = (Symbol, Endpoint);

struct EndpointExpiry {
    config: CacheConfig,
}

impl Expiry<CacheKey, CascadeResult> for EndpointExpiry {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        _value: &CascadeResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.config.ttl_for(key.1))
    }

    fn expire_after_update(
        &self,
        key: &CacheKey,
        _value: &CascadeResult,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.config.ttl_for(key.1))
    }
}

/// Bounded, TTL-expiring result cache keyed by `(symbol, endpoint)`.
///
/// Cloning shares the underlying store. Concurrent writers to the same key
/// resolve as last write wins.
#[derive(Clone)]
pub struct ResultCache {
    inner: Cache<CacheKey, CascadeResult>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EndpointExpiry { config })
            .build();
        Self { inner, config }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(CacheConfig::disabled())
    }

    pub const fn config(&self) -> CacheConfig {
        self.config
    }

    pub const fn is_disabled(&self) -> bool {
        self.config.is_disabled()
    }

    pub async fn get(&self, symbol: &Symbol, endpoint: Endpoint) -> Option<CascadeResult> {
        if self.is_disabled() {
            return None;
        }
        self.inner.get(&(symbol.clone(), endpoint)).await
    }

    pub async fn put(&self, symbol: &Symbol, endpoint: Endpoint, result: CascadeResult) {
        if self.is_disabled() || self.config.ttl_for(endpoint).is_zero() {
            return;
        }
        self.inner.insert((symbol.clone(), endpoint), result).await;
    }

    /// Approximate number of live entries after pending maintenance has run.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.config)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CanonicalData, CanonicalQuote, ProviderId};

    fn result(symbol: &Symbol, close: f64) -> CascadeResult {
        let quote = CanonicalQuote::new(
            symbol.clone(),
            close,
            close,
            close,
            close,
            1_000,
            0.0,
            0.0,
            None,
        )
        .expect("valid quote");
        CascadeResult::new(CanonicalData::Quote(quote), ProviderId::Fmp)
    }

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("valid symbol")
    }

    #[tokio::test]
    async fn stores_and_overwrites_entries() {
        let cache = ResultCache::default();
        let symbol = symbol();

        assert!(cache.get(&symbol, Endpoint::Quote).await.is_none());

        cache.put(&symbol, Endpoint::Quote, result(&symbol, 1.0)).await;
        cache.put(&symbol, Endpoint::Quote, result(&symbol, 2.0)).await;

        let cached = cache.get(&symbol, Endpoint::Quote).await.expect("cached");
        assert!(matches!(cached.data, CanonicalData::Quote(ref q) if q.close == 2.0));
        assert!(cache.get(&symbol, Endpoint::TimeSeries).await.is_none());
    }

    #[tokio::test]
    async fn quote_entries_use_their_own_ttl() {
        let cache = ResultCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            quote_ttl: Duration::from_millis(100),
            max_capacity: 100,
        });
        let symbol = symbol();

        cache.put(&symbol, Endpoint::Quote, result(&symbol, 1.0)).await;
        cache.put(&symbol, Endpoint::Earnings, result(&symbol, 1.0)).await;
        assert!(cache.get(&symbol, Endpoint::Quote).await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(cache.get(&symbol, Endpoint::Quote).await.is_none());
        assert!(cache.get(&symbol, Endpoint::Earnings).await.is_some());
    }

    #[tokio::test]
    async fn disabled_cache_never_retains() {
        let cache = ResultCache::disabled();
        let symbol = symbol();

        cache.put(&symbol, Endpoint::Quote, result(&symbol, 1.0)).await;
        assert!(cache.get(&symbol, Endpoint::Quote).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[test]
    fn cache_mode_defaults_to_use() {
        assert_eq!(CacheMode::default(), CacheMode::Use);
        assert!(CacheMode::Refresh.writes());
        assert!(!CacheMode::Refresh.reads());
        assert!(!CacheMode::Bypass.writes());
    }
}
