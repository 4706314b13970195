use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapters::default_adapters;
use crate::cache::{CacheConfig, CacheMode, ResultCache};
use crate::http_client::{HttpClient, ReqwestHttpClient, TimeoutHttpClient};
use crate::locale::{Locale, LocaleRouter, LocaleRule};
use crate::{
    CanonicalData, CredentialStore, DataSource, Endpoint, ProviderId, SourceError,
    SourceErrorKind, Symbol, UtcDateTime, ValidationError,
};

/// Per-call bound on one provider's fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One validated request: a symbol, an endpoint and how it uses the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeRequest {
    pub symbol: Symbol,
    pub endpoint: Endpoint,
    pub cache_mode: CacheMode,
}

impl CascadeRequest {
    pub fn new(symbol: Symbol, endpoint: Endpoint) -> Self {
        Self {
            symbol,
            endpoint,
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    /// Validates raw caller input before any provider is consulted.
    ///
    /// A missing endpoint means `quote`. Checks run in order: missing
    /// symbol, unknown endpoint, malformed symbol.
    pub fn parse(symbol: Option<&str>, endpoint: Option<&str>) -> Result<Self, CascadeError> {
        let raw_symbol = symbol
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(CascadeError::MissingParameter { name: "symbol" })?;

        let endpoint = match endpoint.map(str::trim).filter(|value| !value.is_empty()) {
            None => Endpoint::default(),
            Some(raw) => {
                Endpoint::from_str(raw).map_err(|_| CascadeError::UnsupportedEndpoint {
                    symbol: raw_symbol.to_owned(),
                    endpoint: raw.to_owned(),
                })?
            }
        };

        let symbol = Symbol::parse(raw_symbol).map_err(|source| CascadeError::InvalidSymbol {
            value: raw_symbol.to_owned(),
            source,
        })?;

        Ok(Self::new(symbol, endpoint))
    }
}

/// Errors that reach callers of the cascade.
#[derive(Debug, Clone, Error)]
pub enum CascadeError {
    #[error("missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    #[error("invalid symbol '{value}': {source}")]
    InvalidSymbol {
        value: String,
        #[source]
        source: ValidationError,
    },

    #[error("endpoint '{endpoint}' is not supported for '{symbol}'")]
    UnsupportedEndpoint { symbol: String, endpoint: String },

    #[error("{0}")]
    AllProvidersExhausted(CascadeFailure),
}

impl CascadeError {
    /// HTTP-style status: 400 for caller mistakes, 500 for an exhausted cascade.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingParameter { .. }
            | Self::InvalidSymbol { .. }
            | Self::UnsupportedEndpoint { .. } => 400,
            Self::AllProvidersExhausted(_) => 500,
        }
    }

    pub const fn is_client_error(&self) -> bool {
        self.status_code() == 400
    }

    /// Symbol the error refers to, when one was supplied.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::MissingParameter { .. } => None,
            Self::InvalidSymbol { value, .. } => Some(value),
            Self::UnsupportedEndpoint { symbol, .. } => Some(symbol),
            Self::AllProvidersExhausted(failure) => Some(failure.symbol.as_str()),
        }
    }

    /// Endpoint the error refers to, when it is known.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::MissingParameter { .. } | Self::InvalidSymbol { .. } => None,
            Self::UnsupportedEndpoint { endpoint, .. } => Some(endpoint),
            Self::AllProvidersExhausted(failure) => Some(failure.endpoint.as_str()),
        }
    }

    pub fn failure(&self) -> Option<&CascadeFailure> {
        match self {
            Self::AllProvidersExhausted(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Successful cascade outcome.
///
/// Serializes as the canonical fields flattened at the top level plus
/// `source` and `lastUpdated`. The attempt bookkeeping stays out of the
/// JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeResult {
    #[serde(flatten)]
    pub data: CanonicalData,
    #[serde(serialize_with = "serialize_display_name")]
    pub source: ProviderId,
    #[serde(rename = "lastUpdated")]
    pub last_updated: UtcDateTime,
    #[serde(skip)]
    pub failures: Vec<ProviderFailure>,
    #[serde(skip)]
    pub skipped: Vec<SkippedProvider>,
    #[serde(skip)]
    pub cache_hit: bool,
}

impl CascadeResult {
    /// Stamps `data` with its provider and the normalization time.
    pub fn new(data: CanonicalData, source: ProviderId) -> Self {
        Self {
            data,
            source,
            last_updated: UtcDateTime::now(),
            failures: Vec::new(),
            skipped: Vec::new(),
            cache_hit: false,
        }
    }
}

fn serialize_display_name<S>(provider: &ProviderId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(provider.display_name())
}

/// One attempted provider and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: SourceErrorKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: ProviderId, error: &SourceError) -> Self {
        Self {
            provider,
            kind: error.kind(),
            message: error.message().to_owned(),
        }
    }
}

impl Display for ProviderFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.provider.display_name(),
            self.kind,
            self.message
        )
    }
}

/// Why a planned provider was never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingCredential,
    UnsupportedEndpoint,
    NotRegistered,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing credential",
            Self::UnsupportedEndpoint => "unsupported endpoint",
            Self::NotRegistered => "not registered",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedProvider {
    pub provider: ProviderId,
    pub reason: SkipReason,
}

/// Terminal failure: every planned provider was tried or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    pub symbol: Symbol,
    pub endpoint: Endpoint,
    /// Failures in attempt order.
    pub attempted: Vec<ProviderFailure>,
    pub skipped: Vec<SkippedProvider>,
}

impl CascadeFailure {
    /// True when no provider was attempted at all.
    pub fn all_skipped(&self) -> bool {
        self.attempted.is_empty()
    }

    /// True when at least one provider was attempted and every attempt
    /// failed with `kind`.
    pub fn all_failed_with(&self, kind: SourceErrorKind) -> bool {
        !self.attempted.is_empty() && self.attempted.iter().all(|failure| failure.kind == kind)
    }
}

impl Display for CascadeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.all_skipped() {
            write!(
                f,
                "no provider could serve {} for {}: every candidate was skipped",
                self.endpoint, self.symbol
            )?;
        } else {
            write!(
                f,
                "all providers failed for {} of {}: ",
                self.endpoint, self.symbol
            )?;
            for (index, failure) in self.attempted.iter().enumerate() {
                if index > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{failure}")?;
            }
        }

        if !self.skipped.is_empty() {
            f.write_str(" [skipped: ")?;
            for (index, skipped) in self.skipped.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(
                    f,
                    "{} ({})",
                    skipped.provider.display_name(),
                    skipped.reason
                )?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// One entry of a symbol's provider plan, as reported by `sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedProvider {
    pub provider: ProviderId,
    pub locale: Locale,
    pub registered: bool,
    pub credential_configured: bool,
    pub endpoints: Vec<Endpoint>,
}

impl PlannedProvider {
    /// Reason this provider would be skipped for `endpoint`, if any.
    pub fn skip_reason(&self, endpoint: Endpoint) -> Option<SkipReason> {
        let spec = self.provider.spec();
        if !spec.supports(endpoint) {
            Some(SkipReason::UnsupportedEndpoint)
        } else if !self.registered {
            Some(SkipReason::NotRegistered)
        } else if spec.requires_credential() && !self.credential_configured {
            Some(SkipReason::MissingCredential)
        } else {
            None
        }
    }
}

/// Adapter registry and cascade engine.
pub struct CascadeRouter {
    adapters: HashMap<ProviderId, Arc<dyn DataSource>>,
    locale: LocaleRouter,
    credentials: CredentialStore,
    cache: ResultCache,
    timeout: Duration,
}

impl CascadeRouter {
    pub fn builder() -> CascadeRouterBuilder {
        CascadeRouterBuilder::new()
    }

    pub fn locale(&self) -> &LocaleRouter {
        &self.locale
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_registered(&self, provider: ProviderId) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Ordered provider plan for `symbol` with registration and credential
    /// state. Makes no network calls.
    pub fn route_plan(&self, symbol: &Symbol) -> Vec<PlannedProvider> {
        let locale = self.locale.classify(symbol);
        self.locale
            .route(symbol)
            .into_iter()
            .map(|spec| self.planned(spec.id, locale))
            .collect()
    }

    /// Plan used for symbols no locale rule claims.
    pub fn global_plan(&self) -> Vec<PlannedProvider> {
        self.locale
            .global_order()
            .iter()
            .map(|provider| self.planned(*provider, Locale::Global))
            .collect()
    }

    fn planned(&self, provider: ProviderId, locale: Locale) -> PlannedProvider {
        let spec = provider.spec();
        PlannedProvider {
            provider,
            locale,
            registered: self.is_registered(provider),
            credential_configured: self.credentials.has(provider),
            endpoints: spec.capabilities.supported_endpoints(),
        }
    }

    /// Runs the cascade for one request.
    ///
    /// Providers are tried one at a time in plan order; the first one that
    /// fetches and normalizes successfully wins. No provider is retried.
    #[tracing::instrument(
        name = "cascade.fetch",
        skip(self, request),
        fields(symbol = %request.symbol, endpoint = %request.endpoint)
    )]
    pub async fn fetch(&self, request: &CascadeRequest) -> Result<CascadeResult, CascadeError> {
        let symbol = &request.symbol;
        let endpoint = request.endpoint;

        if request.cache_mode.reads() {
            if let Some(mut cached) = self.cache.get(symbol, endpoint).await {
                debug!(source = cached.source.as_str(), "served from cache");
                cached.cache_hit = true;
                return Ok(cached);
            }
        }

        let plan = self.route_plan(symbol);
        if !plan
            .iter()
            .any(|planned| planned.provider.spec().supports(endpoint))
        {
            return Err(CascadeError::UnsupportedEndpoint {
                symbol: symbol.to_string(),
                endpoint: endpoint.to_string(),
            });
        }

        let mut attempted = Vec::new();
        let mut skipped = Vec::new();

        for planned in &plan {
            let provider = planned.provider;
            if let Some(reason) = planned.skip_reason(endpoint) {
                debug!(provider = provider.as_str(), reason = reason.as_str(), "skipping provider");
                skipped.push(SkippedProvider { provider, reason });
                continue;
            }
            let Some(adapter) = self.adapters.get(&provider) else {
                skipped.push(SkippedProvider {
                    provider,
                    reason: SkipReason::NotRegistered,
                });
                continue;
            };

            debug!(provider = provider.as_str(), "trying provider");
            match self.attempt(adapter.as_ref(), symbol, endpoint).await {
                Ok(data) => {
                    info!(
                        provider = provider.as_str(),
                        failed_before = attempted.len(),
                        "provider served request"
                    );
                    let result = CascadeResult::new(data, provider);
                    if request.cache_mode.writes() {
                        self.cache.put(symbol, endpoint, result.clone()).await;
                    }
                    return Ok(CascadeResult {
                        failures: attempted,
                        skipped,
                        ..result
                    });
                }
                Err(error) => {
                    warn!(
                        provider = provider.as_str(),
                        code = error.code(),
                        error = %error.message(),
                        "provider failed"
                    );
                    attempted.push(ProviderFailure::new(provider, &error));
                }
            }
        }

        let failure = CascadeFailure {
            symbol: symbol.clone(),
            endpoint,
            attempted,
            skipped,
        };
        warn!(
            attempted = failure.attempted.len(),
            skipped = failure.skipped.len(),
            "all providers exhausted"
        );
        Err(CascadeError::AllProvidersExhausted(failure))
    }

    async fn attempt(
        &self,
        adapter: &dyn DataSource,
        symbol: &Symbol,
        endpoint: Endpoint,
    ) -> Result<CanonicalData, SourceError> {
        let credential = self.credentials.get(adapter.id());
        let payload = tokio::time::timeout(self.timeout, adapter.fetch(symbol, endpoint, credential))
            .await
            .map_err(|_| {
                SourceError::network(format!(
                    "{} did not respond within {} ms",
                    adapter.spec().name(),
                    self.timeout.as_millis()
                ))
            })??;
        adapter.normalize(symbol, endpoint, &payload)
    }
}

/// Builder for [`CascadeRouter`].
///
/// Without explicit adapters, `build` registers one adapter per provider on a
/// shared HTTP client (reqwest unless one is injected).
///
/// # Environment Variables
///
/// `with_env_config` reads:
///
/// | Variable | Meaning |
/// |----------|---------|
/// | `TICKERLINE_PROVIDER_ORDER` | comma list of provider ids for the global order |
/// | `TICKERLINE_TIMEOUT_MS` | per-call timeout |
/// | `TICKERLINE_CACHE_TTL_SECS` | cache TTL for every endpoint |
/// | `TICKERLINE_QUOTE_CACHE_TTL_SECS` | cache TTL for quotes |
/// | `TICKERLINE_CACHE_CAPACITY` | maximum cached results |
///
/// Invalid values are logged and ignored.
///
/// # Example
///
/// ```rust,no_run
/// use tickerline_core::{CascadeRouterBuilder, CredentialStore, ProviderId};
///
/// let router = CascadeRouterBuilder::new()
///     .with_provider_order([ProviderId::Fmp, ProviderId::TwelveData])
///     .with_credentials(CredentialStore::new().with(ProviderId::Fmp, "key"))
///     .build();
/// ```
pub struct CascadeRouterBuilder {
    adapters: Vec<Arc<dyn DataSource>>,
    http_client: Option<Arc<dyn HttpClient>>,
    locale: LocaleRouter,
    credentials: CredentialStore,
    cache: Option<ResultCache>,
    cache_config: CacheConfig,
    timeout: Duration,
}

impl Default for CascadeRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CascadeRouterBuilder {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
            http_client: None,
            locale: LocaleRouter::default(),
            credentials: CredentialStore::new(),
            cache: None,
            cache_config: CacheConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Environment-driven builder: settings from `TICKERLINE_*` variables and
    /// credentials from the provider key variables.
    pub fn from_env() -> Self {
        Self::new()
            .with_env_config()
            .with_credentials(CredentialStore::from_env())
    }

    /// Registers an adapter explicitly. Once any adapter is registered the
    /// default set is not created, and the transport deadline is whatever the
    /// adapter's own client applies.
    pub fn with_adapter(mut self, adapter: Arc<dyn DataSource>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// HTTP client shared by the default adapters.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Global cascade order. Duplicates keep their first position.
    pub fn with_provider_order(mut self, order: impl IntoIterator<Item = ProviderId>) -> Self {
        let mut seen = HashSet::new();
        let order = order
            .into_iter()
            .filter(|provider| seen.insert(*provider))
            .collect();
        self.locale = self.locale.with_global_order(order);
        self
    }

    pub fn with_locale_rule(mut self, rule: LocaleRule) -> Self {
        self.locale = self.locale.with_rule(rule);
        self
    }

    pub fn with_locale_router(mut self, locale: LocaleRouter) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Injects a constructed cache, which may be shared with other routers.
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self.cache = None;
        self
    }

    pub fn without_cache(self) -> Self {
        self.with_cache(ResultCache::disabled())
    }

    pub fn with_env_config(self) -> Self {
        self.with_env_lookup(|name| std::env::var(name).ok())
    }

    /// Applies `TICKERLINE_*` settings resolved through `lookup`.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("TICKERLINE_PROVIDER_ORDER") {
            match parse_provider_order(&raw) {
                Ok(order) if !order.is_empty() => self = self.with_provider_order(order),
                Ok(_) => {}
                Err(error) => warn!(
                    variable = "TICKERLINE_PROVIDER_ORDER",
                    %error,
                    "ignoring provider order"
                ),
            }
        }

        if let Some(millis) = positive_u64(&lookup, "TICKERLINE_TIMEOUT_MS") {
            self.timeout = Duration::from_millis(millis);
        }
        if let Some(seconds) = env_u64(&lookup, "TICKERLINE_CACHE_TTL_SECS") {
            self.cache_config.ttl = Duration::from_secs(seconds);
            self.cache = None;
        }
        if let Some(seconds) = env_u64(&lookup, "TICKERLINE_QUOTE_CACHE_TTL_SECS") {
            self.cache_config.quote_ttl = Duration::from_secs(seconds);
            self.cache = None;
        }
        if let Some(capacity) = env_u64(&lookup, "TICKERLINE_CACHE_CAPACITY") {
            self.cache_config.max_capacity = capacity;
            self.cache = None;
        }
        self
    }

    pub fn build(self) -> CascadeRouter {
        let adapters = if self.adapters.is_empty() {
            let http_client = self
                .http_client
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
            default_adapters(Arc::new(TimeoutHttpClient::new(http_client, self.timeout)))
        } else {
            self.adapters
        };

        CascadeRouter {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.id(), adapter))
                .collect(),
            locale: self.locale,
            credentials: self.credentials,
            cache: self
                .cache
                .unwrap_or_else(|| ResultCache::new(self.cache_config)),
            timeout: self.timeout,
        }
    }
}

fn parse_provider_order(raw: &str) -> Result<Vec<ProviderId>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ProviderId::from_str)
        .collect()
}

fn env_u64<F>(lookup: &F, name: &'static str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(variable = name, value = %raw, %error, "ignoring invalid setting");
            None
        }
    }
}

fn positive_u64<F>(lookup: &F, name: &'static str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match env_u64(lookup, name)? {
        0 => {
            warn!(variable = name, "ignoring zero setting");
            None
        }
        value => Some(value),
    }
}
