//! # Tickerline Core
//!
//! Provider cascade and normalization engine for financial market data.
//!
//! ## Overview
//!
//! A request names a symbol and an endpoint. The engine picks an ordered
//! list of upstream providers for the symbol, tries them one at a time and
//! returns the first response that normalizes cleanly into a canonical
//! shape, attributed to the provider that served it:
//!
//! - **Canonical domain models** for quotes, daily bars, dividends,
//!   earnings, cash flow and income statements
//! - **Provider adapters** for TwelveData, FMP, Finnhub, Alpha Vantage and
//!   Yahoo Finance behind one [`DataSource`] trait
//! - **Locale routing** that pins local-exchange symbols to one provider
//! - **Cascade controller** with skip, failure and exhaustion bookkeeping
//! - **Result cache** with bounded capacity and TTL expiry
//! - **Growth analytics** computing CAGR from daily closes or annual statements
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters and shared wire parsing |
//! | [`cache`] | TTL result cache and per-request cache modes |
//! | [`credentials`] | Externally supplied provider credentials |
//! | [`data_source`] | Adapter trait, endpoints and failure taxonomy |
//! | [`domain`] | Canonical models and validated primitives |
//! | [`envelope`] | Failure body for callers |
//! | [`error`] | Validation errors |
//! | [`growth`] | Compound annual growth over series and statements |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`locale`] | Suffix-based provider ordering |
//! | [`routing`] | Cascade controller and its builder |
//! | [`source`] | Provider identifiers and capability table |
//! | [`throttling`] | Fixed-interval pacing for batch runs |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickerline_core::{CascadeRequest, CascadeRouterBuilder, ErrorEnvelope};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = CascadeRouterBuilder::from_env().build();
//!     let request = CascadeRequest::parse(Some("AAPL"), Some("quote")).expect("valid request");
//!
//!     match router.fetch(&request).await {
//!         Ok(result) => println!("{}", serde_json::to_string(&result).unwrap()),
//!         Err(error) => {
//!             let envelope = ErrorEnvelope::for_request(&error, &request);
//!             eprintln!("{} {}", envelope.status, serde_json::to_string(&envelope).unwrap());
//!         }
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Cascade Router  │────▶│  Result Cache    │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Locale Router   │     │ Credential Store │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest/script) │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Canonical Data  │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapters report a [`SourceError`]; the cascade records it and moves on.
//! Only [`CascadeError`] reaches callers:
//!
//! ```rust
//! use tickerline_core::{CascadeError, SourceErrorKind};
//!
//! fn describe(error: &CascadeError) -> &'static str {
//!     match error {
//!         CascadeError::AllProvidersExhausted(failure) if failure.all_skipped() => {
//!             "no provider is configured for this request"
//!         }
//!         CascadeError::AllProvidersExhausted(failure)
//!             if failure.all_failed_with(SourceErrorKind::RateLimited) =>
//!         {
//!             "every provider is rate limited"
//!         }
//!         CascadeError::AllProvidersExhausted(_) => "every provider failed",
//!         _ => "bad request",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys come from a [`CredentialStore`] and are never hard-coded
//! - Keys are redacted from `Debug` output and from logged URLs
//! - Provider calls go over HTTPS through reqwest

pub mod adapters;
pub mod cache;
pub mod credentials;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod growth;
pub mod http_client;
pub mod locale;
pub mod routing;
pub mod source;
pub mod throttling;

// Adapter implementations
pub use adapters::{
    default_adapters, AlphaVantageAdapter, FinnhubAdapter, FmpAdapter, TwelveDataAdapter,
    YahooAdapter,
};

// Caching
pub use cache::{CacheConfig, CacheMode, ResultCache};

// Credentials
pub use credentials::{Credential, CredentialStore};

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, Endpoint, RawPayload, SourceError, SourceErrorKind,
};

// Domain models
pub use domain::{
    volume_from_f64, CanonicalCashFlow, CanonicalData, CanonicalDividendList, CanonicalEarnings,
    CanonicalIncomeStatement, CanonicalQuote, CanonicalTimeSeries, CashFlowStatement, Dividend,
    EarningsReport, IncomeStatement, MarketDate, Symbol, TimeSeriesValue, UtcDateTime,
};

// Envelope types
pub use envelope::ErrorEnvelope;

// Error types
pub use error::ValidationError;

// Growth analytics
pub use growth::{Growth, GrowthMetric, GrowthPoint};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, ScriptedHttpClient,
    ScriptedReply, TimeoutHttpClient,
};

// Locale routing
pub use locale::{Locale, LocaleRouter, LocaleRule};

// Routing types
pub use routing::{
    CascadeError, CascadeFailure, CascadeRequest, CascadeResult, CascadeRouter,
    CascadeRouterBuilder, PlannedProvider, ProviderFailure, SkipReason, SkippedProvider,
};

// Source identifiers
pub use source::{ProviderId, ProviderSpec};

// Throttling
pub use throttling::Pacer;
