//! Behavior-driven tests for the provider cascade.
//!
//! Every test drives a real `CascadeRouter` over a scripted transport and
//! checks what a caller observes: which provider served the request, which
//! calls went out, and what the failure looks like when nothing could.

use std::sync::Arc;
use std::time::Duration;

use tickerline_core::{
    CacheMode, CanonicalData, CascadeError, CascadeRequest, CascadeRouter, CascadeRouterBuilder,
    CredentialStore, Endpoint, ErrorEnvelope, ProviderId, ScriptedHttpClient, SkipReason,
    SourceErrorKind, Symbol,
};

const TWELVEDATA_QUOTE: &str = r#"{
    "symbol": "AAPL", "datetime": "2024-01-02", "timestamp": 1704205800,
    "open": "187.15000", "high": "188.44000", "low": "183.89000", "close": "185.64000",
    "volume": "82488700", "previous_close": "192.53000",
    "change": "-6.89000", "percent_change": "-3.57866"
}"#;

const TWELVEDATA_RATE_LIMITED: &str = r#"{
    "code": 429,
    "message": "You have run out of API credits for the current minute.",
    "status": "error"
}"#;

const FMP_QUOTE: &str = r#"[{
    "symbol": "AAPL", "name": "Apple Inc.", "price": 185.64, "changesPercentage": -3.5787,
    "change": -6.89, "dayLow": 183.89, "dayHigh": 188.44, "open": 187.15,
    "volume": 82488700, "previousClose": 192.53, "timestamp": 1704229201
}]"#;

const YAHOO_QUOTE: &str = r#"{"chart": {"result": [{
    "meta": {
        "currency": "INR", "symbol": "RELIANCE.NS", "regularMarketPrice": 2600.0,
        "regularMarketTime": 1704189600, "regularMarketDayHigh": 2610.0,
        "regularMarketDayLow": 2570.5, "regularMarketVolume": 5123456,
        "chartPreviousClose": 2500.0
    },
    "timestamp": [1704166500],
    "indicators": {"quote": [{"open": [2580.0], "high": [2610.0], "low": [2570.5], "close": [2600.0], "volume": [5123456]}]}
}], "error": null}}"#;

const TWELVEDATA_SERIES_UNORDERED: &str = r#"{
    "meta": {"symbol": "AAPL", "interval": "1day"},
    "values": [
        {"datetime": "2024-01-03", "open": "184.22", "high": "185.88", "low": "183.43", "close": "184.25", "volume": "58414500"},
        {"datetime": "2023-12-28", "open": "194.14", "high": "194.66", "low": "193.17", "close": "193.58", "volume": "34049900"},
        {"datetime": "2024-01-02", "open": "187.15", "high": "188.44", "low": "183.89", "close": null, "volume": "82488700"},
        {"datetime": "2023-12-29", "open": "193.90", "high": "194.40", "low": "191.73", "close": "192.53", "volume": "42628800"}
    ],
    "status": "ok"
}"#;

fn all_general_credentials() -> CredentialStore {
    CredentialStore::new()
        .with(ProviderId::TwelveData, "td-key")
        .with(ProviderId::Fmp, "fmp-key")
        .with(ProviderId::Finnhub, "fh-key")
        .with(ProviderId::AlphaVantage, "av-key")
}

fn router(client: Arc<ScriptedHttpClient>, credentials: CredentialStore) -> CascadeRouter {
    CascadeRouterBuilder::new()
        .with_http_client(client)
        .with_credentials(credentials)
        .build()
}

fn request(symbol: &str, endpoint: Endpoint) -> CascadeRequest {
    CascadeRequest::new(Symbol::parse(symbol).expect("valid symbol"), endpoint)
}

// =============================================================================
// Locale routing
// =============================================================================

#[tokio::test]
async fn when_symbol_is_an_indian_listing_only_the_locale_provider_is_called() {
    // Given: every general provider is configured and would answer
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond("query1.finance.yahoo.com", 200, YAHOO_QUOTE)
            .respond("api.twelvedata.com", 200, TWELVEDATA_QUOTE)
            .respond("financialmodelingprep.com", 200, FMP_QUOTE),
    );
    let router = router(client.clone(), all_general_credentials());

    // When: a quote for an NSE symbol is requested
    let result = router
        .fetch(&request("RELIANCE.NS", Endpoint::Quote))
        .await
        .expect("yahoo serves the quote");

    // Then: Yahoo is the source and nothing else was called
    assert_eq!(result.source, ProviderId::Yahoo);
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url().contains("query1.finance.yahoo.com"));

    let json = serde_json::to_value(&result).expect("serializable");
    assert_eq!(json["source"], ProviderId::Yahoo.display_name());
    assert_eq!(json["symbol"], "RELIANCE.NS");
}

#[tokio::test]
async fn when_the_locale_provider_fails_there_is_no_fallback() {
    // Given: Yahoo is down but general providers would answer
    let client = Arc::new(
        ScriptedHttpClient::new()
            .fail("query1.finance.yahoo.com", "connection refused")
            .respond("api.twelvedata.com", 200, TWELVEDATA_QUOTE),
    );
    let router = router(client.clone(), all_general_credentials());

    // When: a BSE symbol is requested
    let error = router
        .fetch(&request("500325.BO", Endpoint::Quote))
        .await
        .expect_err("locale provider failed");

    // Then: the cascade is exhausted after exactly one network attempt
    let failure = error.failure().expect("exhausted");
    assert_eq!(failure.attempted.len(), 1);
    assert_eq!(failure.attempted[0].provider, ProviderId::Yahoo);
    assert_eq!(failure.attempted[0].kind, SourceErrorKind::Network);
    assert_eq!(client.requests().len(), 1);
}

// =============================================================================
// Cascade order and failure bookkeeping
// =============================================================================

#[tokio::test]
async fn when_first_provider_is_rate_limited_the_next_one_serves() {
    // Given: TwelveData answers with its rate-limit body, FMP succeeds
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond("api.twelvedata.com", 200, TWELVEDATA_RATE_LIMITED)
            .respond("financialmodelingprep.com", 200, FMP_QUOTE),
    );
    let router = router(client.clone(), all_general_credentials());

    // When
    let result = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("fmp serves the quote");

    // Then: FMP is the source and exactly one failure is recorded, for TwelveData
    assert_eq!(result.source, ProviderId::Fmp);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].provider, ProviderId::TwelveData);
    assert_eq!(result.failures[0].kind, SourceErrorKind::RateLimited);
    assert!(!result.cache_hit);

    // And the failure list stays out of the caller-facing JSON
    let json = serde_json::to_value(&result).expect("serializable");
    assert_eq!(json["source"], "FMP");
    assert!(json.get("failures").is_none());
    assert!(json.get("lastUpdated").is_some());
    assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn providers_without_credentials_are_skipped_silently() {
    // Given: only FMP has a key
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond("api.twelvedata.com", 200, TWELVEDATA_QUOTE)
            .respond("financialmodelingprep.com", 200, FMP_QUOTE),
    );
    let router = router(
        client.clone(),
        CredentialStore::new().with(ProviderId::Fmp, "fmp-key"),
    );

    // When
    let result = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("fmp serves the quote");

    // Then: TwelveData was skipped, not failed, and never called
    assert_eq!(result.source, ProviderId::Fmp);
    assert!(result.failures.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].provider, ProviderId::TwelveData);
    assert_eq!(result.skipped[0].reason, SkipReason::MissingCredential);
    assert!(client
        .requests()
        .iter()
        .all(|request| !request.url().contains("twelvedata")));
}

#[tokio::test]
async fn custom_provider_order_is_respected() {
    // Given: FMP is configured first
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond("api.twelvedata.com", 200, TWELVEDATA_QUOTE)
            .respond("financialmodelingprep.com", 200, FMP_QUOTE),
    );
    let router = CascadeRouterBuilder::new()
        .with_http_client(client.clone())
        .with_credentials(all_general_credentials())
        .with_provider_order([ProviderId::Fmp, ProviderId::TwelveData])
        .build();

    // When
    let result = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("served");

    // Then
    assert_eq!(result.source, ProviderId::Fmp);
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn slow_provider_times_out_and_the_cascade_continues() {
    // Given: TwelveData stalls past the router timeout
    let client = Arc::new(
        ScriptedHttpClient::new()
            .stall("api.twelvedata.com", Duration::from_secs(5))
            .respond("financialmodelingprep.com", 200, FMP_QUOTE),
    );
    let router = CascadeRouterBuilder::new()
        .with_http_client(client)
        .with_credentials(all_general_credentials())
        .with_timeout(Duration::from_millis(50))
        .build();

    // When
    let result = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("fmp serves after the timeout");

    // Then: the timeout counts as a network failure
    assert_eq!(result.source, ProviderId::Fmp);
    assert_eq!(result.failures[0].kind, SourceErrorKind::Network);
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn empty_symbol_is_rejected_before_any_network_call() {
    let client = Arc::new(ScriptedHttpClient::new());
    let _router = router(client.clone(), all_general_credentials());

    let error = CascadeRequest::parse(Some(""), Some("quote")).expect_err("missing symbol");

    assert!(matches!(error, CascadeError::MissingParameter { name: "symbol" }));
    assert_eq!(error.status_code(), 400);
    let envelope = ErrorEnvelope::from_error(&error).with_request(Some(""), Some("quote"));
    assert_eq!(envelope.symbol, None);
    assert_eq!(envelope.endpoint.as_deref(), Some("quote"));
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn unknown_endpoint_is_rejected_before_any_network_call() {
    let client = Arc::new(ScriptedHttpClient::new());
    let _router = router(client.clone(), all_general_credentials());

    let error = CascadeRequest::parse(Some("AAPL"), Some("bogus")).expect_err("unknown endpoint");

    assert!(matches!(error, CascadeError::UnsupportedEndpoint { .. }));
    assert_eq!(error.status_code(), 400);
    let json = serde_json::to_value(ErrorEnvelope::from_error(&error)).expect("serializable");
    assert_eq!(json["symbol"], "AAPL");
    assert_eq!(json["endpoint"], "bogus");
    assert!(client.requests().is_empty());
}

// =============================================================================
// Normalization through the cascade
// =============================================================================

#[tokio::test]
async fn time_series_is_ascending_and_drops_missing_closes() {
    // Given: TwelveData returns newest-first bars with one null close
    let client = Arc::new(ScriptedHttpClient::new().respond(
        "api.twelvedata.com/time_series",
        200,
        TWELVEDATA_SERIES_UNORDERED,
    ));
    let router = router(client, all_general_credentials());

    // When
    let result = router
        .fetch(&request("AAPL", Endpoint::TimeSeries))
        .await
        .expect("series");

    // Then
    let CanonicalData::TimeSeries(series) = &result.data else {
        panic!("expected a time series");
    };
    let dates = series
        .values()
        .iter()
        .map(|value| value.datetime.to_string())
        .collect::<Vec<_>>();
    assert_eq!(dates, vec!["2023-12-28", "2023-12-29", "2024-01-03"]);
}

// =============================================================================
// Exhaustion
// =============================================================================

#[tokio::test]
async fn without_any_credentials_the_failure_reports_all_skipped() {
    // Given: no credentials at all
    let client = Arc::new(ScriptedHttpClient::new());
    let router = router(client.clone(), CredentialStore::new());

    // When
    let error = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect_err("nothing to try");

    // Then: exhausted, every candidate skipped, nothing attempted
    let failure = error.failure().expect("exhausted");
    assert!(failure.all_skipped());
    assert_eq!(failure.skipped.len(), 4);
    assert!(failure
        .skipped
        .iter()
        .all(|skipped| skipped.reason == SkipReason::MissingCredential));
    assert_eq!(error.status_code(), 500);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn when_every_provider_fails_each_reason_is_listed_in_order() {
    // Given: every provider answers with a failure of its own
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond("api.twelvedata.com", 200, TWELVEDATA_RATE_LIMITED)
            .respond("financialmodelingprep.com", 200, "[]")
            .respond("finnhub.io", 500, "{}")
            .fail("alphavantage.co", "connection reset"),
    );
    let router = router(client, all_general_credentials());

    // When
    let error = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect_err("all failed");

    // Then
    let failure = error.failure().expect("exhausted");
    assert!(!failure.all_skipped());
    let kinds = failure
        .attempted
        .iter()
        .map(|attempt| (attempt.provider, attempt.kind))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            (ProviderId::TwelveData, SourceErrorKind::RateLimited),
            (ProviderId::Fmp, SourceErrorKind::NoData),
            (ProviderId::Finnhub, SourceErrorKind::Network),
            (ProviderId::AlphaVantage, SourceErrorKind::Network),
        ]
    );

    let envelope = ErrorEnvelope::from_error(&error);
    assert_eq!(envelope.status, 500);
    assert_eq!(envelope.attempts.len(), 4);
    assert_eq!(envelope.endpoint.as_deref(), Some("quote"));
}

#[tokio::test]
async fn all_rate_limited_is_distinguishable() {
    let client = Arc::new(ScriptedHttpClient::new().respond("", 429, "{}"));
    let router = router(client, all_general_credentials());

    let error = router
        .fetch(&request("MSFT", Endpoint::Quote))
        .await
        .expect_err("all limited");

    let failure = error.failure().expect("exhausted");
    assert!(failure.all_failed_with(SourceErrorKind::RateLimited));
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let client = Arc::new(ScriptedHttpClient::new().respond("api.twelvedata.com", 200, TWELVEDATA_QUOTE));
    let router = router(client.clone(), all_general_credentials());

    let first = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("first");
    let second = router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("second");

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(second.source, ProviderId::TwelveData);
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn refresh_mode_skips_the_cached_entry() {
    let client = Arc::new(ScriptedHttpClient::new().respond("api.twelvedata.com", 200, TWELVEDATA_QUOTE));
    let router = router(client.clone(), all_general_credentials());

    router
        .fetch(&request("AAPL", Endpoint::Quote))
        .await
        .expect("first");
    let refreshed = router
        .fetch(&request("AAPL", Endpoint::Quote).with_cache_mode(CacheMode::Refresh))
        .await
        .expect("refreshed");

    assert!(!refreshed.cache_hit);
    assert_eq!(client.requests().len(), 2);
}
