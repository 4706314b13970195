//! Contract every provider adapter must honor, checked uniformly across the
//! five implementations.

use std::sync::Arc;

use serde_json::{json, Value};
use tickerline_core::{
    AlphaVantageAdapter, Credential, DataSource, Endpoint, FinnhubAdapter, FmpAdapter, ProviderId,
    ScriptedHttpClient, SourceErrorKind, Symbol, TwelveDataAdapter, YahooAdapter,
};

const SECRET: &str = "contract-secret-key";

struct ProviderCase {
    id: ProviderId,
    client: Arc<ScriptedHttpClient>,
    source: Arc<dyn DataSource>,
    /// A realistic quote body this provider returns for AAPL.
    quote: Value,
}

fn provider_cases() -> Vec<ProviderCase> {
    fn case<F>(id: ProviderId, build: F, quote: Value) -> ProviderCase
    where
        F: FnOnce(Arc<ScriptedHttpClient>) -> Arc<dyn DataSource>,
    {
        let client = Arc::new(ScriptedHttpClient::new().respond("", 200, quote.to_string()));
        ProviderCase {
            id,
            source: build(client.clone()),
            client,
            quote,
        }
    }

    vec![
        case(
            ProviderId::TwelveData,
            |client| Arc::new(TwelveDataAdapter::new(client)),
            json!({
                "symbol": "AAPL", "datetime": "2024-01-02", "timestamp": 1704205800,
                "open": "187.15", "high": "188.44", "low": "183.89", "close": "185.64",
                "volume": "82488700", "previous_close": "192.53",
                "change": "-6.89", "percent_change": "-3.57866"
            }),
        ),
        case(
            ProviderId::Fmp,
            |client| Arc::new(FmpAdapter::new(client)),
            json!([{
                "symbol": "AAPL", "price": 185.64, "changesPercentage": -3.5787,
                "change": -6.89, "dayLow": 183.89, "dayHigh": 188.44, "open": 187.15,
                "volume": 82488700, "previousClose": 192.53, "timestamp": 1704229201
            }]),
        ),
        case(
            ProviderId::Finnhub,
            |client| Arc::new(FinnhubAdapter::new(client)),
            json!({"c": 185.64, "d": -6.89, "dp": -3.5787, "h": 188.44, "l": 183.89, "o": 187.15, "pc": 192.53, "t": 1704229201}),
        ),
        case(
            ProviderId::AlphaVantage,
            |client| Arc::new(AlphaVantageAdapter::new(client)),
            json!({"Global Quote": {
                "01. symbol": "AAPL", "02. open": "187.1500", "03. high": "188.4400",
                "04. low": "183.8900", "05. price": "185.6400", "06. volume": "82488700",
                "07. latest trading day": "2024-01-02", "08. previous close": "192.5300",
                "09. change": "-6.8900", "10. change percent": "-3.5787%"
            }}),
        ),
        case(
            ProviderId::Yahoo,
            |client| Arc::new(YahooAdapter::new(client)),
            json!({"chart": {"result": [{
                "meta": {
                    "symbol": "AAPL", "regularMarketPrice": 185.64, "regularMarketTime": 1704229201,
                    "regularMarketDayHigh": 188.44, "regularMarketDayLow": 183.89,
                    "regularMarketVolume": 82488700, "chartPreviousClose": 192.53
                },
                "timestamp": [1704205800],
                "indicators": {"quote": [{"open": [187.15], "high": [188.44], "low": [183.89], "close": [185.64], "volume": [82488700]}]}
            }], "error": null}}),
        ),
    ]
}

fn symbol() -> Symbol {
    Symbol::parse("AAPL").expect("valid symbol")
}

fn credential() -> Credential {
    Credential::new(SECRET).expect("non-blank credential")
}

#[test]
fn adapter_spec_matches_provider_table() {
    for case in provider_cases() {
        assert_eq!(case.source.id(), case.id);
        assert_eq!(case.source.spec(), case.id.spec(), "provider '{}'", case.id);
        assert!(
            case.source.supports(Endpoint::Quote),
            "provider '{}' must serve quotes",
            case.id
        );
    }
}

#[tokio::test]
async fn unsupported_endpoints_fail_without_network_calls() {
    for case in provider_cases() {
        for endpoint in Endpoint::ALL {
            if case.source.supports(endpoint) {
                continue;
            }
            let error = case
                .source
                .fetch(&symbol(), endpoint, Some(&credential()))
                .await
                .expect_err("unsupported endpoint");
            assert_eq!(
                error.kind(),
                SourceErrorKind::Unsupported,
                "provider '{}' endpoint '{endpoint}'",
                case.id
            );
        }
        assert!(
            case.client.requests().is_empty(),
            "provider '{}' called the network for an unsupported endpoint",
            case.id
        );
    }
}

#[tokio::test]
async fn credentialed_providers_refuse_to_fetch_without_a_key() {
    for case in provider_cases() {
        if !case.id.spec().requires_credential() {
            continue;
        }
        let error = case
            .source
            .fetch(&symbol(), Endpoint::Quote, None)
            .await
            .expect_err("credential required");
        assert_eq!(error.kind(), SourceErrorKind::Unsupported, "provider '{}'", case.id);
        assert!(case.client.requests().is_empty());
    }
}

#[tokio::test]
async fn credentials_never_appear_in_loggable_urls() {
    for case in provider_cases() {
        case.source
            .fetch(&symbol(), Endpoint::Quote, Some(&credential()))
            .await
            .unwrap_or_else(|error| panic!("provider '{}' quote fetch failed: {error}", case.id));

        let requests = case.client.requests();
        assert_eq!(requests.len(), 1, "provider '{}' request count", case.id);
        assert!(
            !requests[0].redacted_url().contains(SECRET),
            "provider '{}' leaked its key into a log URL",
            case.id
        );
    }
}

#[test]
fn quote_normalization_is_pure_and_validated() {
    for case in provider_cases() {
        let first = case
            .source
            .normalize(&symbol(), Endpoint::Quote, &case.quote)
            .unwrap_or_else(|error| panic!("provider '{}' quote failed: {error}", case.id));
        let second = case
            .source
            .normalize(&symbol(), Endpoint::Quote, &case.quote)
            .expect("second normalization");

        assert_eq!(first, second, "provider '{}' normalize is not pure", case.id);
        assert_eq!(first.endpoint(), Endpoint::Quote);
        assert_eq!(first.symbol().as_str(), "AAPL");

        let json = serde_json::to_value(&first).expect("serializable");
        assert!(
            (json["close"].as_f64().expect("close") - 185.64).abs() < 1e-9,
            "provider '{}' close",
            case.id
        );
        assert!(json["high"].as_f64() >= json["low"].as_f64());
    }
}

#[test]
fn empty_bodies_are_errors_for_every_supported_endpoint() {
    for case in provider_cases() {
        for endpoint in Endpoint::ALL {
            if !case.source.supports(endpoint) {
                continue;
            }
            for payload in [json!({}), json!([]), Value::Null] {
                let error = case
                    .source
                    .normalize(&symbol(), endpoint, &payload)
                    .expect_err("empty body must not normalize");
                assert!(
                    matches!(
                        error.kind(),
                        SourceErrorKind::NoData | SourceErrorKind::MalformedResponse
                    ),
                    "provider '{}' endpoint '{endpoint}' payload {payload}: {:?}",
                    case.id,
                    error.kind()
                );
            }
        }
    }
}
