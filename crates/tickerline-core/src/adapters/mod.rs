//! Provider adapters, one per upstream.
//!
//! Every adapter shares the same transport classification
//! ([`execute_json`]) and then applies its own rules for failures the
//! provider reports inside a successful HTTP response.

mod alphavantage;
mod finnhub;
mod fmp;
mod twelvedata;
pub(crate) mod wire;
mod yahoo;

use std::sync::Arc;

use serde::Deserialize;

pub use alphavantage::AlphaVantageAdapter;
pub use finnhub::FinnhubAdapter;
pub use fmp::FmpAdapter;
pub use twelvedata::TwelveDataAdapter;
pub use yahoo::YahooAdapter;

use crate::http_client::{HttpClient, HttpRequest};
use crate::{CanonicalData, DataSource, ProviderId, RawPayload, SourceError};

/// One adapter per provider, all sharing `http_client`.
pub fn default_adapters(http_client: Arc<dyn HttpClient>) -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(TwelveDataAdapter::new(Arc::clone(&http_client))),
        Arc::new(FmpAdapter::new(Arc::clone(&http_client))),
        Arc::new(FinnhubAdapter::new(Arc::clone(&http_client))),
        Arc::new(AlphaVantageAdapter::new(Arc::clone(&http_client))),
        Arc::new(YahooAdapter::new(http_client)),
    ]
}

/// Executes `request` and decodes a JSON body, mapping transport outcomes
/// onto the failure taxonomy.
pub(crate) async fn execute_json(
    http_client: &dyn HttpClient,
    provider: ProviderId,
    request: HttpRequest,
) -> Result<RawPayload, SourceError> {
    let url = request.redacted_url();
    tracing::debug!(provider = provider.as_str(), url = %url, "requesting provider");

    let response = http_client.execute(request).await.map_err(|e| {
        SourceError::network(format!(
            "{} transport error: {}",
            provider.display_name(),
            e.message()
        ))
    })?;

    classify_status(provider, response.status)?;

    serde_json::from_str(&response.body).map_err(|e| {
        SourceError::malformed(format!(
            "{} returned a non-JSON body: {e}",
            provider.display_name()
        ))
    })
}

fn classify_status(provider: ProviderId, status: u16) -> Result<(), SourceError> {
    let name = provider.display_name();
    match status {
        200..=299 => Ok(()),
        429 => Err(SourceError::rate_limited(format!(
            "{name} returned status 429"
        ))),
        401 | 403 => Err(SourceError::unsupported(format!(
            "{name} rejected the credential or plan (status {status})"
        ))),
        404 => Err(SourceError::no_data(format!("{name} returned status 404"))),
        _ => Err(SourceError::network(format!(
            "{name} returned status {status}"
        ))),
    }
}

/// Deserializes a wire struct out of a raw payload.
pub(crate) fn decode<'a, T>(provider: ProviderId, payload: &'a RawPayload) -> Result<T, SourceError>
where
    T: Deserialize<'a>,
{
    T::deserialize(payload).map_err(|e| {
        SourceError::malformed(format!(
            "unexpected {} response shape: {e}",
            provider.display_name()
        ))
    })
}

/// Rejects an empty collection shape as `NoData`.
pub(crate) fn non_empty(
    provider: ProviderId,
    data: CanonicalData,
) -> Result<CanonicalData, SourceError> {
    if data.is_empty() {
        return Err(wire::empty(provider, data.endpoint().as_str()));
    }
    Ok(data)
}

/// Case-insensitive substring test used for provider error messages.
pub(crate) fn mentions(message: &str, needles: &[&str]) -> bool {
    let message = message.to_ascii_lowercase();
    needles.iter().any(|needle| message.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ScriptedHttpClient;
    use crate::SourceErrorKind;

    async fn kind_for(status: u16, body: &str) -> SourceErrorKind {
        let client = ScriptedHttpClient::new().respond("example.test", status, body);
        execute_json(
            &client,
            ProviderId::Fmp,
            HttpRequest::get("https://example.test/quote"),
        )
        .await
        .expect_err("classified failure")
        .kind()
    }

    #[tokio::test]
    async fn transport_statuses_map_onto_failure_kinds() {
        assert_eq!(kind_for(429, "{}").await, SourceErrorKind::RateLimited);
        assert_eq!(kind_for(401, "{}").await, SourceErrorKind::Unsupported);
        assert_eq!(kind_for(403, "{}").await, SourceErrorKind::Unsupported);
        assert_eq!(kind_for(404, "{}").await, SourceErrorKind::NoData);
        assert_eq!(kind_for(502, "{}").await, SourceErrorKind::Network);
        assert_eq!(
            kind_for(200, "<html>oops</html>").await,
            SourceErrorKind::MalformedResponse
        );
    }

    #[tokio::test]
    async fn transport_error_is_network() {
        let client = ScriptedHttpClient::new().fail("example.test", "connection refused");
        let error = execute_json(
            &client,
            ProviderId::Yahoo,
            HttpRequest::get("https://example.test/chart"),
        )
        .await
        .expect_err("transport failure");
        assert_eq!(error.kind(), SourceErrorKind::Network);
        assert!(error.message().contains("connection refused"));
    }

    #[test]
    fn default_adapters_cover_every_provider_once() {
        let client: Arc<dyn HttpClient> = Arc::new(ScriptedHttpClient::new());
        let ids = default_adapters(client)
            .iter()
            .map(|adapter| adapter.id())
            .collect::<Vec<_>>();
        assert_eq!(ids, ProviderId::ALL.to_vec());
    }
}
