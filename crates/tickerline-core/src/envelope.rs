use serde::Serialize;

use crate::{CascadeError, CascadeRequest, ProviderFailure};

/// Failure body returned to callers: `{error, symbol, endpoint}`.
///
/// The status code travels alongside the body rather than inside it.
/// Exhausted cascades also carry the per-provider attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub symbol: Option<String>,
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ProviderFailure>,
    #[serde(skip)]
    pub status: u16,
}

impl ErrorEnvelope {
    pub fn from_error(error: &CascadeError) -> Self {
        Self {
            error: error.to_string(),
            symbol: error.symbol().map(str::to_owned),
            endpoint: error.endpoint().map(str::to_owned),
            attempts: error
                .failure()
                .map(|failure| failure.attempted.clone())
                .unwrap_or_default(),
            status: error.status_code(),
        }
    }

    /// Fills in whatever the error itself could not name from the raw caller input.
    pub fn with_request(mut self, symbol: Option<&str>, endpoint: Option<&str>) -> Self {
        if self.symbol.is_none() {
            self.symbol = symbol
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned);
        }
        if self.endpoint.is_none() {
            self.endpoint = endpoint
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned);
        }
        self
    }

    /// Like [`ErrorEnvelope::with_request`] for an already validated request.
    pub fn for_request(error: &CascadeError, request: &CascadeRequest) -> Self {
        Self::from_error(error).with_request(
            Some(request.symbol.as_str()),
            Some(request.endpoint.as_str()),
        )
    }

    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }
}

impl From<&CascadeError> for ErrorEnvelope {
    fn from(error: &CascadeError) -> Self {
        Self::from_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CascadeFailure, Endpoint, ProviderId, SourceError, Symbol};

    #[test]
    fn missing_symbol_is_a_client_error_with_null_symbol() {
        let error = CascadeRequest::parse(None, Some("quote")).expect_err("missing");
        let envelope = ErrorEnvelope::from_error(&error).with_request(None, Some("quote"));

        assert_eq!(envelope.status, 400);
        assert!(envelope.is_client_error());

        let json = serde_json::to_value(&envelope).expect("serializable");
        assert_eq!(json["error"], "missing required parameter 'symbol'");
        assert!(json["symbol"].is_null());
        assert_eq!(json["endpoint"], "quote");
        assert!(json.get("attempts").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn unknown_endpoint_keeps_raw_values() {
        let error = CascadeRequest::parse(Some("AAPL"), Some("bogus")).expect_err("unknown");
        let envelope = ErrorEnvelope::from(&error);
        assert_eq!(envelope.symbol.as_deref(), Some("AAPL"));
        assert_eq!(envelope.endpoint.as_deref(), Some("bogus"));
        assert_eq!(envelope.status, 400);
    }

    #[test]
    fn exhausted_cascade_is_a_server_error_listing_attempts() {
        let error = CascadeError::AllProvidersExhausted(CascadeFailure {
            symbol: Symbol::parse("AAPL").expect("symbol"),
            endpoint: Endpoint::Quote,
            attempted: vec![ProviderFailure::new(
                ProviderId::TwelveData,
                &SourceError::network("connection reset"),
            )],
            skipped: Vec::new(),
        });
        let envelope = ErrorEnvelope::from_error(&error);

        assert_eq!(envelope.status, 500);
        assert!(!envelope.is_client_error());
        assert!(envelope.error.contains("TwelveData: network"));

        let json = serde_json::to_value(&envelope).expect("serializable");
        assert_eq!(json["attempts"][0]["provider"], "twelvedata");
        assert_eq!(json["attempts"][0]["kind"], "network");
    }
}
