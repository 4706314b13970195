//! Data source trait, endpoint enumeration and adapter error types.
//!
//! This module defines the adapter contract (`DataSource`) that every upstream
//! provider implements. An adapter does two things for a `(symbol, endpoint)`
//! pair:
//!
//! 1. [`fetch`](DataSource::fetch) builds the provider URL, executes it and
//!    classifies provider-specific failure signals in the raw body.
//! 2. [`normalize`](DataSource::normalize) reshapes the raw body into one of
//!    the canonical domain shapes.
//!
//! # Endpoints
//!
//! | Endpoint | Wire name | Canonical shape |
//! |----------|-----------|-----------------|
//! | Quote | `quote` | [`CanonicalQuote`](crate::CanonicalQuote) |
//! | TimeSeries | `time_series` | [`CanonicalTimeSeries`](crate::CanonicalTimeSeries) |
//! | Dividends | `dividends` | [`CanonicalDividendList`](crate::CanonicalDividendList) |
//! | Earnings | `earnings` | [`CanonicalEarnings`](crate::CanonicalEarnings) |
//! | CashFlow | `cash_flow` | [`CanonicalCashFlow`](crate::CanonicalCashFlow) |
//! | IncomeStatement | `income_statement` | [`CanonicalIncomeStatement`](crate::CanonicalIncomeStatement) |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CanonicalData, Credential, ProviderId, ProviderSpec, Symbol, ValidationError};

/// Untouched provider response body.
pub type RawPayload = serde_json::Value;

/// Data endpoint type used for routing and capability checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    #[default]
    Quote,
    TimeSeries,
    Dividends,
    Earnings,
    CashFlow,
    IncomeStatement,
}

impl Endpoint {
    pub const ALL: [Self; 6] = [
        Self::Quote,
        Self::TimeSeries,
        Self::Dividends,
        Self::Earnings,
        Self::CashFlow,
        Self::IncomeStatement,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::TimeSeries => "time_series",
            Self::Dividends => "dividends",
            Self::Earnings => "earnings",
            Self::CashFlow => "cash_flow",
            Self::IncomeStatement => "income_statement",
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|endpoint| endpoint.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::InvalidEndpoint {
                value: trimmed.to_owned(),
            })
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn full() -> Self {
        Self::of(&Endpoint::ALL)
    }

    pub const fn of(endpoints: &[Endpoint]) -> Self {
        let mut bits = 0;
        let mut index = 0;
        while index < endpoints.len() {
            bits |= endpoints[index].bit();
            index += 1;
        }
        Self(bits)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        self.0 & endpoint.bit() != 0
    }

    pub fn supported_endpoints(self) -> Vec<Endpoint> {
        Endpoint::ALL
            .into_iter()
            .filter(|endpoint| self.supports(*endpoint))
            .collect()
    }
}

/// Adapter-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    RateLimited,
    NoData,
    MalformedResponse,
    Unsupported,
    Network,
}

impl SourceErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate limited",
            Self::NoData => "no data",
            Self::MalformedResponse => "malformed response",
            Self::Unsupported => "unsupported",
            Self::Network => "network",
        }
    }
}

impl Display for SourceErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured source error the cascade turns into a recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NoData, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::MalformedResponse, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unsupported, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Network, message)
    }

    pub fn unsupported_endpoint(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self::unsupported(format!(
            "{} does not serve the '{endpoint}' endpoint",
            provider.display_name()
        ))
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::NoData => "source.no_data",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::Unsupported => "source.unsupported",
            SourceErrorKind::Network => "source.network",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(value: ValidationError) -> Self {
        Self::malformed(value.to_string())
    }
}

/// Boxed future returned by [`DataSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<RawPayload, SourceError>> + Send + 'a>>;

/// Source adapter contract.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`spec`](DataSource::spec) | Static provider descriptor |
/// | [`fetch`](DataSource::fetch) | Retrieve and classify the raw body |
/// | [`normalize`](DataSource::normalize) | Reshape a raw body into a canonical shape |
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the router shares them as
/// `Arc<dyn DataSource>` across concurrent requests.
pub trait DataSource: Send + Sync {
    /// Returns the static descriptor of this provider.
    fn spec(&self) -> ProviderSpec;

    fn id(&self) -> ProviderId {
        self.spec().id
    }

    fn capabilities(&self) -> crate::CapabilitySet {
        self.spec().capabilities
    }

    fn supports(&self, endpoint: Endpoint) -> bool {
        self.spec().supports(endpoint)
    }

    /// Retrieves the raw provider body for one symbol and endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the transport fails, the provider signals
    /// a rate limit, an entitlement problem or an unknown symbol, or the body
    /// is not JSON.
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
        endpoint: Endpoint,
        credential: Option<&'a Credential>,
    ) -> FetchFuture<'a>;

    /// Reshapes a raw body into the canonical shape for `endpoint`.
    ///
    /// Pure: the same payload always yields the same output.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when required fields are missing or the result is
    /// empty and `MalformedResponse` when values are present but unusable.
    fn normalize(
        &self,
        symbol: &Symbol,
        endpoint: Endpoint,
        payload: &RawPayload,
    ) -> Result<CanonicalData, SourceError>;
}
