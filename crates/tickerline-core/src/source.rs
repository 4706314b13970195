use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data_source::{CapabilitySet, Endpoint};
use crate::ValidationError;

/// Canonical provider identifiers used in routing, skips and attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    TwelveData,
    Fmp,
    Finnhub,
    AlphaVantage,
    Yahoo,
}

impl ProviderId {
    pub const ALL: [Self; 5] = [
        Self::TwelveData,
        Self::Fmp,
        Self::Finnhub,
        Self::AlphaVantage,
        Self::Yahoo,
    ];

    /// Default cascade order for symbols without a locale rule.
    pub const DEFAULT_ORDER: [Self; 4] = [
        Self::TwelveData,
        Self::Fmp,
        Self::Finnhub,
        Self::AlphaVantage,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TwelveData => "twelvedata",
            Self::Fmp => "fmp",
            Self::Finnhub => "finnhub",
            Self::AlphaVantage => "alphavantage",
            Self::Yahoo => "yahoo",
        }
    }

    /// Human-facing provider name reported as `source` in results.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::TwelveData => "TwelveData",
            Self::Fmp => "FMP",
            Self::Finnhub => "Finnhub",
            Self::AlphaVantage => "AlphaVantage",
            Self::Yahoo => "Yahoo Finance",
        }
    }

    pub const fn spec(self) -> ProviderSpec {
        use Endpoint::*;

        match self {
            Self::TwelveData => ProviderSpec {
                id: self,
                capabilities: CapabilitySet::full(),
                credential: Some("TWELVEDATA_API_KEY"),
            },
            Self::Fmp => ProviderSpec {
                id: self,
                capabilities: CapabilitySet::full(),
                credential: Some("FMP_API_KEY"),
            },
            Self::Finnhub => ProviderSpec {
                id: self,
                capabilities: CapabilitySet::of(&[Quote, TimeSeries, Dividends, Earnings]),
                credential: Some("FINNHUB_API_KEY"),
            },
            Self::AlphaVantage => ProviderSpec {
                id: self,
                capabilities: CapabilitySet::of(&[
                    Quote,
                    TimeSeries,
                    Earnings,
                    CashFlow,
                    IncomeStatement,
                ]),
                credential: Some("ALPHA_VANTAGE_API_KEY"),
            },
            Self::Yahoo => ProviderSpec {
                id: self,
                capabilities: CapabilitySet::of(&[Quote, TimeSeries, Dividends]),
                credential: None,
            },
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "twelvedata" | "twelve_data" => Ok(Self::TwelveData),
            "fmp" => Ok(Self::Fmp),
            "finnhub" => Ok(Self::Finnhub),
            "alphavantage" | "alpha_vantage" => Ok(Self::AlphaVantage),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Static, immutable descriptor of one upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub capabilities: CapabilitySet,
    /// Conventional environment variable holding the credential, if one is required.
    pub credential: Option<&'static str>,
}

impl ProviderSpec {
    pub const fn name(self) -> &'static str {
        self.id.display_name()
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        self.capabilities.supports(endpoint)
    }

    pub const fn requires_credential(self) -> bool {
        self.credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_aliases() {
        assert_eq!("TwelveData".parse::<ProviderId>(), Ok(ProviderId::TwelveData));
        assert_eq!("alpha_vantage".parse::<ProviderId>(), Ok(ProviderId::AlphaVantage));
        assert!(matches!(
            "iexcloud".parse::<ProviderId>(),
            Err(ValidationError::InvalidProvider { .. })
        ));
    }

    #[test]
    fn yahoo_needs_no_credential_and_lacks_statements() {
        let spec = ProviderId::Yahoo.spec();
        assert!(!spec.requires_credential());
        assert!(spec.supports(Endpoint::Dividends));
        assert!(!spec.supports(Endpoint::IncomeStatement));
    }

    #[test]
    fn finnhub_and_alphavantage_capabilities_follow_their_apis() {
        assert!(!ProviderId::Finnhub.spec().supports(Endpoint::CashFlow));
        assert!(!ProviderId::AlphaVantage.spec().supports(Endpoint::Dividends));
        assert_eq!(ProviderId::Fmp.spec().name(), "FMP");
    }
}
