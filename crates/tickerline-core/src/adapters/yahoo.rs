use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::wire::{self, number, required_number, text};
use super::{decode, execute_json, non_empty};
use crate::data_source::FetchFuture;
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    CanonicalData, CanonicalDividendList, CanonicalQuote, CanonicalTimeSeries, Credential,
    DataSource, Dividend, Endpoint, ProviderId, ProviderSpec, RawPayload, SourceError, Symbol,
};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const PROVIDER: ProviderId = ProviderId::Yahoo;

/// Yahoo Finance chart adapter.
///
/// Needs no credential and is the only provider for Indian exchange
/// listings (`.NS`, `.BO`). Quote, daily bars and dividends all come from
/// the same chart endpoint with different ranges.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    fn request(symbol: &Symbol, endpoint: Endpoint) -> Result<HttpRequest, SourceError> {
        let range = match endpoint {
            Endpoint::Quote => "1d",
            Endpoint::TimeSeries => "5y",
            Endpoint::Dividends => "10y",
            _ => return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint)),
        };

        let request = HttpRequest::get(format!(
            "{BASE_URL}/{}",
            urlencoding::encode(symbol.as_str())
        ))
        .with_query("interval", "1d")
        .with_query("range", range);

        Ok(if endpoint == Endpoint::Dividends {
            request.with_query("events", "div")
        } else {
            request
        })
    }
}

impl DataSource for YahooAdapter {
    fn spec(&self) -> ProviderSpec {
        PROVIDER.spec()
    }

    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
        endpoint: Endpoint,
        _credential: Option<&'a Credential>,
    ) -> FetchFuture<'a> {
        Box::pin(async move {
            let request = Self::request(symbol, endpoint)?;
            let payload = execute_json(self.http_client.as_ref(), PROVIDER, request).await?;
            classify(&payload)?;
            Ok(payload)
        })
    }

    fn normalize(
        &self,
        symbol: &Symbol,
        endpoint: Endpoint,
        payload: &RawPayload,
    ) -> Result<CanonicalData, SourceError> {
        let chart = first_result(payload)?;
        let data = match endpoint {
            Endpoint::Quote => CanonicalData::Quote(parse_quote(symbol, &chart)?),
            Endpoint::TimeSeries => CanonicalData::TimeSeries(parse_time_series(symbol, &chart)?),
            Endpoint::Dividends => CanonicalData::Dividends(parse_dividends(symbol, &chart)?),
            _ => return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint)),
        };
        non_empty(PROVIDER, data)
    }
}

fn classify(payload: &RawPayload) -> Result<(), SourceError> {
    let chart = payload.get("chart");
    let error = chart.and_then(|chart| chart.get("error"));

    if let Some(error) = error.filter(|error| !error.is_null()) {
        let code = text(error.get("code")).unwrap_or("unknown");
        let description = text(error.get("description")).unwrap_or("no description");
        let message = format!("Yahoo Finance error {code}: {description}");
        if code == "Not Found" {
            return Err(SourceError::no_data(message));
        }
        return Err(SourceError::unsupported(message));
    }

    let result = chart.and_then(|chart| chart.get("result"));
    if result.map_or(true, wire::is_empty_container) {
        return Err(wire::empty(PROVIDER, "chart result"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<Value>,
    #[serde(default)]
    indicators: Indicators,
    #[serde(default)]
    events: Events,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<Value>,
    regular_market_time: Option<Value>,
    regular_market_day_high: Option<Value>,
    regular_market_day_low: Option<Value>,
    regular_market_volume: Option<Value>,
    previous_close: Option<Value>,
    chart_previous_close: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct IndicatorQuote {
    #[serde(default)]
    open: Vec<Value>,
    #[serde(default)]
    high: Vec<Value>,
    #[serde(default)]
    low: Vec<Value>,
    #[serde(default)]
    close: Vec<Value>,
    #[serde(default)]
    volume: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Events {
    dividends: Option<BTreeMap<String, DividendEvent>>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: Option<Value>,
    date: Option<Value>,
}

fn first_result(payload: &RawPayload) -> Result<ChartResult, SourceError> {
    let envelope: ChartEnvelope = decode(PROVIDER, payload)?;
    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| wire::empty(PROVIDER, "chart result"))
}

/// First non-null entry of an indicator column.
fn first_present(values: Option<&Vec<Value>>) -> Option<&Value> {
    values.and_then(|values| values.iter().find(|value| !value.is_null()))
}

fn parse_quote(symbol: &Symbol, chart: &ChartResult) -> Result<CanonicalQuote, SourceError> {
    let meta = &chart.meta;
    let bars = chart.indicators.quote.first();

    let close = required_number(
        PROVIDER,
        meta.regular_market_price.as_ref(),
        "regularMarketPrice",
    )?;
    let previous_close = match number(PROVIDER, meta.previous_close.as_ref(), "previousClose")? {
        Some(previous) => Some(previous),
        None => number(
            PROVIDER,
            meta.chart_previous_close.as_ref(),
            "chartPreviousClose",
        )?,
    };
    let (change, percent_change) = wire::change_pair(PROVIDER, close, None, None, previous_close)?;

    let high = match number(
        PROVIDER,
        meta.regular_market_day_high.as_ref(),
        "regularMarketDayHigh",
    )? {
        Some(high) => high,
        None => required_number(PROVIDER, first_present(bars.map(|bars| &bars.high)), "high")?,
    };
    let low = match number(
        PROVIDER,
        meta.regular_market_day_low.as_ref(),
        "regularMarketDayLow",
    )? {
        Some(low) => low,
        None => required_number(PROVIDER, first_present(bars.map(|bars| &bars.low)), "low")?,
    };
    let volume = match meta.regular_market_volume.as_ref() {
        Some(value) if !value.is_null() => wire::volume(PROVIDER, Some(value), "regularMarketVolume")?,
        _ => wire::volume(PROVIDER, first_present(bars.map(|bars| &bars.volume)), "volume")?,
    };

    Ok(CanonicalQuote::new(
        symbol.clone(),
        required_number(PROVIDER, first_present(bars.map(|bars| &bars.open)), "open")?,
        high,
        low,
        close,
        volume,
        change,
        percent_change,
        wire::unix_datetime(
            PROVIDER,
            meta.regular_market_time.as_ref(),
            "regularMarketTime",
        )?,
    )?)
}

fn parse_time_series(
    symbol: &Symbol,
    chart: &ChartResult,
) -> Result<CanonicalTimeSeries, SourceError> {
    let bars = chart
        .indicators
        .quote
        .first()
        .ok_or_else(|| wire::missing(PROVIDER, "indicators.quote"))?;

    let mut values = Vec::with_capacity(chart.timestamp.len());
    for (index, timestamp) in chart.timestamp.iter().enumerate() {
        let Some(datetime) = wire::unix_date(PROVIDER, Some(timestamp), "timestamp")? else {
            continue;
        };
        if let Some(value) = wire::bar(
            PROVIDER,
            datetime,
            bars.open.get(index),
            bars.high.get(index),
            bars.low.get(index),
            bars.close.get(index),
            bars.volume.get(index),
        )? {
            values.push(value);
        }
    }

    Ok(CanonicalTimeSeries::new(symbol.clone(), values))
}

fn parse_dividends(
    symbol: &Symbol,
    chart: &ChartResult,
) -> Result<CanonicalDividendList, SourceError> {
    let events = chart
        .events
        .dividends
        .as_ref()
        .ok_or_else(|| wire::empty(PROVIDER, "dividends"))?;

    let dividends = events
        .values()
        .map(|event| {
            let ex_date = wire::unix_date(PROVIDER, event.date.as_ref(), "date")?
                .ok_or_else(|| wire::missing(PROVIDER, "date"))?;
            Ok(Dividend::new(
                ex_date,
                required_number(PROVIDER, event.amount.as_ref(), "amount")?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalDividendList::new(symbol.clone(), dividends))
}
