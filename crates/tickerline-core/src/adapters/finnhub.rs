use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use super::wire::{self, number, required_date, required_number};
use super::{decode, execute_json, mentions, non_empty};
use crate::data_source::FetchFuture;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::{
    CanonicalData, CanonicalDividendList, CanonicalEarnings, CanonicalQuote, CanonicalTimeSeries,
    Credential, DataSource, Dividend, EarningsReport, Endpoint, MarketDate, ProviderId,
    ProviderSpec, RawPayload, SourceError, Symbol,
};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER: ProviderId = ProviderId::Finnhub;
const HISTORY_DAYS: i64 = 5 * 365;

/// Finnhub adapter. The token travels in the `X-Finnhub-Token` header.
///
/// Finnhub's quote carries no volume, so quotes from it report zero.
#[derive(Clone)]
pub struct FinnhubAdapter {
    http_client: Arc<dyn HttpClient>,
}

impl FinnhubAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    fn request(
        symbol: &Symbol,
        endpoint: Endpoint,
        credential: &Credential,
        now: OffsetDateTime,
    ) -> Result<HttpRequest, SourceError> {
        let from = now - Duration::days(HISTORY_DAYS);
        let request = match endpoint {
            Endpoint::Quote => HttpRequest::get(format!("{BASE_URL}/quote")),
            Endpoint::TimeSeries => HttpRequest::get(format!("{BASE_URL}/stock/candle")),
            Endpoint::Dividends => HttpRequest::get(format!("{BASE_URL}/stock/dividend")),
            Endpoint::Earnings => HttpRequest::get(format!("{BASE_URL}/stock/earnings")),
            Endpoint::CashFlow | Endpoint::IncomeStatement => {
                return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint));
            }
        }
        .with_query("symbol", symbol.as_str());

        let request = match endpoint {
            Endpoint::TimeSeries => request
                .with_query("resolution", "D")
                .with_query("from", from.unix_timestamp().to_string())
                .with_query("to", now.unix_timestamp().to_string()),
            Endpoint::Dividends => request
                .with_query("from", MarketDate::from_date(from.date()).format())
                .with_query("to", MarketDate::from_date(now.date()).format()),
            _ => request,
        };

        Ok(request.with_auth(&HttpAuth::Header {
            name: String::from("X-Finnhub-Token"),
            value: credential.expose().to_owned(),
        }))
    }
}

impl DataSource for FinnhubAdapter {
    fn spec(&self) -> ProviderSpec {
        PROVIDER.spec()
    }

    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
        endpoint: Endpoint,
        credential: Option<&'a Credential>,
    ) -> FetchFuture<'a> {
        Box::pin(async move {
            if !self.supports(endpoint) {
                return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint));
            }
            let credential = credential
                .ok_or_else(|| SourceError::unsupported("Finnhub requires an API key"))?;

            let request = Self::request(symbol, endpoint, credential, OffsetDateTime::now_utc())?;
            let payload = execute_json(self.http_client.as_ref(), PROVIDER, request).await?;
            classify(endpoint, &payload)?;
            Ok(payload)
        })
    }

    fn normalize(
        &self,
        symbol: &Symbol,
        endpoint: Endpoint,
        payload: &RawPayload,
    ) -> Result<CanonicalData, SourceError> {
        let data = match endpoint {
            Endpoint::Quote => CanonicalData::Quote(parse_quote(symbol, payload)?),
            Endpoint::TimeSeries => CanonicalData::TimeSeries(parse_candles(symbol, payload)?),
            Endpoint::Dividends => CanonicalData::Dividends(parse_dividends(symbol, payload)?),
            Endpoint::Earnings => CanonicalData::Earnings(parse_earnings(symbol, payload)?),
            Endpoint::CashFlow | Endpoint::IncomeStatement => {
                return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint));
            }
        };
        non_empty(PROVIDER, data)
    }
}

fn classify(endpoint: Endpoint, payload: &RawPayload) -> Result<(), SourceError> {
    if let Some(message) = payload.get("error").and_then(Value::as_str) {
        let message = format!("Finnhub error: {message}");
        if mentions(&message, &["limit"]) {
            return Err(SourceError::rate_limited(message));
        }
        return Err(SourceError::unsupported(message));
    }

    if payload.get("s").and_then(Value::as_str) == Some("no_data") {
        return Err(wire::empty(PROVIDER, "data"));
    }

    // Unknown symbols get a quote of all zeros.
    if endpoint == Endpoint::Quote && payload.get("t").and_then(Value::as_i64) == Some(0) {
        return Err(wire::empty(PROVIDER, "quote"));
    }

    if wire::is_empty_container(payload) {
        return Err(wire::empty(PROVIDER, "data"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QuoteBody {
    o: Option<Value>,
    h: Option<Value>,
    l: Option<Value>,
    c: Option<Value>,
    d: Option<Value>,
    dp: Option<Value>,
    pc: Option<Value>,
    t: Option<Value>,
}

fn parse_quote(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalQuote, SourceError> {
    let body: QuoteBody = decode(PROVIDER, payload)?;

    let close = required_number(PROVIDER, body.c.as_ref(), "c")?;
    let (change, percent_change) = wire::change_pair(
        PROVIDER,
        close,
        number(PROVIDER, body.d.as_ref(), "d")?,
        number(PROVIDER, body.dp.as_ref(), "dp")?,
        number(PROVIDER, body.pc.as_ref(), "pc")?,
    )?;

    Ok(CanonicalQuote::new(
        symbol.clone(),
        required_number(PROVIDER, body.o.as_ref(), "o")?,
        required_number(PROVIDER, body.h.as_ref(), "h")?,
        required_number(PROVIDER, body.l.as_ref(), "l")?,
        close,
        0,
        change,
        percent_change,
        wire::unix_datetime(PROVIDER, body.t.as_ref(), "t")?,
    )?)
}

#[derive(Debug, Deserialize)]
struct CandleBody {
    t: Option<Value>,
    o: Option<Value>,
    h: Option<Value>,
    l: Option<Value>,
    c: Option<Value>,
    v: Option<Value>,
}

fn parse_candles(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalTimeSeries, SourceError> {
    let body: CandleBody = decode(PROVIDER, payload)?;
    let timestamps = wire::array(PROVIDER, body.t.as_ref(), "t")?;
    let opens = wire::array(PROVIDER, body.o.as_ref(), "o")?;
    let highs = wire::array(PROVIDER, body.h.as_ref(), "h")?;
    let lows = wire::array(PROVIDER, body.l.as_ref(), "l")?;
    let closes = wire::array(PROVIDER, body.c.as_ref(), "c")?;
    let volumes = match body.v.as_ref() {
        Some(Value::Array(values)) => values.as_slice(),
        _ => &[],
    };

    let mut values = Vec::with_capacity(timestamps.len());
    for (index, timestamp) in timestamps.iter().enumerate() {
        let Some(datetime) = wire::unix_date(PROVIDER, Some(timestamp), "t")? else {
            continue;
        };
        if let Some(value) = wire::bar(
            PROVIDER,
            datetime,
            opens.get(index),
            highs.get(index),
            lows.get(index),
            closes.get(index),
            volumes.get(index),
        )? {
            values.push(value);
        }
    }

    Ok(CanonicalTimeSeries::new(symbol.clone(), values))
}

#[derive(Debug, Deserialize)]
struct DividendRow {
    date: Option<Value>,
    amount: Option<Value>,
}

fn parse_dividends(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalDividendList, SourceError> {
    let rows: Vec<DividendRow> = decode(PROVIDER, payload)?;

    let dividends = rows
        .iter()
        .map(|row| {
            Ok(Dividend::new(
                required_date(PROVIDER, row.date.as_ref(), "date")?,
                required_number(PROVIDER, row.amount.as_ref(), "amount")?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalDividendList::new(symbol.clone(), dividends))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsRow {
    period: Option<Value>,
    actual: Option<Value>,
    estimate: Option<Value>,
    surprise: Option<Value>,
    surprise_percent: Option<Value>,
}

fn parse_earnings(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalEarnings, SourceError> {
    let rows: Vec<EarningsRow> = decode(PROVIDER, payload)?;

    let mut reports = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(actual) = number(PROVIDER, row.actual.as_ref(), "actual")? else {
            continue;
        };
        reports.push(EarningsReport::new(
            required_date(PROVIDER, row.period.as_ref(), "period")?,
            actual,
            number(PROVIDER, row.estimate.as_ref(), "estimate")?,
            number(PROVIDER, row.surprise.as_ref(), "surprise")?,
            number(PROVIDER, row.surprise_percent.as_ref(), "surprisePercent")?,
        )?);
    }

    Ok(CanonicalEarnings::new(symbol.clone(), reports))
}
