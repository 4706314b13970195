use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::wire::{self, number, required_date, required_number, text};
use super::{decode, execute_json, mentions, non_empty};
use crate::data_source::FetchFuture;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::{
    CanonicalCashFlow, CanonicalData, CanonicalDividendList, CanonicalEarnings,
    CanonicalIncomeStatement, CanonicalQuote, CanonicalTimeSeries, CashFlowStatement, Credential,
    DataSource, Dividend, EarningsReport, Endpoint, IncomeStatement, ProviderId, ProviderSpec,
    RawPayload, SourceError, Symbol, UtcDateTime,
};

const BASE_URL: &str = "https://api.twelvedata.com";
const PROVIDER: ProviderId = ProviderId::TwelveData;

/// TwelveData adapter. Serves every endpoint; the key travels in the
/// `Authorization: apikey …` header.
#[derive(Clone)]
pub struct TwelveDataAdapter {
    http_client: Arc<dyn HttpClient>,
}

impl TwelveDataAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    fn request(symbol: &Symbol, endpoint: Endpoint, credential: &Credential) -> HttpRequest {
        let request = HttpRequest::get(format!("{BASE_URL}/{}", endpoint.as_str()))
            .with_query("symbol", symbol.as_str());
        let request = match endpoint {
            Endpoint::TimeSeries => request
                .with_query("interval", "1day")
                .with_query("outputsize", "1000"),
            _ => request,
        };
        request.with_auth(&HttpAuth::Header {
            name: String::from("Authorization"),
            value: format!("apikey {}", credential.expose()),
        })
    }
}

impl DataSource for TwelveDataAdapter {
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
                .ok_or_else(|| SourceError::unsupported("TwelveData requires an API key"))?;

            let request = Self::request(symbol, endpoint, credential);
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
        let data = match endpoint {
            Endpoint::Quote => CanonicalData::Quote(parse_quote(symbol, payload)?),
            Endpoint::TimeSeries => CanonicalData::TimeSeries(parse_time_series(symbol, payload)?),
            Endpoint::Dividends => CanonicalData::Dividends(parse_dividends(symbol, payload)?),
            Endpoint::Earnings => CanonicalData::Earnings(parse_earnings(symbol, payload)?),
            Endpoint::CashFlow => CanonicalData::CashFlow(parse_cash_flow(symbol, payload)?),
            Endpoint::IncomeStatement => {
                CanonicalData::IncomeStatement(parse_income_statement(symbol, payload)?)
            }
        };
        non_empty(PROVIDER, data)
    }
}

/// TwelveData reports most failures as HTTP 200 with `status: "error"`.
fn classify(payload: &RawPayload) -> Result<(), SourceError> {
    if payload.get("status").and_then(Value::as_str) == Some("error") {
        let message = text(payload.get("message")).unwrap_or("unspecified error");
        let code = payload.get("code").and_then(Value::as_i64);
        let message = format!("TwelveData error: {message}");

        if code == Some(429) || mentions(&message, &["limit", "exceeded", "credits"]) {
            return Err(SourceError::rate_limited(message));
        }
        return Err(match code {
            Some(401 | 403) => SourceError::unsupported(message),
            _ => SourceError::no_data(message),
        });
    }

    if wire::is_empty_container(payload) {
        return Err(wire::empty(PROVIDER, "data"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QuoteBody {
    open: Option<Value>,
    high: Option<Value>,
    low: Option<Value>,
    close: Option<Value>,
    volume: Option<Value>,
    change: Option<Value>,
    percent_change: Option<Value>,
    previous_close: Option<Value>,
    timestamp: Option<Value>,
    datetime: Option<Value>,
}

fn parse_quote(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalQuote, SourceError> {
    let body: QuoteBody = decode(PROVIDER, payload)?;

    let close = required_number(PROVIDER, body.close.as_ref(), "close")?;
    let (change, percent_change) = wire::change_pair(
        PROVIDER,
        close,
        number(PROVIDER, body.change.as_ref(), "change")?,
        number(PROVIDER, body.percent_change.as_ref(), "percent_change")?,
        number(PROVIDER, body.previous_close.as_ref(), "previous_close")?,
    )?;
    let datetime = match wire::unix_datetime(PROVIDER, body.timestamp.as_ref(), "timestamp")? {
        Some(datetime) => Some(datetime),
        None => wire::date(PROVIDER, body.datetime.as_ref(), "datetime")?
            .map(|date| UtcDateTime::from_date(date.into_inner())),
    };

    Ok(CanonicalQuote::new(
        symbol.clone(),
        required_number(PROVIDER, body.open.as_ref(), "open")?,
        required_number(PROVIDER, body.high.as_ref(), "high")?,
        required_number(PROVIDER, body.low.as_ref(), "low")?,
        close,
        wire::volume(PROVIDER, body.volume.as_ref(), "volume")?,
        change,
        percent_change,
        datetime,
    )?)
}

#[derive(Debug, Deserialize)]
struct TimeSeriesBody {
    values: Option<Vec<BarBody>>,
}

#[derive(Debug, Deserialize)]
struct BarBody {
    datetime: Option<Value>,
    open: Option<Value>,
    high: Option<Value>,
    low: Option<Value>,
    close: Option<Value>,
    volume: Option<Value>,
}

fn parse_time_series(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalTimeSeries, SourceError> {
    let body: TimeSeriesBody = decode(PROVIDER, payload)?;
    let bars = body.values.ok_or_else(|| wire::missing(PROVIDER, "values"))?;

    let mut values = Vec::with_capacity(bars.len());
    for bar in &bars {
        let datetime = required_date(PROVIDER, bar.datetime.as_ref(), "datetime")?;
        if let Some(value) = wire::bar(
            PROVIDER,
            datetime,
            bar.open.as_ref(),
            bar.high.as_ref(),
            bar.low.as_ref(),
            bar.close.as_ref(),
            bar.volume.as_ref(),
        )? {
            values.push(value);
        }
    }

    Ok(CanonicalTimeSeries::new(symbol.clone(), values))
}

#[derive(Debug, Deserialize)]
struct DividendsBody {
    dividends: Option<Vec<DividendBody>>,
}

#[derive(Debug, Deserialize)]
struct DividendBody {
    ex_date: Option<Value>,
    amount: Option<Value>,
}

fn parse_dividends(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalDividendList, SourceError> {
    let body: DividendsBody = decode(PROVIDER, payload)?;
    let rows = body
        .dividends
        .ok_or_else(|| wire::missing(PROVIDER, "dividends"))?;

    let dividends = rows
        .iter()
        .map(|row| {
            Ok(Dividend::new(
                required_date(PROVIDER, row.ex_date.as_ref(), "ex_date")?,
                required_number(PROVIDER, row.amount.as_ref(), "amount")?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalDividendList::new(symbol.clone(), dividends))
}

#[derive(Debug, Deserialize)]
struct EarningsBody {
    earnings: Option<Vec<EarningsRow>>,
}

#[derive(Debug, Deserialize)]
struct EarningsRow {
    date: Option<Value>,
    eps_actual: Option<Value>,
    eps_estimate: Option<Value>,
    difference: Option<Value>,
    surprise_prc: Option<Value>,
}

fn parse_earnings(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalEarnings, SourceError> {
    let body: EarningsBody = decode(PROVIDER, payload)?;
    let rows = body
        .earnings
        .ok_or_else(|| wire::missing(PROVIDER, "earnings"))?;

    let mut reports = Vec::with_capacity(rows.len());
    for row in &rows {
        // Upcoming report dates carry an estimate but no actual yet.
        let Some(actual) = number(PROVIDER, row.eps_actual.as_ref(), "eps_actual")? else {
            continue;
        };
        reports.push(EarningsReport::new(
            required_date(PROVIDER, row.date.as_ref(), "date")?,
            actual,
            number(PROVIDER, row.eps_estimate.as_ref(), "eps_estimate")?,
            number(PROVIDER, row.difference.as_ref(), "difference")?,
            number(PROVIDER, row.surprise_prc.as_ref(), "surprise_prc")?,
        )?);
    }

    Ok(CanonicalEarnings::new(symbol.clone(), reports))
}

#[derive(Debug, Deserialize)]
struct CashFlowBody {
    cash_flow: Option<Vec<CashFlowRow>>,
}

#[derive(Debug, Deserialize)]
struct CashFlowRow {
    fiscal_date: Option<Value>,
    #[serde(default)]
    operating_activities: CashFlowSection,
    #[serde(default)]
    investing_activities: CashFlowSection,
    #[serde(default)]
    financing_activities: CashFlowSection,
    free_cash_flow: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CashFlowSection {
    operating_cash_flow: Option<Value>,
    net_income: Option<Value>,
    capital_expenditures: Option<Value>,
    common_dividends: Option<Value>,
}

fn parse_cash_flow(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalCashFlow, SourceError> {
    let body: CashFlowBody = decode(PROVIDER, payload)?;
    let rows = body
        .cash_flow
        .ok_or_else(|| wire::missing(PROVIDER, "cash_flow"))?;

    let statements = rows
        .iter()
        .map(|row| {
            Ok(CashFlowStatement::new(
                required_date(PROVIDER, row.fiscal_date.as_ref(), "fiscal_date")?,
                required_number(
                    PROVIDER,
                    row.operating_activities.operating_cash_flow.as_ref(),
                    "operating_cash_flow",
                )?,
                number(
                    PROVIDER,
                    row.investing_activities.capital_expenditures.as_ref(),
                    "capital_expenditures",
                )?,
                number(PROVIDER, row.free_cash_flow.as_ref(), "free_cash_flow")?,
                number(
                    PROVIDER,
                    row.financing_activities.common_dividends.as_ref(),
                    "common_dividends",
                )?,
                number(
                    PROVIDER,
                    row.operating_activities.net_income.as_ref(),
                    "net_income",
                )?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalCashFlow::new(symbol.clone(), statements))
}

#[derive(Debug, Deserialize)]
struct IncomeStatementBody {
    income_statement: Option<Vec<IncomeStatementRow>>,
}

#[derive(Debug, Deserialize)]
struct IncomeStatementRow {
    fiscal_date: Option<Value>,
    sales: Option<Value>,
    gross_profit: Option<Value>,
    operating_income: Option<Value>,
    net_income: Option<Value>,
    eps_basic: Option<Value>,
    eps_diluted: Option<Value>,
}

fn parse_income_statement(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalIncomeStatement, SourceError> {
    let body: IncomeStatementBody = decode(PROVIDER, payload)?;
    let rows = body
        .income_statement
        .ok_or_else(|| wire::missing(PROVIDER, "income_statement"))?;

    let statements = rows
        .iter()
        .map(|row| {
            Ok(IncomeStatement::new(
                required_date(PROVIDER, row.fiscal_date.as_ref(), "fiscal_date")?,
                required_number(PROVIDER, row.sales.as_ref(), "sales")?,
                number(PROVIDER, row.gross_profit.as_ref(), "gross_profit")?,
                number(PROVIDER, row.operating_income.as_ref(), "operating_income")?,
                required_number(PROVIDER, row.net_income.as_ref(), "net_income")?,
                number(PROVIDER, row.eps_basic.as_ref(), "eps_basic")?,
                number(PROVIDER, row.eps_diluted.as_ref(), "eps_diluted")?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalIncomeStatement::new(symbol.clone(), statements))
}
