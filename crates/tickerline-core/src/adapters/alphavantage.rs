use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::wire::{self, number, required_date, required_number, text};
use super::{decode, execute_json, mentions, non_empty};
use crate::data_source::FetchFuture;
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    CanonicalCashFlow, CanonicalData, CanonicalEarnings, CanonicalIncomeStatement, CanonicalQuote,
    CanonicalTimeSeries, CashFlowStatement, Credential, DataSource, EarningsReport, Endpoint,
    IncomeStatement, MarketDate, ProviderId, ProviderSpec, RawPayload, SourceError, Symbol,
    UtcDateTime,
};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: ProviderId = ProviderId::AlphaVantage;

/// Alpha Vantage adapter.
///
/// Alpha Vantage answers nearly everything with HTTP 200, so throttling and
/// plan limits are read from the `Note` and `Information` keys of the body.
/// Statements come from `annualReports`.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    fn request(
        symbol: &Symbol,
        endpoint: Endpoint,
        credential: &Credential,
    ) -> Result<HttpRequest, SourceError> {
        let function = match endpoint {
            Endpoint::Quote => "GLOBAL_QUOTE",
            Endpoint::TimeSeries => "TIME_SERIES_DAILY",
            Endpoint::Earnings => "EARNINGS",
            Endpoint::CashFlow => "CASH_FLOW",
            Endpoint::IncomeStatement => "INCOME_STATEMENT",
            Endpoint::Dividends => {
                return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint));
            }
        };

        let request = HttpRequest::get(BASE_URL)
            .with_query("function", function)
            .with_query("symbol", symbol.as_str());
        let request = if endpoint == Endpoint::TimeSeries {
            request.with_query("outputsize", "compact")
        } else {
            request
        };
        Ok(request.with_secret_query("apikey", credential.expose()))
    }
}

impl DataSource for AlphaVantageAdapter {
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
                .ok_or_else(|| SourceError::unsupported("AlphaVantage requires an API key"))?;

            let request = Self::request(symbol, endpoint, credential)?;
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
            Endpoint::Earnings => CanonicalData::Earnings(parse_earnings(symbol, payload)?),
            Endpoint::CashFlow => CanonicalData::CashFlow(parse_cash_flow(symbol, payload)?),
            Endpoint::IncomeStatement => {
                CanonicalData::IncomeStatement(parse_income_statement(symbol, payload)?)
            }
            Endpoint::Dividends => {
                return Err(SourceError::unsupported_endpoint(PROVIDER, endpoint));
            }
        };
        non_empty(PROVIDER, data)
    }
}

fn classify(payload: &RawPayload) -> Result<(), SourceError> {
    if let Some(note) = text(payload.get("Note")) {
        return Err(SourceError::rate_limited(format!("AlphaVantage note: {note}")));
    }

    if let Some(information) = text(payload.get("Information")) {
        let message = format!("AlphaVantage information: {information}");
        if mentions(&message, &["premium"]) {
            return Err(SourceError::unsupported(message));
        }
        return Err(SourceError::rate_limited(message));
    }

    if let Some(error) = text(payload.get("Error Message")) {
        return Err(SourceError::no_data(format!("AlphaVantage error: {error}")));
    }

    // Unknown symbols come back as `{"Global Quote": {}}`.
    if payload.get("Global Quote").is_some_and(wire::is_empty_container) {
        return Err(wire::empty(PROVIDER, "quote"));
    }

    if wire::is_empty_container(payload) {
        return Err(wire::empty(PROVIDER, "data"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "Global Quote")]
    quote: Option<QuoteBody>,
}

#[derive(Debug, Deserialize)]
struct QuoteBody {
    #[serde(rename = "02. open")]
    open: Option<Value>,
    #[serde(rename = "03. high")]
    high: Option<Value>,
    #[serde(rename = "04. low")]
    low: Option<Value>,
    #[serde(rename = "05. price")]
    price: Option<Value>,
    #[serde(rename = "06. volume")]
    volume: Option<Value>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<Value>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<Value>,
    #[serde(rename = "09. change")]
    change: Option<Value>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<Value>,
}

fn parse_quote(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalQuote, SourceError> {
    let envelope: QuoteEnvelope = decode(PROVIDER, payload)?;
    let body = envelope
        .quote
        .ok_or_else(|| wire::missing(PROVIDER, "Global Quote"))?;

    let close = required_number(PROVIDER, body.price.as_ref(), "05. price")?;
    let (change, percent_change) = wire::change_pair(
        PROVIDER,
        close,
        number(PROVIDER, body.change.as_ref(), "09. change")?,
        number(PROVIDER, body.change_percent.as_ref(), "10. change percent")?,
        number(PROVIDER, body.previous_close.as_ref(), "08. previous close")?,
    )?;
    let datetime = wire::date(
        PROVIDER,
        body.latest_trading_day.as_ref(),
        "07. latest trading day",
    )?
    .map(|date| UtcDateTime::from_date(date.into_inner()));

    Ok(CanonicalQuote::new(
        symbol.clone(),
        required_number(PROVIDER, body.open.as_ref(), "02. open")?,
        required_number(PROVIDER, body.high.as_ref(), "03. high")?,
        required_number(PROVIDER, body.low.as_ref(), "04. low")?,
        close,
        wire::volume(PROVIDER, body.volume.as_ref(), "06. volume")?,
        change,
        percent_change,
        datetime,
    )?)
}

#[derive(Debug, Deserialize)]
struct DailyEnvelope {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: Option<Value>,
    #[serde(rename = "2. high")]
    high: Option<Value>,
    #[serde(rename = "3. low")]
    low: Option<Value>,
    #[serde(rename = "4. close")]
    close: Option<Value>,
    #[serde(rename = "5. volume")]
    volume: Option<Value>,
}

fn parse_time_series(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalTimeSeries, SourceError> {
    let envelope: DailyEnvelope = decode(PROVIDER, payload)?;
    let series = envelope
        .series
        .ok_or_else(|| wire::missing(PROVIDER, "Time Series (Daily)"))?;

    let mut values = Vec::with_capacity(series.len());
    for (day, bar) in &series {
        let datetime = MarketDate::parse(day).map_err(|_| {
            SourceError::malformed(format!("AlphaVantage series key is not a date: '{day}'"))
        })?;
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
#[serde(rename_all = "camelCase")]
struct EarningsEnvelope {
    quarterly_earnings: Option<Vec<EarningsRow>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsRow {
    fiscal_date_ending: Option<Value>,
    #[serde(rename = "reportedEPS")]
    reported_eps: Option<Value>,
    #[serde(rename = "estimatedEPS")]
    estimated_eps: Option<Value>,
    surprise: Option<Value>,
    surprise_percentage: Option<Value>,
}

fn parse_earnings(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalEarnings, SourceError> {
    let envelope: EarningsEnvelope = decode(PROVIDER, payload)?;
    let rows = envelope
        .quarterly_earnings
        .ok_or_else(|| wire::missing(PROVIDER, "quarterlyEarnings"))?;

    let mut reports = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(actual) = number(PROVIDER, row.reported_eps.as_ref(), "reportedEPS")? else {
            continue;
        };
        reports.push(EarningsReport::new(
            required_date(PROVIDER, row.fiscal_date_ending.as_ref(), "fiscalDateEnding")?,
            actual,
            number(PROVIDER, row.estimated_eps.as_ref(), "estimatedEPS")?,
            number(PROVIDER, row.surprise.as_ref(), "surprise")?,
            number(
                PROVIDER,
                row.surprise_percentage.as_ref(),
                "surprisePercentage",
            )?,
        )?);
    }

    Ok(CanonicalEarnings::new(symbol.clone(), reports))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnualReports<T> {
    annual_reports: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CashFlowRow {
    fiscal_date_ending: Option<Value>,
    operating_cashflow: Option<Value>,
    capital_expenditures: Option<Value>,
    dividend_payout: Option<Value>,
    net_income: Option<Value>,
}

fn parse_cash_flow(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalCashFlow, SourceError> {
    let envelope: AnnualReports<CashFlowRow> = decode(PROVIDER, payload)?;
    let rows = envelope
        .annual_reports
        .ok_or_else(|| wire::missing(PROVIDER, "annualReports"))?;

    let statements = rows
        .iter()
        .map(|row| {
            Ok(CashFlowStatement::new(
                required_date(PROVIDER, row.fiscal_date_ending.as_ref(), "fiscalDateEnding")?,
                required_number(
                    PROVIDER,
                    row.operating_cashflow.as_ref(),
                    "operatingCashflow",
                )?,
                number(
                    PROVIDER,
                    row.capital_expenditures.as_ref(),
                    "capitalExpenditures",
                )?,
                None,
                number(PROVIDER, row.dividend_payout.as_ref(), "dividendPayout")?,
                number(PROVIDER, row.net_income.as_ref(), "netIncome")?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalCashFlow::new(symbol.clone(), statements))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeRow {
    fiscal_date_ending: Option<Value>,
    total_revenue: Option<Value>,
    gross_profit: Option<Value>,
    operating_income: Option<Value>,
    net_income: Option<Value>,
}

fn parse_income_statement(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalIncomeStatement, SourceError> {
    let envelope: AnnualReports<IncomeRow> = decode(PROVIDER, payload)?;
    let rows = envelope
        .annual_reports
        .ok_or_else(|| wire::missing(PROVIDER, "annualReports"))?;

    // The income statement function does not report per-share earnings.
    let statements = rows
        .iter()
        .map(|row| {
            Ok(IncomeStatement::new(
                required_date(PROVIDER, row.fiscal_date_ending.as_ref(), "fiscalDateEnding")?,
                required_number(PROVIDER, row.total_revenue.as_ref(), "totalRevenue")?,
                number(PROVIDER, row.gross_profit.as_ref(), "grossProfit")?,
                number(PROVIDER, row.operating_income.as_ref(), "operatingIncome")?,
                required_number(PROVIDER, row.net_income.as_ref(), "netIncome")?,
                None,
                None,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalIncomeStatement::new(symbol.clone(), statements))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http_client::ScriptedHttpClient;
    use crate::SourceErrorKind;

    fn adapter() -> AlphaVantageAdapter {
        AlphaVantageAdapter::new(Arc::new(ScriptedHttpClient::new()))
    }

    fn symbol() -> Symbol {
        Symbol::parse("IBM").expect("valid symbol")
    }

    #[test]
    fn body_signals_are_classified() {
        let note = json!({"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."});
        assert_eq!(
            classify(&note).expect_err("note").kind(),
            SourceErrorKind::RateLimited
        );

        let daily_cap = json!({"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."});
        assert_eq!(
            classify(&daily_cap).expect_err("daily cap").kind(),
            SourceErrorKind::RateLimited
        );

        let premium = json!({"Information": "Thank you for using Alpha Vantage! This is a premium endpoint."});
        assert_eq!(
            classify(&premium).expect_err("premium").kind(),
            SourceErrorKind::Unsupported
        );

        let invalid = json!({"Error Message": "Invalid API call. Please retry or visit the documentation for TIME_SERIES_DAILY."});
        assert_eq!(
            classify(&invalid).expect_err("invalid").kind(),
            SourceErrorKind::NoData
        );

        assert_eq!(
            classify(&json!({"Global Quote": {}}))
                .expect_err("empty quote")
                .kind(),
            SourceErrorKind::NoData
        );
    }

    #[test]
    fn request_redacts_key_in_logs() {
        let credential = Credential::new("av-secret").expect("credential");
        let request = AlphaVantageAdapter::request(&symbol(), Endpoint::TimeSeries, &credential)
            .expect("supported");
        assert_eq!(
            request.url(),
            "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol=IBM&outputsize=compact&apikey=av-secret"
        );
        assert!(!request.redacted_url().contains("av-secret"));
    }

    #[test]
    fn global_quote_strips_percent_sign() {
        let payload = json!({
            "Global Quote": {
                "01. symbol": "IBM", "02. open": "161.0000", "03. high": "163.2900",
                "04. low": "160.4000", "05. price": "162.9800", "06. volume": "3785561",
                "07. latest trading day": "2024-01-02", "08. previous close": "163.5500",
                "09. change": "-0.5700", "10. change percent": "-0.3485%"
            }
        });
        let data = adapter()
            .normalize(&symbol(), Endpoint::Quote, &payload)
            .expect("quote");
        let CanonicalData::Quote(quote) = data else {
            panic!("expected quote");
        };
        assert_eq!(quote.percent_change, -0.3485);
        assert_eq!(quote.volume, 3_785_561);
        assert_eq!(
            quote.datetime.map(UtcDateTime::format_rfc3339).as_deref(),
            Some("2024-01-02T00:00:00Z")
        );
    }

    #[test]
    fn daily_series_is_keyed_by_date() {
        let payload = json!({
            "Meta Data": {"2. Symbol": "IBM"},
            "Time Series (Daily)": {
                "2024-01-03": {"1. open": "161.0", "2. high": "161.7", "3. low": "160.0", "4. close": "160.1", "5. volume": "4086133"},
                "2024-01-02": {"1. open": "162.8", "2. high": "163.3", "3. low": "160.4", "4. close": "162.9", "5. volume": "3785561"}
            }
        });
        let data = adapter()
            .normalize(&symbol(), Endpoint::TimeSeries, &payload)
            .expect("series");
        let CanonicalData::TimeSeries(series) = data else {
            panic!("expected time series");
        };
        assert_eq!(series.values()[0].datetime.to_string(), "2024-01-02");
        assert_eq!(series.values()[1].close, 160.1);
    }

    #[test]
    fn cash_flow_reads_annual_reports() {
        let payload = json!({
            "symbol": "IBM",
            "annualReports": [{
                "fiscalDateEnding": "2023-12-31", "reportedCurrency": "USD",
                "operatingCashflow": "13931000000", "capitalExpenditures": "1245000000",
                "dividendPayout": "6040000000", "netIncome": "7502000000"
            }],
            "quarterlyReports": []
        });
        let data = adapter()
            .normalize(&symbol(), Endpoint::CashFlow, &payload)
            .expect("cash flow");
        let CanonicalData::CashFlow(cash_flow) = data else {
            panic!("expected cash flow");
        };
        let statement = &cash_flow.statements()[0];
        assert_eq!(statement.free_cash_flow, Some(12_686_000_000.0));
        assert_eq!(statement.dividends_paid, Some(6_040_000_000.0));
    }

    #[test]
    fn income_statement_missing_revenue_is_no_data() {
        let payload = json!({
            "annualReports": [{"fiscalDateEnding": "2023-12-31", "totalRevenue": "None", "netIncome": "7502000000"}]
        });
        let error = adapter()
            .normalize(&symbol(), Endpoint::IncomeStatement, &payload)
            .expect_err("strict statements");
        assert_eq!(error.kind(), SourceErrorKind::NoData);
    }
}
