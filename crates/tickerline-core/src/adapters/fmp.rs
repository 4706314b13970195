use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::wire::{self, number, required_date, required_number};
use super::{decode, execute_json, mentions, non_empty};
use crate::data_source::FetchFuture;
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    CanonicalCashFlow, CanonicalData, CanonicalDividendList, CanonicalEarnings,
    CanonicalIncomeStatement, CanonicalQuote, CanonicalTimeSeries, CashFlowStatement, Credential,
    DataSource, Dividend, EarningsReport, Endpoint, IncomeStatement, ProviderId, ProviderSpec,
    RawPayload, SourceError, Symbol,
};

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const PROVIDER: ProviderId = ProviderId::Fmp;
const STATEMENT_LIMIT: &str = "40";

/// Financial Modeling Prep adapter.
#[derive(Clone)]
pub struct FmpAdapter {
    http_client: Arc<dyn HttpClient>,
}

impl FmpAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    fn request(symbol: &Symbol, endpoint: Endpoint, credential: &Credential) -> HttpRequest {
        let symbol = urlencoding::encode(symbol.as_str());
        let request = match endpoint {
            Endpoint::Quote => HttpRequest::get(format!("{BASE_URL}/quote/{symbol}")),
            Endpoint::TimeSeries => {
                HttpRequest::get(format!("{BASE_URL}/historical-price-full/{symbol}"))
            }
            Endpoint::Dividends => HttpRequest::get(format!(
                "{BASE_URL}/historical-price-full/stock_dividend/{symbol}"
            )),
            Endpoint::Earnings => {
                HttpRequest::get(format!("{BASE_URL}/earnings-surprises/{symbol}"))
            }
            Endpoint::CashFlow => {
                HttpRequest::get(format!("{BASE_URL}/cash-flow-statement/{symbol}"))
                    .with_query("limit", STATEMENT_LIMIT)
            }
            Endpoint::IncomeStatement => {
                HttpRequest::get(format!("{BASE_URL}/income-statement/{symbol}"))
                    .with_query("limit", STATEMENT_LIMIT)
            }
        };
        request.with_secret_query("apikey", credential.expose())
    }
}

impl DataSource for FmpAdapter {
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
            let credential =
                credential.ok_or_else(|| SourceError::unsupported("FMP requires an API key"))?;

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

/// FMP signals failures through an `"Error Message"` field and unknown
/// symbols through an empty array or object.
fn classify(payload: &RawPayload) -> Result<(), SourceError> {
    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        let message = format!("FMP error: {message}");
        if mentions(&message, &["limit reach"]) {
            return Err(SourceError::rate_limited(message));
        }
        return Err(SourceError::unsupported(message));
    }

    if wire::is_empty_container(payload) {
        return Err(wire::empty(PROVIDER, "data"));
    }
    Ok(())
}

/// Unwraps the list FMP returns for most endpoints.
fn decode_list<'a, T>(payload: &'a RawPayload) -> Result<Vec<T>, SourceError>
where
    T: Deserialize<'a>,
{
    decode::<Vec<T>>(PROVIDER, payload)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRow {
    open: Option<Value>,
    day_high: Option<Value>,
    day_low: Option<Value>,
    price: Option<Value>,
    volume: Option<Value>,
    change: Option<Value>,
    changes_percentage: Option<Value>,
    previous_close: Option<Value>,
    timestamp: Option<Value>,
}

fn parse_quote(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalQuote, SourceError> {
    let quote = match payload {
        Value::Array(_) => decode_list::<QuoteRow>(payload)?
            .into_iter()
            .next()
            .ok_or_else(|| wire::empty(PROVIDER, "quote"))?,
        _ => decode::<QuoteRow>(PROVIDER, payload)?,
    };

    let close = required_number(PROVIDER, quote.price.as_ref(), "price")?;
    let (change, percent_change) = wire::change_pair(
        PROVIDER,
        close,
        number(PROVIDER, quote.change.as_ref(), "change")?,
        number(PROVIDER, quote.changes_percentage.as_ref(), "changesPercentage")?,
        number(PROVIDER, quote.previous_close.as_ref(), "previousClose")?,
    )?;

    Ok(CanonicalQuote::new(
        symbol.clone(),
        required_number(PROVIDER, quote.open.as_ref(), "open")?,
        required_number(PROVIDER, quote.day_high.as_ref(), "dayHigh")?,
        required_number(PROVIDER, quote.day_low.as_ref(), "dayLow")?,
        close,
        wire::volume(PROVIDER, quote.volume.as_ref(), "volume")?,
        change,
        percent_change,
        wire::unix_datetime(PROVIDER, quote.timestamp.as_ref(), "timestamp")?,
    )?)
}

#[derive(Debug, Deserialize)]
struct HistoricalBody<T> {
    historical: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    date: Option<Value>,
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
    let body: HistoricalBody<BarRow> = decode(PROVIDER, payload)?;
    let bars = body
        .historical
        .ok_or_else(|| wire::missing(PROVIDER, "historical"))?;

    let mut values = Vec::with_capacity(bars.len());
    for bar in &bars {
        let datetime = required_date(PROVIDER, bar.date.as_ref(), "date")?;
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
struct DividendRow {
    date: Option<Value>,
    dividend: Option<Value>,
    adj_dividend: Option<Value>,
}

fn parse_dividends(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalDividendList, SourceError> {
    let body: HistoricalBody<DividendRow> = decode(PROVIDER, payload)?;
    let rows = body
        .historical
        .ok_or_else(|| wire::missing(PROVIDER, "historical"))?;

    let dividends = rows
        .iter()
        .map(|row| {
            let amount = match number(PROVIDER, row.dividend.as_ref(), "dividend")? {
                Some(amount) => amount,
                None => required_number(PROVIDER, row.adj_dividend.as_ref(), "adjDividend")?,
            };
            Ok(Dividend::new(
                required_date(PROVIDER, row.date.as_ref(), "date")?,
                amount,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalDividendList::new(symbol.clone(), dividends))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsRow {
    date: Option<Value>,
    actual_earning_result: Option<Value>,
    estimated_earning: Option<Value>,
}

fn parse_earnings(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalEarnings, SourceError> {
    let rows: Vec<EarningsRow> = decode_list(payload)?;

    let mut reports = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(actual) = number(
            PROVIDER,
            row.actual_earning_result.as_ref(),
            "actualEarningResult",
        )?
        else {
            continue;
        };
        reports.push(EarningsReport::new(
            required_date(PROVIDER, row.date.as_ref(), "date")?,
            actual,
            number(PROVIDER, row.estimated_earning.as_ref(), "estimatedEarning")?,
            None,
            None,
        )?);
    }

    Ok(CanonicalEarnings::new(symbol.clone(), reports))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CashFlowRow {
    date: Option<Value>,
    operating_cash_flow: Option<Value>,
    capital_expenditure: Option<Value>,
    free_cash_flow: Option<Value>,
    dividends_paid: Option<Value>,
    net_income: Option<Value>,
}

fn parse_cash_flow(symbol: &Symbol, payload: &RawPayload) -> Result<CanonicalCashFlow, SourceError> {
    let rows: Vec<CashFlowRow> = decode_list(payload)?;

    let statements = rows
        .iter()
        .map(|row| {
            Ok(CashFlowStatement::new(
                required_date(PROVIDER, row.date.as_ref(), "date")?,
                required_number(
                    PROVIDER,
                    row.operating_cash_flow.as_ref(),
                    "operatingCashFlow",
                )?,
                number(
                    PROVIDER,
                    row.capital_expenditure.as_ref(),
                    "capitalExpenditure",
                )?,
                number(PROVIDER, row.free_cash_flow.as_ref(), "freeCashFlow")?,
                number(PROVIDER, row.dividends_paid.as_ref(), "dividendsPaid")?,
                number(PROVIDER, row.net_income.as_ref(), "netIncome")?,
            )?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    Ok(CanonicalCashFlow::new(symbol.clone(), statements))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeStatementRow {
    date: Option<Value>,
    revenue: Option<Value>,
    gross_profit: Option<Value>,
    operating_income: Option<Value>,
    net_income: Option<Value>,
    eps: Option<Value>,
    #[serde(rename = "epsdiluted")]
    eps_diluted: Option<Value>,
}

fn parse_income_statement(
    symbol: &Symbol,
    payload: &RawPayload,
) -> Result<CanonicalIncomeStatement, SourceError> {
    let rows: Vec<IncomeStatementRow> = decode_list(payload)?;

    let statements = rows
        .iter()
        .map(|row| {
            Ok(IncomeStatement::new(
                required_date(PROVIDER, row.date.as_ref(), "date")?,
                required_number(PROVIDER, row.revenue.as_ref(), "revenue")?,
                number(PROVIDER, row.gross_profit.as_ref(), "grossProfit")?,
                number(PROVIDER, row.operating_income.as_ref(), "operatingIncome")?,
                required_number(PROVIDER, row.net_income.as_ref(), "netIncome")?,
                number(PROVIDER, row.eps.as_ref(), "eps")?,
                number(PROVIDER, row.eps_diluted.as_ref(), "epsdiluted")?,
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

    fn adapter() -> FmpAdapter {
        FmpAdapter::new(Arc::new(ScriptedHttpClient::new()))
    }

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("valid symbol")
    }

    #[test]
    fn error_message_is_classified() {
        let limited = json!({"Error Message": "Limit Reach . Please upgrade your plan or visit our documentation for more details at https://site.financialmodelingprep.com/"});
        assert_eq!(
            classify(&limited).expect_err("limited").kind(),
            SourceErrorKind::RateLimited
        );

        let invalid = json!({"Error Message": "Invalid API KEY. Feel free to create a Free API Key."});
        assert_eq!(
            classify(&invalid).expect_err("invalid").kind(),
            SourceErrorKind::Unsupported
        );

        assert_eq!(
            classify(&json!([])).expect_err("empty").kind(),
            SourceErrorKind::NoData
        );
        assert_eq!(
            classify(&json!({})).expect_err("empty").kind(),
            SourceErrorKind::NoData
        );
    }

    #[test]
    fn statement_urls_carry_limit_and_redacted_key() {
        let credential = Credential::new("fmp-key").expect("credential");
        let request = FmpAdapter::request(&symbol(), Endpoint::CashFlow, &credential);
        assert_eq!(
            request.url(),
            "https://financialmodelingprep.com/api/v3/cash-flow-statement/AAPL?limit=40&apikey=fmp-key"
        );
        assert!(!request.redacted_url().contains("fmp-key"));
    }

    #[test]
    fn quote_maps_day_range_and_price() {
        let payload = json!([{
            "symbol": "AAPL", "name": "Apple Inc.", "price": 185.64, "changesPercentage": -3.5787,
            "change": -6.89, "dayLow": 183.89, "dayHigh": 188.44, "open": 187.15,
            "volume": 82488700, "previousClose": 192.53, "timestamp": 1704229201
        }]);
        let data = adapter()
            .normalize(&symbol(), Endpoint::Quote, &payload)
            .expect("quote");
        let CanonicalData::Quote(quote) = data else {
            panic!("expected quote");
        };
        assert_eq!(quote.high, 188.44);
        assert_eq!(quote.low, 183.89);
        assert_eq!(quote.close, 185.64);
        assert_eq!(quote.percent_change, -3.5787);
    }

    #[test]
    fn dividends_come_from_historical_list() {
        let payload = json!({
            "symbol": "AAPL",
            "historical": [
                {"date": "2023-08-11", "label": "August 11, 23", "adjDividend": 0.24, "dividend": 0.24},
                {"date": "2024-02-09", "label": "February 09, 24", "adjDividend": 0.24, "dividend": 0.24}
            ]
        });
        let data = adapter()
            .normalize(&symbol(), Endpoint::Dividends, &payload)
            .expect("dividends");
        let CanonicalData::Dividends(list) = data else {
            panic!("expected dividends");
        };
        assert_eq!(list.dividends()[0].ex_date.to_string(), "2024-02-09");
    }

    #[test]
    fn earnings_surprise_is_derived() {
        let payload = json!([
            {"date": "2024-02-01", "symbol": "AAPL", "actualEarningResult": 2.18, "estimatedEarning": 2.1}
        ]);
        let data = adapter()
            .normalize(&symbol(), Endpoint::Earnings, &payload)
            .expect("earnings");
        let CanonicalData::Earnings(earnings) = data else {
            panic!("expected earnings");
        };
        let surprise = earnings.reports()[0].surprise.expect("derived");
        assert!((surprise - 0.08).abs() < 1e-9);
    }

    #[test]
    fn income_statement_missing_revenue_is_no_data() {
        let payload = json!([{"date": "2023-09-30", "netIncome": 96995000000_i64}]);
        let error = adapter()
            .normalize(&symbol(), Endpoint::IncomeStatement, &payload)
            .expect_err("missing revenue");
        assert_eq!(error.kind(), SourceErrorKind::NoData);
    }
}
