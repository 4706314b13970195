use serde::Serialize;

use crate::data_source::Endpoint;
use crate::{MarketDate, Symbol, UtcDateTime, ValidationError};

/// Canonical latest-session quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalQuote {
    pub symbol: Symbol,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub change: f64,
    pub percent_change: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<UtcDateTime>,
}

impl CanonicalQuote {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
        change: f64,
        percent_change: f64,
        datetime: Option<UtcDateTime>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_finite("change", change)?;
        validate_finite("percent_change", percent_change)?;

        Ok(Self {
            symbol,
            open,
            high,
            low,
            close,
            volume,
            change,
            percent_change,
            datetime,
        })
    }
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesValue {
    pub datetime: MarketDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl TimeSeriesValue {
    pub fn new(
        datetime: MarketDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        Ok(Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Daily bars, always ascending by date with one bar per date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTimeSeries {
    symbol: Symbol,
    values: Vec<TimeSeriesValue>,
}

impl CanonicalTimeSeries {
    /// Orders bars ascending regardless of upstream order. When a date repeats,
    /// the first bar seen for it is kept.
    pub fn new(symbol: Symbol, mut values: Vec<TimeSeriesValue>) -> Self {
        values.sort_by_key(|value| value.datetime);
        values.dedup_by_key(|value| value.datetime);
        Self { symbol, values }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn values(&self) -> &[TimeSeriesValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single cash dividend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dividend {
    pub ex_date: MarketDate,
    pub amount: f64,
}

impl Dividend {
    pub fn new(ex_date: MarketDate, amount: f64) -> Result<Self, ValidationError> {
        validate_non_negative("amount", amount)?;
        Ok(Self { ex_date, amount })
    }
}

/// Dividend history, newest ex-date first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalDividendList {
    symbol: Symbol,
    dividends: Vec<Dividend>,
}

impl CanonicalDividendList {
    pub fn new(symbol: Symbol, mut dividends: Vec<Dividend>) -> Self {
        dividends.sort_by(|left, right| right.ex_date.cmp(&left.ex_date));
        dividends.dedup();
        Self { symbol, dividends }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn dividends(&self) -> &[Dividend] {
        &self.dividends
    }

    pub fn is_empty(&self) -> bool {
        self.dividends.is_empty()
    }
}

/// Reported EPS for one fiscal period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarningsReport {
    pub period: MarketDate,
    pub actual_eps: f64,
    pub estimated_eps: Option<f64>,
    pub surprise: Option<f64>,
    pub surprise_percent: Option<f64>,
}

impl EarningsReport {
    /// Surprise figures the provider omitted are derived from actual and estimate.
    pub fn new(
        period: MarketDate,
        actual_eps: f64,
        estimated_eps: Option<f64>,
        surprise: Option<f64>,
        surprise_percent: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_finite("actual_eps", actual_eps)?;
        validate_optional_finite("estimated_eps", estimated_eps)?;
        validate_optional_finite("surprise", surprise)?;
        validate_optional_finite("surprise_percent", surprise_percent)?;

        let surprise = surprise.or_else(|| estimated_eps.map(|estimate| actual_eps - estimate));
        let surprise_percent = surprise_percent.or_else(|| match (surprise, estimated_eps) {
            (Some(surprise), Some(estimate)) if estimate != 0.0 => {
                Some(surprise / estimate.abs() * 100.0)
            }
            _ => None,
        });

        Ok(Self {
            period,
            actual_eps,
            estimated_eps,
            surprise,
            surprise_percent,
        })
    }
}

/// Earnings history, newest period first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEarnings {
    symbol: Symbol,
    reports: Vec<EarningsReport>,
}

impl CanonicalEarnings {
    pub fn new(symbol: Symbol, mut reports: Vec<EarningsReport>) -> Self {
        reports.sort_by(|left, right| right.period.cmp(&left.period));
        reports.dedup_by_key(|report| report.period);
        Self { symbol, reports }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn reports(&self) -> &[EarningsReport] {
        &self.reports
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// One cash flow statement. Outflows are stored as non-negative magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowStatement {
    pub fiscal_date: MarketDate,
    pub operating_cash_flow: f64,
    pub capital_expenditure: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub dividends_paid: Option<f64>,
    pub net_income: Option<f64>,
}

impl CashFlowStatement {
    pub fn new(
        fiscal_date: MarketDate,
        operating_cash_flow: f64,
        capital_expenditure: Option<f64>,
        free_cash_flow: Option<f64>,
        dividends_paid: Option<f64>,
        net_income: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_finite("operating_cash_flow", operating_cash_flow)?;
        validate_optional_finite("capital_expenditure", capital_expenditure)?;
        validate_optional_finite("free_cash_flow", free_cash_flow)?;
        validate_optional_finite("dividends_paid", dividends_paid)?;
        validate_optional_finite("net_income", net_income)?;

        let capital_expenditure = capital_expenditure.map(f64::abs);
        let free_cash_flow = free_cash_flow
            .or_else(|| capital_expenditure.map(|capex| operating_cash_flow - capex));

        Ok(Self {
            fiscal_date,
            operating_cash_flow,
            capital_expenditure,
            free_cash_flow,
            dividends_paid: dividends_paid.map(f64::abs),
            net_income,
        })
    }
}

/// Cash flow statements, newest fiscal date first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalCashFlow {
    symbol: Symbol,
    statements: Vec<CashFlowStatement>,
}

impl CanonicalCashFlow {
    pub fn new(symbol: Symbol, mut statements: Vec<CashFlowStatement>) -> Self {
        statements.sort_by(|left, right| right.fiscal_date.cmp(&left.fiscal_date));
        statements.dedup_by_key(|statement| statement.fiscal_date);
        Self { symbol, statements }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn statements(&self) -> &[CashFlowStatement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// One income statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStatement {
    pub fiscal_date: MarketDate,
    pub revenue: f64,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: f64,
    pub eps: Option<f64>,
    pub eps_diluted: Option<f64>,
}

impl IncomeStatement {
    pub fn new(
        fiscal_date: MarketDate,
        revenue: f64,
        gross_profit: Option<f64>,
        operating_income: Option<f64>,
        net_income: f64,
        eps: Option<f64>,
        eps_diluted: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_finite("revenue", revenue)?;
        validate_optional_finite("gross_profit", gross_profit)?;
        validate_optional_finite("operating_income", operating_income)?;
        validate_finite("net_income", net_income)?;
        validate_optional_finite("eps", eps)?;
        validate_optional_finite("eps_diluted", eps_diluted)?;

        Ok(Self {
            fiscal_date,
            revenue,
            gross_profit,
            operating_income,
            net_income,
            eps,
            eps_diluted,
        })
    }
}

/// Income statements, newest fiscal date first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalIncomeStatement {
    symbol: Symbol,
    statements: Vec<IncomeStatement>,
}

impl CanonicalIncomeStatement {
    pub fn new(symbol: Symbol, mut statements: Vec<IncomeStatement>) -> Self {
        statements.sort_by(|left, right| right.fiscal_date.cmp(&left.fiscal_date));
        statements.dedup_by_key(|statement| statement.fiscal_date);
        Self { symbol, statements }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn statements(&self) -> &[IncomeStatement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Any canonical shape a provider can produce. Serialized without a tag so the
/// shape's own fields sit at the top level of the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalData {
    Quote(CanonicalQuote),
    TimeSeries(CanonicalTimeSeries),
    Dividends(CanonicalDividendList),
    Earnings(CanonicalEarnings),
    CashFlow(CanonicalCashFlow),
    IncomeStatement(CanonicalIncomeStatement),
}

impl CanonicalData {
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::Quote(_) => Endpoint::Quote,
            Self::TimeSeries(_) => Endpoint::TimeSeries,
            Self::Dividends(_) => Endpoint::Dividends,
            Self::Earnings(_) => Endpoint::Earnings,
            Self::CashFlow(_) => Endpoint::CashFlow,
            Self::IncomeStatement(_) => Endpoint::IncomeStatement,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Quote(quote) => &quote.symbol,
            Self::TimeSeries(series) => series.symbol(),
            Self::Dividends(list) => list.symbol(),
            Self::Earnings(earnings) => earnings.symbol(),
            Self::CashFlow(cash_flow) => cash_flow.symbol(),
            Self::IncomeStatement(statement) => statement.symbol(),
        }
    }

    /// True when a collection shape carries no entries. Quotes are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Quote(_) => false,
            Self::TimeSeries(series) => series.is_empty(),
            Self::Dividends(list) => list.is_empty(),
            Self::Earnings(earnings) => earnings.is_empty(),
            Self::CashFlow(cash_flow) => cash_flow.is_empty(),
            Self::IncomeStatement(statement) => statement.is_empty(),
        }
    }
}

/// Converts a provider volume figure into a whole share count.
pub fn volume_from_f64(value: f64) -> Result<u64, ValidationError> {
    validate_non_negative("volume", value)?;
    Ok(value.round() as u64)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_finite(field, value)?;
    }
    Ok(())
}
