use thiserror::Error;

/// Validation and contract errors exposed by `tickerline-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error(
        "invalid endpoint '{value}', expected one of quote, time_series, dividends, earnings, cash_flow, income_statement"
    )]
    InvalidEndpoint { value: String },
    #[error(
        "invalid provider '{value}', expected one of twelvedata, fmp, finnhub, alphavantage, yahoo"
    )]
    InvalidProvider { value: String },
    #[error("invalid metric '{value}', expected one of price, revenue, net_income")]
    InvalidMetric { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("date must be formatted YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("unix timestamp {value} is out of range")]
    TimestampOutOfRange { value: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}
