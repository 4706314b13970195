//! # Domain Models
//!
//! Canonical output shapes every provider response is normalized into.
//!
//! ## Overview
//!
//! Consumers read these types without knowing which provider answered, so
//! every constructor enforces the same invariants regardless of source:
//!
//! - **Validated**: prices are finite and non-negative, EPS and statement
//!   figures are finite
//! - **Ordered**: time series ascend by date, every other collection
//!   descends by date
//! - **Serializable**: serde output matches the public JSON contract
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CanonicalQuote`] | Latest session OHLC, volume and change |
//! | [`CanonicalTimeSeries`] | Daily OHLCV bars |
//! | [`CanonicalDividendList`] | Cash dividends by ex-date |
//! | [`CanonicalEarnings`] | Reported and estimated EPS |
//! | [`CanonicalCashFlow`] | Cash flow statements |
//! | [`CanonicalIncomeStatement`] | Income statements |
//! | [`Symbol`] | Validated ticker symbol |
//! | [`MarketDate`] | `YYYY-MM-DD` calendar date |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! ```rust
//! use tickerline_core::{MarketDate, TimeSeriesValue, ValidationError};
//!
//! let day = MarketDate::parse("2024-01-02").unwrap();
//! assert!(TimeSeriesValue::new(day, 187.15, 188.44, 183.89, 185.64, 82_488_700).is_ok());
//!
//! let invalid = TimeSeriesValue::new(day, 187.15, 188.44, 183.89, f64::NAN, 0);
//! assert_eq!(invalid, Err(ValidationError::NonFiniteValue { field: "close" }));
//! ```

mod date;
mod models;
mod symbol;
mod timestamp;

pub use date::MarketDate;
pub use models::{
    volume_from_f64, CanonicalCashFlow, CanonicalData, CanonicalDividendList, CanonicalEarnings,
    CanonicalIncomeStatement, CanonicalQuote, CanonicalTimeSeries, CashFlowStatement, Dividend,
    EarningsReport, IncomeStatement, TimeSeriesValue,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
