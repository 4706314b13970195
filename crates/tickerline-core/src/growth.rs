//! Compound annual growth over canonical series and statements.
//!
//! | Metric | Endpoint | Start and end points |
//! |--------|----------|----------------------|
//! | `price` | `time_series` | latest close and the close nearest the same day `years` earlier |
//! | `revenue` | `income_statement` | newest statement and the one `years` statements back |
//! | `net_income` | `income_statement` | newest statement and the one `years` statements back |
//!
//! A window the data cannot cover yields `cagr: null` rather than an error.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;
use time::Date;

use crate::{
    CanonicalData, CanonicalIncomeStatement, CanonicalTimeSeries, Endpoint, MarketDate, Symbol,
    ValidationError,
};

/// Furthest the nearest bar may sit from the target day before the series
/// counts as too short.
const MAX_ANCHOR_GAP_DAYS: i64 = 10;

/// Quantity whose growth is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMetric {
    Price,
    Revenue,
    NetIncome,
}

impl GrowthMetric {
    pub const ALL: [Self; 3] = [Self::Price, Self::Revenue, Self::NetIncome];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Revenue => "revenue",
            Self::NetIncome => "net_income",
        }
    }

    /// Endpoint whose canonical shape carries this metric.
    pub const fn endpoint(self) -> Endpoint {
        match self {
            Self::Price => Endpoint::TimeSeries,
            Self::Revenue | Self::NetIncome => Endpoint::IncomeStatement,
        }
    }
}

impl Display for GrowthMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrowthMetric {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::InvalidMetric {
                value: trimmed.to_owned(),
            })
    }
}

/// One dated observation used as a window endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthPoint {
    pub date: MarketDate,
    pub value: f64,
}

/// Growth of one metric over a window of whole years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Growth {
    pub symbol: Symbol,
    pub metric: GrowthMetric,
    pub years: u32,
    pub start: Option<GrowthPoint>,
    pub end: Option<GrowthPoint>,
    pub cagr: Option<f64>,
}

impl Growth {
    /// Measures `metric` on `data`. Returns `None` when `data` is not the
    /// shape `metric` reads from.
    pub fn measure(data: &CanonicalData, metric: GrowthMetric, years: u32) -> Option<Self> {
        let (start, end) = match (metric, data) {
            (GrowthMetric::Price, CanonicalData::TimeSeries(series)) => price_window(series, years),
            (GrowthMetric::Revenue, CanonicalData::IncomeStatement(statements)) => {
                statement_window(statements, years, |statement| statement.revenue)
            }
            (GrowthMetric::NetIncome, CanonicalData::IncomeStatement(statements)) => {
                statement_window(statements, years, |statement| statement.net_income)
            }
            _ => return None,
        };

        let cagr = match (start, end) {
            (Some(start), Some(end)) => cagr(start.value, end.value, years),
            _ => None,
        };

        Some(Self {
            symbol: data.symbol().clone(),
            metric,
            years,
            start,
            end,
            cagr,
        })
    }
}

/// `(end / start)^(1 / years) - 1`.
///
/// Undefined for a zero-year window and for non-positive or non-finite
/// endpoints, where a fractional power has no real value.
pub fn cagr(start: f64, end: f64, years: u32) -> Option<f64> {
    if years == 0 || !start.is_finite() || !end.is_finite() || start <= 0.0 || end <= 0.0 {
        return None;
    }
    let rate = (end / start).powf(1.0 / f64::from(years)) - 1.0;
    rate.is_finite().then_some(rate)
}

fn price_window(
    series: &CanonicalTimeSeries,
    years: u32,
) -> (Option<GrowthPoint>, Option<GrowthPoint>) {
    let Some(latest) = series.values().last() else {
        return (None, None);
    };
    let end = GrowthPoint {
        date: latest.datetime,
        value: latest.close,
    };

    let start = years_before(latest.datetime.into_inner(), years).and_then(|target| {
        series
            .values()
            .iter()
            .map(|bar| (bar, (bar.datetime.into_inner() - target).whole_days().abs()))
            .min_by_key(|(_, gap)| *gap)
            .filter(|(_, gap)| *gap <= MAX_ANCHOR_GAP_DAYS)
            .map(|(bar, _)| GrowthPoint {
                date: bar.datetime,
                value: bar.close,
            })
    });

    (start, Some(end))
}

fn statement_window<F>(
    statements: &CanonicalIncomeStatement,
    years: u32,
    value: F,
) -> (Option<GrowthPoint>, Option<GrowthPoint>)
where
    F: Fn(&crate::IncomeStatement) -> f64,
{
    let point = |index: usize| {
        statements
            .statements()
            .get(index)
            .map(|statement| GrowthPoint {
                date: statement.fiscal_date,
                value: value(statement),
            })
    };
    let start = usize::try_from(years).ok().and_then(&point);
    (start, point(0))
}

/// Same calendar day `years` earlier; Feb 29 falls back to Feb 28.
fn years_before(date: Date, years: u32) -> Option<Date> {
    let year = date.year().checked_sub(i32::try_from(years).ok()?)?;
    date.replace_year(year)
        .or_else(|_| date.replace_day(28).and_then(|day| day.replace_year(year)))
        .ok()
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::{IncomeStatement, TimeSeriesValue};

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("symbol")
    }

    fn bar(day: Date, close: f64) -> TimeSeriesValue {
        TimeSeriesValue::new(MarketDate::from_date(day), close, close, close, close, 1_000)
            .expect("valid bar")
    }

    fn statement(day: Date, revenue: f64, net_income: f64) -> IncomeStatement {
        IncomeStatement::new(
            MarketDate::from_date(day),
            revenue,
            None,
            None,
            net_income,
            None,
            None,
        )
        .expect("valid statement")
    }

    fn statements() -> CanonicalData {
        CanonicalData::IncomeStatement(CanonicalIncomeStatement::new(
            symbol(),
            vec![
                statement(date!(2021 - 09 - 25), 365.0, 94.0),
                statement(date!(2023 - 09 - 30), 383.0, 97.0),
                statement(date!(2022 - 09 - 24), 394.0, 99.8),
                statement(date!(2020 - 09 - 26), 274.5, 57.4),
            ],
        ))
    }

    #[test]
    fn doubling_over_one_year_is_one_hundred_percent() {
        assert_eq!(cagr(50.0, 100.0, 1), Some(1.0));
        let rate = cagr(100.0, 121.0, 2).expect("defined");
        assert!((rate - 0.1).abs() < 1e-12);
    }

    #[test]
    fn zero_negative_and_empty_windows_are_undefined() {
        assert_eq!(cagr(0.0, 100.0, 5), None);
        assert_eq!(cagr(100.0, 0.0, 5), None);
        assert_eq!(cagr(-10.0, 20.0, 3), None);
        assert_eq!(cagr(100.0, 200.0, 0), None);
        assert_eq!(cagr(f64::NAN, 200.0, 1), None);
    }

    #[test]
    fn price_growth_anchors_on_the_nearest_bar_years_back() {
        let series = CanonicalData::TimeSeries(CanonicalTimeSeries::new(
            symbol(),
            vec![
                bar(date!(2024 - 01 - 02), 200.0),
                bar(date!(2022 - 01 - 03), 100.0),
                bar(date!(2022 - 02 - 01), 120.0),
                bar(date!(2023 - 06 - 01), 150.0),
            ],
        ));

        let growth = Growth::measure(&series, GrowthMetric::Price, 2).expect("series shape");
        let start = growth.start.expect("start bar");
        assert_eq!(start.date.to_string(), "2022-01-03");
        assert_eq!(growth.end.map(|point| point.value), Some(200.0));
        let rate = growth.cagr.expect("defined");
        assert!((rate - (2.0_f64.sqrt() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn short_price_history_has_no_growth() {
        let series = CanonicalData::TimeSeries(CanonicalTimeSeries::new(
            symbol(),
            vec![bar(date!(2023 - 06 - 01), 150.0), bar(date!(2024 - 01 - 02), 200.0)],
        ));

        let growth = Growth::measure(&series, GrowthMetric::Price, 5).expect("series shape");
        assert!(growth.start.is_none());
        assert!(growth.end.is_some());
        assert_eq!(growth.cagr, None);
    }

    #[test]
    fn statement_growth_counts_back_whole_statements() {
        let growth = Growth::measure(&statements(), GrowthMetric::Revenue, 3).expect("statements");
        assert_eq!(growth.end.map(|point| point.date.to_string()), Some("2023-09-30".into()));
        assert_eq!(growth.start.map(|point| point.date.to_string()), Some("2020-09-26".into()));
        let expected = (383.0_f64 / 274.5).powf(1.0 / 3.0) - 1.0;
        assert!((growth.cagr.expect("defined") - expected).abs() < 1e-12);

        let income = Growth::measure(&statements(), GrowthMetric::NetIncome, 1).expect("statements");
        let expected = 97.0 / 99.8 - 1.0;
        assert!((income.cagr.expect("defined") - expected).abs() < 1e-12);
    }

    #[test]
    fn too_few_statements_or_a_loss_year_has_no_growth() {
        let growth = Growth::measure(&statements(), GrowthMetric::Revenue, 4).expect("statements");
        assert!(growth.start.is_none());
        assert_eq!(growth.cagr, None);

        let losses = CanonicalData::IncomeStatement(CanonicalIncomeStatement::new(
            symbol(),
            vec![
                statement(date!(2023 - 12 - 31), 10.0, 2.0),
                statement(date!(2022 - 12 - 31), 8.0, -1.5),
            ],
        ));
        let growth = Growth::measure(&losses, GrowthMetric::NetIncome, 1).expect("statements");
        assert!(growth.start.is_some());
        assert_eq!(growth.cagr, None);
    }

    #[test]
    fn metric_must_match_the_shape() {
        assert!(Growth::measure(&statements(), GrowthMetric::Price, 1).is_none());
    }

    #[test]
    fn metric_names_parse_case_insensitively() {
        assert_eq!("Net_Income".parse::<GrowthMetric>(), Ok(GrowthMetric::NetIncome));
        assert_eq!(GrowthMetric::Price.endpoint(), Endpoint::TimeSeries);
        assert!(matches!(
            "ebitda".parse::<GrowthMetric>(),
            Err(ValidationError::InvalidMetric { .. })
        ));
    }

    #[test]
    fn leap_day_steps_back_to_february_28() {
        assert_eq!(years_before(date!(2024 - 02 - 29), 1), Some(date!(2023 - 02 - 28)));
    }
}
