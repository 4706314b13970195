//! Field readers shared by the provider parsers.
//!
//! Providers disagree on how numbers travel: some send JSON numbers, some send
//! numeric strings, and some mark missing values with `"None"`, `"-"` or an
//! empty string. Absent values are `Ok(None)`; present but unusable ones are
//! `MalformedResponse`.

use serde_json::Value;

use crate::{
    volume_from_f64, MarketDate, ProviderId, SourceError, TimeSeriesValue, UtcDateTime,
};

pub(crate) fn number(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<Option<f64>, SourceError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => {
            let text = text.trim().trim_end_matches('%').trim();
            if is_absent_marker(text) {
                return Ok(None);
            }
            text.parse::<f64>().ok()
        }
        Some(_) => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Ok(Some(number)),
        _ => Err(SourceError::malformed(format!(
            "{} field '{field}' is not a finite number",
            provider.display_name()
        ))),
    }
}

pub(crate) fn required_number(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<f64, SourceError> {
    number(provider, value, field)?.ok_or_else(|| missing(provider, field))
}

/// Reads a volume figure. Missing volume counts as zero.
pub(crate) fn volume(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<u64, SourceError> {
    match number(provider, value, field)? {
        Some(volume) => Ok(volume_from_f64(volume)?),
        None => Ok(0),
    }
}

pub(crate) fn text<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !is_absent_marker(text))
}

pub(crate) fn date(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<Option<MarketDate>, SourceError> {
    match text(value) {
        None => Ok(None),
        Some(text) => MarketDate::parse(text).map(Some).map_err(|_| {
            SourceError::malformed(format!(
                "{} field '{field}' is not a date: '{text}'",
                provider.display_name()
            ))
        }),
    }
}

pub(crate) fn required_date(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<MarketDate, SourceError> {
    date(provider, value, field)?.ok_or_else(|| missing(provider, field))
}

pub(crate) fn unix_seconds(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<Option<i64>, SourceError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(|| {
            SourceError::malformed(format!(
                "{} field '{field}' is not a unix timestamp",
                provider.display_name()
            ))
        }),
        Some(_) => Err(SourceError::malformed(format!(
            "{} field '{field}' is not a unix timestamp",
            provider.display_name()
        ))),
    }
}

pub(crate) fn unix_datetime(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<Option<UtcDateTime>, SourceError> {
    match unix_seconds(provider, value, field)? {
        None | Some(0) => Ok(None),
        Some(seconds) => Ok(Some(UtcDateTime::from_unix_timestamp(seconds)?)),
    }
}

pub(crate) fn unix_date(
    provider: ProviderId,
    value: Option<&Value>,
    field: &str,
) -> Result<Option<MarketDate>, SourceError> {
    match unix_seconds(provider, value, field)? {
        None => Ok(None),
        Some(seconds) => Ok(Some(MarketDate::from_unix_timestamp(seconds)?)),
    }
}

pub(crate) fn array<'a>(
    provider: ProviderId,
    value: Option<&'a Value>,
    field: &str,
) -> Result<&'a [Value], SourceError> {
    match value {
        None | Some(Value::Null) => Err(missing(provider, field)),
        Some(Value::Array(values)) => Ok(values),
        Some(_) => Err(SourceError::malformed(format!(
            "{} field '{field}' is not an array",
            provider.display_name()
        ))),
    }
}

/// Builds one daily bar. Bars missing any price are dropped (`Ok(None)`);
/// a missing volume becomes zero.
pub(crate) fn bar(
    provider: ProviderId,
    datetime: MarketDate,
    open: Option<&Value>,
    high: Option<&Value>,
    low: Option<&Value>,
    close: Option<&Value>,
    volume_value: Option<&Value>,
) -> Result<Option<TimeSeriesValue>, SourceError> {
    let prices = (
        number(provider, open, "open")?,
        number(provider, high, "high")?,
        number(provider, low, "low")?,
        number(provider, close, "close")?,
    );
    let (Some(open), Some(high), Some(low), Some(close)) = prices else {
        return Ok(None);
    };

    let volume = volume(provider, volume_value, "volume")?;
    Ok(Some(TimeSeriesValue::new(
        datetime, open, high, low, close, volume,
    )?))
}

/// Resolves change and percent change, deriving either from the previous close
/// when the provider leaves it out.
pub(crate) fn change_pair(
    provider: ProviderId,
    close: f64,
    change: Option<f64>,
    percent_change: Option<f64>,
    previous_close: Option<f64>,
) -> Result<(f64, f64), SourceError> {
    let change = change
        .or_else(|| previous_close.map(|previous| close - previous))
        .ok_or_else(|| missing(provider, "change"))?;
    let percent_change = percent_change
        .or_else(|| {
            previous_close
                .filter(|previous| *previous != 0.0)
                .map(|previous| change / previous * 100.0)
        })
        .ok_or_else(|| missing(provider, "percent_change"))?;
    Ok((change, percent_change))
}

pub(crate) fn missing(provider: ProviderId, field: &str) -> SourceError {
    SourceError::no_data(format!(
        "{} response is missing '{field}'",
        provider.display_name()
    ))
}

pub(crate) fn empty(provider: ProviderId, what: &str) -> SourceError {
    SourceError::no_data(format!(
        "{} returned no {what}",
        provider.display_name()
    ))
}

/// True for an empty JSON array or object.
pub(crate) fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(values) => values.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

fn is_absent_marker(text: &str) -> bool {
    text.is_empty() || text == "-" || text.eq_ignore_ascii_case("none") || text == "null"
}
