use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::ValidationError;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Calendar date of a trading session, ex-dividend day or fiscal period end.
///
/// Serialized as `YYYY-MM-DD`, which also makes the JSON form sort the same way
/// as the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarketDate(Date);

impl MarketDate {
    /// Parses `YYYY-MM-DD`, ignoring any trailing time component
    /// (`2024-01-02 16:00:00`, `2024-01-02T16:00:00Z`).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let date_part = trimmed
            .split(|ch: char| ch == ' ' || ch == 'T')
            .next()
            .unwrap_or(trimmed);

        Date::parse(date_part, DATE_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// UTC calendar date of a Unix timestamp in seconds.
    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(|value| Self(value.date()))
            .map_err(|_| ValidationError::TimestampOutOfRange { value: seconds })
    }

    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub const fn into_inner(self) -> Date {
        self.0
    }

    pub fn format(self) -> String {
        self.0
            .format(DATE_FORMAT)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }
}

impl Display for MarketDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

impl Serialize for MarketDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for MarketDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_timestamped_dates() {
        assert_eq!(
            MarketDate::parse("2024-01-02").expect("date").format(),
            "2024-01-02"
        );
        assert_eq!(
            MarketDate::parse("2024-01-02 16:00:00").expect("date").format(),
            "2024-01-02"
        );
        assert!(matches!(
            MarketDate::parse("02/01/2024"),
            Err(ValidationError::InvalidDate { .. })
        ));
    }

    #[test]
    fn unix_timestamps_map_to_utc_dates() {
        // 2024-01-02T14:30:00Z
        let date = MarketDate::from_unix_timestamp(1_704_205_800).expect("in range");
        assert_eq!(date.to_string(), "2024-01-02");
    }

    #[test]
    fn ordering_matches_calendar_order() {
        let earlier = MarketDate::parse("2023-12-29").expect("date");
        let later = MarketDate::parse("2024-01-02").expect("date");
        assert!(earlier < later);
    }
}
