//! Domain data structures for fractions, addresses, and cached pickup entries.

use std::convert::Infallible;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use crate::ports::ConfigError;

/// Date format used when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Configured format value that disables formatting altogether.
pub const RAW_DATE_FORMAT: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Identifier of a waste fraction as used by the upstream API.
pub enum FractionId {
    /// Numeric identifier, the form the API normally uses.
    Number(i64),
    /// Any identifier that is not a plain integer.
    Text(String),
}

impl FractionId {
    fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        trimmed
            .parse::<i64>()
            .map_or_else(|_err| FractionId::Text(trimmed.to_owned()), FractionId::Number)
    }
}

impl fmt::Display for FractionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FractionId::Number(number) => write!(formatter, "{number}"),
            FractionId::Text(text) => write!(formatter, "{text}"),
        }
    }
}

impl FromStr for FractionId {
    type Err = Infallible;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_text(text))
    }
}

impl From<i64> for FractionId {
    fn from(number: i64) -> Self {
        FractionId::Number(number)
    }
}

impl From<&str> for FractionId {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl<'de> Deserialize<'de> for FractionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(number) => FractionId::Number(number),
            RawId::Text(text) => FractionId::from_text(&text),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Joined schedule record for one fraction at the configured address.
pub struct Entry {
    /// Fraction this entry describes.
    pub fraction_id: FractionId,
    /// Human-readable fraction label, e.g. “Papir”.
    pub name: String,
    /// Icon reference exactly as delivered by the API.
    pub icon: String,
    /// Next scheduled pickup.
    pub first_pickup: Option<NaiveDateTime>,
    /// Pickup following `first_pickup`, when the API lists two dates.
    pub next_pickup: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Street name kept in canonical percent-encoded form.
pub struct StreetName(String);

impl StreetName {
    /// Normalize a street name by decoding and re-encoding it as a URL component.
    ///
    /// Already encoded and plain input both end up in the same canonical form.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let decoded = urlencoding::decode_binary(raw.as_bytes());
        let decoded = String::from_utf8_lossy(&decoded);
        Self(urlencoding::encode(&decoded).into_owned())
    }

    /// Encoded value, ready to be placed into a request URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreetName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Address and municipality the schedule is requested for.
pub struct Address {
    /// Street name, percent-encoded.
    pub street_name: StreetName,
    /// Municipal street code.
    pub street_code: String,
    /// House number including letters such as “12B”.
    pub house_number: String,
    /// Municipality number sent with every request.
    pub county_id: String,
}

impl Address {
    /// Build an address, normalizing the street name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when any of the fields is blank.
    pub fn new(
        street_name: &str,
        street_code: &str,
        house_number: &str,
        county_id: &str,
    ) -> Result<Self, ConfigError> {
        let required = |value: &str, field: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(ConfigError::Missing(field))
            } else {
                Ok(value.to_owned())
            }
        };

        Ok(Self {
            street_name: StreetName::new(&required(street_name, "street_name")?),
            street_code: required(street_code, "street_code")?,
            house_number: required(house_number, "house_no")?,
            county_id: required(county_id, "county_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Output format applied to pickup timestamps.
pub enum DateFormat {
    /// Hand timestamps back untouched.
    Raw,
    /// strftime-style pattern, validated on construction.
    Pattern(String),
}

impl DateFormat {
    /// Interpret a configured format value.
    ///
    /// The literal `"None"` selects [`DateFormat::Raw`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDateFormat`] when the pattern contains unknown
    /// specifiers or ones a timestamp without offset cannot render.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        if value == RAW_DATE_FORMAT {
            return Ok(DateFormat::Raw);
        }

        let invalid = || ConfigError::InvalidDateFormat(value.to_owned());

        if StrftimeItems::new(value).any(|item| matches!(item, Item::Error)) {
            return Err(invalid());
        }

        let sample = NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid)?;
        let mut rendered = String::new();
        write!(rendered, "{}", sample.format(value)).map_err(|_err| invalid())?;

        Ok(DateFormat::Pattern(value.to_owned()))
    }

    /// Apply the format to a timestamp.
    #[must_use]
    pub fn format(&self, timestamp: NaiveDateTime) -> FormattedDate {
        match self {
            DateFormat::Raw => FormattedDate::Raw(timestamp),
            DateFormat::Pattern(pattern) => {
                let mut text = String::new();
                if write!(text, "{}", timestamp.format(pattern)).is_err() {
                    tracing::warn!(%pattern, "date format could not be applied");
                    return FormattedDate::Raw(timestamp);
                }
                FormattedDate::Text(text)
            }
        }
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::Pattern(DEFAULT_DATE_FORMAT.to_owned())
    }
}

impl FromStr for DateFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of [`DateFormat::format`].
pub enum FormattedDate {
    /// The timestamp as it was passed in.
    Raw(NaiveDateTime),
    /// The timestamp rendered with the configured pattern.
    Text(String),
}

impl fmt::Display for FormattedDate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormattedDate::Raw(timestamp) => write!(formatter, "{timestamp}"),
            FormattedDate::Text(text) => formatter.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamp(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S").expect("valid timestamp")
    }

    #[test]
    fn street_name_is_encoded_once() {
        let plain = StreetName::new("Storgata Øvre");
        let encoded = StreetName::new("Storgata%20%C3%98vre");

        assert_eq!(plain.as_str(), "Storgata%20%C3%98vre");
        assert_eq!(plain, encoded, "encoded input must not be encoded twice");
    }

    #[test]
    fn address_rejects_blank_fields() {
        let err = Address::new("Storgata", " ", "1", "3024").expect_err("blank street code");
        assert!(
            matches!(err, ConfigError::Missing("street_code")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn fraction_ids_from_config_match_numeric_ids() {
        assert_eq!(FractionId::from("1"), FractionId::Number(1));
        assert_eq!(FractionId::from("rest"), FractionId::Text("rest".to_owned()));

        let parsed: Vec<FractionId> =
            serde_json::from_str(r#"[1, "2", "glass"]"#).expect("valid ids");
        assert_eq!(
            parsed,
            vec![
                FractionId::Number(1),
                FractionId::Number(2),
                FractionId::Text("glass".to_owned())
            ]
        );
    }

    #[test]
    fn raw_format_returns_timestamp_unchanged() {
        let format = DateFormat::parse(RAW_DATE_FORMAT).expect("sentinel is valid");
        let pickup = timestamp("2024-01-10T06:30:00");

        assert_eq!(format.format(pickup), FormattedDate::Raw(pickup));
    }

    #[test]
    fn pattern_format_recovers_calendar_date() {
        let format = DateFormat::default();
        let pickup = timestamp("2024-01-10T06:30:00");

        let rendered = format.format(pickup).to_string();
        assert_eq!(rendered, "10/01/2024");

        let parsed = NaiveDate::parse_from_str(&rendered, DEFAULT_DATE_FORMAT).expect("inverse");
        assert_eq!(parsed, pickup.date());
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(DateFormat::parse("%Q").is_err(), "unknown specifier");
        assert!(DateFormat::parse("%d %z").is_err(), "offset needs a timezone");
        assert!(DateFormat::parse("%A %-d. %B").is_ok(), "long format is valid");
    }
}
