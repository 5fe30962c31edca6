//! Traits describing the upstream API and clock, plus the shared error types.

use std::fmt;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, ParseError as ChronoParseError};
use serde_json::Error as JsonError;

use crate::model::{Address, FractionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The two payloads fetched per refresh.
pub enum Payload {
    /// Pickup dates per fraction for the address.
    Schedule,
    /// Fraction names and icons.
    Fractions,
}

impl fmt::Display for Payload {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Payload::Schedule => "schedule",
            Payload::Fractions => "fractions",
        };
        write!(formatter, "{label}")
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors raised while turning upstream payloads into calendar entries.
pub enum CalendarError {
    /// A payload was not the expected JSON structure.
    #[error("Decode error in {payload} payload: {source}")]
    Decode {
        /// Payload that failed to decode.
        payload: Payload,
        /// Underlying JSON error.
        #[source]
        source: JsonError,
    },
    /// A pickup date did not have the `YYYY-MM-DDTHH:MM:SS` shape.
    #[error("Parse error in pickup date {value:?} of fraction {fraction}: {source}")]
    Timestamp {
        /// Fraction the date belongs to.
        fraction: FractionId,
        /// The offending value.
        value: String,
        /// Underlying chrono error.
        #[source]
        source: ChronoParseError,
    },
    /// The API listed more pickup dates than an entry can hold.
    #[error("Fraction {fraction} lists {count} pickup dates, expected at most two")]
    TooManyDates {
        /// Fraction with the unexpected list.
        fraction: FractionId,
        /// Number of dates received.
        count: usize,
    },
}

#[derive(thiserror::Error, Debug)]
/// Errors in the address or formatting configuration.
pub enum ConfigError {
    /// A required value is empty.
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
    /// The date format is not a usable strftime pattern.
    #[error("Invalid date format: {0:?}")]
    InvalidDateFormat(String),
}

#[async_trait]
/// Access to the upstream waste calendar API.
///
/// Both calls report a failed request as `None` rather than an error; the cache
/// treats a missing payload as a schedule without entries.
pub trait CalendarPort: Send + Sync {
    /// Raw schedule payload for the address.
    async fn schedule(&self, address: &Address) -> Option<String>;

    /// Raw fraction metadata payload for the municipality of the address.
    async fn fractions(&self, address: &Address) -> Option<String>;
}

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    /// Today's date in local time.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
/// [`Clock`] backed by the system's local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
