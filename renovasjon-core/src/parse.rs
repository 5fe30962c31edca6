//! Decoding of the schedule and fraction payloads and joining them into [`Entry`] values.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::model::{Entry, FractionId};
use crate::ports::{CalendarError, Payload};

/// Shape of every pickup timestamp sent by the API.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Single record from the schedule endpoint.
#[derive(Debug, Deserialize)]
struct ScheduleRecord {
    #[serde(rename = "FraksjonId")]
    fraction_id: FractionId,

    // null entries show up for addresses without a planned pickup
    #[serde(rename = "Tommedatoer", default)]
    dates: Vec<Option<String>>,
}

/// Single record from the fractions endpoint.
#[derive(Debug, Deserialize)]
struct FractionRecord {
    #[serde(rename = "Id")]
    id: FractionId,
    #[serde(rename = "Navn")]
    name: String,
    #[serde(rename = "Ikon", default)]
    icon: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Pickup dates listed for one fraction.
pub enum PickupDates {
    /// No pickup is planned.
    Empty,
    /// Only the next pickup is known.
    One(Option<NaiveDateTime>),
    /// Next pickup and the one after it, in the order the API sent them.
    Two(Option<NaiveDateTime>, Option<NaiveDateTime>),
}

impl PickupDates {
    /// Classify and parse the raw date list of a schedule record.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::TooManyDates`] for more than two dates and
    /// [`CalendarError::Timestamp`] when a date cannot be parsed.
    pub fn from_raw(fraction: &FractionId, raw: &[Option<String>]) -> Result<Self, CalendarError> {
        let parse = |value: &Option<String>| parse_timestamp(fraction, value.as_deref());

        match raw {
            [] => Ok(PickupDates::Empty),
            [first] => Ok(PickupDates::One(parse(first)?)),
            [first, next] => Ok(PickupDates::Two(parse(first)?, parse(next)?)),
            _ => Err(CalendarError::TooManyDates {
                fraction: fraction.clone(),
                count: raw.len(),
            }),
        }
    }

    /// The next pickup, if any.
    #[must_use]
    pub fn first(self) -> Option<NaiveDateTime> {
        match self {
            PickupDates::Empty => None,
            PickupDates::One(first) | PickupDates::Two(first, _) => first,
        }
    }

    /// The pickup after [`PickupDates::first`], if any.
    #[must_use]
    pub fn next(self) -> Option<NaiveDateTime> {
        match self {
            PickupDates::Two(_, next) => next,
            PickupDates::Empty | PickupDates::One(_) => None,
        }
    }
}

/// Join the two payloads into the entry list.
///
/// A missing payload yields an empty list. Schedule records whose fraction has no
/// metadata are skipped, as are repeated records for a fraction already seen.
/// The result keeps the order of the schedule payload.
///
/// # Errors
///
/// Returns a [`CalendarError`] when a payload is malformed or a record carries
/// invalid pickup dates.
pub fn join(schedule: Option<&str>, fractions: Option<&str>) -> Result<Vec<Entry>, CalendarError> {
    let (Some(schedule), Some(fractions)) = (schedule, fractions) else {
        warn!(
            schedule = schedule.is_some(),
            fractions = fractions.is_some(),
            "payload missing, no entries produced"
        );
        return Ok(Vec::new());
    };

    let records = decode::<Vec<ScheduleRecord>>(schedule, Payload::Schedule)?;
    let fraction_records = decode::<Vec<FractionRecord>>(fractions, Payload::Fractions)?;

    let mut metadata = HashMap::with_capacity(fraction_records.len());
    for fraction in fraction_records {
        metadata.entry(fraction.id.clone()).or_insert(fraction);
    }

    let mut seen = HashSet::with_capacity(records.len());
    let mut entries = Vec::with_capacity(records.len());

    for record in records {
        let dates = PickupDates::from_raw(&record.fraction_id, &record.dates)?;

        let Some(fraction) = metadata.get(&record.fraction_id) else {
            debug!(fraction = %record.fraction_id, "no metadata for fraction, skipping");
            continue;
        };

        if !seen.insert(record.fraction_id.clone()) {
            debug!(fraction = %record.fraction_id, "duplicate schedule record, skipping");
            continue;
        }

        entries.push(Entry {
            fraction_id: record.fraction_id,
            name: fraction.name.clone(),
            icon: fraction.icon.clone().unwrap_or_default(),
            first_pickup: dates.first(),
            next_pickup: dates.next(),
        });
    }

    Ok(entries)
}

fn decode<T: DeserializeOwned>(raw: &str, payload: Payload) -> Result<T, CalendarError> {
    serde_json::from_str(raw).map_err(|source| CalendarError::Decode { payload, source })
}

fn parse_timestamp(
    fraction: &FractionId,
    value: Option<&str>,
) -> Result<Option<NaiveDateTime>, CalendarError> {
    value
        .map(|raw| {
            NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|source| {
                CalendarError::Timestamp {
                    fraction: fraction.clone(),
                    value: raw.to_owned(),
                    source,
                }
            })
        })
        .transpose()
}
