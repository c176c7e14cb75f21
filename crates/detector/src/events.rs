//! Known calendar events used to annotate detected windows
//!
//! An event covers every timestamp from `start` through `end`, both ends
//! inclusive.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::{DetectorError, Result};

/// Default timestamp layout for datasets and event bounds
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp with `format`, falling back to ISO-8601 and bare dates
pub fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, format)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

mod event_time {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{parse_timestamp, TIMESTAMP_FORMAT};

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw, TIMESTAMP_FORMAT)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

/// A named, closed time interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    pub name: String,
    #[serde(with = "event_time")]
    pub start: NaiveDateTime,
    #[serde(with = "event_time")]
    pub end: NaiveDateTime,
}

impl EventWindow {
    pub fn new(name: impl Into<String>, start: &str, end: &str) -> Result<Self> {
        let parse = |raw: &str| {
            parse_timestamp(raw, TIMESTAMP_FORMAT)
                .ok_or_else(|| DetectorError::Config(format!("invalid timestamp '{raw}'")))
        };
        let window = Self {
            name: name.into(),
            start: parse(start)?,
            end: parse(end)?,
        };
        window.check()?;
        Ok(window)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    pub fn check(&self) -> Result<()> {
        if self.start > self.end {
            return Err(DetectorError::Config(format!(
                "event '{}' starts after it ends",
                self.name
            )));
        }
        Ok(())
    }
}

/// Name of the event covering each timestamp, `None` outside every event
pub fn annotate<'a>(
    timestamps: impl IntoIterator<Item = NaiveDateTime>,
    events: &'a [EventWindow],
) -> Vec<Option<&'a str>> {
    timestamps.into_iter().map(|t| event_at(events, t)).collect()
}

/// Name of the first event covering `at`
pub fn event_at(events: &[EventWindow], at: NaiveDateTime) -> Option<&str> {
    events
        .iter()
        .find(|e| e.contains(at))
        .map(|e| e.name.as_str())
}
