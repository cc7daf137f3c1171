use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Serialize, Serializer};
use thiserror::Error;

const PLACEHOLDER_ENTRIES: [&str; 7] = [
    "2023-04-17T08:00:00",
    "2023-04-18T08:00:00",
    "2023-04-19T08:00:00",
    "2023-04-20T08:00:00",
    "2023-04-21T08:00:00",
    "2023-04-22T08:00:00",
    "2023-04-23T08:00:00",
];

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schedule timestamp {raw:?}")]
pub struct InvalidTimestamp {
    pub raw: String,
}

/// A pre-conditioning start time. The raw text is echoed back to peers
/// verbatim; only its hour and minute take part in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    raw: String,
    start: NaiveTime,
}

impl ScheduleEntry {
    pub fn parse(raw: &str) -> Result<Self, InvalidTimestamp> {
        let timestamp = parse_local_timestamp(raw.trim()).ok_or_else(|| InvalidTimestamp {
            raw: raw.to_string(),
        })?;
        let start = NaiveTime::from_hms_opt(timestamp.hour(), timestamp.minute(), 0)
            .ok_or_else(|| InvalidTimestamp {
                raw: raw.to_string(),
            })?;

        Ok(Self {
            raw: raw.to_string(),
            start,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    fn start_minutes(&self) -> u32 {
        self.start.hour() * 60 + self.start.minute()
    }

    /// Inclusive `[start, start + 1min]` at minute resolution, wrapping past
    /// midnight.
    pub fn is_due(&self, now: NaiveTime) -> bool {
        let now_minutes = now.hour() * 60 + now.minute();
        let elapsed = (now_minutes + MINUTES_PER_DAY - self.start_minutes()) % MINUTES_PER_DAY;
        elapsed <= 1
    }

    /// Date on which the window containing `now` opened. Only meaningful
    /// while `is_due(now.time())` holds.
    pub fn window_opened_on(&self, now: NaiveDateTime) -> NaiveDate {
        let now_minutes = now.hour() * 60 + now.minute();
        if now_minutes < self.start_minutes() {
            now.date() - Duration::days(1)
        } else {
            now.date()
        }
    }
}

impl Serialize for ScheduleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Default for Schedule {
    fn default() -> Self {
        let entries = PLACEHOLDER_ENTRIES
            .iter()
            .filter_map(|raw| ScheduleEntry::parse(raw).ok())
            .collect();
        Self { entries }
    }
}

impl Schedule {
    /// Parses every entry; a single bad timestamp rejects the whole list.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, InvalidTimestamp> {
        let entries = raw
            .iter()
            .map(|entry| ScheduleEntry::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn raw_entries(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.raw.clone()).collect()
    }

    pub fn due_entries(&self, now: NaiveTime) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.iter().filter(move |entry| entry.is_due(now))
    }
}

fn parse_local_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        // Offset-qualified stamps keep the wall-clock time they were written in.
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|timestamp| timestamp.naive_local())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
