//! Calendar surface values: day cells, month captions and slot observations.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::browser::ElementHandle;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static ISO_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})-(\d{2})-(\d{2})\b").expect("valid regex"));

static NATURAL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),?\s+(20\d{2})",
    )
    .expect("valid regex")
});

static MONTH_CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(January|February|March|April|May|June|July|August|September|October|November|December)[^\d]*(20\d{2})",
    )
    .expect("valid regex")
});

static DAY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}$").expect("valid regex"));

/// A clickable day cell in the current render of the calendar.
///
/// The handle is only meaningful until the calendar view changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub handle: ElementHandle,
}

impl CalendarDay {
    pub fn new(date: NaiveDate, handle: ElementHandle) -> Self {
        Self { date, handle }
    }

    /// Canonical `YYYY-MM-DD` key.
    pub fn iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Month and year shown in the calendar caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthHeader {
    /// Zero-based month, 0 = January
    pub month_index: u32,
    pub year: i32,
}

impl MonthHeader {
    /// Parse a caption such as "October 2025" or "October, 2025 ▾".
    pub fn parse(caption: &str) -> Option<Self> {
        let caps = MONTH_CAPTION.captures(caption)?;
        let month_index = month_index_from_name(&caps[1])?;
        let year = caps[2].parse().ok()?;
        Some(Self { month_index, year })
    }

    /// Date for a day-of-month in this month, if it exists.
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month_index + 1, day)
    }

    /// Date for a cell whose whole text is a 1–2 digit day number.
    pub fn day_from_text(&self, text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        if !DAY_NUMBER.is_match(text) {
            return None;
        }
        self.day(text.parse().ok()?)
    }
}

/// Zero-based month index for a name, matched case-insensitively by prefix.
pub fn month_index_from_name(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|month| name.starts_with(month))
        .map(|i| i as u32)
}

/// Parse an ISO date from a structured attribute value.
///
/// Accepts `YYYY-MM-DD` optionally followed by a time component.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date = value.get(..10)?;
    let rest = &value[10..];
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Derive a date from an accessible label.
///
/// Tries an embedded ISO date first, then "<Month> <day>, <year>".
pub fn parse_label_date(label: &str) -> Option<NaiveDate> {
    if let Some(caps) = ISO_IN_TEXT.captures(label) {
        let (y, m, d) = (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }

    let caps = NATURAL_DATE.captures(label)?;
    let month = month_index_from_name(&caps[1])?;
    let day = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month + 1, day)
}

/// Distinct normalized time strings seen after activating a day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotObservation {
    times: BTreeSet<String>,
}

impl SlotObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a time; returns false when it was already present.
    pub fn insert(&mut self, time: impl Into<String>) -> bool {
        self.times.insert(time.into())
    }

    pub fn extend(&mut self, other: SlotObservation) {
        self.times.extend(other.times);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = &str> {
        self.times.iter().map(String::as_str)
    }
}

impl FromIterator<String> for SlotObservation {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            times: iter.into_iter().collect(),
        }
    }
}
