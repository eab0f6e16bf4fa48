//! Per-link scan result records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LinkTarget;

/// How a single link's scan ended, before it is stamped into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A day met the slot threshold
    Found { date: NaiveDate, slots: usize },
    /// The month horizon or pagination ran out first
    Exhausted { months_scanned: u32 },
}

/// One output record, as consumed by the dashboard.
///
/// Exactly one of `earliest_date`, `note` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub name: String,
    pub url: String,
    pub earliest_date: Option<NaiveDate>,
    pub days_from_today: Option<i64>,
    pub slot_count_observed: usize,
    pub scanned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    /// Record for a qualifying day; `today` is midnight-local in the configured timezone.
    pub fn found(link: &LinkTarget, date: NaiveDate, slots: usize, today: NaiveDate) -> Self {
        Self {
            earliest_date: Some(date),
            days_from_today: Some((date - today).num_days()),
            slot_count_observed: slots,
            ..Self::empty(link)
        }
    }

    /// Record for a link that was scanned without finding a qualifying day.
    pub fn exhausted(link: &LinkTarget, note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::empty(link)
        }
    }

    /// Record for a link whose scan faulted.
    pub fn failed(link: &LinkTarget, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            error: Some(if error.trim().is_empty() {
                "unknown error".to_string()
            } else {
                error
            }),
            ..Self::empty(link)
        }
    }

    fn empty(link: &LinkTarget) -> Self {
        Self {
            name: link.name.clone(),
            url: link.url.clone(),
            earliest_date: None,
            days_from_today: None,
            slot_count_observed: 0,
            scanned_at: Utc::now(),
            note: None,
            error: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.earliest_date.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkTarget {
        LinkTarget::new("Sales Demo", "https://example.com/demo")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_found_computes_day_distance() {
        let result = ScanResult::found(&link(), date(2025, 10, 17), 4, date(2025, 10, 14));
        assert_eq!(result.days_from_today, Some(3));
        assert_eq!(result.slot_count_observed, 4);
        assert!(result.note.is_none() && result.error.is_none());
    }

    #[test]
    fn test_found_across_month_boundary() {
        let result = ScanResult::found(&link(), date(2025, 11, 2), 3, date(2025, 10, 30));
        assert_eq!(result.days_from_today, Some(3));
    }

    #[test]
    fn test_serialized_shape() {
        let result = ScanResult::found(&link(), date(2025, 10, 17), 3, date(2025, 10, 17));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["earliestDate"], "2025-10-17");
        assert_eq!(json["daysFromToday"], 0);
        assert_eq!(json["slotCountObserved"], 3);
        assert!(json.get("note").is_none());
        assert!(json.get("error").is_none());
        assert!(json["scannedAt"].is_string());
    }

    #[test]
    fn test_exhausted_keeps_nulls() {
        let result = ScanResult::exhausted(&link(), "nothing");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["earliestDate"].is_null());
        assert!(json["daysFromToday"].is_null());
        assert_eq!(json["slotCountObserved"], 0);
        assert_eq!(json["note"], "nothing");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_never_has_empty_error() {
        let result = ScanResult::failed(&link(), "");
        assert_eq!(result.error.as_deref(), Some("unknown error"));
        assert!(!result.is_found());
        assert!(result.is_error());
    }
}
