//! Utility functions and helpers.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use url::Url;

/// Calendar date of an instant in the given timezone.
pub fn date_in(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Today's date in the given timezone.
pub fn today_in(tz: Tz) -> NaiveDate {
    date_in(tz, Utc::now())
}

/// Extract the host from a URL string, for compact log lines.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_date_in_crosses_midnight() {
        let instant = Utc.with_ymd_and_hms(2025, 10, 17, 3, 0, 0).unwrap();
        assert_eq!(
            date_in(chrono_tz::America::New_York, instant),
            NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()
        );
        assert_eq!(
            date_in(chrono_tz::Asia::Tokyo, instant),
            NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://acme.chilipiper.com/router/demo"),
            Some("acme.chilipiper.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }
}
