//! The remembered filter choice.
//!
//! Stored under the `filter` key of the eframe storage together with its
//! expiry. The expiry is as far in the future as the last March 3rd is in
//! the past.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::Filter;

pub const FILTER_KEY: &str = "filter";

const ANNIVERSARY_MONTH: u32 = 3;
const ANNIVERSARY_DAY: u32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredFilter {
    pub value: Filter,
    pub expires: DateTime<Utc>,
}

impl StoredFilter {
    pub fn new(value: Filter, now: DateTime<Utc>) -> Self {
        Self {
            value,
            expires: expiry(now),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// The most recent March 3rd on or before `today`.
pub fn last_anniversary(today: NaiveDate) -> NaiveDate {
    let this_year = NaiveDate::from_ymd_opt(today.year(), ANNIVERSARY_MONTH, ANNIVERSARY_DAY);
    match this_year {
        Some(date) if date <= today => date,
        _ => NaiveDate::from_ymd_opt(today.year() - 1, ANNIVERSARY_MONTH, ANNIVERSARY_DAY)
            .unwrap_or(today),
    }
}

/// `now` plus the time elapsed since the last anniversary, at least one day.
pub fn expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    let anniversary = last_anniversary(now.date_naive())
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now);
    let elapsed = (now - anniversary).max(Duration::days(1));
    now + elapsed
}

/// The filter to preselect: the stored one while it has not expired.
pub fn current(stored: Option<&StoredFilter>, now: DateTime<Utc>) -> Filter {
    match stored {
        Some(stored) if !stored.is_expired(now) => stored.value,
        Some(stored) => {
            log::info!("stored filter {} expired at {}", stored.value.value(), stored.expires);
            Filter::None
        }
        None => Filter::None,
    }
}

pub fn load(storage: &dyn eframe::Storage) -> Option<StoredFilter> {
    eframe::get_value(storage, FILTER_KEY)
}

pub fn store(storage: &mut dyn eframe::Storage, stored: &StoredFilter) {
    eframe::set_value(storage, FILTER_KEY, stored);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn anniversary_is_this_year_once_reached() {
        assert_eq!(last_anniversary(date(2026, 10, 14)), date(2026, 3, 3));
        assert_eq!(last_anniversary(date(2026, 3, 4)), date(2026, 3, 3));
    }

    #[test]
    fn anniversary_day_itself_counts_as_this_year() {
        assert_eq!(last_anniversary(date(2026, 3, 3)), date(2026, 3, 3));
    }

    #[test]
    fn anniversary_is_last_year_before_march_third() {
        assert_eq!(last_anniversary(date(2026, 3, 2)), date(2025, 3, 3));
        assert_eq!(last_anniversary(date(2026, 1, 1)), date(2025, 3, 3));
        assert_eq!(last_anniversary(date(2024, 2, 29)), date(2023, 3, 3));
    }

    #[test]
    fn expiry_mirrors_the_elapsed_time() {
        let now = at(2026, 3, 13, 0);
        assert_eq!(expiry(now), at(2026, 3, 23, 0));
    }

    #[test]
    fn expiry_is_always_in_the_future() {
        for now in [at(2026, 3, 3, 0), at(2026, 3, 3, 12), at(2026, 1, 1, 5), at(2026, 12, 31, 23)] {
            assert!(expiry(now) > now, "{now}");
        }
        assert_eq!(expiry(at(2026, 3, 3, 0)), at(2026, 3, 4, 0));
    }

    #[test]
    fn expired_preference_falls_back_to_none() {
        let saved = StoredFilter::new(Filter::Sepia, at(2026, 3, 13, 0));
        assert_eq!(current(Some(&saved), at(2026, 3, 20, 0)), Filter::Sepia);
        assert_eq!(current(Some(&saved), at(2026, 3, 23, 0)), Filter::None);
        assert_eq!(current(None, at(2026, 3, 20, 0)), Filter::None);
    }

    #[test]
    fn round_trips_through_json_storage_format() {
        let saved = StoredFilter::new(Filter::Chrome, at(2026, 5, 1, 8));
        let text = serde_json::to_string(&saved).unwrap();
        assert!(text.contains("\"chrome\""));
        assert_eq!(serde_json::from_str::<StoredFilter>(&text).unwrap(), saved);
    }
}
