// src/week_window.rs

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::fmt;

/// Returns the Monday on or before `date`, or `None` before the first
/// representable Monday.
pub fn start_of_week(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
}

/// Sunday closing the week that starts on `start`, or `None` past the end of the calendar.
pub fn end_of_week(start: NaiveDate) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::days(6))
}

pub fn is_week_start(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// Moves a week start by `weeks` (negative for earlier weeks). `None` when the
/// target leaves the calendar.
pub fn shift(start: NaiveDate, weeks: i64) -> Option<NaiveDate> {
    Duration::try_weeks(weeks).and_then(|delta| start.checked_add_signed(delta))
}

/// Closed range label, e.g. `Jan 6 - Jan 12, 2025` or `Dec 30, 2024 - Jan 5, 2025`.
pub fn display(start: NaiveDate) -> String {
    let end = end_of_week(start).unwrap_or(NaiveDate::MAX);
    if start.year() == end.year() {
        format!("{} - {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
    } else {
        format!(
            "{} - {}",
            start.format("%b %-d, %Y"),
            end.format("%b %-d, %Y")
        )
    }
}

/// A Monday-start payroll week. Only built for weeks whose Monday and Sunday
/// both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WeekWindow {
    start: NaiveDate,
}

impl WeekWindow {
    pub fn containing(date: NaiveDate) -> Option<Self> {
        let start = start_of_week(date)?;
        end_of_week(start)?;
        Some(Self { start })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        end_of_week(self.start).unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end()
    }

    pub fn shift(&self, weeks: i64) -> Option<Self> {
        shift(self.start, weeks).and_then(Self::containing)
    }

    pub fn display(&self) -> String {
        display(self.start)
    }
}

impl fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    #[test]
    fn start_of_week_is_monday_on_or_before() {
        assert_eq!(start_of_week(d("2025-01-06")), Some(d("2025-01-06"))); // Monday
        assert_eq!(start_of_week(d("2025-01-08")), Some(d("2025-01-06"))); // Wednesday
        assert_eq!(start_of_week(d("2025-01-12")), Some(d("2025-01-06"))); // Sunday
        assert_eq!(start_of_week(d("2025-01-01")), Some(d("2024-12-30"))); // crosses year
    }

    #[test]
    fn display_formats_closed_range() {
        assert_eq!(display(d("2025-01-06")), "Jan 6 - Jan 12, 2025");
        assert_eq!(display(d("2024-12-30")), "Dec 30, 2024 - Jan 5, 2025");
    }

    #[test]
    fn shift_moves_whole_weeks_both_ways() {
        let start = d("2025-01-06");
        assert_eq!(shift(start, 1), Some(d("2025-01-13")));
        assert_eq!(shift(start, -1), Some(d("2024-12-30")));
        assert_eq!(shift(start, 3).and_then(|later| shift(later, -3)), Some(start));
    }

    #[test]
    fn window_contains_its_seven_days_only() {
        let week = WeekWindow::containing(d("2025-01-09")).unwrap();
        assert!(is_week_start(week.start()));
        assert!(week.contains(d("2025-01-06")));
        assert!(week.contains(d("2025-01-12")));
        assert!(!week.contains(d("2025-01-13")));
        assert_eq!(week.to_string(), "Jan 6 - Jan 12, 2025");
    }

    #[test]
    fn arithmetic_past_the_calendar_edges_is_none() {
        assert_eq!(end_of_week(NaiveDate::MAX), None);
        if NaiveDate::MIN.weekday() != Weekday::Mon {
            assert_eq!(start_of_week(NaiveDate::MIN), None);
        }
        assert_eq!(shift(d("2025-01-06"), 100_000_000), None);
        assert_eq!(shift(d("2025-01-06"), i64::MIN), None);
        assert_eq!(WeekWindow::containing(NaiveDate::MAX), None);

        let week = WeekWindow::containing(d("2025-01-06")).unwrap();
        assert_eq!(week.shift(100_000_000), None);
        assert_eq!(week.shift(-100_000_000), None);
        assert!(!display(NaiveDate::MAX).is_empty());
    }
}
