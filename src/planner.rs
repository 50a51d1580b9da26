use crate::model::TodoError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A calendar month, 1-indexed (1 = January).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, TodoError> {
        if !(1..=12).contains(&month) {
            return Err(TodoError::Validation(format!("month out of range: {}", month)));
        }
        Ok(Month { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Month { year: self.year - 1, month: 12 }
        } else {
            Month { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Month { year: self.year + 1, month: 1 }
        } else {
            Month { year: self.year, month: self.month + 1 }
        }
    }

    pub fn days(self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn first_weekday(self) -> u32 {
        first_weekday_of_month(self.year, self.month)
    }

    fn key(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Number of days in `month` of `year`; 0 when `month` is not 1..=12.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return 0;
    }
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(31)
}

/// Weekday of the 1st, 0 = Sunday .. 6 = Saturday; 0 for an invalid month.
pub fn first_weekday_of_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSummary {
    pub planned: u32,
    pub free: u32,
    pub days: u32,
    pub percent_planned: u32,
}

/// Free-text notes per day, grouped by month. A month is filled with empty
/// entries for every day the first time it is touched.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct NotesGrid {
    #[serde(default)]
    months: BTreeMap<String, BTreeMap<u32, String>>,
}

impl NotesGrid {
    pub fn touch(&mut self, month: Month) -> &mut BTreeMap<u32, String> {
        self.months.entry(month.key()).or_insert_with(|| {
            (1..=month.days()).map(|day| (day, String::new())).collect()
        })
    }

    pub fn is_touched(&self, month: Month) -> bool {
        self.months.contains_key(&month.key())
    }

    pub fn set_note(&mut self, month: Month, day: u32, text: &str) -> Result<(), TodoError> {
        check_day(month, day)?;
        self.touch(month).insert(day, text.to_string());
        tracing::debug!(%month, day, "note set");
        Ok(())
    }

    pub fn note(&self, month: Month, day: u32) -> &str {
        self.months
            .get(&month.key())
            .and_then(|days| days.get(&day))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn clear_note(&mut self, month: Month, day: u32) -> Result<(), TodoError> {
        self.set_note(month, day, "")
    }

    pub fn clear_all_notes(&mut self, month: Month) {
        let days = self.touch(month);
        days.clear();
        days.extend((1..=month.days()).map(|day| (day, String::new())));
        tracing::debug!(%month, "all notes cleared");
    }

    /// Days in order with their note text, empty for untouched months.
    pub fn days(&self, month: Month) -> Vec<(u32, &str)> {
        (1..=month.days())
            .map(|day| (day, self.note(month, day)))
            .collect()
    }

    pub fn summary(&self, month: Month) -> MonthSummary {
        let days = month.days();
        let planned = self
            .months
            .get(&month.key())
            .map(|notes| notes.values().filter(|n| !n.trim().is_empty()).count() as u32)
            .unwrap_or(0);
        let percent_planned = if days == 0 {
            0
        } else {
            (f64::from(planned) / f64::from(days) * 100.0).round() as u32
        };
        MonthSummary {
            planned,
            free: days.saturating_sub(planned),
            days,
            percent_planned,
        }
    }
}

fn check_day(month: Month, day: u32) -> Result<(), TodoError> {
    if day == 0 || day > month.days() {
        return Err(TodoError::Validation(format!(
            "day {} is outside {} (1-{})",
            day,
            month,
            month.days()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, m: u32) -> Month {
        Month::new(year, m).unwrap()
    }

    #[test]
    fn february_follows_leap_rules() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
    }

    #[test]
    fn month_lengths_vary() {
        assert_eq!(days_in_month(2023, 1), 31);
        assert_eq!(days_in_month(2023, 4), 30);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 13), 0);
    }

    #[test]
    fn first_weekday_counts_from_sunday() {
        // 1 September 2024 was a Sunday, 1 March 2024 a Friday.
        assert_eq!(first_weekday_of_month(2024, 9), 0);
        assert_eq!(first_weekday_of_month(2024, 3), 5);
        assert_eq!(first_weekday_of_month(2023, 7), 6);
    }

    #[test]
    fn navigation_wraps_years() {
        assert_eq!(month(2024, 1).prev(), month(2023, 12));
        assert_eq!(month(2023, 12).next(), month(2024, 1));
        assert!(Month::new(2024, 0).is_err());
    }

    #[test]
    fn touching_fills_every_day() {
        let mut grid = NotesGrid::default();
        let feb = month(2024, 2);
        assert!(!grid.is_touched(feb));
        assert_eq!(grid.touch(feb).len(), 29);
        assert!(grid.days(feb).iter().all(|(_, n)| n.is_empty()));
    }

    #[test]
    fn set_note_rejects_days_outside_month() {
        let mut grid = NotesGrid::default();
        let feb = month(2023, 2);
        assert!(matches!(grid.set_note(feb, 29, "x"), Err(TodoError::Validation(_))));
        assert!(matches!(grid.set_note(feb, 0, "x"), Err(TodoError::Validation(_))));
        grid.set_note(feb, 28, "rent").unwrap();
        assert_eq!(grid.note(feb, 28), "rent");
    }

    #[test]
    fn clearing_keeps_entries() {
        let mut grid = NotesGrid::default();
        let june = month(2024, 6);
        grid.set_note(june, 3, "dentist").unwrap();
        grid.set_note(june, 4, "gym").unwrap();
        grid.clear_note(june, 3).unwrap();
        assert_eq!(grid.note(june, 3), "");
        assert_eq!(grid.note(june, 4), "gym");

        grid.clear_all_notes(june);
        assert_eq!(grid.touch(june).len(), 30);
        assert_eq!(grid.summary(june).planned, 0);
    }

    #[test]
    fn summary_rounds_percentage() {
        let mut grid = NotesGrid::default();
        let june = month(2024, 6);
        for day in 1..=10 {
            grid.set_note(june, day, "plan").unwrap();
        }
        grid.set_note(june, 11, "   ").unwrap();
        let summary = grid.summary(june);
        assert_eq!(summary.planned, 10);
        assert_eq!(summary.free, 20);
        assert_eq!(summary.percent_planned, 33);

        let untouched = grid.summary(month(2024, 7));
        assert_eq!(untouched.planned, 0);
        assert_eq!(untouched.free, 31);
        assert_eq!(untouched.percent_planned, 0);
    }
}
