use crate::model::{TodoId, TodoList};
use chrono::NaiveDate;

/// Outcome of a day rollover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetEvent {
    pub day: NaiveDate,
    pub reset_ids: Vec<TodoId>,
}

impl ResetEvent {
    pub fn count(&self) -> usize {
        self.reset_ids.len()
    }

    /// Only a non-empty reset is worth telling the user about.
    pub fn message(&self) -> Option<String> {
        match self.count() {
            0 => None,
            1 => Some("New day! 1 daily task reset and ready to go".to_string()),
            n => Some(format!("New day! {} daily tasks reset and ready to go", n)),
        }
    }
}

/// Clears recurring todos once per calendar day. Skipped days collapse into
/// a single pass since each todo carries only one completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyResetEngine {
    last_reset_day: NaiveDate,
}

impl DailyResetEngine {
    pub fn new(last_reset_day: NaiveDate) -> Self {
        DailyResetEngine { last_reset_day }
    }

    pub fn last_reset_day(&self) -> NaiveDate {
        self.last_reset_day
    }

    /// Returns `None` on the same day, otherwise resets `todos` and reports
    /// what changed (possibly nothing).
    pub fn check(&mut self, today: NaiveDate, todos: &mut TodoList) -> Option<ResetEvent> {
        if today == self.last_reset_day {
            return None;
        }
        let reset_ids = todos.reset_daily();
        tracing::info!(
            from = %self.last_reset_day,
            to = %today,
            count = reset_ids.len(),
            "day rolled over"
        );
        self.last_reset_day = today;
        Some(ResetEvent {
            day: today,
            reset_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn same_day_is_a_noop() {
        let mut list = TodoList::new("alice");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let todo = list.add("Stretch", None, true, None, now).unwrap();
        list.toggle(&todo.id, now).unwrap();

        let mut engine = DailyResetEngine::new(day(1));
        assert_eq!(engine.check(day(1), &mut list), None);
        assert!(list.get(&todo.id).unwrap().completed);
    }

    #[test]
    fn rollover_resets_once() {
        let mut list = TodoList::new("alice");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let todo = list.add("Stretch", None, true, None, now).unwrap();
        list.toggle(&todo.id, now).unwrap();

        let mut engine = DailyResetEngine::new(day(1));
        let event = engine.check(day(4), &mut list).unwrap();
        assert_eq!(event.count(), 1);
        assert!(event.message().is_some());
        assert_eq!(engine.last_reset_day(), day(4));
        assert_eq!(engine.check(day(4), &mut list), None);
    }

    #[test]
    fn empty_rollover_is_silent() {
        let mut list = TodoList::new("alice");
        let mut engine = DailyResetEngine::new(day(1));
        let event = engine.check(day(2), &mut list).unwrap();
        assert_eq!(event.count(), 0);
        assert_eq!(event.message(), None);
    }
}
