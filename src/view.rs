use crate::model::{Filter, Priority, Todo, TodoList};
use crate::planner::{Month, MonthSummary, NotesGrid};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub daily: usize,
    pub overdue: usize,
    /// Counts of active todos only.
    pub active_by_priority: PriorityCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum View<'a> {
    Todos { visible: Vec<&'a Todo>, stats: Stats },
    Planner { month: Month, summary: MonthSummary },
}

pub fn stats(todos: &TodoList, now: DateTime<Utc>) -> Stats {
    let mut stats = Stats {
        total: todos.todos.len(),
        ..Stats::default()
    };
    for todo in &todos.todos {
        if todo.is_daily {
            stats.daily += 1;
        }
        if todo.completed {
            stats.completed += 1;
            continue;
        }
        if todo.is_overdue(now) {
            stats.overdue += 1;
        }
        match todo.priority {
            Priority::High => stats.active_by_priority.high += 1,
            Priority::Medium => stats.active_by_priority.medium += 1,
            Priority::Low => stats.active_by_priority.low += 1,
        }
    }
    stats.active = stats.total - stats.completed;
    stats
}

pub fn derive<'a>(
    todos: &'a TodoList,
    notes: &NotesGrid,
    filter: Filter,
    month: Month,
    now: DateTime<Utc>,
) -> View<'a> {
    match filter {
        Filter::Monthly => View::Planner {
            month,
            summary: notes.summary(month),
        },
        _ => View::Todos {
            visible: todos.list(filter),
            stats: stats(todos, now),
        },
    }
}
