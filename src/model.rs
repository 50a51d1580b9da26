use chrono::{DateTime, Utc};
use clap::ValueEnum;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TodoId = String;
pub type UserId = String;

pub const MAX_TEXT_CHARS: usize = 200;
pub const MAX_CATEGORY_CHARS: usize = 50;
pub const MAX_TAG_CHARS: usize = 30;
pub const MAX_NOTES_CHARS: usize = 500;
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        })
    }
}

/// Which slice of the list is on screen. `Monthly` swaps the list for the
/// notes grid, so it selects no todos at all.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
    Monthly,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub is_daily: bool,
    #[serde(default)]
    pub reminder_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

/// Secondary fields. `None` leaves the current value alone; for `due_date`
/// `Some(None)` clears it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Details {
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub notes: Option<String>,
}

impl Details {
    fn validated(self) -> Result<Details, TodoError> {
        let category = match self.category {
            Some(c) => {
                let c = c.trim();
                if c.chars().count() > MAX_CATEGORY_CHARS {
                    return Err(TodoError::Validation(format!(
                        "category cannot exceed {} characters",
                        MAX_CATEGORY_CHARS
                    )));
                }
                Some(if c.is_empty() { DEFAULT_CATEGORY.to_string() } else { c.to_string() })
            }
            None => None,
        };
        let tags = match self.tags {
            Some(tags) => {
                let mut cleaned: Vec<String> = Vec::new();
                for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                    if tag.chars().count() > MAX_TAG_CHARS {
                        return Err(TodoError::Validation(format!(
                            "tag cannot exceed {} characters: {}",
                            MAX_TAG_CHARS, tag
                        )));
                    }
                    if !cleaned.iter().any(|t| t == tag) {
                        cleaned.push(tag.to_string());
                    }
                }
                Some(cleaned)
            }
            None => None,
        };
        let notes = match self.notes {
            Some(n) => {
                let n = n.trim();
                if n.chars().count() > MAX_NOTES_CHARS {
                    return Err(TodoError::Validation(format!(
                        "notes cannot exceed {} characters",
                        MAX_NOTES_CHARS
                    )));
                }
                Some(n.to_string())
            }
            None => None,
        };
        Ok(Details {
            category,
            tags,
            due_date: self.due_date,
            notes,
        })
    }

    fn apply(self, todo: &mut Todo) {
        if let Some(category) = self.category {
            todo.category = category;
        }
        if let Some(tags) = self.tags {
            todo.tags = tags;
        }
        if let Some(due) = self.due_date {
            todo.due_date = due;
        }
        if let Some(notes) = self.notes {
            todo.notes = notes;
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TodoError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("todo not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BulkAction {
    Complete,
    Uncomplete,
    Delete,
}

/// Conjunctive query over the list; unset fields match everything.
#[derive(Debug, Default, Clone)]
pub struct Criteria {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub is_daily: Option<bool>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl Criteria {
    fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |c| todo.completed == c)
            && self.priority.map_or(true, |p| todo.priority == p)
            && self.is_daily.map_or(true, |d| todo.is_daily == d)
            && self
                .category
                .as_deref()
                .map_or(true, |c| todo.category.eq_ignore_ascii_case(c.trim()))
            && self
                .tag
                .as_deref()
                .map_or(true, |tag| todo.tags.iter().any(|t| t == tag.trim()))
    }
}

/// One user's todos, newest first.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TodoList {
    pub owner: UserId,
    #[serde(default)]
    pub todos: Vec<Todo>,
}

impl Todo {
    fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if self.completed == completed {
            return;
        }
        self.completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    /// Open and past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.map_or(false, |due| now > due)
    }

    /// Stored reminder that has not passed yet, if any.
    pub fn pending_reminder(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.reminder_time.filter(|at| *at > now)
    }
}

impl TodoList {
    pub fn new(owner: impl Into<UserId>) -> Self {
        TodoList {
            owner: owner.into(),
            todos: Vec::new(),
        }
    }

    /// `add_with` with default details.
    #[cfg(test)]
    pub fn add(
        &mut self,
        text: &str,
        priority: Option<Priority>,
        is_daily: bool,
        reminder_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Todo, TodoError> {
        self.add_with(text, priority, is_daily, reminder_time, Details::default(), now)
    }

    pub fn add_with(
        &mut self,
        text: &str,
        priority: Option<Priority>,
        is_daily: bool,
        reminder_time: Option<DateTime<Utc>>,
        details: Details,
        now: DateTime<Utc>,
    ) -> Result<Todo, TodoError> {
        let text = validate_text(text)?;
        let details = details.validated()?;
        if let Some(at) = reminder_time {
            if at <= now {
                return Err(TodoError::Validation(
                    "reminder time must be in the future".into(),
                ));
            }
        }
        let mut todo = Todo {
            id: self.fresh_id(),
            text,
            completed: false,
            priority: priority.unwrap_or_default(),
            is_daily,
            reminder_time,
            created_at: now,
            completed_at: None,
            category: default_category(),
            tags: Vec::new(),
            due_date: None,
            notes: String::new(),
        };
        details.apply(&mut todo);
        self.todos.insert(0, todo.clone());
        Ok(todo)
    }

    pub fn get(&self, id: &str) -> Result<&Todo, TodoError> {
        self.todos
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))
    }

    pub fn toggle(&mut self, id: &str, now: DateTime<Utc>) -> Result<Todo, TodoError> {
        let todo = self.get_mut(id)?;
        let completed = !todo.completed;
        todo.set_completed(completed, now);
        Ok(todo.clone())
    }

    pub fn edit(&mut self, id: &str, new_text: &str) -> Result<Todo, TodoError> {
        let text = validate_text(new_text)?;
        let todo = self.get_mut(id)?;
        todo.text = text;
        Ok(todo.clone())
    }

    /// Changes secondary fields only; text, reminder and recurrence stay.
    pub fn update(&mut self, id: &str, details: Details) -> Result<Todo, TodoError> {
        let details = details.validated()?;
        let todo = self.get_mut(id)?;
        details.apply(todo);
        Ok(todo.clone())
    }

    pub fn delete(&mut self, id: &str) -> Result<Todo, TodoError> {
        let idx = self
            .todos
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        Ok(self.todos.remove(idx))
    }

    pub fn list(&self, filter: Filter) -> Vec<&Todo> {
        match filter {
            Filter::All => self.todos.iter().collect(),
            Filter::Active => self.todos.iter().filter(|t| !t.completed).collect(),
            Filter::Completed => self.todos.iter().filter(|t| t.completed).collect(),
            Filter::Monthly => Vec::new(),
        }
    }

    pub fn query(&self, criteria: &Criteria) -> Vec<&Todo> {
        self.todos.iter().filter(|t| criteria.matches(t)).collect()
    }

    /// Clears completion on every finished recurring todo and returns their ids.
    pub fn reset_daily(&mut self) -> Vec<TodoId> {
        let mut reset = Vec::new();
        for todo in self.todos.iter_mut().filter(|t| t.is_daily && t.completed) {
            todo.completed = false;
            todo.completed_at = None;
            reset.push(todo.id.clone());
        }
        reset
    }

    /// Applies `action` to every listed id in scope. Unknown ids are skipped
    /// and records already in the target state are not counted.
    pub fn bulk(
        &mut self,
        action: BulkAction,
        ids: &[TodoId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Todo>, TodoError> {
        if ids.is_empty() {
            return Err(TodoError::Validation("no todo ids given".into()));
        }
        let mut changed = Vec::new();
        match action {
            BulkAction::Delete => {
                self.todos.retain(|t| {
                    if ids.contains(&t.id) {
                        changed.push(t.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            BulkAction::Complete | BulkAction::Uncomplete => {
                let target = action == BulkAction::Complete;
                for todo in self.todos.iter_mut() {
                    if ids.contains(&todo.id) && todo.completed != target {
                        todo.set_completed(target, now);
                        changed.push(todo.clone());
                    }
                }
            }
        }
        Ok(changed)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Todo, TodoError> {
        self.todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))
    }

    fn fresh_id(&self) -> TodoId {
        loop {
            let id = generate_id();
            if self.todos.iter().all(|t| t.id != id) {
                return id;
            }
        }
    }
}

fn validate_text(text: &str) -> Result<String, TodoError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TodoError::Validation("todo text is required".into()));
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(TodoError::Validation(format!(
            "todo text cannot exceed {} characters",
            MAX_TEXT_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

fn generate_id() -> TodoId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn add_trims_and_inserts_newest_first() {
        let mut list = TodoList::new("alice");
        let first = list.add("  Buy milk  ", None, false, None, now()).unwrap();
        let second = list
            .add("Walk dog", Some(Priority::High), true, None, now())
            .unwrap();

        assert_eq!(first.text, "Buy milk");
        assert_eq!(first.priority, Priority::Medium);
        let all = list.list(Filter::All);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all.iter().filter(|t| t.text == "Buy milk").count(), 1);
    }

    #[test]
    fn add_rejects_bad_text() {
        let mut list = TodoList::new("alice");
        assert!(matches!(
            list.add("   ", None, false, None, now()),
            Err(TodoError::Validation(_))
        ));
        let long = "x".repeat(MAX_TEXT_CHARS + 1);
        assert!(matches!(
            list.add(&long, None, false, None, now()),
            Err(TodoError::Validation(_))
        ));
        let exact = "é".repeat(MAX_TEXT_CHARS);
        assert!(list.add(&exact, None, false, None, now()).is_ok());
    }

    #[test]
    fn add_rejects_reminder_not_in_future() {
        let mut list = TodoList::new("alice");
        let err = list
            .add("Call mom", None, false, Some(now()), now())
            .unwrap_err();
        assert!(matches!(err, TodoError::Validation(_)));
        assert!(list.todos.is_empty());
        assert!(list
            .add("Call mom", None, false, Some(now() + Duration::seconds(1)), now())
            .is_ok());
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut list = TodoList::new("alice");
        let todo = list.add("Read", None, false, None, now()).unwrap();

        let done = list.toggle(&todo.id, now()).unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now()));

        let undone = list.toggle(&todo.id, now()).unwrap();
        assert!(!undone.completed);
        assert_eq!(undone.completed_at, None);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let mut list = TodoList::new("alice");
        assert_eq!(
            list.toggle("nope", now()),
            Err(TodoError::NotFound("nope".into()))
        );
        assert!(matches!(list.edit("nope", "x"), Err(TodoError::NotFound(_))));
        assert!(matches!(list.delete("nope"), Err(TodoError::NotFound(_))));
    }

    #[test]
    fn edit_validates_before_lookup() {
        let mut list = TodoList::new("alice");
        let todo = list.add("Old", None, true, None, now()).unwrap();
        assert!(matches!(
            list.edit(&todo.id, "  "),
            Err(TodoError::Validation(_))
        ));
        let edited = list.edit(&todo.id, " New ").unwrap();
        assert_eq!(edited.text, "New");
        assert!(edited.is_daily);
    }

    #[test]
    fn reset_daily_is_idempotent() {
        let mut list = TodoList::new("alice");
        let daily = list.add("Workout", None, true, None, now()).unwrap();
        let once = list.add("Taxes", None, false, None, now()).unwrap();
        list.toggle(&daily.id, now()).unwrap();
        list.toggle(&once.id, now()).unwrap();

        assert_eq!(list.reset_daily(), vec![daily.id.clone()]);
        assert!(list.reset_daily().is_empty());
        assert!(!list.get(&daily.id).unwrap().completed);
        assert!(list.get(&once.id).unwrap().completed);
    }

    #[test]
    fn active_and_completed_partition_all() {
        let mut list = TodoList::new("alice");
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(list.add(&format!("task {i}"), None, i % 2 == 0, None, now()).unwrap().id);
        }
        list.toggle(&ids[1], now()).unwrap();
        list.toggle(&ids[4], now()).unwrap();
        list.delete(&ids[2]).unwrap();

        let all: Vec<_> = list.list(Filter::All).iter().map(|t| t.id.clone()).collect();
        let active: Vec<_> = list.list(Filter::Active).iter().map(|t| t.id.clone()).collect();
        let completed: Vec<_> = list
            .list(Filter::Completed)
            .iter()
            .map(|t| t.id.clone())
            .collect();

        assert_eq!(active.len() + completed.len(), all.len());
        for id in &all {
            assert!(active.contains(id) != completed.contains(id));
        }
        let mut merged: Vec<_> = all
            .iter()
            .filter(|id| active.contains(id))
            .cloned()
            .collect();
        assert_eq!(merged, active);
        merged = all
            .iter()
            .filter(|id| completed.contains(id))
            .cloned()
            .collect();
        assert_eq!(merged, completed);
        assert!(list.list(Filter::Monthly).is_empty());
    }

    #[test]
    fn bulk_skips_unknown_and_unchanged() {
        let mut list = TodoList::new("alice");
        let a = list.add("a", None, false, None, now()).unwrap();
        let b = list.add("b", None, false, None, now()).unwrap();
        list.toggle(&a.id, now()).unwrap();

        let ids = vec![a.id.clone(), b.id.clone(), "ghost".to_string()];
        let changed = list.bulk(BulkAction::Complete, &ids, now()).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, b.id);

        let removed = list.bulk(BulkAction::Delete, &ids, now()).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(list.todos.is_empty());
        assert!(matches!(
            list.bulk(BulkAction::Uncomplete, &[], now()),
            Err(TodoError::Validation(_))
        ));
    }

    #[test]
    fn details_are_validated_and_applied() {
        let mut list = TodoList::new("alice");
        let plain = list.add("Plain", None, false, None, now()).unwrap();
        assert_eq!(plain.category, DEFAULT_CATEGORY);
        assert!(plain.tags.is_empty());

        let due = now() + Duration::days(2);
        let todo = list
            .add_with(
                "File taxes",
                None,
                false,
                None,
                Details {
                    category: Some(" finance ".into()),
                    tags: Some(vec!["irs".into(), " ".into(), "irs".into(), "paper".into()]),
                    due_date: Some(Some(due)),
                    notes: Some("bring receipts".into()),
                },
                now(),
            )
            .unwrap();
        assert_eq!(todo.category, "finance");
        assert_eq!(todo.tags, vec!["irs".to_string(), "paper".to_string()]);
        assert_eq!(todo.due_date, Some(due));
        assert_eq!(todo.notes, "bring receipts");

        let too_long = Details {
            tags: Some(vec!["t".repeat(MAX_TAG_CHARS + 1)]),
            ..Details::default()
        };
        assert!(matches!(
            list.update(&todo.id, too_long),
            Err(TodoError::Validation(_))
        ));
        for bad in [
            Details {
                category: Some("c".repeat(MAX_CATEGORY_CHARS + 1)),
                ..Details::default()
            },
            Details {
                notes: Some("n".repeat(MAX_NOTES_CHARS + 1)),
                ..Details::default()
            },
        ] {
            assert!(matches!(
                list.add_with("x", None, false, None, bad, now()),
                Err(TodoError::Validation(_))
            ));
        }
    }

    #[test]
    fn update_leaves_text_and_reminder_alone() {
        let mut list = TodoList::new("alice");
        let at = now() + Duration::hours(1);
        let todo = list.add("Call mom", None, true, Some(at), now()).unwrap();
        let updated = list
            .update(
                &todo.id,
                Details {
                    category: Some(String::new()),
                    due_date: Some(Some(now())),
                    ..Details::default()
                },
            )
            .unwrap();
        assert_eq!(updated.text, "Call mom");
        assert_eq!(updated.reminder_time, Some(at));
        assert!(updated.is_daily);
        assert_eq!(updated.category, DEFAULT_CATEGORY);

        let cleared = list
            .update(
                &todo.id,
                Details {
                    due_date: Some(None),
                    ..Details::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.due_date, None);
        assert!(matches!(
            list.update("nope", Details::default()),
            Err(TodoError::NotFound(_))
        ));
    }

    #[test]
    fn overdue_needs_open_todo_past_due() {
        let mut list = TodoList::new("alice");
        let details = Details {
            due_date: Some(Some(now())),
            ..Details::default()
        };
        let todo = list
            .add_with("Renew passport", None, false, None, details, now())
            .unwrap();
        assert!(!todo.is_overdue(now()));
        let later = now() + Duration::minutes(1);
        assert!(todo.is_overdue(later));
        let done = list.toggle(&todo.id, later).unwrap();
        assert!(!done.is_overdue(later));
    }

    #[test]
    fn query_filters_by_category_and_tag() {
        let mut list = TodoList::new("alice");
        list.add_with(
            "a",
            None,
            false,
            None,
            Details {
                category: Some("Work".into()),
                tags: Some(vec!["urgent".into()]),
                ..Details::default()
            },
            now(),
        )
        .unwrap();
        list.add("b", None, false, None, now()).unwrap();

        let work = list.query(&Criteria {
            category: Some("work".into()),
            ..Criteria::default()
        });
        assert_eq!(work.len(), 1);
        let general = list.query(&Criteria {
            category: Some(DEFAULT_CATEGORY.into()),
            ..Criteria::default()
        });
        assert_eq!(general[0].text, "b");
        let urgent = list.query(&Criteria {
            tag: Some("urgent".into()),
            ..Criteria::default()
        });
        assert_eq!(urgent[0].text, "a");
    }

    #[test]
    fn query_combines_criteria() {
        let mut list = TodoList::new("alice");
        list.add("a", Some(Priority::High), true, None, now()).unwrap();
        list.add("b", Some(Priority::High), false, None, now()).unwrap();
        list.add("c", Some(Priority::Low), true, None, now()).unwrap();

        let hits = list.query(&Criteria {
            priority: Some(Priority::High),
            is_daily: Some(true),
            ..Criteria::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "a");
        assert_eq!(list.query(&Criteria::default()).len(), 3);
    }
}
