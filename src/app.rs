use crate::clock::Clock;
use crate::model::{
    BulkAction, Criteria, Details, Filter, Priority, Todo, TodoError, TodoId, TodoList, UserId,
};
use crate::notify::NotificationSink;
use crate::planner::{Month, NotesGrid};
use crate::reset::{DailyResetEngine, ResetEvent};
use crate::scheduler::ReminderScheduler;
use crate::storage::UserDocument;
use crate::view::{self, View};
use chrono::{DateTime, Utc};

pub const RESET_TITLE: &str = "Daily Reset";

/// Everything one user's session mutates: the list, the notes grid, the
/// active filter and month, the day-rollover state and live reminders.
pub struct App<C: Clock, N: NotificationSink> {
    todos: TodoList,
    notes: NotesGrid,
    filter: Filter,
    month: Month,
    reset: DailyResetEngine,
    reminders: ReminderScheduler,
    /// Reminders due at or before this instant have been delivered.
    last_poll: Option<DateTime<Utc>>,
    clock: C,
    sink: N,
}

impl<C: Clock, N: NotificationSink> App<C, N> {
    pub fn new(owner: impl Into<UserId>, clock: C, sink: N) -> Self {
        let today = clock.today();
        App {
            todos: TodoList::new(owner),
            notes: NotesGrid::default(),
            filter: Filter::default(),
            month: Month::containing(today),
            reset: DailyResetEngine::new(today),
            reminders: ReminderScheduler::default(),
            last_poll: None,
            clock,
            sink,
        }
    }

    /// Restores a saved session. Reminders that came due since the
    /// document's last poll are re-armed and fire on the next poll; older
    /// ones stay silent. A document that was never polled only re-arms
    /// reminders still ahead. A document without a last reset day starts
    /// counting from today.
    pub fn from_document(doc: UserDocument, clock: C, sink: N) -> Self {
        let today = clock.today();
        let mut app = App {
            todos: doc.todos,
            notes: doc.notes,
            filter: doc.filter,
            month: doc.month.unwrap_or_else(|| Month::containing(today)),
            reset: DailyResetEngine::new(doc.last_reset_day.unwrap_or(today)),
            reminders: ReminderScheduler::default(),
            last_poll: doc.last_poll,
            clock,
            sink,
        };
        app.rearm_reminders(app.delivered_until());
        app
    }

    /// Takes over a document written by another invocation while keeping
    /// this session's delivery and rollover state. Reminders this session
    /// already fired stay fired, and a document saved before the latest
    /// rollover has its daily todos reset without a second notice.
    pub fn reload(&mut self, mut doc: UserDocument) {
        let today = self.clock.today();
        let ours = self.reset.last_reset_day();
        match doc.last_reset_day {
            Some(theirs) if theirs < ours => {
                let reset = doc.todos.reset_daily();
                tracing::debug!(count = reset.len(), "stale document reset on reload");
            }
            Some(theirs) => self.reset = DailyResetEngine::new(theirs),
            None => {}
        }
        self.last_poll = match (self.last_poll, doc.last_poll) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.todos = doc.todos;
        self.notes = doc.notes;
        self.filter = doc.filter;
        self.month = doc.month.unwrap_or_else(|| Month::containing(today));
        self.rearm_reminders(self.delivered_until());
        tracing::info!(pending = self.reminders.len(), "store reloaded");
    }

    pub fn to_document(&self) -> UserDocument {
        UserDocument {
            todos: self.todos.clone(),
            notes: self.notes.clone(),
            filter: self.filter,
            month: Some(self.month),
            last_reset_day: Some(self.reset.last_reset_day()),
            last_poll: self.last_poll,
        }
    }

    pub fn owner(&self) -> &str {
        &self.todos.owner
    }

    /// `add_with` with default details.
    #[cfg(test)]
    pub fn add(
        &mut self,
        text: &str,
        priority: Option<Priority>,
        is_daily: bool,
        reminder_time: Option<DateTime<Utc>>,
    ) -> Result<Todo, TodoError> {
        self.add_with(text, priority, is_daily, reminder_time, Details::default())
    }

    pub fn add_with(
        &mut self,
        text: &str,
        priority: Option<Priority>,
        is_daily: bool,
        reminder_time: Option<DateTime<Utc>>,
        details: Details,
    ) -> Result<Todo, TodoError> {
        let now = self.clock.now();
        let todo = self
            .todos
            .add_with(text, priority, is_daily, reminder_time, details, now)?;
        if let Some(at) = todo.reminder_time {
            self.reminders.schedule(&todo.id, at, todo.text.clone(), now);
        }
        tracing::debug!(todo = %todo.id, daily = todo.is_daily, "todo added");
        Ok(todo)
    }

    pub fn toggle(&mut self, id: &str) -> Result<Todo, TodoError> {
        let now = self.clock.now();
        let todo = self.todos.toggle(id, now)?;
        self.sync_reminder(&todo, now);
        tracing::debug!(todo = id, completed = todo.completed, "todo toggled");
        Ok(todo)
    }

    pub fn edit(&mut self, id: &str, new_text: &str) -> Result<Todo, TodoError> {
        let todo = self.todos.edit(id, new_text)?;
        if let Some(at) = self.reminders.fire_time(id) {
            self.reminders.cancel(id);
            self.reminders
                .schedule(id, at, todo.text.clone(), self.clock.now());
        }
        tracing::debug!(todo = id, "todo edited");
        Ok(todo)
    }

    /// Category, tags, due date and notes. Reminders are unaffected.
    pub fn update(&mut self, id: &str, details: Details) -> Result<Todo, TodoError> {
        let todo = self.todos.update(id, details)?;
        tracing::debug!(todo = id, "todo details updated");
        Ok(todo)
    }

    pub fn delete(&mut self, id: &str) -> Result<Todo, TodoError> {
        let todo = self.todos.delete(id)?;
        self.reminders.cancel(id);
        tracing::debug!(todo = id, "todo deleted");
        Ok(todo)
    }

    pub fn bulk(&mut self, action: BulkAction, ids: &[TodoId]) -> Result<usize, TodoError> {
        let now = self.clock.now();
        let changed = self.todos.bulk(action, ids, now)?;
        for todo in &changed {
            match action {
                BulkAction::Delete => self.reminders.cancel(&todo.id),
                _ => self.sync_reminder(todo, now),
            }
        }
        tracing::debug!(?action, count = changed.len(), "bulk operation applied");
        Ok(changed.len())
    }

    pub fn get(&self, id: &str) -> Result<&Todo, TodoError> {
        self.todos.get(id)
    }

    pub fn list(&self, filter: Filter) -> Vec<&Todo> {
        self.todos.list(filter)
    }

    pub fn query(&self, criteria: &Criteria) -> Vec<&Todo> {
        self.todos.query(criteria)
    }

    /// Runs the day-boundary check. A reset with at least one todo is also
    /// pushed to the notification sink.
    pub fn check_day(&mut self) -> Option<ResetEvent> {
        let today = self.clock.today();
        let event = self.reset.check(today, &mut self.todos)?;
        self.after_reset(&event);
        Some(event)
    }

    /// Resets recurring todos now, whatever the day. The rollover state is
    /// left alone, so the next day still gets its own reset.
    pub fn force_reset(&mut self) -> ResetEvent {
        let event = ResetEvent {
            day: self.clock.today(),
            reset_ids: self.todos.reset_daily(),
        };
        tracing::info!(count = event.count(), "daily todos reset on request");
        self.after_reset(&event);
        event
    }

    /// Resume hook: day check, then every reminder due by now.
    pub fn poll(&mut self) -> (Option<ResetEvent>, usize) {
        let reset = self.check_day();
        let now = self.clock.now();
        let fired = self.reminders.fire_due(now, &mut self.sink);
        self.last_poll = Some(now);
        (reset, fired)
    }

    /// Drops every live timer and re-arms open todos whose reminder falls
    /// after `cutoff`.
    fn rearm_reminders(&mut self, cutoff: DateTime<Utc>) {
        self.reminders.clear();
        for todo in self.todos.todos.iter().filter(|t| !t.completed) {
            if let Some(at) = todo.pending_reminder(cutoff) {
                self.reminders
                    .schedule(&todo.id, at, todo.text.clone(), cutoff);
            }
        }
        tracing::debug!(live = self.reminders.len(), %cutoff, "reminders re-armed");
    }

    fn delivered_until(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        self.last_poll.map_or(now, |at| at.min(now))
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.reminders.next_deadline()
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        if filter == Filter::Monthly {
            self.notes.touch(self.month);
        }
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn set_month(&mut self, month: Month) {
        self.month = month;
        self.notes.touch(month);
    }

    pub fn prev_month(&mut self) -> Month {
        self.set_month(self.month.prev());
        self.month
    }

    pub fn next_month(&mut self) -> Month {
        self.set_month(self.month.next());
        self.month
    }

    pub fn notes(&self) -> &NotesGrid {
        &self.notes
    }

    pub fn set_note(&mut self, month: Month, day: u32, text: &str) -> Result<(), TodoError> {
        self.notes.set_note(month, day, text)
    }

    /// Clears one day of the month currently shown.
    pub fn clear_note(&mut self, day: u32) -> Result<(), TodoError> {
        self.notes.clear_note(self.month, day)
    }

    pub fn clear_all_notes(&mut self, month: Month) {
        self.notes.clear_all_notes(month)
    }

    pub fn view(&self) -> View<'_> {
        self.view_with(self.filter)
    }

    /// View under `filter` without changing the saved one.
    pub fn view_with(&self, filter: Filter) -> View<'_> {
        view::derive(&self.todos, &self.notes, filter, self.month, self.clock.now())
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    fn after_reset(&mut self, event: &ResetEvent) {
        let now = self.clock.now();
        for id in &event.reset_ids {
            if let Ok(todo) = self.todos.get(id) {
                if let Some(at) = todo.pending_reminder(now) {
                    self.reminders.schedule(id, at, todo.text.clone(), now);
                }
            }
        }
        if let Some(message) = event.message() {
            self.sink.notify(RESET_TITLE, &message);
        }
    }

    fn sync_reminder(&mut self, todo: &Todo, now: DateTime<Utc>) {
        if todo.completed {
            self.reminders.cancel(&todo.id);
        } else if let Some(at) = todo.pending_reminder(now) {
            self.reminders.cancel(&todo.id);
            self.reminders.schedule(&todo.id, at, todo.text.clone(), now);
        }
    }
}
