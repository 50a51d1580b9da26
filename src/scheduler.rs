use crate::model::TodoId;
use crate::notify::NotificationSink;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

pub const REMINDER_TITLE: &str = "Todo Reminder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

/// One-shot timers driven by the caller's notion of "now".
pub trait TimerPort {
    fn arm(&mut self, at: DateTime<Utc>) -> TimerHandle;

    /// Returns false if the handle already fired or was disarmed.
    fn disarm(&mut self, handle: TimerHandle) -> bool;

    /// Removes and returns every timer due at or before `now`, earliest first.
    fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<TimerHandle>;

    fn next_deadline(&self) -> Option<DateTime<Utc>>;
}

/// In-process timer queue ordered by deadline, then by arming order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_handle: u64,
    pending: BTreeSet<(DateTime<Utc>, TimerHandle)>,
    deadlines: HashMap<TimerHandle, DateTime<Utc>>,
}

impl TimerPort for TimerQueue {
    fn arm(&mut self, at: DateTime<Utc>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert((at, handle));
        self.deadlines.insert(handle, at);
        handle
    }

    fn disarm(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle) {
            Some(at) => self.pending.remove(&(at, handle)),
            None => false,
        }
    }

    fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<TimerHandle> {
        let mut expired = Vec::new();
        loop {
            let Some(&(at, handle)) = self.pending.first() else {
                break;
            };
            if at > now {
                break;
            }
            self.pending.remove(&(at, handle));
            self.deadlines.remove(&handle);
            expired.push(handle);
        }
        expired
    }

    fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.first().map(|(at, _)| *at)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    handle: TimerHandle,
    fire_at: DateTime<Utc>,
    payload: String,
}

/// Live reminders, at most one per todo.
#[derive(Debug, Default)]
pub struct ReminderScheduler<T: TimerPort = TimerQueue> {
    timers: T,
    entries: HashMap<TodoId, Entry>,
}

impl<T: TimerPort> ReminderScheduler<T> {
    /// Arms a reminder for `id`. A fire time at or before `now` is dropped
    /// and `false` is returned; overdue reminders are never fired late.
    pub fn schedule(
        &mut self,
        id: &str,
        fire_at: DateTime<Utc>,
        payload: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if fire_at <= now {
            tracing::warn!(todo = id, %fire_at, "reminder time already passed, not scheduling");
            return false;
        }
        let handle = self.timers.arm(fire_at);
        let entry = Entry {
            handle,
            fire_at,
            payload: payload.into(),
        };
        if let Some(previous) = self.entries.insert(id.to_string(), entry) {
            self.timers.disarm(previous.handle);
        }
        tracing::debug!(todo = id, %fire_at, "reminder scheduled");
        true
    }

    pub fn cancel(&mut self, id: &str) {
        if let Some(entry) = self.entries.remove(id) {
            self.timers.disarm(entry.handle);
            tracing::debug!(todo = id, "reminder cancelled");
        }
    }

    /// Delivers every reminder due at `now` and forgets it.
    pub fn fire_due<S: NotificationSink>(&mut self, now: DateTime<Utc>, sink: &mut S) -> usize {
        let expired = self.timers.take_expired(now);
        let mut fired = 0;
        for handle in expired {
            let id = match self
                .entries
                .iter()
                .find(|(_, e)| e.handle == handle)
                .map(|(id, _)| id.clone())
            {
                Some(id) => id,
                None => continue,
            };
            if let Some(entry) = self.entries.remove(&id) {
                tracing::info!(todo = %id, fire_at = %entry.fire_at, "reminder fired");
                sink.notify(REMINDER_TITLE, &entry.payload);
                fired += 1;
            }
        }
        fired
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn fire_time(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(id).map(|e| e.fire_at)
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            self.timers.disarm(entry.handle);
        }
    }
}
