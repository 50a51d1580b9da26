use crate::app::App;
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::model::{BulkAction, Criteria, Details, Filter, Priority, Todo};
use crate::notify::{Gate, NotificationSink, TerminalSink};
use crate::planner::Month;
use crate::storage::{
    init_project_store, load_document, locate_store, save_document, StoreLocation, StoreScope,
};
use crate::view::View;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use std::env;
use std::fs;
use std::thread;
use std::time::SystemTime;

type Session = App<SystemClock, Gate<TerminalSink>>;

/// Resolved settings and owner shared by every command.
pub struct Invocation {
    pub settings: Settings,
    pub user: String,
}

/// Secondary todo fields as given on the command line.
#[derive(Debug, Default)]
pub struct DetailArgs {
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub clear_tags: bool,
    pub due: Option<String>,
    pub clear_due: bool,
    pub notes: Option<String>,
}

impl DetailArgs {
    fn into_details(self) -> Result<Details> {
        let tags = if self.clear_tags {
            Some(Vec::new())
        } else if self.tags.is_empty() {
            None
        } else {
            Some(self.tags)
        };
        let due_date = match (self.due, self.clear_due) {
            (Some(raw), _) => Some(Some(parse_local_time(&raw)?)),
            (None, true) => Some(None),
            (None, false) => None,
        };
        Ok(Details {
            category: self.category,
            tags,
            due_date,
            notes: self.notes,
        })
    }
}

pub fn init(ctx: &Invocation) -> Result<()> {
    let location = init_project_store(&ctx.user)?;
    println!("Initialized todo store at {}", location.path.display());
    Ok(())
}

/// `filter` applies to this listing only; the saved filter is untouched.
pub fn list(ctx: &Invocation, filter: Option<Filter>, criteria: Criteria) -> Result<()> {
    let (app, location) = open_session(ctx)?;
    println!(
        "Todos for {} ({})",
        app.owner(),
        match location.scope {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    );
    match app.view_with(filter.unwrap_or(app.filter())) {
        View::Planner { month, .. } => print_month(&app, month),
        View::Todos { visible, .. } => {
            let matching = app.query(&criteria);
            let shown: Vec<&Todo> = visible
                .into_iter()
                .filter(|t| matching.iter().any(|m| m.id == t.id))
                .collect();
            if shown.is_empty() {
                println!("  (empty)");
            }
            let now = Utc::now();
            for todo in shown {
                print_todo(todo, now);
            }
        }
    }
    Ok(())
}

pub fn add(
    ctx: &Invocation,
    text: String,
    priority: Option<Priority>,
    daily: bool,
    remind: Option<String>,
    remind_in: Option<i64>,
    details: DetailArgs,
) -> Result<()> {
    let reminder = match (remind, remind_in) {
        (Some(raw), _) => Some(parse_local_time(&raw)?),
        (None, Some(minutes)) => Some(reminder_in(Utc::now(), minutes)?),
        (None, None) => None,
    };
    let details = details.into_details()?;
    let (mut app, location) = open_session(ctx)?;
    let todo = app
        .add_with(
            &text,
            Some(priority.unwrap_or(ctx.settings.default_priority)),
            daily,
            reminder,
            details,
        )
        .context("adding todo")?;
    close_session(&app, &location)?;
    println!("Added todo {}", todo.id);
    if todo.is_daily {
        println!("  resets every day");
    }
    if let Some(at) = todo.reminder_time {
        println!("  reminder set for {}", format_time(&at));
    }
    if let Some(due) = todo.due_date {
        println!("  due {}", format_time(&due));
    }
    Ok(())
}

pub fn toggle(ctx: &Invocation, id: String) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    let todo = app
        .toggle(&id)
        .with_context(|| format!("toggling todo {}", id))?;
    close_session(&app, &location)?;
    println!(
        "Todo {} marked as {}",
        todo.id,
        if todo.completed { "completed" } else { "active" }
    );
    Ok(())
}

pub fn edit(ctx: &Invocation, id: String, text: String) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    app.edit(&id, &text)
        .with_context(|| format!("editing todo {}", id))?;
    close_session(&app, &location)?;
    println!("Updated todo {}", id);
    Ok(())
}

pub fn update(ctx: &Invocation, id: String, details: DetailArgs) -> Result<()> {
    let details = details.into_details()?;
    let (mut app, location) = open_session(ctx)?;
    let todo = app
        .update(&id, details)
        .with_context(|| format!("updating todo {}", id))?;
    close_session(&app, &location)?;
    println!("Updated todo {}", todo.id);
    print_todo(&todo, Utc::now());
    Ok(())
}

pub fn delete(ctx: &Invocation, id: String) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    app.delete(&id)
        .with_context(|| format!("deleting todo {}", id))?;
    close_session(&app, &location)?;
    println!("Deleted todo {}", id);
    Ok(())
}

pub fn bulk(ctx: &Invocation, action: BulkAction, ids: Vec<String>) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    let count = app.bulk(action, &ids).context("bulk operation")?;
    close_session(&app, &location)?;
    println!("Bulk {:?} changed {} todo(s)", action, count);
    Ok(())
}

pub fn stats(ctx: &Invocation) -> Result<()> {
    let (app, _) = open_session(ctx)?;
    match app.view() {
        View::Planner { month, summary } => {
            println!("{}", month);
            println!("  days planned: {}", summary.planned);
            println!("  days free:    {}", summary.free);
            println!("  planned:      {}%", summary.percent_planned);
        }
        View::Todos { stats, .. } => {
            println!("  total:     {}", stats.total);
            println!("  active:    {}", stats.active);
            println!("  completed: {}", stats.completed);
            println!("  daily:     {}", stats.daily);
            println!("  overdue:   {}", stats.overdue);
            println!(
                "  active by priority: high {}, medium {}, low {}",
                stats.active_by_priority.high,
                stats.active_by_priority.medium,
                stats.active_by_priority.low
            );
        }
    }
    Ok(())
}

pub fn reset(ctx: &Invocation) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    let event = app.force_reset();
    close_session(&app, &location)?;
    println!("Reset {} daily todo(s) on {}", event.count(), event.day);
    Ok(())
}

pub fn filter(ctx: &Invocation, filter: Filter) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    app.set_filter(filter);
    close_session(&app, &location)?;
    println!("Filter set to {:?}", filter);
    Ok(())
}

pub fn note_show(ctx: &Invocation, month: Option<String>) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    if let Some(raw) = month {
        app.set_month(parse_month(&raw)?);
    }
    print_month(&app, app.month());
    close_session(&app, &location)
}

pub fn note_set(ctx: &Invocation, day: u32, text: String, month: Option<String>) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    let month = match month {
        Some(raw) => parse_month(&raw)?,
        None => app.month(),
    };
    app.set_note(month, day, &text)
        .with_context(|| format!("setting note for {} day {}", month, day))?;
    close_session(&app, &location)?;
    println!("Saved note for {} day {}", month, day);
    Ok(())
}

pub fn note_clear(ctx: &Invocation, day: u32) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    app.clear_note(day)
        .with_context(|| format!("clearing note for day {}", day))?;
    close_session(&app, &location)?;
    println!("Cleared note for day {}", day);
    Ok(())
}

pub fn note_clear_all(ctx: &Invocation, month: Option<String>) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    let month = match month {
        Some(raw) => parse_month(&raw)?,
        None => app.month(),
    };
    app.clear_all_notes(month);
    close_session(&app, &location)?;
    println!("Cleared all notes for {}", month);
    Ok(())
}

pub fn note_step(ctx: &Invocation, forward: bool) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    let month = if forward {
        app.next_month()
    } else {
        app.prev_month()
    };
    print_month(&app, month);
    close_session(&app, &location)
}

/// Cooperative loop: each pass runs the day check and fires due reminders,
/// then sleeps until the next deadline or the poll interval. Edits made by
/// other invocations are picked up when the store file changes.
pub fn watch(ctx: &Invocation) -> Result<()> {
    let (mut app, location) = open_session(ctx)?;
    close_session(&app, &location)?;
    let mut seen = modified(&location);
    println!(
        "Watching todos for {} ({} reminder(s) pending, Ctrl-C to stop)",
        app.owner(),
        app.reminders().len()
    );
    loop {
        watch_pass(&mut app, &location, &ctx.user, &mut seen)?;
        let interval = ctx.settings.poll_interval();
        let nap = app
            .next_deadline()
            .map(|at| (at - SystemClock.now()).to_std().unwrap_or_default())
            .map_or(interval, |until| until.min(interval));
        thread::sleep(nap);
    }
}

/// One watch iteration. The store is re-read before saving when another
/// invocation wrote it during the pass, so its edits are merged rather
/// than overwritten.
fn watch_pass<C: Clock, N: NotificationSink>(
    app: &mut App<C, N>,
    location: &StoreLocation,
    user: &str,
    seen: &mut Option<SystemTime>,
) -> Result<()> {
    let current = modified(location);
    if current != *seen {
        app.reload(load_document(location, user)?);
        *seen = current;
    }
    let (reset, fired) = app.poll();
    if reset.is_some() || fired > 0 {
        if modified(location) != *seen {
            app.reload(load_document(location, user)?);
            app.poll();
        }
        save_document(location, &app.to_document())?;
        *seen = modified(location);
    }
    Ok(())
}

/// Loads the user's store and runs the resume check, so a day that rolled
/// over since the last command resets before anything else happens.
fn open_session(ctx: &Invocation) -> Result<(Session, StoreLocation)> {
    let cwd = env::current_dir()?;
    let location = locate_store(&cwd, &ctx.user)?;
    let doc = load_document(&location, &ctx.user)?;
    let sink = Gate::new(TerminalSink, ctx.settings.notifications);
    let mut app = App::from_document(doc, SystemClock, sink);
    resume(&mut app, &location)?;
    Ok((app, location))
}

/// Polls and, when a reset ran or a reminder fired, saves at once so a
/// command that fails afterwards cannot replay the notice.
fn resume<C: Clock, N: NotificationSink>(
    app: &mut App<C, N>,
    location: &StoreLocation,
) -> Result<bool> {
    let (reset, fired) = app.poll();
    let changed = reset.is_some() || fired > 0;
    if changed {
        save_document(location, &app.to_document())?;
    }
    Ok(changed)
}

fn close_session(app: &Session, location: &StoreLocation) -> Result<()> {
    save_document(location, &app.to_document())
}

fn modified(location: &StoreLocation) -> Option<SystemTime> {
    fs::metadata(&location.path)
        .and_then(|m| m.modified())
        .ok()
}

fn parse_local_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, "%Y.%m.%d@%H:%M")
        .map_err(|_| anyhow!("invalid date format (use YYYY.MM.DD@hh:mm): {}", raw))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("{} does not exist in the local time zone", raw))?;
    Ok(local.with_timezone(&Utc))
}

fn reminder_in(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>> {
    Duration::try_minutes(minutes)
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| anyhow!("reminder {} minutes from now is out of range", minutes))
}

fn parse_month(raw: &str) -> Result<Month> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("invalid month (use YYYY-MM): {}", raw))?;
    let year: i32 = year
        .parse()
        .with_context(|| format!("invalid year in {}", raw))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("invalid month in {}", raw))?;
    Ok(Month::new(year, month)?)
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y.%m.%d@%H:%M").to_string()
}

fn print_todo(todo: &Todo, now: DateTime<Utc>) {
    let mark = if todo.completed { "x" } else { " " };
    println!(
        "  [{}] {}: {} ({}, {})",
        mark, todo.id, todo.text, todo.priority, todo.category
    );
    if todo.is_daily {
        println!("      resets daily");
    }
    if !todo.tags.is_empty() {
        println!("      tags: {}", todo.tags.join(", "));
    }
    if let Some(due) = todo.due_date {
        let late = if todo.is_overdue(now) { " (overdue)" } else { "" };
        println!("      due: {}{}", format_time(&due), late);
    }
    if !todo.notes.is_empty() {
        println!("      notes: {}", todo.notes);
    }
    if !todo.completed {
        if let Some(at) = todo.pending_reminder(now) {
            println!("      reminder: {}", format_time(&at));
        }
    }
}

fn print_month(app: &Session, month: Month) {
    println!("{}", month);
    println!("  Su Mo Tu We Th Fr Sa");
    let mut line = String::from(" ");
    for _ in 0..month.first_weekday() {
        line.push_str("   ");
    }
    let mut column = month.first_weekday();
    for (day, note) in app.notes().days(month) {
        let marker = if note.trim().is_empty() { ' ' } else { '*' };
        line.push_str(&format!("{:>2}{}", day, marker));
        column += 1;
        if column == 7 {
            println!("{}", line.trim_end());
            line = String::from(" ");
            column = 0;
        }
    }
    if column != 0 {
        println!("{}", line.trim_end());
    }
    let notes: Vec<_> = app
        .notes()
        .days(month)
        .into_iter()
        .filter(|(_, n)| !n.trim().is_empty())
        .collect();
    if notes.is_empty() {
        println!("  (no notes)");
    }
    for (day, note) in notes {
        println!("  {:>2}: {}", day, note);
    }
}
