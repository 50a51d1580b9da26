use crate::model::{BulkAction, Filter, Priority};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dailytodo", version, about = "Todo list with daily tasks, reminders and a monthly planner")]
pub struct Cli {
    /// Whose list to use (defaults to DAILYTODO_USER, the settings file, then the login name)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a project-local todo store in the current directory
    Init,
    /// Show todos, or the planner when the monthly filter is active
    List {
        /// Filter for this listing only (defaults to the saved filter)
        #[arg(long, value_enum)]
        filter: Option<Filter>,
        /// Only todos in this category
        #[arg(long)]
        category: Option<String>,
        /// Only todos carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only todos with this priority
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Only daily todos
        #[arg(long, conflicts_with = "not_daily")]
        daily: bool,
        /// Only one-off todos
        #[arg(long)]
        not_daily: bool,
    },
    /// Add a new todo
    Add {
        /// Todo text (up to 200 characters)
        text: String,
        #[arg(long, short = 'p', value_enum)]
        priority: Option<Priority>,
        /// Reset this todo every day
        #[arg(long)]
        daily: bool,
        /// Reminder in local time, YYYY.MM.DD@hh:mm
        #[arg(long, conflicts_with = "remind_in")]
        remind: Option<String>,
        /// Reminder this many minutes from now
        #[arg(long)]
        remind_in: Option<i64>,
        /// Category (defaults to "general")
        #[arg(long)]
        category: Option<String>,
        /// Tag (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        /// Due date in local time, YYYY.MM.DD@hh:mm
        #[arg(long)]
        due: Option<String>,
        /// Free-form notes (up to 500 characters)
        #[arg(long)]
        notes: Option<String>,
    },
    /// Flip a todo between active and completed
    Toggle { id: String },
    /// Replace a todo's text
    Edit { id: String, text: String },
    /// Change a todo's category, tags, due date or notes
    Update {
        id: String,
        #[arg(long)]
        category: Option<String>,
        /// Replace tags (repeatable)
        #[arg(long = "tag", short = 't', conflicts_with = "clear_tags")]
        tags: Vec<String>,
        /// Clear existing tags
        #[arg(long)]
        clear_tags: bool,
        /// Set due date (YYYY.MM.DD@hh:mm)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Clear due date
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a todo
    Delete { id: String },
    /// Apply one action to several todos
    Bulk {
        #[arg(value_enum)]
        action: BulkAction,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show counts for the list or the current month
    Stats,
    /// Reset completed daily todos now
    Reset,
    /// Save the active filter
    Filter {
        #[arg(value_enum)]
        filter: Filter,
    },
    /// Monthly planner notes
    Note {
        #[command(subcommand)]
        command: NoteCommand,
    },
    /// Stay running, firing reminders and daily resets as they come due
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// Print the calendar and notes of a month
    Show {
        /// Month as YYYY-MM (defaults to the current planner month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Set the note for a day
    Set {
        day: u32,
        text: String,
        #[arg(long)]
        month: Option<String>,
    },
    /// Clear the note for a day of the current planner month
    Clear { day: u32 },
    /// Clear every note of a month
    ClearAll {
        #[arg(long)]
        month: Option<String>,
    },
    /// Move the planner to the previous month
    Prev,
    /// Move the planner to the next month
    Next,
}
