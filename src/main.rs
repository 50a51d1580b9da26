mod app;
mod cli;
mod clock;
mod commands;
mod config;
mod model;
mod notify;
mod planner;
mod reset;
mod scheduler;
mod storage;
mod view;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    let settings = config::Settings::load()?;
    let ctx = commands::Invocation {
        user: settings.resolve_user(args.user),
        settings,
    };
    let command = args.command.unwrap_or(cli::Command::List {
        filter: None,
        category: None,
        tag: None,
        priority: None,
        daily: false,
        not_daily: false,
    });
    match command {
        cli::Command::Init => commands::init(&ctx),
        cli::Command::List {
            filter,
            category,
            tag,
            priority,
            daily,
            not_daily,
        } => {
            let is_daily = match (daily, not_daily) {
                (true, _) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            };
            let criteria = model::Criteria {
                completed: None,
                priority,
                is_daily,
                category,
                tag,
            };
            commands::list(&ctx, filter, criteria)
        }
        cli::Command::Add {
            text,
            priority,
            daily,
            remind,
            remind_in,
            category,
            tags,
            due,
            notes,
        } => {
            let details = commands::DetailArgs {
                category,
                tags,
                due,
                notes,
                ..commands::DetailArgs::default()
            };
            commands::add(&ctx, text, priority, daily, remind, remind_in, details)
        }
        cli::Command::Toggle { id } => commands::toggle(&ctx, id),
        cli::Command::Edit { id, text } => commands::edit(&ctx, id, text),
        cli::Command::Update {
            id,
            category,
            tags,
            clear_tags,
            due,
            clear_due,
            notes,
        } => {
            let details = commands::DetailArgs {
                category,
                tags,
                clear_tags,
                due,
                clear_due,
                notes,
            };
            commands::update(&ctx, id, details)
        }
        cli::Command::Delete { id } => commands::delete(&ctx, id),
        cli::Command::Bulk { action, ids } => commands::bulk(&ctx, action, ids),
        cli::Command::Stats => commands::stats(&ctx),
        cli::Command::Reset => commands::reset(&ctx),
        cli::Command::Filter { filter } => commands::filter(&ctx, filter),
        cli::Command::Note { command } => match command {
            cli::NoteCommand::Show { month } => commands::note_show(&ctx, month),
            cli::NoteCommand::Set { day, text, month } => {
                commands::note_set(&ctx, day, text, month)
            }
            cli::NoteCommand::Clear { day } => commands::note_clear(&ctx, day),
            cli::NoteCommand::ClearAll { month } => commands::note_clear_all(&ctx, month),
            cli::NoteCommand::Prev => commands::note_step(&ctx, false),
            cli::NoteCommand::Next => commands::note_step(&ctx, true),
        },
        cli::Command::Watch => commands::watch(&ctx),
    }
}
