use crate::model::{Filter, TodoList, UserId};
use crate::planner::{Month, NotesGrid};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = ".dailytodo";

/// Everything persisted for one user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserDocument {
    pub todos: TodoList,
    #[serde(default)]
    pub notes: NotesGrid,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub month: Option<Month>,
    #[serde(default)]
    pub last_reset_day: Option<NaiveDate>,
    /// When reminders were last fired. Reminders due after this and not
    /// yet fired are still owed on reload.
    #[serde(default)]
    pub last_poll: Option<DateTime<Utc>>,
}

impl UserDocument {
    pub fn empty(owner: impl Into<UserId>) -> Self {
        UserDocument {
            todos: TodoList::new(owner),
            notes: NotesGrid::default(),
            filter: Filter::default(),
            month: None,
            last_reset_day: None,
            last_poll: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

pub fn init_project_store(user: &str) -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir).context("failed to create .dailytodo directory")?;
    let location = StoreLocation {
        path: dir.join(document_name(user)),
        scope: StoreScope::Project,
    };
    if !location.path.exists() {
        save_document(&location, &UserDocument::empty(user))?;
    }
    Ok(location)
}

/// The nearest project store at or above `start`, falling back to the
/// user's global data directory.
pub fn locate_store(start: &Path, user: &str) -> Result<StoreLocation> {
    if let Some(project_path) = find_project_store(start, user) {
        return Ok(StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        });
    }
    let global_path = global_data_dir()?.join(document_name(user));
    Ok(StoreLocation {
        path: global_path,
        scope: StoreScope::Global,
    })
}

pub fn load_document(location: &StoreLocation, user: &str) -> Result<UserDocument> {
    if !location.path.exists() {
        return Ok(UserDocument::empty(user));
    }
    let data = fs::read_to_string(&location.path)
        .with_context(|| format!("reading {:?}", location.path))?;
    let doc: UserDocument = serde_yaml::from_str(&data).context("parsing todo file")?;
    if doc.todos.owner != user {
        anyhow::bail!(
            "{:?} belongs to {}, not {}",
            location.path,
            doc.todos.owner,
            user
        );
    }
    tracing::debug!(path = ?location.path, todos = doc.todos.todos.len(), "loaded todos");
    Ok(doc)
}

pub fn save_document(location: &StoreLocation, doc: &UserDocument) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(doc).context("serializing todos")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    tracing::debug!(path = ?location.path, "saved todos");
    Ok(())
}

fn document_name(user: &str) -> String {
    let safe: String = user
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.yml", safe)
}

fn find_project_store(start: &Path, user: &str) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let project = current.join(PROJECT_DIR);
        if project.is_dir() {
            return Some(project.join(document_name(user)));
        }
        dir = current.parent();
    }
    None
}

fn global_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "dailytodo").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn document_round_trips_through_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: tmp.path().join("nested").join("alice.yml"),
            scope: StoreScope::Global,
        };
        let mut doc = UserDocument::empty("alice");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        doc.todos
            .add("Buy milk", None, true, Some(now + chrono::Duration::hours(1)), now)
            .unwrap();
        doc.notes
            .set_note(Month::new(2024, 5).unwrap(), 3, "dentist")
            .unwrap();
        doc.filter = Filter::Active;
        doc.last_reset_day = Some(now.date_naive());
        doc.last_poll = Some(now);

        save_document(&location, &doc).unwrap();
        let loaded = load_document(&location, "alice").unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn older_documents_load_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: tmp.path().join("erin.yml"),
            scope: StoreScope::Global,
        };
        fs::write(
            &location.path,
            "todos:\n  owner: erin\n  todos:\n  - id: abc123\n    text: Stretch\n    completed: false\n    priority: low\n    is_daily: true\n    created_at: 2024-05-01T08:00:00Z\n",
        )
        .unwrap();
        let doc = load_document(&location, "erin").unwrap();
        let todo = &doc.todos.todos[0];
        assert_eq!(todo.category, crate::model::DEFAULT_CATEGORY);
        assert!(todo.tags.is_empty());
        assert_eq!(todo.due_date, None);
        assert_eq!(doc.last_poll, None);
    }

    #[test]
    fn missing_file_loads_empty_document() {
        let tmp = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: tmp.path().join("bob.yml"),
            scope: StoreScope::Global,
        };
        let doc = load_document(&location, "bob").unwrap();
        assert_eq!(doc, UserDocument::empty("bob"));
    }

    #[test]
    fn foreign_document_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: tmp.path().join("x.yml"),
            scope: StoreScope::Global,
        };
        save_document(&location, &UserDocument::empty("alice")).unwrap();
        assert!(load_document(&location, "mallory").is_err());
    }

    #[test]
    fn project_store_is_found_from_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(PROJECT_DIR)).unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let location = locate_store(&nested, "carol").unwrap();
        assert_eq!(location.scope, StoreScope::Project);
        assert_eq!(location.path, tmp.path().join(PROJECT_DIR).join("carol.yml"));
    }

    #[test]
    fn user_names_are_sanitized() {
        assert_eq!(document_name("dave@example.com"), "dave_example_com.yml");
    }
}
