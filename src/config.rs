use crate::model::Priority;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "DAILYTODO_CONFIG";
pub const USER_ENV: &str = "DAILYTODO_USER";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Owner used when neither `--user` nor `DAILYTODO_USER` is set.
    pub user: Option<String>,
    pub default_priority: Priority,
    /// Upper bound on how long `watch` sleeps between day checks.
    pub poll_interval_secs: u64,
    /// Reminders and reset notices are shown only when set.
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            user: None,
            default_priority: Priority::Medium,
            poll_interval_secs: 30,
            notifications: true,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        match config_path()? {
            Some(path) => Self::load_from(&path),
            None => Ok(Settings::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "no settings file, using defaults");
            return Ok(Settings::default());
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let settings: Settings =
            serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))?;
        if settings.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        Ok(settings)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Flag, then environment, then settings, then the login name.
    pub fn resolve_user(&self, flag: Option<String>) -> String {
        flag.filter(|u| !u.trim().is_empty())
            .or_else(|| env::var(USER_ENV).ok().filter(|u| !u.trim().is_empty()))
            .or_else(|| self.user.clone())
            .or_else(|| env::var("USER").ok())
            .or_else(|| env::var("USERNAME").ok())
            .unwrap_or_else(|| "local".to_string())
    }
}

fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(Some(PathBuf::from(path)));
    }
    Ok(ProjectDirs::from("", "", "dailytodo").map(|dirs| dirs.config_dir().join("config.yml")))
}
