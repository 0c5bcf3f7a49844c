/// Configuration for a graph store
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::{DEFAULT_BACKUP_DIR, DEFAULT_BUSY_TIMEOUT_MS};

/// Environment variable overriding the storage file location
pub const ENV_DB_PATH: &str = "GDMON_DB_PATH";
/// Environment variable overriding the backup directory name
pub const ENV_BACKUP_DIR: &str = "GDMON_BACKUP_DIR";
/// Environment variable overriding the busy timeout (milliseconds)
pub const ENV_BUSY_TIMEOUT_MS: &str = "GDMON_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Storage file
    pub database_path: PathBuf,

    /// Directory name for backups, created next to the storage file
    pub backup_dir_name: String,

    /// How long a write waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            backup_dir_name: DEFAULT_BACKUP_DIR.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl GraphConfig {
    /// Config for a specific storage file, other settings default
    pub fn for_path(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `GDMON_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    ///
    /// Unparseable numbers are ignored and the default kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_BACKUP_DIR).filter(|d| !d.trim().is_empty()) {
            config.backup_dir_name = dir;
        }
        if let Some(timeout) = lookup(ENV_BUSY_TIMEOUT_MS).and_then(|t| t.trim().parse().ok()) {
            config.busy_timeout_ms = timeout;
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("database_path cannot be empty".to_string());
        }

        let dir = &self.backup_dir_name;
        if dir.trim().is_empty() {
            return Err("backup_dir_name cannot be empty".to_string());
        }
        if dir.contains('/') || dir.contains('\\') || dir.contains("..") {
            return Err(format!(
                "backup_dir_name must be a plain directory name, got {:?}",
                dir
            ));
        }

        if self.busy_timeout_ms == 0 {
            return Err("busy_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// `~/.gdmon/database/graph.db`, or relative to the working directory when
/// no home directory is known
fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gdmon")
        .join("database")
        .join("graph.db")
}
