//! Configuration for tasklane.
//!
//! Global settings live in `~/.config/tasklane/config.toml` and can be overridden with
//! `TASKLANE_*` environment variables (`TASKLANE_SYNC__MAX_PAGES=10`). Provider
//! connections are per user, see `connections`.

mod connections;
mod policy;

pub use connections::{Connection, Connections};
pub use policy::SyncPolicy;

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::item::UserId;

static DEFAULT_DATA_DIR: &str = "~/.local/share/tasklane";
static DEFAULT_USER: &str = "me";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn is_default_data_dir(p: &PathBuf) -> bool {
    *p == default_data_dir()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasklaneConfig {
    /// Where item documents and per-user connections are stored.
    #[serde(default = "default_data_dir", skip_serializing_if = "is_default_data_dir")]
    pub data_dir: PathBuf,

    /// User to act as when none is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_user: Option<String>,

    #[serde(default)]
    pub sync: SyncPolicy,
}

impl Default for TasklaneConfig {
    fn default() -> Self {
        TasklaneConfig {
            data_dir: default_data_dir(),
            default_user: None,
            sync: SyncPolicy::default(),
        }
    }
}

impl TasklaneConfig {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".into()))?
            .join("tasklane");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the global config, creating a commented default file on first use.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("TASKLANE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// `data_dir` with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned())
    }

    pub fn user_path(&self, user: &UserId) -> PathBuf {
        self.data_path().join(user.as_str())
    }

    pub fn user(&self, explicit: Option<&str>) -> UserId {
        UserId::new(
            explicit
                .or(self.default_user.as_deref())
                .unwrap_or(DEFAULT_USER),
        )
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let contents = format!(
            "\
# tasklane configuration

# Where items and provider connections are stored:
# data_dir = \"{}\"

# User to act as when --user is not given:
# default_user = \"{}\"

[sync]
# max_in_flight = 8
# max_in_flight_per_user = 4
# max_pages = 50
# deletion_threshold = 2
# cycle_timeout = \"1m\"
# provider_timeout = \"10s\"
# gc_retention = \"30days\"
",
            DEFAULT_DATA_DIR, DEFAULT_USER
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        TasklaneConfig::create_default_config(&path).unwrap();

        let config = TasklaneConfig::load_from(&path).unwrap();
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.sync, SyncPolicy::default());
    }

    #[test]
    fn reads_sync_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_dir = \"/srv/tasklane\"\ndefault_user = \"alice\"\n[sync]\nmax_pages = 3\n",
        )
        .unwrap();

        let config = TasklaneConfig::load_from(&path).unwrap();
        assert_eq!(config.data_path(), PathBuf::from("/srv/tasklane"));
        assert_eq!(config.sync.max_pages, 3);
        assert_eq!(config.user(None), UserId::from("alice"));
        assert_eq!(config.user(Some("bob")), UserId::from("bob"));
    }
}
