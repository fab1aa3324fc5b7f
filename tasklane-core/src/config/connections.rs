//! Per-user provider connections.
//!
//! Stored in `<data_dir>/<user>/connections.toml`:
//!
//! ```toml
//! [[connection]]
//! provider = "jira"
//! command = "tasklane-provider-feed"
//! feed = "~/exports/jira.json"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::provider::ProviderKind;

const CONNECTIONS_FILE: &str = "connections.toml";

/// One connected provider and the parameters passed to its binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub provider: ProviderKind,
    #[serde(flatten)]
    pub params: BTreeMap<String, toml::Value>,
}

impl From<&Connection> for serde_json::Map<String, serde_json::Value> {
    fn from(connection: &Connection) -> Self {
        connection
            .params
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    #[serde(default, rename = "connection")]
    pub connections: Vec<Connection>,
}

impl Connections {
    /// Load `connections.toml` from a user directory. Missing file means no connections.
    pub fn load(user_dir: &Path) -> Result<Self, ConfigError> {
        let path = user_dir.join(CONNECTIONS_FILE);
        if !path.exists() {
            return Ok(Connections::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn save(&self, user_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(user_dir)?;
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(user_dir.join(CONNECTIONS_FILE), content)?;
        Ok(())
    }

    pub fn get(&self, provider: ProviderKind) -> Option<&Connection> {
        self.connections.iter().find(|c| c.provider == provider)
    }

    /// Add or replace the connection for `connection.provider`.
    pub fn upsert(&mut self, connection: Connection) {
        self.connections.retain(|c| c.provider != connection.provider);
        self.connections.push(connection);
        self.connections.sort_by_key(|c| c.provider);
    }

    pub fn remove(&mut self, provider: ProviderKind) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.provider != provider);
        before != self.connections.len()
    }
}
