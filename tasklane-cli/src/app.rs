//! Everything a command needs: config, the acting user, their connections, the engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tasklane_core::config::{Connections, TasklaneConfig};
use tasklane_core::remote::ProviderProcess;
use tasklane_core::{FileStore, ProviderKind, SyncEngine, UserId};

pub type Engine = SyncEngine<FileStore, ProviderProcess>;

pub struct App {
    pub config: TasklaneConfig,
    pub user: UserId,
    pub connections: Connections,
    pub engine: Engine,
}

impl App {
    pub fn load(user: Option<&str>) -> Result<Self> {
        let config = TasklaneConfig::load().context("Failed to load config")?;
        let user = config.user(user);
        let connections = Connections::load(&config.user_path(&user))
            .with_context(|| format!("Failed to load connections for '{}'", user))?;

        let engine = SyncEngine::new(FileStore::new(config.data_path()), config.sync.clone());
        for connection in &connections.connections {
            let process = ProviderProcess::from_connection(connection)
                .with_timeout(config.sync.provider_timeout);
            engine.connect(&user, connection.provider, process);
        }

        Ok(App {
            config,
            user,
            connections,
            engine,
        })
    }

    pub fn user_dir(&self) -> PathBuf {
        self.config.user_path(&self.user)
    }

    pub fn store(&self) -> &FileStore {
        self.engine.store()
    }

    /// Connected providers, optionally narrowed to one given by name.
    pub fn providers(&self, filter: Option<&str>) -> Result<Vec<ProviderKind>> {
        let connected = self.engine.connected(&self.user);

        if connected.is_empty() {
            anyhow::bail!(
                "No providers connected.\n\n\
                Connect your first provider with:\n  \
                tasklane connect <provider> --param key=value\n\n\
                Example:\n  \
                tasklane connect jira --param command=tasklane-provider-feed --param feed=~/jira.json"
            );
        }

        match filter {
            Some(name) => {
                let kind = parse_provider(name)?;
                if !connected.contains(&kind) {
                    let available: Vec<_> = connected.iter().map(|k| k.name()).collect();
                    anyhow::bail!(
                        "Provider '{}' is not connected. Connected: {}",
                        kind,
                        available.join(", ")
                    );
                }
                Ok(vec![kind])
            }
            None => Ok(connected),
        }
    }
}

pub fn parse_provider(name: &str) -> Result<ProviderKind> {
    name.parse().map_err(|e: String| anyhow::anyhow!(e))
}
