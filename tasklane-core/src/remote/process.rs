//! Provider subprocess adapter.
//!
//! Talks to an external provider binary (e.g. `tasklane-provider-jira`) using JSON over
//! stdin/stdout. Any executable that speaks the protocol can be a provider.
//!
//! Providers manage their own credentials and tokens. tasklane just passes the
//! connection parameters through.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::config::Connection;
use crate::constants::DEFAULT_PROVIDER_TIMEOUT;
use crate::error::{AdapterError, AdapterResult, ErrorKind};
use crate::provider::{Page, ProviderAdapter, ProviderKind};
use crate::remote::protocol::{Command, FetchPage, ProviderCommand, Request, Response};

/// Connection parameter that overrides which executable serves a connection.
pub const COMMAND_PARAM: &str = "command";

#[derive(Debug, Clone)]
pub struct ProviderProcess {
    kind: ProviderKind,
    connection: serde_json::Map<String, serde_json::Value>,
    timeout: Duration,
}

impl ProviderProcess {
    pub fn new(kind: ProviderKind, connection: serde_json::Map<String, serde_json::Value>) -> Self {
        ProviderProcess {
            kind,
            connection,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn from_connection(connection: &Connection) -> Self {
        Self::new(connection.provider, connection.into())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn binary_path(&self) -> AdapterResult<PathBuf> {
        let binary_name = self
            .connection
            .get(COMMAND_PARAM)
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| self.kind.binary_name());

        which::which(&binary_name).map_err(|_| {
            AdapterError::new(
                ErrorKind::NotFound,
                format!(
                    "Provider binary '{}' not found in PATH. Install it with:\n  cargo install {}",
                    binary_name, binary_name
                ),
            )
        })
    }

    /// Call a typed provider command and return the result.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> AdapterResult<C::Response> {
        timeout(self.timeout, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| {
                AdapterError::new(
                    ErrorKind::Timeout,
                    format!("Provider request timed out after {}s", self.timeout.as_secs()),
                )
            })?
    }

    /// Low-level call that sends a command with params and deserializes the response.
    async fn call_raw<P: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> AdapterResult<R> {
        let unknown = |msg: String| AdapterError::new(ErrorKind::Unknown, msg);

        let params = serde_json::to_value(params).map_err(|e| unknown(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request).map_err(|e| unknown(e.to_string()))?;

        let binary_path = self.binary_path()?;
        debug!(provider = %self.kind, binary = %binary_path.display(), "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unknown(format!("Failed to spawn {}: {}", binary_path.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| unknown("Provider stdin was not captured".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(|e| unknown(e.to_string()))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| unknown(e.to_string()))?;

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(unknown(format!(
                "Provider exited with status {} and no response",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response: Response<R> = serde_json::from_str(&response_str)
            .map_err(|e| unknown(format!("Failed to parse response: {}", e)))?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error, kind } => Err(AdapterError::new(kind, error)),
        }
    }
}

impl ProviderAdapter for ProviderProcess {
    async fn fetch_page(&self, cursor: Option<&str>) -> AdapterResult<Page> {
        self.call(FetchPage {
            connection: self.connection.clone(),
            cursor: cursor.map(String::from),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_reported_as_not_found() {
        let mut connection = serde_json::Map::new();
        connection.insert(
            COMMAND_PARAM.into(),
            serde_json::json!("tasklane-provider-does-not-exist"),
        );
        let process = ProviderProcess::new(ProviderKind::Jira, connection);

        let err = process.fetch_page(None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.message.contains("tasklane-provider-does-not-exist"));
    }
}
