//! Error types for tasklane.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::ItemId;
use crate::provider::ProviderKind;

/// Why a provider cycle failed, as reported in a `SyncResult`.
///
/// Providers report the first four; the rest are assigned by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    AuthExpired,
    NotFound,
    #[default]
    Unknown,
    Timeout,
    Storage,
    AlreadyRunning,
    NotConnected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Storage => "storage",
            ErrorKind::AlreadyRunning => "already_running",
            ErrorKind::NotConnected => "not_connected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed `fetch_page` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        AdapterError {
            kind,
            message: message.into(),
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors raised by a storage gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Item not found: {0}")]
    NotFound(ItemId),

    #[error("Identity already mapped: {0}")]
    Conflict(String),

    #[error("Item {0} comes from {1} and can only be deleted there")]
    ExternalDeletion(ItemId, ProviderKind),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised inside a reconciliation cycle.
///
/// None of these escape `SyncEngine::run_cycle`; they are folded into the
/// per-provider `SyncResult`.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Provider fetch failed: {0}")]
    AdapterFetchFailed(#[from] AdapterError),

    #[error("Could not resolve identity for {provider} item '{external_id}'")]
    IdentityResolutionFailed {
        provider: ProviderKind,
        external_id: String,
    },

    #[error("Storage commit failed: {0}")]
    StorageCommitFailed(#[source] StoreError),

    /// A concurrent resolver created the same identity first. Always retried once.
    #[error("Identity creation raced with another resolver")]
    ConflictRetry,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider '{0}' is not connected")]
    NotConnected(ProviderKind),

    #[error("Cycle deadline exceeded before the fetch finished")]
    Timeout,

    #[error("A cycle for {0} is already running")]
    AlreadyRunning(ProviderKind),

    #[error("Sync engine is shutting down")]
    Shutdown,
}

impl SyncError {
    /// The kind reported to callers in a `SyncResult`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::AdapterFetchFailed(e) => e.kind,
            SyncError::StorageCommitFailed(_) | SyncError::Store(_) => ErrorKind::Storage,
            SyncError::NotConnected(_) => ErrorKind::NotConnected,
            SyncError::Timeout => ErrorKind::Timeout,
            SyncError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            SyncError::IdentityResolutionFailed { .. }
            | SyncError::ConflictRetry
            | SyncError::Shutdown => ErrorKind::Unknown,
        }
    }
}

/// Errors loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_failure_keeps_provider_kind() {
        let err = SyncError::from(AdapterError::new(ErrorKind::RateLimited, "slow down"));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.to_string(), "Provider fetch failed: rate_limited: slow down");
    }

    #[test]
    fn storage_failures_report_storage_kind() {
        let err = SyncError::StorageCommitFailed(StoreError::Serialization("bad".into()));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
