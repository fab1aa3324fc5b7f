//! Tunables for the sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CYCLE_TIMEOUT, DEFAULT_DELETION_THRESHOLD, DEFAULT_GC_RETENTION, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_MAX_IN_FLIGHT_PER_USER, DEFAULT_MAX_PAGES, DEFAULT_PROVIDER_TIMEOUT,
};

/// The `[sync]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Provider cycles running at once across all users.
    pub max_in_flight: usize,
    /// Provider cycles running at once for a single user.
    pub max_in_flight_per_user: usize,
    /// Page ceiling per provider cycle.
    pub max_pages: usize,
    /// Consecutive missed cycles before an external item is soft-deleted.
    pub deletion_threshold: u32,
    #[serde(with = "humantime_str")]
    pub cycle_timeout: Duration,
    #[serde(with = "humantime_str")]
    pub provider_timeout: Duration,
    #[serde(with = "humantime_str")]
    pub gc_retention: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_in_flight_per_user: DEFAULT_MAX_IN_FLIGHT_PER_USER,
            max_pages: DEFAULT_MAX_PAGES,
            deletion_threshold: DEFAULT_DELETION_THRESHOLD,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            gc_retention: DEFAULT_GC_RETENTION,
        }
    }
}

/// Durations are written the way people say them: "30s", "10m", "30days".
mod humantime_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
