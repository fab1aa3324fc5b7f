use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the next cycle for one `(user, provider)` pair starts paging.
///
/// Only advanced after a committed, complete cycle; only reset by a full resync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Opaque provider token, passed back on the first `fetch_page` of the next cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    pub fn advanced(token: Option<String>, at: DateTime<Utc>) -> Self {
        SyncCursor {
            token,
            last_success_at: Some(at),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.last_success_at.is_none()
    }
}
