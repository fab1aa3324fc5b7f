//! Providers: the external services items are pulled from.
//!
//! Every provider is reached through the same capability, `ProviderAdapter::fetch_page`.
//! Adding a provider means adding a `ProviderKind` variant; the reconciler and the sync
//! engine never look at which provider they are dealing with.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdapterResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    GoogleCalendar,
    Gmail,
    Jira,
    Linear,
    Github,
    Slack,
    Asana,
}

/// Static presentation details for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDetails {
    pub name: &'static str,
    pub logo: &'static str,
    /// Whether items from this source can be marked done.
    pub is_completable: bool,
    /// Whether items from this source are conversations that can be replied to.
    pub is_replyable: bool,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::GoogleCalendar,
        ProviderKind::Gmail,
        ProviderKind::Jira,
        ProviderKind::Linear,
        ProviderKind::Github,
        ProviderKind::Slack,
        ProviderKind::Asana,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::GoogleCalendar => "google_calendar",
            ProviderKind::Gmail => "gmail",
            ProviderKind::Jira => "jira",
            ProviderKind::Linear => "linear",
            ProviderKind::Github => "github",
            ProviderKind::Slack => "slack",
            ProviderKind::Asana => "asana",
        }
    }

    /// Executable that serves this provider, e.g. `tasklane-provider-google-calendar`.
    pub fn binary_name(&self) -> String {
        format!("tasklane-provider-{}", self.name().replace('_', "-"))
    }

    pub fn details(&self) -> SourceDetails {
        match self {
            ProviderKind::GoogleCalendar => SourceDetails {
                name: "Google Calendar",
                logo: "/images/gcal.svg",
                is_completable: false,
                is_replyable: false,
            },
            ProviderKind::Gmail => SourceDetails {
                name: "Gmail",
                logo: "/images/gmail.svg",
                is_completable: true,
                is_replyable: true,
            },
            ProviderKind::Jira => SourceDetails {
                name: "Jira",
                logo: "/images/jira.svg",
                is_completable: true,
                is_replyable: false,
            },
            ProviderKind::Linear => SourceDetails {
                name: "Linear",
                logo: "/images/linear.svg",
                is_completable: true,
                is_replyable: false,
            },
            ProviderKind::Github => SourceDetails {
                name: "GitHub",
                logo: "/images/github.svg",
                is_completable: false,
                is_replyable: false,
            },
            ProviderKind::Slack => SourceDetails {
                name: "Slack",
                logo: "/images/slack.svg",
                is_completable: true,
                is_replyable: true,
            },
            ProviderKind::Asana => SourceDetails {
                name: "Asana",
                logo: "/images/asana.svg",
                is_completable: true,
                is_replyable: false,
            },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = ProviderKind::ALL.iter().map(|k| k.name()).collect();
                format!("Unknown provider '{}'. Known: {}", s, known.join(", "))
            })
    }
}

/// An item as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalItem {
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
}

/// One page of a provider listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<ExternalItem>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// The single capability every provider exposes.
///
/// Each cycle pages through the provider's complete current listing. The cursor passed
/// to the first call is the token stored after the last successful cycle; later calls get
/// the `next_cursor` of the previous page. Adapters handle their own authentication and
/// map vendor failures (rate limits, expired auth) onto `ErrorKind`.
pub trait ProviderAdapter: Send + Sync + 'static {
    fn fetch_page(&self, cursor: Option<&str>) -> impl Future<Output = AdapterResult<Page>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_binary_spelling() {
        assert_eq!("google-calendar".parse::<ProviderKind>(), Ok(ProviderKind::GoogleCalendar));
        assert_eq!("Jira".parse::<ProviderKind>(), Ok(ProviderKind::Jira));
        assert!("trello".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn binary_name_uses_dashes() {
        assert_eq!(
            ProviderKind::GoogleCalendar.binary_name(),
            "tasklane-provider-google-calendar"
        );
    }

    #[test]
    fn calendar_events_are_not_completable() {
        assert!(!ProviderKind::GoogleCalendar.details().is_completable);
        assert!(ProviderKind::Gmail.details().is_replyable);
    }
}
