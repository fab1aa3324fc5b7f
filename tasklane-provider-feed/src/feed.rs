//! Feed files and paging over them.
//!
//! A feed is either a bare array of items or an object:
//!
//! ```json
//! { "items": [ { "external_id": "JIRA-1", "title": "...", "updated_at": "..." } ],
//!   "error": { "kind": "rate_limited", "message": "try again later" } }
//! ```
//!
//! `error`, when present, is returned instead of items, which makes it easy to rehearse
//! provider outages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tasklane_core::error::AdapterResult;
use tasklane_core::{AdapterError, ErrorKind, ExternalItem, Page};

pub const DEFAULT_PAGE_SIZE: usize = 100;

const PAGE_PREFIX: &str = "page:";
const REVISION_PREFIX: &str = "rev:";

#[derive(Debug, Deserialize)]
struct FeedError {
    #[serde(default)]
    kind: ErrorKind,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedFile {
    Items(Vec<ExternalItem>),
    Document {
        #[serde(default)]
        items: Vec<ExternalItem>,
        #[serde(default)]
        error: Option<FeedError>,
    },
}

#[derive(Debug)]
pub struct Feed {
    items: Vec<ExternalItem>,
    error: Option<FeedError>,
    modified: Option<DateTime<Utc>>,
}

pub fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl Feed {
    pub fn load(path: &Path) -> AdapterResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Unknown
            };
            AdapterError::new(kind, format!("Failed to read {}: {}", path.display(), e))
        })?;

        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let mut feed = Self::parse(&contents)?;
        feed.modified = modified;
        Ok(feed)
    }

    fn parse(contents: &str) -> AdapterResult<Self> {
        let file: FeedFile = serde_json::from_str(contents).map_err(|e| {
            AdapterError::new(ErrorKind::Unknown, format!("Invalid feed: {}", e))
        })?;

        let (items, error) = match file {
            FeedFile::Items(items) => (items, None),
            FeedFile::Document { items, error } => (items, error),
        };
        Ok(Feed {
            items,
            error,
            modified: None,
        })
    }

    /// Serve the page starting at `cursor`.
    ///
    /// `page:<offset>` continues a listing. Any other cursor, including the `rev:` token
    /// handed out on the last page, starts over from the top.
    pub fn page(&self, cursor: Option<&str>, page_size: usize) -> AdapterResult<Page> {
        if let Some(error) = &self.error {
            return Err(AdapterError::new(error.kind, error.message.clone()));
        }

        let page_size = page_size.max(1);
        let offset = cursor
            .and_then(|c| c.strip_prefix(PAGE_PREFIX))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0)
            .min(self.items.len());
        let end = (offset + page_size).min(self.items.len());
        let has_more = end < self.items.len();

        let next_cursor = if has_more {
            format!("{PAGE_PREFIX}{end}")
        } else {
            let revision = self.modified.map(|m| m.timestamp()).unwrap_or_default();
            format!("{REVISION_PREFIX}{revision}")
        };

        Ok(Page {
            items: self.items[offset..end].to_vec(),
            next_cursor: Some(next_cursor),
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"[
        {"external_id": "A", "title": "first", "updated_at": "2025-06-02T09:00:00Z"},
        {"external_id": "B", "title": "second", "updated_at": "2025-06-02T09:00:00Z"},
        {"external_id": "C", "title": "third", "updated_at": "2025-06-02T09:00:00Z", "priority": 2}
    ]"#;

    fn ids(page: &Page) -> Vec<&str> {
        page.items.iter().map(|i| i.external_id.as_str()).collect()
    }

    #[test]
    fn pages_through_the_listing() {
        let feed = Feed::parse(FEED).unwrap();

        let first = feed.page(None, 2).unwrap();
        assert_eq!(ids(&first), ["A", "B"]);
        assert!(first.has_more);
        assert_eq!(first.next_cursor.as_deref(), Some("page:2"));

        let second = feed.page(first.next_cursor.as_deref(), 2).unwrap();
        assert_eq!(ids(&second), ["C"]);
        assert!(!second.has_more);
        assert!(second.next_cursor.unwrap().starts_with("rev:"));
    }

    #[test]
    fn revision_cursor_restarts_from_the_top() {
        let feed = Feed::parse(FEED).unwrap();
        let page = feed.page(Some("rev:1718000000"), 10).unwrap();
        assert_eq!(ids(&page), ["A", "B", "C"]);
    }

    #[test]
    fn scripted_error_is_reported_with_its_kind() {
        let feed = Feed::parse(r#"{"error": {"kind": "auth_expired", "message": "token revoked"}}"#)
            .unwrap();
        let err = feed.page(None, 10).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthExpired);
        assert_eq!(err.message, "token revoked");
    }

    #[test]
    fn missing_feed_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Feed::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn loads_document_form_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, format!(r#"{{"items": {FEED}}}"#)).unwrap();

        let feed = Feed::load(&path).unwrap();
        let page = feed.page(None, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[2].priority, Some(2));
    }

    #[test]
    fn tilde_expands_to_home() {
        assert_eq!(expand_home("/srv/feeds/jira.json"), PathBuf::from("/srv/feeds/jira.json"));

        let expanded = expand_home("~/exports/jira.json");
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("exports/jira.json"));
    }
}
