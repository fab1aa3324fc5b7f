//! The overview: every active item of a user, from every source, in one order.
//!
//! Ordering is due date ascending with undated items last, then priority descending,
//! then creation time ascending, then `ItemId` so that no two items ever compare equal.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::item::{Item, UserId};
use crate::provider::ProviderKind;
use crate::store::{ItemScope, Store};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    All,
    Completed,
    #[default]
    Incomplete,
}

impl Completion {
    fn matches(&self, item: &Item) -> bool {
        match self {
            Completion::All => true,
            Completion::Completed => item.is_completed,
            Completion::Incomplete => !item.is_completed,
        }
    }
}

/// Where an item came from, for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Native,
    Provider(ProviderKind),
}

impl SourceKind {
    pub fn of(item: &Item) -> Self {
        match item.source.provider() {
            Some(provider) => SourceKind::Provider(provider),
            None => SourceKind::Native,
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("native") {
            return Ok(SourceKind::Native);
        }
        s.parse().map(SourceKind::Provider)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewFilter {
    #[serde(default)]
    pub completion: Completion,
    /// Only these sources. `None` means every source.
    #[serde(default)]
    pub sources: Option<BTreeSet<SourceKind>>,
    /// Only items due strictly before this instant. Undated items are excluded.
    #[serde(default)]
    pub due_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl OverviewFilter {
    fn matches(&self, item: &Item) -> bool {
        if item.is_deleted || !self.completion.matches(item) {
            return false;
        }
        let source = SourceKind::of(item);
        if self.sources.as_ref().is_some_and(|s| !s.contains(&source)) {
            return false;
        }
        match self.due_before {
            Some(before) => item.due_at.is_some_and(|due| due < before),
            None => true,
        }
    }
}

/// Overview order. Total: only equal ids compare equal.
pub fn compare(a: &Item, b: &Item) -> Ordering {
    let due = match (a.due_at, b.due_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    due.then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Filter, order and page a set of items. Items are deduplicated by id.
pub fn assemble_items(items: Vec<Item>, filter: &OverviewFilter) -> Vec<Item> {
    let mut visible: Vec<Item> = items.into_iter().filter(|item| filter.matches(item)).collect();
    visible.sort_by(compare);
    visible.dedup_by(|a, b| a.id == b.id);

    let page = visible.into_iter().skip(filter.offset);
    match filter.limit {
        Some(limit) => page.take(limit).collect(),
        None => page.collect(),
    }
}

/// Read a user's items from `store` and assemble the overview. Never writes.
pub async fn assemble<S: Store>(
    store: &S,
    user: &UserId,
    filter: &OverviewFilter,
) -> StoreResult<Vec<Item>> {
    let items = store.load_items(user, ItemScope::All).await?;
    Ok(assemble_items(items, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ExternalRef, NewItem, Source};
    use chrono::{Duration, TimeZone};

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn item(title: &str, due_at: Option<DateTime<Utc>>, priority: i32) -> Item {
        let new = NewItem {
            title: title.to_string(),
            due_at,
            priority,
            ..NewItem::default()
        };
        Item::native(UserId::from("alice"), new, monday() - Duration::days(7))
    }

    fn titles(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn orders_by_due_then_priority_with_undated_last() {
        let a = item("A", Some(monday()), 1);
        let b = item("B", Some(monday()), 2);
        let c = item("C", None, 5);

        let overview = assemble_items(vec![a, c, b], &OverviewFilter::default());

        assert_eq!(titles(&overview), ["B", "A", "C"]);
    }

    #[test]
    fn ordering_is_independent_of_input_order() {
        let items: Vec<Item> = (0..6)
            .map(|i| item(&format!("T{i}"), (i % 2 == 0).then(monday), 1))
            .collect();
        let mut reversed = items.clone();
        reversed.reverse();

        let filter = OverviewFilter::default();
        assert_eq!(assemble_items(items, &filter), assemble_items(reversed, &filter));
    }

    #[test]
    fn hides_deleted_and_completed_by_default() {
        let open = item("open", None, 0);
        let mut done = item("done", None, 0);
        done.is_completed = true;
        let mut gone = item("gone", None, 0);
        gone.soft_delete(monday());

        let items = vec![open, done, gone];
        let default = assemble_items(items.clone(), &OverviewFilter::default());
        assert_eq!(titles(&default), ["open"]);

        let all = OverviewFilter {
            completion: Completion::All,
            ..OverviewFilter::default()
        };
        let mut everything = titles(&assemble_items(items, &all))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        everything.sort();
        assert_eq!(everything, ["done", "open"]);
    }

    #[test]
    fn filters_by_source_and_due_date() {
        let native = item("native", Some(monday()), 0);
        let mut jira = item("jira", Some(monday() + Duration::days(3)), 0);
        jira.source = Source::External(ExternalRef {
            provider: ProviderKind::Jira,
            external_id: "JIRA-1".into(),
            external_updated_at: monday(),
        });
        let items = vec![native, jira];

        let only_jira = OverviewFilter {
            sources: Some(BTreeSet::from([SourceKind::Provider(ProviderKind::Jira)])),
            ..OverviewFilter::default()
        };
        assert_eq!(titles(&assemble_items(items.clone(), &only_jira)), ["jira"]);

        let soon = OverviewFilter {
            due_before: Some(monday() + Duration::days(1)),
            ..OverviewFilter::default()
        };
        assert_eq!(titles(&assemble_items(items, &soon)), ["native"]);
    }

    #[test]
    fn pages_after_ordering_and_dedups() {
        let first = item("first", Some(monday()), 0);
        let second = item("second", Some(monday() + Duration::hours(1)), 0);
        let third = item("third", None, 0);
        let items = vec![third.clone(), second.clone(), first.clone(), first];

        let page = OverviewFilter {
            offset: 1,
            limit: Some(1),
            ..OverviewFilter::default()
        };
        assert_eq!(titles(&assemble_items(items, &page)), ["second"]);
    }

    #[test]
    fn parses_source_kinds() {
        assert_eq!("native".parse::<SourceKind>(), Ok(SourceKind::Native));
        assert_eq!(
            "google-calendar".parse::<SourceKind>(),
            Ok(SourceKind::Provider(ProviderKind::GoogleCalendar))
        );
    }
}
