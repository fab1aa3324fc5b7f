//! Items: the canonical entity behind every task and event in the overview.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_PRIORITY;
use crate::provider::{ExternalItem, ProviderKind};

/// Internal item identifier. Assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        ItemId(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ItemId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Back-reference from an item to the provider record it mirrors.
///
/// Plain data: the provider never owns the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub provider: ProviderKind,
    pub external_id: String,
    /// Provider timestamp of the last version applied locally.
    pub external_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Native,
    External(ExternalRef),
}

impl Source {
    pub fn external(&self) -> Option<&ExternalRef> {
        match self {
            Source::Native => None,
            Source::External(r) => Some(r),
        }
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        self.external().map(|r| r.provider)
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Source::Native)
    }
}

/// Fields a user can edit. Edited fields are pinned against provider updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Body,
    DueAt,
    Priority,
    Completed,
    Deeplink,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Body => "body",
            Field::DueAt => "due_at",
            Field::Priority => "priority",
            Field::Completed => "completed",
            Field::Deeplink => "deeplink",
        };
        f.write_str(name)
    }
}

/// A new value for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldChange {
    Title(String),
    Body(String),
    DueAt(Option<DateTime<Utc>>),
    Priority(i32),
    Completed(bool),
    Deeplink(Option<String>),
}

impl FieldChange {
    pub fn field(&self) -> Field {
        match self {
            FieldChange::Title(_) => Field::Title,
            FieldChange::Body(_) => Field::Body,
            FieldChange::DueAt(_) => Field::DueAt,
            FieldChange::Priority(_) => Field::Priority,
            FieldChange::Completed(_) => Field::Completed,
            FieldChange::Deeplink(_) => Field::Deeplink,
        }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldChange::Title(v) | FieldChange::Body(v) => write!(f, "{}: {}", self.field(), v),
            FieldChange::DueAt(Some(v)) => write!(f, "{}: {}", self.field(), v.to_rfc3339()),
            FieldChange::Priority(v) => write!(f, "{}: {}", self.field(), v),
            FieldChange::Completed(v) => write!(f, "{}: {}", self.field(), v),
            FieldChange::Deeplink(Some(v)) => write!(f, "{}: {}", self.field(), v),
            FieldChange::DueAt(None) | FieldChange::Deeplink(None) => {
                write!(f, "{}: (none)", self.field())
            }
        }
    }
}

/// Fields for a natively created item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i32,
    pub deeplink: Option<String>,
}

/// A user edit: the listed fields get new values and become locally owned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEdit {
    pub changes: Vec<FieldChange>,
}

impl ItemEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, change: FieldChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub source: Source,
    #[serde(default)]
    pub local_edited_fields: BTreeSet<Field>,
    pub deeplink: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Consecutive successful cycles in which the provider omitted this item.
    #[serde(default)]
    pub missed_cycles: u32,
}

impl Item {
    pub fn native(user_id: UserId, new: NewItem, now: DateTime<Utc>) -> Self {
        Item {
            id: ItemId::new(),
            user_id,
            title: new.title,
            body: new.body,
            due_at: new.due_at,
            priority: new.priority,
            is_completed: false,
            is_deleted: false,
            deleted_at: None,
            source: Source::Native,
            local_edited_fields: BTreeSet::new(),
            deeplink: new.deeplink,
            last_synced_at: None,
            created_at: now,
            missed_cycles: 0,
        }
    }

    /// Build the first local copy of a provider item.
    pub fn from_external(
        id: ItemId,
        user_id: UserId,
        provider: ProviderKind,
        external: &ExternalItem,
        now: DateTime<Utc>,
    ) -> Self {
        Item {
            id,
            user_id,
            title: external.title.clone(),
            body: external.body.clone(),
            due_at: external.due_at,
            priority: external.priority.unwrap_or(DEFAULT_PRIORITY),
            is_completed: external.completed,
            is_deleted: false,
            deleted_at: None,
            source: Source::External(ExternalRef {
                provider,
                external_id: external.external_id.clone(),
                external_updated_at: external.updated_at,
            }),
            local_edited_fields: BTreeSet::new(),
            deeplink: external.deeplink.clone(),
            last_synced_at: Some(now),
            created_at: now,
            missed_cycles: 0,
        }
    }

    pub fn external_ref(&self) -> Option<&ExternalRef> {
        self.source.external()
    }

    pub fn is_locally_edited(&self, field: Field) -> bool {
        self.local_edited_fields.contains(&field)
    }

    pub fn apply(&mut self, change: &FieldChange) {
        match change {
            FieldChange::Title(v) => self.title = v.clone(),
            FieldChange::Body(v) => self.body = v.clone(),
            FieldChange::DueAt(v) => self.due_at = *v,
            FieldChange::Priority(v) => self.priority = *v,
            FieldChange::Completed(v) => self.is_completed = *v,
            FieldChange::Deeplink(v) => self.deeplink = v.clone(),
        }
    }

    /// Apply a user edit, pinning every edited field against provider updates.
    pub fn apply_edit(&mut self, edit: &ItemEdit) {
        for change in &edit.changes {
            self.apply(change);
            self.local_edited_fields.insert(change.field());
        }
    }

    /// Provider-sourced field values that differ from this item, minus locally edited fields.
    pub fn provider_changes(&self, fetched: &ExternalItem) -> Vec<FieldChange> {
        let mut candidates = vec![
            (self.title != fetched.title).then(|| FieldChange::Title(fetched.title.clone())),
            (self.body != fetched.body).then(|| FieldChange::Body(fetched.body.clone())),
            (self.due_at != fetched.due_at).then_some(FieldChange::DueAt(fetched.due_at)),
            (self.is_completed != fetched.completed)
                .then_some(FieldChange::Completed(fetched.completed)),
            (self.deeplink != fetched.deeplink)
                .then(|| FieldChange::Deeplink(fetched.deeplink.clone())),
        ];
        if let Some(priority) = fetched.priority {
            candidates.push((self.priority != priority).then_some(FieldChange::Priority(priority)));
        }

        candidates
            .into_iter()
            .flatten()
            .filter(|change| !self.is_locally_edited(change.field()))
            .collect()
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.missed_cycles = 0;
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}
