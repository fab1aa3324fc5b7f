//! Core types and engine for tasklane.
//!
//! This crate provides everything behind the `tasklane` CLI and the provider binaries:
//! - `item` and `provider` for the data model and the provider contract
//! - `remote` for the JSON protocol spoken with provider binaries
//! - `identity`, `reconcile` and `sync` for the reconciliation engine
//! - `overview` for the unified, ordered view of a user's items
//! - `store` for persistence

pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod item;
pub mod overview;
pub mod provider;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod sync;

pub use error::{AdapterError, ErrorKind, StoreError, SyncError};
pub use item::{ExternalRef, Field, FieldChange, Item, ItemEdit, ItemId, NewItem, Source, UserId};
pub use provider::{ExternalItem, Page, ProviderAdapter, ProviderKind};
pub use store::{FileStore, MemoryStore, Store};
pub use sync::{SyncEngine, SyncResult};
