pub mod add;
pub mod config;
pub mod connect;
pub mod delete;
pub mod edit;
pub mod gc;
pub mod overview;
pub mod providers;
pub mod resync;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use tasklane_core::ItemId;

/// Parse an item id as printed by `tasklane overview --ids`.
pub fn parse_item_id(id: &str) -> Result<ItemId> {
    id.trim()
        .parse()
        .with_context(|| format!("'{}' is not an item id", id))
}
