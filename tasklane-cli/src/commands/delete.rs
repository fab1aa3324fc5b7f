use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;
use tasklane_core::{Store, StoreError};

use super::parse_item_id;
use crate::app::App;
use crate::render::Render;

pub async fn run(app: &App, id: &str) -> Result<()> {
    let id = parse_item_id(id)?;

    match app.store().delete_item(&app.user, id, Utc::now()).await {
        Ok(item) => {
            println!("{} {}", "-".red(), item.render());
            Ok(())
        }
        Err(StoreError::ExternalDeletion(_, provider)) => anyhow::bail!(
            "This item comes from {}. Delete or close it there; the next sync removes it here.",
            provider.details().name
        ),
        Err(e) => Err(e.into()),
    }
}
