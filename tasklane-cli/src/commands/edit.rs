use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use tasklane_core::{FieldChange, ItemEdit, Store};

use super::parse_item_id;
use crate::app::App;
use crate::render::Render;
use crate::utils::dates::parse_datetime;

#[derive(Args)]
pub struct EditArgs {
    id: String,

    #[arg(short, long)]
    title: Option<String>,

    #[arg(short, long)]
    body: Option<String>,

    /// New due date
    #[arg(short, long, conflicts_with = "no_due")]
    due: Option<String>,

    /// Remove the due date
    #[arg(long)]
    no_due: bool,

    #[arg(short, long)]
    priority: Option<i32>,

    /// Mark as done
    #[arg(long, conflicts_with = "undone")]
    done: bool,

    /// Mark as not done
    #[arg(long)]
    undone: bool,

    #[arg(long)]
    link: Option<String>,
}

impl EditArgs {
    fn edit(&self) -> Result<ItemEdit> {
        let mut edit = ItemEdit::new();
        if let Some(title) = &self.title {
            edit = edit.set(FieldChange::Title(title.clone()));
        }
        if let Some(body) = &self.body {
            edit = edit.set(FieldChange::Body(body.clone()));
        }
        if let Some(due) = &self.due {
            edit = edit.set(FieldChange::DueAt(Some(parse_datetime(due)?)));
        }
        if self.no_due {
            edit = edit.set(FieldChange::DueAt(None));
        }
        if let Some(priority) = self.priority {
            edit = edit.set(FieldChange::Priority(priority));
        }
        if self.done || self.undone {
            edit = edit.set(FieldChange::Completed(self.done));
        }
        if let Some(link) = &self.link {
            edit = edit.set(FieldChange::Deeplink(Some(link.clone())));
        }
        Ok(edit)
    }
}

pub async fn run(app: &App, args: EditArgs) -> Result<()> {
    let id = parse_item_id(&args.id)?;
    let edit = args.edit()?;
    if edit.is_empty() {
        anyhow::bail!("Nothing to change. See `tasklane edit --help` for the editable fields.");
    }

    let item = app.store().edit_item(&app.user, id, &edit).await?;

    println!("{} {}", "~".yellow(), item.render());
    for change in &edit.changes {
        println!("   {}", change.to_string().dimmed());
    }
    Ok(())
}
