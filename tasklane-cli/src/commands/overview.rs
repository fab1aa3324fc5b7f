use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use tasklane_core::overview::{self, Completion, OverviewFilter, SourceKind};

use crate::app::App;
use crate::render::Render;
use crate::utils::dates::parse_datetime;

#[derive(Args)]
pub struct OverviewArgs {
    /// Include completed items
    #[arg(short, long, conflicts_with = "completed")]
    all: bool,

    /// Only completed items
    #[arg(long)]
    completed: bool,

    /// Only items from these sources ("native" or a provider name), repeatable
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Only items due before this date
    #[arg(long)]
    due_before: Option<String>,

    /// Skip this many items
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Show at most this many items
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Show item ids (needed by `edit` and `delete`)
    #[arg(long)]
    ids: bool,
}

impl OverviewArgs {
    fn filter(&self) -> Result<OverviewFilter> {
        let completion = if self.all {
            Completion::All
        } else if self.completed {
            Completion::Completed
        } else {
            Completion::Incomplete
        };

        let sources = if self.sources.is_empty() {
            None
        } else {
            let parsed = self
                .sources
                .iter()
                .map(|s| s.parse::<SourceKind>().map_err(|e| anyhow::anyhow!(e)))
                .collect::<Result<BTreeSet<_>>>()?;
            Some(parsed)
        };

        let due_before = self.due_before.as_deref().map(parse_datetime).transpose()?;

        Ok(OverviewFilter {
            completion,
            sources,
            due_before,
            offset: self.offset,
            limit: self.limit,
        })
    }
}

pub async fn run(app: &App, args: OverviewArgs) -> Result<()> {
    let filter = args.filter()?;
    let items = overview::assemble(app.store(), &app.user, &filter).await?;

    if items.is_empty() {
        println!("{}", "Nothing to do".dimmed());
        return Ok(());
    }

    for item in &items {
        if args.ids {
            println!("{} {}", item.id.to_string().dimmed(), item.render());
        } else {
            println!("{}", item.render());
        }
        if let Some(link) = &item.deeplink {
            println!("    {}", link.dimmed());
        }
    }

    Ok(())
}
