//! Terminal rendering for tasklane-core types using owo_colors.

use chrono::Local;
use owo_colors::OwoColorize;
use tasklane_core::item::{Item, Source};
use tasklane_core::provider::ProviderKind;
use tasklane_core::reconcile::{ChangeKind, ReconcilePlan};
use tasklane_core::sync::SyncResult;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for ChangeKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            ChangeKind::Create => symbol.green().to_string(),
            ChangeKind::Update => symbol.yellow().to_string(),
            ChangeKind::SoftDelete => symbol.red().to_string(),
        }
    }
}

fn colorize_change(kind: ChangeKind, text: &str) -> String {
    match kind {
        ChangeKind::Create => text.green().to_string(),
        ChangeKind::Update => text.yellow().to_string(),
        ChangeKind::SoftDelete => text.red().to_string(),
    }
}

impl Render for ProviderKind {
    fn render(&self) -> String {
        format!("▸ {}", self.details().name)
    }
}

impl Render for Item {
    fn render(&self) -> String {
        let check = if self.is_completed { "[x]" } else { "[ ]" };
        let due = self
            .due_at
            .map(|d| d.with_timezone(&Local).format("%a %b %-d %H:%M").to_string())
            .unwrap_or_default();
        let source = match &self.source {
            Source::Native => "native".to_string(),
            Source::External(r) => r.provider.to_string(),
        };
        let priority = if self.priority != 0 {
            format!(" p{}", self.priority)
        } else {
            String::new()
        };

        format!(
            "{} {}{} {} {}",
            check,
            self.title,
            priority.yellow(),
            due.cyan(),
            source.dimmed()
        )
    }
}

/// Above this many changes, `status` shows counts instead of titles.
const COMPACT_THRESHOLD: usize = 5;

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

impl Render for SyncResult {
    fn render(&self) -> String {
        if self.failed {
            let kind = self.error_kind.map(|k| k.to_string()).unwrap_or_default();
            let message = self.error.clone().unwrap_or_default();
            return format!("   {} {}", format!("failed ({kind})").red(), message.dimmed());
        }

        let mut lines = Vec::new();
        if self.has_changes() {
            lines.push(format!(
                "   {} {} {}",
                format!("+{}", self.created).green(),
                format!("~{}", self.updated).yellow(),
                format!("-{}", self.soft_deleted).red()
            ));
        } else {
            lines.push("   No changes".dimmed().to_string());
        }
        if self.skipped > 0 {
            let label = format!("{} {} skipped", self.skipped, pluralize("item", self.skipped));
            lines.push(format!("   {}", label.yellow()));
        }
        if self.truncated {
            lines.push(format!(
                "   {}",
                "Listing truncated at the page limit; deletions not checked".yellow()
            ));
        }
        lines.join("\n")
    }
}

pub trait PlanRender {
    fn render(&self, verbose: bool) -> String;
}

impl PlanRender for ReconcilePlan {
    fn render(&self, verbose: bool) -> String {
        let changes = self.changes();
        if changes.is_empty() {
            return "   No changes".dimmed().to_string();
        }

        if verbose || changes.len() <= COMPACT_THRESHOLD {
            let mut lines = Vec::new();
            for (kind, title) in &changes {
                lines.push(format!("   {} {}", kind.render(), colorize_change(*kind, title)));
            }
            if verbose {
                for update in &self.to_update {
                    for change in &update.changes {
                        lines.push(format!("      {}", change.to_string().dimmed()));
                    }
                }
            }
            return lines.join("\n");
        }

        let (created, updated, deleted) = self.counts();
        let mut lines = Vec::new();
        if created > 0 {
            let label = format!("({} new {})", created, pluralize("item", created));
            lines.push(format!("   {} {}", "+".green(), label.green()));
        }
        if updated > 0 {
            let label = format!("({} changed {})", updated, pluralize("item", updated));
            lines.push(format!("   {} {}", "~".yellow(), label.yellow()));
        }
        if deleted > 0 {
            let label = format!("({} deleted {})", deleted, pluralize("item", deleted));
            lines.push(format!("   {} {}", "-".red(), label.red()));
        }
        lines.join("\n")
    }
}
