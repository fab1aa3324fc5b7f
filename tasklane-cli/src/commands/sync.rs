use anyhow::Result;
use owo_colors::OwoColorize;
use tasklane_core::sync::CycleReport;

use crate::app::App;
use crate::render::Render;
use crate::utils::tui;

pub async fn run(app: &App, provider: Option<&str>) -> Result<()> {
    let providers = app.providers(provider)?;

    let spinner = tui::create_spinner(format!("Syncing {} providers", providers.len()));
    let report: CycleReport = match provider {
        Some(_) => {
            let kind = providers[0];
            let result = app.engine.run_cycle_for_provider(&app.user, kind).await;
            [(kind, result)].into_iter().collect()
        }
        None => app.engine.run_cycle(&app.user).await,
    };
    spinner.finish_and_clear();

    for (i, (kind, result)) in report.iter().enumerate() {
        println!("{}", kind.render());
        println!("{}", result.render());

        if i < report.len() - 1 {
            println!();
        }
    }

    let created: usize = report.values().map(|r| r.created).sum();
    let updated: usize = report.values().map(|r| r.updated).sum();
    let deleted: usize = report.values().map(|r| r.soft_deleted).sum();

    if created > 0 || updated > 0 || deleted > 0 {
        println!(
            "\nSynced: {} created, {} updated, {} deleted",
            created, updated, deleted
        );
    }

    check_failures(&report)
}

/// Fail the command when any provider failed, so scripts see a non-zero exit.
fn check_failures(report: &CycleReport) -> Result<()> {
    let failed = report.values().filter(|r| r.failed).count();
    if failed > 0 {
        anyhow::bail!("{}", format!("{} of {} providers failed", failed, report.len()).red());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklane_core::{ErrorKind, ProviderKind, SyncResult};

    #[test]
    fn any_failed_provider_fails_the_command() {
        let mut report = CycleReport::new();
        report.insert(
            ProviderKind::Jira,
            SyncResult {
                created: 3,
                ..SyncResult::default()
            },
        );
        assert!(check_failures(&report).is_ok());

        report.insert(
            ProviderKind::Slack,
            SyncResult::failed(ErrorKind::RateLimited, "slow down"),
        );
        let err = check_failures(&report).unwrap_err();
        assert!(err.to_string().contains("1 of 2 providers failed"));
    }
}
