use anyhow::Result;
use owo_colors::OwoColorize;
use tasklane_core::ProviderKind;

use crate::app::App;

pub fn run(app: &App) -> Result<()> {
    let connected = app.engine.connected(&app.user);

    for kind in ProviderKind::ALL {
        let details = kind.details();
        let state = if connected.contains(&kind) {
            "connected".green().to_string()
        } else {
            "-".dimmed().to_string()
        };

        let mut traits = Vec::new();
        if details.is_completable {
            traits.push("completable");
        }
        if details.is_replyable {
            traits.push("replyable");
        }

        println!(
            "{:<18} {:<16} {:<12} {}",
            details.name,
            kind.name().dimmed(),
            state,
            traits.join(", ").dimmed()
        );
    }

    Ok(())
}
