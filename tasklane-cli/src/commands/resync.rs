use anyhow::Result;

use crate::app::{App, parse_provider};
use crate::render::Render;
use crate::utils::tui;

pub async fn run(app: &App, provider: &str) -> Result<()> {
    let kind = parse_provider(provider)?;
    app.providers(Some(kind.name()))?;

    let spinner = tui::create_spinner(format!("Resyncing {}", kind.details().name));
    let result = app.engine.full_resync(&app.user, kind).await;
    spinner.finish_and_clear();

    println!("{}", kind.render());
    println!("{}", result.render());
    Ok(())
}
