use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::App;
use crate::render::{PlanRender, Render};
use crate::utils::tui;

pub async fn run(app: &App, provider: Option<&str>, verbose: bool) -> Result<()> {
    let providers = app.providers(provider)?;

    for (i, kind) in providers.iter().enumerate() {
        let spinner = tui::create_spinner(kind.render());
        let result = app.engine.preview(&app.user, *kind).await;
        spinner.finish_and_clear();

        println!("{}", kind.render());

        match result {
            Ok(plan) => {
                println!("{}", plan.render(verbose));
                if plan.skipped > 0 {
                    println!("   {}", format!("{} items without identity", plan.skipped).yellow());
                }
            }
            Err(e) => println!("   {}", e.to_string().red()),
        }

        if i < providers.len() - 1 {
            println!();
        }
    }

    Ok(())
}
