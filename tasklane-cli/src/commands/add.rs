use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;
use tasklane_core::NewItem;
use tasklane_core::store;

use crate::app::App;
use crate::render::Render;
use crate::utils::dates::parse_datetime;

pub async fn run(
    app: &App,
    title: String,
    due: Option<&str>,
    priority: i32,
    body: String,
    link: Option<String>,
) -> Result<()> {
    let new = NewItem {
        title,
        body,
        due_at: due.map(parse_datetime).transpose()?,
        priority,
        deeplink: link,
    };

    let item = store::create_native(app.store(), &app.user, new, Utc::now()).await?;

    println!("{} {}", "+".green(), item.render());
    println!("  {}", item.id.to_string().dimmed());
    Ok(())
}
