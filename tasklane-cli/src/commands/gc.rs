use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tasklane_core::Store;

use crate::app::App;

pub async fn run(app: &App, older_than: Option<&str>) -> Result<()> {
    let retention = match older_than {
        Some(raw) => humantime::parse_duration(raw)
            .with_context(|| format!("Invalid duration '{}'", raw))?,
        None => app.config.sync.gc_retention,
    };
    let cutoff = cutoff(Utc::now(), retention)?;

    let removed = app.store().collect_garbage(&app.user, cutoff).await?;

    println!(
        "Removed {} deleted items older than {}",
        removed,
        humantime::format_duration(retention)
    );
    Ok(())
}

fn cutoff(now: DateTime<Utc>, retention: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| now.checked_sub_signed(retention))
        .with_context(|| {
            format!(
                "Retention of {} reaches past the earliest representable date",
                humantime::format_duration(retention)
            )
        })
}
