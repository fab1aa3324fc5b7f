use anyhow::Result;
use owo_colors::OwoColorize;
use tasklane_core::config::TasklaneConfig;

use crate::app::App;

pub fn run(app: &App) -> Result<()> {
    let config_path = TasklaneConfig::config_path()?;
    let sync = &app.config.sync;

    println!("{}", "Paths".bold());
    println!("  Config:       {}", config_path.display());
    println!("  Data:         {}", app.config.data_path().display());
    println!("  Connections:  {}", app.user_dir().join("connections.toml").display());

    println!("\n{}", "Sync".bold());
    println!("  User:                 {}", app.user);
    println!(
        "  Max in flight:        {} ({} per user)",
        sync.max_in_flight, sync.max_in_flight_per_user
    );
    println!("  Page limit:           {}", sync.max_pages);
    println!("  Deletion threshold:   {} missed cycles", sync.deletion_threshold);
    println!("  Cycle timeout:        {}", humantime::format_duration(sync.cycle_timeout));
    println!("  Provider timeout:     {}", humantime::format_duration(sync.provider_timeout));
    println!("  GC retention:         {}", humantime::format_duration(sync.gc_retention));

    Ok(())
}
