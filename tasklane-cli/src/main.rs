mod app;
mod commands;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::commands::edit::EditArgs;
use crate::commands::overview::OverviewArgs;

#[derive(Parser)]
#[command(name = "tasklane")]
#[command(about = "All your tasks and events, from every provider, in one list")]
struct Cli {
    /// Act as this user instead of the configured default
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Show detailed output and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull items from connected providers
    Sync {
        /// Only sync this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Show what the next sync would change, without changing anything
    Status {
        /// Only check this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// List items, soonest first
    Overview(OverviewArgs),
    /// Create a native item
    Add {
        title: String,

        /// Due date (e.g., "2025-03-20" or "2025-03-20T15:00")
        #[arg(short, long)]
        due: Option<String>,

        #[arg(short, long, default_value_t = 0)]
        priority: i32,

        #[arg(short, long, default_value = "")]
        body: String,

        /// Link to open the item elsewhere
        #[arg(long)]
        link: Option<String>,
    },
    /// Edit an item. Edited fields are kept even when the provider changes them
    Edit(EditArgs),
    /// Delete a native item
    Delete { id: String },
    /// Permanently remove items deleted longer ago than the retention window
    Gc {
        /// Retention window (e.g., "30days"), defaults to the configured one
        #[arg(long)]
        older_than: Option<String>,
    },
    /// Forget the sync position of a provider and pull everything again
    Resync { provider: String },
    /// Connect a provider
    Connect {
        provider: String,

        /// Provider parameter as key=value, repeatable
        #[arg(short = 'o', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// Disconnect a provider
    Disconnect { provider: String },
    /// List known providers and their connection state
    Providers,
    /// Show configuration paths and sync settings
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tasklane=debug,tasklane_core=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = App::load(cli.user.as_deref())?;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Sync { provider } => commands::sync::run(&app, provider.as_deref()).await,
        Commands::Status { provider } => {
            commands::status::run(&app, provider.as_deref(), verbose).await
        }
        Commands::Overview(args) => commands::overview::run(&app, args).await,
        Commands::Add {
            title,
            due,
            priority,
            body,
            link,
        } => commands::add::run(&app, title, due.as_deref(), priority, body, link).await,
        Commands::Edit(args) => commands::edit::run(&app, args).await,
        Commands::Delete { id } => commands::delete::run(&app, &id).await,
        Commands::Gc { older_than } => commands::gc::run(&app, older_than.as_deref()).await,
        Commands::Resync { provider } => commands::resync::run(&app, &provider).await,
        Commands::Connect { provider, params } => commands::connect::run(&app, &provider, &params),
        Commands::Disconnect { provider } => commands::connect::disconnect(&app, &provider),
        Commands::Providers => commands::providers::run(&app),
        Commands::Config => commands::config::run(&app),
    }
}
