//! DB.Coach - streaming database design assistant
//!
#![doc = "Main entry point for the dbcoach command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dbcoach::cli::{Cli, Commands};
use dbcoach::commands;
use dbcoach::config::Config;
use dbcoach::storage::create_storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Generate {
            prompt,
            db_type,
            offline,
            no_save,
        } => {
            tracing::info!("Starting generation for {}", db_type);
            let options = commands::generate::GenerateOptions {
                prompt,
                db_type,
                offline,
                no_save,
            };
            commands::generate::run_generate(&config, options).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            let storage = create_storage(&config.storage)?;
            commands::history::handle_history(command, storage.as_ref(), config.user.id.as_deref())
                .await?;
            Ok(())
        }
        Commands::Migrate { clear_local } => {
            tracing::info!("Starting migration to hosted storage");
            commands::migrate::run_migrate(&config, clear_local).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "dbcoach=debug" } else { "dbcoach=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
