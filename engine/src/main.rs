// FitPlan plan generator
// Main entry point for the fitplan binary

use clap::Parser;
use fitplan_engine::cli::{Cli, Command, ConfigAction, KeyAction};
use fitplan_engine::config::Config;
use fitplan_engine::handlers::{
    handle_config_path, handle_config_show, handle_estimate, handle_generate, handle_key_delete,
    handle_key_set, OutputFormat,
};
use fitplan_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = match &cli.config {
        Some(config_path) => Config::load_from_path(config_path),
        None => Config::load_or_create(),
    };

    // --log wins over the configured level; RUST_LOG wins over both
    let log_level = cli
        .log
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.core.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_telemetry_with_level(&log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("FitPlan v{} ({} - {})", version, commit, timestamp);

    let config = config?;

    // Handle commands
    match cli.command {
        Command::Generate { profile, out } => {
            tracing::info!("Generating plans from {:?}", profile);
            handle_generate(&profile, out, &config, format).await
        }

        Command::Estimate { profile } => {
            tracing::info!("Estimating segment from {:?}", profile);
            handle_estimate(&profile, format)
        }

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(cli.config.as_deref(), format),
        },

        Command::Key { action } => match action {
            KeyAction::Set => handle_key_set(),
            KeyAction::Delete => handle_key_delete(),
        },
    }
}
