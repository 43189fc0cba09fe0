//! Sticky - verified offline cache with pinned worker updates
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use sticky::cli::{Cli, CommandContext, Commands, LogFormat};
use sticky::config::{ConfigManager, StatePaths};
use sticky::error::StickyResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StickyResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("sticky=warn"),
        1 => EnvFilter::new("sticky=info"),
        _ => EnvFilter::new("sticky=debug"),
    };

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    // Completions don't need config loading
    if let Commands::Completions(args) = cli.command {
        return sticky::cli::commands::completions(args);
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;
    let paths = StatePaths::resolve(cli.state_dir.as_deref(), &config);
    debug!("State directory: {}", paths.root().display());

    let ctx = CommandContext::new(config, config_manager.path().to_path_buf(), paths);

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Manifest(args) => sticky::cli::commands::manifest(args, &ctx).await,
        Commands::Resolve(args) => sticky::cli::commands::resolve(args, &ctx).await,
        Commands::Precache(args) => sticky::cli::commands::precache(args, &ctx).await,
        Commands::Get(args) => sticky::cli::commands::get(args, &ctx).await,
        Commands::Register(args) => sticky::cli::commands::register(args, &ctx).await,
        Commands::Update(args) => sticky::cli::commands::update(args, &ctx).await,
        Commands::Status(args) => sticky::cli::commands::status(args, &ctx).await,
        Commands::Reset(args) => sticky::cli::commands::reset(args, &ctx).await,
        Commands::Config(args) => sticky::cli::commands::config(args, &ctx).await,
    }
}
