//! pairchat CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use pairchat_client::cli::{Cli, Command, ConfigAction};
use pairchat_client::commands;
use pairchat_client::config::ClientConfig;
use pairchat_client::error::ClientResult;
use pairchat_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    // Load configuration
    let config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path)?
    } else {
        ClientConfig::load()?
    };

    // Initialize tracing
    let debug = cli.debug || config.debug;
    let mut tracing_config = match cli.command {
        Command::Relay { .. } if debug => {
            TracingConfig::relay().with_level(tracing::Level::DEBUG)
        }
        Command::Relay { .. } => TracingConfig::relay(),
        _ => TracingConfig::interactive(debug),
    };
    if let Some(format) = cli.log_format {
        tracing_config = tracing_config.with_format(format.into());
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match cli.command {
        Command::Relay { bind, max_peers } => commands::relay::run(&config, bind, max_peers).await,
        Command::Chat { relay, name } => commands::chat::run(&config, relay, name).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
