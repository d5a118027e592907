mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use commands::Context;
use error::CliError;
use lootbox::chains::parse_chain_id;
use lootbox::ChainManifest;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv(); // load .env if present, before clap reads env vars

    let cli = Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = setup_signal_handlers();

    if let Err(e) = run(cli, cancel).await {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), CliError> {
    let chain_id = parse_chain_id(&cli.chain)?;
    let manifest = match &cli.manifest {
        Some(source) => ChainManifest::load(source).await?,
        None => ChainManifest::builtin(),
    };
    info!(chain_id, chains = manifest.len(), json = cli.json, "lootbox starting");

    let ctx = Context {
        manifest: Arc::new(manifest),
        chain_id,
        lootbox: cli.lootbox,
        provider_cache: cli.provider_cache,
        out: output::Output::new(cli.json),
        cancel,
    };

    match cli.command {
        Command::Chains => commands::chains(&ctx),
        Command::Balance(args) => commands::balance(&ctx, args).await,
        Command::Deposits => commands::deposits(&ctx).await,
        Command::Deposit(args) => commands::deposit(&ctx, args).await,
        Command::SwitchNetwork(args) => commands::switch_network(&ctx, args).await,
        Command::MaxTickets(args) => commands::max_tickets(&ctx, args).await,
        Command::Flush(args) => commands::flush(&ctx, args).await,
    }
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("received SIGTERM, shutting down");
                    cancel_clone.cancel();
                }
                Err(e) => error!(error = %e, "failed to register SIGTERM handler"),
            }
        });
    }

    cancel
}
