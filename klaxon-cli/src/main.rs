mod cli;
mod config;
mod logging;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use klaxon_engine::{
    CommandAlarm, HttpMessageSource, Interrupts, KlaxonConfig, StreamSupervisor,
    SupervisorSettings, TerminalPrompt, TermuxVolume, VolumeControl, spawn_signal_listener,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    cli::{Args, Commands},
    config::AppConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Application error: {e:#}");
            eprintln!("Error: {e:#}");
            1
        }
    };
    // The stdin reader may still be parked on a blocking read; exiting here
    // keeps the runtime from waiting on it.
    process::exit(code);
}

async fn run(args: Args) -> Result<()> {
    let _log_guard = logging::init_logging(args.verbose, args.quiet, args.log_dir.as_deref())?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply(&args.overrides);
    config.klaxon.validate()?;

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => daemon(config.klaxon).await,
        Commands::Config { show } => {
            if show {
                print!("{}", config.show()?);
            } else {
                println!("Use --show to display the effective configuration");
            }
            Ok(())
        }
        Commands::Check => check(&config.klaxon).await,
    }
}

async fn daemon(config: KlaxonConfig) -> Result<()> {
    info!(
        feed_url = %config.feed_url,
        alarm_file = %config.alarm_file.display(),
        ack_timeout_secs = config.ack_timeout_secs,
        recovery_sleep_secs = config.recovery_sleep_secs,
        "Starting klaxon"
    );

    let shutdown = CancellationToken::new();
    let interrupts = Interrupts::new(shutdown.clone());
    let signals =
        spawn_signal_listener(interrupts.clone()).context("failed to install signal handlers")?;

    let source = HttpMessageSource::with_connect_timeout(config.connect_timeout())?;
    let volume = TermuxVolume::new(config.commands.volume.clone());
    let alarm = CommandAlarm::from_config(&config);
    let prompt = TerminalPrompt::stdio()
        .with_affirmative(config.affirmative.clone())
        .with_interrupts(interrupts);

    let supervisor = StreamSupervisor::new(
        Arc::new(source),
        Arc::new(volume),
        Arc::new(alarm),
        Box::new(prompt),
        SupervisorSettings::from(&config),
        shutdown,
    );
    let stats = supervisor.run().await;
    signals.abort();

    info!(
        connections = stats.connections,
        reconnects = stats.reconnects,
        episodes = stats.episodes,
        acknowledged = stats.acknowledged,
        "Klaxon stopped"
    );
    Ok(())
}

async fn check(config: &KlaxonConfig) -> Result<()> {
    let volume = TermuxVolume::new(config.commands.volume.clone());
    let snapshot = volume
        .get()
        .await
        .with_context(|| format!("`{}` did not report the volume", config.commands.volume))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
