//! pq - producer/consumer session runner
//!
//! CLI entry point: builds a session from config and flags, runs it until
//! Ctrl-C or a deadline, then drains and joins every task.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use pcqueue::cli::{Cli, Command, RunArgs};
use pcqueue::{Config, Coordinator, LogSink, Sink, ValueSource};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        None | Some("INFO") => tracing::Level::INFO,
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    debug!(?level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    match cli.command {
        Command::Run(args) => cmd_run(config, &args).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_run(mut config: Config, args: &RunArgs) -> Result<()> {
    args.apply(&mut config);
    debug!(?config, "cmd_run: effective config");

    let produced: Arc<dyn Sink<u64>> = Arc::new(LogSink::produced());
    let consumed: Arc<dyn Sink<u64>> = Arc::new(LogSink::consumed());
    // Producer i emits i + 1, so values show which producer made them
    let session = Coordinator::from_config(
        &config,
        |index| ValueSource::Fixed(index as u64 + 1),
        Some(produced),
        Some(consumed),
    )
    .context("Invalid session configuration")?;

    session.start_all();
    println!(
        "{} {} producers, {} consumers ({} strategy). Press Ctrl-C to stop.",
        "▶".green(),
        config.producers.to_string().cyan(),
        config.consumers.to_string().cyan(),
        config.strategy
    );

    let reason = wait_for_stop(args.duration_secs).await?;
    info!(%reason, "Stopping session");

    if args.no_drain {
        debug!("cmd_run: skipping drain");
    } else {
        session.stop_producers();
        if !session.wait_for_drain(config.drain_timeout()).await {
            warn!("Queue not empty after {:?}", config.drain_timeout());
        }
    }

    let summary = session.shutdown().await;
    let leftovers = session.queue().drain();

    println!("{} Session stopped ({})", "■".red(), reason);
    println!("  Produced: {}", summary.produced);
    println!("  Consumed: {}", summary.consumed);
    println!("  Peak queue length: {}", summary.stats.peak_len);
    if leftovers.is_empty() {
        println!("  Left in queue: {}", "0".green());
    } else {
        println!("  Left in queue: {} {:?}", leftovers.len().to_string().yellow(), leftovers);
    }
    for report in &summary.reports {
        println!(
            "    {} {} {}",
            report.role.to_string().dimmed(),
            report.id.short(),
            report.processed
        );
    }

    Ok(())
}

async fn wait_for_stop(duration_secs: Option<u64>) -> Result<&'static str> {
    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            Ok("interrupted")
        }
        _ = deadline => Ok("duration elapsed"),
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
