//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::consumer::ConsumeStrategy;

/// pq - run producer/consumer sessions over a shared queue
#[derive(Parser, Debug)]
#[command(name = "pq", author, version, about = "Producer/consumer sessions over a lock-guarded queue", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a session until Ctrl-C (or --duration-secs), then drain and stop
    Run(RunArgs),

    /// Print the effective configuration as YAML
    Config,
}

/// Overrides for a single run; unset flags keep the config value
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of producers
    #[arg(short, long)]
    pub producers: Option<usize>,

    /// Number of consumers
    #[arg(short = 'n', long)]
    pub consumers: Option<usize>,

    /// Milliseconds between enqueues
    #[arg(long)]
    pub producer_interval_ms: Option<u64>,

    /// Milliseconds between dequeue attempts
    #[arg(long)]
    pub consumer_interval_ms: Option<u64>,

    /// poll or block
    #[arg(short, long)]
    pub strategy: Option<ConsumeStrategy>,

    /// Stop automatically after this many seconds
    #[arg(short, long)]
    pub duration_secs: Option<u64>,

    /// Skip waiting for consumers to empty the queue
    #[arg(long)]
    pub no_drain: bool,
}

impl RunArgs {
    /// Layer the flags over `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(producers) = self.producers {
            config.producers = producers;
        }
        if let Some(consumers) = self.consumers {
            config.consumers = consumers;
        }
        if let Some(ms) = self.producer_interval_ms {
            config.producer_interval_ms = ms;
        }
        if let Some(ms) = self.consumer_interval_ms {
            config.consumer_interval_ms = ms;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
    }
}
