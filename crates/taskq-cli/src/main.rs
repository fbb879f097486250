//! taskq command-line driver
//!
//! Exercises task queues from the shell: round-by-round simulations and a
//! scripted RPC session whose calls complete through queue polling.

mod commands;
mod config;
mod telemetry;

use clap::{Parser, Subcommand};
use commands::{rpc, simulate};
use config::CliConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taskq")]
#[command(about = "Cooperative deferred-work queue toolkit", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./taskq.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless TASKQ_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one-shot and self-rescheduling tasks round by round
    Simulate {
        /// Number of one-shot tasks
        #[arg(short, long, default_value_t = 4)]
        tasks: usize,
        /// Number of tasks that reschedule themselves every run
        #[arg(short, long, default_value_t = 1)]
        spinners: usize,
        /// Number of proceed() rounds to run
        #[arg(short, long, default_value_t = 3)]
        rounds: usize,
    },

    /// Run a scripted RPC session against the in-process loopback server
    Rpc {
        /// Polls each response is withheld for (overrides config)
        #[arg(short, long)]
        latency: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry(cli.verbose);

    let config = CliConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Simulate {
            tasks,
            spinners,
            rounds,
        } => simulate::execute(
            &config.queue,
            simulate::SimulateArgs {
                tasks,
                spinners,
                rounds,
            },
        ),

        Commands::Rpc { latency } => rpc::execute(&config, rpc::RpcArgs { latency }),
    }
}
