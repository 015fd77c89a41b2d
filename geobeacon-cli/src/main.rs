//! geobeacon CLI - Command-line interface
//!
//! This binary replays recorded tracks through the geobeacon tracking
//! runtime and manages the user configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::{AuthorizationArg, RunArgs};

#[derive(Parser)]
#[command(name = "geobeacon")]
#[command(version = geobeacon::VERSION)]
#[command(about = "Track a position and upload it to a remote endpoint", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded track through the tracking runtime
    Run {
        /// CSV track file (offset_secs,lat,lon,accuracy[,heading])
        #[arg(long)]
        track: PathBuf,

        /// Authorization the location service reports
        #[arg(long, value_enum, default_value_t = AuthorizationArg::Always)]
        authorization: AuthorizationArg,

        /// Simulate the app entering the background after this many seconds
        #[arg(long, value_name = "SECS")]
        background_after: Option<u64>,

        /// Simulate the app becoming active again after this many seconds
        #[arg(long, value_name = "SECS")]
        foreground_after: Option<u64>,

        /// Enable debug logging on the console and in the log file
        #[arg(long)]
        debug: bool,

        /// Acknowledge uploads locally instead of contacting the endpoint
        #[arg(long)]
        dry_run: bool,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            track,
            authorization,
            background_after,
            foreground_after,
            debug,
            dry_run,
        } => commands::run::run(RunArgs {
            track,
            authorization,
            background_after,
            foreground_after,
            debug,
            dry_run,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
