//! Command-line interface.

use crate::logging;
use crate::paths::Toolchain;
use crate::server;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::error;

/// droidpilot - Android development tool server
#[derive(Parser)]
#[command(name = "droidpilot")]
#[command(about = "Android development operations (Gradle, ADB, emulators, APK inspection) over a uniform stdio contract")]
#[command(version)]
pub struct Cli {
    /// Verbose logging (debug level, targets shown)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve newline-delimited JSON requests on stdin (default)
    Serve,
    /// Print the operation catalog as JSON
    Tools,
}

/// CLI entrypoint; handles all output including errors.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Tools => {
            match serde_json::to_string_pretty(server::CATALOG) {
                Ok(catalog) => {
                    println!("{catalog}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("failed to render catalog: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Serve => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("failed to start async runtime: {e}");
                    return ExitCode::FAILURE;
                }
            };
            runtime.block_on(async {
                let toolchain = match Toolchain::detect() {
                    Ok(toolchain) => toolchain,
                    Err(e) => {
                        error!("{e}");
                        return ExitCode::FAILURE;
                    }
                };
                match server::serve(toolchain).await {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(e) => {
                        error!("server error: {e:#}");
                        ExitCode::FAILURE
                    }
                }
            })
        }
    }
}
