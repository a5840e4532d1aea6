// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - chat backend with a streaming generation engine.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parley_config::{ConfigError, ParleyConfig};

/// Parley - chat backend with a streaming generation engine.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Validate configuration and print diagnostics.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<ParleyConfig, Vec<ConfigError>> {
    match path {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = match load(cli.config.as_ref()) {
                Ok(config) => config,
                Err(errors) => {
                    parley_config::render_errors(&errors);
                    std::process::exit(1);
                }
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("parley: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => match load(cli.config.as_ref()) {
            Ok(config) => {
                println!(
                    "parley: config ok ({} models, {} workers, listening on {}:{})",
                    config.models.len(),
                    config.engine.workers,
                    config.server.host,
                    config.server.port
                );
            }
            Err(errors) => {
                parley_config::render_errors(&errors);
                std::process::exit(1);
            }
        },
        None => {
            println!("parley: use --help for available commands");
        }
    }
}
