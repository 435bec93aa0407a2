// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatrelay - a rate-limited HTTP relay for a hosted chat model.
//!
//! This is the binary entry point.

mod serve;
mod shutdown;

use std::path::PathBuf;

use chatrelay_config::RelayConfig;
use clap::{Parser, Subcommand};

/// Chatrelay - a rate-limited HTTP relay for a hosted chat model.
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve,
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chatrelay_config::load_and_validate_path(path),
        None => chatrelay_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            chatrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match render_config(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: failed to render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("chatrelay: use --help for available commands");
        }
    }
}

/// Renders `config` as TOML with the API token masked.
fn render_config(config: &RelayConfig) -> Result<String, toml::ser::Error> {
    let mut redacted = config.clone();
    if redacted.upstream.api_token.is_some() {
        redacted.upstream.api_token = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&redacted)
}
