// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use pageflow_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pageflow")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Serve and check page-based applications", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the pages of the current project
    Serve {
        /// Port to run the server on (default: from pageflow.toml)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (default: from pageflow.toml)
        #[arg(long)]
        host: Option<String>,
    },
    /// List discovered pages and their routes
    Routes,
    /// Compile every page and report errors
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(host, port).await,
        Commands::Routes => commands::routes::run(),
        Commands::Check => commands::check::run().await,
    }
}
