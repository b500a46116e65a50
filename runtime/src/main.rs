// Copyright 2026 Slipscan Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use slipscan::Strategy;
use slipscan_runtime::cli;
use slipscan_runtime::cli::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "slipscan",
    about = "Slipscan: extract transaction and product data from receipt and shop pages",
    version,
    after_help = "Run 'slipscan <command> --help' for details on each command."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.slipscan/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire one or more URLs and extract their data
    Scrape {
        /// URLs to scrape
        #[arg(required = true)]
        urls: Vec<String>,
        /// Acquisition strategy (auto, direct, rendered)
        #[arg(long, default_value = "auto")]
        strategy: Strategy,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        /// Give up on each URL after this many seconds
        #[arg(long)]
        deadline: Option<u64>,
        /// URLs processed concurrently
        #[arg(long, default_value = "4")]
        jobs: usize,
    },
    /// Extract from a saved HTML file
    Extract {
        /// Markup file
        file: PathBuf,
        /// URL the markup came from (selects the site profile)
        #[arg(long)]
        url: String,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    /// List site profiles in the pattern library
    Profiles,
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Scrape {
            urls,
            strategy,
            format,
            deadline,
            jobs,
        } => cli::scrape_cmd::run(&urls, strategy, format, config, deadline, jobs).await,
        Commands::Extract { file, url, format } => {
            cli::extract_cmd::run(&file, &url, format, config)
        }
        Commands::Profiles => cli::profiles_cmd::run(config).map(|_| true),
        Commands::Doctor => cli::doctor::run(config).await.map(|_| true),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "slipscan", &mut std::io::stdout());
            Ok(true)
        }
    };

    // Exit codes: 0 = every envelope succeeded, 1 = failure or error
    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("  Error: {e:#}");
            std::process::exit(1);
        }
    }
}
