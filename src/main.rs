//! natlb binary entry point.

use clap::{Parser, Subcommand};
use natlb::config::{BasicValidator, BindConflictValidator, ConfigLoader};
use natlb::modules::health_check;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "natlb", version)]
#[command(about = "Kernel-NAT layer-4 load balancer with health-checked backend pools")]
struct Args {
    /// Configuration file to load
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Insert jumps to the managed chains into PREROUTING / POSTROUTING
    #[arg(short = 'e', long)]
    enable_managed_chain: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Display the available settings for a check type
    Checkhelp {
        /// Check type to describe (tcp, http, smtp)
        check_type: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("natlb={}", args.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(Command::Checkhelp { check_type }) = args.command {
        return checkhelp(&check_type);
    }

    let loader = ConfigLoader::new()
        .with_validator(BasicValidator::new())
        .with_validator(BindConflictValidator::new());
    let config = match loader.load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "loading config file");
            return ExitCode::FAILURE;
        }
    };

    info!(config = %args.config.display(), "starting natlb");

    match natlb::orchestrator::run(config, args.enable_managed_chain).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "balancer failed");
            ExitCode::FAILURE
        }
    }
}

/// Print the settings table for one check type.
fn checkhelp(check_type: &str) -> ExitCode {
    let Some(check) = health_check::by_name(check_type) else {
        eprintln!(
            "check '{}' not found, known checks: {}",
            check_type,
            health_check::KNOWN_CHECKS.join(", ")
        );
        return ExitCode::FAILURE;
    };

    let help = check.help();
    let name_width = help.iter().map(|h| h.name.len()).max().unwrap_or(0).max(7);
    let default_width = help
        .iter()
        .map(|h| h.default.len())
        .max()
        .unwrap_or(0)
        .max(7);

    println!("{:name_width$}  {:default_width$}  Description", "Setting", "Default");
    for row in help {
        println!(
            "{:name_width$}  {:default_width$}  {}",
            row.name, row.default, row.description
        );
    }

    ExitCode::SUCCESS
}
