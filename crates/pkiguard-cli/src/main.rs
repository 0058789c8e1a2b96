//! `pkiguard` - run the PKI realm bootstrap check against a node config.
//!
//! # Usage
//!
//! ```text
//! # Does this config start?
//! pkiguard check --config node.toml
//!
//! # Try an override without editing the file
//! pkiguard check --config node.toml --set transport.ssl.enabled=true
//!
//! # Where did each TLS value come from?
//! pkiguard explain --config node.yaml --json
//! ```
//!
//! Exit codes: 0 = pass, 1 = check failed, 2 = config could not be read.

#![forbid(unsafe_code)]

mod check;
mod explain;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pkiguard_core::Settings;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code when the check fails.
pub const EXIT_CHECK_FAILED: u8 = 1;
/// Exit code when settings cannot be loaded or read.
pub const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "pkiguard", version, about = "PKI realm bootstrap check")]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the PKI realm bootstrap check.
    Check(check::CheckArgs),
    /// Show how TLS settings resolve for every layer and profile.
    Explain(explain::ExplainArgs),
}

/// Where settings come from.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Node configuration file (.toml, .yml, .yaml or .json).
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Override a setting (repeatable).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

impl ConfigArgs {
    /// Load the file and apply overrides.
    pub fn load(&self) -> Result<Settings> {
        let settings = pkiguard_core::load_settings(&self.config)
            .with_context(|| format!("failed to load settings from {}", self.config.display()))?;
        let settings = pkiguard_core::apply_overrides(&settings, &self.overrides)
            .context("failed to apply --set overrides")?;
        tracing::debug!(
            config = %self.config.display(),
            overrides = self.overrides.len(),
            keys = settings.len(),
            "Settings ready"
        );
        Ok(settings)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let outcome = match cli.command {
        Command::Check(args) => check::run(&args),
        Command::Explain(args) => explain::run(&args),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}
