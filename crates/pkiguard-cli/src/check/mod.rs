//! `pkiguard check` command implementation.

use anyhow::{Context, Result};
use clap::Args;
use pkiguard_core::{BootstrapCheckResult, PkiCheckReport, PkiRealmBootstrapCheck};

use crate::{ConfigArgs, EXIT_CHECK_FAILED};

/// Arguments for `pkiguard check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output JSON instead of human-readable format.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Run the check command and return the process exit code.
pub fn run(args: &CheckArgs) -> Result<u8> {
    let settings = args.config.load()?;
    let report = PkiRealmBootstrapCheck::for_settings(&settings)
        .evaluate(&settings)
        .context("failed to read settings for the PKI realm check")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human_readable(&report);
    }

    Ok(if report.result.is_failure() {
        EXIT_CHECK_FAILED
    } else {
        0
    })
}

fn print_human_readable(report: &PkiCheckReport) {
    match &report.result {
        BootstrapCheckResult::Success => {
            if report.realms.is_empty() {
                println!("PKI realm check: PASS (no enabled PKI realm)");
            } else if let Some(by) = &report.satisfied_by {
                println!(
                    "PKI realm check: PASS ({} profile `{}` accepts client certificates)",
                    by.layer, by.profile
                );
            } else {
                println!("PKI realm check: PASS");
            }
        }
        BootstrapCheckResult::Failure { message } => {
            println!("PKI realm check: FAIL");
            println!("  {message}");
        }
    }
}
