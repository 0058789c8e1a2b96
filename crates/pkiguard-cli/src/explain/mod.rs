//! `pkiguard explain` command implementation.
//!
//! Prints the effective TLS values for every layer and profile together with
//! the key that supplied each one.

use anyhow::{Context, Result};
use clap::Args;
use pkiguard_core::{
    LayerTls, NetworkLayer, RealmCatalog, RealmConfig, Resolved, TlsProfile, TlsProfileResolver,
};
use serde::Serialize;

use crate::ConfigArgs;

/// Arguments for `pkiguard explain`.
#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output JSON instead of human-readable format.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ExplainReport {
    pki_realms: Vec<RealmConfig>,
    layers: Vec<LayerTls>,
}

/// Run the explain command. Always exits 0 once settings resolve.
pub fn run(args: &ExplainArgs) -> Result<u8> {
    let settings = args.config.load()?;
    let pki_realms =
        RealmCatalog::enabled_pki_realms(&settings).context("failed to read realm settings")?;
    let layers = NetworkLayer::ALL
        .iter()
        .map(|layer| {
            TlsProfileResolver::resolve_layer(&settings, *layer)
                .with_context(|| format!("failed to resolve {layer} TLS settings"))
        })
        .collect::<Result<Vec<_>>>()?;

    let report = ExplainReport { pki_realms, layers };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human_readable(&report);
    }
    Ok(0)
}

fn print_human_readable(report: &ExplainReport) {
    println!();
    println!("TLS Resolution");
    println!("══════════════");

    for layer in &report.layers {
        println!();
        println!("{}:", layer.layer);
        for profile in layer.all_profiles() {
            print_profile(profile);
        }
    }

    println!();
    if report.pki_realms.is_empty() {
        println!("PKI realms: (none enabled)");
    } else {
        let names = report
            .pki_realms
            .iter()
            .map(|realm| realm.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("PKI realms: {names}");
    }
}

fn print_profile(profile: &TlsProfile) {
    let marker = if profile.accepts_client_certificates() {
        "✓"
    } else {
        "✗"
    };
    println!("  {marker} {}", profile.name);
    println!(
        "      ssl_enabled = {:<9} {}",
        profile.ssl_enabled.value,
        describe_source(&profile.ssl_enabled)
    );
    println!(
        "      client_auth = {:<9} {}",
        profile.client_auth.value.as_str(),
        describe_source(&profile.client_auth)
    );
    if let Some(keystore) = &profile.keystore {
        println!(
            "      keystore    = {} (password {})",
            keystore.path,
            if keystore.has_password {
                "set"
            } else {
                "not set"
            }
        );
    }
}

fn describe_source<T>(resolved: &Resolved<T>) -> String {
    match &resolved.key {
        Some(key) => format!("({} key {key})", resolved.source),
        None => format!("({})", resolved.source),
    }
}
