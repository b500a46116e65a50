//! `slipscan profiles`: list the pattern library.

use anyhow::Result;
use std::path::Path;

use crate::config::RuntimeConfig;
use crate::pipeline::load_library;

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = RuntimeConfig::load(config_path)?;
    let library = load_library(&config)?;

    println!("{:<10} {:>6}  {:<24} HOSTS", "PROFILE", "RULES", "IDENTIFIER");
    for profile in library.profiles().iter().chain(std::iter::once(library.fallback())) {
        let ident = if profile.identifier_params().is_empty() {
            "-".to_string()
        } else {
            let params = profile.identifier_params().join(",");
            if profile.requires_identifier() {
                format!("{params} (required)")
            } else {
                params
            }
        };
        let hosts = if profile.hosts().is_empty() {
            "(fallback)".to_string()
        } else {
            profile.hosts().join(", ")
        };
        println!(
            "{:<10} {:>6}  {:<24} {}",
            profile.name(),
            profile.rule_count(),
            ident,
            hosts
        );
    }
    Ok(())
}
