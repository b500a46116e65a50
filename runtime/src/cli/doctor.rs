//! Environment readiness check.

use anyhow::Result;
use std::path::Path;

use crate::config::RuntimeConfig;
use crate::pipeline::load_library;
use crate::renderer::chromium::find_chromium;

/// Report the Chromium binary, config source and pattern library state.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    println!("Slipscan Doctor");
    println!("===============");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let config = match RuntimeConfig::load(config_path) {
        Ok(config) => {
            match &config.source {
                Some(path) => println!("[OK] Config loaded from {}", path.display()),
                None => println!("[OK] No config file; using defaults"),
            }
            config
        }
        Err(e) => {
            println!("[!!] Config error: {e:#}");
            RuntimeConfig::default()
        }
    };

    let chromium = find_chromium(config.chromium_path.as_deref());
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set SLIPSCAN_CHROMIUM_PATH."
        ),
    }

    let library_ok = match load_library(&config) {
        Ok(library) => {
            println!(
                "[OK] Pattern library: {} profile(s) + `{}` fallback",
                library.profiles().len(),
                library.fallback().name()
            );
            true
        }
        Err(e) => {
            println!("[!!] Pattern library error: {e:#}");
            false
        }
    };

    println!(
        "[OK] Render concurrency limit: {}",
        config.max_concurrent_renders
    );

    println!();
    if chromium.is_some() && library_ok {
        println!("Status: READY");
    } else if library_ok {
        println!("Status: DIRECT ONLY (rendered fetches will fail)");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
