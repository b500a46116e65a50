// Copyright 2026 Slipscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser identity and anti-detection flags for the render subprocess.

use rand::seq::SliceRandom;

/// Identity used for direct fetches when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.6422.141 Safari/537.36";

/// Plausible desktop Chromium identities; one is picked per render attempt.
const USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36 Edg/129.0.0.0",
];

/// Flags that hide the usual headless/automation fingerprints.
const STEALTH_FLAGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--ignore-certificate-errors",
    "--ignore-ssl-errors",
    "--allow-running-insecure-content",
    "--disable-blink-features=AutomationControlled",
    "--exclude-switches=enable-automation",
    "--disable-extensions",
    "--disable-plugins-discovery",
    "--run-all-compositor-stages-before-draw",
];

/// A random identity from the pool.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}

/// Full argument list for one headless render that dumps the DOM to stdout.
pub fn chromium_args(
    url: &str,
    user_agent: &str,
    virtual_time_budget_ms: u64,
    headless_new: bool,
    window_size: Option<&str>,
) -> Vec<String> {
    let mut args: Vec<String> = STEALTH_FLAGS.iter().map(|f| f.to_string()).collect();
    args.push(if headless_new {
        "--headless=new".to_string()
    } else {
        "--headless".to_string()
    });
    if let Some(size) = window_size {
        args.push(format!("--window-size={size}"));
    }
    args.push(format!("--user-agent={user_agent}"));
    args.push(format!("--virtual-time-budget={virtual_time_budget_ms}"));
    args.push("--dump-dom".to_string());
    args.push(url.to_string());
    args
}
