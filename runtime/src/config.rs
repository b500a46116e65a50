// Copyright 2026 Slipscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration loading and resolution.
//!
//! Resolution order: an explicit `--config` path, then
//! `~/.slipscan/config.json` if present, then built-in defaults. A few
//! environment variables override whatever was loaded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::renderer::orchestrator::RetryPolicy;

/// Env override for the Chromium binary.
pub const ENV_CHROMIUM_PATH: &str = "SLIPSCAN_CHROMIUM_PATH";
/// Env override for the renderer concurrency limit.
pub const ENV_MAX_RENDERS: &str = "SLIPSCAN_MAX_RENDERS";

/// Extra wall-clock headroom a render attempt gets over its virtual-time budget.
const TIMEOUT_HEADROOM_MS: u64 = 5_000;

/// Strategy probe limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub head_timeout_ms: u64,
    pub get_timeout_ms: u64,
    /// Stop reading the probe body after this many bytes.
    pub max_probe_bytes: usize,
    /// A static HTML body must be larger than this to skip rendering.
    pub min_static_bytes: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            head_timeout_ms: 5_000,
            get_timeout_ms: 8_000,
            max_probe_bytes: 256 * 1024,
            min_static_bytes: 1_000,
        }
    }
}

/// Retry and render settings for a family of hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostClass {
    /// Host substrings that select this class.
    pub hosts: Vec<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    /// Renderer virtual-time budget (time granted for async page loads).
    pub virtual_time_budget_ms: u64,
    /// Hard wall-clock timeout per attempt.
    pub timeout_ms: u64,
    /// `--headless=new` instead of the legacy headless mode.
    pub headless_new: bool,
    pub window_size: Option<String>,
}

impl Default for HostClass {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            max_attempts: 2,
            base_delay_ms: 1_000,
            jitter_ms: 250,
            virtual_time_budget_ms: 10_000,
            timeout_ms: 30_000,
            headless_new: false,
            window_size: None,
        }
    }
}

impl HostClass {
    fn slow() -> Self {
        Self {
            hosts: vec!["cbe.com.et".to_string()],
            max_attempts: 5,
            base_delay_ms: 3_000,
            jitter_ms: 500,
            virtual_time_budget_ms: 25_000,
            timeout_ms: 40_000,
            headless_new: true,
            window_size: Some("1920,1080".to_string()),
        }
    }

    /// Per-attempt wall-clock timeout, always strictly above the virtual-time budget.
    pub fn attempt_timeout(&self) -> Duration {
        let floor = self.virtual_time_budget_ms + TIMEOUT_HEADROOM_MS;
        Duration::from_millis(self.timeout_ms.max(floor))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            attempt_timeout: self.attempt_timeout(),
        }
    }

    fn matches(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| host.contains(h.to_ascii_lowercase().as_str()))
    }
}

/// Top-level runtime configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub chromium_path: Option<PathBuf>,
    /// Identity header for direct fetches and probes.
    pub user_agent: String,
    pub fetch_timeout_ms: u64,
    pub probe: ProbeConfig,
    /// A rendered document must be longer than this to count as content.
    pub min_content_bytes: usize,
    pub max_concurrent_renders: usize,
    /// Hosts known to render client-side; these skip the probe.
    pub render_hosts: Vec<String>,
    pub host_classes: BTreeMap<String, HostClass>,
    pub default_class: String,
    pub api_discovery: bool,
    pub api_timeout_ms: u64,
    /// Custom pattern library replacing the built-in one.
    pub profiles_path: Option<PathBuf>,

    /// Where this config was loaded from, if anywhere.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let mut host_classes = BTreeMap::new();
        host_classes.insert("default".to_string(), HostClass::default());
        host_classes.insert("slow".to_string(), HostClass::slow());
        Self {
            chromium_path: None,
            user_agent: crate::stealth::DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_ms: 15_000,
            probe: ProbeConfig::default(),
            min_content_bytes: 1_000,
            max_concurrent_renders: 4,
            render_hosts: vec![
                "bankofabyssinia.com".to_string(),
                "cbe.com.et".to_string(),
            ],
            host_classes,
            default_class: "default".to_string(),
            api_discovery: true,
            api_timeout_ms: 5_000,
            profiles_path: None,
            source: None,
        }
    }
}

impl RuntimeConfig {
    /// Resolve and load the configuration, then apply env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "loaded runtime config");
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(p) = std::env::var(ENV_CHROMIUM_PATH) {
            if !p.trim().is_empty() {
                self.chromium_path = Some(PathBuf::from(p));
            }
        }
        if let Ok(raw) = std::env::var(ENV_MAX_RENDERS) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_concurrent_renders = n,
                _ => tracing::warn!(value = %raw, "ignoring invalid {ENV_MAX_RENDERS}"),
            }
        }
    }

    /// The host class for `url`: the first named class whose hosts match,
    /// else the default class.
    pub fn host_class(&self, url: &Url) -> (String, HostClass) {
        let host = host_of(url);
        if let Some((name, class)) = self
            .host_classes
            .iter()
            .find(|(name, class)| **name != self.default_class && class.matches(&host))
        {
            return (name.clone(), class.clone());
        }
        let class = self
            .host_classes
            .get(&self.default_class)
            .cloned()
            .unwrap_or_default();
        (self.default_class.clone(), class)
    }
}

fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

/// `~/.slipscan`
pub fn slipscan_home() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".slipscan"))
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    slipscan_home()
        .map(|home| home.join("config.json"))
        .filter(|p| p.exists())
}
