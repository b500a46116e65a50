//! Chromium renderer: one `--dump-dom` subprocess per render.

use super::{RenderJob, RenderOutput, Renderer};
use crate::stealth;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Find the Chromium binary path.
///
/// Checks, in order: the configured path, `SLIPSCAN_CHROMIUM_PATH`,
/// `~/.slipscan/chromium/`, then `google-chrome`/`chromium`/`chromium-browser`
/// on `PATH`, then the usual macOS install location.
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured.filter(|p| p.exists()) {
        return Some(path.to_path_buf());
    }

    if let Ok(p) = std::env::var(crate::config::ENV_CHROMIUM_PATH) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = crate::config::slipscan_home() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join("chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join("chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join("chromium/chrome"),
            ]
        } else {
            vec![
                home.join("chromium/chrome-linux64/chrome"),
                home.join("chromium/chrome"),
            ]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Headless Chromium launched as a child process per render.
///
/// The child is spawned with `kill_on_drop`, so dropping an in-flight
/// `render` future (timeout, cancellation) terminates it.
pub struct ChromiumRenderer {
    binary: PathBuf,
}

impl ChromiumRenderer {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Locate a binary or fail with an install hint.
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        let binary = find_chromium(configured).context(
            "Chromium not found. Install Chrome/Chromium or set SLIPSCAN_CHROMIUM_PATH.",
        )?;
        Ok(Self::new(binary))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, job: &RenderJob) -> Result<RenderOutput> {
        let args = stealth::chromium_args(
            &job.url,
            &job.user_agent,
            job.virtual_time_budget_ms,
            job.headless_new,
            job.window_size.as_deref(),
        );

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to launch {}", self.binary.display()))?;

        let output = child
            .wait_with_output()
            .await
            .context("failed to collect renderer output")?;

        Ok(RenderOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code(),
        })
    }

    fn describe(&self) -> String {
        format!("chromium ({})", self.binary.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "").unwrap();
        assert_eq!(find_chromium(Some(fake.as_path())), Some(fake.clone()));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_dump_dom() {
        let renderer = ChromiumRenderer::discover(None).expect("chromium installed");
        let job = RenderJob {
            url: "data:text/html,<h1>Hello</h1>".to_string(),
            user_agent: stealth::DEFAULT_USER_AGENT.to_string(),
            virtual_time_budget_ms: 1000,
            headless_new: true,
            window_size: None,
        };
        let out = renderer.render(&job).await.expect("render failed");
        assert!(out.exited_cleanly());
        assert!(out.stdout.contains("<h1>Hello</h1>"));
    }
}
