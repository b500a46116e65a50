//! Renderer abstraction for out-of-process page rendering.
//!
//! A [`Renderer`] runs one isolated render per call and reports the raw
//! document and exit status. It does not judge the result or retry; that is
//! the [`orchestrator`]'s job. Cancelling (dropping) a `render` future must
//! stop the underlying process.

pub mod chromium;
pub mod orchestrator;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a renderer needs for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJob {
    pub url: String,
    pub user_agent: String,
    pub virtual_time_budget_ms: u64,
    pub headless_new: bool,
    pub window_size: Option<String>,
}

/// Raw outcome of one render process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Captured standard output (the dumped document).
    pub stdout: String,
    /// Process exit code; `None` if killed by a signal.
    pub exit_code: Option<i32>,
}

impl RenderOutput {
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A headless engine that turns a URL into rendered markup.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Run one isolated render. Errors mean the process could not run at all.
    async fn render(&self, job: &RenderJob) -> Result<RenderOutput>;
    /// Short description for diagnostics.
    fn describe(&self) -> String;
}

/// A renderer used when no browser binary is available.
///
/// Direct fetch and API discovery still work; every render attempt fails.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn render(&self, _job: &RenderJob) -> Result<RenderOutput> {
        Err(anyhow::anyhow!(
            "browser not available (set SLIPSCAN_CHROMIUM_PATH or chromium_path)"
        ))
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}
