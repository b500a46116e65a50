//! `slipscan scrape`: run URLs through the pipeline.

use anyhow::{Context, Result};
use slipscan::{AcquisitionRequest, Strategy};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::output::{self, OutputFormat};
use crate::config::RuntimeConfig;
use crate::pipeline::Pipeline;

/// Scrape `urls` and print the envelopes. Returns whether every envelope succeeded.
pub async fn run(
    urls: &[String],
    strategy: Strategy,
    format: OutputFormat,
    config_path: Option<&Path>,
    deadline_secs: Option<u64>,
    jobs: usize,
) -> Result<bool> {
    let requests = urls
        .iter()
        .map(|u| AcquisitionRequest::new(u, strategy).with_context(|| format!("bad URL `{u}`")))
        .collect::<Result<Vec<_>>>()?;

    let config = RuntimeConfig::load(config_path)?;
    let pipeline = Pipeline::new(config)?;
    tracing::debug!(renderer = %pipeline.renderer().describe(), urls = requests.len(), "scraping");

    let deadline = deadline_secs.map(Duration::from_secs);
    let envelopes = pipeline.run_many(&requests, jobs, deadline).await;

    let rendered = output::render(&envelopes, format)?;
    std::io::stdout()
        .write_all(rendered.as_bytes())
        .context("failed to write output")?;

    Ok(envelopes.iter().all(|e| e.success()))
}
