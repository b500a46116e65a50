//! `slipscan extract`: run the extractor over saved markup.

use anyhow::{Context, Result};
use slipscan::{normalize_extraction, transaction_identifier, ExtractionContext, Method};
use std::io::Write;
use std::path::Path;
use url::Url;

use super::output::{self, OutputFormat};
use crate::config::RuntimeConfig;
use crate::pipeline::load_library;

/// Extract from `file` as if it had been acquired from `url`.
pub fn run(file: &Path, url: &str, format: OutputFormat, config_path: Option<&Path>) -> Result<bool> {
    let markup = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let url = Url::parse(url).with_context(|| format!("bad URL `{url}`"))?;

    let config = RuntimeConfig::load(config_path)?;
    let library = load_library(&config)?;
    let profile = library.resolve(&url);
    let identifier = transaction_identifier(&url, profile.identifier_params());
    tracing::debug!(profile = profile.name(), file = %file.display(), "offline extraction");

    let extraction = slipscan::extract_all(
        &markup,
        &profile,
        &ExtractionContext {
            url: url.as_str(),
            identifier: identifier.as_deref(),
        },
    );
    let envelope = normalize_extraction(extraction, url.as_str(), Method::Direct);

    let rendered = output::render(std::slice::from_ref(&envelope), format)?;
    std::io::stdout()
        .write_all(rendered.as_bytes())
        .context("failed to write output")?;
    Ok(envelope.success())
}
