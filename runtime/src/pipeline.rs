// Copyright 2026 Slipscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! The end-to-end pipeline: URL in, envelope out.
//!
//! ```text
//! resolve profile ─► identifier check ─► select strategy
//!     ├─ rendered: API discovery ─► render orchestrator
//!     └─ direct:   GET (auto falls back to rendered on failure)
//! ─► extract (spawn_blocking) ─► normalize
//! ```
//!
//! Every failure is folded into the envelope; `run` never returns an error.
//! Cancelling the pipeline drops the in-flight future, which kills any
//! renderer child process.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use slipscan::{
    normalize, normalize_extraction, transaction_identifier, AcquisitionError,
    AcquisitionRequest, ErrorKind, Extraction, ExtractionContext, ExtractionEnvelope, Field,
    Method, PatternLibrary, SiteProfile, Strategy,
};

use crate::acquisition::api_discovery;
use crate::acquisition::http_client::HttpClient;
use crate::acquisition::strategy::StrategySelector;
use crate::config::RuntimeConfig;
use crate::renderer::chromium::{find_chromium, ChromiumRenderer};
use crate::renderer::orchestrator::RenderOrchestrator;
use crate::renderer::{NoopRenderer, RenderJob, Renderer};
use crate::stealth;

/// Load the configured pattern library, or the built-in one.
pub fn load_library(config: &RuntimeConfig) -> Result<Arc<PatternLibrary>> {
    match &config.profiles_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read profiles {}", path.display()))?;
            let library = PatternLibrary::from_json(&raw)
                .with_context(|| format!("invalid profiles {}", path.display()))?;
            Ok(Arc::new(library))
        }
        None => Ok(Arc::new(PatternLibrary::builtin()?.clone())),
    }
}

/// Shared, reusable pipeline. Cheap to share across tasks by reference.
pub struct Pipeline {
    config: RuntimeConfig,
    library: Arc<PatternLibrary>,
    client: HttpClient,
    selector: StrategySelector,
    orchestrator: RenderOrchestrator,
}

impl Pipeline {
    /// Build a pipeline with the Chromium renderer if one can be found.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let library = load_library(&config)?;
        let renderer: Arc<dyn Renderer> = match find_chromium(config.chromium_path.as_deref()) {
            Some(binary) => Arc::new(ChromiumRenderer::new(binary)),
            None => {
                warn!("Chromium not found; rendered fetches will fail");
                Arc::new(NoopRenderer)
            }
        };
        Ok(Self::with_parts(config, library, renderer))
    }

    pub fn with_parts(
        config: RuntimeConfig,
        library: Arc<PatternLibrary>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let client = HttpClient::new(&config.user_agent, config.fetch_timeout_ms);
        let selector = StrategySelector::new(client.clone(), &config);
        let orchestrator = RenderOrchestrator::new(
            renderer,
            config.max_concurrent_renders,
            config.min_content_bytes,
        );
        Self {
            config,
            library,
            client,
            selector,
            orchestrator,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        self.orchestrator.renderer()
    }

    /// Run one request to completion.
    pub async fn run(&self, request: &AcquisitionRequest) -> ExtractionEnvelope {
        let request_id = Uuid::new_v4();
        let span = info_span!("pipeline", %request_id, url = %request.url());
        async {
            let envelope = self.run_inner(request).await;
            info!(
                success = envelope.success(),
                method = %envelope.method(),
                records = envelope.records().len(),
                error = envelope.error().map(|e| e.kind.as_str()).unwrap_or("none"),
                "pipeline finished"
            );
            envelope
        }
        .instrument(span)
        .await
    }

    /// Run until done or until `cancel` resolves, whichever comes first.
    pub async fn run_with_cancel<F>(&self, request: &AcquisitionRequest, cancel: F) -> ExtractionEnvelope
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            envelope = self.run(request) => envelope,
            _ = cancel => {
                info!(url = %request.url(), "pipeline cancelled");
                cancelled_envelope(request, "cancelled by caller")
            }
        }
    }

    /// Run with an overall deadline.
    pub async fn run_with_deadline(&self, request: &AcquisitionRequest, deadline: Duration) -> ExtractionEnvelope {
        match tokio::time::timeout(deadline, self.run(request)).await {
            Ok(envelope) => envelope,
            Err(_) => {
                info!(url = %request.url(), ?deadline, "pipeline deadline exceeded");
                cancelled_envelope(request, &format!("deadline of {deadline:?} exceeded"))
            }
        }
    }

    /// Run many requests, at most `jobs` at a time. Output order matches input.
    pub async fn run_many(
        &self,
        requests: &[AcquisitionRequest],
        jobs: usize,
        deadline: Option<Duration>,
    ) -> Vec<ExtractionEnvelope> {
        stream::iter(requests)
            .map(|request| async move {
                match deadline {
                    Some(d) => self.run_with_deadline(request, d).await,
                    None => self.run(request).await,
                }
            })
            .buffered(jobs.max(1))
            .collect()
            .await
    }

    async fn run_inner(&self, request: &AcquisitionRequest) -> ExtractionEnvelope {
        let url = request.url();
        let profile = self.library.resolve(url);
        let identifier = transaction_identifier(url, profile.identifier_params());
        tracing::debug!(profile = profile.name(), identifier = ?identifier, "profile resolved");

        if profile.requires_identifier() && identifier.is_none() {
            let err = AcquisitionError::identifier_missing(url.as_str());
            return normalize(Vec::new(), url.as_str(), request.strategy().method(), Some(&err));
        }

        let strategy = match request.strategy() {
            Strategy::Auto => self.selector.select(url).await,
            explicit => explicit,
        };

        if strategy == Strategy::DirectFetch {
            let is_auto = request.strategy() == Strategy::Auto;
            // Near-empty documents are never treated as acquired markup.
            let min_bytes = if is_auto {
                self.config.probe.min_static_bytes
            } else {
                self.config.min_content_bytes
            };
            match self.fetch_direct(url, min_bytes).await {
                Ok(markup) => match self.extract(markup, &profile, url, identifier.clone()).await {
                    Ok(extraction) if is_auto && extraction.record.is_empty() && extraction.table_rows.is_empty() => {
                        info!("direct markup yielded nothing, falling back to rendered fetch");
                    }
                    Ok(extraction) => return finish(extraction, url, Method::Direct),
                    Err(err) => return normalize(Vec::new(), url.as_str(), Method::Direct, Some(&err)),
                },
                Err(err) if is_auto => {
                    info!(error = %err, "direct fetch failed, falling back to rendered fetch");
                }
                Err(err) => return normalize(Vec::new(), url.as_str(), Method::Direct, Some(&err)),
            }
        }

        if let Some(envelope) = self.try_api(url, &profile, identifier.as_deref()).await {
            return envelope;
        }

        self.render(url, &profile, identifier).await
    }

    async fn fetch_direct(&self, url: &Url, min_bytes: usize) -> Result<String, AcquisitionError> {
        let resp = self
            .client
            .get(url.as_str(), self.config.fetch_timeout_ms)
            .await
            .map_err(|e| AcquisitionError::new(ErrorKind::FetchFailed, 1, format!("{e:#}")))?;
        if !resp.is_success() {
            return Err(AcquisitionError::new(
                ErrorKind::FetchFailed,
                1,
                format!("HTTP {}", resp.status),
            ));
        }
        if resp.body.trim().is_empty() || resp.body.len() <= min_bytes {
            return Err(AcquisitionError::new(
                ErrorKind::FetchFailed,
                1,
                format!("response body too short ({} bytes)", resp.body.len()),
            ));
        }
        Ok(resp.body)
    }

    async fn try_api(
        &self,
        url: &Url,
        profile: &Arc<SiteProfile>,
        identifier: Option<&str>,
    ) -> Option<ExtractionEnvelope> {
        let id = identifier?;
        if !self.config.api_discovery || profile.api_endpoints().is_empty() {
            return None;
        }
        let hit = api_discovery::try_api(
            &self.client,
            url,
            profile.api_endpoints(),
            id,
            self.config.api_timeout_ms,
        )
        .await?;

        let mut extraction = self
            .extract(hit.body, profile, url, Some(id.to_string()))
            .await
            .ok()?;
        if let Some(data) = &hit.data {
            let from_json = api_discovery::json_record(data);
            for (key, value) in from_json.iter() {
                if extraction.record.get_key(key).is_none() {
                    extraction.record.insert_key(key, value);
                }
            }
        }
        if extraction.record.is_empty() {
            tracing::debug!(api_url = %hit.api_url, "api response had nothing extractable");
            return None;
        }
        if !extraction.record.contains(Field::TransactionId) {
            extraction.record.insert(Field::TransactionId, id);
        }
        info!(api_url = %hit.api_url, "extracted from api endpoint");
        Some(finish(extraction, url, Method::Api))
    }

    async fn render(
        &self,
        url: &Url,
        profile: &Arc<SiteProfile>,
        identifier: Option<String>,
    ) -> ExtractionEnvelope {
        let (class_name, class) = self.config.host_class(url);
        let policy = class.retry_policy();
        tracing::debug!(host_class = %class_name, ?policy, "rendering");

        let job = RenderJob {
            url: url.to_string(),
            user_agent: stealth::random_user_agent().to_string(),
            virtual_time_budget_ms: class.virtual_time_budget_ms,
            headless_new: class.headless_new,
            window_size: class.window_size.clone(),
        };

        match self.orchestrator.acquire_rendered(&job, &policy).await {
            Ok(page) => match self.extract(page.markup, profile, url, identifier).await {
                Ok(extraction) => finish(extraction, url, Method::Rendered),
                Err(err) => normalize(Vec::new(), url.as_str(), Method::Rendered, Some(&err)),
            },
            Err(err) => normalize(Vec::new(), url.as_str(), Method::Rendered, Some(&err)),
        }
    }

    /// Run the synchronous extractor off the async workers.
    async fn extract(
        &self,
        markup: String,
        profile: &Arc<SiteProfile>,
        url: &Url,
        identifier: Option<String>,
    ) -> Result<Extraction, AcquisitionError> {
        let profile = Arc::clone(profile);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let context = ExtractionContext {
                url: &url,
                identifier: identifier.as_deref(),
            };
            slipscan::extract_all(&markup, &profile, &context)
        })
        .await
        .map_err(|e| {
            AcquisitionError::new(
                ErrorKind::NoContentExtracted,
                0,
                format!("extraction task failed: {e}"),
            )
        })
    }
}

fn finish(extraction: Extraction, url: &Url, method: Method) -> ExtractionEnvelope {
    for note in &extraction.notes {
        tracing::debug!(note = %note, "extraction note");
    }
    normalize_extraction(extraction, url.as_str(), method)
}

fn cancelled_envelope(request: &AcquisitionRequest, reason: &str) -> ExtractionEnvelope {
    let err = AcquisitionError::cancelled(reason);
    normalize(
        Vec::new(),
        request.url().as_str(),
        request.strategy().method(),
        Some(&err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_builtin_library() {
        let library = load_library(&RuntimeConfig::default()).unwrap();
        assert!(library.get("boa").is_some());
    }

    #[test]
    fn test_load_custom_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(
            &path,
            r#"{"fallback":{"name":"mine","fields":{"title":[{"selector":"h1","validate":{"text":{}}}]}}}"#,
        )
        .unwrap();
        let config = RuntimeConfig {
            profiles_path: Some(path),
            ..RuntimeConfig::default()
        };
        let library = load_library(&config).unwrap();
        assert_eq!(library.fallback().name(), "mine");
        assert!(library.profiles().is_empty());
    }

    #[tokio::test]
    async fn test_identifier_missing_fails_fast() {
        let pipeline = Pipeline::with_parts(
            RuntimeConfig::default(),
            load_library(&RuntimeConfig::default()).unwrap(),
            Arc::new(NoopRenderer),
        );
        let request =
            AcquisitionRequest::new("https://cs.bankofabyssinia.com/slip/", Strategy::Auto).unwrap();
        let envelope = pipeline.run(&request).await;
        assert!(!envelope.success());
        assert_eq!(envelope.error().unwrap().kind, ErrorKind::IdentifierMissing);
        assert!(envelope.records().is_empty());
    }
}
