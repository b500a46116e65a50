//! Acquisition strategy selection.
//!
//! Hosts configured as client-side rendered go straight to rendering.
//! Everything else gets a lightweight probe (HEAD, then a bounded GET): a
//! static HTML body above the size threshold means the page can be fetched
//! directly. Any probe failure falls back to rendering, the superset strategy.

use slipscan::{ErrorKind, Strategy};
use url::Url;

use super::http_client::HttpClient;
use crate::config::{ProbeConfig, RuntimeConfig};

/// Why the probe could not classify a URL. Never escapes [`StrategySelector::select`].
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {reason}")]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub reason: String,
}

impl ProbeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ProbeFailed,
            reason: reason.into(),
        }
    }
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/html") || ct.starts_with("application/xhtml")
        })
        .unwrap_or(false)
}

/// Chooses between direct and rendered fetch.
#[derive(Clone)]
pub struct StrategySelector {
    client: HttpClient,
    render_hosts: Vec<String>,
    probe: ProbeConfig,
}

impl StrategySelector {
    pub fn new(client: HttpClient, config: &RuntimeConfig) -> Self {
        Self {
            client,
            render_hosts: config
                .render_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            probe: config.probe.clone(),
        }
    }

    fn is_render_host(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.render_hosts.iter().any(|h| host.contains(h.as_str()))
    }

    /// Pick a concrete strategy for `url`. Never fails.
    pub async fn select(&self, url: &Url) -> Strategy {
        if self.is_render_host(url) {
            tracing::debug!(%url, "host renders client-side");
            return Strategy::RenderedFetch;
        }
        match self.probe(url).await {
            Ok(strategy) => {
                tracing::debug!(%url, %strategy, "probe classified URL");
                strategy
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "probe failed, defaulting to rendered fetch");
                Strategy::RenderedFetch
            }
        }
    }

    /// HEAD, then a bounded GET.
    pub async fn probe(&self, url: &Url) -> Result<Strategy, ProbeError> {
        let head = self
            .client
            .head(url.as_str(), self.probe.head_timeout_ms)
            .await
            .map_err(|e| ProbeError::new(format!("HEAD failed: {e}")))?;

        // Some servers refuse HEAD outright; let the GET decide.
        let head_refused = matches!(head.status, 405 | 501);
        if !head_refused {
            if head.status >= 400 {
                return Err(ProbeError::new(format!("HEAD returned {}", head.status)));
            }
            if head.content_type.is_some() && !is_html(head.content_type.as_deref()) {
                return Ok(Strategy::RenderedFetch);
            }
        }

        let resp = self
            .client
            .get_bounded(
                url.as_str(),
                self.probe.max_probe_bytes,
                self.probe.get_timeout_ms,
            )
            .await
            .map_err(|e| ProbeError::new(format!("GET failed: {e}")))?;

        if !resp.is_success() {
            return Err(ProbeError::new(format!("GET returned {}", resp.status)));
        }
        if is_html(resp.content_type()) && resp.body.len() > self.probe.min_static_bytes {
            Ok(Strategy::DirectFetch)
        } else {
            Ok(Strategy::RenderedFetch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_html() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("TEXT/HTML")));
        assert!(is_html(Some("application/xhtml+xml")));
        assert!(!is_html(Some("application/json")));
        assert!(!is_html(None));
    }

    #[tokio::test]
    async fn test_render_host_skips_probe() {
        let config = RuntimeConfig::default();
        let selector = StrategySelector::new(HttpClient::new("t", 1_000), &config);
        // Unroutable if probed; render hosts never are.
        let url = Url::parse("https://cs.bankofabyssinia.com/slip/?trx=FT1").unwrap();
        assert_eq!(selector.select(&url).await, Strategy::RenderedFetch);
    }
}
