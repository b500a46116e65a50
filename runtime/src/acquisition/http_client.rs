//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just HTTP requests. Handles redirects, timeouts, retry on
//! 5xx, backoff on 429, and bounded reads for probing.

use anyhow::Result;
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Response headers (selected subset).
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Whether the body was cut off at the read limit.
    pub truncated: bool,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Response from an HTTP HEAD request.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// HTTP client for direct fetches, probes and API discovery.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
}

fn selected_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(k, _)| {
            matches!(
                k.as_str(),
                "content-type" | "content-length" | "content-language" | "last-modified"
            )
        })
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect()
}

impl HttpClient {
    /// Create a client presenting `user_agent`.
    pub fn new(user_agent: &str, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self { client, h1_client }
    }

    /// Perform a GET request with retry on 5xx and backoff on 429.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        match self.get_inner(&self.client, url, timeout_ms).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.get_inner(&self.h1_client, url, timeout_ms).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(
        &self,
        client: &reqwest::Client,
        url: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let mut retries = 0u32;
        let max_retries = 2;

        loop {
            let resp = client
                .get(url)
                .timeout(Duration::from_millis(timeout_ms))
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status == 429 && retries < max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let headers = selected_headers(r.headers());
                    let body = r.text().await.unwrap_or_default();

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        headers,
                        body,
                        truncated: false,
                    });
                }
                Err(e) => {
                    if retries < max_retries && !e.is_timeout() {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Single HEAD request, no retries.
    pub async fn head(&self, url: &str, timeout_ms: u64) -> Result<HeadResponse> {
        let resp = self
            .client
            .head(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        Ok(HeadResponse {
            url: url.to_string(),
            status: resp.status().as_u16(),
            content_type,
            content_length,
        })
    }

    /// Single GET that stops reading after `max_bytes`. No retries.
    pub async fn get_bounded(
        &self,
        url: &str,
        max_bytes: usize,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let mut r = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let headers = selected_headers(r.headers());

        let mut buf: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = r.chunk().await? {
            let room = max_bytes.saturating_sub(buf.len());
            if chunk.len() >= room {
                buf.extend_from_slice(&chunk[..room]);
                truncated = chunk.len() > room;
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            headers,
            body: String::from_utf8_lossy(&buf).into_owned(),
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_response_header_lookup() {
        let resp = HttpResponse {
            url: "https://example.com".into(),
            final_url: "https://example.com".into(),
            status: 200,
            headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
            body: String::new(),
            truncated: false,
        };
        assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(resp.header("Content-Type"), resp.content_type());
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn test_get_bounded_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(10_000)))
            .mount(&server)
            .await;

        let client = HttpClient::new("test-agent", 5_000);
        let resp = client
            .get_bounded(&format!("{}/big", server.uri()), 1_024, 5_000)
            .await
            .unwrap();
        assert_eq!(resp.body.len(), 1_024);
        assert!(resp.truncated);
    }

    #[tokio::test]
    async fn test_get_retries_5xx_then_returns_last() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = HttpClient::new("test-agent", 5_000);
        let resp = client
            .get(&format!("{}/flaky", server.uri()), 5_000)
            .await
            .unwrap();
        assert_eq!(resp.status, 503);
    }
}
