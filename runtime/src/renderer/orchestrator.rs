//! Render orchestration: sequential retries with linear backoff.
//!
//! Each attempt is an isolated render under a hard wall-clock timeout. An
//! attempt succeeds only if the process exits 0 *and* produced more than
//! `min_content_bytes` of output; short documents are block pages, redirect
//! shells or crashes. Attempts never run in parallel for one request. The
//! number of renders in flight across all requests is bounded by a shared
//! semaphore.

use rand::Rng;
use slipscan::{AcquisitionError, ErrorKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{RenderJob, RenderOutput, Renderer};
use crate::stealth;

/// Retry bounds for one request. Resolved once from the host class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before 1-based `attempt`, without jitter: zero for the first
    /// attempt, then `base_delay` times the number of failed attempts so far.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }

    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(extra)
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Clean exit but the document was too short.
    ShortOutput,
    NonZeroExit,
    Timeout,
    LaunchFailed(String),
}

/// Diagnostics for one render attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    pub index: u32,
    pub elapsed: Duration,
    pub markup_len: usize,
    pub exit_code: Option<i32>,
    pub outcome: AttemptOutcome,
}

impl RenderAttempt {
    fn describe(&self) -> String {
        match &self.outcome {
            AttemptOutcome::Success => format!("attempt {} succeeded", self.index),
            AttemptOutcome::ShortOutput => format!(
                "attempt {} returned only {} bytes",
                self.index, self.markup_len
            ),
            AttemptOutcome::NonZeroExit => format!(
                "attempt {} exited with {}",
                self.index,
                self.exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            ),
            AttemptOutcome::Timeout => format!(
                "attempt {} hit {} after {:?}",
                self.index,
                ErrorKind::RenderTimeout,
                self.elapsed
            ),
            AttemptOutcome::LaunchFailed(e) => {
                format!("attempt {} could not start the renderer: {e}", self.index)
            }
        }
    }
}

/// Rendered markup plus the attempts it took.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub markup: String,
    pub attempts: Vec<RenderAttempt>,
}

/// Supervises a [`Renderer`] under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RenderOrchestrator {
    renderer: Arc<dyn Renderer>,
    permits: Arc<Semaphore>,
    min_content_bytes: usize,
}

impl RenderOrchestrator {
    pub fn new(renderer: Arc<dyn Renderer>, max_concurrent: usize, min_content_bytes: usize) -> Self {
        Self {
            renderer,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_content_bytes,
        }
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    fn classify(&self, index: u32, elapsed: Duration, output: &RenderOutput) -> RenderAttempt {
        let outcome = if !output.exited_cleanly() {
            AttemptOutcome::NonZeroExit
        } else if output.stdout.len() <= self.min_content_bytes {
            AttemptOutcome::ShortOutput
        } else {
            AttemptOutcome::Success
        };
        RenderAttempt {
            index,
            elapsed,
            markup_len: output.stdout.len(),
            exit_code: output.exit_code,
            outcome,
        }
    }

    /// Render `template.url`, retrying per `policy`.
    ///
    /// Each attempt gets a fresh identity from the stealth pool. Returns
    /// `RenderExhausted` with `attempts == policy.max_attempts` when every
    /// attempt fails.
    pub async fn acquire_rendered(
        &self,
        template: &RenderJob,
        policy: &RetryPolicy,
    ) -> Result<RenderedPage, AcquisitionError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);

        for index in 1..=max_attempts {
            if index > 1 {
                let delay = policy.jittered_backoff(index);
                debug!(url = %template.url, attempt = index, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            let job = RenderJob {
                user_agent: stealth::random_user_agent().to_string(),
                ..template.clone()
            };

            let (attempt, markup) = {
                let _permit = self.permits.acquire().await.map_err(|_| {
                    AcquisitionError::new(
                        ErrorKind::RenderExhausted,
                        index - 1,
                        "render slots were closed",
                    )
                })?;
                let started = Instant::now();
                let result =
                    tokio::time::timeout(policy.attempt_timeout, self.renderer.render(&job)).await;
                let elapsed = started.elapsed();
                match result {
                    Ok(Ok(output)) => {
                        let attempt = self.classify(index, elapsed, &output);
                        (attempt, Some(output.stdout))
                    }
                    Ok(Err(e)) => (
                        RenderAttempt {
                            index,
                            elapsed,
                            markup_len: 0,
                            exit_code: None,
                            outcome: AttemptOutcome::LaunchFailed(format!("{e:#}")),
                        },
                        None,
                    ),
                    Err(_) => (
                        RenderAttempt {
                            index,
                            elapsed,
                            markup_len: 0,
                            exit_code: None,
                            outcome: AttemptOutcome::Timeout,
                        },
                        None,
                    ),
                }
            };

            if attempt.outcome == AttemptOutcome::Success {
                info!(
                    url = %template.url,
                    attempt = index,
                    bytes = attempt.markup_len,
                    "render succeeded"
                );
                attempts.push(attempt);
                return Ok(RenderedPage {
                    markup: markup.unwrap_or_default(),
                    attempts,
                });
            }

            warn!(url = %template.url, "{}", attempt.describe());
            attempts.push(attempt);
        }

        let last = attempts
            .last()
            .map(RenderAttempt::describe)
            .unwrap_or_default();
        Err(AcquisitionError::render_exhausted(
            max_attempts,
            format!("all {max_attempts} render attempts failed; last: {last}"),
        ))
    }
}
