use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    errors::{AppError, Result},
    models::{PredictionJob, PredictionStatus},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Fixed-interval polling of a submit/status job API.
///
/// No backoff and no jitter: the worst-case wait is `interval * max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPoller {
    interval: Duration,
    max_attempts: u32,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl JobPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }

    pub async fn poll_until_terminal<S, SF, P, PF>(&self, submit: S, status: P) -> Result<String>
    where
        S: FnOnce() -> SF,
        SF: Future<Output = Result<PredictionJob>>,
        P: FnMut(String) -> PF,
        PF: Future<Output = Result<PredictionJob>>,
    {
        self.poll_until_terminal_with_cancel(submit, status, &CancellationToken::new())
            .await
    }

    /// Same as [`JobPoller::poll_until_terminal`] but gives up with
    /// [`AppError::PollCancelled`] as soon as `cancel` fires. The upstream
    /// job itself is left running.
    pub async fn poll_until_terminal_with_cancel<S, SF, P, PF>(
        &self,
        submit: S,
        mut status: P,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        S: FnOnce() -> SF,
        SF: Future<Output = Result<PredictionJob>>,
        P: FnMut(String) -> PF,
        PF: Future<Output = Result<PredictionJob>>,
    {
        let submitted = submit().await?;
        let job_id = submitted.id;
        if job_id.is_empty() {
            return Err(AppError::MalformedResponse(
                "Prediction submission returned no id".to_string(),
            ));
        }

        info!("Prediction submitted - id={}", job_id);

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(AppError::PollCancelled);
            }

            let job = status(job_id.clone()).await?;
            debug!(
                "Prediction poll - id={}, attempt={}/{}, status={:?}",
                job_id, attempt, self.max_attempts, job.status
            );

            match job.status {
                PredictionStatus::Succeeded => {
                    info!("Prediction succeeded - id={}, polls={}", job_id, attempt);
                    return job.output.into_iter().next().ok_or_else(|| {
                        AppError::MalformedResponse(format!(
                            "Prediction {} succeeded without output",
                            job_id
                        ))
                    });
                }
                PredictionStatus::Failed => {
                    let detail = job.error.unwrap_or_else(|| "unknown error".to_string());
                    warn!("Prediction failed - id={}, error={}", job_id, detail);
                    return Err(AppError::JobFailed(detail));
                }
                PredictionStatus::Pending => {}
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AppError::PollCancelled),
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        warn!(
            "Prediction timed out - id={}, attempts={}",
            job_id, self.max_attempts
        );
        Err(AppError::PollTimeout {
            attempts: self.max_attempts,
        })
    }
}
