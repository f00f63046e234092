//! Rate-limited fan-out/join dispatcher.

use super::collector::FailureCollector;
use crate::error::{ErrorContext, SubmitError};
use crate::resilience::rate_limiter::RateLimiter;
use crate::types::{SubmissionOutcome, UnitOutcome, WorkItem};
use crate::{Error, Result};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Aggregate result of one bulk run, counted in records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl JobSummary {
    pub fn empty() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} succeeded, {} failed in {:.3} seconds",
            self.total,
            self.succeeded,
            self.failed,
            self.elapsed_seconds()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Upper bound on submissions in flight at once; `None` leaves it to the
    /// rate limiter's pacing.
    pub max_inflight: Option<usize>,
    /// Per-unit deadline; a unit that overruns fails with `Timeout`.
    pub unit_timeout: Option<Duration>,
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_inflight(mut self, n: usize) -> Self {
        self.max_inflight = Some(n.max(1));
        self
    }

    pub fn with_unit_timeout(mut self, t: Duration) -> Self {
        self.unit_timeout = Some(t);
        self
    }
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

impl Tally {
    fn add<T>(&mut self, outcome: &SubmissionOutcome<T>) {
        self.succeeded += outcome.succeeded();
        self.failed += outcome.failed();
        match outcome {
            SubmissionOutcome::Success { unit, records } => {
                debug!(unit, records, "unit completed");
            }
            SubmissionOutcome::Failure {
                unit,
                succeeded,
                failures,
            } => {
                warn!(
                    unit,
                    succeeded,
                    failed = failures.len(),
                    first_cause = ?failures.first().map(|f| &f.cause),
                    "unit completed with failures"
                );
            }
        }
    }
}

/// Launches work items one by one under the rate limiter and waits for all
/// of them. A failing unit never cancels its siblings.
pub struct Dispatcher {
    limiter: Arc<RateLimiter>,
    config: DispatchConfig,
    inflight: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self::with_config(limiter, DispatchConfig::default())
    }

    pub fn with_config(limiter: Arc<RateLimiter>, config: DispatchConfig) -> Self {
        let inflight = config
            .max_inflight
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            limiter,
            config,
            inflight,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for an in-flight slot (if bounded) and then a rate permit, so the
    /// launch that follows happens at the instant the permit was granted.
    async fn admit(&self) -> Result<Option<OwnedSemaphorePermit>> {
        let slot = match &self.inflight {
            Some(sem) => Some(sem.clone().acquire_owned().await.map_err(|_| {
                Error::infrastructure_with_context(
                    "In-flight semaphore closed",
                    ErrorContext::new().with_source("dispatcher"),
                )
            })?),
            None => None,
        };
        self.limiter.acquire().await;
        Ok(slot)
    }

    /// Submit every unit and return once all of them reached a terminal state.
    ///
    /// Per-record failures go to `failures`; the returned error is reserved
    /// for faults of the dispatcher itself. After cancellation no new unit is
    /// launched, in-flight units resolve as `Cancelled` and so does every
    /// record that was never launched.
    pub async fn run<T, F, Fut>(
        &self,
        units: Vec<WorkItem<T>>,
        failures: &FailureCollector<T>,
        submit: F,
    ) -> Result<JobSummary>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<WorkItem<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<UnitOutcome, SubmitError>> + Send + 'static,
    {
        let started = Instant::now();
        let total: usize = units.iter().map(WorkItem::len).sum();
        if units.is_empty() {
            return Ok(JobSummary::empty());
        }

        let submit = Arc::new(submit);
        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();
        let mut pending = units.into_iter().enumerate();

        while let Some((index, unit)) = pending.next() {
            let admitted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                slot = self.admit() => Some(slot?),
            };

            let Some(slot) = admitted else {
                let skipped = std::iter::once((index, unit)).chain(pending.by_ref());
                let mut units_skipped = 0usize;
                for (index, unit) in skipped {
                    let outcome =
                        SubmissionOutcome::resolve(index, &unit, Err(SubmitError::Cancelled));
                    if let SubmissionOutcome::Failure { failures: list, .. } = &outcome {
                        failures.record_all(list.iter().cloned());
                    }
                    tally.succeeded += outcome.succeeded();
                    tally.failed += outcome.failed();
                    units_skipped += 1;
                }
                warn!(units_skipped, "dispatch cancelled before all units launched");
                break;
            };

            debug!(unit = index, records = unit.len(), "launching unit");
            let unit = Arc::new(unit);
            let submit = Arc::clone(&submit);
            let collector = failures.clone();
            let cancel = self.cancel.clone();
            let timeout = self.config.unit_timeout;

            tasks.spawn(async move {
                let _slot = slot;
                let call = {
                    let unit = Arc::clone(&unit);
                    AssertUnwindSafe(async move { (*submit)(unit).await }).catch_unwind()
                };
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SubmitError::Cancelled),
                    r = settle(call, timeout) => r,
                };
                let outcome = SubmissionOutcome::resolve(index, &unit, result);
                if let SubmissionOutcome::Failure { failures: list, .. } = &outcome {
                    collector.record_all(list.iter().cloned());
                }
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| {
                Error::infrastructure_with_context(
                    format!("submission task lost: {}", e),
                    ErrorContext::new().with_source("dispatcher"),
                )
            })?;
            tally.add(&outcome);
        }

        debug_assert_eq!(tally.succeeded + tally.failed, total);
        Ok(JobSummary {
            total,
            succeeded: tally.succeeded,
            failed: tally.failed,
            elapsed: started.elapsed(),
        })
    }
}

async fn settle<Fut>(
    call: Fut,
    timeout: Option<Duration>,
) -> std::result::Result<UnitOutcome, SubmitError>
where
    Fut: Future<Output = std::thread::Result<std::result::Result<UnitOutcome, SubmitError>>>,
{
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(joined) => joined,
            Err(_) => return Err(SubmitError::Timeout(limit)),
        },
        None => call.await,
    };
    joined.unwrap_or_else(|payload| Err(SubmitError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
