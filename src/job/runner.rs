use super::config::{JobConfig, UnitMode};
use crate::batch::{
    Batcher, BatcherConfig, DispatchConfig, Dispatcher, FailureCollector, JobSummary,
};
use crate::error::SubmitError;
use crate::generator::RecordGenerator;
use crate::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::service::RecordService;
use crate::types::{FailedRecord, UnitOutcome, UserRecord, WorkItem};
use crate::Result;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Everything a finished job has to say.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: Uuid,
    pub mode: UnitMode,
    pub summary: JobSummary,
    /// Failed records in the order they were recorded.
    pub failures: Vec<FailedRecord<UserRecord>>,
}

impl JobReport {
    /// The failed records alone, ready to be fed into another run.
    pub fn failed_records(&self) -> Vec<UserRecord> {
        self.failures.iter().map(|f| f.record.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Update,
}

/// Drives bulk jobs against a [`RecordService`].
///
/// Each run gets its own rate limiter and failure collector; nothing is
/// shared between runs except the service and the cancellation token.
pub struct JobRunner {
    service: Arc<dyn RecordService>,
    config: JobConfig,
    cancel: CancellationToken,
}

impl JobRunner {
    /// Out-of-range settings in `config` are replaced by defaults here.
    pub fn new(service: Arc<dyn RecordService>, config: JobConfig) -> Self {
        Self {
            service,
            config: config.normalized(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Cancelling this token stops every run of this runner, current and
    /// future.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Create `records`, one call per record or in composite batches
    /// depending on the configured mode.
    pub async fn run_create(&self, records: Vec<UserRecord>) -> Result<JobReport> {
        let records = records
            .into_iter()
            .map(|mut r| {
                r.set_local_account_profile(&self.config.tenant);
                r
            })
            .collect();
        self.run(Operation::Create, self.config.mode, records).await
    }

    /// Update existing records. Updates are always submitted one by one.
    pub async fn run_update(&self, records: Vec<UserRecord>) -> Result<JobReport> {
        self.run(Operation::Update, UnitMode::Single, records).await
    }

    /// Generate `target_count` test users and create them.
    pub async fn run_generated(&self) -> Result<JobReport> {
        let count = usize::try_from(self.config.target_count).unwrap_or(0);
        let records = RecordGenerator::new().generate(count);
        self.run_create(records).await
    }

    fn units(&self, mode: UnitMode, records: Vec<UserRecord>) -> Result<Vec<WorkItem<UserRecord>>> {
        match mode {
            UnitMode::Single => Ok(records.into_iter().map(WorkItem::Single).collect()),
            UnitMode::Batch => Batcher::new(
                BatcherConfig::new().with_batch_size(self.config.batch_size),
            )
            .build_units(records),
        }
    }

    fn dispatcher(&self) -> Dispatcher {
        let limiter = RateLimiter::new(
            RateLimiterConfig::from_limit(self.config.rate_per_interval)
                .with_interval(self.config.interval),
        );
        let mut dispatch = DispatchConfig::new();
        if let Some(n) = self.config.max_inflight {
            dispatch = dispatch.with_max_inflight(n);
        }
        if let Some(t) = self.config.unit_timeout {
            dispatch = dispatch.with_unit_timeout(t);
        }
        Dispatcher::with_config(Arc::new(limiter), dispatch)
            .with_cancel_token(self.cancel.child_token())
    }

    async fn run(
        &self,
        operation: Operation,
        mode: UnitMode,
        records: Vec<UserRecord>,
    ) -> Result<JobReport> {
        let job_id = Uuid::new_v4();
        let started = Instant::now();
        let record_count = records.len();

        let units = self.units(mode, records).map_err(|e| {
            error!(%job_id, error = %e, "could not build work units");
            e
        })?;

        info!(
            %job_id,
            operation = ?operation,
            %mode,
            records = record_count,
            units = units.len(),
            rate = self.config.rate_per_interval,
            interval_ms = self.config.interval.as_millis() as u64,
            "job started"
        );

        let failures = FailureCollector::new();
        let service = Arc::clone(&self.service);
        let result = self
            .dispatcher()
            .run(units, &failures, move |unit| {
                let service = Arc::clone(&service);
                async move { submit(service.as_ref(), operation, &unit).await }
            })
            .await;

        let mut summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                error!(%job_id, error = %e, "job could not complete");
                return Err(e);
            }
        };
        summary.elapsed = started.elapsed();

        info!(
            %job_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "job finished"
        );

        Ok(JobReport {
            job_id,
            mode,
            summary,
            failures: failures.into_records(),
        })
    }
}

async fn submit(
    service: &dyn RecordService,
    operation: Operation,
    unit: &WorkItem<UserRecord>,
) -> std::result::Result<UnitOutcome, SubmitError> {
    match (operation, unit) {
        (Operation::Create, WorkItem::Single(record)) => {
            service.create(record).await?;
            Ok(UnitOutcome::success())
        }
        (Operation::Create, WorkItem::Batch(batch)) => {
            let response = service.create_batch(&batch.request).await?;
            Ok(response.into_outcome(batch.records.len()))
        }
        (Operation::Update, WorkItem::Single(record)) => {
            service.update(record).await?;
            Ok(UnitOutcome::success())
        }
        (Operation::Update, WorkItem::Batch(_)) => Err(SubmitError::InvalidRecord(
            "updates cannot be batched".to_string(),
        )),
    }
}
