//! # Bulk Dispatch Module
//!
//! Partitioning, fan-out and failure accounting for bulk jobs.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Batcher`] | Splits records into groups of at most [`MAX_BATCH_SIZE`] and encodes them |
//! | [`CompositeRequest`] | One `$batch` payload carrying a whole group |
//! | [`CompositeResponse`] | Reply to a composite request, mapped back to positions |
//! | [`Dispatcher`] | Launches units under the rate limiter and joins them all |
//! | [`FailureCollector`] | Concurrency-safe sink of failed records |
//! | [`JobSummary`] | Record counts and elapsed time of a finished run |
//!
//! ## Example
//!
//! ```rust
//! use bulk_provision::batch::{Dispatcher, FailureCollector};
//! use bulk_provision::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//! use bulk_provision::types::{UnitOutcome, WorkItem};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> bulk_provision::Result<()> {
//! let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::per_second(50)));
//! let dispatcher = Dispatcher::new(limiter);
//! let failures = FailureCollector::new();
//!
//! let units: Vec<WorkItem<u32>> = (0..10).map(WorkItem::Single).collect();
//! let summary = dispatcher
//!     .run(units, &failures, |_unit| async { Ok(UnitOutcome::success()) })
//!     .await?;
//! assert_eq!(summary.succeeded, 10);
//! # Ok(())
//! # }
//! ```
//!
//! Launching is serial and paced; execution is concurrent. Unless
//! [`DispatchConfig::max_inflight`] is set, the number of units running at
//! once is whatever the pacing and the service latency produce.

mod collector;
mod composite;
mod executor;
mod partition;

pub use collector::FailureCollector;
pub use composite::{BatchStep, BatchStepResponse, CompositeRequest, CompositeResponse};
pub(crate) use composite::error_message;
pub use executor::{DispatchConfig, Dispatcher, JobSummary};
pub use partition::{partition, Batcher, BatcherConfig, MAX_BATCH_SIZE};
