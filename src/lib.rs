//! # bulk-provision
//!
//! Rate-limited concurrent bulk dispatch of user records to a directory
//! service.
//!
//! ## Overview
//!
//! A job takes an ordered collection of records, optionally groups them into
//! composite `$batch` requests, and launches one submission per unit while a
//! sliding-window rate limiter paces the launches. Submissions run
//! concurrently; a failing unit never stops its siblings. When every unit has
//! finished, the job reports how many records succeeded and failed, how long
//! it took, and which records failed and why.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bulk_provision::job::{JobConfig, JobRunner, UnitMode};
//! use bulk_provision::service::HttpRecordService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bulk_provision::Result<()> {
//!     let service = HttpRecordService::new(
//!         "https://graph.microsoft.com/v1.0",
//!         Some("access-token".to_string()),
//!     )?;
//!     let config = JobConfig::new()
//!         .with_target_count(500)
//!         .with_rate_per_interval(300)
//!         .with_mode(UnitMode::Batch)
//!         .with_tenant("contoso.onmicrosoft.com");
//!
//!     let report = JobRunner::new(Arc::new(service), config)
//!         .run_generated()
//!         .await?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Partitioning, composite requests, dispatcher, failure collector |
//! | [`config`] | Settings file and `BULK_*` environment overrides |
//! | [`generator`] | Synthetic test users |
//! | [`job`] | Job configuration and runner |
//! | [`resilience`] | Sliding-window rate limiting |
//! | [`service`] | Record service trait with HTTP and in-memory implementations |
//! | [`types`] | Records, work items and outcomes |

pub mod batch;
pub mod config;
pub mod generator;
pub mod job;
pub mod resilience;
pub mod service;
pub mod types;

pub use batch::{Dispatcher, FailureCollector, JobSummary};
pub use config::AppSettings;
pub use job::{JobConfig, JobReport, JobRunner, UnitMode};
pub use service::RecordService;
pub use types::{UserRecord, WorkItem};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, SubmitError};
