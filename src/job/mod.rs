//! Bulk jobs: configuration and the runner tying batcher, dispatcher and
//! record service together.

mod config;
mod runner;

pub use config::{JobConfig, UnitMode, DEFAULT_BATCH_SIZE, DEFAULT_TARGET_COUNT};
pub use runner::{JobReport, JobRunner};
