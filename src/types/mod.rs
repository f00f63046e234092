//! # Types Module
//!
//! Records submitted to the directory service and the work units the
//! dispatcher moves them in.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UserRecord`] | A directory user to create or update |
//! | [`WorkItem`] | One submission unit: a single record or a batch |
//! | [`UnitOutcome`] | Per-position failures reported by a submission |
//! | [`SubmissionOutcome`] | Terminal result of one work item |
//! | [`FailedRecord`] | A failed record with its unit, position and cause |

pub mod record;
pub mod work;

pub use record::{ObjectIdentity, PasswordProfile, UserRecord, UsersFile};
pub use work::{Batch, FailedRecord, SubmissionOutcome, UnitOutcome, WorkItem};
