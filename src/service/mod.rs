//! Remote record service the dispatcher submits to.
//!
//! | Implementation | Description |
//! |----------------|-------------|
//! | [`HttpRecordService`] | Directory REST API (`/users`, `/$batch`) over reqwest |
//! | [`InMemoryRecordService`] | Local stand-in for dry runs and tests |

mod http;
mod memory;

pub use http::HttpRecordService;
pub use memory::InMemoryRecordService;

use crate::batch::{CompositeRequest, CompositeResponse};
use crate::error::SubmitError;
use crate::types::UserRecord;
use async_trait::async_trait;

/// What the engine needs from the directory service.
///
/// Implementations must tolerate any number of concurrent calls; the engine
/// adds no locking of its own.
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Create one record, returning it as stored by the service.
    async fn create(&self, record: &UserRecord) -> Result<UserRecord, SubmitError>;

    /// Submit a composite request of up to `MAX_BATCH_SIZE` steps. An `Err`
    /// means the composite call itself failed; per-step failures are in the
    /// response.
    async fn create_batch(
        &self,
        request: &CompositeRequest,
    ) -> Result<CompositeResponse, SubmitError>;

    /// Update the mutable profile properties of an existing record.
    async fn update(&self, record: &UserRecord) -> Result<(), SubmitError>;
}
