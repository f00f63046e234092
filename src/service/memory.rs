use super::RecordService;
use crate::batch::{BatchStepResponse, CompositeRequest, CompositeResponse};
use crate::error::SubmitError;
use crate::types::UserRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

type FailureRule = Box<dyn Fn(&UserRecord) -> bool + Send + Sync>;

/// In-process record service.
///
/// Stores what it is given, assigns object ids, and rejects any record
/// matching the configured failure rule with HTTP 400.
pub struct InMemoryRecordService {
    stored: Mutex<Vec<UserRecord>>,
    create_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_when: Option<FailureRule>,
    latency: Option<Duration>,
}

impl Default for InMemoryRecordService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordService {
    pub fn new() -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            fail_when: None,
            latency: None,
        }
    }

    pub fn with_failure_rule(
        mut self,
        rule: impl Fn(&UserRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_when = Some(Box::new(rule));
        self
    }

    /// Delay every call, to make concurrency observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<UserRecord> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn rejects(&self, record: &UserRecord) -> bool {
        self.fail_when.as_ref().is_some_and(|rule| rule(record))
    }

    fn store(&self, record: &UserRecord) -> std::result::Result<UserRecord, SubmitError> {
        if self.rejects(record) {
            return Err(SubmitError::rejected(400, "rejected by failure rule"));
        }
        let mut stored = record.clone();
        stored.id = Some(Uuid::new_v4().to_string());
        stored.password_profile = None;
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl RecordService for InMemoryRecordService {
    async fn create(&self, record: &UserRecord) -> std::result::Result<UserRecord, SubmitError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.store(record)
    }

    async fn create_batch(
        &self,
        request: &CompositeRequest,
    ) -> std::result::Result<CompositeResponse, SubmitError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        // Answer in reverse so callers cannot rely on response order.
        let responses = request
            .requests
            .iter()
            .rev()
            .map(|step| {
                let parsed = step
                    .body
                    .clone()
                    .map(serde_json::from_value::<UserRecord>);
                let (status, body) = match parsed {
                    Some(Ok(record)) => match self.store(&record) {
                        Ok(created) => (201, serde_json::to_value(created).ok()),
                        Err(e) => (400, Some(error_body(&e.to_string()))),
                    },
                    Some(Err(e)) => (400, Some(error_body(&e.to_string()))),
                    None => (400, Some(error_body("step has no body"))),
                };
                BatchStepResponse {
                    id: step.id.clone(),
                    status,
                    body,
                }
            })
            .collect();

        Ok(CompositeResponse { responses })
    }

    async fn update(&self, record: &UserRecord) -> std::result::Result<(), SubmitError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if record.id.is_none() {
            return Err(SubmitError::InvalidRecord("update needs an object id".into()));
        }
        if self.rejects(record) {
            return Err(SubmitError::rejected(400, "rejected by failure rule"));
        }
        Ok(())
    }
}

fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": { "code": "Request_BadRequest", "message": message } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batcher;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            display_name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let service = InMemoryRecordService::new();
        let created = service.create(&user("a")).await.unwrap();
        assert!(created.id.is_some());
        assert_eq!(service.create_calls(), 1);
        assert_eq!(service.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_applies_failure_rule_per_step() {
        let service = InMemoryRecordService::new().with_failure_rule(|u| u.display_name == "b");
        let request = Batcher::default()
            .encode(&[user("a"), user("b"), user("c")])
            .unwrap();

        let response = service.create_batch(&request).await.unwrap();
        assert_eq!(response.responses[0].id, "2");

        let outcome = response.into_outcome(3);
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].0, 1);
        assert_eq!(service.stored().len(), 2);
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let service = InMemoryRecordService::new();
        assert!(matches!(
            service.update(&user("a")).await,
            Err(SubmitError::InvalidRecord(_))
        ));
        let mut existing = user("a");
        existing.id = Some("42".into());
        assert!(service.update(&existing).await.is_ok());
        assert_eq!(service.update_calls(), 2);
    }
}
