//! Fixed-size partitioning of records into composite requests.

use super::composite::{BatchStep, CompositeRequest};
use crate::error::ErrorContext;
use crate::types::{Batch, WorkItem};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Hard ceiling on steps per composite request imposed by the service.
pub const MAX_BATCH_SIZE: usize = 20;

/// Split `items` into consecutive groups of at most `batch_size`.
///
/// Only the last group may be shorter; concatenating the groups gives back
/// the input in its original order. Empty input yields no groups.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut groups = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut iter = items.into_iter();
    loop {
        let group: Vec<T> = iter.by_ref().take(batch_size).collect();
        if group.is_empty() {
            break;
        }
        groups.push(group);
    }
    groups
}

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub batch_size: usize,
    /// Relative URL every step posts to.
    pub step_url: String,
    pub step_method: String,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            step_url: "/users".to_string(),
            step_method: "POST".to_string(),
        }
    }
}

impl BatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the group size; clamped to `1..=MAX_BATCH_SIZE`.
    pub fn with_batch_size(mut self, s: usize) -> Self {
        self.batch_size = s.clamp(1, MAX_BATCH_SIZE);
        self
    }
}

/// Builds batch work items out of an ordered record collection.
#[derive(Debug, Clone, Default)]
pub struct Batcher {
    config: BatcherConfig,
}

impl Batcher {
    pub fn new(config: BatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    pub fn partition<T>(&self, items: Vec<T>) -> Vec<Vec<T>> {
        partition(items, self.config.batch_size)
    }

    /// Encode one group as a composite request. Step ids are the record
    /// positions within the group.
    pub fn encode<T: Serialize>(&self, group: &[T]) -> Result<CompositeRequest> {
        if group.len() > MAX_BATCH_SIZE {
            return Err(Error::encoding_with_context(
                format!(
                    "group of {} exceeds the {} step limit",
                    group.len(),
                    MAX_BATCH_SIZE
                ),
                ErrorContext::new().with_source("batcher"),
            ));
        }

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let requests = group
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let body = serde_json::to_value(record).map_err(|e| {
                    Error::encoding_with_context(
                        e.to_string(),
                        ErrorContext::new()
                            .with_field_path(format!("group[{}]", position))
                            .with_source("batcher"),
                    )
                })?;
                Ok(BatchStep {
                    id: position.to_string(),
                    method: self.config.step_method.clone(),
                    url: self.config.step_url.clone(),
                    headers: headers.clone(),
                    body: Some(body),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompositeRequest { requests })
    }

    /// Partition and encode in one pass. Any encoding fault fails the whole
    /// call: a group that cannot be encoded means the engine is broken, not
    /// one record.
    pub fn build_units<T: Serialize>(&self, items: Vec<T>) -> Result<Vec<WorkItem<T>>> {
        self.partition(items)
            .into_iter()
            .map(|records| {
                let request = self.encode(&records)?;
                Ok(WorkItem::Batch(Batch { records, request }))
            })
            .collect()
    }
}
