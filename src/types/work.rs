//! Units of submission and their outcomes.

use crate::batch::CompositeRequest;
use crate::error::SubmitError;

/// A group of records submitted as one composite request.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub records: Vec<T>,
    pub request: CompositeRequest,
}

/// One unit of submission: a single record or a batch.
#[derive(Debug, Clone)]
pub enum WorkItem<T> {
    Single(T),
    Batch(Batch<T>),
}

impl<T> WorkItem<T> {
    pub fn records(&self) -> &[T] {
        match self {
            WorkItem::Single(record) => std::slice::from_ref(record),
            WorkItem::Batch(batch) => &batch.records,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn composite(&self) -> Option<&CompositeRequest> {
        match self {
            WorkItem::Single(_) => None,
            WorkItem::Batch(batch) => Some(&batch.request),
        }
    }
}

/// What a submission reports when its call returned at all: the positions
/// (within the unit) that failed. Positions not listed succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOutcome {
    failed: Vec<(usize, SubmitError)>,
}

impl UnitOutcome {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_failures(failed: Vec<(usize, SubmitError)>) -> Self {
        Self { failed }
    }

    pub fn push_failure(&mut self, position: usize, cause: SubmitError) {
        self.failed.push((position, cause));
    }

    pub fn failures(&self) -> &[(usize, SubmitError)] {
        &self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn into_failures(self) -> Vec<(usize, SubmitError)> {
        self.failed
    }
}

/// A record that did not make it, with enough context to find it again.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord<T> {
    /// Index of the work item in launch order.
    pub unit: usize,
    /// Position of the record inside that work item.
    pub position: usize,
    pub record: T,
    pub cause: SubmitError,
}

/// Terminal result of one work item.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome<T> {
    Success {
        unit: usize,
        records: usize,
    },
    Failure {
        unit: usize,
        succeeded: usize,
        failures: Vec<FailedRecord<T>>,
    },
}

impl<T> SubmissionOutcome<T> {
    pub fn unit(&self) -> usize {
        match self {
            SubmissionOutcome::Success { unit, .. } | SubmissionOutcome::Failure { unit, .. } => {
                *unit
            }
        }
    }

    pub fn succeeded(&self) -> usize {
        match self {
            SubmissionOutcome::Success { records, .. } => *records,
            SubmissionOutcome::Failure { succeeded, .. } => *succeeded,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            SubmissionOutcome::Success { .. } => 0,
            SubmissionOutcome::Failure { failures, .. } => failures.len(),
        }
    }
}

impl<T: Clone> SubmissionOutcome<T> {
    /// Resolve a submission result against the unit it was made for.
    ///
    /// A whole-unit error fails every record. Reported positions outside the
    /// unit are dropped and a position reported twice counts once, so
    /// `succeeded + failed` always equals the unit size.
    pub fn resolve(
        unit: usize,
        item: &WorkItem<T>,
        result: Result<UnitOutcome, SubmitError>,
    ) -> Self {
        let records = item.records();
        let failed: Vec<(usize, SubmitError)> = match result {
            Ok(outcome) if outcome.is_success() => {
                return SubmissionOutcome::Success {
                    unit,
                    records: records.len(),
                }
            }
            Ok(outcome) => outcome.into_failures(),
            Err(cause) => (0..records.len()).map(|p| (p, cause.clone())).collect(),
        };

        let mut seen = vec![false; records.len()];
        let mut failures = Vec::with_capacity(failed.len());
        for (position, cause) in failed {
            match seen.get_mut(position) {
                Some(flag) if !*flag => {
                    *flag = true;
                    failures.push(FailedRecord {
                        unit,
                        position,
                        record: records[position].clone(),
                        cause,
                    });
                }
                _ => {}
            }
        }

        if failures.is_empty() {
            return SubmissionOutcome::Success {
                unit,
                records: records.len(),
            };
        }
        SubmissionOutcome::Failure {
            unit,
            succeeded: records.len() - failures.len(),
            failures,
        }
    }
}
