//! Job queue abstraction and point-in-time snapshots.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::job::{Job, ScheduleHint};
use crate::core::SchedulerError;
use crate::util::serde::ResourceId;

/// Ordered queue of pending jobs.
///
/// Ordering is insertion order only; priorities are a policy concern.
/// A job in the queue never has an executor.
pub trait JobQueue: Send {
    /// Append a job and return its position.
    ///
    /// Fails with `DuplicateJob` when a job with the same id is queued,
    /// `QueueFull` at `max_depth`, and `InvalidJob` for an already
    /// dispatched job.
    fn enqueue(&mut self, job: Job) -> Result<usize, SchedulerError>;
    /// Remove and return the job at `index`.
    fn dequeue_at(&mut self, index: usize) -> Result<Job, SchedulerError>;
    /// Remove and return the job with `id`, if queued.
    fn dequeue_by_id(&mut self, id: &str) -> Option<Job>;
    /// Current position of the job with `id`.
    fn position_of(&self, id: &str) -> Option<usize>;
    /// Job at `index`.
    fn get(&self, index: usize) -> Option<&Job>;
    /// Replace the scheduling annotations of the job with `id`. Returns
    /// false when the job is no longer queued.
    fn annotate(&mut self, id: &str, hint: ScheduleHint, targets: BTreeSet<ResourceId>) -> bool;
    /// Maximum number of queued jobs.
    fn max_depth(&self) -> usize;
    /// Number of queued jobs.
    fn len(&self) -> usize;
    /// Shallow copy of the queue as `(index, job)` pairs.
    fn snapshot_iter(&self) -> QueueSnapshot;

    /// Job with `id`, if queued.
    fn get_by_id(&self, id: &str) -> Option<&Job> {
        self.position_of(id).and_then(|i| self.get(i))
    }

    /// True when no job is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The queue as it was when the snapshot was taken.
///
/// Jobs are shared with the queue, not deep-copied. Iteration is finite
/// and may be restarted any number of times; later queue mutations do not
/// show up here.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    entries: Vec<(usize, Arc<Job>)>,
}

impl QueueSnapshot {
    /// Build a snapshot from jobs in queue order.
    pub fn from_jobs(jobs: impl IntoIterator<Item = Arc<Job>>) -> Self {
        Self {
            entries: jobs.into_iter().enumerate().collect(),
        }
    }

    /// Iterate `(index, job)` pairs in queue order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Job)> + '_ {
        self.entries.iter().map(|(i, job)| (*i, job.as_ref()))
    }

    /// Number of jobs captured.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the queue was empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared job handles in queue order.
    pub fn into_entries(self) -> Vec<(usize, Arc<Job>)> {
        self.entries
    }
}
