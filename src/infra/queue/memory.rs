//! In-memory job queue preserving insertion order.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::core::job::{Job, ScheduleHint};
use crate::core::queue::{JobQueue, QueueSnapshot};
use crate::core::SchedulerError;
use crate::util::serde::{JobId, ResourceId};

/// In-memory queue backed by a vector of shared job handles.
///
/// Enqueue and duplicate detection are O(1); removal by index is O(n) in
/// the number of jobs behind the removed one.
pub struct InMemoryJobQueue {
    max_depth: usize,
    jobs: Vec<Arc<Job>>,
    ids: HashSet<JobId>,
}

impl InMemoryJobQueue {
    /// Create a new in-memory queue with a maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            jobs: Vec::with_capacity(max_depth.min(1024)),
            ids: HashSet::new(),
        }
    }

    fn take(&mut self, index: usize) -> Job {
        let job = self.jobs.remove(index);
        self.ids.remove(job.id());
        Arc::unwrap_or_clone(job)
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&mut self, job: Job) -> Result<usize, SchedulerError> {
        if job.is_dispatched() {
            return Err(SchedulerError::InvalidJob(format!(
                "job {} is already dispatched",
                job.id()
            )));
        }
        if self.ids.contains(job.id()) {
            return Err(SchedulerError::DuplicateJob(job.id().to_string()));
        }
        if self.len() >= self.max_depth() {
            return Err(SchedulerError::QueueFull("max queue depth reached".into()));
        }
        self.ids.insert(job.id().to_string());
        self.jobs.push(Arc::new(job));
        Ok(self.jobs.len() - 1)
    }

    fn dequeue_at(&mut self, index: usize) -> Result<Job, SchedulerError> {
        if index >= self.jobs.len() {
            return Err(SchedulerError::OutOfRange {
                index,
                len: self.jobs.len(),
            });
        }
        Ok(self.take(index))
    }

    fn dequeue_by_id(&mut self, id: &str) -> Option<Job> {
        let index = self.position_of(id)?;
        Some(self.take(index))
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        if !self.ids.contains(id) {
            return None;
        }
        self.jobs.iter().position(|j| j.id() == id)
    }

    fn get(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index).map(AsRef::as_ref)
    }

    fn annotate(&mut self, id: &str, hint: ScheduleHint, targets: BTreeSet<ResourceId>) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };
        Arc::make_mut(&mut self.jobs[index]).set_schedule(hint, targets);
        true
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }

    fn snapshot_iter(&self) -> QueueSnapshot {
        QueueSnapshot::from_jobs(self.jobs.iter().cloned())
    }
}
