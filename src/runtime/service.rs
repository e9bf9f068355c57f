//! Thread-safe facade over the scheduling core.
//!
//! Front-ends and resource daemons call in concurrently. The scheduler
//! sits behind one mutex held strictly around each core call. Events the
//! call produced are moved to a pending queue before that lock is
//! released, then written to the journal under a separate lock; listeners
//! are notified through the spawner last. Journal I/O never blocks
//! scheduling, and the journal still sees events in decision order.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::{
    CompletionReport, Dispatch, DispatchEvent, DispatchListener, EventSink, Job, JobQueue,
    MustMatch, Scheduler, SchedulerError, SchedulerEvent, Spawn,
};
use crate::runtime::api::{JobSubmission, ResourceHeartbeat, SchedulerStatus};
use crate::runtime::registry::ResourceRegistry;
use crate::util::serde::{ResourceId, TimestampMs};

/// Scheduler, resource registry and dispatch listeners in one place.
pub struct SchedulerService<S: Spawn> {
    scheduler: Mutex<Scheduler>,
    pending: Mutex<VecDeque<SchedulerEvent>>,
    journal: Mutex<Option<Box<dyn EventSink>>>,
    registry: ResourceRegistry,
    listeners: RwLock<Vec<Arc<dyn DispatchListener>>>,
    spawner: S,
}

impl<S: Spawn> SchedulerService<S> {
    /// Wrap a scheduler.
    pub fn new(scheduler: Scheduler, spawner: S) -> Self {
        Self {
            scheduler: Mutex::new(scheduler),
            pending: Mutex::new(VecDeque::new()),
            journal: Mutex::new(None),
            registry: ResourceRegistry::new(),
            listeners: RwLock::new(Vec::new()),
            spawner,
        }
    }

    /// Journal every event the scheduler produces from now on to `sink`.
    #[must_use]
    pub fn with_journal(mut self, sink: Box<dyn EventSink>) -> Self {
        self.scheduler.get_mut().set_recording(true);
        *self.journal.get_mut() = Some(sink);
        self
    }

    /// Register a listener for dispatch events.
    pub fn add_listener(&self, listener: Arc<dyn DispatchListener>) {
        self.listeners.write().push(listener);
    }

    /// The resource registry.
    pub const fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Validate a submission and enqueue the job. Returns its queue position.
    pub fn submit(
        &self,
        submission: JobSubmission,
        now_ms: TimestampMs,
    ) -> Result<usize, SchedulerError> {
        let job = submission.into_job(now_ms)?;
        self.locked(|s| s.enqueue(job, now_ms))
    }

    /// Re-submit a lost job with its retry counter incremented.
    pub fn resubmit(&self, job: Job, now_ms: TimestampMs) -> Result<usize, SchedulerError> {
        self.locked(|s| s.enqueue(job.requeue(), now_ms))
    }

    /// Validate a heartbeat and swap the resource record into the registry.
    pub fn heartbeat(
        &self,
        heartbeat: ResourceHeartbeat,
        now_ms: TimestampMs,
    ) -> Result<ResourceId, SchedulerError> {
        let resource = heartbeat.into_resource(now_ms)?;
        let id = resource.id.clone();
        if self.registry.upsert(resource).is_none() {
            tracing::info!("resource {} registered", id);
        }
        Ok(id)
    }

    /// Ask for one job on behalf of a registered resource.
    ///
    /// Unknown resources get `Ok(None)`.
    pub fn request_job(
        &self,
        resource_id: &ResourceId,
        must_match: Option<&MustMatch>,
        now_ms: TimestampMs,
    ) -> Result<Option<Dispatch>, SchedulerError> {
        let Some(resource) = self.registry.get(resource_id) else {
            tracing::warn!("job request from unknown resource {}", resource_id);
            return Ok(None);
        };
        let dispatch = self.locked(|s| s.schedule(&resource, must_match, now_ms))?;
        if let Some(d) = &dispatch {
            self.notify(&d.event);
        }
        Ok(dispatch)
    }

    /// Ask for a job and, when it is a bulk job, every further bulk job of
    /// the same owner that fits the remaining capacity.
    pub fn request_jobs(
        &self,
        resource_id: &ResourceId,
        now_ms: TimestampMs,
    ) -> Result<Vec<Dispatch>, SchedulerError> {
        let Some(resource) = self.registry.get(resource_id) else {
            tracing::warn!("job request from unknown resource {}", resource_id);
            return Ok(Vec::new());
        };
        let dispatched = self.locked(|scheduler| {
            Ok::<_, SchedulerError>(match scheduler.schedule(&resource, None, now_ms)? {
                None => Vec::new(),
                Some(best) => {
                    let extra = scheduler.backfill(&best.job, &resource, now_ms)?;
                    std::iter::once(best).chain(extra).collect()
                }
            })
        })?;
        for d in &dispatched {
            self.notify(&d.event);
        }
        Ok(dispatched)
    }

    /// Record a completion report.
    pub fn report_completion(&self, report: &CompletionReport, now_ms: TimestampMs) -> bool {
        self.locked(|s| s.record_completion(report, now_ms))
    }

    /// Expire overdue jobs.
    pub fn expire_jobs(&self, now_ms: TimestampMs) -> Vec<Job> {
        self.locked(|s| s.expire_jobs(now_ms))
    }

    /// Current counters.
    pub fn status(&self) -> SchedulerStatus {
        let scheduler = self.scheduler.lock();
        SchedulerStatus {
            policy: scheduler.policy_name().to_string(),
            queued: scheduler.queue().len(),
            max_queue_depth: scheduler.queue().max_depth(),
            in_flight: scheduler.history().in_flight_len(),
            history_entries: scheduler.history().len(),
            resources: self.registry.len(),
        }
    }

    /// Run `f` with the scheduler locked.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&Scheduler) -> R) -> R {
        f(&self.scheduler.lock())
    }

    /// Run one core call under the scheduler lock and journal what it
    /// produced once the lock is released.
    fn locked<R>(&self, f: impl FnOnce(&mut Scheduler) -> R) -> R {
        let out = {
            let mut scheduler = self.scheduler.lock();
            let out = f(&mut scheduler);
            let events = scheduler.take_events();
            if !events.is_empty() {
                self.pending.lock().extend(events);
            }
            out
        };
        self.flush_journal();
        out
    }

    /// Write pending events to the journal, oldest first.
    pub fn flush_journal(&self) {
        let mut journal = self.journal.lock();
        let batch: Vec<SchedulerEvent> = self.pending.lock().drain(..).collect();
        let Some(sink) = journal.as_mut() else {
            return;
        };
        for event in &batch {
            sink.record(event);
        }
    }

    fn notify(&self, event: &DispatchEvent) {
        for listener in self.listeners.read().iter() {
            let listener = Arc::clone(listener);
            let event = event.clone();
            self.spawner.spawn(async move {
                listener.on_dispatch(event).await;
            });
        }
    }
}
