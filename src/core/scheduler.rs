//! The scheduling core: filter, select, dispatch, account.
//!
//! A [`Scheduler`] owns the job queue, the history map, the per-resource
//! load trackers and one policy. It is single-threaded by construction
//! (`&mut self` on every mutating call); callers that share it wrap it in
//! one lock held strictly around each call, as
//! [`crate::runtime::SchedulerService`] does.
//!
//! The core performs no I/O. With recording switched on it buffers the
//! [`SchedulerEvent`]s it produces, and the caller drains them with
//! [`Scheduler::take_events`] to journal them outside its lock.
//!
//! Dispatching a job is atomic with respect to the queue: a job returned
//! by [`Scheduler::schedule`] has been removed from the queue and has its
//! executor set, so successive calls never return the same job twice.

use std::collections::{BTreeMap, HashMap};

use crate::config::{PricingConfig, SchedulerConfig};
use crate::core::events::{CompletionReport, DispatchEvent, SchedulerEvent};
use crate::core::filter::{self, FilterContext};
use crate::core::history::History;
use crate::core::job::{Job, JobType, ScheduleHint};
use crate::core::load::{LoadTracker, Sale};
use crate::core::policy::{Candidate, PolicyContext, SchedulingPolicy, Selection};
use crate::core::queue::JobQueue;
use crate::core::resource::Resource;
use crate::core::SchedulerError;
use crate::infra::queue::InMemoryJobQueue;
use crate::util::serde::{ResourceId, TimestampMs};

/// Field constraints a candidate must satisfy; keys are [`Job::field`] names.
pub type MustMatch = BTreeMap<String, String>;

/// A dispatched job and the event describing the decision.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// The job, removed from the queue, with its executor set.
    pub job: Job,
    /// The dispatch event, also buffered as a [`SchedulerEvent`].
    pub event: DispatchEvent,
    /// Price and surplus when the policy priced the job.
    pub sale: Option<Sale>,
}

/// Why `schedule` returned no job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclineReason {
    /// The resource heartbeat is older than the staleness threshold.
    StaleResource,
    /// No queued job can run on the resource now.
    NoCandidates,
    /// The policy refused every candidate, e.g. all over budget.
    PolicyRejected,
}

/// Outcome of one scheduling call.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A job was dispatched.
    Dispatched(Dispatch),
    /// Nothing was dispatched.
    Declined(DeclineReason),
}

impl Decision {
    /// The dispatch, if any.
    pub fn into_dispatch(self) -> Option<Dispatch> {
        match self {
            Self::Dispatched(d) => Some(d),
            Self::Declined(_) => None,
        }
    }
}

/// True when every `must_match` entry equals the job's field of that name.
/// Unknown field names never match.
pub fn matches_all(job: &Job, must_match: &MustMatch) -> bool {
    must_match
        .iter()
        .all(|(key, want)| job.field(key).is_some_and(|have| have == *want))
}

/// Scheduling core for one grid.
pub struct Scheduler<Q: JobQueue = InMemoryJobQueue> {
    queue: Q,
    history: History,
    policy: Box<dyn SchedulingPolicy>,
    events: Option<Vec<SchedulerEvent>>,
    pricing: PricingConfig,
    loads: HashMap<ResourceId, LoadTracker>,
    staleness_threshold_ms: TimestampMs,
    expire_after_ms: Option<TimestampMs>,
}

impl<Q: JobQueue> std::fmt::Debug for Scheduler<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("policy", &self.policy.name())
            .field("pricing", &self.pricing)
            .field("staleness_threshold_ms", &self.staleness_threshold_ms)
            .field("expire_after_ms", &self.expire_after_ms)
            .finish_non_exhaustive()
    }
}

impl<Q: JobQueue> Scheduler<Q> {
    /// Create a scheduler from explicit settings and components.
    pub fn new(config: &SchedulerConfig, queue: Q, policy: Box<dyn SchedulingPolicy>) -> Self {
        Self {
            queue,
            history: History::new(&config.history),
            policy,
            events: None,
            pricing: config.pricing.clone(),
            loads: HashMap::new(),
            staleness_threshold_ms: config.staleness_threshold_ms(),
            expire_after_ms: config.expire_after_ms(),
        }
    }

    /// Buffer produced events for [`Scheduler::take_events`].
    #[must_use]
    pub fn with_recording(mut self) -> Self {
        self.set_recording(true);
        self
    }

    /// Switch event buffering on or off. Switching off drops the buffer.
    pub fn set_recording(&mut self, on: bool) {
        match (on, self.events.is_some()) {
            (true, false) => self.events = Some(Vec::new()),
            (false, true) => self.events = None,
            _ => {}
        }
    }

    /// Drain the events buffered since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<SchedulerEvent> {
        self.events.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Load tracker of a resource, once load-adaptive pricing has seen it.
    pub fn load(&self, resource_id: &ResourceId) -> Option<&LoadTracker> {
        self.loads.get(resource_id)
    }

    /// Price multiplier currently applied to a resource.
    pub fn load_multiplier(&self, resource_id: &ResourceId) -> f64 {
        self.loads.get(resource_id).map_or(1.0, LoadTracker::multiplier)
    }

    /// The job queue.
    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    /// The history map.
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// Name of the active policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Staleness threshold in milliseconds.
    pub const fn staleness_threshold_ms(&self) -> TimestampMs {
        self.staleness_threshold_ms
    }

    /// Append a job to the queue and return its position.
    pub fn enqueue(&mut self, job: Job, now_ms: TimestampMs) -> Result<usize, SchedulerError> {
        let event_job = job.clone();
        let position = self.enqueue_quiet(job, now_ms)?;
        tracing::info!("job {} enqueued at position {}", event_job.id(), position);
        self.emit(SchedulerEvent::Enqueued {
            job: event_job,
            at_ms: now_ms,
        });
        Ok(position)
    }

    fn enqueue_quiet(
        &mut self,
        mut job: Job,
        now_ms: TimestampMs,
    ) -> Result<usize, SchedulerError> {
        job.mark_queued(now_ms);
        self.queue.enqueue(job)
    }

    /// Pick a job for `resource`, dispatching it.
    ///
    /// Returns `Ok(None)` when nothing can be dispatched. The only errors are
    /// internal logic errors, which abort this call and leave the queue as
    /// it was before the selected job was removed.
    pub fn schedule(
        &mut self,
        resource: &Resource,
        must_match: Option<&MustMatch>,
        now_ms: TimestampMs,
    ) -> Result<Option<Dispatch>, SchedulerError> {
        self.schedule_explained(resource, must_match, now_ms)
            .map(Decision::into_dispatch)
    }

    /// Like [`Scheduler::schedule`], but says why nothing was dispatched.
    ///
    /// With load-adaptive pricing on, the request and its outcome feed the
    /// resource's load tracker.
    pub fn schedule_explained(
        &mut self,
        resource: &Resource,
        must_match: Option<&MustMatch>,
        now_ms: TimestampMs,
    ) -> Result<Decision, SchedulerError> {
        let decision = self.decide(resource, must_match, now_ms)?;
        self.observe_request(&resource.id, &decision);
        Ok(decision)
    }

    fn observe_request(&mut self, resource_id: &ResourceId, decision: &Decision) {
        if !self.pricing.load_adaptive {
            return;
        }
        let outcome = match decision {
            Decision::Declined(DeclineReason::StaleResource) => return,
            Decision::Declined(_) => None,
            Decision::Dispatched(d) => Some(d.sale.unwrap_or(Sale {
                price: 0.0,
                surplus: 0.0,
            })),
        };
        let pricing = &self.pricing;
        let tracker = self
            .loads
            .entry(resource_id.clone())
            .or_insert_with(|| LoadTracker::new(pricing));
        tracker.record(outcome);
        tracing::debug!(
            "resource {} load {:.2}, price multiplier {:.4}",
            resource_id,
            tracker.load(),
            tracker.multiplier()
        );
    }

    fn decide(
        &mut self,
        resource: &Resource,
        must_match: Option<&MustMatch>,
        now_ms: TimestampMs,
    ) -> Result<Decision, SchedulerError> {
        if resource.is_stale(now_ms, self.staleness_threshold_ms) {
            tracing::warn!(
                "resource {} is stale (last seen {} ms ago), not offering jobs",
                resource.id,
                now_ms.saturating_sub(resource.last_seen_ms)
            );
            return Ok(Decision::Declined(DeclineReason::StaleResource));
        }

        let candidates = self.annotate_queue(resource, must_match, now_ms);
        if candidates.is_empty() {
            tracing::debug!("no candidates for resource {}", resource.id);
            return Ok(Decision::Declined(DeclineReason::NoCandidates));
        }

        let ctx = PolicyContext::new(now_ms)
            .with_load_multiplier(self.load_multiplier(&resource.id));
        let Some(selection) = self.policy.select(&candidates, resource, &ctx) else {
            tracing::debug!(
                "policy {} declined {} candidates for resource {}",
                self.policy.name(),
                candidates.len(),
                resource.id
            );
            return Ok(Decision::Declined(DeclineReason::PolicyRejected));
        };
        let Some(chosen) = candidates.get(selection.candidate) else {
            tracing::error!(
                resource_id = %resource.id,
                "policy {} selected candidate {} of {}",
                self.policy.name(),
                selection.candidate,
                candidates.len()
            );
            return Err(SchedulerError::OutOfRange {
                index: selection.candidate,
                len: candidates.len(),
            });
        };

        let policy = self.policy.name();
        let dispatch = self.dispatch(chosen, &resource.id, now_ms, policy, selection)?;
        Ok(Decision::Dispatched(dispatch))
    }

    /// Filter every queued job against `resource` on a snapshot copy, write
    /// the annotations back and collect the candidates.
    fn annotate_queue(
        &mut self,
        resource: &Resource,
        must_match: Option<&MustMatch>,
        now_ms: TimestampMs,
    ) -> Vec<Candidate> {
        let ctx = FilterContext::new(now_ms, self.staleness_threshold_ms);
        let mut candidates = Vec::new();
        for (index, shared) in self.queue.snapshot_iter().into_entries() {
            let mut job = std::sync::Arc::unwrap_or_clone(shared);
            let before = (job.hint(), job.schedule_targets().contains(&resource.id));
            let hint = filter::annotate(&mut job, resource, &ctx);
            let after = (hint, job.schedule_targets().contains(&resource.id));
            if before != after {
                self.queue
                    .annotate(job.id(), hint, job.schedule_targets().clone());
            }
            if hint == ScheduleHint::Go
                && after.1
                && must_match.is_none_or(|m| matches_all(&job, m))
            {
                candidates.push(Candidate { index, job });
            }
        }
        candidates
    }

    /// Remove the chosen job from the queue and account for the dispatch.
    fn dispatch(
        &mut self,
        chosen: &Candidate,
        resource_id: &ResourceId,
        now_ms: TimestampMs,
        policy: &str,
        selection: Selection,
    ) -> Result<Dispatch, SchedulerError> {
        let mut job = self.take_from_queue(chosen.index, chosen.job.id(), resource_id)?;
        job.assign_executor(resource_id.clone());
        self.history.record_dispatch(&job, resource_id, now_ms);
        let event =
            DispatchEvent::new(&job, resource_id.clone(), now_ms, policy, selection.reason);
        tracing::info!(
            "job {} dispatched to {} by {} ({})",
            job.id(),
            resource_id,
            policy,
            event.reason
        );
        self.emit(SchedulerEvent::Dispatched(event.clone()));
        Ok(Dispatch {
            job,
            event,
            sale: selection.sale,
        })
    }

    /// Dequeue by the recorded index, falling back to the id when the
    /// index has drifted.
    fn take_from_queue(
        &mut self,
        index: usize,
        id: &str,
        resource_id: &ResourceId,
    ) -> Result<Job, SchedulerError> {
        if self.queue.get(index).is_some_and(|j| j.id() == id) {
            return self.queue.dequeue_at(index);
        }
        tracing::debug!("queue index {index} drifted for job {id}, locating by id");
        self.queue.dequeue_by_id(id).ok_or_else(|| {
            tracing::error!(
                job_id = %id,
                resource_id = %resource_id,
                "selected job vanished from the queue"
            );
            SchedulerError::JobVanished(id.to_string())
        })
    }

    /// Apply a completion report to the history. Returns false for jobs
    /// that are not in flight.
    pub fn record_completion(&mut self, report: &CompletionReport, now_ms: TimestampMs) -> bool {
        if !self.history.record_completion(report, now_ms) {
            return false;
        }
        tracing::info!(
            "job {} finished on {}: {}",
            report.job_id,
            report.resource_id,
            report.exit_kind
        );
        self.emit(SchedulerEvent::Completed {
            report: report.clone(),
            at_ms: now_ms,
        });
        true
    }

    /// Drop jobs that have been queued longer than the configured expiry.
    /// Does nothing when expiry is disabled.
    pub fn expire_jobs(&mut self, now_ms: TimestampMs) -> Vec<Job> {
        let Some(limit) = self.expire_after_ms else {
            return Vec::new();
        };
        let overdue: Vec<String> = self
            .queue
            .snapshot_iter()
            .iter()
            .filter(|(_, job)| {
                let since = job.queued_at_ms().unwrap_or_else(|| job.submitted_at_ms());
                now_ms.saturating_sub(since) > limit
            })
            .map(|(_, job)| job.id().to_string())
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for id in overdue {
            if let Some(job) = self.queue.dequeue_by_id(&id) {
                tracing::warn!("job {} expired after waiting in queue", id);
                self.emit(SchedulerEvent::Expired {
                    job_id: id,
                    at_ms: now_ms,
                });
                expired.push(job);
            }
        }
        expired
    }

    /// Pack further bulk jobs of the same owner onto what `best` leaves of
    /// `resource`. Does nothing unless `best` is a bulk job.
    pub fn backfill(
        &mut self,
        best: &Job,
        resource: &Resource,
        now_ms: TimestampMs,
    ) -> Result<Vec<Dispatch>, SchedulerError> {
        if best.requirements().job_type != JobType::Bulk {
            return Ok(Vec::new());
        }
        let must_match = MustMatch::from([
            ("owner".to_string(), best.owner().to_string()),
            ("job_type".to_string(), JobType::Bulk.to_string()),
        ]);
        let mut packed: Vec<Job> = vec![best.clone()];
        let mut dispatched = Vec::new();
        loop {
            let remaining = resource.remaining_after(packed.iter());
            match self.decide(&remaining, Some(&must_match), now_ms)? {
                Decision::Dispatched(d) => {
                    packed.push(d.job.clone());
                    dispatched.push(d);
                }
                Decision::Declined(_) => break,
            }
        }
        if !dispatched.is_empty() {
            tracing::info!(
                "backfilled {} bulk jobs of {} onto {}",
                dispatched.len(),
                best.owner(),
                resource.id
            );
        }
        Ok(dispatched)
    }

    /// Rebuild queue and history by applying `events` in order.
    ///
    /// Replayed events are not buffered again. Returns the number of events
    /// applied; events that no longer apply (a dispatch of a job that was
    /// never enqueued, a duplicate enqueue, an enqueue into a full queue)
    /// are logged and skipped.
    pub fn replay<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = SchedulerEvent>,
    {
        let mut applied = 0;
        for event in events {
            let ok = match event {
                SchedulerEvent::Enqueued { job, at_ms } => {
                    let job_id = job.id().to_string();
                    match self.enqueue_quiet(job, at_ms) {
                        Ok(_) => true,
                        Err(e) => {
                            tracing::warn!(job_id = %job_id, "replayed enqueue rejected: {e}");
                            false
                        }
                    }
                }
                SchedulerEvent::Dispatched(ev) => match self.queue.dequeue_by_id(&ev.job_id) {
                    Some(mut job) => {
                        job.assign_executor(ev.resource_id.clone());
                        self.history
                            .record_dispatch(&job, &ev.resource_id, ev.decided_at_ms);
                        true
                    }
                    None => false,
                },
                SchedulerEvent::Completed { report, at_ms } => {
                    self.history.record_completion(&report, at_ms)
                }
                SchedulerEvent::Expired { job_id, .. } => {
                    self.queue.dequeue_by_id(&job_id).is_some()
                }
            };
            if ok {
                applied += 1;
            } else {
                tracing::warn!("replay skipped an event that no longer applies");
            }
        }
        tracing::info!(
            "replayed {} events: {} queued, {} in flight",
            applied,
            self.queue.len(),
            self.history.in_flight_len()
        );
        applied
    }

    fn emit(&mut self, event: SchedulerEvent) {
        if let Some(events) = self.events.as_mut() {
            events.push(event);
        }
    }
}
