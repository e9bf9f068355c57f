//! Scheduler events and sinks.
//!
//! Every state change the core makes is described by a [`SchedulerEvent`].
//! Sinks receive events after the change has been applied; feeding the
//! same sequence to [`crate::core::Scheduler::replay`] rebuilds the queue
//! and history.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::job::Job;
use crate::util::serde::{JobId, OwnerId, ResourceId, TimestampMs};

/// Emitted once per dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Unique event identifier.
    pub event_id: String,
    /// Dispatched job.
    pub job_id: JobId,
    /// Resource the job was assigned to.
    pub resource_id: ResourceId,
    /// Job owner.
    pub owner: OwnerId,
    /// Decision time (ms since epoch).
    pub decided_at_ms: TimestampMs,
    /// Name of the policy that chose the job.
    pub policy: String,
    /// Human-readable reason for the choice.
    pub reason: String,
}

impl DispatchEvent {
    /// Build an event with a fresh identifier.
    pub fn new(
        job: &Job,
        resource_id: ResourceId,
        decided_at_ms: TimestampMs,
        policy: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            job_id: job.id().to_string(),
            resource_id,
            owner: job.owner().to_string(),
            decided_at_ms,
            policy: policy.into(),
            reason: reason.into(),
        }
    }
}

/// How a dispatched job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitKind {
    /// Finished successfully.
    Ok,
    /// Ran and failed.
    Failed,
    /// Never reported back.
    Lost,
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Failed => write!(f, "FAILED"),
            Self::Lost => write!(f, "LOST"),
        }
    }
}

impl FromStr for ExitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "FAILED" => Ok(Self::Failed),
            "LOST" => Ok(Self::Lost),
            other => Err(format!("unknown exit kind `{other}`")),
        }
    }
}

/// Completion callback from the executing resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    /// Finished job.
    pub job_id: JobId,
    /// Resource that ran it.
    pub resource_id: ResourceId,
    /// Observed wall-clock runtime in seconds.
    pub observed_wall_secs: f64,
    /// Price actually charged.
    pub observed_price: f64,
    /// Outcome.
    pub exit_kind: ExitKind,
}

/// A state change applied by the scheduler core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A job entered the queue.
    Enqueued {
        /// The job as submitted.
        job: Job,
        /// Enqueue time.
        at_ms: TimestampMs,
    },
    /// A job left the queue for a resource.
    Dispatched(DispatchEvent),
    /// A resource reported a job outcome.
    Completed {
        /// The report.
        report: CompletionReport,
        /// Time the report was processed.
        at_ms: TimestampMs,
    },
    /// A job was dropped from the queue after waiting too long.
    Expired {
        /// Expired job.
        job_id: JobId,
        /// Expiry time.
        at_ms: TimestampMs,
    },
}

impl SchedulerEvent {
    /// Identifier of the job the event concerns.
    pub fn job_id(&self) -> &str {
        match self {
            Self::Enqueued { job, .. } => job.id(),
            Self::Dispatched(event) => &event.job_id,
            Self::Completed { report, .. } => &report.job_id,
            Self::Expired { job_id, .. } => job_id,
        }
    }
}

/// Event sink abstraction.
pub trait EventSink: Send {
    /// Record an event.
    fn record(&mut self, event: &SchedulerEvent);
}

impl<T: EventSink> EventSink for Arc<Mutex<T>> {
    fn record(&mut self, event: &SchedulerEvent) {
        self.lock().record(event);
    }
}

/// In-memory event sink with a bounded buffer; the oldest events are dropped.
pub struct InMemoryEventLog {
    events: VecDeque<SchedulerEvent>,
    max_events: usize,
}

impl InMemoryEventLog {
    /// Create a new in-memory log holding at most `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.iter().cloned().collect()
    }

    /// Dispatch events only.
    pub fn dispatches(&self) -> Vec<DispatchEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Dispatched(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for InMemoryEventLog {
    fn record(&mut self, event: &SchedulerEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
    }
}
