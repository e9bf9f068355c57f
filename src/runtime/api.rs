//! API-facing request/response models.
//!
//! These are the key-value records exchanged with the front-end and the
//! resource daemons. Converting them into core types performs the
//! boundary validation; nothing reaches the queue unvalidated.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::{Job, JobTypeSupport, Requirements, Resource, SchedulerError};
use crate::util::serde::{JobId, OwnerId, ResourceId, TimestampMs};

/// Job submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    /// Job identifier.
    pub job_id: JobId,
    /// Owner identity.
    pub owner: OwnerId,
    /// Submission time (ms since epoch); defaults to receipt time.
    #[serde(default)]
    pub submitted_at_ms: Option<TimestampMs>,
    /// Requested resources; absent fields default to zero/empty.
    #[serde(default)]
    pub requirements: Requirements,
    /// Optional maximum price expression.
    #[serde(default)]
    pub max_price: Option<String>,
    /// Retry counter, set by the collaborator when re-submitting a lost job.
    #[serde(default)]
    pub retries: u32,
}

impl JobSubmission {
    /// Validate and convert into a pending job.
    pub fn into_job(self, now_ms: TimestampMs) -> Result<Job, SchedulerError> {
        let submitted = self.submitted_at_ms.unwrap_or(now_ms);
        let job = Job::new(self.job_id, self.owner, submitted, self.requirements)?
            .with_retries(self.retries);
        match self.max_price {
            Some(expr) if !expr.trim().is_empty() => job.with_max_price(expr),
            _ => Ok(job),
        }
    }
}

const fn one() -> u32 {
    1
}

/// Resource heartbeat payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHeartbeat {
    /// Host URL.
    pub host: String,
    /// Discriminator among resources on the same host.
    #[serde(default)]
    pub index: u32,
    /// CPUs per node.
    #[serde(default)]
    pub cpu_count: u32,
    /// Number of nodes.
    #[serde(default = "one")]
    pub node_count: u32,
    /// Memory in megabytes.
    #[serde(default)]
    pub memory_mb: u64,
    /// Disk in gigabytes.
    #[serde(default)]
    pub disk_gb: u64,
    /// Architecture tag.
    pub architecture: String,
    /// Platform name.
    #[serde(default)]
    pub platform: String,
    /// Longest CPU time a job may ask for, in seconds.
    #[serde(default)]
    pub max_cpu_time_secs: Option<u64>,
    /// Provided runtime environments.
    #[serde(default)]
    pub runtime_environments: BTreeSet<String>,
    /// Price expression; defaults to free.
    #[serde(default)]
    pub price_expression: Option<String>,
    /// Virtual organization memberships.
    #[serde(default)]
    pub vgrids: Vec<String>,
    /// Free execution slots, if the resource reports them.
    #[serde(default)]
    pub free_slots: Option<u32>,
    /// Accepted job types.
    #[serde(default)]
    pub job_types: JobTypeSupport,
    /// Sandbox worker flag.
    #[serde(default)]
    pub sandbox: bool,
    /// Liveness stamp; defaults to receipt time.
    #[serde(default)]
    pub last_seen_ms: Option<TimestampMs>,
}

impl ResourceHeartbeat {
    /// Identifier the heartbeat refers to.
    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.host.clone(), self.index)
    }

    /// Validate and convert into a resource record.
    pub fn into_resource(self, now_ms: TimestampMs) -> Result<Resource, SchedulerError> {
        let mut resource = Resource::new(
            ResourceId::new(self.host, self.index),
            self.architecture,
            self.last_seen_ms.unwrap_or(now_ms),
        )
        .with_capacity(self.cpu_count, self.memory_mb, self.disk_gb)
        .with_nodes(self.node_count)
        .with_platform(self.platform)
        .with_max_cpu_time(self.max_cpu_time_secs)
        .with_free_slots(self.free_slots)
        .with_job_types(self.job_types)
        .with_sandbox(self.sandbox);
        resource.runtime_environments = self.runtime_environments;
        resource.vgrids = self.vgrids;
        if let Some(price) = self.price_expression.filter(|p| !p.trim().is_empty()) {
            resource.price_expression = price;
        }
        resource.validate()?;
        Ok(resource)
    }
}

/// Scheduler snapshot for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Active policy name.
    pub policy: String,
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Queue capacity.
    pub max_queue_depth: usize,
    /// Dispatched jobs awaiting a completion report.
    pub in_flight: usize,
    /// History entries held.
    pub history_entries: usize,
    /// Registered resources.
    pub resources: usize,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Healthy while the queue can still accept jobs.
pub fn health(status: &SchedulerStatus) -> Health {
    Health {
        ok: status.queued < status.max_queue_depth,
    }
}
