//! Job records and their scheduling annotations.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::expr::Expression;
use crate::util::serde::{JobId, OwnerId, ResourceId, TimestampMs};

/// Result of filtering a job against one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleHint {
    /// The resource can run the job now.
    Go,
    /// The resource could run the job but has no free slot.
    #[default]
    Wait,
    /// The resource can never run the job.
    Never,
}

impl fmt::Display for ScheduleHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Go => write!(f, "GO"),
            Self::Wait => write!(f, "WAIT"),
            Self::Never => write!(f, "NEVER"),
        }
    }
}

/// Kind of workload, matched against what a resource accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Ordinary batch job.
    #[default]
    Batch,
    /// Small job that may be packed with others of the same owner.
    Bulk,
    /// Job needing an interactive session.
    Interactive,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => write!(f, "batch"),
            Self::Bulk => write!(f, "bulk"),
            Self::Interactive => write!(f, "interactive"),
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "bulk" => Ok(Self::Bulk),
            "interactive" => Ok(Self::Interactive),
            other => Err(format!("unknown job type `{other}`")),
        }
    }
}

/// Resources a job asks for. Absent fields default to zero/empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    /// Minimum CPU count per node.
    pub cpu_count: u32,
    /// Minimum number of nodes.
    pub node_count: u32,
    /// Minimum memory in megabytes.
    pub memory_mb: u64,
    /// Minimum disk in gigabytes.
    pub disk_gb: u64,
    /// Requested CPU time in seconds.
    pub cpu_time_secs: u64,
    /// Required architecture tag; `None` accepts any.
    pub architecture: Option<String>,
    /// Required platform, compared ignoring ASCII case; `None` accepts any.
    pub platform: Option<String>,
    /// Shell-style patterns (`*`, `?`, `[...]`) the resource id must match
    /// at least one of; empty accepts any resource.
    pub resource_patterns: Vec<String>,
    /// Runtime environments the resource must provide.
    pub runtime_environments: BTreeSet<String>,
    /// Preferred virtual organization the resource must belong to.
    pub vgrid: Option<String>,
    /// Workload kind.
    pub job_type: JobType,
    /// Whether the job may run on a sandbox resource.
    pub sandbox_ok: bool,
}

/// A unit of work waiting in, or dispatched from, the job queue.
///
/// Equality and hashing use the identifier only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    owner: OwnerId,
    submitted_at_ms: TimestampMs,
    requirements: Requirements,
    #[serde(default)]
    max_price: Option<String>,
    #[serde(default)]
    hint: ScheduleHint,
    #[serde(default)]
    schedule_targets: BTreeSet<ResourceId>,
    #[serde(default)]
    executor: Option<ResourceId>,
    #[serde(default)]
    retries: u32,
    #[serde(default)]
    queued_at_ms: Option<TimestampMs>,
}

impl Job {
    /// Create a pending job. Fails with `InvalidJob` when the id or owner is empty.
    pub fn new(
        id: impl Into<JobId>,
        owner: impl Into<OwnerId>,
        submitted_at_ms: TimestampMs,
        requirements: Requirements,
    ) -> Result<Self, SchedulerError> {
        let id = id.into();
        let owner = owner.into();
        if id.trim().is_empty() {
            return Err(SchedulerError::InvalidJob("job id is empty".into()));
        }
        if owner.trim().is_empty() {
            return Err(SchedulerError::InvalidJob(format!("job {id} has no owner")));
        }
        Ok(Self {
            id,
            owner,
            submitted_at_ms,
            requirements,
            max_price: None,
            hint: ScheduleHint::Wait,
            schedule_targets: BTreeSet::new(),
            executor: None,
            retries: 0,
            queued_at_ms: None,
        })
    }

    /// Attach a maximum price expression. It must parse; it is only evaluated
    /// when a price-aware policy considers the job.
    pub fn with_max_price(mut self, expression: impl Into<String>) -> Result<Self, SchedulerError> {
        let expression = expression.into();
        Expression::parse(&expression).map_err(|e| {
            SchedulerError::InvalidJob(format!("job {}: max price `{expression}`: {e}", self.id))
        })?;
        self.max_price = Some(expression);
        Ok(self)
    }

    /// Set the retry counter, used when a collaborator re-submits a lost job.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Job identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owner identity.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Submission timestamp (ms since epoch); immutable.
    pub const fn submitted_at_ms(&self) -> TimestampMs {
        self.submitted_at_ms
    }

    /// Requested resources.
    pub const fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Maximum price expression, if any.
    pub fn max_price(&self) -> Option<&str> {
        self.max_price.as_deref()
    }

    /// Latest filter verdict.
    pub const fn hint(&self) -> ScheduleHint {
        self.hint
    }

    /// Resources the filter found able to run the job now.
    pub const fn schedule_targets(&self) -> &BTreeSet<ResourceId> {
        &self.schedule_targets
    }

    /// Resource the job was dispatched to.
    pub const fn executor(&self) -> Option<&ResourceId> {
        self.executor.as_ref()
    }

    /// Number of times the job has been re-submitted.
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// When the job last entered the queue.
    pub const fn queued_at_ms(&self) -> Option<TimestampMs> {
        self.queued_at_ms
    }

    /// True once the job has an executor.
    pub const fn is_dispatched(&self) -> bool {
        self.executor.is_some()
    }

    /// Prepare the job for re-submission after it was lost: executor and
    /// scheduling annotations are cleared and the retry counter incremented.
    #[must_use]
    pub fn requeue(mut self) -> Self {
        self.executor = None;
        self.hint = ScheduleHint::Wait;
        self.schedule_targets.clear();
        self.queued_at_ms = None;
        self.retries = self.retries.saturating_add(1);
        self
    }

    /// Render a field for `must_match` comparisons. Unknown keys yield `None`.
    pub fn field(&self, key: &str) -> Option<String> {
        let r = &self.requirements;
        Some(match key {
            "id" => self.id.clone(),
            "owner" => self.owner.clone(),
            "architecture" => r.architecture.clone()?,
            "platform" => r.platform.clone()?,
            "vgrid" => r.vgrid.clone()?,
            "job_type" => r.job_type.to_string(),
            "cpu_count" => r.cpu_count.to_string(),
            "node_count" => r.node_count.to_string(),
            "memory" => r.memory_mb.to_string(),
            "disk" => r.disk_gb.to_string(),
            "cpu_time" => r.cpu_time_secs.to_string(),
            "retries" => self.retries.to_string(),
            _ => return None,
        })
    }

    pub(crate) fn set_hint(&mut self, hint: ScheduleHint) {
        self.hint = hint;
    }

    pub(crate) fn add_target(&mut self, resource: &ResourceId) {
        if !self.schedule_targets.contains(resource) {
            self.schedule_targets.insert(resource.clone());
        }
    }

    pub(crate) fn remove_target(&mut self, resource: &ResourceId) {
        self.schedule_targets.remove(resource);
    }

    pub(crate) fn set_schedule(&mut self, hint: ScheduleHint, targets: BTreeSet<ResourceId>) {
        self.hint = hint;
        self.schedule_targets = targets;
    }

    pub(crate) fn assign_executor(&mut self, resource: ResourceId) {
        self.executor = Some(resource);
    }

    pub(crate) fn mark_queued(&mut self, now_ms: TimestampMs) {
        self.queued_at_ms = Some(now_ms);
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
