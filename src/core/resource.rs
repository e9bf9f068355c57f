//! Resource records as seen by the scheduler.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::job::{Job, JobType};
use crate::core::SchedulerError;
use crate::expr::Expression;
use crate::util::serde::{ResourceId, TimestampMs};

/// Price expression used when a resource does not advertise one.
pub const DEFAULT_PRICE_EXPRESSION: &str = "0";

/// Which job types a resource accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTypeSupport {
    /// Batch jobs only.
    #[default]
    Batch,
    /// Bulk jobs, and batch jobs as well.
    Bulk,
    /// Interactive jobs only.
    Interactive,
    /// Every job type.
    All,
}

impl JobTypeSupport {
    /// True when a job of `job_type` may run here.
    pub const fn accepts(self, job_type: JobType) -> bool {
        matches!(
            (self, job_type),
            (Self::All, _)
                | (Self::Batch, JobType::Batch)
                | (Self::Bulk, JobType::Batch | JobType::Bulk)
                | (Self::Interactive, JobType::Interactive)
        )
    }
}

/// A compute endpoint with declared capabilities and pricing.
///
/// Inside a scheduling decision a resource is an immutable value; the only
/// field the core ever changes is the liveness stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier.
    pub id: ResourceId,
    /// CPUs per node.
    pub cpu_count: u32,
    /// Number of nodes.
    pub node_count: u32,
    /// Memory in megabytes.
    pub memory_mb: u64,
    /// Disk in gigabytes.
    pub disk_gb: u64,
    /// Architecture tag, e.g. `X86_64`.
    pub architecture: String,
    /// Platform name; empty when the resource reports none.
    #[serde(default)]
    pub platform: String,
    /// Longest CPU time a job may ask for, in seconds; `None` is unlimited.
    #[serde(default)]
    pub max_cpu_time_secs: Option<u64>,
    /// Runtime environments the resource provides.
    #[serde(default)]
    pub runtime_environments: BTreeSet<String>,
    /// Price per unit of work, as an expression.
    #[serde(default = "default_price_expression")]
    pub price_expression: String,
    /// Virtual organizations the resource belongs to.
    #[serde(default)]
    pub vgrids: Vec<String>,
    /// Last contact (ms since epoch).
    pub last_seen_ms: TimestampMs,
    /// Currently free execution slots; `None` means unrestricted.
    #[serde(default)]
    pub free_slots: Option<u32>,
    /// Accepted job types.
    #[serde(default)]
    pub job_types: JobTypeSupport,
    /// Whether the resource is a sandbox (screensaver-style) worker.
    #[serde(default)]
    pub sandbox: bool,
}

fn default_price_expression() -> String {
    DEFAULT_PRICE_EXPRESSION.to_string()
}

impl Resource {
    /// Create a resource with zero capacity; fill capacity with the `with_*` builders.
    pub fn new(id: ResourceId, architecture: impl Into<String>, last_seen_ms: TimestampMs) -> Self {
        Self {
            id,
            cpu_count: 0,
            node_count: 1,
            memory_mb: 0,
            disk_gb: 0,
            architecture: architecture.into(),
            platform: String::new(),
            max_cpu_time_secs: None,
            runtime_environments: BTreeSet::new(),
            price_expression: default_price_expression(),
            vgrids: Vec::new(),
            last_seen_ms,
            free_slots: None,
            job_types: JobTypeSupport::default(),
            sandbox: false,
        }
    }

    /// Set CPU, memory and disk capacity.
    #[must_use]
    pub const fn with_capacity(mut self, cpu_count: u32, memory_mb: u64, disk_gb: u64) -> Self {
        self.cpu_count = cpu_count;
        self.memory_mb = memory_mb;
        self.disk_gb = disk_gb;
        self
    }

    /// Set the node count.
    #[must_use]
    pub const fn with_nodes(mut self, node_count: u32) -> Self {
        self.node_count = node_count;
        self
    }

    /// Set the platform name.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Limit the CPU time a job may ask for.
    #[must_use]
    pub const fn with_max_cpu_time(mut self, secs: Option<u64>) -> Self {
        self.max_cpu_time_secs = secs;
        self
    }

    /// Set the price expression.
    #[must_use]
    pub fn with_price(mut self, expression: impl Into<String>) -> Self {
        self.price_expression = expression.into();
        self
    }

    /// Add a provided runtime environment.
    #[must_use]
    pub fn with_runtime_environment(mut self, name: impl Into<String>) -> Self {
        self.runtime_environments.insert(name.into());
        self
    }

    /// Add a virtual organization membership.
    #[must_use]
    pub fn with_vgrid(mut self, vgrid: impl Into<String>) -> Self {
        self.vgrids.push(vgrid.into());
        self
    }

    /// Advertise a number of free slots.
    #[must_use]
    pub const fn with_free_slots(mut self, free_slots: Option<u32>) -> Self {
        self.free_slots = free_slots;
        self
    }

    /// Set the accepted job types.
    #[must_use]
    pub const fn with_job_types(mut self, job_types: JobTypeSupport) -> Self {
        self.job_types = job_types;
        self
    }

    /// Mark the resource as a sandbox worker.
    #[must_use]
    pub const fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Check boundary invariants: non-empty host and a parseable price expression.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.id.host.trim().is_empty() {
            return Err(SchedulerError::InvalidResource("resource host is empty".into()));
        }
        Expression::parse(&self.price_expression).map_err(|e| {
            SchedulerError::InvalidResource(format!(
                "resource {}: price `{}`: {e}",
                self.id, self.price_expression
            ))
        })?;
        Ok(())
    }

    /// Record contact from the resource.
    pub fn touch(&mut self, now_ms: TimestampMs) {
        if now_ms > self.last_seen_ms {
            self.last_seen_ms = now_ms;
        }
    }

    /// True when the liveness stamp is older than `threshold_ms` at `now_ms`.
    pub const fn is_stale(&self, now_ms: TimestampMs, threshold_ms: TimestampMs) -> bool {
        now_ms.saturating_sub(self.last_seen_ms) > threshold_ms
    }

    /// True when the resource belongs to `vgrid`.
    pub fn is_member_of(&self, vgrid: &str) -> bool {
        self.vgrids.iter().any(|v| v == vgrid)
    }

    /// Capacity left after running `jobs`, used to pack backfill jobs.
    /// Each job also takes one free slot when slots are advertised.
    #[must_use]
    pub fn remaining_after<'a>(&self, jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut left = self.clone();
        for job in jobs {
            left.free_slots = left.free_slots.map(|n| n.saturating_sub(1));
            let r = job.requirements();
            left.cpu_count = left.cpu_count.saturating_sub(r.cpu_count);
            left.node_count = left.node_count.saturating_sub(r.node_count);
            left.memory_mb = left.memory_mb.saturating_sub(r.memory_mb);
            left.disk_gb = left.disk_gb.saturating_sub(r.disk_gb);
        }
        left
    }
}
