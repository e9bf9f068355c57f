//! Per-resource, per-owner execution history.
//!
//! Entries are keyed by `(resource id, owner)` pairs and never hold
//! references to jobs or resources. An entry is created on the first
//! dispatch of the pair and may be evicted once it has been untouched for
//! longer than the configured TTL and has no job in flight.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::core::events::{CompletionReport, ExitKind};
use crate::core::job::Job;
use crate::util::serde::{JobId, OwnerId, ResourceId, TimestampMs};

/// Exponentially weighted moving average step.
///
/// The first observation seeds the average; later ones are blended in with
/// weight `alpha`.
pub fn ewma(previous: Option<f64>, observed: f64, alpha: f64) -> f64 {
    match previous {
        None => observed,
        Some(prev) => alpha.mul_add(observed, (1.0 - alpha) * prev),
    }
}

fn is_measurement(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Accumulated outcomes for one `(resource, owner)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Resource identifier.
    pub resource_id: ResourceId,
    /// Owner identity.
    pub owner: OwnerId,
    /// Jobs dispatched.
    pub dispatched: u64,
    /// Jobs that finished successfully.
    pub completed: u64,
    /// Jobs that ran and failed.
    pub failed: u64,
    /// Jobs that never reported back.
    pub lost: u64,
    /// Total observed wall-clock seconds.
    pub wall_secs: f64,
    /// Moving-average observed price; `None` before the first report.
    pub ewma_price: Option<f64>,
    /// Creation time.
    pub first_seen_ms: TimestampMs,
    /// Last dispatch or completion.
    pub last_touched_ms: TimestampMs,
}

impl HistoryEntry {
    fn new(resource_id: ResourceId, owner: OwnerId, now_ms: TimestampMs) -> Self {
        Self {
            resource_id,
            owner,
            dispatched: 0,
            completed: 0,
            failed: 0,
            lost: 0,
            wall_secs: 0.0,
            ewma_price: None,
            first_seen_ms: now_ms,
            last_touched_ms: now_ms,
        }
    }
}

type PairKey = (ResourceId, OwnerId);

#[derive(Debug, Clone)]
struct InFlight {
    key: PairKey,
    since_ms: TimestampMs,
}

/// History map plus the set of dispatched jobs awaiting a completion report.
pub struct History {
    alpha: f64,
    ttl_ms: TimestampMs,
    lost_after_ms: TimestampMs,
    entries: HashMap<PairKey, HistoryEntry>,
    in_flight: HashMap<JobId, InFlight>,
}

impl History {
    /// Create an empty history.
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            alpha: config.smoothing_alpha,
            ttl_ms: config.ttl_ms(),
            lost_after_ms: config.lost_after_ms(),
            entries: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Smoothing factor in use.
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Record that `job` was dispatched to `resource_id`.
    ///
    /// Creates the pair entry on first use. Jobs in flight for longer than
    /// the lost-after age are counted as lost first, then entries untouched
    /// for longer than the TTL are evicted.
    pub fn record_dispatch(&mut self, job: &Job, resource_id: &ResourceId, now_ms: TimestampMs) {
        self.prune_in_flight(now_ms);
        self.evict(now_ms);
        let key = (resource_id.clone(), job.owner().to_string());
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| HistoryEntry::new(key.0.clone(), key.1.clone(), now_ms));
        entry.dispatched += 1;
        entry.last_touched_ms = entry.last_touched_ms.max(now_ms);
        self.in_flight.insert(
            job.id().to_string(),
            InFlight {
                key,
                since_ms: now_ms,
            },
        );
    }

    /// Apply a completion report. Returns false, after logging, when the job
    /// is not in flight.
    ///
    /// A negative or non-finite observed price or wall time is logged and
    /// left out of the averages; the outcome itself still counts.
    pub fn record_completion(&mut self, report: &CompletionReport, now_ms: TimestampMs) -> bool {
        let Some(InFlight { key, .. }) = self.in_flight.remove(&report.job_id) else {
            warn!(
                job_id = %report.job_id,
                resource_id = %report.resource_id,
                "completion report for unknown job discarded"
            );
            return false;
        };
        if key.0 != report.resource_id {
            warn!(
                job_id = %report.job_id,
                resource_id = %report.resource_id,
                "completion reported by {} but job was dispatched to {}",
                report.resource_id,
                key.0
            );
        }
        let alpha = self.alpha;
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| HistoryEntry::new(key.0.clone(), key.1.clone(), now_ms));
        match report.exit_kind {
            ExitKind::Ok | ExitKind::Failed => {
                if report.exit_kind == ExitKind::Ok {
                    entry.completed += 1;
                } else {
                    entry.failed += 1;
                }
                if is_measurement(report.observed_wall_secs) {
                    entry.wall_secs += report.observed_wall_secs;
                } else {
                    warn!(
                        job_id = %report.job_id,
                        resource_id = %report.resource_id,
                        "ignoring observed wall time {}",
                        report.observed_wall_secs
                    );
                }
                if is_measurement(report.observed_price) {
                    entry.ewma_price = Some(ewma(entry.ewma_price, report.observed_price, alpha));
                } else {
                    warn!(
                        job_id = %report.job_id,
                        resource_id = %report.resource_id,
                        "ignoring observed price {}",
                        report.observed_price
                    );
                }
            }
            ExitKind::Lost => entry.lost += 1,
        }
        entry.last_touched_ms = entry.last_touched_ms.max(now_ms);
        debug!(
            "history {}/{}: {} after job {}",
            key.0, key.1, report.exit_kind, report.job_id
        );
        true
    }

    /// Count jobs in flight for longer than the lost-after age as lost and
    /// stop tracking them. Returns their ids, oldest first.
    pub fn prune_in_flight(&mut self, now_ms: TimestampMs) -> Vec<JobId> {
        if self.lost_after_ms == 0 {
            return Vec::new();
        }
        let limit = self.lost_after_ms;
        let mut overdue: Vec<(TimestampMs, JobId)> = self
            .in_flight
            .iter()
            .filter(|(_, f)| now_ms.saturating_sub(f.since_ms) > limit)
            .map(|(id, f)| (f.since_ms, id.clone()))
            .collect();
        overdue.sort();
        let mut lost = Vec::with_capacity(overdue.len());
        for (_, job_id) in overdue {
            let Some(InFlight { key, .. }) = self.in_flight.remove(&job_id) else {
                continue;
            };
            warn!(
                job_id = %job_id,
                resource_id = %key.0,
                "no completion report after {} ms, counting job as lost",
                limit
            );
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.lost += 1;
                entry.last_touched_ms = entry.last_touched_ms.max(now_ms);
            }
            lost.push(job_id);
        }
        lost
    }

    // Pairs with a job in flight are kept so its report finds the entry.
    fn evict(&mut self, now_ms: TimestampMs) {
        if self.ttl_ms == 0 {
            return;
        }
        let ttl = self.ttl_ms;
        let busy: HashSet<&PairKey> = self.in_flight.values().map(|f| &f.key).collect();
        let before = self.entries.len();
        self.entries.retain(|key, e| {
            busy.contains(key) || now_ms.saturating_sub(e.last_touched_ms) <= ttl
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("evicted {evicted} idle history entries");
        }
    }

    /// Entry for a pair, if any.
    pub fn entry(&self, resource_id: &ResourceId, owner: &str) -> Option<&HistoryEntry> {
        self.entries.get(&(resource_id.clone(), owner.to_string()))
    }

    /// All entries for one resource.
    pub fn entries_for_resource(&self, resource_id: &ResourceId) -> Vec<&HistoryEntry> {
        self.entries
            .values()
            .filter(|e| &e.resource_id == resource_id)
            .collect()
    }

    /// Resource a job is running on, if it is in flight.
    pub fn in_flight(&self, job_id: &str) -> Option<&ResourceId> {
        self.in_flight.get(job_id).map(|f| &f.key.0)
    }

    /// Number of dispatched jobs awaiting a report.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of pair entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
