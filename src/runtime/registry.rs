//! Registry of the latest resource records.
//!
//! Heartbeats replace a resource by swapping its `Arc`; a reader that
//! fetched a record keeps a consistent snapshot for the whole decision.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::Resource;
use crate::util::serde::{ResourceId, TimestampMs};

/// Latest known record per resource.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: RwLock<HashMap<ResourceId, Arc<Resource>>>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource, returning the previous record.
    pub fn upsert(&self, resource: Resource) -> Option<Arc<Resource>> {
        let id = resource.id.clone();
        self.resources.write().insert(id, Arc::new(resource))
    }

    /// Current record for `id`.
    pub fn get(&self, id: &ResourceId) -> Option<Arc<Resource>> {
        self.resources.read().get(id).cloned()
    }

    /// Refresh the liveness stamp of a known resource. Returns false for
    /// unknown resources.
    pub fn touch(&self, id: &ResourceId, now_ms: TimestampMs) -> bool {
        let mut map = self.resources.write();
        let Some(current) = map.get_mut(id) else {
            return false;
        };
        Arc::make_mut(current).touch(now_ms);
        true
    }

    /// Remove a resource.
    pub fn remove(&self, id: &ResourceId) -> Option<Arc<Resource>> {
        self.resources.write().remove(id)
    }

    /// Remove resources whose heartbeat is older than `threshold_ms`.
    pub fn prune_stale(&self, now_ms: TimestampMs, threshold_ms: TimestampMs) -> Vec<ResourceId> {
        let mut map = self.resources.write();
        let stale: Vec<ResourceId> = map
            .values()
            .filter(|r| r.is_stale(now_ms, threshold_ms))
            .map(|r| r.id.clone())
            .collect();
        for id in &stale {
            map.remove(id);
        }
        if !stale.is_empty() {
            tracing::warn!("pruned {} stale resources", stale.len());
        }
        stale
    }

    /// Every current record, sorted by id.
    pub fn snapshot(&self) -> Vec<Arc<Resource>> {
        let mut all: Vec<_> = self.resources.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// True when no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}
