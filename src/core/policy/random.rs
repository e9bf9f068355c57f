//! Uniform random choice among candidates.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::core::policy::{Candidate, PolicyContext, SchedulingPolicy, Selection};
use crate::core::resource::Resource;
use crate::util::clock::now_nanos_u64;

/// Picks a candidate uniformly at random from an injected source.
pub struct RandomPolicy {
    rng: Box<dyn RngCore + Send>,
}

impl RandomPolicy {
    /// Source seeded from the clock.
    pub fn new() -> Self {
        Self::with_seed(now_nanos_u64())
    }

    /// Deterministic source for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(Box::new(StdRng::seed_from_u64(seed)))
    }

    /// Use any random source.
    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self { rng }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(
        &mut self,
        candidates: &[Candidate],
        _resource: &Resource,
        _ctx: &PolicyContext,
    ) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }
        let pos = self.rng.random_range(0..candidates.len());
        Some(Selection {
            candidate: pos,
            reason: format!("random pick {} of {}", pos + 1, candidates.len()),
            sale: None,
        })
    }
}
